//! Server construction and route wiring.

pub mod scheduler;

use std::sync::Arc;

use actix_web::dev::{Server, ServiceFactory, ServiceRequest, ServiceResponse};
use actix_web::{App, HttpServer, web};
#[cfg(debug_assertions)]
use utoipa::OpenApi;
#[cfg(debug_assertions)]
use utoipa_swagger_ui::SwaggerUi;

#[cfg(debug_assertions)]
use crate::doc::ApiDoc;
use crate::domain::sync::SyncOrchestrator;
use crate::inbound::http::health::{HealthState, live, ready};
use crate::inbound::http::sync::trigger_sync;
use crate::outbound::persistence::DieselLocalStore;
use crate::outbound::remote::RestRemoteStore;

/// Orchestrator over the production store adapters.
pub type Orchestrator = SyncOrchestrator<DieselLocalStore, RestRemoteStore>;

fn build_app(
    health_state: web::Data<HealthState>,
    orchestrator: web::Data<Orchestrator>,
) -> App<
    impl ServiceFactory<
        ServiceRequest,
        Config = (),
        Response = ServiceResponse,
        Error = actix_web::Error,
        InitError = (),
    >,
> {
    let app = App::new()
        .app_data(health_state)
        .app_data(orchestrator)
        .route(
            "/sync",
            web::post().to(trigger_sync::<DieselLocalStore, RestRemoteStore>),
        )
        .service(ready)
        .service(live);

    #[cfg(debug_assertions)]
    let app = app.service(SwaggerUi::new("/docs").url("/api-docs/openapi.json", ApiDoc::openapi()));
    #[cfg(not(debug_assertions))]
    let app = app;

    app
}

/// Construct the HTTP server exposing the sync trigger and health probes.
///
/// # Errors
/// Propagates [`std::io::Error`] when binding the socket fails.
pub fn create_server(
    health_state: web::Data<HealthState>,
    orchestrator: Arc<Orchestrator>,
    bind_addr: &str,
) -> std::io::Result<Server> {
    let orchestrator = web::Data::from(orchestrator);
    let server = HttpServer::new(move || {
        build_app(health_state.clone(), orchestrator.clone())
    })
    .bind(bind_addr)?
    .run();

    Ok(server)
}
