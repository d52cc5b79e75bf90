//! OpenAPI documentation configuration.
//!
//! Defines the [`ApiDoc`] struct which generates the OpenAPI specification
//! for the REST surface: the manual sync trigger and the health probes. The
//! generated document backs Swagger UI in debug builds.

use utoipa::OpenApi;

use crate::inbound::http::sync::{SyncFailure, SyncResponse};

/// OpenAPI document for the REST API.
/// Swagger UI is enabled in debug builds only.
#[derive(OpenApi)]
#[openapi(
    info(
        title = "Tillpoint backend API",
        description = "Synchronisation trigger and health probes for the point-of-sale backend."
    ),
    servers(
        (url = "/", description = "Relative to the deployment base URL")
    ),
    paths(
        crate::inbound::http::sync::trigger_sync,
        crate::inbound::http::health::ready,
        crate::inbound::http::health::live,
    ),
    components(schemas(SyncResponse, SyncFailure))
)]
pub struct ApiDoc;

#[cfg(test)]
mod tests {
    //! Sanity checks over the generated document.

    use super::*;
    use rstest::rstest;

    #[rstest]
    fn document_lists_the_public_paths() {
        let doc = ApiDoc::openapi();
        let paths = &doc.paths.paths;
        assert!(paths.contains_key("/sync"));
        assert!(paths.contains_key("/health/ready"));
        assert!(paths.contains_key("/health/live"));
    }
}
