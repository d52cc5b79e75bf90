//! Embedded PostgreSQL bootstrap for the local store.
//!
//! A terminal runs its local store as an embedded PostgreSQL instance
//! unless an external database URL is configured. The instance is set up
//! and started here, the application database created if absent, and the
//! Diesel migrations applied before any pool connects.

use std::path::PathBuf;

use diesel::Connection;
use diesel::pg::PgConnection;
use diesel_migrations::{EmbeddedMigrations, MigrationHarness, embed_migrations};
use postgresql_embedded::PostgreSQL;
use tracing::info;

/// Migrations compiled in from the crate's `migrations/` directory.
pub const MIGRATIONS: EmbeddedMigrations = embed_migrations!("migrations");

const DATABASE_NAME: &str = "tillpoint";

/// Failures while bringing the local database up.
#[derive(Debug, thiserror::Error)]
pub enum BootstrapError {
    /// The embedded server could not be set up or started.
    #[error("embedded postgres failed: {0}")]
    Database(#[from] postgresql_embedded::Error),
    /// Migrations could not be applied.
    #[error("migrations failed: {message}")]
    Migration {
        /// Underlying migration failure.
        message: String,
    },
    /// The blocking migration task was cancelled.
    #[error("migration task failed: {message}")]
    Join {
        /// Underlying join failure.
        message: String,
    },
}

/// A running embedded PostgreSQL instance owning the application database.
///
/// Dropping the value without calling [`EmbeddedDatabase::stop`] leaves
/// shutdown to the embedded server's own drop handling.
pub struct EmbeddedDatabase {
    postgres: PostgreSQL,
    database_url: String,
}

impl EmbeddedDatabase {
    /// Set up and start the embedded server, creating the application
    /// database when it does not exist yet.
    ///
    /// A persistent `data_dir` keeps records across restarts, which an
    /// offline-first terminal needs; passing `None` yields a throwaway
    /// instance for local experimentation.
    pub async fn start(data_dir: Option<PathBuf>) -> Result<Self, BootstrapError> {
        let mut settings = postgresql_embedded::Settings::default();
        match data_dir {
            Some(dir) => {
                settings.temporary = false;
                settings.data_dir = dir;
            }
            None => settings.temporary = true,
        }

        let mut postgres = PostgreSQL::new(settings);
        postgres.setup().await?;
        postgres.start().await?;
        if !postgres.database_exists(DATABASE_NAME).await? {
            postgres.create_database(DATABASE_NAME).await?;
        }

        let database_url = postgres.settings().url(DATABASE_NAME);
        info!(port = postgres.settings().port, "embedded postgres started");
        Ok(Self {
            postgres,
            database_url,
        })
    }

    /// Connection URL for the application database.
    pub fn database_url(&self) -> &str {
        &self.database_url
    }

    /// Stop the embedded server.
    pub async fn stop(mut self) -> Result<(), BootstrapError> {
        self.postgres.stop().await?;
        Ok(())
    }
}

/// Apply any pending migrations over a short-lived synchronous connection.
///
/// Diesel's migration harness is synchronous, so the work runs on a
/// blocking thread rather than stalling the runtime.
pub async fn run_migrations(database_url: &str) -> Result<(), BootstrapError> {
    let url = database_url.to_owned();
    tokio::task::spawn_blocking(move || {
        let mut conn = PgConnection::establish(&url).map_err(|err| BootstrapError::Migration {
            message: err.to_string(),
        })?;
        let applied = conn
            .run_pending_migrations(MIGRATIONS)
            .map_err(|err| BootstrapError::Migration {
                message: err.to_string(),
            })?;
        Ok::<_, BootstrapError>(applied.len())
    })
    .await
    .map_err(|err| BootstrapError::Join {
        message: err.to_string(),
    })?
    .map(|applied| {
        if applied > 0 {
            info!(applied, "migrations applied");
        }
    })
}
