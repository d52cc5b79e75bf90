//! Application configuration loaded via OrthoConfig.
//!
//! Every setting can be supplied as a CLI flag, a `TILLPOINT_`-prefixed
//! environment variable, or a config-file key; unset values fall back to the
//! accessors' defaults.

use std::path::PathBuf;
use std::time::Duration;

use ortho_config::OrthoConfig;
use serde::Deserialize;

const DEFAULT_BIND_ADDR: &str = "0.0.0.0:8080";
const DEFAULT_SYNC_INTERVAL_SECS: u64 = 30;
const DEFAULT_REMOTE_TIMEOUT_SECS: u64 = 30;
const DEFAULT_WORKER_LIMIT: usize = 4;

/// Runtime settings for the backend process.
#[derive(Debug, Clone, Deserialize, OrthoConfig)]
#[ortho_config(prefix = "TILLPOINT")]
pub struct AppConfig {
    /// Address the HTTP server binds to.
    pub bind_addr: Option<String>,
    /// PostgreSQL URL for the local store. When unset, an embedded cluster
    /// is bootstrapped instead.
    pub local_database_url: Option<String>,
    /// Data directory for the embedded cluster. Unset means a temporary
    /// directory discarded on shutdown.
    pub data_dir: Option<PathBuf>,
    /// Base URL of the remote REST store.
    pub remote_base_url: Option<String>,
    /// API key sent with every remote request.
    pub remote_api_key: Option<String>,
    /// Seconds between scheduled synchronisation passes.
    pub sync_interval_secs: Option<u64>,
    /// Per-request timeout for the remote store, in seconds.
    pub remote_timeout_secs: Option<u64>,
    /// Concurrent row writes per entity type during a pass.
    #[ortho_config(default = DEFAULT_WORKER_LIMIT)]
    pub worker_limit: Option<usize>,
}

impl AppConfig {
    /// Return the configured bind address, falling back to the default.
    pub fn bind_addr(&self) -> &str {
        self.bind_addr.as_deref().unwrap_or(DEFAULT_BIND_ADDR)
    }

    /// Return the interval between scheduled passes.
    pub fn sync_interval(&self) -> Duration {
        Duration::from_secs(
            self.sync_interval_secs
                .unwrap_or(DEFAULT_SYNC_INTERVAL_SECS),
        )
    }

    /// Return the remote request timeout.
    pub fn remote_timeout(&self) -> Duration {
        Duration::from_secs(
            self.remote_timeout_secs
                .unwrap_or(DEFAULT_REMOTE_TIMEOUT_SECS),
        )
    }

    /// Return the per-entity-type write concurrency bound.
    pub fn worker_limit(&self) -> usize {
        self.worker_limit.unwrap_or(DEFAULT_WORKER_LIMIT)
    }
}

#[cfg(test)]
mod tests {
    //! Configuration parsing and default fallbacks.

    use std::ffi::OsString;

    use env_lock::lock_env;
    use rstest::rstest;

    use super::*;

    fn clear_env() -> impl Drop {
        lock_env([
            ("TILLPOINT_BIND_ADDR", None::<String>),
            ("TILLPOINT_LOCAL_DATABASE_URL", None),
            ("TILLPOINT_DATA_DIR", None),
            ("TILLPOINT_REMOTE_BASE_URL", None),
            ("TILLPOINT_REMOTE_API_KEY", None),
            ("TILLPOINT_SYNC_INTERVAL_SECS", None),
            ("TILLPOINT_REMOTE_TIMEOUT_SECS", None),
            ("TILLPOINT_WORKER_LIMIT", None),
        ])
    }

    fn load_from_empty_args() -> AppConfig {
        AppConfig::load_from_iter([OsString::from("backend")]).expect("config should load")
    }

    #[rstest]
    fn defaults_apply_when_nothing_is_set() {
        let _guard = clear_env();
        let config = load_from_empty_args();
        assert_eq!(config.bind_addr(), DEFAULT_BIND_ADDR);
        assert_eq!(config.sync_interval(), Duration::from_secs(30));
        assert_eq!(config.remote_timeout(), Duration::from_secs(30));
        assert_eq!(config.worker_limit(), 4);
        assert!(config.local_database_url.is_none());
        assert!(config.remote_base_url.is_none());
    }

    #[rstest]
    fn environment_overrides_are_respected() {
        let _guard = lock_env([
            ("TILLPOINT_BIND_ADDR", Some("127.0.0.1:9090".to_owned())),
            ("TILLPOINT_LOCAL_DATABASE_URL", None),
            ("TILLPOINT_DATA_DIR", None),
            (
                "TILLPOINT_REMOTE_BASE_URL",
                Some("https://pos.example.com/rest/v1/".to_owned()),
            ),
            ("TILLPOINT_REMOTE_API_KEY", Some("secret".to_owned())),
            ("TILLPOINT_SYNC_INTERVAL_SECS", Some("5".to_owned())),
            ("TILLPOINT_REMOTE_TIMEOUT_SECS", None),
            ("TILLPOINT_WORKER_LIMIT", Some("8".to_owned())),
        ]);

        let config = load_from_empty_args();
        assert_eq!(config.bind_addr(), "127.0.0.1:9090");
        assert_eq!(config.sync_interval(), Duration::from_secs(5));
        assert_eq!(config.worker_limit(), 8);
        assert_eq!(
            config.remote_base_url.as_deref(),
            Some("https://pos.example.com/rest/v1/")
        );
        assert_eq!(config.remote_api_key.as_deref(), Some("secret"));
    }
}
