use std::net::SocketAddr;
use std::path::PathBuf;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Environment {
    Development,
    Test,
    Production,
}

impl std::fmt::Display for Environment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Environment::Development => write!(f, "development"),
            Environment::Test => write!(f, "test"),
            Environment::Production => write!(f, "production"),
        }
    }
}

#[derive(Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub env: Environment,
    pub bind_addr: SocketAddr,
    pub log_level: String,
    pub db_max_connections: u32,
    pub db_min_connections: u32,
    pub db_acquire_timeout_secs: u64,
    pub scraper_request_timeout_secs: u64,
    /// Sent on every request; the source site serves reduced markup to
    /// non-browser agents.
    pub scraper_user_agent: String,
    /// Politeness delay between listing pages.
    pub scraper_inter_request_delay_ms: u64,
    pub scraper_max_retries: u32,
    pub scraper_retry_backoff_base_ms: u64,
    /// Origin of the remote listing site, e.g. `https://www.macupdate.com`.
    pub source_base_url: String,
    /// Path of the paginated listing endpoint, relative to `source_base_url`.
    pub source_listing_path: String,
    /// Directory downloaded icons and screenshots are written to.
    pub image_dir: PathBuf,
    /// URL prefix under which `image_dir` is served.
    pub image_public_prefix: String,
    /// Cron expression for the scheduled sync-new-apps job; unset disables it.
    pub sync_cron: Option<String>,
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("env", &self.env)
            .field("bind_addr", &self.bind_addr)
            .field("log_level", &self.log_level)
            .field("database_url", &"[redacted]")
            .field("db_max_connections", &self.db_max_connections)
            .field("db_min_connections", &self.db_min_connections)
            .field("db_acquire_timeout_secs", &self.db_acquire_timeout_secs)
            .field(
                "scraper_request_timeout_secs",
                &self.scraper_request_timeout_secs,
            )
            .field("scraper_user_agent", &self.scraper_user_agent)
            .field(
                "scraper_inter_request_delay_ms",
                &self.scraper_inter_request_delay_ms,
            )
            .field("scraper_max_retries", &self.scraper_max_retries)
            .field(
                "scraper_retry_backoff_base_ms",
                &self.scraper_retry_backoff_base_ms,
            )
            .field("source_base_url", &self.source_base_url)
            .field("source_listing_path", &self.source_listing_path)
            .field("image_dir", &self.image_dir)
            .field("image_public_prefix", &self.image_public_prefix)
            .field("sync_cron", &self.sync_cron)
            .finish()
    }
}
