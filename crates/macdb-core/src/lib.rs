pub mod app_config;
pub mod catalog;
pub mod config;
pub mod jobs;
pub mod taxonomy;

use thiserror::Error;

pub use app_config::{AppConfig, Environment};
pub use catalog::{ImportRecord, ListingSummary, RecordCategory, VendorData};
pub use config::{load_app_config, load_app_config_from_env};
pub use jobs::{Job, JobStatus, JobType, RecordFailure};
pub use taxonomy::{CategoryChange, ChangeKind, ChangeOldValues, SyncReport, SyncSummary};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("invalid value for {var}: {reason}")]
    InvalidEnvVar { var: String, reason: String },
}
