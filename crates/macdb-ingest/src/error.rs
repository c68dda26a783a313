use macdb_db::DbError;
use macdb_scraper::ScraperError;
use thiserror::Error;

/// Failure of a catalog store operation.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error(transparent)]
    Db(#[from] DbError),

    /// A write lost to a concurrent writer; retrying once usually succeeds.
    #[error("write conflict: {0}")]
    Conflict(String),

    /// The write would break the two-level category hierarchy.
    #[error("category {name} cannot be placed under {parent_id}")]
    InvalidHierarchy { name: String, parent_id: i64 },

    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: String },

    #[error("transaction already finished")]
    TransactionClosed,
}

impl StoreError {
    #[must_use]
    pub fn is_conflict(&self) -> bool {
        match self {
            StoreError::Conflict(_) => true,
            StoreError::Db(e) => e.is_conflict(),
            _ => false,
        }
    }
}

impl From<sqlx::Error> for StoreError {
    fn from(e: sqlx::Error) -> Self {
        StoreError::Db(DbError::Sqlx(e))
    }
}

/// Failure that ends an import or sync-new-apps job.
#[derive(Debug, Error)]
pub enum ImportError {
    #[error("No apps retrieved")]
    NoAppsRetrieved,

    #[error("no system or admin owner exists to attribute imported apps to")]
    NoSystemOwner,

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("failed to encode per-record errors: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Failure of a category sync or preview.
#[derive(Debug, Error)]
pub enum SyncError {
    #[error(transparent)]
    Scraper(#[from] ScraperError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl SyncError {
    /// `true` when the caller supplied a bad source URL or the remote page had
    /// nothing usable, as opposed to an infrastructure failure.
    #[must_use]
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            SyncError::Scraper(
                ScraperError::InvalidUrl { .. }
                    | ScraperError::MissingPayload { .. }
                    | ScraperError::NoValidCategories { .. }
            )
        )
    }
}
