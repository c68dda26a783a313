//! Catalog ingestion: category resolution, detail collection, import and
//! sync jobs, and taxonomy reconciliation, over pluggable storage.

pub mod category_sync;
pub mod collector;
pub mod error;
pub mod images;
pub mod jobs;
#[cfg(any(test, feature = "test-util"))]
pub mod memory;
pub mod pg;
pub mod resolver;
pub mod runner;
pub mod store;

#[cfg(test)]
pub(crate) mod test_support;

pub use category_sync::{CategorySync, MAX_CATEGORY_DEPTH};
pub use collector::{DetailCollector, DETAIL_BATCH_SIZE};
pub use error::{ImportError, StoreError, SyncError};
pub use images::{ImageKind, ImageStore, LocalImageStore};
pub use jobs::{create_job_with_retry, JOB_CREATE_RETRY_DELAY};
#[cfg(any(test, feature = "test-util"))]
pub use memory::MemoryCatalog;
pub use pg::PgCatalog;
pub use resolver::{CategoryResolver, ResolvedCategory};
pub use runner::{ImportOptions, ImportSummary, JobRunner, DEFAULT_IMPORT_LIMIT, WRITE_CHUNK_SIZE};
pub use store::{
    Catalog, CatalogStore, Category, CategoryStore, CategoryTransaction, JobStore, TaxonomyStore,
};
