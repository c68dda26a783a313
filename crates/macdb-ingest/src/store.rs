//! Storage seams for the pipeline.
//!
//! The resolver, job runner, and category sync only talk to these traits.
//! [`crate::PgCatalog`] backs them with Postgres; `MemoryCatalog` (behind the
//! `test-util` feature) keeps everything in process for tests.

use async_trait::async_trait;
use macdb_core::{ImportRecord, Job, JobType, VendorData};
use macdb_db::{AppPlacement, CategoryRow, CategoryUpdate, NewCategory};
use uuid::Uuid;

use crate::error::StoreError;

/// A stored category. `parent_id` is `None` for top-level categories.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Category {
    pub id: i64,
    pub name: String,
    pub parent_id: Option<i64>,
    pub external_id: Option<String>,
    pub description: Option<String>,
}

impl From<CategoryRow> for Category {
    fn from(row: CategoryRow) -> Self {
        Self {
            id: row.id,
            name: row.name,
            parent_id: row.parent_id,
            external_id: row.external_id,
            description: row.description,
        }
    }
}

#[async_trait]
pub trait CategoryStore: Send + Sync {
    async fn find_category_by_external_id(
        &self,
        external_id: &str,
    ) -> Result<Option<Category>, StoreError>;

    /// Exact-name lookup under `parent_id` (`None` for top level).
    async fn find_category_by_name(
        &self,
        name: &str,
        parent_id: Option<i64>,
    ) -> Result<Option<Category>, StoreError>;

    async fn get_category(&self, id: i64) -> Result<Option<Category>, StoreError>;

    /// Creates a category, returning the existing row if `(name, parent_id)`
    /// or `external_id` is already taken.
    async fn create_category(&self, new: NewCategory<'_>) -> Result<Category, StoreError>;

    async fn update_category(
        &self,
        id: i64,
        update: CategoryUpdate<'_>,
    ) -> Result<Category, StoreError>;

    async fn count_categories(&self) -> Result<i64, StoreError>;
}

/// An open unit of work over the category table.
#[async_trait]
pub trait CategoryTransaction: CategoryStore {
    async fn commit(&self) -> Result<(), StoreError>;
    async fn rollback(&self) -> Result<(), StoreError>;
}

#[async_trait]
pub trait TaxonomyStore: CategoryStore {
    async fn begin(&self) -> Result<Box<dyn CategoryTransaction>, StoreError>;
}

/// App, vendor, and owner writes used by the import path.
#[async_trait]
pub trait CatalogStore: CategoryStore {
    /// Id of the owner imported apps are attributed to.
    async fn find_system_owner(&self) -> Result<Option<i64>, StoreError>;

    async fn upsert_vendor(&self, vendor: &VendorData) -> Result<i64, StoreError>;

    async fn app_exists(&self, name: &str, owner_id: i64) -> Result<bool, StoreError>;

    /// Writes the app and its initial version (when the record has one)
    /// atomically. Returns `None` when the owner already has an app with
    /// this name.
    async fn create_app_with_version(
        &self,
        record: &ImportRecord,
        placement: AppPlacement,
    ) -> Result<Option<i64>, StoreError>;
}

#[async_trait]
pub trait JobStore: Send + Sync {
    async fn create_job(&self, job_type: JobType) -> Result<Job, StoreError>;
    async fn get_job(&self, id: Uuid) -> Result<Option<Job>, StoreError>;
    async fn start_job(&self, id: Uuid) -> Result<(), StoreError>;
    async fn update_job_progress(&self, id: Uuid, progress: i32, total: i32)
        -> Result<(), StoreError>;
    async fn complete_job(&self, id: Uuid, error: Option<&str>) -> Result<(), StoreError>;
    async fn fail_job(&self, id: Uuid, message: &str) -> Result<(), StoreError>;

    /// Drops server-side prepared statements before job creation. Best effort.
    async fn reset_statements(&self) {}

    /// Confirms the backing store is reachable.
    async fn health_check(&self) -> Result<(), StoreError> {
        Ok(())
    }
}

/// Everything the server and CLI need from one backing store.
pub trait Catalog: CatalogStore + TaxonomyStore + JobStore {}

impl<T: CatalogStore + TaxonomyStore + JobStore> Catalog for T {}
