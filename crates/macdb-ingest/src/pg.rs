use async_trait::async_trait;
use macdb_core::{ImportRecord, Job, JobType, VendorData};
use macdb_db::{AppPlacement, CategoryUpdate, NewCategory};
use sqlx::{PgPool, Postgres, Transaction};
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::error::StoreError;
use crate::store::{
    CatalogStore, Category, CategoryStore, CategoryTransaction, JobStore, TaxonomyStore,
};

/// Postgres-backed catalog.
#[derive(Debug, Clone)]
pub struct PgCatalog {
    pool: PgPool,
}

impl PgCatalog {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    #[must_use]
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl CategoryStore for PgCatalog {
    async fn find_category_by_external_id(
        &self,
        external_id: &str,
    ) -> Result<Option<Category>, StoreError> {
        let mut conn = self.pool.acquire().await?;
        let row = macdb_db::find_category_by_external_id(&mut conn, external_id).await?;
        Ok(row.map(Category::from))
    }

    async fn find_category_by_name(
        &self,
        name: &str,
        parent_id: Option<i64>,
    ) -> Result<Option<Category>, StoreError> {
        let mut conn = self.pool.acquire().await?;
        let row = macdb_db::find_category_by_name(&mut conn, name, parent_id).await?;
        Ok(row.map(Category::from))
    }

    async fn get_category(&self, id: i64) -> Result<Option<Category>, StoreError> {
        let mut conn = self.pool.acquire().await?;
        let row = macdb_db::get_category(&mut conn, id).await?;
        Ok(row.map(Category::from))
    }

    async fn create_category(&self, new: NewCategory<'_>) -> Result<Category, StoreError> {
        let mut conn = self.pool.acquire().await?;
        let row = macdb_db::create_category(&mut conn, new).await?;
        Ok(row.into())
    }

    async fn update_category(
        &self,
        id: i64,
        update: CategoryUpdate<'_>,
    ) -> Result<Category, StoreError> {
        let mut conn = self.pool.acquire().await?;
        let row = macdb_db::update_category(&mut conn, id, update).await?;
        Ok(row.into())
    }

    async fn count_categories(&self) -> Result<i64, StoreError> {
        let mut conn = self.pool.acquire().await?;
        Ok(macdb_db::count_categories(&mut conn).await?)
    }
}

#[async_trait]
impl TaxonomyStore for PgCatalog {
    async fn begin(&self) -> Result<Box<dyn CategoryTransaction>, StoreError> {
        let tx = self.pool.begin().await?;
        Ok(Box::new(PgCategoryTx {
            tx: Mutex::new(Some(tx)),
        }))
    }
}

#[async_trait]
impl CatalogStore for PgCatalog {
    async fn find_system_owner(&self) -> Result<Option<i64>, StoreError> {
        let owner = macdb_db::find_system_owner(&self.pool).await?;
        Ok(owner.map(|o| o.id))
    }

    async fn upsert_vendor(&self, vendor: &VendorData) -> Result<i64, StoreError> {
        Ok(macdb_db::upsert_vendor(&self.pool, vendor).await?)
    }

    async fn app_exists(&self, name: &str, owner_id: i64) -> Result<bool, StoreError> {
        Ok(macdb_db::app_exists(&self.pool, name, owner_id).await?)
    }

    async fn create_app_with_version(
        &self,
        record: &ImportRecord,
        placement: AppPlacement,
    ) -> Result<Option<i64>, StoreError> {
        Ok(macdb_db::create_app_with_version(&self.pool, record, placement).await?)
    }
}

#[async_trait]
impl JobStore for PgCatalog {
    async fn create_job(&self, job_type: JobType) -> Result<Job, StoreError> {
        let row = macdb_db::create_job(&self.pool, job_type).await?;
        Ok(Job::try_from(row)?)
    }

    async fn get_job(&self, id: Uuid) -> Result<Option<Job>, StoreError> {
        match macdb_db::get_job(&self.pool, id).await? {
            Some(row) => Ok(Some(Job::try_from(row)?)),
            None => Ok(None),
        }
    }

    async fn start_job(&self, id: Uuid) -> Result<(), StoreError> {
        Ok(macdb_db::start_job(&self.pool, id).await?)
    }

    async fn update_job_progress(
        &self,
        id: Uuid,
        progress: i32,
        total: i32,
    ) -> Result<(), StoreError> {
        Ok(macdb_db::update_job_progress(&self.pool, id, progress, total).await?)
    }

    async fn complete_job(&self, id: Uuid, error: Option<&str>) -> Result<(), StoreError> {
        Ok(macdb_db::complete_job(&self.pool, id, error).await?)
    }

    async fn fail_job(&self, id: Uuid, message: &str) -> Result<(), StoreError> {
        Ok(macdb_db::fail_job(&self.pool, id, message).await?)
    }

    async fn reset_statements(&self) {
        macdb_db::deallocate_prepared_statements(&self.pool).await;
    }

    async fn health_check(&self) -> Result<(), StoreError> {
        Ok(macdb_db::health_check(&self.pool).await?)
    }
}

/// A category transaction on one pooled connection.
///
/// The transaction is taken out on commit or rollback; any later call fails
/// with [`StoreError::TransactionClosed`]. Dropping it unfinished rolls back.
pub struct PgCategoryTx {
    tx: Mutex<Option<Transaction<'static, Postgres>>>,
}

#[async_trait]
impl CategoryStore for PgCategoryTx {
    async fn find_category_by_external_id(
        &self,
        external_id: &str,
    ) -> Result<Option<Category>, StoreError> {
        let mut guard = self.tx.lock().await;
        let tx = guard.as_mut().ok_or(StoreError::TransactionClosed)?;
        let row = macdb_db::find_category_by_external_id(&mut **tx, external_id).await?;
        Ok(row.map(Category::from))
    }

    async fn find_category_by_name(
        &self,
        name: &str,
        parent_id: Option<i64>,
    ) -> Result<Option<Category>, StoreError> {
        let mut guard = self.tx.lock().await;
        let tx = guard.as_mut().ok_or(StoreError::TransactionClosed)?;
        let row = macdb_db::find_category_by_name(&mut **tx, name, parent_id).await?;
        Ok(row.map(Category::from))
    }

    async fn get_category(&self, id: i64) -> Result<Option<Category>, StoreError> {
        let mut guard = self.tx.lock().await;
        let tx = guard.as_mut().ok_or(StoreError::TransactionClosed)?;
        let row = macdb_db::get_category(&mut **tx, id).await?;
        Ok(row.map(Category::from))
    }

    async fn create_category(&self, new: NewCategory<'_>) -> Result<Category, StoreError> {
        let mut guard = self.tx.lock().await;
        let tx = guard.as_mut().ok_or(StoreError::TransactionClosed)?;
        let row = macdb_db::create_category(&mut **tx, new).await?;
        Ok(row.into())
    }

    async fn update_category(
        &self,
        id: i64,
        update: CategoryUpdate<'_>,
    ) -> Result<Category, StoreError> {
        let mut guard = self.tx.lock().await;
        let tx = guard.as_mut().ok_or(StoreError::TransactionClosed)?;
        let row = macdb_db::update_category(&mut **tx, id, update).await?;
        Ok(row.into())
    }

    async fn count_categories(&self) -> Result<i64, StoreError> {
        let mut guard = self.tx.lock().await;
        let tx = guard.as_mut().ok_or(StoreError::TransactionClosed)?;
        Ok(macdb_db::count_categories(&mut **tx).await?)
    }
}

#[async_trait]
impl CategoryTransaction for PgCategoryTx {
    async fn commit(&self) -> Result<(), StoreError> {
        let tx = self
            .tx
            .lock()
            .await
            .take()
            .ok_or(StoreError::TransactionClosed)?;
        tx.commit().await?;
        Ok(())
    }

    async fn rollback(&self) -> Result<(), StoreError> {
        let tx = self
            .tx
            .lock()
            .await
            .take()
            .ok_or(StoreError::TransactionClosed)?;
        tx.rollback().await?;
        Ok(())
    }
}
