//! In-process catalog with the same semantics as the Postgres store.
//!
//! Backs the orchestrator, resolver, sync, and router tests across the
//! workspace. Clones share state.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use chrono::Utc;
use macdb_core::{ImportRecord, Job, JobStatus, JobType, VendorData};
use macdb_db::{AppPlacement, CategoryUpdate, DbError, NewCategory};
use uuid::Uuid;

use crate::error::StoreError;
use crate::store::{
    CatalogStore, Category, CategoryStore, CategoryTransaction, JobStore, TaxonomyStore,
};

/// An app row as the memory store keeps it.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredApp {
    pub id: i64,
    pub record: ImportRecord,
    pub placement: AppPlacement,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredVersion {
    pub app_id: i64,
    pub version: String,
    pub release_notes: Option<String>,
}

#[derive(Debug, Clone, Default)]
struct State {
    next_id: i64,
    categories: BTreeMap<i64, Category>,
    owners: Vec<(i64, String)>,
    vendors: HashMap<String, (i64, VendorData)>,
    apps: Vec<StoredApp>,
    versions: Vec<StoredVersion>,
    jobs: HashMap<Uuid, Job>,
    progress_history: HashMap<Uuid, Vec<(i32, i32)>>,
    job_create_conflicts: usize,
    version_write_failures: usize,
}

impl State {
    fn next_id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }

    fn by_external_id(&self, external_id: &str) -> Option<&Category> {
        self.categories
            .values()
            .find(|c| c.external_id.as_deref() == Some(external_id))
    }

    fn by_name(&self, name: &str, parent_id: Option<i64>) -> Option<&Category> {
        self.categories
            .values()
            .find(|c| c.name == name && c.parent_id == parent_id)
    }

    fn check_parent(&self, name: &str, id: Option<i64>, parent_id: i64) -> Result<(), StoreError> {
        let invalid = || StoreError::InvalidHierarchy {
            name: name.to_owned(),
            parent_id,
        };
        let parent = self
            .categories
            .get(&parent_id)
            .ok_or_else(|| StoreError::NotFound {
                entity: "category",
                id: parent_id.to_string(),
            })?;
        if parent.parent_id.is_some() || id == Some(parent_id) {
            return Err(invalid());
        }
        if let Some(id) = id {
            if self.categories.values().any(|c| c.parent_id == Some(id)) {
                return Err(invalid());
            }
        }
        Ok(())
    }

    fn create_category(&mut self, new: NewCategory<'_>) -> Result<Category, StoreError> {
        if let Some(existing) = new.external_id.and_then(|e| self.by_external_id(e)) {
            return Ok(existing.clone());
        }
        if let Some(existing) = self.by_name(new.name, new.parent_id) {
            return Ok(existing.clone());
        }
        if let Some(parent_id) = new.parent_id {
            self.check_parent(new.name, None, parent_id)?;
        }
        let category = Category {
            id: self.next_id(),
            name: new.name.to_owned(),
            parent_id: new.parent_id,
            external_id: new.external_id.map(str::to_owned),
            description: new.description.map(str::to_owned),
        };
        self.categories.insert(category.id, category.clone());
        Ok(category)
    }

    fn update_category(&mut self, id: i64, update: CategoryUpdate<'_>) -> Result<Category, StoreError> {
        let name = self
            .categories
            .get(&id)
            .map(|c| c.name.clone())
            .ok_or(StoreError::Db(DbError::NotFound))?;
        if let Some(parent_id) = update.parent_id {
            self.check_parent(&name, Some(id), parent_id)?;
        }
        let category = self
            .categories
            .get_mut(&id)
            .ok_or(StoreError::Db(DbError::NotFound))?;
        category.parent_id = update.parent_id;
        category.external_id = update.external_id.map(str::to_owned);
        category.description = update.description.map(str::to_owned);
        Ok(category.clone())
    }

    fn transition(
        &mut self,
        id: Uuid,
        allowed: &[JobStatus],
        expected_status: &'static str,
        apply: impl FnOnce(&mut Job),
    ) -> Result<(), StoreError> {
        match self.jobs.get_mut(&id) {
            Some(job) if allowed.contains(&job.status) => {
                apply(job);
                job.updated_at = Utc::now();
                Ok(())
            }
            _ => Err(StoreError::Db(DbError::InvalidJobTransition {
                id,
                expected_status,
            })),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct MemoryCatalog {
    state: Arc<Mutex<State>>,
}

impl MemoryCatalog {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A catalog with one `system` owner already present.
    #[must_use]
    pub fn with_system_owner() -> Self {
        let catalog = Self::new();
        catalog.add_owner("system");
        catalog
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn add_owner(&self, role: &str) -> i64 {
        let mut state = self.lock();
        let id = state.next_id();
        state.owners.push((id, role.to_owned()));
        id
    }

    /// Makes the next `n` job creations fail with a retryable conflict.
    pub fn fail_next_job_creates(&self, n: usize) {
        self.lock().job_create_conflicts = n;
    }

    /// Makes the next `n` app writes that carry a version fail on the
    /// version insert. Nothing from a failed write is kept.
    pub fn fail_next_version_writes(&self, n: usize) {
        self.lock().version_write_failures = n;
    }

    /// Every `(progress, total)` pair recorded for `job_id`, oldest first.
    #[must_use]
    pub fn progress_history(&self, job_id: Uuid) -> Vec<(i32, i32)> {
        self.lock()
            .progress_history
            .get(&job_id)
            .cloned()
            .unwrap_or_default()
    }

    #[must_use]
    pub fn apps(&self) -> Vec<StoredApp> {
        self.lock().apps.clone()
    }

    #[must_use]
    pub fn versions(&self) -> Vec<StoredVersion> {
        self.lock().versions.clone()
    }

    /// All categories ordered by id.
    #[must_use]
    pub fn categories(&self) -> Vec<Category> {
        self.lock().categories.values().cloned().collect()
    }

    #[must_use]
    pub fn vendor_count(&self) -> usize {
        self.lock().vendors.len()
    }

    fn snapshot(&self) -> State {
        self.lock().clone()
    }
}

#[async_trait]
impl CategoryStore for MemoryCatalog {
    async fn find_category_by_external_id(
        &self,
        external_id: &str,
    ) -> Result<Option<Category>, StoreError> {
        Ok(self.lock().by_external_id(external_id).cloned())
    }

    async fn find_category_by_name(
        &self,
        name: &str,
        parent_id: Option<i64>,
    ) -> Result<Option<Category>, StoreError> {
        Ok(self.lock().by_name(name, parent_id).cloned())
    }

    async fn get_category(&self, id: i64) -> Result<Option<Category>, StoreError> {
        Ok(self.lock().categories.get(&id).cloned())
    }

    async fn create_category(&self, new: NewCategory<'_>) -> Result<Category, StoreError> {
        self.lock().create_category(new)
    }

    async fn update_category(
        &self,
        id: i64,
        update: CategoryUpdate<'_>,
    ) -> Result<Category, StoreError> {
        self.lock().update_category(id, update)
    }

    async fn count_categories(&self) -> Result<i64, StoreError> {
        Ok(i64::try_from(self.lock().categories.len()).unwrap_or(i64::MAX))
    }
}

#[async_trait]
impl TaxonomyStore for MemoryCatalog {
    async fn begin(&self) -> Result<Box<dyn CategoryTransaction>, StoreError> {
        Ok(Box::new(MemoryTx {
            parent: self.clone(),
            working: MemoryCatalog {
                state: Arc::new(Mutex::new(self.snapshot())),
            },
            finished: AtomicBool::new(false),
        }))
    }
}

#[async_trait]
impl CatalogStore for MemoryCatalog {
    async fn find_system_owner(&self) -> Result<Option<i64>, StoreError> {
        let state = self.lock();
        let owner = ["system", "admin"]
            .iter()
            .find_map(|role| state.owners.iter().find(|(_, r)| r == role))
            .map(|(id, _)| *id);
        Ok(owner)
    }

    async fn upsert_vendor(&self, vendor: &VendorData) -> Result<i64, StoreError> {
        let mut state = self.lock();
        if let Some((id, stored)) = state.vendors.get_mut(&vendor.external_id) {
            let logo_url = vendor.logo_url.clone().or_else(|| stored.logo_url.take());
            *stored = VendorData {
                logo_url,
                ..vendor.clone()
            };
            return Ok(*id);
        }
        let id = state.next_id();
        state
            .vendors
            .insert(vendor.external_id.clone(), (id, vendor.clone()));
        Ok(id)
    }

    async fn app_exists(&self, name: &str, owner_id: i64) -> Result<bool, StoreError> {
        Ok(self
            .lock()
            .apps
            .iter()
            .any(|a| a.record.name == name && a.placement.owner_id == owner_id))
    }

    async fn create_app_with_version(
        &self,
        record: &ImportRecord,
        placement: AppPlacement,
    ) -> Result<Option<i64>, StoreError> {
        let mut state = self.lock();
        if state
            .apps
            .iter()
            .any(|a| a.record.name == record.name && a.placement.owner_id == placement.owner_id)
        {
            return Ok(None);
        }
        let version = record.version.as_deref().filter(|v| !v.trim().is_empty());
        if version.is_some() && state.version_write_failures > 0 {
            state.version_write_failures -= 1;
            return Err(sqlx::Error::Protocol("version insert rejected".into()).into());
        }

        let id = state.next_id();
        state.apps.push(StoredApp {
            id,
            record: record.clone(),
            placement,
        });
        if let Some(version) = version {
            state.versions.push(StoredVersion {
                app_id: id,
                version: version.to_owned(),
                release_notes: record.release_notes.clone(),
            });
        }
        Ok(Some(id))
    }
}

#[async_trait]
impl JobStore for MemoryCatalog {
    async fn create_job(&self, job_type: JobType) -> Result<Job, StoreError> {
        let mut state = self.lock();
        if state.job_create_conflicts > 0 {
            state.job_create_conflicts -= 1;
            return Err(StoreError::Conflict("prepared statement already exists".into()));
        }
        let now = Utc::now();
        let job = Job {
            id: Uuid::new_v4(),
            job_type,
            status: JobStatus::Pending,
            progress: 0,
            total: 0,
            error: None,
            created_at: now,
            updated_at: now,
        };
        state.jobs.insert(job.id, job.clone());
        Ok(job)
    }

    async fn get_job(&self, id: Uuid) -> Result<Option<Job>, StoreError> {
        Ok(self.lock().jobs.get(&id).cloned())
    }

    async fn start_job(&self, id: Uuid) -> Result<(), StoreError> {
        self.lock()
            .transition(id, &[JobStatus::Pending], "pending", |job| {
                job.status = JobStatus::Processing;
            })
    }

    async fn update_job_progress(
        &self,
        id: Uuid,
        progress: i32,
        total: i32,
    ) -> Result<(), StoreError> {
        let mut guard = self.lock();
        let state = &mut *guard;
        if let Some(job) = state.jobs.get_mut(&id) {
            if job.status == JobStatus::Processing {
                job.progress = progress;
                job.total = total;
                job.updated_at = Utc::now();
                state
                    .progress_history
                    .entry(id)
                    .or_default()
                    .push((progress, total));
            }
        }
        Ok(())
    }

    async fn complete_job(&self, id: Uuid, error: Option<&str>) -> Result<(), StoreError> {
        self.lock()
            .transition(id, &[JobStatus::Processing], "processing", |job| {
                job.status = JobStatus::Completed;
                job.error = error.map(str::to_owned);
            })
    }

    async fn fail_job(&self, id: Uuid, message: &str) -> Result<(), StoreError> {
        self.lock().transition(
            id,
            &[JobStatus::Pending, JobStatus::Processing],
            "pending or processing",
            |job| {
                job.status = JobStatus::Failed;
                job.error = Some(message.to_owned());
            },
        )
    }
}

/// Works on a private copy of the catalog; commit swaps it in.
struct MemoryTx {
    parent: MemoryCatalog,
    working: MemoryCatalog,
    finished: AtomicBool,
}

impl MemoryTx {
    fn open(&self) -> Result<&MemoryCatalog, StoreError> {
        if self.finished.load(Ordering::SeqCst) {
            Err(StoreError::TransactionClosed)
        } else {
            Ok(&self.working)
        }
    }

    fn finish(&self) -> Result<(), StoreError> {
        if self.finished.swap(true, Ordering::SeqCst) {
            Err(StoreError::TransactionClosed)
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl CategoryStore for MemoryTx {
    async fn find_category_by_external_id(
        &self,
        external_id: &str,
    ) -> Result<Option<Category>, StoreError> {
        self.open()?.find_category_by_external_id(external_id).await
    }

    async fn find_category_by_name(
        &self,
        name: &str,
        parent_id: Option<i64>,
    ) -> Result<Option<Category>, StoreError> {
        self.open()?.find_category_by_name(name, parent_id).await
    }

    async fn get_category(&self, id: i64) -> Result<Option<Category>, StoreError> {
        self.open()?.get_category(id).await
    }

    async fn create_category(&self, new: NewCategory<'_>) -> Result<Category, StoreError> {
        self.open()?.create_category(new).await
    }

    async fn update_category(
        &self,
        id: i64,
        update: CategoryUpdate<'_>,
    ) -> Result<Category, StoreError> {
        self.open()?.update_category(id, update).await
    }

    async fn count_categories(&self) -> Result<i64, StoreError> {
        self.open()?.count_categories().await
    }
}

#[async_trait]
impl CategoryTransaction for MemoryTx {
    async fn commit(&self) -> Result<(), StoreError> {
        self.finish()?;
        // Only the category table is transactional.
        let working = self.working.snapshot();
        let mut state = self.parent.lock();
        state.categories = working.categories;
        state.next_id = state.next_id.max(working.next_id);
        Ok(())
    }

    async fn rollback(&self) -> Result<(), StoreError> {
        self.finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn top(name: &str) -> NewCategory<'_> {
        NewCategory {
            name,
            parent_id: None,
            external_id: None,
            description: None,
        }
    }

    #[tokio::test]
    async fn third_level_category_is_rejected() {
        let catalog = MemoryCatalog::new();
        let parent = catalog.create_category(top("Audio")).await.unwrap();
        let child = catalog
            .create_category(NewCategory {
                parent_id: Some(parent.id),
                ..top("Editors")
            })
            .await
            .unwrap();

        let err = catalog
            .create_category(NewCategory {
                parent_id: Some(child.id),
                ..top("Plugins")
            })
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::InvalidHierarchy { .. }));
    }

    #[tokio::test]
    async fn rollback_discards_transaction_writes() {
        let catalog = MemoryCatalog::new();
        let tx = catalog.begin().await.unwrap();
        tx.create_category(top("Audio")).await.unwrap();
        assert_eq!(tx.count_categories().await.unwrap(), 1);
        tx.rollback().await.unwrap();

        assert_eq!(catalog.count_categories().await.unwrap(), 0);
        assert!(matches!(
            tx.count_categories().await.unwrap_err(),
            StoreError::TransactionClosed
        ));
    }

    #[tokio::test]
    async fn commit_publishes_transaction_writes() {
        let catalog = MemoryCatalog::new();
        let tx = catalog.begin().await.unwrap();
        tx.create_category(top("Audio")).await.unwrap();
        tx.commit().await.unwrap();

        assert_eq!(catalog.categories().len(), 1);
    }

    #[tokio::test]
    async fn admin_owner_is_used_when_no_system_owner() {
        let catalog = MemoryCatalog::new();
        assert_eq!(catalog.find_system_owner().await.unwrap(), None);
        let admin = catalog.add_owner("admin");
        assert_eq!(catalog.find_system_owner().await.unwrap(), Some(admin));
        let system = catalog.add_owner("system");
        assert_eq!(catalog.find_system_owner().await.unwrap(), Some(system));
    }
}
