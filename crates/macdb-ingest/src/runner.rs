//! Job orchestration for catalog imports.
//!
//! A run walks the listing, collects details, then writes records in chunks
//! while keeping the job row's progress current:
//! `pending -> processing -> completed | failed`.

use std::collections::HashMap;
use std::sync::Arc;

use futures::future::join_all;
use macdb_core::{AppConfig, ImportRecord, ListingSummary, RecordFailure};
use macdb_db::AppPlacement;
use macdb_scraper::{FetchPage, ListingWalker};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::collector::DetailCollector;
use crate::error::{ImportError, StoreError};
use crate::images::ImageStore;
use crate::resolver::CategoryResolver;
use crate::store::{CatalogStore, JobStore};

/// Listing entries imported when neither a limit nor `import_all` is given.
pub const DEFAULT_IMPORT_LIMIT: usize = 100;

/// Records written concurrently per chunk.
pub const WRITE_CHUNK_SIZE: usize = 20;

const DETAILS_UNAVAILABLE: &str = "Failed to fetch or parse app details";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportOptions {
    pub limit: Option<usize>,
    #[serde(default)]
    pub import_all: bool,
}

impl ImportOptions {
    /// Listing cap for the walk; `None` walks until the first empty page.
    #[must_use]
    pub fn page_limit(self) -> Option<usize> {
        if self.import_all {
            None
        } else {
            Some(self.limit.unwrap_or(DEFAULT_IMPORT_LIMIT))
        }
    }
}

/// Counts for a finished run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportSummary {
    pub retrieved: usize,
    pub created: usize,
    pub skipped: usize,
    pub failures: Vec<RecordFailure>,
}

/// How a record's category is turned into catalog ids at write time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CategoryPolicy {
    /// Use the ids resolved during collection; a record without a top-level
    /// id is rejected.
    Collected,
    /// Resolve again from the scraped leaf id and names; records without a
    /// category are written uncategorized.
    Reresolve,
}

enum Outcome {
    Created,
    Skipped,
}

/// Per-run state shared read-only by every write in the run.
struct RunContext {
    owner_id: i64,
    vendors: HashMap<String, i64>,
}

pub struct JobRunner<S: ?Sized> {
    store: Arc<S>,
    walker: ListingWalker,
    collector: DetailCollector<S>,
    resolver: CategoryResolver<S>,
}

impl<S: CatalogStore + JobStore + ?Sized> JobRunner<S> {
    pub fn new(
        store: Arc<S>,
        walker: ListingWalker,
        fetcher: Arc<dyn FetchPage>,
        images: Arc<dyn ImageStore>,
    ) -> Self {
        let resolver = CategoryResolver::new(Arc::clone(&store));
        Self {
            collector: DetailCollector::new(fetcher, resolver.clone(), images),
            resolver,
            walker,
            store,
        }
    }

    pub fn from_config(
        store: Arc<S>,
        fetcher: Arc<dyn FetchPage>,
        images: Arc<dyn ImageStore>,
        config: &AppConfig,
    ) -> Self {
        let walker = ListingWalker::from_config(Arc::clone(&fetcher), config);
        Self::new(store, walker, fetcher, images)
    }

    /// Runs an import job to completion.
    ///
    /// Any error that escapes the run marks the job `failed` with its message
    /// before being returned.
    ///
    /// # Errors
    ///
    /// Returns [`ImportError`] when the run could not complete.
    pub async fn run(&self, job_id: Uuid, options: ImportOptions) -> Result<ImportSummary, ImportError> {
        tracing::info!(%job_id, limit = ?options.page_limit(), "import job started");
        let result = self
            .execute(job_id, options.page_limit(), CategoryPolicy::Collected)
            .await;
        self.finish(job_id, result).await
    }

    /// Imports apps from the first listing pages that are not yet in the
    /// catalog, resolving each record's category again at write time.
    ///
    /// # Errors
    ///
    /// Returns [`ImportError`] when the run could not complete.
    pub async fn run_sync_new_apps(
        &self,
        job_id: Uuid,
        limit: Option<usize>,
    ) -> Result<ImportSummary, ImportError> {
        let limit = limit.unwrap_or(DEFAULT_IMPORT_LIMIT);
        tracing::info!(%job_id, limit, "sync-new-apps job started");
        let result = self
            .execute(job_id, Some(limit), CategoryPolicy::Reresolve)
            .await;
        self.finish(job_id, result).await
    }

    async fn finish(
        &self,
        job_id: Uuid,
        result: Result<ImportSummary, ImportError>,
    ) -> Result<ImportSummary, ImportError> {
        match result {
            Ok(summary) => {
                tracing::info!(
                    %job_id,
                    retrieved = summary.retrieved,
                    created = summary.created,
                    skipped = summary.skipped,
                    failed = summary.failures.len(),
                    "job completed"
                );
                Ok(summary)
            }
            Err(e) => {
                tracing::error!(%job_id, error = %e, "job failed");
                if let Err(fail_err) = self.store.fail_job(job_id, &e.to_string()).await {
                    tracing::error!(%job_id, error = %fail_err, "could not mark job failed");
                }
                Err(e)
            }
        }
    }

    async fn execute(
        &self,
        job_id: Uuid,
        limit: Option<usize>,
        policy: CategoryPolicy,
    ) -> Result<ImportSummary, ImportError> {
        self.store.start_job(job_id).await?;

        let summaries = self.walker.walk(1, limit).await;
        if summaries.is_empty() {
            return Err(ImportError::NoAppsRetrieved);
        }
        let records = self.collector.collect_details(&summaries).await;

        let owner_id = self
            .store
            .find_system_owner()
            .await?
            .ok_or(ImportError::NoSystemOwner)?;
        let ctx = self.prepare_context(owner_id, &records).await;

        let total = i32::try_from(records.len()).unwrap_or(i32::MAX);
        self.store.update_job_progress(job_id, 0, total).await?;

        let mut summary = ImportSummary {
            retrieved: records.len(),
            ..ImportSummary::default()
        };
        let entries: Vec<(&ListingSummary, Option<ImportRecord>)> =
            summaries.iter().zip(records).collect();
        let mut processed = 0_usize;

        for chunk in entries.chunks(WRITE_CHUNK_SIZE) {
            let outcomes = join_all(
                chunk
                    .iter()
                    .map(|(listing, record)| self.import_one(&ctx, listing, record.as_ref(), policy)),
            )
            .await;

            for outcome in outcomes {
                match outcome {
                    Ok(Outcome::Created) => summary.created += 1,
                    Ok(Outcome::Skipped) => summary.skipped += 1,
                    Err(failure) => {
                        tracing::warn!(app = %failure.name, error = %failure.error, "record not imported");
                        summary.failures.push(failure);
                    }
                }
            }

            processed += chunk.len();
            let progress = i32::try_from(processed).unwrap_or(i32::MAX);
            self.store.update_job_progress(job_id, progress, total).await?;
        }

        let error = if summary.failures.is_empty() {
            None
        } else {
            Some(serde_json::to_string(&summary.failures)?)
        };
        self.store.complete_job(job_id, error.as_deref()).await?;
        Ok(summary)
    }

    /// Upserts every distinct vendor once before any app is written.
    async fn prepare_context(&self, owner_id: i64, records: &[Option<ImportRecord>]) -> RunContext {
        let mut vendors = HashMap::new();
        for vendor in records.iter().flatten().filter_map(|r| r.vendor_data.as_ref()) {
            if vendors.contains_key(&vendor.external_id) {
                continue;
            }
            match self.store.upsert_vendor(vendor).await {
                Ok(id) => {
                    vendors.insert(vendor.external_id.clone(), id);
                }
                Err(e) => {
                    tracing::warn!(vendor = %vendor.external_id, error = %e, "vendor upsert failed");
                }
            }
        }
        RunContext { owner_id, vendors }
    }

    async fn import_one(
        &self,
        ctx: &RunContext,
        listing: &ListingSummary,
        record: Option<&ImportRecord>,
        policy: CategoryPolicy,
    ) -> Result<Outcome, RecordFailure> {
        let fail = |name: &str, error: String| RecordFailure {
            name: name.to_owned(),
            error,
        };

        let Some(record) = record else {
            return Err(fail(&listing.name, DETAILS_UNAVAILABLE.to_owned()));
        };
        if let Some(field) = record.missing_required_field() {
            let tolerated = field == "category" && policy == CategoryPolicy::Reresolve;
            if !tolerated {
                return Err(fail(&listing.name, format!("Missing required field: {field}")));
            }
        }

        self.write_record(ctx, record, policy)
            .await
            .map_err(|e| fail(&record.name, e))
    }

    async fn write_record(
        &self,
        ctx: &RunContext,
        record: &ImportRecord,
        policy: CategoryPolicy,
    ) -> Result<Outcome, String> {
        let store_err = |e: StoreError| e.to_string();

        if self
            .store
            .app_exists(&record.name, ctx.owner_id)
            .await
            .map_err(store_err)?
        {
            tracing::debug!(app = %record.name, "app already exists, skipping");
            return Ok(Outcome::Skipped);
        }

        let (category_id, subcategory_id) = match policy {
            CategoryPolicy::Collected => match record.category.external_category_id {
                Some(id) => (Some(id), record.category.external_subcategory_id),
                None => {
                    return Err(format!(
                        "Category could not be resolved: {}",
                        record.category.name
                    ))
                }
            },
            CategoryPolicy::Reresolve => self.reresolve(record).await,
        };

        let placement = AppPlacement {
            owner_id: ctx.owner_id,
            vendor_id: record
                .vendor_external_id()
                .and_then(|id| ctx.vendors.get(id).copied()),
            category_id,
            subcategory_id,
        };
        let created = self
            .store
            .create_app_with_version(record, placement)
            .await
            .map_err(store_err)?;
        if created.is_none() {
            tracing::debug!(app = %record.name, "app created concurrently, skipping");
            return Ok(Outcome::Skipped);
        }
        Ok(Outcome::Created)
    }

    async fn reresolve(&self, record: &ImportRecord) -> (Option<i64>, Option<i64>) {
        let category = &record.category;
        let resolved = self
            .resolver
            .resolve(
                &category.name,
                category.parent_name.as_deref(),
                category.source_id.as_deref(),
            )
            .await;
        match resolved {
            Ok(r) if r.category_id.is_some() => (r.category_id, r.subcategory_id),
            Ok(_) => (category.external_category_id, category.external_subcategory_id),
            Err(e) => {
                tracing::warn!(app = %record.name, error = %e, "category re-resolution failed");
                (category.external_category_id, category.external_subcategory_id)
            }
        }
    }
}

#[cfg(test)]
#[path = "runner_test.rs"]
mod tests;
