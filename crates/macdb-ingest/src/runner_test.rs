use std::time::Duration;

use super::*;
use crate::memory::MemoryCatalog;
use crate::store::CategoryStore;
use crate::test_support::{next_data_page, NoImages, StaticPages, BASE_URL};
use macdb_core::JobStatus;
use serde_json::{json, Value};

fn listing_url(page: u32) -> String {
    format!("{BASE_URL}/explore?page={page}")
}

fn detail_url(id: u32) -> String {
    format!("{BASE_URL}/app/mac/{id}/app-{id}")
}

fn listing(ids: &[u32]) -> String {
    let apps: Vec<Value> = ids
        .iter()
        .map(|id| json!({"id": id, "title": format!("App {id}"), "slug": format!("app-{id}")}))
        .collect();
    next_data_page(&json!({ "apps": apps }))
}

fn detail(id: u32, category: &Value) -> String {
    next_data_page(&json!({"app": {
        "title": format!("App {id}"),
        "description": format!("<p>App {id} does things.</p>"),
        "version": "2.1",
        "category": category,
        "developer": {"id": "dev-1", "name": "Acme"},
    }}))
}

fn browsers() -> Value {
    json!({"id": 14, "name": "Browsers", "parent": {"id": 2, "name": "Internet"}})
}

/// Listing page 1 holds `ids`, page 2 is empty.
fn site(ids: &[u32]) -> StaticPages {
    StaticPages::new()
        .with(listing_url(1), listing(ids))
        .with(listing_url(2), listing(&[]))
}

fn runner(catalog: &MemoryCatalog, pages: StaticPages) -> JobRunner<MemoryCatalog> {
    let fetcher: Arc<dyn FetchPage> = Arc::new(pages);
    let walker = ListingWalker::new(Arc::clone(&fetcher), BASE_URL, "/explore", Duration::ZERO);
    JobRunner::new(Arc::new(catalog.clone()), walker, fetcher, Arc::new(NoImages))
}

async fn new_job(catalog: &MemoryCatalog, job_type: macdb_core::JobType) -> Uuid {
    catalog.create_job(job_type).await.unwrap().id
}

// ---------------------------------------------------------------------------
// Options
// ---------------------------------------------------------------------------

#[test]
fn page_limit_defaults_to_one_hundred() {
    assert_eq!(ImportOptions::default().page_limit(), Some(DEFAULT_IMPORT_LIMIT));
    let all = ImportOptions {
        limit: Some(5),
        import_all: true,
    };
    assert_eq!(all.page_limit(), None);
}

// ---------------------------------------------------------------------------
// Import
// ---------------------------------------------------------------------------

#[tokio::test]
async fn import_creates_apps_versions_and_one_vendor() {
    let catalog = MemoryCatalog::with_system_owner();
    let pages = site(&[1, 2])
        .with(detail_url(1), detail(1, &browsers()))
        .with(detail_url(2), detail(2, &browsers()));
    let job_id = new_job(&catalog, macdb_core::JobType::Import).await;

    let summary = runner(&catalog, pages)
        .run(job_id, ImportOptions::default())
        .await
        .unwrap();

    assert_eq!(summary.created, 2);
    assert!(summary.failures.is_empty());
    assert_eq!(catalog.vendor_count(), 1);
    assert_eq!(catalog.versions().len(), 2);

    let apps = catalog.apps();
    let internet = catalog.find_category_by_name("Internet", None).await.unwrap().unwrap();
    assert_eq!(apps[0].placement.category_id, Some(internet.id));
    assert!(apps[0].placement.subcategory_id.is_some());
    assert!(apps[0].placement.vendor_id.is_some());

    let job = catalog.get_job(job_id).await.unwrap().unwrap();
    assert_eq!(job.status, JobStatus::Completed);
    assert_eq!((job.progress, job.total), (2, 2));
    assert_eq!(job.error, None);
}

#[tokio::test]
async fn one_malformed_record_is_reported_and_the_rest_imported() {
    let catalog = MemoryCatalog::with_system_owner();
    let pages = site(&[1, 2, 3])
        .with(detail_url(1), detail(1, &browsers()))
        .with(detail_url(2), next_data_page(&json!({"app": {"title": "App 2"}})))
        .with(detail_url(3), detail(3, &browsers()));
    let job_id = new_job(&catalog, macdb_core::JobType::Import).await;

    let summary = runner(&catalog, pages)
        .run(job_id, ImportOptions::default())
        .await
        .unwrap();

    assert_eq!(summary.created, 2);
    assert_eq!(summary.failures.len(), 1);
    assert_eq!(summary.failures[0].name, "App 2");

    let job = catalog.get_job(job_id).await.unwrap().unwrap();
    assert_eq!(job.status, JobStatus::Completed);
    let errors: Vec<RecordFailure> = serde_json::from_str(job.error.as_deref().unwrap()).unwrap();
    assert_eq!(errors, summary.failures);
}

#[tokio::test]
async fn existing_app_is_skipped_without_error() {
    let catalog = MemoryCatalog::with_system_owner();
    let pages = site(&[1])
        .with(detail_url(1), detail(1, &browsers()));
    let runner = runner(&catalog, pages);

    let first = new_job(&catalog, macdb_core::JobType::Import).await;
    runner.run(first, ImportOptions::default()).await.unwrap();
    let second = new_job(&catalog, macdb_core::JobType::Import).await;
    let summary = runner.run(second, ImportOptions::default()).await.unwrap();

    assert_eq!(summary.created, 0);
    assert_eq!(summary.skipped, 1);
    assert!(summary.failures.is_empty());
    assert_eq!(catalog.apps().len(), 1);
}

#[tokio::test]
async fn failed_version_write_leaves_no_app_and_a_rerun_imports_it() {
    let catalog = MemoryCatalog::with_system_owner();
    let pages = site(&[1])
        .with(detail_url(1), detail(1, &browsers()));
    let runner = runner(&catalog, pages);
    catalog.fail_next_version_writes(1);

    let first = new_job(&catalog, macdb_core::JobType::Import).await;
    let summary = runner.run(first, ImportOptions::default()).await.unwrap();

    assert_eq!(summary.created, 0);
    assert_eq!(summary.failures.len(), 1);
    assert!(catalog.apps().is_empty());
    assert!(catalog.versions().is_empty());

    let second = new_job(&catalog, macdb_core::JobType::Import).await;
    let summary = runner.run(second, ImportOptions::default()).await.unwrap();

    assert_eq!(summary.created, 1);
    assert_eq!(catalog.versions().len(), 1);
    assert_eq!(catalog.versions()[0].app_id, catalog.apps()[0].id);
}

#[tokio::test]
async fn progress_is_reported_after_each_write_chunk() {
    let catalog = MemoryCatalog::with_system_owner();
    let ids: Vec<u32> = (1..=25).collect();
    let pages = ids
        .iter()
        .fold(site(&ids), |pages, &id| pages.with(detail_url(id), detail(id, &browsers())));
    let job_id = new_job(&catalog, macdb_core::JobType::Import).await;

    let summary = runner(&catalog, pages)
        .run(job_id, ImportOptions::default())
        .await
        .unwrap();

    assert_eq!(summary.created, 25);
    assert_eq!(
        catalog.progress_history(job_id),
        vec![(0, 25), (20, 25), (25, 25)]
    );
}

#[tokio::test]
async fn record_without_category_is_rejected_on_import() {
    let catalog = MemoryCatalog::with_system_owner();
    let pages = site(&[1])
        .with(detail_url(1), detail(1, &Value::Null));
    let job_id = new_job(&catalog, macdb_core::JobType::Import).await;

    let summary = runner(&catalog, pages)
        .run(job_id, ImportOptions::default())
        .await
        .unwrap();

    assert_eq!(summary.created, 0);
    assert_eq!(summary.failures.len(), 1);
    assert!(summary.failures[0].error.contains("category"));
}

#[tokio::test]
async fn empty_listing_fails_the_job() {
    let catalog = MemoryCatalog::with_system_owner();
    let job_id = new_job(&catalog, macdb_core::JobType::Import).await;

    let err = runner(&catalog, site(&[]))
        .run(job_id, ImportOptions::default())
        .await
        .unwrap_err();

    assert!(matches!(err, ImportError::NoAppsRetrieved));
    let job = catalog.get_job(job_id).await.unwrap().unwrap();
    assert_eq!(job.status, JobStatus::Failed);
    assert_eq!(job.error.as_deref(), Some("No apps retrieved"));
}

#[tokio::test]
async fn missing_system_owner_fails_the_job() {
    let catalog = MemoryCatalog::new();
    let pages = site(&[1])
        .with(detail_url(1), detail(1, &browsers()));
    let job_id = new_job(&catalog, macdb_core::JobType::Import).await;

    let err = runner(&catalog, pages)
        .run(job_id, ImportOptions::default())
        .await
        .unwrap_err();

    assert!(matches!(err, ImportError::NoSystemOwner));
    assert!(catalog.apps().is_empty());
    let job = catalog.get_job(job_id).await.unwrap().unwrap();
    assert_eq!(job.status, JobStatus::Failed);
}

#[tokio::test]
async fn job_that_is_not_pending_is_not_run() {
    let catalog = MemoryCatalog::with_system_owner();
    let job_id = new_job(&catalog, macdb_core::JobType::Import).await;
    catalog.start_job(job_id).await.unwrap();

    let pages = site(&[1]);
    let err = runner(&catalog, pages)
        .run(job_id, ImportOptions::default())
        .await
        .unwrap_err();

    assert!(matches!(err, ImportError::Store(_)));
    let job = catalog.get_job(job_id).await.unwrap().unwrap();
    assert_eq!(job.status, JobStatus::Failed);
}

// ---------------------------------------------------------------------------
// Sync new apps
// ---------------------------------------------------------------------------

#[tokio::test]
async fn sync_new_apps_writes_uncategorized_records() {
    let catalog = MemoryCatalog::with_system_owner();
    let pages = site(&[1, 2])
        .with(detail_url(1), detail(1, &Value::Null))
        .with(detail_url(2), detail(2, &json!("Games")));
    let job_id = new_job(&catalog, macdb_core::JobType::Sync).await;

    let summary = runner(&catalog, pages)
        .run_sync_new_apps(job_id, Some(10))
        .await
        .unwrap();

    assert_eq!(summary.created, 2);
    let apps = catalog.apps();
    let uncategorized = apps.iter().find(|a| a.record.name == "App 1").unwrap();
    assert_eq!(uncategorized.placement.category_id, None);
    let games = catalog.find_category_by_name("Games", None).await.unwrap().unwrap();
    let placed = apps.iter().find(|a| a.record.name == "App 2").unwrap();
    assert_eq!(placed.placement.category_id, Some(games.id));
}
