//! Import, sync-new-apps, and job inspection handlers.
//!
//! Runs happen in the foreground: the job row is created and driven to a
//! terminal state before the command returns, so the same row a server
//! trigger would produce is left behind for later inspection.

use std::sync::Arc;

use clap::Subcommand;
use macdb_core::{AppConfig, Job, JobType};
use macdb_ingest::{
    create_job_with_retry, ImportOptions, ImportSummary, JobRunner, LocalImageStore, PgCatalog,
    JOB_CREATE_RETRY_DELAY,
};
use macdb_scraper::PageFetcher;
use uuid::Uuid;

#[derive(Debug, Subcommand)]
pub enum JobCommands {
    /// Show one job
    Status { id: Uuid },
    /// Show the most recent jobs
    List {
        #[arg(long, default_value_t = 20)]
        limit: i64,
    },
}

fn build_runner(catalog: &Arc<PgCatalog>, config: &AppConfig) -> anyhow::Result<JobRunner<PgCatalog>> {
    let fetcher = Arc::new(PageFetcher::from_config(config)?);
    let images = Arc::new(LocalImageStore::from_config(config)?);
    Ok(JobRunner::from_config(
        Arc::clone(catalog),
        fetcher,
        images,
        config,
    ))
}

pub(crate) async fn run_import(
    pool: sqlx::PgPool,
    config: &AppConfig,
    limit: Option<usize>,
    import_all: bool,
) -> anyhow::Result<()> {
    let catalog = Arc::new(PgCatalog::new(pool));
    let runner = build_runner(&catalog, config)?;

    let job = create_job_with_retry(catalog.as_ref(), JobType::Import, JOB_CREATE_RETRY_DELAY).await?;
    println!("import job {} started", job.id);

    let summary = runner.run(job.id, ImportOptions { limit, import_all }).await?;
    print_summary(job.id, &summary);
    Ok(())
}

pub(crate) async fn run_sync_new_apps(
    pool: sqlx::PgPool,
    config: &AppConfig,
    limit: Option<usize>,
) -> anyhow::Result<()> {
    let catalog = Arc::new(PgCatalog::new(pool));
    let runner = build_runner(&catalog, config)?;

    let job = create_job_with_retry(catalog.as_ref(), JobType::Sync, JOB_CREATE_RETRY_DELAY).await?;
    println!("sync-new-apps job {} started", job.id);

    let summary = runner.run_sync_new_apps(job.id, limit).await?;
    print_summary(job.id, &summary);
    Ok(())
}

pub(crate) async fn run_job_command(pool: &sqlx::PgPool, command: JobCommands) -> anyhow::Result<()> {
    match command {
        JobCommands::Status { id } => {
            let row = macdb_db::get_job(pool, id)
                .await?
                .ok_or_else(|| anyhow::anyhow!("job {id} not found"))?;
            let job = Job::try_from(row)?;
            println!("{}", format_job(&job));
            if let Some(error) = &job.error {
                println!("  error: {error}");
            }
        }
        JobCommands::List { limit } => {
            let rows = macdb_db::list_jobs(pool, limit.max(1)).await?;
            if rows.is_empty() {
                println!("no jobs recorded");
            }
            for row in rows {
                println!("{}", format_job(&Job::try_from(row)?));
            }
        }
    }
    Ok(())
}

fn print_summary(job_id: Uuid, summary: &ImportSummary) {
    println!(
        "job {job_id}: {} retrieved, {} created, {} skipped, {} failed",
        summary.retrieved,
        summary.created,
        summary.skipped,
        summary.failures.len()
    );
    for failure in &summary.failures {
        println!("  {}: {}", failure.name, failure.error);
    }
}

fn format_job(job: &Job) -> String {
    format!(
        "{id}  {kind:<6}  {status:<10}  {progress}/{total}  {created}",
        id = job.id,
        kind = job.job_type.as_str(),
        status = job.status.as_str(),
        progress = job.progress,
        total = job.total,
        created = job.created_at.format("%Y-%m-%d %H:%M:%S UTC"),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use macdb_core::JobStatus;

    #[test]
    fn job_line_shows_type_status_and_progress() {
        let at = Utc.with_ymd_and_hms(2025, 3, 1, 12, 30, 0).unwrap();
        let job = Job {
            id: Uuid::nil(),
            job_type: JobType::Import,
            status: JobStatus::Processing,
            progress: 40,
            total: 100,
            error: None,
            created_at: at,
            updated_at: at,
        };

        let line = format_job(&job);

        assert!(line.contains("import"));
        assert!(line.contains("processing"));
        assert!(line.contains("40/100"));
        assert!(line.ends_with("2025-03-01 12:30:00 UTC"));
    }
}
