use std::sync::Arc;

use clap::Subcommand;
use macdb_core::{AppConfig, CategoryChange, ChangeKind, SyncReport};
use macdb_ingest::{CategorySync, PgCatalog};
use macdb_scraper::PageFetcher;

/// Sub-commands available under `categories`.
#[derive(Debug, Subcommand)]
pub enum CategoryCommands {
    /// Show what a sync would change without writing
    Preview {
        /// App detail page carrying the taxonomy, e.g. https://www.macupdate.com/app/mac/5/rectangle
        #[arg(long)]
        source_url: String,

        /// Print the full report as JSON
        #[arg(long)]
        json: bool,
    },
    /// Create and update local categories to match the source
    Sync {
        #[arg(long)]
        source_url: String,

        #[arg(long)]
        json: bool,
    },
}

pub(crate) async fn run(
    pool: sqlx::PgPool,
    config: &AppConfig,
    command: CategoryCommands,
) -> anyhow::Result<()> {
    let fetcher = Arc::new(PageFetcher::from_config(config)?);
    let sync = CategorySync::from_config(Arc::new(PgCatalog::new(pool)), fetcher, config);

    let (report, json, verb) = match command {
        CategoryCommands::Preview { source_url, json } => {
            (sync.preview_sync(&source_url).await?, json, "would")
        }
        CategoryCommands::Sync { source_url, json } => (sync.sync(&source_url).await?, json, "did"),
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_report(&report, verb);
    }
    Ok(())
}

fn print_report(report: &SyncReport, verb: &str) {
    for change in &report.changes {
        if change.kind != ChangeKind::Unchanged {
            println!("{}", describe(change));
        }
    }
    let s = report.summary;
    println!(
        "{verb} create {}, update {}; {} unchanged, {} skipped",
        s.create, s.update, s.unchanged, s.skipped
    );
}

fn describe(change: &CategoryChange) -> String {
    let action = match change.kind {
        ChangeKind::Create => "create",
        ChangeKind::Update => "update",
        ChangeKind::Unchanged => "keep",
    };
    match &change.parent_name {
        Some(parent) => format!("{action:<7} {parent} > {}", change.name),
        None => format!("{action:<7} {}", change.name),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn subcategory_change_names_its_parent() {
        let change = CategoryChange {
            kind: ChangeKind::Create,
            name: "Notes".to_string(),
            parent_name: Some("Productivity".to_string()),
            description: None,
            old_values: None,
        };
        assert_eq!(describe(&change), "create  Productivity > Notes");
    }
}
