//! Reconciles the local two-level category tree with the source site's
//! published taxonomy.
//!
//! Both modes run inside one store transaction. A preview writes nothing,
//! hands out negative placeholder ids for categories it would create, and
//! always rolls back. A sync writes and commits.

use std::collections::HashSet;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use macdb_core::{AppConfig, CategoryChange, ChangeKind, ChangeOldValues, SyncReport};
use macdb_db::{CategoryUpdate, NewCategory};
use macdb_scraper::{fetch_remote_taxonomy, FetchPage, RemoteCategoryNode};

use crate::error::{StoreError, SyncError};
use crate::store::{Category, CategoryTransaction, TaxonomyStore};

/// Deepest level the catalog stores: top-level categories and their
/// subcategories.
pub const MAX_CATEGORY_DEPTH: usize = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SyncMode {
    Preview,
    Apply,
}

/// Where a node is being placed: the local id and name of its parent.
#[derive(Debug, Clone)]
struct ParentRef {
    id: i64,
    name: String,
}

struct SyncState {
    mode: SyncMode,
    report: SyncReport,
    visited: HashSet<String>,
    next_placeholder: i64,
}

impl SyncState {
    fn placeholder_id(&mut self) -> i64 {
        self.next_placeholder -= 1;
        self.next_placeholder
    }
}

pub struct CategorySync<S: ?Sized> {
    store: Arc<S>,
    fetcher: Arc<dyn FetchPage>,
    source_base_url: String,
}

impl<S: TaxonomyStore + ?Sized> CategorySync<S> {
    pub fn new(store: Arc<S>, fetcher: Arc<dyn FetchPage>, source_base_url: impl Into<String>) -> Self {
        Self {
            store,
            fetcher,
            source_base_url: source_base_url.into(),
        }
    }

    pub fn from_config(store: Arc<S>, fetcher: Arc<dyn FetchPage>, config: &AppConfig) -> Self {
        Self::new(store, fetcher, config.source_base_url.clone())
    }

    /// Reports what a sync from `source_url` would change without writing.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError`] if the source URL is rejected, the taxonomy
    /// cannot be fetched, or a store read fails.
    pub async fn preview_sync(&self, source_url: &str) -> Result<SyncReport, SyncError> {
        self.run(source_url, SyncMode::Preview).await
    }

    /// Creates and updates local categories to match `source_url`.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError`] if the source URL is rejected, the taxonomy
    /// cannot be fetched, or a store write fails. Nothing is committed on
    /// error.
    pub async fn sync(&self, source_url: &str) -> Result<SyncReport, SyncError> {
        self.run(source_url, SyncMode::Apply).await
    }

    async fn run(&self, source_url: &str, mode: SyncMode) -> Result<SyncReport, SyncError> {
        let nodes =
            fetch_remote_taxonomy(self.fetcher.as_ref(), source_url, &self.source_base_url).await?;
        tracing::info!(source_url, nodes = nodes.len(), ?mode, "category sync started");

        let tx = self.store.begin().await?;
        let mut state = SyncState {
            mode,
            report: SyncReport::default(),
            visited: HashSet::new(),
            next_placeholder: 0,
        };

        let mut outcome = Ok(());
        for node in &nodes {
            outcome = process_category(tx.as_ref(), node, None, 1, &mut state).await;
            if outcome.is_err() {
                break;
            }
        }

        match (outcome, mode) {
            (Ok(()), SyncMode::Apply) => tx.commit().await?,
            (Ok(()), SyncMode::Preview) => tx.rollback().await?,
            (Err(e), _) => {
                if let Err(rollback_err) = tx.rollback().await {
                    tracing::warn!(error = %rollback_err, "category sync rollback failed");
                }
                return Err(e.into());
            }
        }

        let summary = state.report.summary;
        tracing::info!(
            create = summary.create,
            update = summary.update,
            unchanged = summary.unchanged,
            skipped = summary.skipped,
            ?mode,
            "category sync finished"
        );
        Ok(state.report)
    }
}

/// Reconciles one node, then its children one level down.
fn process_category<'a>(
    tx: &'a dyn CategoryTransaction,
    node: &'a RemoteCategoryNode,
    parent: Option<&'a ParentRef>,
    depth: usize,
    state: &'a mut SyncState,
) -> Pin<Box<dyn Future<Output = Result<(), StoreError>> + Send + 'a>> {
    Box::pin(async move {
        if depth > MAX_CATEGORY_DEPTH {
            tracing::warn!(
                category = %node.name,
                depth,
                "category nested deeper than two levels, skipping"
            );
            state.report.record_skip();
            return Ok(());
        }

        let external_id = node.external_id();
        if !state.visited.insert(external_id.clone()) {
            tracing::warn!(category = %node.name, %external_id, "category already visited, skipping");
            state.report.record_skip();
            return Ok(());
        }

        let parent_id = parent.map(|p| p.id);
        let existing = match tx.find_category_by_external_id(&external_id).await? {
            Some(found) => Some(found),
            None => tx.find_category_by_name(&node.name, parent_id).await?,
        };

        let local_id = match existing {
            None => create(tx, node, parent, &external_id, state).await?,
            Some(found) => reconcile(tx, node, parent, &external_id, found, state).await?,
        };

        let this = ParentRef {
            id: local_id,
            name: node.name.clone(),
        };
        for child in &node.children {
            match RemoteCategoryNode::parse(child) {
                Ok(child) => process_category(tx, &child, Some(&this), depth + 1, state).await?,
                Err(reason) => {
                    tracing::warn!(parent = %node.name, %reason, "invalid category node, skipping");
                    state.report.record_skip();
                }
            }
        }
        Ok(())
    })
}

async fn create(
    tx: &dyn CategoryTransaction,
    node: &RemoteCategoryNode,
    parent: Option<&ParentRef>,
    external_id: &str,
    state: &mut SyncState,
) -> Result<i64, StoreError> {
    let id = match state.mode {
        SyncMode::Preview => state.placeholder_id(),
        SyncMode::Apply => {
            tx.create_category(NewCategory {
                name: &node.name,
                parent_id: parent.map(|p| p.id),
                external_id: Some(external_id),
                description: node.description.as_deref(),
            })
            .await?
            .id
        }
    };
    state.report.push(CategoryChange {
        kind: ChangeKind::Create,
        name: node.name.clone(),
        parent_name: parent.map(|p| p.name.clone()),
        description: node.description.clone(),
        old_values: None,
    });
    Ok(id)
}

async fn reconcile(
    tx: &dyn CategoryTransaction,
    node: &RemoteCategoryNode,
    parent: Option<&ParentRef>,
    external_id: &str,
    found: Category,
    state: &mut SyncState,
) -> Result<i64, StoreError> {
    let parent_id = parent.map(|p| p.id);
    let changed = found.description != node.description
        || found.parent_id != parent_id
        || found.external_id.as_deref() != Some(external_id);

    if !changed {
        state.report.push(CategoryChange {
            kind: ChangeKind::Unchanged,
            name: node.name.clone(),
            parent_name: parent.map(|p| p.name.clone()),
            description: node.description.clone(),
            old_values: None,
        });
        return Ok(found.id);
    }

    if state.mode == SyncMode::Apply {
        tx.update_category(
            found.id,
            CategoryUpdate {
                parent_id,
                external_id: Some(external_id),
                description: node.description.as_deref(),
            },
        )
        .await?;
    }
    state.report.push(CategoryChange {
        kind: ChangeKind::Update,
        name: node.name.clone(),
        parent_name: parent.map(|p| p.name.clone()),
        description: node.description.clone(),
        old_values: Some(ChangeOldValues {
            description: found.description,
            parent_id: found.parent_id,
            external_id: found.external_id,
        }),
    });
    Ok(found.id)
}

#[cfg(test)]
#[path = "category_sync_test.rs"]
mod tests;
