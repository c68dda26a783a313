//! Change report produced by category synchronization.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeKind {
    Create,
    Update,
    Unchanged,
}

/// Stored values of a category before an update was applied.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangeOldValues {
    pub description: Option<String>,
    pub parent_id: Option<i64>,
    pub external_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CategoryChange {
    #[serde(rename = "type")]
    pub kind: ChangeKind,
    pub name: String,
    pub parent_name: Option<String>,
    pub description: Option<String>,
    pub old_values: Option<ChangeOldValues>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncSummary {
    pub create: usize,
    pub update: usize,
    pub unchanged: usize,
    /// Remote nodes dropped by validation, cycle, or depth checks.
    pub skipped: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncReport {
    pub changes: Vec<CategoryChange>,
    pub summary: SyncSummary,
}

impl SyncReport {
    pub fn push(&mut self, change: CategoryChange) {
        match change.kind {
            ChangeKind::Create => self.summary.create += 1,
            ChangeKind::Update => self.summary.update += 1,
            ChangeKind::Unchanged => self.summary.unchanged += 1,
        }
        self.changes.push(change);
    }

    pub fn record_skip(&mut self) {
        self.summary.skipped += 1;
    }
}
