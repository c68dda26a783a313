use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One entry from a listing page. Lives for a single pipeline run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListingSummary {
    pub name: String,
    pub version: Option<String>,
    pub icon_url: Option<String>,
    /// Absolute URL of the app's detail page.
    pub detail_url: String,
    /// Source-site app id, when the listing exposes one.
    pub external_id: Option<String>,
}

/// Category placement of an [`ImportRecord`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordCategory {
    pub name: String,
    pub parent_name: Option<String>,
    /// Source-site id of the leaf category.
    pub source_id: Option<String>,
    /// Catalog id of the top-level category, resolved at collection time.
    pub external_category_id: Option<i64>,
    /// Catalog id of the subcategory, resolved at collection time.
    pub external_subcategory_id: Option<i64>,
}

/// Developer metadata scraped alongside an app.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VendorData {
    pub external_id: String,
    pub title: String,
    pub description: String,
    pub slug: Option<String>,
    pub logo_url: Option<String>,
}

/// Canonical, source-agnostic app record ready for the catalog write path.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportRecord {
    pub name: String,
    pub description: String,
    pub short_description: Option<String>,
    pub category: RecordCategory,
    pub website: String,
    /// Local path of the stored icon.
    pub icon: Option<String>,
    /// Local paths of stored screenshots.
    pub screenshots: Vec<String>,
    pub version: Option<String>,
    pub requirements: Option<String>,
    pub other_requirements: Option<String>,
    pub full_content: String,
    pub release_notes: Option<String>,
    pub vendor_data: Option<VendorData>,
    pub license: Option<String>,
    pub file_size: Option<String>,
    pub bundle_ids: Vec<String>,
    pub price: Option<String>,
    pub download_count: Option<i64>,
    pub is_beta: bool,
    /// Display name of the vendor when no structured vendor data exists.
    pub vendor: Option<String>,
    pub monetization: Option<String>,
    pub is_supported: bool,
    pub download_url: Option<String>,
    pub purchase_url: Option<String>,
    pub release_date: Option<DateTime<Utc>>,
    pub last_scan_date: Option<DateTime<Utc>>,
}

impl ImportRecord {
    /// Name of the first required field that is blank, if any.
    ///
    /// `name`, `description`, and `category.name` must all be non-empty for a
    /// record to be importable.
    #[must_use]
    pub fn missing_required_field(&self) -> Option<&'static str> {
        if self.name.trim().is_empty() {
            Some("name")
        } else if self.description.trim().is_empty() {
            Some("description")
        } else if self.category.name.trim().is_empty() {
            Some("category")
        } else {
            None
        }
    }

    /// External vendor id, if the record carries structured vendor data.
    #[must_use]
    pub fn vendor_external_id(&self) -> Option<&str> {
        self.vendor_data.as_ref().map(|v| v.external_id.as_str())
    }
}
