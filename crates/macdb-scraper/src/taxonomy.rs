//! Remote category tree, read from an app detail page's embedded data.

use std::sync::LazyLock;

use regex::Regex;
use serde_json::Value;

use crate::client::FetchPage;
use crate::error::ScraperError;
use crate::extract::StructuredPayload;

static DETAIL_PATH_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^/app/mac/\d+/[A-Za-z0-9._-]+/?$").expect("valid regex"));

/// One category node as published by the source site.
///
/// `children` are kept raw so each one is validated (and possibly skipped)
/// at the point it is visited.
#[derive(Debug, Clone, PartialEq)]
pub struct RemoteCategoryNode {
    pub id: i64,
    pub parent_id: Option<i64>,
    pub slug: String,
    pub name: String,
    pub description: Option<String>,
    pub url: String,
    pub children: Vec<Value>,
}

impl RemoteCategoryNode {
    /// Validates the node's shape: integer `id`, non-blank string `name`,
    /// string `slug` and `url`, integer-or-null `parent_id`, string-or-null
    /// `description`, and array-or-absent `children`.
    ///
    /// # Errors
    ///
    /// Returns a short description of the first field that fails.
    pub fn parse(value: &Value) -> Result<Self, String> {
        let obj = value.as_object().ok_or("node is not an object")?;

        let id = obj
            .get("id")
            .and_then(Value::as_i64)
            .ok_or("id must be an integer")?;
        let name = obj
            .get("name")
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|n| !n.is_empty())
            .ok_or("name must be a non-empty string")?
            .to_owned();
        let slug = obj
            .get("slug")
            .and_then(Value::as_str)
            .ok_or("slug must be a string")?
            .to_owned();
        let url = obj
            .get("url")
            .and_then(Value::as_str)
            .ok_or("url must be a string")?
            .to_owned();
        let parent_id = match obj.get("parent_id") {
            None | Some(Value::Null) => None,
            Some(v) => Some(v.as_i64().ok_or("parent_id must be an integer or null")?),
        };
        let description = match obj.get("description") {
            None | Some(Value::Null) => None,
            Some(Value::String(s)) => Some(s.trim().to_owned()).filter(|s| !s.is_empty()),
            Some(_) => return Err("description must be a string or null".to_owned()),
        };
        let children = match obj.get("children") {
            None | Some(Value::Null) => Vec::new(),
            Some(Value::Array(items)) => items.clone(),
            Some(_) => return Err("children must be an array".to_owned()),
        };

        Ok(Self {
            id,
            parent_id,
            slug,
            name,
            description,
            url,
            children,
        })
    }

    /// Source id as stored in a category's `external_id`.
    #[must_use]
    pub fn external_id(&self) -> String {
        self.id.to_string()
    }
}

/// Checks that `source_url` is an app detail page on the source host.
///
/// # Errors
///
/// Returns [`ScraperError::InvalidUrl`] describing the mismatch.
pub fn validate_source_url(source_url: &str, source_base_url: &str) -> Result<(), ScraperError> {
    let invalid = |reason: &str| ScraperError::InvalidUrl {
        url: source_url.to_owned(),
        reason: reason.to_owned(),
    };

    let url = reqwest::Url::parse(source_url.trim()).map_err(|e| invalid(&e.to_string()))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(invalid("scheme must be http or https"));
    }
    let expected = reqwest::Url::parse(source_base_url)
        .ok()
        .and_then(|u| u.host_str().map(bare_host))
        .ok_or_else(|| invalid("source base URL has no host"))?;
    let host = url.host_str().map(bare_host).unwrap_or_default();
    if host != expected {
        return Err(invalid(&format!("host must be {expected}")));
    }
    if !DETAIL_PATH_RE.is_match(url.path()) {
        return Err(invalid("path must look like /app/mac/<id>/<slug>"));
    }
    Ok(())
}

fn bare_host(host: &str) -> String {
    host.trim_start_matches("www.").to_ascii_lowercase()
}

/// Fetches `source_url` and returns the valid top-level category nodes from
/// its embedded data.
///
/// Invalid top-level nodes are logged and dropped.
///
/// # Errors
///
/// - [`ScraperError::InvalidUrl`] when the URL is not a detail page on the
///   source host.
/// - Any fetch error from `fetcher`.
/// - [`ScraperError::MissingPayload`] when the page carries no category tree.
/// - [`ScraperError::NoValidCategories`] when every top-level node is invalid.
pub async fn fetch_remote_taxonomy(
    fetcher: &dyn FetchPage,
    source_url: &str,
    source_base_url: &str,
) -> Result<Vec<RemoteCategoryNode>, ScraperError> {
    validate_source_url(source_url, source_base_url)?;
    let html = fetcher.fetch(source_url).await?;

    let tree = StructuredPayload::extract(&html)
        .and_then(|p| p.categories)
        .ok_or_else(|| ScraperError::MissingPayload {
            url: source_url.to_owned(),
        })?;
    let nodes = top_level_nodes(&tree);

    let valid: Vec<RemoteCategoryNode> = nodes
        .iter()
        .filter_map(|node| match RemoteCategoryNode::parse(node) {
            Ok(parsed) => Some(parsed),
            Err(reason) => {
                tracing::warn!(reason = %reason, "skipping invalid top-level category node");
                None
            }
        })
        .collect();

    if valid.is_empty() {
        return Err(ScraperError::NoValidCategories {
            url: source_url.to_owned(),
        });
    }
    tracing::info!(url = source_url, count = valid.len(), "fetched remote taxonomy");
    Ok(valid)
}

/// The top-level node list of a category tree: the tree itself when it is
/// an array, else its `children`/`items` array, else a single root node.
fn top_level_nodes(tree: &Value) -> Vec<Value> {
    match tree {
        Value::Array(items) => items.clone(),
        Value::Object(obj) => ["children", "items", "data"]
            .iter()
            .find_map(|k| obj.get(*k).and_then(Value::as_array))
            .cloned()
            .unwrap_or_else(|| vec![tree.clone()]),
        _ => Vec::new(),
    }
}
