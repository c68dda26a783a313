use std::sync::LazyLock;

use scraper::{Html, Selector};
use serde_json::Value;

use super::{ExtractedApp, ExtractionSource, Extractor, RawCategory};
use crate::fields::{first_non_empty, first_str, scalar_string};

static NEXT_DATA: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("script#__NEXT_DATA__").expect("valid selector"));

/// Candidate locations of the app object, newest payload shape first.
const APP_PATHS: &[&str] = &[
    "props.pageProps.app",
    "props.pageProps.data.app",
    "props.pageProps.initialState.app.data",
    "props.pageProps.appData",
];

/// Candidate locations of a listing page's app array.
const LISTING_PATHS: &[&str] = &[
    "props.pageProps.apps",
    "props.pageProps.data.apps",
    "props.pageProps.initialState.apps.data",
    "props.pageProps.list.items",
];

/// Candidate locations of the category tree.
const CATEGORY_PATHS: &[&str] = &[
    "props.pageProps.categories",
    "props.pageProps.data.categories",
    "props.pageProps.initialState.categories.data",
];

/// The sub-objects of interest found in a page's embedded data blob.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StructuredPayload {
    pub app: Option<Value>,
    pub apps: Option<Vec<Value>>,
    pub categories: Option<Value>,
}

impl StructuredPayload {
    /// Parses the `__NEXT_DATA__` script of `html`.
    ///
    /// Returns `None` when the tag is absent or its contents are not JSON.
    /// A parsed blob with none of the known paths populated still yields a
    /// payload with every field `None`.
    #[must_use]
    pub fn extract(html: &str) -> Option<Self> {
        let document = Html::parse_document(html);
        let raw: String = document.select(&NEXT_DATA).next()?.text().collect();
        let root: Value = match serde_json::from_str(raw.trim()) {
            Ok(root) => root,
            Err(e) => {
                tracing::debug!(error = %e, "embedded page data is not valid JSON");
                return None;
            }
        };

        Some(Self {
            app: first_non_empty(&root, APP_PATHS)
                .filter(|v| v.is_object())
                .cloned(),
            apps: first_non_empty(&root, LISTING_PATHS)
                .and_then(Value::as_array)
                .cloned(),
            categories: first_non_empty(&root, CATEGORY_PATHS).cloned(),
        })
    }
}

/// Reads the app object out of the embedded data blob.
#[derive(Debug, Clone, Copy, Default)]
pub struct StructuredPayloadExtractor;

impl Extractor for StructuredPayloadExtractor {
    fn extract_app(&self, html: &str) -> Option<ExtractedApp> {
        let app = StructuredPayload::extract(html)?.app?;
        Some(ExtractedApp {
            source: ExtractionSource::Structured,
            name: first_str(&app, &["title", "name"]),
            description: first_str(&app, &["description", "long_description", "body"]),
            version: first_str(&app, &["version", "latest_version", "current_version.version"]),
            category: category_from_app(&app),
            details: app,
        })
    }
}

/// Category placement of a structured app object.
///
/// Handles a nested `category` object (optionally with a `parent`), a
/// separate `subcategory` object, and a `categories` array whose first entry
/// is the most specific.
pub(crate) fn category_from_app(app: &Value) -> Option<RawCategory> {
    let category = app
        .get("category")
        .filter(|c| c.is_object() || c.is_string())
        .or_else(|| app.get("categories").and_then(|c| c.as_array()?.first()));
    let subcategory = app.get("subcategory").filter(|c| c.is_object());

    match (category, subcategory) {
        (Some(parent), Some(child)) => {
            let name = node_name(child)?;
            Some(RawCategory {
                name,
                parent_name: node_name(parent),
                source_id: child.get("id").and_then(scalar_string),
            })
        }
        (Some(node), None) => {
            let name = node_name(node)?;
            let parent_name = node
                .get("parent")
                .and_then(node_name)
                .or_else(|| first_str(node, &["parent_name", "parentName"]))
                .or_else(|| app.get("parent_category").and_then(node_name));
            Some(RawCategory {
                name,
                parent_name,
                source_id: node.get("id").and_then(scalar_string),
            })
        }
        (None, Some(child)) => Some(RawCategory {
            name: node_name(child)?,
            parent_name: None,
            source_id: child.get("id").and_then(scalar_string),
        }),
        (None, None) => None,
    }
}

fn node_name(node: &Value) -> Option<String> {
    match node {
        Value::String(_) => scalar_string(node),
        _ => first_str(node, &["name", "title"]),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn page(data: &Value) -> String {
        format!(
            r#"<html><head></head><body><div id="__next"></div>
<script id="__NEXT_DATA__" type="application/json">{data}</script></body></html>"#
        )
    }

    #[test]
    fn extract_returns_none_without_script_tag() {
        assert!(StructuredPayload::extract("<html><body><h1>Hi</h1></body></html>").is_none());
    }

    #[test]
    fn extract_returns_none_for_malformed_json() {
        let html = r#"<script id="__NEXT_DATA__" type="application/json">{"props": </script>"#;
        assert!(StructuredPayload::extract(html).is_none());
    }

    #[test]
    fn first_non_empty_app_path_wins() {
        let data = json!({"props": {"pageProps": {
            "app": {},
            "data": {"app": {"title": "Rectangle"}},
            "appData": {"title": "Stale"}
        }}});
        let payload = StructuredPayload::extract(&page(&data)).unwrap();
        assert_eq!(payload.app.unwrap()["title"], "Rectangle");
        assert!(payload.apps.is_none());
    }

    #[test]
    fn listing_and_category_paths_are_read() {
        let data = json!({"props": {"pageProps": {
            "initialState": {
                "apps": {"data": [{"title": "A"}, {"title": "B"}]},
                "categories": {"data": [{"id": 1, "name": "Audio"}]}
            }
        }}});
        let payload = StructuredPayload::extract(&page(&data)).unwrap();
        assert_eq!(payload.apps.unwrap().len(), 2);
        assert_eq!(payload.categories.unwrap()[0]["name"], "Audio");
    }

    #[test]
    fn extractor_reads_minimal_fields_and_nested_category() {
        let data = json!({"props": {"pageProps": {"app": {
            "title": "Rectangle",
            "description": "<p>Move and resize windows.</p>",
            "version": "0.80",
            "category": {"id": 17, "name": "Window Management",
                         "parent": {"id": 3, "name": "Productivity"}}
        }}}});
        let app = StructuredPayloadExtractor.extract_app(&page(&data)).unwrap();
        assert_eq!(app.source, ExtractionSource::Structured);
        assert_eq!(app.name.as_deref(), Some("Rectangle"));
        assert_eq!(app.version.as_deref(), Some("0.80"));
        assert_eq!(
            app.category,
            Some(RawCategory {
                name: "Window Management".to_owned(),
                parent_name: Some("Productivity".to_owned()),
                source_id: Some("17".to_owned()),
            })
        );
        assert!(app.is_complete());
    }

    #[test]
    fn separate_subcategory_object_is_the_leaf() {
        let app = json!({
            "category": {"id": 3, "name": "Productivity"},
            "subcategory": {"id": 17, "name": "Window Management"}
        });
        let category = category_from_app(&app).unwrap();
        assert_eq!(category.name, "Window Management");
        assert_eq!(category.parent_name.as_deref(), Some("Productivity"));
        assert_eq!(category.source_id.as_deref(), Some("17"));
    }

    #[test]
    fn categories_array_and_plain_string_are_accepted() {
        let from_array = category_from_app(&json!({"categories": [{"name": "Audio"}]})).unwrap();
        assert_eq!(from_array.name, "Audio");
        let from_string = category_from_app(&json!({"category": "Video"})).unwrap();
        assert_eq!(from_string.name, "Video");
        assert!(category_from_app(&json!({"title": "x"})).is_none());
    }
}
