use scraper::{Html, Selector};
use serde_json::{Map, Value};

use super::{ExtractedApp, ExtractionSource, Extractor, RawCategory};

const NAME_SELECTORS: &[&str] = &[
    r#"h1[itemprop="name"]"#,
    r#"[data-testid="app-title"]"#,
    "h1.app-title",
    "h1",
];

const DESCRIPTION_SELECTORS: &[&str] = &[
    r#"[itemprop="description"]"#,
    r#"[data-testid="app-description"]"#,
    ".app-description",
    "#description",
];

const VERSION_SELECTORS: &[&str] = &[
    r#"[itemprop="softwareVersion"]"#,
    r#"[data-testid="app-version"]"#,
    ".app-version",
    ".version",
];

const BREADCRUMB_SELECTORS: &[&str] = &[
    r#"nav[aria-label="breadcrumb"] a"#,
    ".breadcrumbs a",
    ".breadcrumb a",
    "ol.breadcrumb li",
];

/// Leading breadcrumb entries that are site navigation, not categories.
const NAVIGATION_CRUMBS: &[&str] = &["home", "mac", "mac apps", "apps", "macupdate", "explore"];

/// Scrapes the minimal app fields from rendered markup.
#[derive(Debug, Clone, Copy, Default)]
pub struct DomFallbackExtractor;

impl Extractor for DomFallbackExtractor {
    fn extract_app(&self, html: &str) -> Option<ExtractedApp> {
        let document = Html::parse_document(html);

        let name = select_first_text(&document, NAME_SELECTORS)
            .or_else(|| select_meta(&document, r#"meta[property="og:title"]"#));
        let description = select_first_html(&document, DESCRIPTION_SELECTORS)
            .or_else(|| select_meta(&document, r#"meta[name="description"]"#))
            .or_else(|| select_meta(&document, r#"meta[property="og:description"]"#));
        if name.is_none() && description.is_none() {
            return None;
        }

        let version = select_first_text(&document, VERSION_SELECTORS).map(|v| {
            v.trim_start_matches("Version")
                .trim_start_matches("version")
                .trim()
                .to_owned()
        });
        let category = breadcrumb_category(&document, name.as_deref()).or_else(|| {
            select_first_text(&document, &[r#"[itemprop="applicationCategory"]"#]).map(|name| {
                RawCategory {
                    name,
                    ..RawCategory::default()
                }
            })
        });
        let icon = select_meta(&document, r#"meta[property="og:image"]"#).or_else(|| {
            select_first_attr(&document, r#"img[itemprop="image"]"#, "src")
        });

        let mut details = Map::new();
        for (key, value) in [
            ("title", &name),
            ("description", &description),
            ("version", &version),
            ("icon", &icon),
        ] {
            if let Some(value) = value {
                details.insert(key.to_owned(), Value::String(value.clone()));
            }
        }

        Some(ExtractedApp {
            source: ExtractionSource::Dom,
            name,
            description,
            version: version.filter(|v| !v.is_empty()),
            category,
            details: Value::Object(details),
        })
    }
}

fn text_or_none(value: &str) -> Option<String> {
    let collapsed = value.split_whitespace().collect::<Vec<_>>().join(" ");
    (!collapsed.is_empty()).then_some(collapsed)
}

/// Text of the first element matched by the first selector that matches.
pub(crate) fn select_first_text(document: &Html, selectors: &[&str]) -> Option<String> {
    selectors
        .iter()
        .filter_map(|s| Selector::parse(s).ok())
        .find_map(|sel| {
            document
                .select(&sel)
                .find_map(|n| text_or_none(&n.text().collect::<String>()))
        })
}

fn select_first_html(document: &Html, selectors: &[&str]) -> Option<String> {
    selectors
        .iter()
        .filter_map(|s| Selector::parse(s).ok())
        .find_map(|sel| {
            document.select(&sel).find_map(|n| {
                let inner = n.inner_html();
                (!inner.trim().is_empty()).then(|| inner.trim().to_owned())
            })
        })
}

pub(crate) fn select_first_attr(document: &Html, selector: &str, attr: &str) -> Option<String> {
    let sel = Selector::parse(selector).ok()?;
    document
        .select(&sel)
        .find_map(|n| n.value().attr(attr).and_then(text_or_none))
}

fn select_meta(document: &Html, selector: &str) -> Option<String> {
    select_first_attr(document, selector, "content")
}

/// Category from the breadcrumb trail: the last crumb is the leaf, the one
/// before it (if any) its parent. Navigation crumbs and a trailing crumb
/// repeating the app name are dropped.
fn breadcrumb_category(document: &Html, app_name: Option<&str>) -> Option<RawCategory> {
    let mut trail = BREADCRUMB_SELECTORS
        .iter()
        .filter_map(|s| Selector::parse(s).ok())
        .map(|sel| {
            document
                .select(&sel)
                .filter_map(|n| text_or_none(&n.text().collect::<String>()))
                .collect::<Vec<_>>()
        })
        .find(|crumbs| !crumbs.is_empty())?;

    trail.retain(|c| !NAVIGATION_CRUMBS.contains(&c.to_ascii_lowercase().as_str()));
    if let (Some(last), Some(app_name)) = (trail.last(), app_name) {
        if last.eq_ignore_ascii_case(app_name) {
            trail.pop();
        }
    }

    let name = trail.pop()?;
    Some(RawCategory {
        name,
        parent_name: trail.pop(),
        source_id: None,
    })
}
