//! Paginated walk over the source site's app listing.

use std::sync::{Arc, LazyLock};
use std::time::Duration;

use macdb_core::{AppConfig, ListingSummary};
use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use serde_json::Value;

use crate::client::{absolutize_url, FetchPage};
use crate::extract::StructuredPayload;
use crate::fields::first_str;
use crate::normalize::best_screenshot_url;

/// Apps per listing page on the source site.
pub const PAGE_SIZE: usize = 48;

/// Hard stop for "import all" walks, in case the site never returns an
/// empty page.
const MAX_PAGES: u32 = 500;

/// Card selectors for DOM listing pages, most specific first.
const CARD_SELECTORS: &[&str] = &[
    r#"[data-testid="app-card"]"#,
    ".app-card",
    ".mu_app_list_item",
    "li.app-list-item",
];

const CARD_NAME_SELECTORS: &[&str] = &[
    r#"[data-testid="app-title"]"#,
    ".app-title",
    ".app-name",
    "h2",
    "h3",
];

const CARD_VERSION_SELECTORS: &[&str] = &[r#"[data-testid="app-version"]"#, ".app-version", ".version"];

static APP_ID_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"/app/mac/(\d+)(?:/|$)").expect("valid regex"));

/// Walks listing pages in order, collecting summaries.
pub struct ListingWalker {
    fetcher: Arc<dyn FetchPage>,
    base_url: String,
    listing_path: String,
    page_delay: Duration,
}

impl ListingWalker {
    pub fn new(
        fetcher: Arc<dyn FetchPage>,
        base_url: impl Into<String>,
        listing_path: impl Into<String>,
        page_delay: Duration,
    ) -> Self {
        Self {
            fetcher,
            base_url: base_url.into().trim_end_matches('/').to_owned(),
            listing_path: listing_path.into(),
            page_delay,
        }
    }

    /// Walker for the configured source with the configured politeness delay.
    pub fn from_config(fetcher: Arc<dyn FetchPage>, config: &AppConfig) -> Self {
        Self::new(
            fetcher,
            config.source_base_url.clone(),
            config.source_listing_path.clone(),
            Duration::from_millis(config.scraper_inter_request_delay_ms),
        )
    }

    /// URL of listing page `page` (1-based).
    #[must_use]
    pub fn page_url(&self, page: u32) -> String {
        format!("{}{}?page={page}", self.base_url, self.listing_path)
    }

    /// Collects summaries from `start_page` onward.
    ///
    /// Stops once `limit` summaries are collected (the last page is
    /// truncated) or at the first page that yields none. With `limit` unset
    /// the walk continues until that empty page. A failed page fetch ends
    /// the walk with whatever was collected so far.
    pub async fn walk(&self, start_page: u32, limit: Option<usize>) -> Vec<ListingSummary> {
        let mut collected: Vec<ListingSummary> = Vec::new();
        if limit == Some(0) {
            return collected;
        }

        let start_page = start_page.max(1);
        for page in start_page..start_page.saturating_add(MAX_PAGES) {
            if page > start_page && !self.page_delay.is_zero() {
                tokio::time::sleep(self.page_delay).await;
            }

            let url = self.page_url(page);
            let html = match self.fetcher.fetch(&url).await {
                Ok(html) => html,
                Err(e) => {
                    tracing::warn!(page, url = %url, error = %e, "listing page fetch failed, ending walk");
                    break;
                }
            };

            let summaries = parse_listing_page(&html, &self.base_url);
            if summaries.is_empty() {
                tracing::info!(page, total = collected.len(), "empty listing page, end of catalog");
                break;
            }
            tracing::debug!(page, count = summaries.len(), "listing page parsed");
            collected.extend(summaries);

            if let Some(limit) = limit {
                if collected.len() >= limit {
                    collected.truncate(limit);
                    break;
                }
            }
        }

        collected
    }
}

/// Summaries on one listing page: the embedded app array when present,
/// otherwise app cards scraped from the markup.
#[must_use]
pub fn parse_listing_page(html: &str, base_url: &str) -> Vec<ListingSummary> {
    if let Some(apps) = StructuredPayload::extract(html).and_then(|p| p.apps) {
        let summaries: Vec<ListingSummary> = apps
            .iter()
            .filter_map(|app| summary_from_value(app, base_url))
            .collect();
        if !summaries.is_empty() {
            return summaries;
        }
    }
    parse_listing_dom(html, base_url)
}

fn summary_from_value(app: &Value, base_url: &str) -> Option<ListingSummary> {
    let name = first_str(app, &["title", "name"])?;
    let external_id = first_str(app, &["id", "app_id"]);
    let detail_url = first_str(app, &["url", "link", "href", "detail_url"])
        .and_then(|u| absolutize_url(base_url, &u))
        .or_else(|| {
            let id = external_id.as_deref()?;
            let slug = first_str(app, &["slug"])?;
            Some(format!("{base_url}/app/mac/{id}/{slug}"))
        })?;
    let icon_url = ["icon", "icon_url", "logo"]
        .iter()
        .filter_map(|k| app.get(*k))
        .find_map(best_screenshot_url)
        .and_then(|u| absolutize_url(base_url, &u));

    Some(ListingSummary {
        name,
        version: first_str(app, &["version", "latest_version"]),
        icon_url,
        external_id: external_id.or_else(|| app_id_from_url(&detail_url)),
        detail_url,
    })
}

fn parse_listing_dom(html: &str, base_url: &str) -> Vec<ListingSummary> {
    let document = Html::parse_document(html);
    for selector in CARD_SELECTORS {
        let Ok(sel) = Selector::parse(selector) else {
            continue;
        };
        let summaries: Vec<ListingSummary> = document
            .select(&sel)
            .filter_map(|card| summary_from_card(card, base_url))
            .collect();
        if !summaries.is_empty() {
            return summaries;
        }
    }
    Vec::new()
}

fn summary_from_card(card: ElementRef<'_>, base_url: &str) -> Option<ListingSummary> {
    let link = card_attr(card, "a[href]", "href")
        .or_else(|| card.value().attr("href").map(str::to_owned))?;
    let detail_url = absolutize_url(base_url, &link)?;
    let name = card_text(card, CARD_NAME_SELECTORS)
        .or_else(|| card_attr(card, "a[title]", "title"))?;
    let icon_url = card_attr(card, "img", "src")
        .or_else(|| card_attr(card, "img", "data-src"))
        .and_then(|u| absolutize_url(base_url, &u));

    Some(ListingSummary {
        name,
        version: card_text(card, CARD_VERSION_SELECTORS),
        icon_url,
        external_id: app_id_from_url(&detail_url),
        detail_url,
    })
}

fn card_text(card: ElementRef<'_>, selectors: &[&str]) -> Option<String> {
    selectors
        .iter()
        .filter_map(|s| Selector::parse(s).ok())
        .find_map(|sel| {
            card.select(&sel).find_map(|n| {
                let text = n.text().collect::<Vec<_>>().join(" ");
                let text = text.split_whitespace().collect::<Vec<_>>().join(" ");
                (!text.is_empty()).then_some(text)
            })
        })
}

fn card_attr(card: ElementRef<'_>, selector: &str, attr: &str) -> Option<String> {
    let sel = Selector::parse(selector).ok()?;
    card.select(&sel).find_map(|n| {
        n.value()
            .attr(attr)
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .map(str::to_owned)
    })
}

/// Numeric source id embedded in a `/app/mac/<id>/<slug>` URL.
#[must_use]
pub fn app_id_from_url(url: &str) -> Option<String> {
    APP_ID_RE.captures(url).map(|c| c[1].to_owned())
}
