//! Integration tests for `ListingWalker::walk` and `fetch_remote_taxonomy`.
//!
//! Uses `wiremock` to serve canned listing and detail pages so no real
//! network traffic is made.

use std::sync::Arc;
use std::time::Duration;

use serde_json::{json, Value};
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use macdb_scraper::{fetch_remote_taxonomy, ListingWalker, PageFetcher, ScraperError, PAGE_SIZE};

fn test_fetcher() -> Arc<PageFetcher> {
    Arc::new(PageFetcher::new(5, "macdb-test/0.1", 0, 0).expect("failed to build test fetcher"))
}

fn next_data_page(page_props: &Value) -> String {
    format!(
        r#"<!DOCTYPE html><html><body><div id="__next"></div>
<script id="__NEXT_DATA__" type="application/json">{}</script></body></html>"#,
        json!({"props": {"pageProps": page_props}})
    )
}

/// A structured listing page with `count` apps whose ids start at `first_id`.
fn listing_page(first_id: usize, count: usize) -> String {
    let apps: Vec<Value> = (first_id..first_id + count)
        .map(|id| json!({"id": id, "title": format!("App {id}"), "slug": format!("app-{id}")}))
        .collect();
    next_data_page(&json!({ "apps": apps }))
}

async fn mount_listing_page(server: &MockServer, page: u32, body: String) {
    Mock::given(method("GET"))
        .and(path("/explore"))
        .and(query_param("page", page.to_string()))
        .respond_with(ResponseTemplate::new(200).set_body_string(body))
        .mount(server)
        .await;
}

fn walker(server: &MockServer) -> ListingWalker {
    ListingWalker::new(test_fetcher(), server.uri(), "/explore", Duration::ZERO)
}

// ---------------------------------------------------------------------------
// Listing walker
// ---------------------------------------------------------------------------

#[tokio::test]
async fn walk_stops_on_empty_page_before_reaching_limit() {
    let server = MockServer::start().await;
    mount_listing_page(&server, 1, listing_page(1, PAGE_SIZE)).await;
    mount_listing_page(&server, 2, listing_page(1 + PAGE_SIZE, PAGE_SIZE)).await;
    mount_listing_page(&server, 3, listing_page(0, 0)).await;

    let summaries = walker(&server).walk(1, Some(100)).await;

    assert_eq!(summaries.len(), 96);
    assert_eq!(summaries[0].name, "App 1");
    assert_eq!(summaries[95].name, "App 96");
    assert_eq!(
        summaries[0].detail_url,
        format!("{}/app/mac/1/app-1", server.uri())
    );
}

#[tokio::test]
async fn walk_truncates_at_limit() {
    let server = MockServer::start().await;
    mount_listing_page(&server, 1, listing_page(1, PAGE_SIZE)).await;
    mount_listing_page(&server, 2, listing_page(1 + PAGE_SIZE, PAGE_SIZE)).await;

    let summaries = walker(&server).walk(1, Some(50)).await;

    assert_eq!(summaries.len(), 50);
    assert_eq!(summaries[49].name, "App 50");
}

#[tokio::test]
async fn walk_without_limit_pages_until_empty() {
    let server = MockServer::start().await;
    mount_listing_page(&server, 2, listing_page(1, 3)).await;
    mount_listing_page(&server, 3, listing_page(4, 2)).await;
    mount_listing_page(&server, 4, next_data_page(&json!({"apps": []}))).await;

    let summaries = walker(&server).walk(2, None).await;

    assert_eq!(summaries.len(), 5);
}

#[tokio::test]
async fn walk_keeps_collected_summaries_when_a_page_fails() {
    let server = MockServer::start().await;
    mount_listing_page(&server, 1, listing_page(1, PAGE_SIZE)).await;
    Mock::given(method("GET"))
        .and(path("/explore"))
        .and(query_param("page", "2"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let summaries = walker(&server).walk(1, Some(100)).await;

    assert_eq!(summaries.len(), PAGE_SIZE);
}

#[tokio::test]
async fn walk_falls_back_to_dom_cards() {
    let server = MockServer::start().await;
    let cards = r#"<html><body>
<div data-testid="app-card"><a href="/app/mac/10/alpha"><h3>Alpha</h3></a></div>
<div data-testid="app-card"><a href="/app/mac/11/beta"><h3>Beta</h3></a></div>
</body></html>"#;
    mount_listing_page(&server, 1, cards.to_owned()).await;
    mount_listing_page(&server, 2, "<html><body></body></html>".to_owned()).await;

    let summaries = walker(&server).walk(1, None).await;

    assert_eq!(summaries.len(), 2);
    assert_eq!(summaries[1].name, "Beta");
    assert_eq!(summaries[1].external_id.as_deref(), Some("11"));
}

// ---------------------------------------------------------------------------
// Remote taxonomy
// ---------------------------------------------------------------------------

#[tokio::test]
async fn fetch_remote_taxonomy_returns_valid_top_level_nodes() {
    let server = MockServer::start().await;
    let page = next_data_page(&json!({"categories": [
        {"id": 3, "parent_id": null, "slug": "productivity", "name": "Productivity",
         "description": "Get things done", "url": "/explore/productivity",
         "children": [{"id": 17, "parent_id": 3, "slug": "window-management",
                       "name": "Window Management", "description": null,
                       "url": "/explore/productivity/window-management"}]},
        {"id": "bad", "name": "Broken"}
    ]}));
    Mock::given(method("GET"))
        .and(path("/app/mac/61211/rectangle"))
        .respond_with(ResponseTemplate::new(200).set_body_string(page))
        .mount(&server)
        .await;

    let fetcher = test_fetcher();
    let nodes = fetch_remote_taxonomy(
        fetcher.as_ref(),
        &format!("{}/app/mac/61211/rectangle", server.uri()),
        &server.uri(),
    )
    .await
    .expect("taxonomy should parse");

    assert_eq!(nodes.len(), 1);
    assert_eq!(nodes[0].name, "Productivity");
    assert_eq!(nodes[0].children.len(), 1);
}

#[tokio::test]
async fn fetch_remote_taxonomy_errors_when_no_node_is_valid() {
    let server = MockServer::start().await;
    let page = next_data_page(&json!({"categories": [{"name": "No id"}]}));
    Mock::given(method("GET"))
        .and(path("/app/mac/1/x"))
        .respond_with(ResponseTemplate::new(200).set_body_string(page))
        .mount(&server)
        .await;

    let fetcher = test_fetcher();
    let err = fetch_remote_taxonomy(
        fetcher.as_ref(),
        &format!("{}/app/mac/1/x", server.uri()),
        &server.uri(),
    )
    .await
    .unwrap_err();

    assert!(
        matches!(err, ScraperError::NoValidCategories { .. }),
        "expected NoValidCategories, got: {err:?}"
    );
}

#[tokio::test]
async fn fetch_remote_taxonomy_errors_without_payload() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/app/mac/1/x"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html></html>"))
        .mount(&server)
        .await;

    let fetcher = test_fetcher();
    let err = fetch_remote_taxonomy(
        fetcher.as_ref(),
        &format!("{}/app/mac/1/x", server.uri()),
        &server.uri(),
    )
    .await
    .unwrap_err();

    assert!(matches!(err, ScraperError::MissingPayload { .. }));
}

#[tokio::test]
async fn fetch_remote_taxonomy_rejects_foreign_host_without_fetching() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let fetcher = test_fetcher();
    let err = fetch_remote_taxonomy(
        fetcher.as_ref(),
        "https://evil.example.com/app/mac/1/x",
        &server.uri(),
    )
    .await
    .unwrap_err();

    assert!(matches!(err, ScraperError::InvalidUrl { .. }));
}
