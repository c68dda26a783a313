//! Canned collaborators shared by the unit tests in this crate.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use macdb_scraper::{FetchPage, ScraperError};
use serde_json::{json, Value};

use crate::images::{ImageKind, ImageStore};

pub(crate) const BASE_URL: &str = "https://www.macupdate.com";

/// Serves fixed bodies by URL; anything else is a 404. Records every fetch.
#[derive(Default)]
pub(crate) struct StaticPages {
    pages: HashMap<String, String>,
    fetched: Mutex<Vec<String>>,
}

impl StaticPages {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn with(mut self, url: impl Into<String>, body: impl Into<String>) -> Self {
        self.pages.insert(url.into(), body.into());
        self
    }

    pub(crate) fn fetched(&self) -> Vec<String> {
        self.fetched.lock().unwrap().clone()
    }
}

#[async_trait]
impl FetchPage for StaticPages {
    async fn fetch(&self, url: &str) -> Result<String, ScraperError> {
        self.fetched.lock().unwrap().push(url.to_owned());
        self.pages
            .get(url)
            .cloned()
            .ok_or_else(|| ScraperError::HttpStatus {
                status: 404,
                url: url.to_owned(),
            })
    }
}

/// Stores nothing; every image is reported as unavailable.
pub(crate) struct NoImages;

#[async_trait]
impl ImageStore for NoImages {
    async fn fetch_and_store(
        &self,
        _url: &str,
        _kind: ImageKind,
        _owner_external_id: Option<&str>,
    ) -> Option<String> {
        None
    }
}

pub(crate) fn next_data_page(page_props: &Value) -> String {
    format!(
        r#"<!DOCTYPE html><html><body><div id="__next"></div>
<script id="__NEXT_DATA__" type="application/json">{}</script></body></html>"#,
        json!({"props": {"pageProps": page_props}})
    )
}
