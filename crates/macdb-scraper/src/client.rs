use std::time::Duration;

use async_trait::async_trait;
use macdb_core::AppConfig;
use reqwest::Client;

use crate::error::ScraperError;
use crate::rate_limit::retry_with_backoff;

/// Anything that can turn a URL into page markup.
///
/// The listing walker, detail collector, and taxonomy fetch only depend on
/// this trait so they can be driven by canned pages in tests.
#[async_trait]
pub trait FetchPage: Send + Sync {
    /// Fetches `url` and returns the response body as text.
    ///
    /// # Errors
    ///
    /// Returns a [`ScraperError`] on network failure or a non-2xx status.
    async fn fetch(&self, url: &str) -> Result<String, ScraperError>;
}

/// HTTP page fetcher for the source site.
///
/// Always sends a desktop-browser `User-Agent` because the site serves
/// different markup to non-browser clients. Every request is bounded by the
/// configured timeout, and transient failures (429, 5xx, network errors) are
/// retried with exponential backoff.
#[derive(Debug, Clone)]
pub struct PageFetcher {
    client: Client,
    max_retries: u32,
    backoff_base_ms: u64,
}

impl PageFetcher {
    /// Builds a fetcher with an explicit timeout, `User-Agent`, and retry policy.
    ///
    /// `max_retries` is the number of additional attempts after the first
    /// failure. Set it to `0` to disable retries.
    ///
    /// # Errors
    ///
    /// Returns [`ScraperError::Http`] if the underlying `reqwest::Client`
    /// cannot be constructed.
    pub fn new(
        timeout_secs: u64,
        user_agent: &str,
        max_retries: u32,
        backoff_base_ms: u64,
    ) -> Result<Self, ScraperError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .connect_timeout(Duration::from_secs(timeout_secs.min(10)))
            .user_agent(user_agent)
            .build()?;
        Ok(Self {
            client,
            max_retries,
            backoff_base_ms,
        })
    }

    /// Builds a fetcher from the `MACDB_SCRAPER_*` settings.
    ///
    /// # Errors
    ///
    /// See [`PageFetcher::new`].
    pub fn from_config(config: &AppConfig) -> Result<Self, ScraperError> {
        Self::new(
            config.scraper_request_timeout_secs,
            &config.scraper_user_agent,
            config.scraper_max_retries,
            config.scraper_retry_backoff_base_ms,
        )
    }

    async fn fetch_once(&self, url: &str) -> Result<String, ScraperError> {
        let response = self
            .client
            .get(url)
            .header(reqwest::header::ACCEPT, "text/html,application/xhtml+xml")
            .header(reqwest::header::ACCEPT_LANGUAGE, "en-US,en;q=0.9")
            .send()
            .await?;
        let status = response.status();

        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            let retry_after_secs = response
                .headers()
                .get(reqwest::header::RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(|s| s.trim().parse::<u64>().ok())
                .unwrap_or(5);
            return Err(ScraperError::RateLimited {
                domain: extract_domain(url),
                retry_after_secs,
            });
        }

        if !status.is_success() {
            return Err(ScraperError::HttpStatus {
                status: status.as_u16(),
                url: url.to_owned(),
            });
        }

        Ok(response.text().await?)
    }
}

#[async_trait]
impl FetchPage for PageFetcher {
    async fn fetch(&self, url: &str) -> Result<String, ScraperError> {
        tracing::debug!(url, "fetching page");
        retry_with_backoff(self.max_retries, self.backoff_base_ms, || {
            self.fetch_once(url)
        })
        .await
    }
}

/// Host portion of `url`, or the whole input when it does not parse.
pub(crate) fn extract_domain(url: &str) -> String {
    reqwest::Url::parse(url)
        .ok()
        .and_then(|u| u.host_str().map(str::to_owned))
        .unwrap_or_else(|| url.to_owned())
}

/// Resolves `href` against `base`, leaving absolute URLs untouched.
#[must_use]
pub fn absolutize_url(base: &str, href: &str) -> Option<String> {
    let href = href.trim();
    if href.is_empty() {
        return None;
    }
    if href.starts_with("//") {
        return Some(format!("https:{href}"));
    }
    let base = reqwest::Url::parse(base).ok()?;
    base.join(href).ok().map(String::from)
}

#[cfg(test)]
#[path = "client_test.rs"]
mod tests;
