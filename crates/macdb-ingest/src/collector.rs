use std::sync::Arc;

use futures::future::join_all;
use macdb_core::{ImportRecord, ListingSummary};
use macdb_scraper::{normalize_app, Extractor, FallbackExtractor, FetchPage};

use crate::images::{ImageKind, ImageStore};
use crate::resolver::CategoryResolver;
use crate::store::CategoryStore;

/// Detail pages fetched concurrently per batch.
pub const DETAIL_BATCH_SIZE: usize = 20;

/// Turns listing summaries into import records by fetching and parsing each
/// app's detail page.
pub struct DetailCollector<S: ?Sized> {
    fetcher: Arc<dyn FetchPage>,
    extractor: FallbackExtractor,
    resolver: CategoryResolver<S>,
    images: Arc<dyn ImageStore>,
}

impl<S: CategoryStore + ?Sized> DetailCollector<S> {
    pub fn new(
        fetcher: Arc<dyn FetchPage>,
        resolver: CategoryResolver<S>,
        images: Arc<dyn ImageStore>,
    ) -> Self {
        Self {
            fetcher,
            extractor: FallbackExtractor::standard(),
            resolver,
            images,
        }
    }

    /// Collects one record per summary, in input order.
    ///
    /// Batches of [`DETAIL_BATCH_SIZE`] run concurrently; batches run one
    /// after another. An entry is `None` when its page could not be fetched
    /// or lacked a name or description.
    pub async fn collect_details(&self, summaries: &[ListingSummary]) -> Vec<Option<ImportRecord>> {
        let mut records = Vec::with_capacity(summaries.len());
        for (batch_index, batch) in summaries.chunks(DETAIL_BATCH_SIZE).enumerate() {
            tracing::debug!(batch = batch_index, size = batch.len(), "collecting app details");
            records.extend(join_all(batch.iter().map(|s| self.collect_one(s))).await);
        }
        records
    }

    async fn collect_one(&self, summary: &ListingSummary) -> Option<ImportRecord> {
        let html = match self.fetcher.fetch(&summary.detail_url).await {
            Ok(html) => html,
            Err(e) => {
                tracing::warn!(url = %summary.detail_url, error = %e, "detail page fetch failed");
                return None;
            }
        };

        let Some(extracted) = self.extractor.extract_app(&html) else {
            tracing::warn!(url = %summary.detail_url, "no app data found on detail page");
            return None;
        };
        let Some(normalized) = normalize_app(summary, &extracted) else {
            tracing::warn!(url = %summary.detail_url, "detail page is missing name or description");
            return None;
        };

        let mut record = normalized.record;
        self.place_category(&mut record).await;

        let owner = record.vendor_external_id().map(str::to_owned);
        if let Some(icon_url) = normalized.icon_url.as_deref() {
            record.icon = self
                .images
                .fetch_and_store(icon_url, ImageKind::Icon, owner.as_deref())
                .await;
        }
        record.screenshots = join_all(normalized.screenshot_urls.iter().map(|url| {
            self.images
                .fetch_and_store(url, ImageKind::Screenshot, owner.as_deref())
        }))
        .await
        .into_iter()
        .flatten()
        .collect();

        Some(record)
    }

    async fn place_category(&self, record: &mut ImportRecord) {
        let category = &record.category;
        if category.name.trim().is_empty() {
            return;
        }
        let resolved = self
            .resolver
            .resolve(
                &category.name,
                category.parent_name.as_deref(),
                category.source_id.as_deref(),
            )
            .await;
        match resolved {
            Ok(resolved) => {
                record.category.external_category_id = resolved.category_id;
                record.category.external_subcategory_id = resolved.subcategory_id;
            }
            Err(e) => {
                tracing::warn!(
                    app = %record.name,
                    category = %record.category.name,
                    error = %e,
                    "category resolution failed"
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryCatalog;
    use crate::test_support::{next_data_page, NoImages, StaticPages, BASE_URL};
    use serde_json::json;

    fn summary(id: u32) -> ListingSummary {
        ListingSummary {
            name: format!("App {id}"),
            version: None,
            icon_url: None,
            detail_url: format!("{BASE_URL}/app/mac/{id}/app-{id}"),
            external_id: Some(id.to_string()),
        }
    }

    fn detail(id: u32) -> String {
        next_data_page(&json!({"app": {
            "title": format!("App {id}"),
            "description": "<p>Does things.</p>",
            "category": {"id": 14, "name": "Browsers", "parent": {"id": 2, "name": "Internet"}},
        }}))
    }

    fn collector(catalog: &MemoryCatalog, pages: StaticPages) -> DetailCollector<MemoryCatalog> {
        DetailCollector::new(
            Arc::new(pages),
            CategoryResolver::new(Arc::new(catalog.clone())),
            Arc::new(NoImages),
        )
    }

    #[tokio::test]
    async fn records_keep_input_order_across_batches() {
        let catalog = MemoryCatalog::new();
        let ids: Vec<u32> = (1..=25).collect();
        let pages = ids
            .iter()
            .fold(StaticPages::new(), |pages, &id| {
                pages.with(summary(id).detail_url, detail(id))
            });
        let summaries: Vec<ListingSummary> = ids.iter().map(|&id| summary(id)).collect();

        let records = collector(&catalog, pages).collect_details(&summaries).await;

        assert_eq!(records.len(), 25);
        for (id, record) in ids.iter().zip(&records) {
            let record = record.as_ref().expect("record collected");
            assert_eq!(record.name, format!("App {id}"));
        }
    }

    #[tokio::test]
    async fn unreachable_or_incomplete_pages_yield_none() {
        let catalog = MemoryCatalog::new();
        let no_description = next_data_page(&json!({"app": {"title": "App 2"}}));
        let pages = StaticPages::new()
            .with(summary(1).detail_url, detail(1))
            .with(summary(2).detail_url, no_description);

        let records = collector(&catalog, pages)
            .collect_details(&[summary(1), summary(2), summary(3)])
            .await;

        assert!(records[0].is_some());
        assert!(records[1].is_none());
        assert!(records[2].is_none());
    }

    #[tokio::test]
    async fn collected_record_carries_resolved_category_ids() {
        let catalog = MemoryCatalog::new();
        let pages = StaticPages::new().with(summary(1).detail_url, detail(1));

        let records = collector(&catalog, pages).collect_details(&[summary(1)]).await;

        let category = &records[0].as_ref().expect("record collected").category;
        assert!(category.external_category_id.is_some());
        assert!(category.external_subcategory_id.is_some());
        assert_eq!(catalog.categories().len(), 2);
    }
}
