pub mod client;
pub mod error;
pub mod extract;
pub mod fields;
pub mod listing;
pub mod normalize;
pub(crate) mod rate_limit;
pub mod requirements;
pub mod taxonomy;

pub use client::{FetchPage, PageFetcher};
pub use error::ScraperError;
pub use extract::{
    DomFallbackExtractor, ExtractedApp, ExtractionSource, Extractor, FallbackExtractor,
    RawCategory, StructuredPayload, StructuredPayloadExtractor,
};
pub use listing::{ListingWalker, PAGE_SIZE};
pub use normalize::{
    best_screenshot_url, clean_html, format_file_size, format_price, normalize_app,
    normalize_bundle_ids, parse_date, slugify, NormalizedApp,
};
pub use requirements::{process_requirements, process_requirements_text, Requirements};
pub use taxonomy::{fetch_remote_taxonomy, validate_source_url, RemoteCategoryNode};
