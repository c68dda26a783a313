//! App data extraction from detail pages.
//!
//! Two strategies exist because the source is an uncontrolled third-party
//! page: the framework's embedded JSON blob ([`StructuredPayloadExtractor`])
//! and CSS selectors over the rendered markup ([`DomFallbackExtractor`]).
//! [`FallbackExtractor`] tries the first and fills gaps from the second.

mod dom;
mod structured;

pub use dom::DomFallbackExtractor;
pub use structured::{StructuredPayload, StructuredPayloadExtractor};

use serde_json::Value;

/// Which strategy produced an [`ExtractedApp`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtractionSource {
    Structured,
    Dom,
}

/// Category placement as scraped, before resolution against the catalog.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawCategory {
    pub name: String,
    pub parent_name: Option<String>,
    /// Source-site id of the category, when the page exposes one.
    pub source_id: Option<String>,
}

/// Minimal app fields plus the raw app object for the normalizer.
#[derive(Debug, Clone, PartialEq)]
pub struct ExtractedApp {
    pub source: ExtractionSource,
    pub name: Option<String>,
    /// Description markup, uncleaned.
    pub description: Option<String>,
    pub version: Option<String>,
    pub category: Option<RawCategory>,
    /// App object the remaining fields are read from.
    pub details: Value,
}

impl ExtractedApp {
    /// `true` when name, description, and category are all present.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.name.is_some() && self.description.is_some() && self.category.is_some()
    }

    /// Fills fields that are still missing from `other`.
    ///
    /// `details` keys are merged the same way: existing keys win.
    pub fn fill_from(&mut self, other: ExtractedApp) {
        if self.name.is_none() {
            self.name = other.name;
        }
        if self.description.is_none() {
            self.description = other.description;
        }
        if self.version.is_none() {
            self.version = other.version;
        }
        if self.category.is_none() {
            self.category = other.category;
        }
        if let (Value::Object(mine), Value::Object(theirs)) = (&mut self.details, other.details) {
            for (key, value) in theirs {
                mine.entry(key).or_insert(value);
            }
        }
    }
}

/// One strategy for pulling app fields out of a detail page.
pub trait Extractor: Send + Sync {
    /// Returns `None` when this strategy finds nothing usable in `html`.
    fn extract_app(&self, html: &str) -> Option<ExtractedApp>;
}

/// Tries `primary` first and consults `fallback` only when the primary
/// result is absent or incomplete.
#[derive(Debug, Clone, Default)]
pub struct FallbackExtractor<P = StructuredPayloadExtractor, F = DomFallbackExtractor> {
    primary: P,
    fallback: F,
}

impl FallbackExtractor {
    /// Embedded JSON first, rendered markup second.
    #[must_use]
    pub fn standard() -> Self {
        Self::new(StructuredPayloadExtractor, DomFallbackExtractor)
    }
}

impl<P: Extractor, F: Extractor> FallbackExtractor<P, F> {
    pub fn new(primary: P, fallback: F) -> Self {
        Self { primary, fallback }
    }
}

impl<P: Extractor, F: Extractor> Extractor for FallbackExtractor<P, F> {
    fn extract_app(&self, html: &str) -> Option<ExtractedApp> {
        match self.primary.extract_app(html) {
            Some(app) if app.is_complete() => Some(app),
            Some(mut app) => {
                if let Some(dom) = self.fallback.extract_app(html) {
                    app.fill_from(dom);
                }
                Some(app)
            }
            None => {
                tracing::debug!("no structured payload, using DOM fallback");
                self.fallback.extract_app(html)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    struct Fixed(Option<ExtractedApp>);

    impl Extractor for Fixed {
        fn extract_app(&self, _html: &str) -> Option<ExtractedApp> {
            self.0.clone()
        }
    }

    fn app(source: ExtractionSource, name: Option<&str>, description: Option<&str>) -> ExtractedApp {
        ExtractedApp {
            source,
            name: name.map(str::to_owned),
            description: description.map(str::to_owned),
            version: None,
            category: None,
            details: json!({}),
        }
    }

    #[test]
    fn complete_primary_result_skips_fallback() {
        let mut primary = app(ExtractionSource::Structured, Some("Rectangle"), Some("Windows"));
        primary.category = Some(RawCategory {
            name: "Productivity".to_owned(),
            ..RawCategory::default()
        });
        let extractor = FallbackExtractor::new(
            Fixed(Some(primary)),
            Fixed(Some(app(ExtractionSource::Dom, Some("Other"), None))),
        );
        let result = extractor.extract_app("").unwrap();
        assert_eq!(result.name.as_deref(), Some("Rectangle"));
        assert_eq!(result.source, ExtractionSource::Structured);
    }

    #[test]
    fn incomplete_primary_result_is_filled_from_fallback() {
        let mut primary = app(ExtractionSource::Structured, Some("Rectangle"), None);
        primary.details = json!({"title": "Rectangle"});
        let mut dom = app(ExtractionSource::Dom, Some("Ignored"), Some("<p>Windows</p>"));
        dom.category = Some(RawCategory {
            name: "Utilities".to_owned(),
            ..RawCategory::default()
        });
        dom.details = json!({"title": "Ignored", "icon": "https://cdn.example.com/i.png"});

        let extractor = FallbackExtractor::new(Fixed(Some(primary)), Fixed(Some(dom)));
        let result = extractor.extract_app("").unwrap();
        assert_eq!(result.name.as_deref(), Some("Rectangle"));
        assert_eq!(result.description.as_deref(), Some("<p>Windows</p>"));
        assert_eq!(result.category.unwrap().name, "Utilities");
        assert_eq!(result.details["title"], "Rectangle");
        assert_eq!(result.details["icon"], "https://cdn.example.com/i.png");
    }

    #[test]
    fn missing_primary_result_uses_fallback() {
        let extractor = FallbackExtractor::new(
            Fixed(None),
            Fixed(Some(app(ExtractionSource::Dom, Some("Rectangle"), None))),
        );
        let result = extractor.extract_app("").unwrap();
        assert_eq!(result.source, ExtractionSource::Dom);
    }

    #[test]
    fn both_strategies_empty_yields_none() {
        let extractor = FallbackExtractor::new(Fixed(None), Fixed(None));
        assert!(extractor.extract_app("<html></html>").is_none());
    }
}
