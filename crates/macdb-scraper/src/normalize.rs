//! Field normalization from scraped app data to [`macdb_core::ImportRecord`].
//!
//! Every function here is total: malformed input degrades to `None`, an
//! empty collection, or a best-effort string.

use std::collections::HashSet;
use std::sync::LazyLock;

use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone, Utc};
use macdb_core::{ImportRecord, ListingSummary, RecordCategory, VendorData};
use regex::Regex;
use serde_json::Value;

use crate::client::absolutize_url;
use crate::extract::ExtractedApp;
use crate::fields::{first_bool, first_i64, first_str, get_path, scalar_string};
use crate::requirements::process_requirements;

static SCRIPT_STYLE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?is)<(script|style)\b[^>]*>.*?</(script|style)\s*>").expect("valid regex")
});
static COMMENT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)<!--.*?-->").expect("valid regex"));
static LINE_BREAK_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)<br\s*/?>|</(p|div|h[1-6]|ul|ol|tr|section|article|blockquote|pre)\s*>|<li\b[^>]*>")
        .expect("valid regex")
});
static TAG_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"<[^>]*>").expect("valid regex"));
static ENTITY_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"&(#[xX][0-9a-fA-F]{1,6}|#[0-9]{1,7}|[a-zA-Z]{2,8});").expect("valid regex")
});
static INTER_TAG_WS_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r">\s+<").expect("valid regex"));
static WS_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").expect("valid regex"));
static HSPACE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[ \t\u{a0}\u{200b}]+").expect("valid regex"));
static BUNDLE_ID_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z0-9][A-Za-z0-9_-]*(\.[A-Za-z0-9_-]+)+$").expect("valid regex")
});

/// Screenshot renditions from largest to smallest.
const SCREENSHOT_VARIANTS: &[&str] = &[
    "large_png",
    "largePng",
    "large",
    "medium_png",
    "mediumPng",
    "medium",
    "small_png",
    "smallPng",
    "small",
    "url",
    "src",
];

const RELEASE_DATE_FIELDS: &[&str] = &[
    "release_date",
    "releaseDate",
    "released_at",
    "date",
    "updated_at",
];
const LAST_SCAN_FIELDS: &[&str] = &["last_scan_date", "lastScanDate", "scanned_at", "last_scanned_at"];

/// Converts scraped HTML to text, or tidies it when `preserve_html` is set.
///
/// Without `preserve_html`, block-level tags become line breaks, all other
/// tags are stripped, entities are unescaped, and whitespace is collapsed
/// (at most one blank line between paragraphs). With `preserve_html`,
/// scripts, styles, and comments are removed and whitespace between tags is
/// collapsed, but markup is kept.
#[must_use]
pub fn clean_html(html: &str, preserve_html: bool) -> String {
    let without_scripts = SCRIPT_STYLE_RE.replace_all(html, "");
    let without_comments = COMMENT_RE.replace_all(&without_scripts, "");

    if preserve_html {
        let tight = INTER_TAG_WS_RE.replace_all(&without_comments, "><");
        return WS_RE.replace_all(&tight, " ").trim().to_owned();
    }

    let with_breaks = LINE_BREAK_RE.replace_all(&without_comments, "\n");
    let stripped = TAG_RE.replace_all(&with_breaks, "");
    let decoded = decode_entities(&stripped);

    let mut out: Vec<String> = Vec::new();
    for line in decoded.lines() {
        let line = HSPACE_RE.replace_all(line, " ").trim().to_owned();
        if line.is_empty() && out.last().is_none_or(String::is_empty) {
            continue;
        }
        out.push(line);
    }
    while out.last().is_some_and(String::is_empty) {
        out.pop();
    }
    out.join("\n")
}

fn decode_entities(text: &str) -> String {
    ENTITY_RE
        .replace_all(text, |caps: &regex::Captures<'_>| {
            let entity = &caps[1];
            let decoded = if let Some(hex) = entity
                .strip_prefix("#x")
                .or_else(|| entity.strip_prefix("#X"))
            {
                u32::from_str_radix(hex, 16).ok().and_then(char::from_u32)
            } else if let Some(dec) = entity.strip_prefix('#') {
                dec.parse::<u32>().ok().and_then(char::from_u32)
            } else {
                named_entity(entity)
            };
            decoded.map_or_else(|| caps[0].to_owned(), String::from)
        })
        .into_owned()
}

fn named_entity(name: &str) -> Option<char> {
    Some(match name {
        "amp" => '&',
        "lt" => '<',
        "gt" => '>',
        "quot" => '"',
        "apos" => '\'',
        "nbsp" => ' ',
        "ndash" => '\u{2013}',
        "mdash" => '\u{2014}',
        "hellip" => '\u{2026}',
        "lsquo" => '\u{2018}',
        "rsquo" => '\u{2019}',
        "ldquo" => '\u{201c}',
        "rdquo" => '\u{201d}',
        "bull" => '\u{2022}',
        "copy" => '\u{a9}',
        "reg" => '\u{ae}',
        "trade" => '\u{2122}',
        _ => return None,
    })
}

/// Formats a scraped price for display.
///
/// - object with a numeric `value` in cents: `"$9.99"` (symbol by
///   `currency` code; unknown codes render as `"9.99 CHF"`)
/// - bare number: cents in USD
/// - non-blank string: passed through
/// - `null`, zero, negative, or anything unparsable: `"Free"`
#[must_use]
pub fn format_price(raw: &Value) -> String {
    const FREE: &str = "Free";
    match raw {
        Value::String(s) if !s.trim().is_empty() => s.trim().to_owned(),
        Value::Number(_) => cents_from(raw).map_or_else(|| FREE.to_owned(), |c| money(c, "USD")),
        Value::Object(obj) => {
            let Some(cents) = obj.get("value").and_then(cents_from) else {
                return FREE.to_owned();
            };
            let currency = obj
                .get("currency")
                .and_then(Value::as_str)
                .map_or_else(|| "USD".to_owned(), |c| c.trim().to_ascii_uppercase());
            money(cents, &currency)
        }
        _ => FREE.to_owned(),
    }
}

/// Positive amount in cents, if `value` is a number or numeric string.
fn cents_from(value: &Value) -> Option<i64> {
    let amount = match value {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => s.trim().parse::<f64>().ok()?,
        _ => return None,
    };
    #[allow(clippy::cast_possible_truncation)]
    let cents = amount.round() as i64;
    (amount.is_finite() && cents > 0).then_some(cents)
}

fn money(cents: i64, currency: &str) -> String {
    let (whole, frac) = (cents / 100, cents % 100);
    let symbol = match currency {
        "USD" | "" => Some("$"),
        "EUR" => Some("\u{20ac}"),
        "GBP" => Some("\u{a3}"),
        "JPY" => Some("\u{a5}"),
        _ => None,
    };
    match symbol {
        Some(symbol) => format!("{symbol}{whole}.{frac:02}"),
        None => format!("{whole}.{frac:02} {currency}"),
    }
}

/// URL of the largest available rendition of a screenshot.
///
/// Accepts a bare URL string or an object of renditions; nested rendition
/// objects with their own `url` are followed.
#[must_use]
pub fn best_screenshot_url(raw: &Value) -> Option<String> {
    match raw {
        Value::String(_) => scalar_string(raw),
        Value::Object(obj) => SCREENSHOT_VARIANTS
            .iter()
            .filter_map(|k| obj.get(*k))
            .find_map(|v| match v {
                Value::String(_) => scalar_string(v),
                Value::Object(inner) => inner.get("url").and_then(scalar_string),
                _ => None,
            }),
        _ => None,
    }
}

/// First parseable date among `candidates` in `obj`.
///
/// Accepts RFC 3339, `YYYY-MM-DD`, `YYYY-MM-DD HH:MM:SS`, and unix
/// timestamps in seconds or milliseconds (number or numeric string).
#[must_use]
pub fn parse_date(obj: &Value, candidates: &[&str]) -> Option<DateTime<Utc>> {
    candidates
        .iter()
        .filter_map(|k| get_path(obj, k))
        .find_map(parse_date_value)
}

fn parse_date_value(value: &Value) -> Option<DateTime<Utc>> {
    match value {
        Value::Number(n) => n.as_i64().and_then(from_unix),
        Value::String(s) => {
            let s = s.trim();
            if s.is_empty() {
                return None;
            }
            if let Ok(ts) = s.parse::<i64>() {
                return from_unix(ts);
            }
            if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
                return Some(dt.with_timezone(&Utc));
            }
            for fmt in ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%dT%H:%M:%S%.f"] {
                if let Ok(naive) = NaiveDateTime::parse_from_str(s, fmt) {
                    return Some(Utc.from_utc_datetime(&naive));
                }
            }
            NaiveDate::parse_from_str(s, "%Y-%m-%d")
                .ok()
                .and_then(|d| d.and_hms_opt(0, 0, 0))
                .map(|naive| Utc.from_utc_datetime(&naive))
        }
        _ => None,
    }
}

/// Unix seconds, or milliseconds when the value is too large to be seconds.
fn from_unix(ts: i64) -> Option<DateTime<Utc>> {
    if ts <= 0 {
        return None;
    }
    if ts > 100_000_000_000 {
        DateTime::from_timestamp_millis(ts)
    } else {
        DateTime::from_timestamp(ts, 0)
    }
}

/// Human-readable size with 1024-based units (`"12.5 MB"`).
#[must_use]
pub fn format_file_size(bytes: u64) -> String {
    const UNITS: [&str; 5] = ["B", "KB", "MB", "GB", "TB"];
    #[allow(clippy::cast_precision_loss)]
    let mut size = bytes as f64;
    let mut idx = 0;
    while size >= 1024.0 && idx + 1 < UNITS.len() {
        size /= 1024.0;
        idx += 1;
    }
    if idx == 0 {
        return format!("{bytes} B");
    }
    let rounded = (size * 10.0).round() / 10.0;
    if (rounded - rounded.trunc()).abs() < f64::EPSILON {
        format!("{rounded:.0} {}", UNITS[idx])
    } else {
        format!("{rounded:.1} {}", UNITS[idx])
    }
}

/// Bundle identifiers from an array or a comma/whitespace separated string.
///
/// Entries that do not look like reverse-DNS identifiers are dropped;
/// duplicates are removed preserving first occurrence.
#[must_use]
pub fn normalize_bundle_ids(raw: &Value) -> Vec<String> {
    let candidates: Vec<String> = match raw {
        Value::String(s) => s
            .split(|c: char| c == ',' || c == ';' || c.is_whitespace())
            .map(str::to_owned)
            .collect(),
        Value::Array(items) => items
            .iter()
            .filter_map(|v| match v {
                Value::Object(o) => o.get("id").or_else(|| o.get("bundle_id")).and_then(scalar_string),
                _ => scalar_string(v),
            })
            .collect(),
        _ => Vec::new(),
    };

    let mut seen = HashSet::new();
    candidates
        .into_iter()
        .map(|c| c.trim().to_owned())
        .filter(|c| BUNDLE_ID_RE.is_match(c))
        .filter(|c| seen.insert(c.to_ascii_lowercase()))
        .collect()
}

/// Lowercase, hyphen-separated ASCII slug.
#[must_use]
pub fn slugify(text: &str) -> String {
    let mut slug = String::with_capacity(text.len());
    for c in text.chars() {
        if c.is_ascii_alphanumeric() {
            slug.push(c.to_ascii_lowercase());
        } else if !slug.is_empty() && !slug.ends_with('-') {
            slug.push('-');
        }
    }
    while slug.ends_with('-') {
        slug.pop();
    }
    slug
}

/// Vendor of an app object.
///
/// Returns structured [`VendorData`] when the developer object carries an
/// id, and the display name either way.
#[must_use]
pub fn normalize_vendor(app: &Value) -> (Option<VendorData>, Option<String>) {
    let Some(dev) = ["developer", "vendor", "publisher"]
        .iter()
        .filter_map(|k| app.get(*k))
        .find(|v| !v.is_null())
    else {
        return (None, None);
    };

    if dev.is_string() {
        return (None, scalar_string(dev));
    }

    let title = first_str(dev, &["name", "title"]);
    let Some(title) = title else {
        return (None, None);
    };
    let vendor_data = first_str(dev, &["id", "external_id"]).map(|external_id| VendorData {
        external_id,
        description: first_str(dev, &["description", "bio"])
            .map(|d| clean_html(&d, false))
            .unwrap_or_default(),
        slug: Some(first_str(dev, &["slug"]).unwrap_or_else(|| slugify(&title))),
        logo_url: dev
            .get("logo")
            .or_else(|| dev.get("logo_url"))
            .or_else(|| dev.get("avatar"))
            .and_then(best_screenshot_url),
        title: title.clone(),
    });
    (vendor_data, Some(title))
}

/// An [`ImportRecord`] whose images have not been stored yet.
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedApp {
    pub record: ImportRecord,
    /// Remote icon URL, to be stored locally.
    pub icon_url: Option<String>,
    /// Remote screenshot URLs, largest rendition each.
    pub screenshot_urls: Vec<String>,
}

/// Builds a record from a listing summary and the extracted detail page.
///
/// Returns `None` when no name or description can be found. Category ids
/// are left unset for the resolver; `icon` and `screenshots` stay empty
/// until the images are stored.
#[must_use]
pub fn normalize_app(summary: &ListingSummary, extracted: &ExtractedApp) -> Option<NormalizedApp> {
    let app = &extracted.details;
    let name = extracted
        .name
        .clone()
        .or_else(|| Some(summary.name.trim().to_owned()).filter(|n| !n.is_empty()))?;
    let description_html = extracted.description.as_deref()?;
    let description = clean_html(description_html, false);
    if description.is_empty() {
        return None;
    }

    let requirements = app
        .get("requirements")
        .or_else(|| app.get("system_requirements"))
        .map(process_requirements)
        .unwrap_or_default();
    let (vendor_data, vendor) = normalize_vendor(app);
    let version = extracted.version.clone().or_else(|| summary.version.clone());
    let base = summary.detail_url.as_str();

    let icon_url = ["icon", "icon_url", "logo"]
        .iter()
        .filter_map(|k| app.get(*k))
        .find_map(best_screenshot_url)
        .or_else(|| summary.icon_url.clone())
        .and_then(|u| absolutize_url(base, &u));
    let screenshot_urls = app
        .get("screenshots")
        .or_else(|| app.get("images"))
        .and_then(Value::as_array)
        .map(|shots| {
            shots
                .iter()
                .filter_map(best_screenshot_url)
                .filter_map(|u| absolutize_url(base, &u))
                .collect()
        })
        .unwrap_or_default();

    let file_size = match app.get("file_size").or_else(|| app.get("size")) {
        Some(Value::Number(n)) => n.as_u64().filter(|b| *b > 0).map(format_file_size),
        Some(v) => scalar_string(v),
        None => None,
    };
    let is_beta = first_bool(app, &["is_beta", "beta"]).unwrap_or_else(|| {
        version
            .as_deref()
            .is_some_and(|v| v.to_ascii_lowercase().contains("beta"))
    });
    let is_supported = first_bool(app, &["is_supported", "supported"]).unwrap_or(true)
        && !first_bool(app, &["discontinued", "is_discontinued"]).unwrap_or(false);
    let category = extracted
        .category
        .clone()
        .map(|c| RecordCategory {
            name: c.name,
            parent_name: c.parent_name,
            source_id: c.source_id,
            external_category_id: None,
            external_subcategory_id: None,
        })
        .unwrap_or_default();

    let record = ImportRecord {
        name,
        short_description: first_str(app, &["short_description", "shortDescription", "summary", "tagline"])
            .map(|s| clean_html(&s, false))
            .filter(|s| !s.is_empty()),
        full_content: clean_html(description_html, true),
        description,
        category,
        website: first_str(app, &["website", "developer_url", "homepage", "developer.website"])
            .unwrap_or_else(|| summary.detail_url.clone()),
        icon: None,
        screenshots: Vec::new(),
        version,
        requirements: requirements.requirements,
        other_requirements: requirements.other_requirements,
        release_notes: first_str(app, &["release_notes", "whats_new", "changelog", "current_version.release_notes"])
            .map(|s| clean_html(&s, false))
            .filter(|s| !s.is_empty()),
        vendor_data,
        license: first_str(app, &["license", "license_type"]),
        file_size,
        bundle_ids: app
            .get("bundle_ids")
            .or_else(|| app.get("bundleIds"))
            .or_else(|| app.get("bundle_id"))
            .map(normalize_bundle_ids)
            .unwrap_or_default(),
        price: Some(format_price(app.get("price").unwrap_or(&Value::Null))),
        download_count: first_i64(app, &["downloads", "download_count", "downloads_count"]),
        is_beta,
        vendor,
        monetization: first_str(app, &["monetization", "pricing_model", "price_type"]),
        is_supported,
        download_url: first_str(app, &["download_url", "download_link"]),
        purchase_url: first_str(app, &["purchase_url", "buy_url", "store_url"]),
        release_date: parse_date(app, RELEASE_DATE_FIELDS),
        last_scan_date: parse_date(app, LAST_SCAN_FIELDS),
    };

    Some(NormalizedApp {
        record,
        icon_url,
        screenshot_urls,
    })
}

#[cfg(test)]
#[path = "normalize_test.rs"]
mod tests;
