use super::*;
use crate::extract::{ExtractionSource, RawCategory};
use serde_json::json;

// -----------------------------------------------------------------------
// clean_html
// -----------------------------------------------------------------------

#[test]
fn clean_html_strips_tags_and_unescapes() {
    let html = "<p>Move &amp; resize <b>windows</b>.</p><p>Fast&nbsp;&#8211; free</p>";
    assert_eq!(
        clean_html(html, false),
        "Move & resize windows.\nFast \u{2013} free"
    );
}

#[test]
fn clean_html_turns_breaks_and_list_items_into_lines() {
    let html = "Line one<br>Line two<ul><li>A</li><li>B</li></ul>";
    assert_eq!(clean_html(html, false), "Line one\nLine two\nA\nB");
}

#[test]
fn clean_html_drops_scripts_styles_and_comments() {
    let html = "<style>p{color:red}</style><p>Hello</p><!-- hidden --><script>alert(1)</script>";
    assert_eq!(clean_html(html, false), "Hello");
}

#[test]
fn clean_html_collapses_blank_lines() {
    let html = "<p>One</p>\n\n\n<p>   Two   words </p>\n\n";
    assert_eq!(clean_html(html, false), "One\n\nTwo words");
}

#[test]
fn clean_html_preserve_keeps_markup() {
    let html = "<div>\n  <p>Hello   <b>world</b></p>\n  <script>x()</script>\n</div>";
    assert_eq!(
        clean_html(html, true),
        "<div><p>Hello <b>world</b></p></div>"
    );
}

#[test]
fn clean_html_leaves_unknown_entities() {
    assert_eq!(clean_html("a &bogus; b", false), "a &bogus; b");
    assert_eq!(clean_html("", false), "");
}

// -----------------------------------------------------------------------
// format_price
// -----------------------------------------------------------------------

#[test]
fn format_price_cents_object() {
    assert_eq!(format_price(&json!({"value": 999, "currency": "USD"})), "$9.99");
    assert_eq!(format_price(&json!({"value": 1500, "currency": "eur"})), "\u{20ac}15.00");
    assert_eq!(format_price(&json!({"value": "2499"})), "$24.99");
}

#[test]
fn format_price_unknown_currency_uses_code_suffix() {
    assert_eq!(format_price(&json!({"value": 1234, "currency": "CHF"})), "12.34 CHF");
}

#[test]
fn format_price_defaults_to_free() {
    assert_eq!(format_price(&Value::Null), "Free");
    assert_eq!(format_price(&json!({"value": 0, "currency": "USD"})), "Free");
    assert_eq!(format_price(&json!({"currency": "USD"})), "Free");
    assert_eq!(format_price(&json!({"value": "n/a"})), "Free");
    assert_eq!(format_price(&json!("")), "Free");
    assert_eq!(format_price(&json!([1, 2])), "Free");
}

#[test]
fn format_price_passes_strings_through() {
    assert_eq!(format_price(&json!("Free")), "Free");
    assert_eq!(format_price(&json!(" $4.99 ")), "$4.99");
}

#[test]
fn format_price_bare_number_is_usd_cents() {
    assert_eq!(format_price(&json!(499)), "$4.99");
}

// -----------------------------------------------------------------------
// best_screenshot_url
// -----------------------------------------------------------------------

#[test]
fn best_screenshot_prefers_largest_png() {
    let raw = json!({
        "small": "https://cdn.example.com/s.jpg",
        "medium_png": "https://cdn.example.com/m.png",
        "large": "https://cdn.example.com/l.jpg",
        "large_png": "https://cdn.example.com/l.png"
    });
    assert_eq!(
        best_screenshot_url(&raw).as_deref(),
        Some("https://cdn.example.com/l.png")
    );
}

#[test]
fn best_screenshot_falls_through_renditions() {
    let raw = json!({"large_png": "", "medium": {"url": "https://cdn.example.com/m.jpg"}});
    assert_eq!(
        best_screenshot_url(&raw).as_deref(),
        Some("https://cdn.example.com/m.jpg")
    );
    assert_eq!(
        best_screenshot_url(&json!({"src": "https://cdn.example.com/x.png"})).as_deref(),
        Some("https://cdn.example.com/x.png")
    );
    assert_eq!(best_screenshot_url(&json!({"alt": "nothing"})), None);
    assert_eq!(best_screenshot_url(&json!(12)), None);
}

// -----------------------------------------------------------------------
// parse_date
// -----------------------------------------------------------------------

#[test]
fn parse_date_accepts_common_formats() {
    let expected = Utc.with_ymd_and_hms(2024, 3, 5, 0, 0, 0).unwrap();
    assert_eq!(parse_date(&json!({"date": "2024-03-05"}), &["date"]), Some(expected));
    assert_eq!(
        parse_date(&json!({"date": "2024-03-05T00:00:00Z"}), &["date"]),
        Some(expected)
    );
    assert_eq!(
        parse_date(&json!({"date": "2024-03-05 00:00:00"}), &["date"]),
        Some(expected)
    );
    assert_eq!(parse_date(&json!({"date": 1_709_596_800}), &["date"]), Some(expected));
    assert_eq!(
        parse_date(&json!({"date": 1_709_596_800_000_i64}), &["date"]),
        Some(expected)
    );
    assert_eq!(parse_date(&json!({"date": "1709596800"}), &["date"]), Some(expected));
}

#[test]
fn parse_date_tries_candidates_in_order() {
    let obj = json!({"release_date": "not a date", "updated_at": "2023-12-31"});
    let parsed = parse_date(&obj, &["missing", "release_date", "updated_at"]).unwrap();
    assert_eq!(parsed, Utc.with_ymd_and_hms(2023, 12, 31, 0, 0, 0).unwrap());
}

#[test]
fn parse_date_invalid_is_none() {
    assert_eq!(parse_date(&json!({"date": "yesterday"}), &["date"]), None);
    assert_eq!(parse_date(&json!({"date": "2024-13-45"}), &["date"]), None);
    assert_eq!(parse_date(&json!({"date": 0}), &["date"]), None);
    assert_eq!(parse_date(&json!({"date": null}), &["date"]), None);
}

// -----------------------------------------------------------------------
// file size, bundle ids, slug, vendor
// -----------------------------------------------------------------------

#[test]
fn format_file_size_uses_1024_units() {
    assert_eq!(format_file_size(512), "512 B");
    assert_eq!(format_file_size(2048), "2 KB");
    assert_eq!(format_file_size(13_107_200), "12.5 MB");
    assert_eq!(format_file_size(3 * 1024 * 1024 * 1024), "3 GB");
}

#[test]
fn normalize_bundle_ids_validates_and_dedupes() {
    assert_eq!(
        normalize_bundle_ids(&json!("com.knollsoft.Rectangle, com.knollsoft.rectangle not-an-id")),
        vec!["com.knollsoft.Rectangle".to_owned()]
    );
    assert_eq!(
        normalize_bundle_ids(&json!([{"id": "org.videolan.vlc"}, "com.apple.Safari", 7])),
        vec!["org.videolan.vlc".to_owned(), "com.apple.Safari".to_owned()]
    );
    assert!(normalize_bundle_ids(&Value::Null).is_empty());
}

#[test]
fn slugify_collapses_separators() {
    assert_eq!(slugify("Ryan Hanson, LLC"), "ryan-hanson-llc");
    assert_eq!(slugify("  --Hello__World!! "), "hello-world");
    assert_eq!(slugify("日本"), "");
}

#[test]
fn normalize_vendor_structured_and_plain() {
    let (data, name) = normalize_vendor(&json!({"developer": {
        "id": 981, "name": "Ryan Hanson", "description": "<p>Indie dev</p>",
        "logo": {"medium": "https://cdn.example.com/logo.png"}
    }}));
    let data = data.unwrap();
    assert_eq!(data.external_id, "981");
    assert_eq!(data.title, "Ryan Hanson");
    assert_eq!(data.description, "Indie dev");
    assert_eq!(data.slug.as_deref(), Some("ryan-hanson"));
    assert_eq!(data.logo_url.as_deref(), Some("https://cdn.example.com/logo.png"));
    assert_eq!(name.as_deref(), Some("Ryan Hanson"));

    let (data, name) = normalize_vendor(&json!({"vendor": "Acme"}));
    assert!(data.is_none());
    assert_eq!(name.as_deref(), Some("Acme"));

    assert_eq!(normalize_vendor(&json!({})), (None, None));
}

// -----------------------------------------------------------------------
// normalize_app
// -----------------------------------------------------------------------

fn summary() -> ListingSummary {
    ListingSummary {
        name: "Rectangle".to_owned(),
        version: Some("0.79".to_owned()),
        icon_url: Some("/icons/rectangle.png".to_owned()),
        detail_url: "https://www.macupdate.com/app/mac/61211/rectangle".to_owned(),
        external_id: Some("61211".to_owned()),
    }
}

fn structured(details: Value) -> ExtractedApp {
    ExtractedApp {
        source: ExtractionSource::Structured,
        name: first_str(&details, &["title"]),
        description: first_str(&details, &["description"]),
        version: first_str(&details, &["version"]),
        category: Some(RawCategory {
            name: "Window Management".to_owned(),
            parent_name: Some("Productivity".to_owned()),
            source_id: Some("17".to_owned()),
        }),
        details,
    }
}

#[test]
fn normalize_app_builds_full_record() {
    let extracted = structured(json!({
        "title": "Rectangle",
        "description": "<p>Move &amp; resize windows.</p>",
        "short_description": "Window manager",
        "version": "0.80",
        "price": {"value": 999, "currency": "USD"},
        "size": 13_107_200,
        "requirements": "macOS 10.15 or later\nIntel or Apple Silicon\nAccessibility permission",
        "developer": {"id": 981, "name": "Ryan Hanson"},
        "screenshots": [
            {"large_png": "https://cdn.example.com/1.png", "small": "https://cdn.example.com/1s.jpg"},
            {"medium": "//cdn.example.com/2.jpg"}
        ],
        "icon": "https://cdn.example.com/icon.png",
        "bundle_ids": ["com.knollsoft.Rectangle"],
        "downloads": 120_345,
        "release_date": "2024-03-05"
    }));

    let normalized = normalize_app(&summary(), &extracted).unwrap();
    let record = &normalized.record;
    assert_eq!(record.name, "Rectangle");
    assert_eq!(record.description, "Move & resize windows.");
    assert_eq!(record.full_content, "<p>Move &amp; resize windows.</p>");
    assert_eq!(record.short_description.as_deref(), Some("Window manager"));
    assert_eq!(record.version.as_deref(), Some("0.80"));
    assert_eq!(record.price.as_deref(), Some("$9.99"));
    assert_eq!(record.file_size.as_deref(), Some("12.5 MB"));
    assert_eq!(
        record.requirements.as_deref(),
        Some("macOS 10.15 or later\nIntel or Apple Silicon")
    );
    assert_eq!(
        record.other_requirements.as_deref(),
        Some("Accessibility permission")
    );
    assert_eq!(record.vendor_external_id(), Some("981"));
    assert_eq!(record.vendor.as_deref(), Some("Ryan Hanson"));
    assert_eq!(record.category.name, "Window Management");
    assert_eq!(record.category.source_id.as_deref(), Some("17"));
    assert!(record.category.external_category_id.is_none());
    assert_eq!(record.bundle_ids, vec!["com.knollsoft.Rectangle".to_owned()]);
    assert_eq!(record.download_count, Some(120_345));
    assert!(record.release_date.is_some());
    assert!(record.is_supported);
    assert!(!record.is_beta);
    assert_eq!(record.website, summary().detail_url);
    assert!(record.icon.is_none());
    assert!(record.screenshots.is_empty());

    assert_eq!(
        normalized.icon_url.as_deref(),
        Some("https://cdn.example.com/icon.png")
    );
    assert_eq!(
        normalized.screenshot_urls,
        vec![
            "https://cdn.example.com/1.png".to_owned(),
            "https://cdn.example.com/2.jpg".to_owned()
        ]
    );
}

#[test]
fn normalize_app_falls_back_to_summary_fields() {
    let extracted = ExtractedApp {
        source: ExtractionSource::Dom,
        name: None,
        description: Some("A window manager".to_owned()),
        version: None,
        category: None,
        details: json!({}),
    };
    let normalized = normalize_app(&summary(), &extracted).unwrap();
    assert_eq!(normalized.record.name, "Rectangle");
    assert_eq!(normalized.record.version.as_deref(), Some("0.79"));
    assert_eq!(normalized.record.price.as_deref(), Some("Free"));
    assert!(normalized.record.category.name.is_empty());
    assert_eq!(
        normalized.icon_url.as_deref(),
        Some("https://www.macupdate.com/icons/rectangle.png")
    );
}

#[test]
fn normalize_app_without_description_is_none() {
    let mut extracted = structured(json!({"title": "Rectangle"}));
    extracted.description = None;
    assert!(normalize_app(&summary(), &extracted).is_none());

    extracted.description = Some("<p> </p>".to_owned());
    assert!(normalize_app(&summary(), &extracted).is_none());
}

#[test]
fn normalize_app_detects_beta_from_version() {
    let extracted = structured(json!({
        "title": "Nightly",
        "description": "Preview build",
        "version": "2.0 beta 3",
        "discontinued": true
    }));
    let record = normalize_app(&summary(), &extracted).unwrap().record;
    assert!(record.is_beta);
    assert!(!record.is_supported);
}
