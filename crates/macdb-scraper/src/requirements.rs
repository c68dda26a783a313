//! Splits scraped requirement text into system requirements (OS,
//! architecture, CPU/GPU, memory/storage) and everything else.

use std::collections::HashSet;
use std::sync::LazyLock;

use regex::Regex;
use serde_json::Value;

use crate::fields::get_path;
use crate::normalize::clean_html;

static OS_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(mac\s*os(\s*x)?|macos|os\s*x|osx|sonoma|ventura|monterey|big\s+sur|catalina|mojave|sequoia)\b")
        .expect("valid regex")
});

static ARCH_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(architecture|apple\s+silicon|intel|arm64|x86[_-]64|64-bit|32-bit|universal(\s+binary)?|rosetta)\b")
        .expect("valid regex")
});

static CPU_GPU_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(cpu|gpu|processor|core\s*(i[3579]|duo|2)|m[1-4](\s+(pro|max|ultra))?|graphics|metal|opengl|vram)\b")
        .expect("valid regex")
});

static MEMORY_STORAGE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(\b\d+(\.\d+)?\s*(kb|mb|gb|tb)\b|\b(ram|memory|disk\s+space|storage|hard\s+drive)\b)")
        .expect("valid regex")
});

static SIZE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\b(\d+(?:\.\d+)?)\s*(mb|gb|tb)\b").expect("valid regex"));

/// Keys holding system requirement text in a structured requirements object.
const SYSTEM_KEYS: &[&str] = &[
    "list",
    "system",
    "os",
    "min_os",
    "minimum_os",
    "architecture",
    "cpu",
    "memory",
    "text",
];

/// Sources of other requirements, in precedence order.
const OTHER_KEYS: &[&str] = &["other_list", "other_requirements", "other"];

/// Classified requirement text, one requirement per line.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Requirements {
    pub requirements: Option<String>,
    pub other_requirements: Option<String>,
}

/// `true` when `line` describes OS, architecture, CPU/GPU, or memory/storage.
#[must_use]
pub fn is_system_requirement(line: &str) -> bool {
    OS_RE.is_match(line)
        || ARCH_RE.is_match(line)
        || CPU_GPU_RE.is_match(line)
        || MEMORY_STORAGE_RE.is_match(line)
}

/// Rewrites sizes so that 1024 MB reads `1 GB` and 1024 GB reads `1 TB`.
#[must_use]
pub fn normalize_size_units(line: &str) -> String {
    SIZE_RE
        .replace_all(line, |caps: &regex::Captures<'_>| {
            let Ok(mut amount) = caps[1].parse::<f64>() else {
                return caps[0].to_owned();
            };
            let units = ["MB", "GB", "TB"];
            let mut idx = units
                .iter()
                .position(|u| u.eq_ignore_ascii_case(&caps[2]))
                .unwrap_or(0);
            while amount >= 1024.0 && idx + 1 < units.len() {
                amount /= 1024.0;
                idx += 1;
            }
            format!("{} {}", format_amount(amount), units[idx])
        })
        .into_owned()
}

fn format_amount(amount: f64) -> String {
    let rounded = (amount * 10.0).round() / 10.0;
    if (rounded - rounded.trunc()).abs() < f64::EPSILON {
        format!("{rounded:.0}")
    } else {
        format!("{rounded:.1}")
    }
}

/// Classifies requirement text into system and other requirements.
///
/// `raw` may be free text (one requirement per line), an array of lines, or
/// an object. For objects, system text is read from the usual keys and the
/// other-requirement sources are consulted in order `other_list`,
/// `other_requirements`, `other` (HTML): the first source that yields other
/// lines wins; later sources only contribute system lines not already seen.
/// Non-system lines found under the system keys are used only when none of
/// the other sources yields anything.
///
/// Other-requirement lines are deduplicated. Never fails; unrecognized
/// shapes produce an empty result.
#[must_use]
pub fn process_requirements(raw: &Value) -> Requirements {
    let mut acc = Accumulator::default();

    match raw {
        Value::Object(_) => {
            let mut stray = Vec::new();
            for key in SYSTEM_KEYS {
                if let Some(value) = get_path(raw, key) {
                    acc.classify(lines_of(value), OtherLines::Into(&mut stray));
                }
            }
            for key in OTHER_KEYS {
                if let Some(value) = get_path(raw, key) {
                    let lines = lines_of(value);
                    if acc.other.is_empty() {
                        acc.classify(lines, OtherLines::Keep);
                    } else {
                        acc.classify(lines, OtherLines::Drop);
                    }
                }
            }
            if acc.other.is_empty() {
                acc.classify(stray, OtherLines::Keep);
            }
        }
        _ => acc.classify(lines_of(raw), OtherLines::Keep),
    }

    acc.finish()
}

/// Convenience wrapper over [`process_requirements`] for plain text.
#[must_use]
pub fn process_requirements_text(text: &str) -> Requirements {
    process_requirements(&Value::String(text.to_owned()))
}

/// Where [`Accumulator::classify`] sends lines that are not system requirements.
enum OtherLines<'a> {
    Keep,
    Into(&'a mut Vec<String>),
    Drop,
}

#[derive(Default)]
struct Accumulator {
    system: Vec<String>,
    other: Vec<String>,
    seen_system: HashSet<String>,
    seen_other: HashSet<String>,
}

impl Accumulator {
    fn classify(&mut self, lines: Vec<String>, mut other: OtherLines<'_>) {
        for line in lines {
            let key = line.to_lowercase();
            if is_system_requirement(&line) {
                if self.seen_system.insert(key) {
                    self.system.push(normalize_size_units(&line));
                }
                continue;
            }
            match &mut other {
                OtherLines::Keep => {
                    if self.seen_other.insert(key) {
                        self.other.push(line);
                    }
                }
                OtherLines::Into(held) => held.push(line),
                OtherLines::Drop => {}
            }
        }
    }

    fn finish(self) -> Requirements {
        let join = |lines: Vec<String>| (!lines.is_empty()).then(|| lines.join("\n"));
        Requirements {
            requirements: join(self.system),
            other_requirements: join(self.other),
        }
    }
}

/// Flattens a requirements value into trimmed, non-empty lines. Strings are
/// treated as possibly-HTML text.
fn lines_of(value: &Value) -> Vec<String> {
    match value {
        Value::String(s) => clean_html(s, false)
            .lines()
            .map(|l| l.trim().trim_start_matches(['-', '*', '•']).trim().to_owned())
            .filter(|l| !l.is_empty())
            .collect(),
        Value::Array(items) => items.iter().flat_map(lines_of).collect(),
        Value::Object(obj) => ["text", "name", "value", "title"]
            .iter()
            .find_map(|k| obj.get(*k))
            .map(lines_of)
            .unwrap_or_default(),
        Value::Number(n) => vec![n.to_string()],
        Value::Null | Value::Bool(_) => Vec::new(),
    }
}
