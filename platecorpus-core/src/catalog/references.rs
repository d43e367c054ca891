//! Best-effort recovery of cross references from free-text catalog values.
//!
//! The document filename heuristic is two-tier: a strict `/{id}/view` match
//! first, then a loose `/{id}/` match inside the same viewer URL. Downstream
//! joins depend on this exact behavior.

use crate::config::YearNormalizationConfig;
use regex::Regex;
use std::sync::LazyLock;

// Two lowercase letters followed by digits, e.g. `ab12345`
static STRICT_VIEW_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"/([a-z]{2}\d+)/view(?:#.*)?$").unwrap());

static LOOSE_SEGMENT_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"/([a-z]{2}\d+)/").unwrap());

static YEAR_REGEX: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\b(\d{4})\b").unwrap());

/// Recover `{identifier}.pdf` from a record's electronic-location URLs.
///
/// Only URLs pointing at a viewer (`/view` somewhere in them) are considered.
/// Returns `None` when nothing matches; callers log the rejected set.
pub fn extract_document_filename(urls: &[String]) -> Option<String> {
    for url in urls.iter().filter(|url| url.contains("/view")) {
        if let Some(caps) = STRICT_VIEW_REGEX.captures(url) {
            return Some(format!("{}.pdf", &caps[1]));
        }
        if let Some(caps) = LOOSE_SEGMENT_REGEX.captures(url) {
            return Some(format!("{}.pdf", &caps[1]));
        }
    }

    None
}

/// First whole-word run of four digits. Not validated as a calendar year.
pub fn extract_year(value: &str) -> Option<String> {
    YEAR_REGEX.captures(value).map(|caps| caps[1].to_string())
}

/// Outcome of normalizing a record's free-text year
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NormalizedYear {
    /// Year was numeric as-is
    Parsed(i32),
    /// Year was blank and the default era was substituted
    Defaulted(i32),
    /// Year matched a known transcription error
    Corrected(i32),
}

impl NormalizedYear {
    pub fn value(self) -> i32 {
        match self {
            NormalizedYear::Parsed(y) | NormalizedYear::Defaulted(y) | NormalizedYear::Corrected(y) => y,
        }
    }
}

/// Normalize a record year for image extraction.
///
/// Blank or absent → default era; a literal in the correction table → its
/// corrected value; otherwise it must parse as an integer or the record is
/// excluded (`None`).
pub fn normalize_year(year: Option<&str>, config: &YearNormalizationConfig) -> Option<NormalizedYear> {
    let raw = year.map(str::trim).unwrap_or("");
    if raw.is_empty() {
        return Some(NormalizedYear::Defaulted(config.default_year));
    }
    if let Some(corrected) = config.corrections.get(raw) {
        return Some(NormalizedYear::Corrected(*corrected));
    }
    raw.parse::<i32>().ok().map(NormalizedYear::Parsed)
}
