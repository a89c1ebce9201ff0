use std::sync::LazyLock;

use regex::Regex;
use serde_json::Value;

use crate::model::NOT_AVAILABLE;

static PRICE_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(\d+(?:\.\d+)?)").unwrap());
static SURFACE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\d+(?:[.,]\d+)?)\s*m²").unwrap());
static ROOMS_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(\d+)\s*pièce").unwrap());

const SURFACE_MARKER: &str = "m²";
const ROOMS_MARKER: &str = "pièce";

pub const SHARED_FLAT_KEYWORDS: &[&str] = &["colocation", "coloc", "colocataire"];
pub const STUDIO_KEYWORDS: &[&str] = &["studio"];

/// Price from a number or a label like `"1 250,50 €"`.
pub fn extract_price(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => extract_price_text(s),
        _ => None,
    }
}

pub fn extract_price_text(text: &str) -> Option<f64> {
    let trimmed = text.trim();
    if trimmed.is_empty() || trimmed == NOT_AVAILABLE {
        return None;
    }
    // Thousands are separated by (narrow) no-break spaces in French labels.
    let compact: String = trimmed
        .chars()
        .filter(|c| !c.is_whitespace())
        .map(|c| if c == ',' { '.' } else { c })
        .collect();
    PRICE_RE
        .captures(&compact)
        .and_then(|caps| caps[1].parse::<f64>().ok())
}

pub fn extract_surface_m2<S: AsRef<str>>(features: &[S]) -> Option<f64> {
    features
        .iter()
        .map(AsRef::as_ref)
        .filter(|f| f.contains(SURFACE_MARKER))
        .find_map(|f| {
            let caps = SURFACE_RE.captures(f)?;
            caps[1].replace(',', ".").parse::<f64>().ok()
        })
}

pub fn extract_room_count<S: AsRef<str>>(features: &[S]) -> Option<u32> {
    features
        .iter()
        .map(AsRef::as_ref)
        .filter(|f| f.contains(ROOMS_MARKER))
        .find_map(|f| ROOMS_RE.captures(f)?[1].parse::<u32>().ok())
}

pub fn contains_any_keyword(text: &str, keywords: &[&str]) -> bool {
    if text.is_empty() {
        return false;
    }
    let lower = text.to_lowercase();
    keywords.iter().any(|kw| lower.contains(&kw.to_lowercase()))
}
