use serde_json::{Map, Value};
use thiserror::Error;
use tracing::{debug, warn};

use super::extract::{
    contains_any_keyword, extract_price, SHARED_FLAT_KEYWORDS, STUDIO_KEYWORDS,
};
use crate::model::{
    CanonicalRecord, Listings, PriceRaw, RawRecord, RawRecords, NOT_AVAILABLE, OUTCOME_KEYS,
    UNKNOWN,
};

const LISTING_URL_BASE: &str = "https://www.seloger.com/annonces/locations/appartement";

pub const SOURCE_STRUCTURED_API: &str = "api_seloger";
pub const SOURCE_SCRAPED: &str = "scraped";

/// Canonical wire keys, read directly for already-canonical records.
const CANONICAL_KEYS: &[&str] = &[
    "lien",
    "type",
    "prix",
    "localisation",
    "specificite",
    "description",
    "surface_m2",
    "nombre_pieces",
    "colocation",
    "studio",
    "source",
];

const AMENITIES: &[(&str, &str)] = &[
    ("has_balcony", "Balcon"),
    ("has_terrace", "Terrasse"),
    ("has_garden", "Jardin"),
    ("has_parking", "Parking"),
    ("has_elevator", "Ascenseur"),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordShape {
    /// Export of the listing site's API (`annonce_id`, `object`, `description`).
    StructuredApi,
    /// Scraper snapshot or a previous export.
    AlreadyCanonical,
    Unknown,
}

impl RecordShape {
    /// Probes run A before B: a malformed API record can also carry `prix`.
    pub fn detect(item: &RawRecord) -> Self {
        let has = |k: &str| item.contains_key(k);
        if has("object") && has("annonce_id") && has("description") {
            RecordShape::StructuredApi
        } else if has("prix") && (has("lien") || has("type")) {
            RecordShape::AlreadyCanonical
        } else {
            RecordShape::Unknown
        }
    }
}

#[derive(Debug, Error, PartialEq)]
pub enum ShapeError {
    #[error("listing is not a JSON object")]
    NotAnObject,
    #[error("field `{field}` is not a number")]
    NotANumber { field: &'static str },
    #[error("field `{field}` is not a non-negative whole number")]
    NotACount { field: &'static str },
    #[error("field `{field}` is not a string")]
    NotAString { field: &'static str },
}

#[derive(Debug, Clone, PartialEq)]
pub struct SkippedRecord {
    pub key: String,
    pub reason: String,
}

#[derive(Debug, Clone, Default)]
pub struct Normalized {
    pub records: Listings,
    pub skipped: Vec<SkippedRecord>,
}

pub fn normalize(raw: &RawRecords) -> Normalized {
    let mut out = Normalized::default();

    for (key, value) in raw {
        match normalize_one(value) {
            Ok(record) => {
                out.records.insert(key.clone(), record);
            }
            Err(e) => {
                debug!(key = %key, error = %e, "Dropping listing");
                out.skipped.push(SkippedRecord {
                    key: key.clone(),
                    reason: e.to_string(),
                });
            }
        }
    }

    if !out.skipped.is_empty() {
        warn!("{} records skipped during normalization", out.skipped.len());
    }
    out
}

pub fn normalize_one(value: &Value) -> Result<CanonicalRecord, ShapeError> {
    let item = value.as_object().ok_or(ShapeError::NotAnObject)?;
    match RecordShape::detect(item) {
        RecordShape::StructuredApi => from_structured_api(item),
        RecordShape::AlreadyCanonical => Ok(from_canonical(item)),
        RecordShape::Unknown => Ok(from_unknown(item)),
    }
}

// ── Shape A ──

fn from_structured_api(item: &RawRecord) -> Result<CanonicalRecord, ShapeError> {
    let description = opt_string(item, "description")?.unwrap_or_default();

    let price_raw = match price(item, "price")? {
        Some(p) if p > 0.0 => PriceRaw::Label(format!("{} €", p)),
        _ => PriceRaw::not_available(),
    };

    let listing_id = item.get("annonce_id").map(display_value).unwrap_or_default();
    let link = (!listing_id.is_empty())
        .then(|| format!("{}/{}.htm", LISTING_URL_BASE, listing_id));

    let property_type = if flag(item, "has_furnished") {
        "Appartement meublé"
    } else {
        "Appartement"
    };

    let address = item.get("address").map(display_value).unwrap_or_default();
    let district = item.get("district").map(display_value).unwrap_or_default();
    let location = match (address.is_empty(), district.is_empty()) {
        (false, false) => format!("{}, {}", address, district),
        (false, true) => address,
        (true, false) => district,
        (true, true) => UNKNOWN.to_string(),
    };

    let rooms = count(item, "rooms_count")?;
    let bedrooms = count(item, "bedrooms_count")?;
    let area = number(item, "area")?.trunc();

    let mut features = Vec::new();
    if rooms > 0 {
        features.push(format!("{} pièces", rooms));
    }
    if bedrooms > 0 {
        features.push(format!("{} chambres", bedrooms));
    }
    if area > 0.0 {
        features.push(format!("{} m²", area));
    }
    let floor = floor_label(item, "floor");
    let max_floor = floor_label(item, "max_floor");
    match (floor, max_floor) {
        (Some(f), Some(m)) => features.push(format!("Étage {}/{}", f, m)),
        (Some(f), None) => features.push(format!("Étage {}", f)),
        _ => {}
    }
    for (key, label) in AMENITIES {
        if flag(item, key) {
            features.push(label.to_string());
        }
    }

    let is_shared_flat = contains_any_keyword(&description, SHARED_FLAT_KEYWORDS) || rooms <= 1;
    let is_studio =
        contains_any_keyword(&description, STUDIO_KEYWORDS) || (rooms == 1 && bedrooms == 0);

    let mut extra = Map::new();
    if let Some(id) = item.get("annonce_id") {
        extra.insert("annonce_id".to_string(), id.clone());
    }

    Ok(CanonicalRecord {
        link,
        property_type: property_type.to_string(),
        price_raw,
        location,
        features,
        description,
        surface_area_m2: (area > 0.0).then_some(area),
        room_count: (rooms > 0).then_some(rooms),
        is_shared_flat,
        is_studio,
        source_tag: SOURCE_STRUCTURED_API.to_string(),
        extra,
        outcome: None,
    })
}

// ── Shape B ──

fn from_canonical(item: &RawRecord) -> CanonicalRecord {
    let extra = item
        .iter()
        .filter(|(k, _)| {
            !CANONICAL_KEYS.contains(&k.as_str()) && !OUTCOME_KEYS.contains(&k.as_str())
        })
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect();

    CanonicalRecord {
        link: lenient_string(item.get("lien")),
        property_type: lenient_string(item.get("type")).unwrap_or_else(|| UNKNOWN.to_string()),
        price_raw: lenient_price(item.get("prix")),
        location: lenient_string(item.get("localisation")).unwrap_or_else(|| UNKNOWN.to_string()),
        features: lenient_features(item.get("specificite")),
        description: lenient_string(item.get("description")).unwrap_or_default(),
        surface_area_m2: item.get("surface_m2").and_then(Value::as_f64).filter(|s| *s > 0.0),
        room_count: item
            .get("nombre_pieces")
            .and_then(Value::as_u64)
            .and_then(|n| u32::try_from(n).ok())
            .filter(|n| *n > 0),
        is_shared_flat: lenient_bool(item.get("colocation")),
        is_studio: lenient_bool(item.get("studio")),
        source_tag: lenient_string(item.get("source")).unwrap_or_else(|| SOURCE_SCRAPED.to_string()),
        extra,
        outcome: None,
    }
}

// ── Fallback ──

fn from_unknown(item: &RawRecord) -> CanonicalRecord {
    let either = |a: &str, b: &str| item.get(a).or_else(|| item.get(b));

    CanonicalRecord {
        link: lenient_string(either("lien", "url")),
        property_type: lenient_string(either("type", "property_type"))
            .unwrap_or_else(|| UNKNOWN.to_string()),
        price_raw: lenient_price(either("prix", "price")),
        location: lenient_string(either("localisation", "address"))
            .unwrap_or_else(|| UNKNOWN.to_string()),
        features: lenient_features(item.get("specificite")),
        description: lenient_string(item.get("description")).unwrap_or_default(),
        surface_area_m2: None,
        room_count: None,
        is_shared_flat: lenient_bool(item.get("colocation")),
        is_studio: lenient_bool(item.get("studio")),
        source_tag: UNKNOWN.to_string(),
        extra: Map::new(),
        outcome: None,
    }
}

// ── Field readers ──

/// Absent or null reads as zero; anything else must be numeric.
fn number(item: &RawRecord, field: &'static str) -> Result<f64, ShapeError> {
    match item.get(field) {
        None | Some(Value::Null) => Ok(0.0),
        Some(v) => v.as_f64().ok_or(ShapeError::NotANumber { field }),
    }
}

fn count(item: &RawRecord, field: &'static str) -> Result<u32, ShapeError> {
    let n = number(item, field).map_err(|_| ShapeError::NotACount { field })?;
    if n < 0.0 || n.fract() != 0.0 || n > u32::MAX as f64 {
        return Err(ShapeError::NotACount { field });
    }
    Ok(n as u32)
}

fn opt_string(item: &RawRecord, field: &'static str) -> Result<Option<String>, ShapeError> {
    match item.get(field) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => Ok(Some(s.clone())),
        Some(_) => Err(ShapeError::NotAString { field }),
    }
}

fn flag(item: &RawRecord, field: &str) -> bool {
    lenient_bool(item.get(field))
}

/// Absent, null, empty and "N/A" read as no price; other values must parse.
fn price(item: &RawRecord, field: &'static str) -> Result<Option<f64>, ShapeError> {
    match item.get(field) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) if s.trim().is_empty() || s.trim() == NOT_AVAILABLE => Ok(None),
        Some(v) => extract_price(v)
            .map(Some)
            .ok_or(ShapeError::NotANumber { field }),
    }
}

/// Floors are numbers or non-empty labels; 0 is the ground floor.
fn floor_label(item: &RawRecord, field: &str) -> Option<String> {
    match item.get(field)? {
        Value::Number(n) => Some(n.to_string()),
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        _ => None,
    }
}

fn display_value(v: &Value) -> String {
    match v {
        Value::String(s) => s.trim().to_string(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

fn lenient_string(v: Option<&Value>) -> Option<String> {
    match v? {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn lenient_price(v: Option<&Value>) -> PriceRaw {
    match v {
        Some(Value::Number(n)) => n
            .as_f64()
            .map(PriceRaw::Amount)
            .unwrap_or_else(PriceRaw::not_available),
        Some(Value::String(s)) if !s.trim().is_empty() => PriceRaw::Label(s.clone()),
        _ => PriceRaw::not_available(),
    }
}

fn lenient_features(v: Option<&Value>) -> Vec<String> {
    match v {
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(|i| match i {
                Value::String(s) => Some(s.trim().to_string()),
                Value::Number(n) => Some(n.to_string()),
                _ => None,
            })
            .filter(|s| !s.is_empty())
            .collect(),
        _ => Vec::new(),
    }
}

fn lenient_bool(v: Option<&Value>) -> bool {
    matches!(v, Some(Value::Bool(true)))
}
