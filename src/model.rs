use std::fmt;

use indexmap::IndexMap;
use serde::ser::{SerializeMap, Serializer};
use serde::Serialize;
use serde_json::{Map, Value};

use crate::pipeline::extract;

/// Upstream listing object, untouched.
pub type RawRecord = Map<String, Value>;

/// Listing set as loaded from a snapshot file, in file order.
pub type RawRecords = Map<String, Value>;

/// Keyed canonical records, in input order.
pub type Listings = IndexMap<String, CanonicalRecord>;

pub const UNKNOWN: &str = "unknown";
pub const NOT_AVAILABLE: &str = "N/A";
pub const ACCEPTANCE_NOTE: &str = "criteria-met";

// ── Canonical record ──

/// Wire keys follow the scraper's snapshot format so an exported set can be
/// fed back in as already-canonical input.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CanonicalRecord {
    #[serde(rename = "lien")]
    pub link: Option<String>,
    #[serde(rename = "type")]
    pub property_type: String,
    #[serde(rename = "prix")]
    pub price_raw: PriceRaw,
    #[serde(rename = "localisation")]
    pub location: String,
    #[serde(rename = "specificite")]
    pub features: Vec<String>,
    pub description: String,
    #[serde(rename = "surface_m2")]
    pub surface_area_m2: Option<f64>,
    #[serde(rename = "nombre_pieces")]
    pub room_count: Option<u32>,
    #[serde(rename = "colocation")]
    pub is_shared_flat: bool,
    #[serde(rename = "studio")]
    pub is_studio: bool,
    #[serde(rename = "source")]
    pub source_tag: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
    #[serde(flatten)]
    pub outcome: Option<Outcome>,
}

impl CanonicalRecord {
    pub fn price(&self) -> Option<f64> {
        self.price_raw.value()
    }

    /// Structured surface first, then the first m²-tagged feature.
    pub fn resolved_surface(&self) -> Option<f64> {
        self.surface_area_m2
            .or_else(|| extract::extract_surface_m2(&self.features))
    }

    pub fn resolved_rooms(&self) -> Option<u32> {
        self.room_count
            .or_else(|| extract::extract_room_count(&self.features))
    }

    pub fn is_accepted(&self) -> bool {
        matches!(self.outcome, Some(Outcome::Accepted { .. }))
    }
}

/// Price as the source gave it. The numeric value is always derived.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum PriceRaw {
    Amount(f64),
    Label(String),
}

impl PriceRaw {
    pub fn not_available() -> Self {
        PriceRaw::Label(NOT_AVAILABLE.to_string())
    }

    pub fn value(&self) -> Option<f64> {
        match self {
            PriceRaw::Amount(n) => Some(*n),
            PriceRaw::Label(s) => extract::extract_price_text(s),
        }
    }
}

impl fmt::Display for PriceRaw {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PriceRaw::Amount(n) => write!(f, "{} €", n),
            PriceRaw::Label(s) => f.write_str(s),
        }
    }
}

// ── Outcome ──

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RejectionReason {
    SharedFlat,
    Studio,
    InvalidPrice,
    InvalidSurface,
}

impl RejectionReason {
    pub fn code(self) -> &'static str {
        match self {
            RejectionReason::SharedFlat => "shared-flat",
            RejectionReason::Studio => "studio",
            RejectionReason::InvalidPrice => "invalid-price",
            RejectionReason::InvalidSurface => "invalid-surface",
        }
    }
}

impl fmt::Display for RejectionReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    Accepted { note: String },
    Rejected { reasons: Vec<RejectionReason> },
}

impl Outcome {
    pub fn reason_text(&self) -> String {
        match self {
            Outcome::Accepted { note } => note.clone(),
            Outcome::Rejected { reasons } => reasons
                .iter()
                .map(|r| r.code())
                .collect::<Vec<_>>()
                .join(", "),
        }
    }
}

/// Flattened into the record as `VALIDE` plus `validation_reason` or
/// `rejection_reason`.
impl Serialize for Outcome {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(2))?;
        match self {
            Outcome::Accepted { note } => {
                map.serialize_entry("VALIDE", &true)?;
                map.serialize_entry("validation_reason", note)?;
            }
            Outcome::Rejected { .. } => {
                map.serialize_entry("VALIDE", &false)?;
                map.serialize_entry("rejection_reason", &self.reason_text())?;
            }
        }
        map.end()
    }
}

/// Keys written by a previous classification run. Dropped on re-ingest.
pub const OUTCOME_KEYS: &[&str] = &["VALIDE", "validation_reason", "rejection_reason"];

// ── Classification and statistics ──

#[derive(Debug, Clone, Default)]
pub struct Classification {
    pub valid: Listings,
    pub rejected: Listings,
}

impl Classification {
    pub fn len(&self) -> usize {
        self.valid.len() + self.rejected.len()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct Statistics {
    pub total_listings: usize,
    pub valid_count: usize,
    pub rejected_count: usize,
    pub validation_rate: f64,
    pub average_price: f64,
    pub average_surface: f64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record() -> CanonicalRecord {
        CanonicalRecord {
            link: Some("https://example.com/1".into()),
            property_type: "Appartement".into(),
            price_raw: PriceRaw::Label("650 €".into()),
            location: "Dijon".into(),
            features: vec!["3 pièces".into(), "52 m²".into()],
            description: String::new(),
            surface_area_m2: None,
            room_count: None,
            is_shared_flat: false,
            is_studio: false,
            source_tag: "scraped".into(),
            extra: Map::new(),
            outcome: None,
        }
    }

    #[test]
    fn unclassified_record_has_no_outcome_keys() {
        let v = serde_json::to_value(record()).unwrap();
        assert_eq!(v["prix"], json!("650 €"));
        assert_eq!(v["specificite"], json!(["3 pièces", "52 m²"]));
        assert!(v.get("VALIDE").is_none());
        assert!(v.get("rejection_reason").is_none());
    }

    #[test]
    fn rejected_outcome_is_flattened() {
        let mut r = record();
        r.outcome = Some(Outcome::Rejected {
            reasons: vec![RejectionReason::Studio, RejectionReason::InvalidPrice],
        });
        let v = serde_json::to_value(&r).unwrap();
        assert_eq!(v["VALIDE"], json!(false));
        assert_eq!(v["rejection_reason"], json!("studio, invalid-price"));
    }

    #[test]
    fn resolved_values_fall_back_to_features() {
        let mut r = record();
        assert_eq!(r.resolved_surface(), Some(52.0));
        assert_eq!(r.resolved_rooms(), Some(3));
        r.surface_area_m2 = Some(70.0);
        assert_eq!(r.resolved_surface(), Some(70.0));
    }

    #[test]
    fn numeric_price_displays_with_currency() {
        assert_eq!(PriceRaw::Amount(650.0).to_string(), "650 €");
        assert_eq!(PriceRaw::not_available().value(), None);
    }
}
