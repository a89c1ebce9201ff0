pub mod classify;
pub mod extract;
pub mod normalize;
pub mod stats;

use std::path::Path;

use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::info;

use crate::model::{Classification, Listings, RawRecords, Statistics};
use crate::settings::Criteria;
use crate::store;
use normalize::SkippedRecord;

/// Normalize → classify → aggregate over one listing set.
///
/// Each stage owns its output; a refresh builds a new sorter.
pub struct ListingSorter {
    criteria: Criteria,
    normalized_count: usize,
    skipped: Vec<SkippedRecord>,
    classification: Classification,
    statistics: Statistics,
}

#[derive(Debug, Serialize)]
pub struct ExportMetadata {
    pub processed_at: DateTime<Utc>,
    pub total_count: usize,
    pub skipped_count: usize,
}

#[derive(Debug, Serialize)]
pub struct ExportDocument<'a> {
    pub statistics: &'a Statistics,
    pub valid_announcements: &'a Listings,
    pub rejected_announcements: &'a Listings,
    pub metadata: ExportMetadata,
}

impl ListingSorter {
    pub fn new(raw: &RawRecords, criteria: Criteria) -> Self {
        let normalized = normalize::normalize(raw);
        let normalized_count = normalized.records.len();
        let classification = classify::classify_all(&normalized.records, &criteria);
        debug_assert_eq!(classification.len(), normalized_count);
        let statistics = stats::compute_statistics(&classification.valid, normalized_count);

        info!(
            "Sorted {} listings: {} valid, {} rejected, {} skipped",
            normalized_count,
            classification.valid.len(),
            classification.rejected.len(),
            normalized.skipped.len()
        );

        Self {
            criteria,
            normalized_count,
            skipped: normalized.skipped,
            classification,
            statistics,
        }
    }

    pub fn valid(&self) -> &Listings {
        &self.classification.valid
    }

    pub fn rejected(&self) -> &Listings {
        &self.classification.rejected
    }

    pub fn statistics(&self) -> &Statistics {
        &self.statistics
    }

    pub fn skipped(&self) -> &[SkippedRecord] {
        &self.skipped
    }

    pub fn criteria(&self) -> &Criteria {
        &self.criteria
    }

    pub fn total_count(&self) -> usize {
        self.normalized_count
    }

    pub fn export_document(&self, processed_at: DateTime<Utc>) -> ExportDocument<'_> {
        ExportDocument {
            statistics: &self.statistics,
            valid_announcements: &self.classification.valid,
            rejected_announcements: &self.classification.rejected,
            metadata: ExportMetadata {
                processed_at,
                total_count: self.normalized_count,
                skipped_count: self.skipped.len(),
            },
        }
    }

    pub fn export_results(&self, path: &Path) -> Result<()> {
        store::write_json(path, &self.export_document(Utc::now()))?;
        info!("Exported results to {}", path.display());
        Ok(())
    }
}

// ── Tests ──

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Outcome, RejectionReason};
    use chrono::TimeZone;
    use serde_json::json;

    fn sorter(input: serde_json::Value) -> ListingSorter {
        ListingSorter::new(input.as_object().unwrap(), Criteria::default())
    }

    #[test]
    fn two_listing_scenario() {
        let s = sorter(json!({
            "a": {"prix": "550 €", "specificite": ["45 m²"], "colocation": false, "studio": false},
            "b": {"prix": "100 €", "specificite": ["20 m²"], "colocation": true, "studio": false}
        }));

        assert_eq!(s.valid().keys().collect::<Vec<_>>(), vec!["a"]);
        assert_eq!(s.rejected().keys().collect::<Vec<_>>(), vec!["b"]);
        assert_eq!(
            s.rejected()["b"].outcome,
            Some(Outcome::Rejected {
                reasons: vec![
                    RejectionReason::SharedFlat,
                    RejectionReason::InvalidPrice,
                    RejectionReason::InvalidSurface,
                ]
            })
        );
        assert_eq!(s.statistics().validation_rate, 50.0);
        assert_eq!(s.statistics().total_listings, 2);
        assert_eq!(s.statistics().average_price, 550.0);
        assert_eq!(s.statistics().average_surface, 45.0);
    }

    #[test]
    fn empty_input() {
        let s = sorter(json!({}));
        assert!(s.valid().is_empty());
        assert!(s.rejected().is_empty());
        assert_eq!(s.statistics().validation_rate, 0.0);
    }

    #[test]
    fn skipped_records_are_excluded_from_totals() {
        let s = sorter(json!({
            "ok": {"prix": "600 €", "type": "T2"},
            "bad": {"annonce_id": 1, "object": "x", "description": 42}
        }));
        assert_eq!(s.total_count(), 1);
        assert_eq!(s.skipped().len(), 1);
        assert_eq!(s.statistics().total_listings, 1);
        assert_eq!(s.valid().len() + s.rejected().len(), s.total_count());
    }

    #[test]
    fn export_document_shape() {
        let s = sorter(json!({
            "a": {"prix": "550 €", "type": "Appartement", "localisation": "Dijon Centre"},
            "b": {"prix": "2 000 €", "type": "Maison"}
        }));
        let at = Utc.with_ymd_and_hms(2025, 7, 31, 15, 19, 9).unwrap();
        let doc = serde_json::to_value(s.export_document(at)).unwrap();

        assert_eq!(doc["statistics"]["valid_count"], json!(1));
        assert_eq!(doc["valid_announcements"]["a"]["VALIDE"], json!(true));
        assert_eq!(doc["valid_announcements"]["a"]["validation_reason"], json!("criteria-met"));
        assert_eq!(doc["rejected_announcements"]["b"]["rejection_reason"], json!("invalid-price"));
        assert_eq!(doc["metadata"]["total_count"], json!(2));
        assert_eq!(doc["metadata"]["processed_at"], json!("2025-07-31T15:19:09Z"));
    }

    #[test]
    fn exported_records_reimport_with_same_partition() {
        let s = sorter(json!({
            "a": {"prix": "550 €", "type": "T2", "specificite": ["45 m²"]},
            "b": {"prix": "450 €", "type": "T1", "studio": true},
            "c": {"annonce_id": 9, "object": "appartement", "description": "", "price": 800,
                  "rooms_count": 3, "bedrooms_count": 2, "area": 70}
        }));
        let doc = serde_json::to_value(s.export_document(Utc::now())).unwrap();

        let mut again = serde_json::Map::new();
        for section in ["valid_announcements", "rejected_announcements"] {
            again.extend(doc[section].as_object().unwrap().clone());
        }
        let s2 = ListingSorter::new(&again, Criteria::default());
        assert_eq!(
            s2.valid().keys().collect::<Vec<_>>(),
            s.valid().keys().collect::<Vec<_>>()
        );
        assert_eq!(
            s2.rejected().keys().collect::<Vec<_>>(),
            s.rejected().keys().collect::<Vec<_>>()
        );
        assert_eq!(s2.valid()["c"].source_tag, "api_seloger");
        assert_eq!(s2.statistics(), s.statistics());
    }

    #[test]
    fn scraped_fixture_outcomes() {
        let text = std::fs::read_to_string("tests/fixtures/scraped.json").unwrap();
        let raw: RawRecords = serde_json::from_str(&text).unwrap();
        let s = ListingSorter::new(&raw, Criteria::default());

        assert_eq!(s.valid().keys().collect::<Vec<_>>(), vec!["page1_item0"]);
        let reason = |k: &str| s.rejected()[k].outcome.as_ref().unwrap().reason_text();
        assert_eq!(reason("page1_item1"), "studio, invalid-surface");
        assert_eq!(reason("page1_item2"), "shared-flat");
        assert_eq!(reason("page1_item3"), "invalid-price");
        assert_eq!(reason("page2_item0"), "invalid-price");
        assert_eq!(s.statistics().validation_rate, 20.0);
        assert_eq!(s.statistics().average_price, 650.0);
        assert_eq!(s.statistics().average_surface, 58.0);
    }

    #[test]
    fn mixed_fixture() {
        let text = std::fs::read_to_string("tests/fixtures/mixed.json").unwrap();
        let raw: RawRecords = serde_json::from_str(&text).unwrap();
        let s = ListingSorter::new(&raw, Criteria::default());
        assert_eq!(s.total_count() + s.skipped().len(), raw.len());
        assert_eq!(s.valid().len() + s.rejected().len(), s.total_count());
        assert!(s.valid().values().all(|r| r.is_accepted()));
        assert!(s.rejected().values().all(|r| !r.is_accepted()));

        assert_eq!(s.skipped().len(), 1);
        assert_eq!(s.skipped()[0].key, "broken-1");
        // Carries both shape markers; the API path wins.
        let api2 = &s.rejected()["api-2"];
        assert_eq!(api2.source_tag, "api_seloger");
        assert_eq!(api2.price_raw.to_string(), "350 €");
        assert_eq!(s.valid().keys().collect::<Vec<_>>(), vec!["api-1", "scraped-1", "other-1"]);
        assert_eq!(s.valid()["other-1"].source_tag, "unknown");
    }
}
