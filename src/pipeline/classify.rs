use crate::model::{
    CanonicalRecord, Classification, Listings, Outcome, RejectionReason, ACCEPTANCE_NOTE,
};
use crate::settings::Criteria;

/// Every rule is evaluated; reasons come out in rule order.
pub fn evaluate(record: &CanonicalRecord, criteria: &Criteria) -> Outcome {
    let mut reasons = Vec::new();

    if record.is_shared_flat {
        reasons.push(RejectionReason::SharedFlat);
    }
    if record.is_studio {
        reasons.push(RejectionReason::Studio);
    }
    if !record.price().is_some_and(|p| criteria.price_in_range(p)) {
        reasons.push(RejectionReason::InvalidPrice);
    }
    // No surface information is not grounds for rejection.
    if record
        .resolved_surface()
        .is_some_and(|s| s < criteria.min_surface)
    {
        reasons.push(RejectionReason::InvalidSurface);
    }

    if reasons.is_empty() {
        Outcome::Accepted {
            note: ACCEPTANCE_NOTE.to_string(),
        }
    } else {
        Outcome::Rejected { reasons }
    }
}

/// Copy of `record` carrying its outcome. Any earlier outcome is replaced.
pub fn classify(record: &CanonicalRecord, criteria: &Criteria) -> CanonicalRecord {
    CanonicalRecord {
        outcome: Some(evaluate(record, criteria)),
        ..record.clone()
    }
}

pub fn classify_all(records: &Listings, criteria: &Criteria) -> Classification {
    let mut out = Classification::default();
    for (key, record) in records {
        let classified = classify(record, criteria);
        if classified.is_accepted() {
            out.valid.insert(key.clone(), classified);
        } else {
            out.rejected.insert(key.clone(), classified);
        }
    }
    out
}
