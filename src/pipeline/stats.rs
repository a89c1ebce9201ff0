use crate::model::{Listings, Statistics};

/// Derived from the accepted records only; `total_count` is the size of the
/// whole normalized set.
pub fn compute_statistics(valid: &Listings, total_count: usize) -> Statistics {
    let valid_count = valid.len();

    let validation_rate = if total_count == 0 {
        0.0
    } else {
        round2(valid_count as f64 / total_count as f64 * 100.0)
    };

    Statistics {
        total_listings: total_count,
        valid_count,
        rejected_count: total_count.saturating_sub(valid_count),
        validation_rate,
        average_price: mean(valid.values().filter_map(|r| r.price())),
        average_surface: mean(valid.values().filter_map(|r| r.resolved_surface())),
    }
}

fn mean(values: impl Iterator<Item = f64>) -> f64 {
    let (sum, n) = values.fold((0.0, 0usize), |(sum, n), v| (sum + v, n + 1));
    if n == 0 {
        0.0
    } else {
        round2(sum / n as f64)
    }
}

/// Two decimals, half away from zero.
pub fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}
