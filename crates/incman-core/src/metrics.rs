// Resolution-time statistics.

use chrono::{DateTime, Utc};

/// Mean of `end - start` in minutes. Returns 0.0 for an empty slice.
pub fn mean_minutes(spans: &[(DateTime<Utc>, DateTime<Utc>)]) -> f64 {
    if spans.is_empty() {
        return 0.0;
    }
    let total_ms: i64 = spans
        .iter()
        .map(|(start, end)| (*end - *start).num_milliseconds())
        .sum();
    total_ms as f64 / 60_000.0 / spans.len() as f64
}
