//! Historical performance aggregation.
//!
//! Turns the result records returned by the persistence service into a
//! chart-ready series and a few headline statistics.

use serde::{Deserialize, Serialize};

use crate::model::ExamResultRecord;

/// Ordering of the produced series.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SeriesOrder {
    /// Oldest attempt first; what a trend chart expects.
    #[default]
    Chronological,
    /// Newest attempt first; for list views.
    MostRecentFirst,
}

/// One point of a performance series.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeriesPoint {
    /// Calendar date of the attempt (`YYYY-MM-DD`).
    pub label: String,
    /// Score percentage, 0..=100.
    pub value: u32,
}

/// Headline statistics over a set of attempts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryStats {
    pub attempts: usize,
    pub best: u32,
    pub latest: u32,
    /// Mean of the per-attempt percentages.
    pub average: f64,
}

/// Build a performance series from result records.
///
/// Input order does not matter: records are sorted by timestamp first. Ties
/// keep their input order.
pub fn to_series(records: &[ExamResultRecord], order: SeriesOrder) -> Vec<SeriesPoint> {
    let mut sorted: Vec<&ExamResultRecord> = records.iter().collect();
    sorted.sort_by_key(|r| r.timestamp);
    if order == SeriesOrder::MostRecentFirst {
        sorted.reverse();
    }

    sorted
        .into_iter()
        .map(|r| SeriesPoint {
            label: r.timestamp.format("%Y-%m-%d").to_string(),
            value: r.percentage(),
        })
        .collect()
}

/// Summarize attempts. Returns `None` when there are none.
pub fn summarize(records: &[ExamResultRecord]) -> Option<HistoryStats> {
    let latest = records.iter().max_by_key(|r| r.timestamp)?;
    let best = records.iter().map(ExamResultRecord::percentage).max()?;
    let total: u32 = records.iter().map(ExamResultRecord::percentage).sum();

    Some(HistoryStats {
        attempts: records.len(),
        best,
        latest: latest.percentage(),
        average: f64::from(total) / records.len() as f64,
    })
}
