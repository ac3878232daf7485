//! Storage usage aggregation for the dashboard.
//!
//! Totals are computed by summing record sizes grouped by category, never by
//! asking the blob store, so the numbers always agree with the record store.

use serde::Serialize;

use crate::classify::Category;

/// Fixed per-owner quota shown on the dashboard. Display only, uploads are
/// not rejected for exceeding it.
pub const QUOTA_BYTES: u64 = 2 * 1024 * 1024 * 1024;

/// Per-category byte totals. The five stored categories collapse into four
/// display buckets: `media` is video plus audio.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
pub struct UsageSummary {
    pub documents: u64,
    pub images: u64,
    pub media: u64,
    pub others: u64,
    pub used: u64,
    pub quota: u64,
    pub percent: u8,
}

/// Reduce `(category, size)` pairs into the dashboard summary.
pub fn aggregate(items: impl IntoIterator<Item = (Category, u64)>) -> UsageSummary {
    let mut summary = UsageSummary {
        quota: QUOTA_BYTES,
        ..Default::default()
    };

    for (category, size) in items {
        match category {
            Category::Document => summary.documents += size,
            Category::Image => summary.images += size,
            Category::Video | Category::Audio => summary.media += size,
            Category::Other => summary.others += size,
        }
        summary.used += size;
    }

    summary.percent = percentage(summary.used, summary.quota);
    summary
}

/// Percentage of quota used, rounded to the nearest integer and clamped to
/// 0..=100. Any non-zero usage that would round down to 0% reports 1% so the
/// dashboard never shows an empty bar for a non-empty account.
pub fn percentage(used: u64, quota: u64) -> u8 {
    if used == 0 || quota == 0 {
        return 0;
    }

    let percent = (used as f64 / quota as f64 * 100.0).round() as u64;
    if percent == 0 {
        1
    } else {
        percent.min(100) as u8
    }
}
