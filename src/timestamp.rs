//! # Timestamp Classifier
//! Assigns each record a temporal trust tier, then applies the collection
//! window and the T4 retention policy.
//!
//! Only T1 (parseable) and T4 (missing/unparseable) are produced today. T2/T3
//! exist so the integrity formula can already account for intermediate tiers.

use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ingest::types::RawRecord;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum TimestampTier {
    T1,
    T2,
    T3,
    T4,
}

/// Parse an ISO-8601 timestamp. Accepts RFC 3339, naive date-times (read as
/// UTC) and bare dates (midnight UTC).
pub fn parse_published_at(raw: &str) -> Option<DateTime<Utc>> {
    let s = raw.trim();
    if s.is_empty() {
        return None;
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    for fmt in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"] {
        if let Ok(ndt) = NaiveDateTime::parse_from_str(s, fmt) {
            return Some(ndt.and_utc());
        }
    }
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|ndt| ndt.and_utc())
}

pub fn classify(published_at: Option<&str>) -> TimestampTier {
    match published_at.and_then(parse_published_at) {
        Some(_) => TimestampTier::T1,
        None => TimestampTier::T4,
    }
}

/// Null timestamps pass (kept by default); unparseable ones fail.
pub fn within_window(published_at: Option<&str>, window_days: i64, now: DateTime<Utc>) -> bool {
    let Some(raw) = published_at else {
        return true;
    };
    match parse_published_at(raw) {
        Some(ts) => now.signed_duration_since(ts) <= Duration::days(window_days),
        None => false,
    }
}

/// Tier histogram over the records that passed the window.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TierCounts {
    pub t1: usize,
    pub t2: usize,
    pub t3: usize,
    pub t4: usize,
}

impl TierCounts {
    pub fn add(&mut self, tier: TimestampTier) {
        match tier {
            TimestampTier::T1 => self.t1 += 1,
            TimestampTier::T2 => self.t2 += 1,
            TimestampTier::T3 => self.t3 += 1,
            TimestampTier::T4 => self.t4 += 1,
        }
    }

    pub fn total(&self) -> usize {
        self.t1 + self.t2 + self.t3 + self.t4
    }

    fn pct(&self, n: usize) -> f64 {
        let total = self.total();
        if total == 0 {
            0.0
        } else {
            100.0 * n as f64 / total as f64
        }
    }

    pub fn pct_t3(&self) -> f64 {
        self.pct(self.t3)
    }

    pub fn pct_t4(&self) -> f64 {
        self.pct(self.t4)
    }
}

/// A record together with its parsed timestamp and tier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimestampedRecord {
    pub record: RawRecord,
    pub tier: TimestampTier,
    pub published: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default)]
pub struct TimestampFilterOutcome {
    pub kept: Vec<TimestampedRecord>,
    pub tiers: TierCounts,
    pub window_excluded: usize,
    pub t4_excluded: usize,
}

/// Window filter followed by the tier policy. Input order is preserved.
pub fn filter_records(
    records: Vec<RawRecord>,
    window_days: i64,
    allow_t4: bool,
    now: DateTime<Utc>,
) -> TimestampFilterOutcome {
    let mut out = TimestampFilterOutcome::default();
    for record in records {
        if !within_window(record.published_at.as_deref(), window_days, now) {
            out.window_excluded += 1;
            continue;
        }
        let published = record.published_at.as_deref().and_then(parse_published_at);
        let tier = classify(record.published_at.as_deref());
        out.tiers.add(tier);

        if tier == TimestampTier::T4 && !allow_t4 {
            out.t4_excluded += 1;
            continue;
        }
        out.kept.push(TimestampedRecord {
            record,
            tier,
            published,
        });
    }
    out
}
