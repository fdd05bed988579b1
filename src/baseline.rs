//! # Baseline Anchorer
//! For each surfaced idea, pick up to two historical records of the same idea
//! (older than the current window, within the lookback horizon) to show what
//! changed since.

use std::cmp::Ordering;
use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::PersistenceError;
use crate::idea::EvidenceGrade;
use crate::ingest::types::Source;
use crate::persistence::HistoryStore;

pub const MAX_ANCHORS: usize = 2;

/// Historical record of an idea, as returned by the history store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BaselineRecord {
    pub run_id: String,
    pub idea_cluster_id: String,
    pub title: String,
    pub url: String,
    pub source: Source,
    pub published_at: DateTime<Utc>,
    pub evidence_grade: EvidenceGrade,
    pub origin_count: usize,
    pub engagement: Option<i64>,
}

/// Some(x) before None; larger first.
fn engagement_desc(a: Option<i64>, b: Option<i64>) -> Ordering {
    match (a, b) {
        (Some(x), Some(y)) => y.cmp(&x),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

/// Anchor order: grade desc, origins desc, engagement desc (nulls last),
/// published desc, title asc.
pub fn anchor_order(a: &BaselineRecord, b: &BaselineRecord) -> Ordering {
    b.evidence_grade
        .cmp(&a.evidence_grade)
        .then_with(|| b.origin_count.cmp(&a.origin_count))
        .then_with(|| engagement_desc(a.engagement, b.engagement))
        .then_with(|| b.published_at.cmp(&a.published_at))
        .then_with(|| a.title.cmp(&b.title))
}

pub fn select_anchors(mut candidates: Vec<BaselineRecord>) -> Vec<BaselineRecord> {
    candidates.sort_by(anchor_order);
    candidates.truncate(MAX_ANCHORS);
    candidates
}

/// Anchors per surfaced idea. Ideas without history map to an empty list.
/// A failed lookup is returned alongside whatever anchors were found.
pub async fn anchor_clusters(
    store: &dyn HistoryStore,
    idea_cluster_ids: &[String],
    now: DateTime<Utc>,
    window_days: i64,
    lookback_days: i64,
) -> (BTreeMap<String, Vec<BaselineRecord>>, Option<PersistenceError>) {
    let mut out = BTreeMap::new();
    let mut first_err = None;
    for id in idea_cluster_ids {
        match store
            .fetch_baseline_records(id, now, window_days, lookback_days)
            .await
        {
            Ok(candidates) => {
                out.insert(id.clone(), select_anchors(candidates));
            }
            Err(e) => {
                tracing::warn!(target: "pipeline", idea = %id, error = %e, "baseline lookup failed");
                out.insert(id.clone(), Vec::new());
                if first_err.is_none() {
                    first_err = Some(e);
                }
            }
        }
    }
    (out, first_err)
}

pub fn clusters_with_baseline(anchors: &BTreeMap<String, Vec<BaselineRecord>>) -> usize {
    anchors.values().filter(|v| !v.is_empty()).count()
}
