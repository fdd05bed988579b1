//! Placeholder ranking: keep the clusterer's order, assign `100 - 3*index`,
//! cut to top-N. The score only exists for stable downstream sorting.

use serde::{Deserialize, Serialize};

use crate::idea::{EvidenceGrade, IdeaMember};
use crate::ingest::types::Source;
use crate::timestamp::TimestampTier;

const BASE_SCORE: i64 = 100;
const SCORE_STEP: i64 = 3;

/// Flat, render-ready view of one surfaced record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredRecord {
    /// 1-based.
    pub rank: usize,
    pub score: i64,
    pub title: String,
    pub url: String,
    pub snippet: String,
    pub source: Source,
    /// RFC 3339 when the record carried a parseable timestamp.
    pub published_at: Option<String>,
    pub tier: TimestampTier,
    pub engagement: Option<i64>,
    pub cluster_id: String,
    pub idea_cluster_id: String,
    pub idea_label: String,
    pub origin_id: String,
    pub origin_count: usize,
    pub echo_risk: f64,
    pub evidence_grade: EvidenceGrade,
}

pub fn placeholder_score(index: usize) -> i64 {
    BASE_SCORE - SCORE_STEP * index as i64
}

pub fn rank(members: &[IdeaMember], top_n: usize) -> Vec<ScoredRecord> {
    members
        .iter()
        .take(top_n)
        .enumerate()
        .map(|(i, m)| {
            let item = &m.url_cluster.item;
            ScoredRecord {
                rank: i + 1,
                score: placeholder_score(i),
                title: item.record.title.clone(),
                url: item.record.url.clone(),
                snippet: item.record.snippet.clone(),
                source: item.record.source,
                published_at: item.published.map(|ts| ts.to_rfc3339()),
                tier: item.tier,
                engagement: item.record.engagement,
                cluster_id: m.url_cluster.cluster_id.clone(),
                idea_cluster_id: m.idea_cluster_id.clone(),
                idea_label: m.label.clone(),
                origin_id: m.origin_id.clone(),
                origin_count: m.origin_count,
                echo_risk: m.echo_risk,
                evidence_grade: m.evidence_grade,
            }
        })
        .collect()
}

/// Distinct idea clusters among the surfaced records, first-seen order.
pub fn surfaced_idea_ids(ranked: &[ScoredRecord]) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    for r in ranked {
        if !out.contains(&r.idea_cluster_id) {
            out.push(r.idea_cluster_id.clone());
        }
    }
    out
}
