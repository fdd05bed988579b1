//! # Integrity Scorer
//! Auditable 0–100 trust score for one run.
//!
//! | Component    | Range | Formula                                                        |
//! |--------------|-------|----------------------------------------------------------------|
//! | timestamp    | 0–30  | 30 − 2·round(%T3) − 5·round(%T4)                               |
//! | sources      | 0–25  | 25 − min(20, 10·failed) − (5 if kept < 5)                      |
//! | independence | 0–20  | 20·(1 − median echo risk)                                      |
//! | evidence     | 0–15  | 5 + min(10, 10·multi ratio) + min(5, 5·implementation ratio)   |
//! | baseline     | 0–10  | 10 · clusters with baseline / max(1, surfaced clusters)        |
//!
//! Each component is clamped to its range, the sum is clamped to 0–100 and
//! rounded. Flags are a sorted set, so their order never depends on input order.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::idea::{EvidenceGrade, IdeaCluster};
use crate::ingest::types::Source;
use crate::timestamp::TierCounts;

pub const FLAG_LOW_VOLUME: &str = "DEGRADED_SIGNAL_LOW_VOLUME";
pub const FLAG_LOW_TIMESTAMP_TRUST: &str = "DEGRADED_SIGNAL_LOW_TIMESTAMP_TRUST";
pub const FLAG_HIGH_ECHO_RISK: &str = "DEGRADED_SIGNAL_HIGH_ECHO_RISK";
pub const FLAG_LOW_EVIDENCE: &str = "DEGRADED_SIGNAL_LOW_EVIDENCE";
pub const FLAG_NO_SOURCES: &str = "DEGRADED_SIGNAL_NO_SOURCES";

pub const TIMESTAMP_MAX: f64 = 30.0;
pub const SOURCES_MAX: f64 = 25.0;
pub const INDEPENDENCE_MAX: f64 = 20.0;
pub const EVIDENCE_MAX: f64 = 15.0;
pub const BASELINE_MAX: f64 = 10.0;

const LOW_VOLUME_BELOW: usize = 5;
const LOW_TIMESTAMP_PCT: f64 = 20.0;
const HIGH_ECHO_MEDIAN: f64 = 0.6;

#[derive(Debug, Clone)]
pub struct IntegrityInputs<'a> {
    pub kept: usize,
    pub tiers: TierCounts,
    pub failed_sources: &'a [Source],
    pub clusters: &'a [IdeaCluster],
    pub clusters_with_baseline: usize,
    pub top_claim_cluster_count: usize,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct IntegrityComponents {
    pub timestamp: f64,
    pub sources: f64,
    pub independence: f64,
    pub evidence: f64,
    pub baseline: f64,
}

impl IntegrityComponents {
    pub fn sum(&self) -> f64 {
        self.timestamp + self.sources + self.independence + self.evidence + self.baseline
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IntegrityScore {
    pub total: u32,
    pub components: IntegrityComponents,
    pub flags: BTreeSet<String>,
}

/// Median of `values`; 0 for an empty slice.
pub fn median(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let mut v = values.to_vec();
    v.sort_by(|a, b| a.total_cmp(b));
    let mid = v.len() / 2;
    if v.len() % 2 == 0 {
        (v[mid - 1] + v[mid]) / 2.0
    } else {
        v[mid]
    }
}

fn grade_ratio(clusters: &[IdeaCluster], grade: EvidenceGrade) -> f64 {
    let n = clusters.iter().filter(|c| c.evidence_grade == grade).count();
    n as f64 / clusters.len().max(1) as f64
}

pub fn compute(inputs: &IntegrityInputs<'_>) -> IntegrityScore {
    let failed: BTreeSet<Source> = inputs.failed_sources.iter().copied().collect();
    let mut flags: BTreeSet<String> = failed.iter().map(|s| s.failure_flag()).collect();

    if inputs.kept < LOW_VOLUME_BELOW {
        flags.insert(FLAG_LOW_VOLUME.to_string());
    }

    // Nothing survived: no basis for trust at all.
    if inputs.kept == 0 {
        flags.insert(FLAG_NO_SOURCES.to_string());
        return IntegrityScore {
            total: 0,
            components: IntegrityComponents::default(),
            flags,
        };
    }

    let pct_t3 = inputs.tiers.pct_t3();
    let pct_t4 = inputs.tiers.pct_t4();
    let timestamp = (TIMESTAMP_MAX - 2.0 * pct_t3.round() - 5.0 * pct_t4.round())
        .clamp(0.0, TIMESTAMP_MAX);

    let failure_penalty = (10.0 * failed.len() as f64).min(20.0);
    let volume_penalty = if inputs.kept < LOW_VOLUME_BELOW { 5.0 } else { 0.0 };
    let sources = (SOURCES_MAX - failure_penalty - volume_penalty).clamp(0.0, SOURCES_MAX);

    let risks: Vec<f64> = inputs.clusters.iter().map(|c| c.echo_risk).collect();
    let median_echo = median(&risks);
    let independence = (INDEPENDENCE_MAX * (1.0 - median_echo)).clamp(0.0, INDEPENDENCE_MAX);

    let multi = grade_ratio(inputs.clusters, EvidenceGrade::MultiConfirmed);
    let implementation = grade_ratio(inputs.clusters, EvidenceGrade::ImplementationConfirmed);
    let evidence =
        (5.0 + (10.0 * multi).min(10.0) + (5.0 * implementation).min(5.0)).clamp(0.0, EVIDENCE_MAX);

    let baseline = (BASELINE_MAX * inputs.clusters_with_baseline as f64
        / inputs.top_claim_cluster_count.max(1) as f64)
        .clamp(0.0, BASELINE_MAX);

    if pct_t3 + pct_t4 >= LOW_TIMESTAMP_PCT {
        flags.insert(FLAG_LOW_TIMESTAMP_TRUST.to_string());
    }
    if median_echo >= HIGH_ECHO_MEDIAN {
        flags.insert(FLAG_HIGH_ECHO_RISK.to_string());
    }
    if multi == 0.0 && implementation == 0.0 {
        flags.insert(FLAG_LOW_EVIDENCE.to_string());
    }

    let components = IntegrityComponents {
        timestamp,
        sources,
        independence,
        evidence,
        baseline,
    };
    let total = components.sum().clamp(0.0, 100.0).round() as u32;

    IntegrityScore {
        total,
        components,
        flags,
    }
}
