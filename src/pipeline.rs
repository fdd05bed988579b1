//! # Digest Pipeline
//! classify → window → tier policy → url dedup → idea clusters → rank/top-N
//! → baseline anchors → integrity → persist → artifacts.
//!
//! Everything up to the integrity score is a pure function of the records,
//! the options and the injected clock. Persistence happens last and cannot
//! alter what was computed: a storage failure is reported on the result.

use std::collections::{BTreeMap, BTreeSet};
use std::path::PathBuf;
use std::sync::Arc;

use chrono::{DateTime, NaiveDate, Utc};
use metrics::{counter, describe_counter, describe_gauge, gauge};
use once_cell::sync::OnceCell;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::baseline::{anchor_clusters, clusters_with_baseline, BaselineRecord};
use crate::clock::Clock;
use crate::config::DigestConfig;
use crate::dedup::cluster_by_url;
use crate::error::{PersistenceError, PipelineError};
use crate::idea::{cluster_ideas, IdeaCluster, IdeaMember};
use crate::ingest::types::{RawRecord, Source};
use crate::ingest::{retain_enabled, CollectedBatch};
use crate::integrity::{self, IntegrityInputs, IntegrityScore};
use crate::options::{RunOptions, RunRequest};
use crate::persistence::{ArtifactWriter, HistoryStore, InsertOutcome, ItemRecord, RunMetadata};
use crate::scoring::{rank, surfaced_idea_ids, ScoredRecord};
use crate::timestamp::{filter_records, TierCounts};

fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!("pipeline_runs_total", "Digest pipeline runs.");
        describe_counter!("pipeline_records_total", "Records entering the pipeline.");
        describe_counter!("pipeline_kept_total", "Records kept after window + tier policy.");
        describe_counter!(
            "pipeline_window_excluded_total",
            "Records outside the collection window."
        );
        describe_counter!(
            "pipeline_t4_excluded_total",
            "Records dropped by the T4 tier policy."
        );
        describe_counter!(
            "pipeline_url_duplicates_total",
            "Records collapsed into an earlier record with the same URL."
        );
        describe_gauge!(
            "pipeline_last_integrity_total",
            "Integrity total of the most recent run."
        );
    });
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterStats {
    pub raw: usize,
    pub window_excluded: usize,
    pub t4_excluded: usize,
    /// Over the records that passed the window (before tier policy).
    pub tiers: TierCounts,
    /// After window + tier policy, before url dedup.
    pub kept: usize,
    pub url_duplicates: usize,
    pub idea_clusters: usize,
}

/// Output of the pure stages.
#[derive(Debug, Clone)]
pub struct StageOutput {
    pub members: Vec<IdeaMember>,
    pub clusters: Vec<IdeaCluster>,
    pub ranked: Vec<ScoredRecord>,
    pub stats: FilterStats,
}

pub fn run_stages(records: Vec<RawRecord>, opts: &RunOptions, now: DateTime<Utc>) -> StageOutput {
    let raw = records.len();
    let filtered = filter_records(records, opts.window_days, opts.allow_t4, now);
    let kept = filtered.kept.len();

    let (url_clusters, url_duplicates) = cluster_by_url(filtered.kept);
    let ideas = cluster_ideas(url_clusters);
    let ranked = rank(&ideas.members, opts.top_n);

    StageOutput {
        stats: FilterStats {
            raw,
            window_excluded: filtered.window_excluded,
            t4_excluded: filtered.t4_excluded,
            tiers: filtered.tiers,
            kept,
            url_duplicates,
            idea_clusters: ideas.clusters.len(),
        },
        members: ideas.members,
        clusters: ideas.clusters,
        ranked,
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunResult {
    pub run_id: String,
    pub run_date: NaiveDate,
    pub created_at: DateTime<Utc>,
    pub options: RunOptions,
    pub integrity: IntegrityScore,
    pub flags: Vec<String>,
    pub source_counts: BTreeMap<String, usize>,
    pub stats: FilterStats,
    pub ranked: Vec<ScoredRecord>,
    pub clusters: Vec<IdeaCluster>,
    /// Keyed by surfaced idea cluster id.
    pub anchors: BTreeMap<String, Vec<BaselineRecord>>,
    pub artifacts: Vec<PathBuf>,
    pub insert_outcome: Option<InsertOutcome>,
    pub persisted: bool,
    pub persistence_error: Option<String>,
}

#[derive(Serialize)]
struct DigestArtifact<'a> {
    run_id: &'a str,
    run_date: NaiveDate,
    query: &'a str,
    source_counts: &'a BTreeMap<String, usize>,
    ranked: &'a [ScoredRecord],
    clusters: &'a [IdeaCluster],
    anchors: &'a BTreeMap<String, Vec<BaselineRecord>>,
}

pub struct Pipeline {
    store: Arc<dyn HistoryStore>,
    clock: Arc<dyn Clock>,
    artifacts: Option<ArtifactWriter>,
}

impl Pipeline {
    pub fn new(store: Arc<dyn HistoryStore>, clock: Arc<dyn Clock>) -> Self {
        Self {
            store,
            clock,
            artifacts: None,
        }
    }

    pub fn with_artifacts(mut self, writer: ArtifactWriter) -> Self {
        self.artifacts = Some(writer);
        self
    }

    pub fn store(&self) -> &Arc<dyn HistoryStore> {
        &self.store
    }

    /// Validate the request, then run. Config errors never reach the stages.
    pub async fn run_request(
        &self,
        request: &RunRequest,
        cfg: &DigestConfig,
        batch: CollectedBatch,
    ) -> Result<RunResult, PipelineError> {
        let opts = request.resolve(cfg)?;
        Ok(self.run(batch, &opts).await)
    }

    pub async fn run(&self, batch: CollectedBatch, opts: &RunOptions) -> RunResult {
        ensure_metrics_described();

        let now = self.clock.now();
        let run_date = now.date_naive();
        let run_id = opts.run_id(run_date);

        let batch = retain_enabled(batch, &opts.sources);
        let source_counts = batch.source_counts();
        let failed: Vec<Source> = batch
            .failures
            .iter()
            .map(|f| f.source)
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();

        let staged = run_stages(batch.records, opts, now);

        let surfaced = surfaced_idea_ids(&staged.ranked);
        let (anchors, baseline_err) = anchor_clusters(
            self.store.as_ref(),
            &surfaced,
            now,
            opts.window_days,
            opts.lookback_days,
        )
        .await;

        let integrity = integrity::compute(&IntegrityInputs {
            kept: staged.stats.kept,
            tiers: staged.stats.tiers,
            failed_sources: &failed,
            clusters: &staged.clusters,
            clusters_with_baseline: clusters_with_baseline(&anchors),
            top_claim_cluster_count: surfaced.len(),
        });

        record_metrics(&staged.stats, integrity.total);
        info!(
            target: "pipeline",
            %run_id,
            raw = staged.stats.raw,
            kept = staged.stats.kept,
            ideas = staged.stats.idea_clusters,
            integrity = integrity.total,
            flags = ?integrity.flags,
            "digest computed"
        );

        let mut errors: Vec<PersistenceError> = baseline_err.into_iter().collect();

        let meta = RunMetadata {
            run_id: run_id.clone(),
            created_at: now,
            run_date,
            query: opts.query.clone(),
            window_days: opts.window_days,
            target: opts.target.clone(),
            mode: opts.mode.clone(),
            sources: opts.sources.clone(),
            top_n: opts.top_n,
            integrity_total: integrity.total,
        };
        let items = item_records(&run_id, &staged.members, &staged.ranked);
        let insert_outcome = match self.store.insert_run(meta, items).await {
            Ok(outcome) => {
                if outcome == InsertOutcome::AlreadyRecorded {
                    info!(target: "pipeline", %run_id, "run already recorded; insert skipped");
                }
                Some(outcome)
            }
            Err(e) => {
                warn!(target: "pipeline", %run_id, error = %e, "run insert failed");
                errors.push(e);
                None
            }
        };

        let mut artifacts = Vec::new();
        if let Some(writer) = &self.artifacts {
            let digest = DigestArtifact {
                run_id: &run_id,
                run_date,
                query: &opts.query,
                source_counts: &source_counts,
                ranked: &staged.ranked,
                clusters: &staged.clusters,
                anchors: &anchors,
            };
            for written in [
                writer.write_json(&run_id, "digest.json", &digest).await,
                writer.write_json(&run_id, "integrity.json", &integrity).await,
            ] {
                match written {
                    Ok(p) => artifacts.push(p),
                    Err(e) => {
                        warn!(target: "pipeline", %run_id, error = %e, "artifact write failed");
                        errors.push(e);
                    }
                }
            }
        }

        let persistence_error = if errors.is_empty() {
            None
        } else {
            Some(
                errors
                    .iter()
                    .map(|e| e.to_string())
                    .collect::<Vec<_>>()
                    .join("; "),
            )
        };

        RunResult {
            run_id,
            run_date,
            created_at: now,
            options: opts.clone(),
            flags: integrity.flags.iter().cloned().collect(),
            integrity,
            source_counts,
            stats: staged.stats,
            ranked: staged.ranked,
            clusters: staged.clusters,
            anchors,
            artifacts,
            persisted: insert_outcome.is_some(),
            insert_outcome,
            persistence_error,
        }
    }
}

fn item_records(run_id: &str, members: &[IdeaMember], ranked: &[ScoredRecord]) -> Vec<ItemRecord> {
    let ranks: BTreeMap<&str, usize> = ranked
        .iter()
        .map(|r| (r.cluster_id.as_str(), r.rank))
        .collect();
    members
        .iter()
        .map(|m| {
            let item = &m.url_cluster.item;
            ItemRecord {
                run_id: run_id.to_string(),
                cluster_id: m.url_cluster.cluster_id.clone(),
                idea_cluster_id: m.idea_cluster_id.clone(),
                origin_id: m.origin_id.clone(),
                title: item.record.title.clone(),
                url: item.record.url.clone(),
                source: item.record.source,
                published_at: item.published,
                evidence_grade: m.evidence_grade,
                origin_count: m.origin_count,
                engagement: item.record.engagement,
                rank: ranks.get(m.url_cluster.cluster_id.as_str()).copied(),
            }
        })
        .collect()
}

fn record_metrics(stats: &FilterStats, integrity_total: u32) {
    counter!("pipeline_runs_total").increment(1);
    counter!("pipeline_records_total").increment(stats.raw as u64);
    counter!("pipeline_kept_total").increment(stats.kept as u64);
    counter!("pipeline_window_excluded_total").increment(stats.window_excluded as u64);
    counter!("pipeline_t4_excluded_total").increment(stats.t4_excluded as u64);
    counter!("pipeline_url_duplicates_total").increment(stats.url_duplicates as u64);
    gauge!("pipeline_last_integrity_total").set(integrity_total as f64);
}
