//! Persistence boundary: run/item history (baseline source) and on-disk
//! run artifacts. The pipeline only reads history through `HistoryStore`
//! and writes one run per id; re-submitting a run id is a no-op.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, TimeDelta, Utc};
use serde::{Deserialize, Serialize};
use tokio::fs;

use crate::baseline::BaselineRecord;
use crate::error::PersistenceError;
use crate::idea::EvidenceGrade;
use crate::ingest::types::Source;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunMetadata {
    pub run_id: String,
    pub created_at: DateTime<Utc>,
    pub run_date: NaiveDate,
    pub query: String,
    pub window_days: i64,
    pub target: String,
    pub mode: String,
    pub sources: Vec<Source>,
    pub top_n: usize,
    pub integrity_total: u32,
}

/// One kept record of a run, as stored for later baseline lookups.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItemRecord {
    pub run_id: String,
    pub cluster_id: String,
    pub idea_cluster_id: String,
    pub origin_id: String,
    pub title: String,
    pub url: String,
    pub source: Source,
    pub published_at: Option<DateTime<Utc>>,
    pub evidence_grade: EvidenceGrade,
    pub origin_count: usize,
    pub engagement: Option<i64>,
    /// Set when the record made the top-N.
    pub rank: Option<usize>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InsertOutcome {
    Inserted,
    AlreadyRecorded,
}

#[async_trait]
pub trait HistoryStore: Send + Sync {
    /// Records of `idea_cluster_id` published strictly before
    /// `now - window_days` (the same instant the window filter uses), from
    /// runs created within `lookback_days` of `now`. Unordered; ranking is
    /// the caller's job.
    async fn fetch_baseline_records(
        &self,
        idea_cluster_id: &str,
        now: DateTime<Utc>,
        window_days: i64,
        lookback_days: i64,
    ) -> Result<Vec<BaselineRecord>, PersistenceError>;

    /// Idempotent per `run.run_id`.
    async fn insert_run(
        &self,
        run: RunMetadata,
        items: Vec<ItemRecord>,
    ) -> Result<InsertOutcome, PersistenceError>;

    async fn get_run(&self, run_id: &str) -> Result<Option<RunMetadata>, PersistenceError>;
}

/// `now - days`, saturating at the earliest representable instant.
pub fn days_before(now: DateTime<Utc>, days: i64) -> DateTime<Utc> {
    TimeDelta::try_days(days)
        .and_then(|d| now.checked_sub_signed(d))
        .unwrap_or(DateTime::<Utc>::MIN_UTC)
}

#[derive(Debug, Default)]
struct Inner {
    order: Vec<String>,
    runs: HashMap<String, (RunMetadata, Vec<ItemRecord>)>,
}

/// Process-local history. Backs the HTTP service and the tests.
#[derive(Debug, Default)]
pub struct InMemoryHistory {
    inner: Mutex<Inner>,
}

impl InMemoryHistory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn run_count(&self) -> usize {
        self.inner.lock().map(|g| g.order.len()).unwrap_or(0)
    }
}

#[async_trait]
impl HistoryStore for InMemoryHistory {
    async fn fetch_baseline_records(
        &self,
        idea_cluster_id: &str,
        now: DateTime<Utc>,
        window_days: i64,
        lookback_days: i64,
    ) -> Result<Vec<BaselineRecord>, PersistenceError> {
        let window_start = days_before(now, window_days);
        let horizon = days_before(now, lookback_days);

        let g = self.inner.lock().map_err(|_| PersistenceError::Poisoned)?;
        let mut seen_urls: HashSet<&str> = HashSet::new();
        let mut out = Vec::new();

        for run_id in &g.order {
            let Some((meta, items)) = g.runs.get(run_id) else {
                continue;
            };
            if meta.created_at < horizon {
                continue;
            }
            for it in items {
                if it.idea_cluster_id != idea_cluster_id {
                    continue;
                }
                let Some(published_at) = it.published_at else {
                    continue;
                };
                if published_at >= window_start || !seen_urls.insert(it.url.as_str()) {
                    continue;
                }
                out.push(BaselineRecord {
                    run_id: it.run_id.clone(),
                    idea_cluster_id: it.idea_cluster_id.clone(),
                    title: it.title.clone(),
                    url: it.url.clone(),
                    source: it.source,
                    published_at,
                    evidence_grade: it.evidence_grade,
                    origin_count: it.origin_count,
                    engagement: it.engagement,
                });
            }
        }
        Ok(out)
    }

    async fn insert_run(
        &self,
        run: RunMetadata,
        items: Vec<ItemRecord>,
    ) -> Result<InsertOutcome, PersistenceError> {
        let mut g = self.inner.lock().map_err(|_| PersistenceError::Poisoned)?;
        if g.runs.contains_key(&run.run_id) {
            return Ok(InsertOutcome::AlreadyRecorded);
        }
        g.order.push(run.run_id.clone());
        g.runs.insert(run.run_id.clone(), (run, items));
        Ok(InsertOutcome::Inserted)
    }

    async fn get_run(&self, run_id: &str) -> Result<Option<RunMetadata>, PersistenceError> {
        let g = self.inner.lock().map_err(|_| PersistenceError::Poisoned)?;
        Ok(g.runs.get(run_id).map(|(meta, _)| meta.clone()))
    }
}

/// Writes JSON artifacts under `<root>/<run_id>/`.
#[derive(Debug, Clone)]
pub struct ArtifactWriter {
    root: PathBuf,
}

impl ArtifactWriter {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub async fn write_json<T: Serialize + ?Sized>(
        &self,
        run_id: &str,
        file_name: &str,
        value: &T,
    ) -> Result<PathBuf, PersistenceError> {
        let dir = self.root.join(run_id);
        fs::create_dir_all(&dir).await?;
        let path = dir.join(file_name);
        fs::write(&path, serde_json::to_vec_pretty(value)?).await?;
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn meta(run_id: &str, created_at: DateTime<Utc>) -> RunMetadata {
        RunMetadata {
            run_id: run_id.into(),
            created_at,
            run_date: created_at.date_naive(),
            query: "rust".into(),
            window_days: 7,
            target: "generic".into(),
            mode: "standard".into(),
            sources: vec![Source::Reddit],
            top_n: 10,
            integrity_total: 50,
        }
    }

    fn item(run_id: &str, idea: &str, url: &str, published_at: Option<DateTime<Utc>>) -> ItemRecord {
        ItemRecord {
            run_id: run_id.into(),
            cluster_id: "c".into(),
            idea_cluster_id: idea.into(),
            origin_id: "o".into(),
            title: url.into(),
            url: url.into(),
            source: Source::Reddit,
            published_at,
            evidence_grade: EvidenceGrade::DiscussionOnly,
            origin_count: 1,
            engagement: None,
            rank: Some(1),
        }
    }

    fn at(y: i32, m: u32, d: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, 9, 0, 0).unwrap()
    }

    #[tokio::test]
    async fn insert_is_idempotent_per_run_id() {
        let h = InMemoryHistory::new();
        let m = meta("run1", at(2025, 6, 1));
        assert_eq!(
            h.insert_run(m.clone(), vec![]).await.unwrap(),
            InsertOutcome::Inserted
        );
        let mut changed = m.clone();
        changed.integrity_total = 1;
        assert_eq!(
            h.insert_run(changed, vec![]).await.unwrap(),
            InsertOutcome::AlreadyRecorded
        );
        assert_eq!(h.run_count(), 1);
        assert_eq!(h.get_run("run1").await.unwrap().unwrap().integrity_total, 50);
    }

    #[tokio::test]
    async fn baseline_filters_by_window_lookback_and_idea() {
        let h = InMemoryHistory::new();
        let now = Utc.with_ymd_and_hms(2025, 6, 15, 12, 0, 0).unwrap();

        h.insert_run(
            meta("old-run", at(2025, 5, 20)),
            vec![
                item("old-run", "idea", "https://a.test/eligible", Some(at(2025, 5, 20))),
                item("old-run", "idea", "https://a.test/no-ts", None),
                item("old-run", "other", "https://a.test/other-idea", Some(at(2025, 5, 20))),
                item("old-run", "idea", "https://a.test/in-window", Some(at(2025, 6, 10))),
            ],
        )
        .await
        .unwrap();
        // beyond the 180-day horizon
        h.insert_run(
            meta("ancient-run", at(2024, 11, 1)),
            vec![item("ancient-run", "idea", "https://a.test/ancient", Some(at(2024, 11, 1)))],
        )
        .await
        .unwrap();
        // same URL reported again by a later run
        h.insert_run(
            meta("mid-run", at(2025, 5, 25)),
            vec![item("mid-run", "idea", "https://a.test/eligible", Some(at(2025, 5, 20)))],
        )
        .await
        .unwrap();

        let out = h
            .fetch_baseline_records("idea", now, 7, 180)
            .await
            .unwrap();
        let urls: Vec<_> = out.iter().map(|r| r.url.as_str()).collect();
        assert_eq!(urls, vec!["https://a.test/eligible"]);
        assert_eq!(out[0].run_id, "old-run");
    }

    #[tokio::test]
    async fn baseline_cutoff_follows_the_instant_not_midnight() {
        let h = InMemoryHistory::new();
        let now = Utc.with_ymd_and_hms(2025, 6, 15, 12, 0, 0).unwrap();
        // 6h before now - 7d: outside the window, so it must be a baseline.
        let just_missed = Utc.with_ymd_and_hms(2025, 6, 8, 6, 0, 0).unwrap();
        // 6h after now - 7d: still inside the window.
        let still_inside = Utc.with_ymd_and_hms(2025, 6, 8, 18, 0, 0).unwrap();
        h.insert_run(
            meta("run", just_missed),
            vec![
                item("run", "idea", "https://a.test/missed", Some(just_missed)),
                item("run", "idea", "https://a.test/inside", Some(still_inside)),
            ],
        )
        .await
        .unwrap();

        let out = h.fetch_baseline_records("idea", now, 7, 180).await.unwrap();
        let urls: Vec<_> = out.iter().map(|r| r.url.as_str()).collect();
        assert_eq!(urls, vec!["https://a.test/missed"]);
    }

    #[tokio::test]
    async fn huge_spans_saturate_instead_of_panicking() {
        let h = InMemoryHistory::new();
        h.insert_run(
            meta("run", at(2025, 5, 1)),
            vec![item("run", "idea", "https://a.test/x", Some(at(2025, 5, 1)))],
        )
        .await
        .unwrap();
        let out = h
            .fetch_baseline_records("idea", at(2025, 6, 15), 7, i64::MAX)
            .await
            .unwrap();
        assert_eq!(out.len(), 1);
        assert_eq!(days_before(at(2025, 6, 15), i64::MAX), DateTime::<Utc>::MIN_UTC);
    }

    #[tokio::test]
    async fn artifacts_land_under_run_dir() {
        let tmp = tempfile::tempdir().unwrap();
        let w = ArtifactWriter::new(tmp.path());
        let p = w
            .write_json("abc123", "integrity.json", &serde_json::json!({"total": 42}))
            .await
            .unwrap();
        assert_eq!(p, tmp.path().join("abc123").join("integrity.json"));
        let back: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&p).unwrap()).unwrap();
        assert_eq!(back["total"], 42);
    }
}
