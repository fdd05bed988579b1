use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use metrics::histogram;

use crate::ingest::normalize_text;
use crate::ingest::types::{RawRecord, Source, SourceCollector};

/// Collector over records that are already on hand: an embedded fixture, a
/// JSON export from an external fetcher, or a canned failure.
pub struct StaticCollector {
    source: Source,
    mode: Mode,
}

enum Mode {
    Records(Vec<RawRecord>),
    Json(String),
    Fail(String),
}

impl StaticCollector {
    pub fn from_records(source: Source, records: Vec<RawRecord>) -> Self {
        Self {
            source,
            mode: Mode::Records(records),
        }
    }

    /// JSON array of `RawRecord`. Parsed lazily on `fetch`.
    pub fn from_json_str(source: Source, s: &str) -> Self {
        Self {
            source,
            mode: Mode::Json(s.to_string()),
        }
    }

    /// Always reports failure; used to exercise SOURCE_FAILURE flags.
    pub fn failing(source: Source, reason: impl Into<String>) -> Self {
        Self {
            source,
            mode: Mode::Fail(reason.into()),
        }
    }

    fn prepare(&self, records: Vec<RawRecord>, limit: usize) -> Vec<RawRecord> {
        records
            .into_iter()
            .filter(|r| r.source == self.source)
            .take(limit)
            .map(|r| RawRecord {
                title: normalize_text(&r.title),
                snippet: normalize_text(&r.snippet),
                ..r
            })
            .collect()
    }
}

#[async_trait]
impl SourceCollector for StaticCollector {
    async fn fetch(&self, _query: &str, limit: usize) -> Result<Vec<RawRecord>> {
        match &self.mode {
            Mode::Records(v) => Ok(self.prepare(v.clone(), limit)),
            Mode::Json(s) => {
                let t0 = std::time::Instant::now();
                let parsed: Vec<RawRecord> = serde_json::from_str(s)
                    .with_context(|| format!("parsing {} records json", self.source))?;
                let out = self.prepare(parsed, limit);
                histogram!("collector_parse_ms").record(t0.elapsed().as_secs_f64() * 1_000.0);
                Ok(out)
            }
            Mode::Fail(reason) => Err(anyhow!("{} collector failed: {}", self.source, reason)),
        }
    }

    fn source(&self) -> Source {
        self.source
    }
}
