// src/ingest/mod.rs
pub mod providers;
pub mod types;

use std::collections::BTreeMap;

use metrics::{counter, describe_counter};
use once_cell::sync::OnceCell;
use serde::{Deserialize, Serialize};

use crate::ingest::types::{RawRecord, Source, SourceCollector, SourceFailure};

/// One-time metrics registration (so series show up on /metrics).
fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!(
            "collector_records_total",
            "Records returned by collectors."
        );
        describe_counter!(
            "collector_errors_total",
            "Collector fetch/parse errors (converted to SOURCE_FAILURE flags)."
        );
    });
}

/// Everything the collectors produced for one run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollectedBatch {
    #[serde(default)]
    pub records: Vec<RawRecord>,
    #[serde(default)]
    pub failures: Vec<SourceFailure>,
}

impl CollectedBatch {
    /// Records per source, keyed by source name.
    pub fn source_counts(&self) -> BTreeMap<String, usize> {
        let mut out = BTreeMap::new();
        for r in &self.records {
            *out.entry(r.source.as_str().to_string()).or_insert(0) += 1;
        }
        out
    }
}

/// Normalize text: decode entities, strip tags, collapse whitespace.
pub fn normalize_text(s: &str) -> String {
    // 1) HTML entity decode
    let mut out = html_escape::decode_html_entities(s).to_string();

    // 2) Strip HTML tags
    static RE_TAGS: OnceCell<regex::Regex> = OnceCell::new();
    let re_tags = RE_TAGS.get_or_init(|| regex::Regex::new(r"(?is)</?[^>]+>").unwrap());
    out = re_tags.replace_all(&out, "").to_string();

    // 3) Normalize “ ” ‘ ’ « » to ASCII quotes
    out = out
        .replace(['\u{201C}', '\u{201D}', '\u{00AB}', '\u{00BB}'], "\"")
        .replace(['\u{2018}', '\u{2019}'], "'");

    // 4) Collapse whitespace
    static RE_WS: OnceCell<regex::Regex> = OnceCell::new();
    let re_ws = RE_WS.get_or_init(|| regex::Regex::new(r"\s+").unwrap());
    out = re_ws.replace_all(&out, " ").trim().to_string();

    // 5) Length cap: 1500 chars
    if out.chars().count() > 1500 {
        out = out.chars().take(1500).collect();
    }

    out
}

/// Run every collector once. Failures become `SourceFailure` entries;
/// nothing is retried here.
pub async fn collect_all(
    collectors: &[Box<dyn SourceCollector>],
    query: &str,
    limit: usize,
) -> CollectedBatch {
    ensure_metrics_described();

    let mut batch = CollectedBatch::default();
    for c in collectors {
        match c.fetch(query, limit).await {
            Ok(mut v) => {
                counter!("collector_records_total", "source" => c.source().as_str())
                    .increment(v.len() as u64);
                batch.records.append(&mut v);
            }
            Err(e) => {
                tracing::warn!(target: "ingest", error = ?e, source = %c.source(), "collector error");
                counter!("collector_errors_total", "source" => c.source().as_str()).increment(1);
                batch.failures.push(SourceFailure {
                    source: c.source(),
                    error: format!("{e:#}"),
                });
            }
        }
    }
    batch
}

/// Keep only records from enabled sources (collectors may over-deliver).
pub fn retain_enabled(batch: CollectedBatch, enabled: &[Source]) -> CollectedBatch {
    CollectedBatch {
        records: batch
            .records
            .into_iter()
            .filter(|r| enabled.contains(&r.source))
            .collect(),
        failures: batch
            .failures
            .into_iter()
            .filter(|f| enabled.contains(&f.source))
            .collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rec(source: Source, url: &str) -> RawRecord {
        RawRecord {
            title: "t".into(),
            url: url.into(),
            snippet: String::new(),
            published_at: None,
            source,
            engagement: None,
        }
    }

    #[test]
    fn normalize_text_collapses_ws_and_entities() {
        let s = "  <b>Hello,&nbsp;&nbsp;</b> \u{201C}world\u{201D}  ";
        assert_eq!(normalize_text(s), "Hello, \"world\"");
    }

    #[test]
    fn normalize_text_folds_nbsp_and_keeps_punctuation() {
        assert_eq!(normalize_text(""), "");
        assert_eq!(normalize_text("A\u{00A0}\n\tB   C"), "A B C");
        assert_eq!(normalize_text("  Is async Rust hard?  "), "Is async Rust hard?");
    }

    #[test]
    fn normalize_text_caps_at_1500_chars_not_bytes() {
        let out = normalize_text(&"é".repeat(2_000));
        assert_eq!(out.chars().count(), 1_500);
        assert_eq!(out.len(), 3_000);
        assert_eq!(normalize_text(&"x".repeat(1_500)).len(), 1_500);
    }

    #[test]
    fn source_counts_keyed_by_name() {
        let b = CollectedBatch {
            records: vec![
                rec(Source::Reddit, "a"),
                rec(Source::Reddit, "b"),
                rec(Source::Hackernews, "c"),
            ],
            failures: vec![],
        };
        let counts = b.source_counts();
        assert_eq!(counts.get("reddit"), Some(&2));
        assert_eq!(counts.get("hackernews"), Some(&1));
        assert_eq!(counts.len(), 2);
    }

    #[test]
    fn retain_enabled_drops_other_sources_and_failures() {
        let b = CollectedBatch {
            records: vec![rec(Source::Reddit, "a"), rec(Source::Web, "b")],
            failures: vec![SourceFailure {
                source: Source::Web,
                error: "timeout".into(),
            }],
        };
        let out = retain_enabled(b, &[Source::Reddit]);
        assert_eq!(out.records.len(), 1);
        assert!(out.failures.is_empty());
    }
}
