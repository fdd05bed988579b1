//! Runs the digest pipeline over a JSON record file and prints the result.
//!
//! Usage: digest_demo [records.json] [query] [now]
//! Defaults to the reference fixture, evaluated at the instant it was captured
//! (`now` is RFC 3339). A `web` collector that always fails is added so the
//! source-failure path shows up in the output.

use std::sync::Arc;

use anyhow::Context;
use chrono::{DateTime, Utc};
use signal_digest::ingest::collect_all;
use signal_digest::ingest::providers::static_feed::StaticCollector;
use signal_digest::ingest::types::{Source, SourceCollector};
use signal_digest::{DigestConfig, FixedClock, InMemoryHistory, Pipeline, RunRequest};

const DEFAULT_FIXTURE: &str = "tests/fixtures/reference_signals.json";
const DEFAULT_NOW: &str = "2025-06-15T12:00:00Z";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt().with_target(false).init();

    let mut args = std::env::args().skip(1);
    let path = args.next().unwrap_or_else(|| DEFAULT_FIXTURE.to_string());
    let query = args.next().unwrap_or_else(|| "rust ecosystem".to_string());
    let now_arg = args.next().unwrap_or_else(|| DEFAULT_NOW.to_string());
    let now: DateTime<Utc> = DateTime::parse_from_rfc3339(&now_arg)
        .with_context(|| format!("parsing now {now_arg}"))?
        .with_timezone(&Utc);

    let json = std::fs::read_to_string(&path).with_context(|| format!("reading {path}"))?;
    let collectors: Vec<Box<dyn SourceCollector>> = Source::ALL
        .iter()
        .map(|s| -> Box<dyn SourceCollector> {
            if *s == Source::Web {
                Box::new(StaticCollector::failing(*s, "demo: web search disabled"))
            } else {
                Box::new(StaticCollector::from_json_str(*s, &json))
            }
        })
        .collect();

    let cfg = DigestConfig::load_default()?;
    let request = RunRequest {
        query: query.clone(),
        ..Default::default()
    };
    let opts = request.resolve(&cfg)?;
    let batch = collect_all(&collectors, &opts.query, 100).await;

    let pipeline = Pipeline::new(Arc::new(InMemoryHistory::new()), Arc::new(FixedClock(now)));
    let result = pipeline.run(batch, &opts).await;

    println!("{}", serde_json::to_string_pretty(&result)?);
    println!(
        "digest-demo done: run_id={} integrity={} flags={:?}",
        result.run_id, result.integrity.total, result.flags
    );
    Ok(())
}
