//! Caller-facing run request, its validated form, and the deterministic run id.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::config::DigestConfig;
use crate::error::ConfigError;
use crate::hashing::{short_hash, RUN_ID_LEN};
use crate::ingest::types::Source;

pub const MAX_WINDOW_DAYS: i64 = 365;
pub const MAX_TOP_N: usize = 100;

/// As received from the front end. Missing fields fall back to `DigestConfig`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunRequest {
    pub query: String,
    #[serde(default)]
    pub window_days: Option<i64>,
    #[serde(default)]
    pub target: Option<String>,
    #[serde(default)]
    pub mode: Option<String>,
    #[serde(default)]
    pub sources: Option<Vec<String>>,
    #[serde(default)]
    pub top_n: Option<usize>,
    #[serde(default)]
    pub allow_t4: Option<bool>,
    /// `false` mixes a random nonce into the run id.
    #[serde(default)]
    pub deterministic: Option<bool>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunOptions {
    pub query: String,
    pub window_days: i64,
    pub target: String,
    pub mode: String,
    /// Sorted, de-duplicated.
    pub sources: Vec<Source>,
    pub top_n: usize,
    pub allow_t4: bool,
    pub lookback_days: i64,
    pub deterministic: bool,
}

impl RunRequest {
    /// Normalize and validate against service defaults. Runs before any
    /// pipeline stage.
    pub fn resolve(&self, cfg: &DigestConfig) -> Result<RunOptions, ConfigError> {
        let query = self.query.split_whitespace().collect::<Vec<_>>().join(" ");
        if query.is_empty() {
            return Err(ConfigError::EmptyQuery);
        }

        let window_days = self.window_days.unwrap_or(cfg.default_window_days);
        if !(1..=MAX_WINDOW_DAYS).contains(&window_days) {
            return Err(ConfigError::InvalidWindow {
                got: window_days,
                max: MAX_WINDOW_DAYS,
            });
        }

        let top_n = self.top_n.unwrap_or(cfg.default_top_n);
        if !(1..=MAX_TOP_N).contains(&top_n) {
            return Err(ConfigError::InvalidTopN {
                got: top_n,
                max: MAX_TOP_N,
            });
        }

        cfg.check_lookback()?;
        if cfg.lookback_days <= window_days {
            return Err(ConfigError::InvalidLookback {
                lookback: cfg.lookback_days,
                window: window_days,
            });
        }

        let mut sources = match &self.sources {
            Some(names) => names
                .iter()
                .map(|s| s.parse::<Source>())
                .collect::<Result<Vec<_>, _>>()?,
            None => cfg.enabled_sources()?,
        };
        sources.sort();
        sources.dedup();
        if sources.is_empty() {
            return Err(ConfigError::NoSources);
        }

        Ok(RunOptions {
            query,
            window_days,
            target: normalize_word(self.target.as_deref(), "generic"),
            mode: normalize_word(self.mode.as_deref(), "standard"),
            sources,
            top_n,
            allow_t4: self.allow_t4.unwrap_or(cfg.allow_t4),
            lookback_days: cfg.lookback_days,
            deterministic: self.deterministic.unwrap_or(true),
        })
    }
}

fn normalize_word(v: Option<&str>, default: &str) -> String {
    match v.map(str::trim) {
        Some(s) if !s.is_empty() => s.to_ascii_lowercase(),
        _ => default.to_string(),
    }
}

impl RunOptions {
    /// `query|window|target|mode|sources|top_n|date`, query lower-cased.
    pub fn canonical_string(&self, run_date: NaiveDate) -> String {
        let sources = self
            .sources
            .iter()
            .map(|s| s.as_str())
            .collect::<Vec<_>>()
            .join(",");
        format!(
            "{}|{}|{}|{}|{}|{}|{}",
            self.query.to_lowercase(),
            self.window_days,
            self.target,
            self.mode,
            sources,
            self.top_n,
            run_date.format("%Y-%m-%d")
        )
    }

    /// Same options on the same day → same id, unless `deterministic` is off.
    pub fn run_id(&self, run_date: NaiveDate) -> String {
        let mut key = self.canonical_string(run_date);
        if !self.deterministic {
            key.push_str(&format!("|nonce:{:016x}", rand::random::<u64>()));
        }
        short_hash(&key, RUN_ID_LEN)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn req(query: &str) -> RunRequest {
        RunRequest {
            query: query.into(),
            ..Default::default()
        }
    }

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 6, d).unwrap()
    }

    #[test]
    fn defaults_come_from_config() {
        let cfg = DigestConfig::default();
        let o = req("  rust   async ").resolve(&cfg).unwrap();
        assert_eq!(o.query, "rust async");
        assert_eq!(o.window_days, cfg.default_window_days);
        assert_eq!(o.top_n, cfg.default_top_n);
        assert_eq!(o.target, "generic");
        assert_eq!(o.mode, "standard");
        assert_eq!(o.sources.len(), Source::ALL.len());
        assert!(o.deterministic);
    }

    #[test]
    fn rejects_bad_input_before_running() {
        let cfg = DigestConfig::default();
        assert_eq!(req("   ").resolve(&cfg), Err(ConfigError::EmptyQuery));

        let mut r = req("q");
        r.window_days = Some(0);
        assert!(matches!(r.resolve(&cfg), Err(ConfigError::InvalidWindow { .. })));

        let mut r = req("q");
        r.top_n = Some(1000);
        assert!(matches!(r.resolve(&cfg), Err(ConfigError::InvalidTopN { .. })));

        let mut r = req("q");
        r.sources = Some(vec!["reddit".into(), "friendster".into()]);
        assert_eq!(
            r.resolve(&cfg),
            Err(ConfigError::UnknownSource("friendster".into()))
        );

        let mut r = req("q");
        r.sources = Some(vec![]);
        assert_eq!(r.resolve(&cfg), Err(ConfigError::NoSources));

        let mut r = req("q");
        r.window_days = Some(200);
        assert!(matches!(r.resolve(&cfg), Err(ConfigError::InvalidLookback { .. })));
    }

    #[test]
    fn unbounded_lookback_in_config_is_rejected() {
        let cfg = DigestConfig {
            lookback_days: i64::MAX,
            ..DigestConfig::default()
        };
        assert!(matches!(
            req("q").resolve(&cfg),
            Err(ConfigError::LookbackOutOfRange { got: i64::MAX, .. })
        ));
    }

    #[test]
    fn run_id_ignores_source_order_and_query_case() {
        let cfg = DigestConfig::default();
        let mut a = req("Rust Async");
        a.sources = Some(vec!["hn".into(), "reddit".into()]);
        let mut b = req("rust async");
        b.sources = Some(vec!["reddit".into(), "hackernews".into(), "reddit".into()]);
        let oa = a.resolve(&cfg).unwrap();
        let ob = b.resolve(&cfg).unwrap();
        assert_eq!(oa.run_id(day(15)), ob.run_id(day(15)));
        assert_eq!(oa.run_id(day(15)).len(), RUN_ID_LEN);
    }

    #[test]
    fn run_id_changes_with_day_and_options() {
        let cfg = DigestConfig::default();
        let o = req("rust").resolve(&cfg).unwrap();
        assert_ne!(o.run_id(day(15)), o.run_id(day(16)));

        let mut r = req("rust");
        r.top_n = Some(5);
        assert_ne!(o.run_id(day(15)), r.resolve(&cfg).unwrap().run_id(day(15)));
    }

    #[test]
    fn nondeterministic_mode_mixes_nonce() {
        let cfg = DigestConfig::default();
        let mut r = req("rust");
        r.deterministic = Some(false);
        let o = r.resolve(&cfg).unwrap();
        assert_ne!(o.run_id(day(15)), o.run_id(day(15)));
    }
}
