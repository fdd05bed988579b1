// src/config/mod.rs
//! Service-level defaults for digest runs.
//!
//! Resolution order:
//! 1) `$DIGEST_CONFIG_PATH` (must exist if set)
//! 2) `config/digest.toml`
//! 3) `config/digest.json`
//! 4) built-in defaults
//!
//! After loading, `DIGEST_WINDOW_DAYS` and `DIGEST_ALLOW_T4` override the file.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::ingest::types::Source;

pub const ENV_CONFIG_PATH: &str = "DIGEST_CONFIG_PATH";
pub const ENV_WINDOW_DAYS: &str = "DIGEST_WINDOW_DAYS";
pub const ENV_ALLOW_T4: &str = "DIGEST_ALLOW_T4";

/// Upper bound for `lookback_days`; keeps date arithmetic far from chrono's limits.
pub const MAX_LOOKBACK_DAYS: i64 = 3650;

pub const DEFAULT_WINDOW_DAYS: i64 = 7;
pub const DEFAULT_TOP_N: usize = 20;
pub const DEFAULT_LOOKBACK_DAYS: i64 = 180;

fn default_window_days() -> i64 {
    DEFAULT_WINDOW_DAYS
}
fn default_top_n() -> usize {
    DEFAULT_TOP_N
}
fn default_lookback_days() -> i64 {
    DEFAULT_LOOKBACK_DAYS
}
fn default_artifact_dir() -> PathBuf {
    PathBuf::from("artifacts")
}
fn default_sources() -> Vec<String> {
    Source::ALL.iter().map(|s| s.as_str().to_string()).collect()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DigestConfig {
    #[serde(default = "default_window_days")]
    pub default_window_days: i64,
    #[serde(default = "default_top_n")]
    pub default_top_n: usize,
    /// Keep records whose timestamp is missing/unparseable.
    #[serde(default)]
    pub allow_t4: bool,
    #[serde(default = "default_lookback_days")]
    pub lookback_days: i64,
    #[serde(default = "default_artifact_dir")]
    pub artifact_dir: PathBuf,
    #[serde(default = "default_sources")]
    pub enabled_sources: Vec<String>,
}

impl Default for DigestConfig {
    fn default() -> Self {
        Self {
            default_window_days: DEFAULT_WINDOW_DAYS,
            default_top_n: DEFAULT_TOP_N,
            allow_t4: false,
            lookback_days: DEFAULT_LOOKBACK_DAYS,
            artifact_dir: default_artifact_dir(),
            enabled_sources: default_sources(),
        }
    }
}

impl DigestConfig {
    /// Load from an explicit path. TOML or JSON, picked by extension.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path)
            .map_err(|e| ConfigError::File(format!("reading {}: {e}", path.display())))?;
        let ext = path
            .extension()
            .and_then(|s| s.to_str())
            .unwrap_or_default()
            .to_ascii_lowercase();
        Self::parse(&content, &ext)
    }

    pub fn load_default() -> Result<Self, ConfigError> {
        let mut cfg = if let Ok(p) = std::env::var(ENV_CONFIG_PATH) {
            let pb = PathBuf::from(p);
            if !pb.exists() {
                return Err(ConfigError::File(format!(
                    "{ENV_CONFIG_PATH} points to non-existent path {}",
                    pb.display()
                )));
            }
            Self::load_from(&pb)?
        } else if Path::new("config/digest.toml").exists() {
            Self::load_from(Path::new("config/digest.toml"))?
        } else if Path::new("config/digest.json").exists() {
            Self::load_from(Path::new("config/digest.json"))?
        } else {
            Self::default()
        };
        cfg.apply_env_overrides();
        Ok(cfg)
    }

    fn parse(s: &str, hint_ext: &str) -> Result<Self, ConfigError> {
        let cfg: Self = if hint_ext == "json" {
            serde_json::from_str(s).map_err(|e| ConfigError::File(e.to_string()))?
        } else {
            toml::from_str(s).map_err(|e| ConfigError::File(e.to_string()))?
        };
        // Fail fast on typos in the source list.
        cfg.enabled_sources()?;
        cfg.check_lookback()?;
        Ok(cfg)
    }

    fn apply_env_overrides(&mut self) {
        if let Some(w) = std::env::var(ENV_WINDOW_DAYS)
            .ok()
            .and_then(|v| v.trim().parse::<i64>().ok())
        {
            self.default_window_days = w;
        }
        if let Ok(v) = std::env::var(ENV_ALLOW_T4) {
            self.allow_t4 = matches!(v.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes");
        }
    }

    pub fn check_lookback(&self) -> Result<(), ConfigError> {
        if (1..=MAX_LOOKBACK_DAYS).contains(&self.lookback_days) {
            Ok(())
        } else {
            Err(ConfigError::LookbackOutOfRange {
                got: self.lookback_days,
                max: MAX_LOOKBACK_DAYS,
            })
        }
    }

    /// Sorted, de-duplicated list of enabled sources.
    pub fn enabled_sources(&self) -> Result<Vec<Source>, ConfigError> {
        let mut out = self
            .enabled_sources
            .iter()
            .map(|s| s.parse::<Source>())
            .collect::<Result<Vec<_>, _>>()?;
        out.sort();
        out.dedup();
        Ok(out)
    }
}
