// src/ingest/types.rs
use std::fmt;
use std::str::FromStr;

use anyhow::Result;
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Upstream collector a record came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Source {
    Reddit,
    Hackernews,
    GithubIssues,
    GithubPrs,
    Youtube,
    Web,
}

/// Kind of corroboration a source provides.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EvidenceCategory {
    Discussion,
    Implementation,
    Demonstration,
    /// Undifferentiated search results; never counts toward a grade.
    Web,
}

impl Source {
    pub const ALL: [Source; 6] = [
        Source::Reddit,
        Source::Hackernews,
        Source::GithubIssues,
        Source::GithubPrs,
        Source::Youtube,
        Source::Web,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Source::Reddit => "reddit",
            Source::Hackernews => "hackernews",
            Source::GithubIssues => "github_issues",
            Source::GithubPrs => "github_prs",
            Source::Youtube => "youtube",
            Source::Web => "web",
        }
    }

    pub fn category(self) -> EvidenceCategory {
        match self {
            Source::Reddit | Source::Hackernews => EvidenceCategory::Discussion,
            Source::GithubIssues | Source::GithubPrs => EvidenceCategory::Implementation,
            Source::Youtube => EvidenceCategory::Demonstration,
            Source::Web => EvidenceCategory::Web,
        }
    }

    /// `SOURCE_FAILURE_<SOURCE>` integrity flag for this collector.
    pub fn failure_flag(self) -> String {
        format!("SOURCE_FAILURE_{}", self.as_str().to_ascii_uppercase())
    }
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Source {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let norm = s.trim().to_ascii_lowercase().replace('-', "_");
        match norm.as_str() {
            "reddit" => Ok(Source::Reddit),
            "hackernews" | "hacker_news" | "hn" => Ok(Source::Hackernews),
            "github_issues" | "github" => Ok(Source::GithubIssues),
            "github_prs" | "github_pulls" => Ok(Source::GithubPrs),
            "youtube" => Ok(Source::Youtube),
            "web" => Ok(Source::Web),
            _ => Err(ConfigError::UnknownSource(s.trim().to_string())),
        }
    }
}

/// One record as produced by a collector. Never mutated downstream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawRecord {
    pub title: String,
    pub url: String,
    #[serde(default)]
    pub snippet: String,
    /// ISO-8601 as delivered upstream; may be missing or garbage.
    #[serde(default)]
    pub published_at: Option<String>,
    pub source: Source,
    /// Upvotes / points / reactions, when the source reports any.
    #[serde(default)]
    pub engagement: Option<i64>,
}

/// A collector that reported failure for this run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceFailure {
    pub source: Source,
    #[serde(default)]
    pub error: String,
}

#[async_trait::async_trait]
pub trait SourceCollector: Send + Sync {
    async fn fetch(&self, query: &str, limit: usize) -> Result<Vec<RawRecord>>;
    fn source(&self) -> Source;
}
