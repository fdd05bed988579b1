//! # Idea Clusterer
//! Groups records that tell the same story under different URLs, and measures
//! how independently that story is corroborated.
//!
//! - signature: top-5 content tokens of title + snippet, sorted, `|`-joined
//! - origin: `hash(hostname | signature)`; reposts on one host share an origin
//! - echo risk: `1 - origins / items`, 0 when every member is independent
//! - grade: diversity of non-web source categories among members

use std::collections::{BTreeSet, HashMap, HashSet};

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::dedup::UrlCluster;
use crate::hashing::cluster_hash;
use crate::ingest::types::{EvidenceCategory, Source};

pub const MISC_SIGNATURE: &str = "misc";
pub const SIGNATURE_TOKENS: usize = 5;
const MIN_TOKEN_CHARS: usize = 3;

static TOKEN_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"[a-z0-9]+").unwrap());

static STOP_WORDS: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    [
        "the", "and", "for", "with", "that", "this", "from", "are", "was", "were", "has", "have",
        "had", "not", "but", "you", "your", "yours", "its", "into", "over", "about", "than",
        "then", "they", "them", "their", "there", "what", "when", "where", "which", "who",
        "whom", "why", "how", "will", "would", "can", "could", "should", "shall", "may",
        "might", "must", "our", "ours", "out", "all", "any", "been", "being", "also", "more",
        "most", "some", "such", "only", "own", "same", "very", "just", "each", "both", "few",
        "other", "these", "those", "here", "after", "before", "because", "while", "did", "does",
        "doing", "off", "under", "again", "further", "once", "his", "her", "hers", "she", "him",
        "himself", "herself", "itself", "themselves", "ourselves", "yourself", "between",
        "through", "during", "above", "below", "down", "upon", "via", "per", "nor", "too",
        "until", "against", "among", "within", "without", "onto", "toward", "towards", "whose",
        "ever", "even", "yet", "still", "now", "one",
    ]
    .into_iter()
    .collect()
});

/// Canonical idea key and its human-readable form.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Signature {
    pub key: String,
    pub label: String,
}

pub fn tokenize(text: &str) -> Vec<String> {
    let lower = text.to_lowercase();
    TOKEN_RE
        .find_iter(&lower)
        .map(|m| m.as_str())
        .filter(|t| t.chars().count() >= MIN_TOKEN_CHARS && !STOP_WORDS.contains(t))
        .map(str::to_string)
        .collect()
}

pub fn signature(title: &str, snippet: &str) -> Signature {
    let mut freq: HashMap<String, usize> = HashMap::new();
    for t in tokenize(&format!("{title} {snippet}")) {
        *freq.entry(t).or_insert(0) += 1;
    }
    if freq.is_empty() {
        return Signature {
            key: MISC_SIGNATURE.to_string(),
            label: MISC_SIGNATURE.to_string(),
        };
    }

    let mut ranked: Vec<(String, usize)> = freq.into_iter().collect();
    // frequency desc, then token asc
    ranked.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    let mut top: Vec<String> = ranked
        .into_iter()
        .take(SIGNATURE_TOKENS)
        .map(|(t, _)| t)
        .collect();
    top.sort();

    Signature {
        key: top.join("|"),
        label: top.join(" "),
    }
}

/// Lower-cased host of `url`; empty when the URL has no parseable host.
pub fn hostname(url: &str) -> String {
    url::Url::parse(url.trim())
        .ok()
        .and_then(|u| u.host_str().map(str::to_ascii_lowercase))
        .unwrap_or_default()
}

pub fn origin_id(url: &str, signature_key: &str) -> String {
    cluster_hash(&format!("{}|{}", hostname(url), signature_key))
}

/// Ordered weakest → strongest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EvidenceGrade {
    DiscussionOnly,
    ImplementationConfirmed,
    MultiConfirmed,
}

impl EvidenceGrade {
    pub fn as_str(self) -> &'static str {
        match self {
            EvidenceGrade::DiscussionOnly => "discussion-only",
            EvidenceGrade::ImplementationConfirmed => "implementation-confirmed",
            EvidenceGrade::MultiConfirmed => "multi-confirmed",
        }
    }
}

pub fn grade(categories: &BTreeSet<EvidenceCategory>) -> EvidenceGrade {
    let graded = categories
        .iter()
        .filter(|c| **c != EvidenceCategory::Web)
        .count();
    if graded >= 2 {
        EvidenceGrade::MultiConfirmed
    } else if categories.contains(&EvidenceCategory::Implementation) {
        EvidenceGrade::ImplementationConfirmed
    } else {
        EvidenceGrade::DiscussionOnly
    }
}

pub fn echo_risk(origin_count: usize, item_count: usize) -> f64 {
    if item_count == 0 {
        return 0.0;
    }
    (1.0 - origin_count as f64 / item_count as f64).clamp(0.0, 1.0)
}

/// Per-idea aggregate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IdeaCluster {
    pub idea_cluster_id: String,
    pub signature: String,
    pub label: String,
    pub item_count: usize,
    pub origin_count: usize,
    pub echo_risk: f64,
    pub evidence_grade: EvidenceGrade,
    pub sources: Vec<Source>,
}

/// A url cluster annotated with its idea and that idea's aggregates.
#[derive(Debug, Clone, PartialEq)]
pub struct IdeaMember {
    pub url_cluster: UrlCluster,
    pub idea_cluster_id: String,
    pub label: String,
    pub origin_id: String,
    pub origin_count: usize,
    pub echo_risk: f64,
    pub evidence_grade: EvidenceGrade,
}

#[derive(Debug, Clone, Default)]
pub struct IdeaClustering {
    /// Input order.
    pub members: Vec<IdeaMember>,
    /// First-occurrence order.
    pub clusters: Vec<IdeaCluster>,
}

struct Acc {
    signature: Signature,
    items: usize,
    origins: BTreeSet<String>,
    categories: BTreeSet<EvidenceCategory>,
    sources: BTreeSet<Source>,
}

pub fn cluster_ideas(items: Vec<UrlCluster>) -> IdeaClustering {
    // pass 1: signature + origin per item, aggregates per idea
    let mut order: Vec<String> = Vec::new();
    let mut accs: HashMap<String, Acc> = HashMap::new();
    let mut per_item = Vec::with_capacity(items.len());

    for uc in items {
        let rec = &uc.item.record;
        let sig = signature(&rec.title, &rec.snippet);
        let idea_id = cluster_hash(&sig.key);
        let origin = origin_id(&rec.url, &sig.key);

        let acc = accs.entry(idea_id.clone()).or_insert_with(|| {
            order.push(idea_id.clone());
            Acc {
                signature: sig.clone(),
                items: 0,
                origins: BTreeSet::new(),
                categories: BTreeSet::new(),
                sources: BTreeSet::new(),
            }
        });
        acc.items += 1;
        acc.origins.insert(origin.clone());
        acc.categories.insert(rec.source.category());
        acc.sources.insert(rec.source);

        per_item.push((uc, idea_id, origin));
    }

    let clusters: Vec<IdeaCluster> = order
        .iter()
        .filter_map(|id| accs.get(id).map(|acc| (id, acc)))
        .map(|(id, acc)| IdeaCluster {
            idea_cluster_id: id.clone(),
            signature: acc.signature.key.clone(),
            label: acc.signature.label.clone(),
            item_count: acc.items,
            origin_count: acc.origins.len(),
            echo_risk: echo_risk(acc.origins.len(), acc.items),
            evidence_grade: grade(&acc.categories),
            sources: acc.sources.iter().copied().collect(),
        })
        .collect();

    // pass 2: stamp aggregates onto members
    let by_id: HashMap<&str, &IdeaCluster> = clusters
        .iter()
        .map(|c| (c.idea_cluster_id.as_str(), c))
        .collect();
    let members = per_item
        .into_iter()
        .filter_map(|(uc, idea_id, origin)| {
            let c = by_id.get(idea_id.as_str())?;
            Some(IdeaMember {
                url_cluster: uc,
                label: c.label.clone(),
                origin_id: origin,
                origin_count: c.origin_count,
                echo_risk: c.echo_risk,
                evidence_grade: c.evidence_grade,
                idea_cluster_id: idea_id,
            })
        })
        .collect();

    IdeaClustering { members, clusters }
}
