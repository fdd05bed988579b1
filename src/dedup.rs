//! Exact-duplicate clustering: one survivor per distinct URL, first seen wins.

use std::collections::HashSet;

use crate::hashing::cluster_hash;
use crate::timestamp::TimestampedRecord;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UrlCluster {
    pub item: TimestampedRecord,
    /// `hash(url)`, 10 hex chars.
    pub cluster_id: String,
}

/// Returns the survivors in first-occurrence order plus the number of
/// records dropped as duplicates. URLs are compared byte-for-byte.
pub fn cluster_by_url(items: Vec<TimestampedRecord>) -> (Vec<UrlCluster>, usize) {
    let mut seen: HashSet<String> = HashSet::with_capacity(items.len());
    let mut out = Vec::with_capacity(items.len());
    let mut dropped = 0usize;

    for item in items {
        if !seen.insert(item.record.url.clone()) {
            dropped += 1;
            continue;
        }
        let cluster_id = cluster_hash(&item.record.url);
        out.push(UrlCluster { item, cluster_id });
    }
    (out, dropped)
}
