//! Content-addressed identifiers.
//!
//! Every id the pipeline hands out (url cluster, idea cluster, origin, run) is a
//! truncated SHA-256 hex digest of a canonical string, so identical inputs always
//! map to identical ids across runs and machines.

use sha2::{Digest, Sha256};
use std::fmt::Write as _;

/// Width of cluster / idea / origin ids.
pub const CLUSTER_ID_LEN: usize = 10;
/// Width of run ids.
pub const RUN_ID_LEN: usize = 16;

/// SHA-256 of `input`, lowercase hex, truncated to `hex_len` chars (max 64).
pub fn short_hash(input: &str, hex_len: usize) -> String {
    let mut hasher = Sha256::new();
    hasher.update(input.as_bytes());
    let digest = hasher.finalize();

    let hex_len = hex_len.min(digest.len() * 2);
    let mut out = String::with_capacity(hex_len + 1);
    for b in digest.iter().take(hex_len.div_ceil(2)) {
        let _ = write!(&mut out, "{:02x}", b);
    }
    out.truncate(hex_len);
    out
}

/// Short id used for clusters, ideas and origins.
pub fn cluster_hash(input: &str) -> String {
    short_hash(input, CLUSTER_ID_LEN)
}
