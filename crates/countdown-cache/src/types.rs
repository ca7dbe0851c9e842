//! Cache index types

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;

/// Bucket granularity: target timestamps are floored to the minute.
pub const BUCKET_SECS: i64 = 60;

/// Maximum distance between a requested timestamp and a bucket key for the
/// bucket's artifact to count as a hit.
pub const MATCH_TOLERANCE_SECS: i64 = 90;

/// Metadata for one cached countdown artifact.
///
/// `expires_at` is the original (unfloored) target timestamp; once it has
/// passed the countdown is over and the entry is stale.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheEntry {
    pub file_path: PathBuf,
    pub expires_at: i64,
}

/// In-memory index from bucket key (unix seconds, floored to the minute) to
/// entry. serde_json writes the integer keys as decimal strings, which is
/// also the on-disk format.
pub type CacheIndex = HashMap<i64, CacheEntry>;

/// Floor a timestamp to its bucket key.
pub fn bucket_key(ts: i64) -> i64 {
    ts.div_euclid(BUCKET_SECS) * BUCKET_SECS
}
