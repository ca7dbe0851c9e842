//! Minute-bucketed countdown GIF cache with JSON index persistence
//!
//! Generated countdown artifacts are stored on disk keyed by their target
//! timestamp floored to the minute. Requests within a 90 second tolerance of
//! an existing bucket reuse its artifact; entries whose target has passed are
//! swept out (and their files deleted) before every lookup. The index itself
//! survives restarts as a single JSON file.

mod cache;
mod error;
mod store;
mod types;

pub use cache::{CountdownCache, Renderer};
pub use error::{CacheError, Result};
pub use store::IndexStore;
pub use types::{bucket_key, CacheEntry, CacheIndex, BUCKET_SECS, MATCH_TOLERANCE_SECS};
