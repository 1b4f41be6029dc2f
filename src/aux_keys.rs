// Copyright (c) 2024-present, fjall-rs
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

//! Namespacing helpers for the [`crate::index`] key space.
//!
//! `$vl`/`$vld` are reserved compaction-bookkeeping prefixes; user keys
//! could otherwise collide with them. This crate resolves that with a
//! single `0x00` sentinel byte prepended to every user key before it
//! reaches the index — ASCII `$vl`/`$vld` keys can never start with
//! `0x00`, so the two namespaces can't collide.

use crate::id::SegmentId;
use rand::Rng;

const USER_KEY_SENTINEL: u8 = 0x00;

const VL_PREFIX: &str = "$vl";
const VLD_PREFIX: &str = "$vld";

/// Prefixes a user key with the namespace sentinel before it is stored in
/// or looked up from the index.
#[must_use]
pub fn namespaced_user_key(key: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(key.len() + 1);
    out.push(USER_KEY_SENTINEL);
    out.extend_from_slice(key);
    out
}

/// Strips the namespace sentinel back off, for keys returned by
/// [`crate::index::Index::iter_all`]/`iter_prefix`.
///
/// Returns `None` if `key` is not a namespaced user key (e.g. it is one of
/// the `$vl`/`$vld` auxiliary bookkeeping keys).
#[must_use]
pub fn strip_user_key_sentinel(key: &[u8]) -> Option<&[u8]> {
    match key.split_first() {
        Some((&USER_KEY_SENTINEL, rest)) => Some(rest),
        _ => None,
    }
}

/// A per-process monotonic counter, used to break ties within the same
/// wall-clock second, where the random suffix alone leaves a small but
/// non-zero collision risk under high throughput.
fn next_sequence() -> u64 {
    use std::sync::atomic::{AtomicU64, Ordering};
    static SEQ: AtomicU64 = AtomicU64::new(0);
    SEQ.fetch_add(1, Ordering::Relaxed)
}

fn timestamped_key(prefix: &str, segment_id: SegmentId) -> String {
    let ts = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0);
    let rand_tiebreak: u16 = rand::thread_rng().gen_range(0..1000);
    let seq = next_sequence();

    format!("{prefix}_{segment_id}_{ts}_{rand_tiebreak}_{seq}")
}

/// Builds a `"$vl_<segment_id>_<ts>_<rand>_<seq>"` bookkeeping key,
/// recording "key K was appended into segment `segment_id`".
#[must_use]
pub fn vl_key(segment_id: SegmentId) -> String {
    timestamped_key(VL_PREFIX, segment_id)
}

/// Builds a `"$vld_<segment_id>_<ts>_<rand>_<seq>"` bookkeeping key,
/// recording "a previous location in segment `segment_id` is now garbage".
#[must_use]
pub fn vld_key(segment_id: SegmentId) -> String {
    timestamped_key(VLD_PREFIX, segment_id)
}
