//! # Frequency Store
//!
//! A concurrent map from hashtag to occurrence count, backed by `DashMap`.
//! Increments take the shard write lock for the token, so two concurrent
//! increments of the same token can never observe the same pre-increment value.
//! Reads are lock-per-shard and may interleave with writers; they see a
//! consistent value for a single key but not a global snapshot.

use dashmap::DashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Number of distinct hashtags the production store is pre-sized for.
pub const INITIAL_TAG_CAPACITY: usize = 1_500_000;

/// # Tag Count
///
/// A hashtag together with its post-increment count and the sequence number it
/// was first seen with. The sequence number is the tie-break used by the
/// leaderboard: among equal counts the earlier tag ranks first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TagCount {
    /// The hashtag, marker included.
    pub token: Arc<str>,
    /// Occurrences recorded so far.
    pub count: u64,
    /// Global insertion order of the token.
    pub first_seen: u64,
}

#[derive(Debug)]
struct Tally {
    count: u64,
    first_seen: u64,
}

/// # Frequency Store
///
/// An explicitly owned, shareable counter map. Wrap it in an `Arc` (or own it
/// inside a `HashtagCounter`) and hand it to collaborators.
#[derive(Debug, Default)]
pub struct FrequencyStore {
    counts: DashMap<Arc<str>, Tally>,
    next_sequence: AtomicU64,
}

impl FrequencyStore {
    /// Creates an empty store with the default hasher capacity.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an empty store that can hold `capacity` tags without reallocating.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            counts: DashMap::with_capacity(capacity),
            next_sequence: AtomicU64::new(0),
        }
    }

    /// Increments `token`, inserting it with a count of 1 when absent, and
    /// returns the full post-increment record.
    pub fn record(&self, token: &str) -> TagCount {
        // Fast path: existing tags avoid allocating a new key.
        if let Some(mut tally) = self.counts.get_mut(token) {
            tally.count += 1;
            return TagCount {
                token: Arc::clone(tally.key()),
                count: tally.count,
                first_seen: tally.first_seen,
            };
        }

        let mut tally = self.counts.entry(Arc::from(token)).or_insert_with(|| Tally {
            count: 0,
            first_seen: self.next_sequence.fetch_add(1, Ordering::Relaxed),
        });
        tally.count += 1;
        TagCount {
            token: Arc::clone(tally.key()),
            count: tally.count,
            first_seen: tally.first_seen,
        }
    }

    /// Increments `token` and returns its new count.
    pub fn increment(&self, token: &str) -> u64 {
        self.record(token).count
    }

    /// Current count of `token`, 0 when it was never seen.
    pub fn get(&self, token: &str) -> u64 {
        self.counts.get(token).map_or(0, |tally| tally.count)
    }

    /// Number of distinct tags recorded.
    pub fn len(&self) -> usize {
        self.counts.len()
    }

    /// True when no tag has been recorded yet.
    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }
}
