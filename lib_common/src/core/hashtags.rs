//! # Hashtag Counter
//!
//! The facade the pipeline drives once per event: extract the tags, bump each
//! one in the `FrequencyStore`, then hand the post-increment counts to the
//! `TopK` leaderboard. The store is lock-free per shard; the leaderboard sits
//! behind a `Mutex` so that `apply_updates` always has a single writer.

use crate::core::extractor::extract_hashtags;
use crate::core::frequency_store::{FrequencyStore, TagCount};
use crate::core::top_k::TopK;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

/// # Counter Snapshot
///
/// A point-in-time copy of the counters, taken for reporting.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CounterSnapshot {
    /// Events processed since start-up.
    pub events: u64,
    /// Distinct hashtags seen since start-up.
    pub distinct_hashtags: usize,
    /// The leaderboard, highest count first.
    pub top: Vec<TagCount>,
}

/// # Hashtag Counter
///
/// Owns the frequency store, the leaderboard and the event counter. Share it
/// between the ingestion consumer and the reporter with an `Arc`.
#[derive(Debug, Default)]
pub struct HashtagCounter {
    store: FrequencyStore,
    top: Mutex<TopK>,
    events: AtomicU64,
}

impl HashtagCounter {
    /// Creates a counter with a default-sized store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a counter whose store is pre-sized for `capacity` distinct tags.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            store: FrequencyStore::with_capacity(capacity),
            top: Mutex::new(TopK::new()),
            events: AtomicU64::new(0),
        }
    }

    fn leaderboard(&self) -> MutexGuard<'_, TopK> {
        // The board is always left consistent between statements, so a panic
        // in another holder does not invalidate it.
        self.top.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Counts one event's text and updates the leaderboard.
    pub fn update_counts(&self, text: &str) {
        let mut batch: Vec<TagCount> = Vec::new();
        for tag in extract_hashtags(text) {
            let record = self.store.record(tag);
            match batch.iter_mut().find(|r| r.token == record.token) {
                Some(existing) => existing.count = record.count,
                None => batch.push(record),
            }
        }

        if !batch.is_empty() {
            self.leaderboard().apply_updates(&batch);
        }
        self.events.fetch_add(1, Ordering::Relaxed);
    }

    /// The current leaderboard, highest count first.
    pub fn top_hashtags(&self) -> Vec<TagCount> {
        self.leaderboard().entries().to_vec()
    }

    /// Events counted so far.
    pub fn number_of_events(&self) -> u64 {
        self.events.load(Ordering::Relaxed)
    }

    /// Distinct hashtags seen so far.
    pub fn number_of_hashtags(&self) -> usize {
        self.store.len()
    }

    /// Count of a single tag, 0 when never seen.
    pub fn count_of(&self, token: &str) -> u64 {
        self.store.get(token)
    }

    /// Copies every counter for a report.
    pub fn snapshot(&self) -> CounterSnapshot {
        let top = self.top_hashtags();
        CounterSnapshot {
            events: self.number_of_events(),
            distinct_hashtags: self.number_of_hashtags(),
            top,
        }
    }
}
