//! # Top-K Leaderboard
//!
//! Holds the ten highest-count hashtags and the admission threshold
//! `min_value`, the count of the lowest-ranked entry once the board is full.
//!
//! ## Update rule
//!
//! `apply_updates` receives every tag of one event with its post-increment
//! count. Tags already on the board have their count overwritten in place.
//! Other tags only qualify when the board still has room or their count beats
//! `min_value`. A re-sort happens only when something qualified or a member
//! changed, so the vast majority of events (tags far below the threshold) cost a
//! scan of at most ten entries and nothing else.
//!
//! Within the board, ordering is by count descending, then by `first_seen`
//! ascending. Admission still requires strictly beating `min_value`, so a tag
//! off the board can tie the last entry even when the store saw it first.

use crate::core::frequency_store::TagCount;
use std::cmp::Ordering;

/// Size of the leaderboard.
pub const TOP_K: usize = 10;

/// # Top-K State
///
/// Not thread-safe for mutation; callers serialize `apply_updates` behind a
/// single writer (see `HashtagCounter`).
#[derive(Debug, Clone, Default)]
pub struct TopK {
    entries: Vec<TagCount>,
    min_value: u64,
}

fn rank(a: &TagCount, b: &TagCount) -> Ordering {
    b.count.cmp(&a.count).then(a.first_seen.cmp(&b.first_seen))
}

impl TopK {
    /// Creates an empty leaderboard.
    pub fn new() -> Self {
        Self {
            entries: Vec::with_capacity(TOP_K + 1),
            min_value: 0,
        }
    }

    /// Applies one event's worth of post-increment counts.
    ///
    /// Returns `true` when the board was re-sorted.
    pub fn apply_updates(&mut self, batch: &[TagCount]) -> bool {
        if batch.is_empty() {
            return false;
        }

        let had_room = self.entries.len() < TOP_K;
        let mut member_updated = false;
        let mut qualifying: Vec<&TagCount> = Vec::new();

        for update in batch {
            match self.entries.iter_mut().find(|e| e.token == update.token) {
                Some(entry) => {
                    // Counts only grow; a stale duplicate in the batch must not undo a newer one.
                    if update.count > entry.count {
                        entry.count = update.count;
                    }
                    member_updated = true;
                }
                None => {
                    if had_room || update.count > self.min_value {
                        match qualifying.iter_mut().find(|c| c.token == update.token) {
                            Some(existing) if existing.count < update.count => *existing = update,
                            Some(_) => {}
                            None => qualifying.push(update),
                        }
                    }
                }
            }
        }

        if qualifying.is_empty() && !member_updated {
            return false;
        }

        self.entries.extend(qualifying.into_iter().cloned());
        self.entries.sort_by(rank);
        self.entries.truncate(TOP_K);
        self.min_value = if self.entries.len() == TOP_K {
            self.entries.last().map_or(0, |e| e.count)
        } else {
            0
        };
        true
    }

    /// The ranked entries, highest count first.
    pub fn entries(&self) -> &[TagCount] {
        &self.entries
    }

    /// Count a new tag has to beat to enter a full board; 0 while there is room.
    pub fn min_value(&self) -> u64 {
        self.min_value
    }

    /// Number of entries on the board.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True when no entry is on the board.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// True once the board holds `TOP_K` entries.
    pub fn is_full(&self) -> bool {
        self.entries.len() == TOP_K
    }

    /// Count recorded on the board for `token`, if it is a member.
    pub fn count_of(&self, token: &str) -> Option<u64> {
        self.entries
            .iter()
            .find(|e| &*e.token == token)
            .map(|e| e.count)
    }
}
