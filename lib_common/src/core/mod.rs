//! # Core Counting Module
//!
//! This module forms the heart of the hashtag tracker. It aggregates the
//! components that turn raw event text into a live leaderboard. Every piece here
//! is synchronous and thread-safe so it can be driven from the async reader or
//! from a dedicated consumer task.
//!
//! ## Core Components:
//!
//! - **`extractor`**: Finds hashtag tokens in a piece of text. A token starts
//!   with `#` at the beginning of the text or after whitespace, followed by one or
//!   more word characters.
//!
//! - **`frequency_store`**: A concurrent map from token to occurrence count. Each
//!   increment is atomic per token and returns the post-increment count.
//!
//! - **`top_k`**: The bounded leaderboard of the ten highest counts with a cached
//!   admission threshold, so most updates never trigger a re-sort.
//!
//! - **`hashtags`**: The `HashtagCounter` facade that ties the three together and
//!   exposes the read accessors used by reports.

#![doc(html_logo_url = "https://example.com/logo.png")] // Placeholder
#![forbid(unsafe_code)]
#![warn(missing_docs, rust_2018_idioms, unused_qualifications)]

/// Hashtag token extraction.
pub mod extractor;
/// The concurrent token frequency store.
pub mod frequency_store;
/// The bounded top-K leaderboard.
pub mod top_k;
/// The counter facade combining the store and the leaderboard.
pub mod hashtags;

// --- Public API Re-exports ---
pub use extractor::{extract_hashtags, HASHTAG_MARKER};
pub use frequency_store::{FrequencyStore, TagCount};
pub use hashtags::{CounterSnapshot, HashtagCounter};
pub use top_k::{TopK, TOP_K};
