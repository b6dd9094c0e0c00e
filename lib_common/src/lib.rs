//! # lib_common
//!
//! Shared building blocks for the live hashtag tracker. Every top-level module
//! sits behind a cargo feature of the same name so binaries only compile what
//! they use. The `full` feature turns everything on.

#![forbid(unsafe_code)]

/// Hashtag extraction, frequency counting and the top-K leaderboard.
#[cfg(feature = "core")]
pub mod core;

/// Line framing, the reconnecting stream session and the ingestion pipeline.
#[cfg(feature = "ingestors")]
pub mod ingestors;

/// Console and file logging built on `tracing`.
#[cfg(feature = "loggers")]
pub mod loggers;

/// The HTTP connector for the sampled event stream.
#[cfg(feature = "retrieve")]
pub mod retrieve;

/// Text formatting helpers.
#[cfg(feature = "utils")]
pub mod utils;
