//! # Data Ingestors Module
//!
//! Everything between the response body of the streaming endpoint and the
//! hashtag counters.
//!
//! ## Purpose:
//! The streaming endpoint interleaves success events, in-band error objects,
//! keep-alive blank lines and, occasionally, objects split over several lines.
//! This module turns that byte stream into an ordered sequence of events,
//! keeps the connection alive through transient failures with exponential
//! backoff, and hands the events to the counter.
//!
//! ## Contained Modules:
//! - **`frame`**: line framing and the pure line classifier.
//! - **`error`**: the `StreamError` taxonomy and failure classification.
//! - **`session`**: the reconnecting `StreamSession` state machine.
//! - **`pipeline`**: `IngestionPipeline`, the session-to-counter wiring.

#![doc(html_logo_url = "https://example.com/logo.png")] // Placeholder
#![forbid(unsafe_code)]
#![warn(missing_docs, rust_2018_idioms, unused_qualifications)]

/// Stream error types and their classification.
pub mod error;
/// Line framing and frame classification.
pub mod frame;
/// Session-to-counter wiring.
pub mod pipeline;
/// The reconnecting stream session.
pub mod session;

#[cfg(test)]
mod testing;

// --- Public API Re-exports ---
pub use error::{FailureClass, RateLimitPolicy, StreamError};
pub use frame::{classify_line, FrameAssembler, LineFramer, StreamErrorObject, StreamFrame, TweetEvent};
pub use pipeline::{DeliveryMode, IngestionPipeline};
pub use session::{
    advance, backoff_delay, ByteStream, RetryState, SessionInput, SessionOutcome, SessionSettings, SessionState,
    SessionSummary, Sleeper, StreamConnector, StreamSession, TokioSleeper,
};
