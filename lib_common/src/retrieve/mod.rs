//! # Data Retrieval Module
//!
//! HTTP plumbing for the ingestion layer.
//!
//! ## Purpose:
//! Keeps `reqwest` out of the session logic. The session only sees the
//! `StreamConnector` trait; this module provides the implementation that talks
//! to the real endpoint with the expected headers and bearer authentication.
//!
//! ## Contained Modules:
//!
//! - **`stream_client`**: `StreamEndpoint` (URL and credential validation) and
//!   `HttpStreamConnector`, the long-lived GET whose body is streamed chunk by
//!   chunk into the session.

#![doc(html_logo_url = "https://example.com/logo.png")] // Placeholder
#![forbid(unsafe_code)]
#![warn(missing_docs, rust_2018_idioms, unused_qualifications)]

/// Streaming HTTP connector for the sampled event stream.
pub mod stream_client;

pub use stream_client::{status_rejection, HttpStreamConnector, StreamEndpoint, DEFAULT_STREAM_URL, DEFAULT_USER_AGENT};
