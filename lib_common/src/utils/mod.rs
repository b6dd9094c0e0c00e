//! # Utilities Module
//!
//! A collection point for small, general-purpose helpers shared across the
//! `lib_common` crate and the binaries.
//!
//! ## Contained Modules:
//!
//! - **`misc`**: miscellaneous helpers, currently text formatting for log lines
//!   and reports (`text_format`).

#![doc(html_logo_url = "https://example.com/logo.png")] // Placeholder
#![forbid(unsafe_code)]
#![warn(missing_docs, rust_2018_idioms, unused_qualifications)]

/// Miscellaneous utility functions.
pub mod misc;

pub use misc::text_format::{format_thousands, int_to_ordinal};
