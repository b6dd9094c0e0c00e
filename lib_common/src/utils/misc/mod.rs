/// Ordinal and thousands-separator formatting.
pub mod text_format;
