pub mod config;
pub mod reporter;
