//! Data models for recognized text, extracted records and configuration.

pub mod config;
pub mod line;
pub mod record;
