//! Utility modules: developer logging and JSON conversion.
pub mod devlog;
pub mod json;
