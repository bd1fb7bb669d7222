//! Shared plumbing for the `extract_sources` and `source_watcher` binaries.
pub mod config;
pub mod platform;
