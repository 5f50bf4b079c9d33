//! Core types and shared functionality for linkpeek.
//!
//! This crate provides:
//! - The `LinkPreview` record produced by the extraction pipeline
//! - Preview cache with SQLite backend
//! - Unified error types
//! - Configuration structures

pub mod cache;
pub mod config;
pub mod error;
pub mod preview;

pub use cache::{CacheDb, CachedPreview};
pub use config::{AppConfig, ConfigError};
pub use error::Error;
pub use preview::LinkPreview;
