//! MCP tool implementations.
//!
//! This module contains all tools exposed by the linkpeek server.

pub mod cache;
pub mod link_preview;

pub use link_preview::{LinkPreviewParams, preview_impl};
