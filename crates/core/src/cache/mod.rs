//! SQLite-backed cache for resolved link previews.
//!
//! This module provides a persistent preview cache using SQLite
//! with async access via tokio-rusqlite. It supports:
//!
//! - Keys derived from the canonical URL and user agent (SHA-256)
//! - Automatic schema migrations
//! - WAL mode for concurrent access
//! - TTL expiry plus purge by domain and LRU

pub mod connection;
pub mod hash;
pub mod migrations;
pub mod previews;

pub use crate::Error;

pub use connection::CacheDb;
pub use previews::CachedPreview;
