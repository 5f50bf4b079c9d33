//! Client code for linkpeek.
//!
//! This crate provides the HTTP fetch pipeline and the head-only metadata
//! extraction used by the server.

pub mod extract;
pub mod fetch;

pub use extract::{
    CollectedMetadata, HeadRegion, MetaKey, MetadataCollector, ScanError, TagEvent, TagScanner, extract,
    extract_from_head, resolve_preview,
};

pub use fetch::{FetchClient, FetchConfig, HeadResponse, PreviewResponse, root_address};
