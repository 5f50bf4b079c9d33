//! Link preview extraction.
//!
//! The pipeline runs over the start of a decoded document:
//!
//! 1. [`HeadRegion`] reads lines up to and including the first `</head>`.
//! 2. [`head_element`] isolates the `<head>...</head>` element.
//! 3. `<link-root>` marker events carrying the root address are placed in front of it.
//! 4. [`TagScanner`] turns the markup into events.
//! 5. [`MetadataCollector`] keeps the title, the root and recognized `<meta>` values.
//! 6. [`resolve_preview`] applies precedence rules and builds the [`LinkPreview`].
//!
//! Everything here is synchronous and owns no shared state; the same input
//! always yields the same preview.

pub mod collector;
pub mod head;
pub mod resolve;
pub mod scanner;

pub use collector::{CollectedMetadata, MetaKey, MetadataCollector, ROOT_MARKER_TAG, collect};
pub use head::{HeadRegion, head_element};
pub use resolve::resolve_preview;
pub use scanner::{Attribute, ScanError, TagEvent, TagScanner};

use std::io::BufRead;

use linkpeek_core::{Error, LinkPreview};

/// Marker events carrying the root address, fed to the collector ahead of
/// the scanned head. The root never passes through the scanner, so it is kept
/// byte for byte whatever characters it holds.
fn root_marker(root: &str) -> [Result<TagEvent, ScanError>; 3] {
    [
        Ok(TagEvent::StartTag { name: ROOT_MARKER_TAG.to_string(), attributes: Vec::new(), self_closing: false }),
        Ok(TagEvent::Text(root.to_string())),
        Ok(TagEvent::EndTag(ROOT_MARKER_TAG.to_string())),
    ]
}

/// Extract a preview from a decoded document stream.
///
/// Reads no further than the line that closes the head. `root` is the root
/// address of the document's URL (see [`crate::root_address`]).
pub fn extract<R: BufRead>(reader: R, root: &str) -> Result<LinkPreview, Error> {
    let region = HeadRegion::read(reader)?;
    tracing::debug!(bytes = region.len(), closed = region.is_closed(), "read head region");
    Ok(extract_from_head(region.as_str(), root))
}

/// Extract a preview from text that already holds the head region.
pub fn extract_from_head(region: &str, root: &str) -> LinkPreview {
    let Some(head) = head_element(region) else {
        tracing::debug!(root, "no complete <head> element, returning root only");
        return LinkPreview::root_only(root);
    };

    let metadata = collect(root_marker(root).into_iter().chain(TagScanner::new(head)));
    tracing::debug!(
        root,
        has_title = metadata.title.is_some(),
        meta = metadata.meta.len(),
        "collected head metadata"
    );

    resolve_preview(&metadata)
}
