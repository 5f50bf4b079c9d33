//! The link preview record.
//!
//! A `LinkPreview` is the only thing the extraction pipeline hands back to its
//! caller. It owns all of its strings and has no setters: once the resolver has
//! built one, consumers can only read it.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Canonical preview of a linked page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct LinkPreview {
    title: Option<String>,
    description: Option<String>,
    image_url: Option<String>,
    root_address: String,
}

impl LinkPreview {
    pub fn new(
        title: Option<String>, description: Option<String>, image_url: Option<String>, root_address: impl Into<String>,
    ) -> Self {
        Self { title, description, image_url, root_address: root_address.into() }
    }

    /// A preview carrying nothing but the root address.
    pub fn root_only(root_address: impl Into<String>) -> Self {
        Self::new(None, None, None, root_address)
    }

    pub fn title(&self) -> Option<&str> {
        self.title.as_deref()
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    /// Absolute `http(s)` URL of the thumbnail image.
    pub fn image_url(&self) -> Option<&str> {
        self.image_url.as_deref()
    }

    /// Domain of the previewed URL, without scheme or path.
    pub fn root_address(&self) -> &str {
        &self.root_address
    }

    pub fn has_title(&self) -> bool {
        self.title.is_some()
    }

    /// True when no metadata beyond the root address was found.
    pub fn is_empty(&self) -> bool {
        self.title.is_none() && self.description.is_none() && self.image_url.is_none()
    }
}
