//! Precedence rules turning collected metadata into a [`LinkPreview`].

use linkpeek_core::LinkPreview;

use super::collector::{CollectedMetadata, MetaKey};

const TITLE_FALLBACKS: [MetaKey; 2] = [MetaKey::OgTitle, MetaKey::TwitterTitle];
const DESCRIPTION_ORDER: [MetaKey; 3] = [MetaKey::OgDescription, MetaKey::TwitterDescription, MetaKey::Description];

fn first_non_empty(metadata: &CollectedMetadata, keys: &[MetaKey]) -> Option<String> {
    keys.iter()
        .filter_map(|&key| metadata.get(key))
        .map(str::trim)
        .find(|value| !value.is_empty())
        .map(str::to_string)
}

fn has_http_scheme(url: &str) -> bool {
    let bytes = url.as_bytes();
    ["http://", "https://"]
        .iter()
        .any(|scheme| bytes.len() >= scheme.len() && bytes[..scheme.len()].eq_ignore_ascii_case(scheme.as_bytes()))
}

/// Resolve the final preview.
///
/// The document `<title>` wins; `og:title` then `twitter:title` stand in when
/// it is missing. Descriptions prefer `og:description`, then
/// `twitter:description`, then `description`. `og:image` is kept only when it
/// is an absolute `http(s)` URL.
pub fn resolve_preview(metadata: &CollectedMetadata) -> LinkPreview {
    let title = metadata
        .title
        .clone()
        .or_else(|| first_non_empty(metadata, &TITLE_FALLBACKS));

    let description = first_non_empty(metadata, &DESCRIPTION_ORDER);

    let image_url = metadata
        .get(MetaKey::OgImage)
        .map(str::trim)
        .filter(|url| has_http_scheme(url))
        .map(str::to_string);

    let root = metadata.root_address.clone().unwrap_or_default();

    LinkPreview::new(title, description, image_url, root)
}
