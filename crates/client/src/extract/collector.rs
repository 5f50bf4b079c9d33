//! Metadata collection over scanner events.

use std::collections::BTreeMap;

use super::scanner::{ScanError, TagEvent};

/// Element the caller injects to carry the root address into the scan.
pub const ROOT_MARKER_TAG: &str = "link-root";

/// `<meta>` identities that feed a preview.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum MetaKey {
    OgTitle,
    TwitterTitle,
    Description,
    OgDescription,
    TwitterDescription,
    OgImage,
}

impl MetaKey {
    pub const ALL: [MetaKey; 6] = [
        MetaKey::OgTitle,
        MetaKey::TwitterTitle,
        MetaKey::Description,
        MetaKey::OgDescription,
        MetaKey::TwitterDescription,
        MetaKey::OgImage,
    ];

    /// Recognize a `name`/`property` value, ignoring ASCII case and padding.
    pub fn parse(value: &str) -> Option<Self> {
        let value = value.trim();
        Self::ALL.into_iter().find(|key| key.as_str().eq_ignore_ascii_case(value))
    }

    pub fn as_str(self) -> &'static str {
        match self {
            MetaKey::OgTitle => "og:title",
            MetaKey::TwitterTitle => "twitter:title",
            MetaKey::Description => "description",
            MetaKey::OgDescription => "og:description",
            MetaKey::TwitterDescription => "twitter:description",
            MetaKey::OgImage => "og:image",
        }
    }
}

impl std::fmt::Display for MetaKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Everything a scan produced, before precedence rules are applied.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CollectedMetadata {
    /// First non-empty `<title>`, trimmed
    pub title: Option<String>,
    /// Text of the first root marker
    pub root_address: Option<String>,
    /// Last value seen per recognized key
    pub meta: BTreeMap<MetaKey, String>,
}

impl CollectedMetadata {
    pub fn get(&self, key: MetaKey) -> Option<&str> {
        self.meta.get(&key).map(String::as_str)
    }
}

#[derive(Debug)]
enum Capture {
    Title(String),
    Root(String),
}

/// Folds scanner events into [`CollectedMetadata`].
///
/// Holds only per-scan state; build a new one for every document.
#[derive(Debug, Default)]
pub struct MetadataCollector {
    collected: CollectedMetadata,
    capture: Option<Capture>,
    root_seen: bool,
}

impl MetadataCollector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, event: TagEvent) {
        match event {
            TagEvent::StartTag { name, attributes, self_closing } => match name.as_str() {
                "title" if !self_closing && self.collected.title.is_none() => {
                    self.capture = Some(Capture::Title(String::new()));
                }
                "meta" => {
                    let mut content = None;
                    let mut keys = Vec::new();
                    for attr in attributes {
                        match attr.name.as_str() {
                            "content" if content.is_none() => content = Some(attr.value),
                            "name" | "property" => keys.extend(MetaKey::parse(&attr.value)),
                            _ => {}
                        }
                    }
                    if let Some(content) = content {
                        for key in keys {
                            self.collected.meta.insert(key, content.clone());
                        }
                    }
                }
                ROOT_MARKER_TAG if !self.root_seen => {
                    self.root_seen = true;
                    if self_closing {
                        self.collected.root_address = Some(String::new());
                    } else {
                        self.capture = Some(Capture::Root(String::new()));
                    }
                }
                _ => {}
            },
            TagEvent::Text(text) => match &mut self.capture {
                Some(Capture::Title(buf)) | Some(Capture::Root(buf)) => buf.push_str(&text),
                None => {}
            },
            TagEvent::EndTag(name) => {
                let closes = matches!(
                    (&self.capture, name.as_str()),
                    (Some(Capture::Title(_)), "title") | (Some(Capture::Root(_)), ROOT_MARKER_TAG)
                );
                if closes {
                    self.flush();
                }
            }
        }
    }

    fn flush(&mut self) {
        match self.capture.take() {
            Some(Capture::Title(text)) => {
                let text = text.trim();
                if !text.is_empty() && self.collected.title.is_none() {
                    self.collected.title = Some(text.to_string());
                }
            }
            Some(Capture::Root(text)) => self.collected.root_address = Some(text),
            None => {}
        }
    }

    pub fn finish(mut self) -> CollectedMetadata {
        self.flush();
        self.collected
    }
}

/// Collect metadata from a scan, keeping whatever preceded a scan error.
pub fn collect<I>(events: I) -> CollectedMetadata
where
    I: IntoIterator<Item = Result<TagEvent, ScanError>>,
{
    let mut collector = MetadataCollector::new();
    for event in events {
        match event {
            Ok(event) => collector.push(event),
            Err(e) => {
                tracing::warn!(error = %e, "scan aborted, keeping partial metadata");
                break;
            }
        }
    }
    collector.finish()
}
