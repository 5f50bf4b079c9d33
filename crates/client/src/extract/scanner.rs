//! Lenient, forward-only tag scanner.
//!
//! `TagScanner` walks markup and yields start tags, text and end tags. It builds
//! no tree and validates nothing: unquoted or unterminated attribute values,
//! stray `<`, unknown entities and unclosed elements all still produce events.
//!
//! Scanning is lazy and restartable; the scanner borrows its input and is
//! `Clone`, so a second pass is just another scanner over the same `&str`.
//!
//! Invariant: slice boundaries are only ever placed on ASCII bytes (or the ends
//! of the input), so every slice is valid UTF-8.

/// Upper bound on events produced for one input.
pub const MAX_EVENTS: usize = 16_384;

/// Decode character references in text and attribute values. Unknown names
/// are left as written.
fn decode_references(raw: &str) -> String {
    html_escape::decode_html_entities(raw).into_owned()
}

/// One attribute of a start tag, in source order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attribute {
    /// Lowercased attribute name
    pub name: String,
    /// Entity-decoded value; empty for bare attributes
    pub value: String,
}

/// A tokenizer event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TagEvent {
    StartTag { name: String, attributes: Vec<Attribute>, self_closing: bool },
    Text(String),
    EndTag(String),
}

impl TagEvent {
    /// Value of the first attribute called `name`, for start tags.
    pub fn attribute(&self, name: &str) -> Option<&str> {
        match self {
            TagEvent::StartTag { attributes, .. } => attributes
                .iter()
                .find(|a| a.name == name)
                .map(|a| a.value.as_str()),
            _ => None,
        }
    }
}

/// Input the scanner refuses to continue through.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ScanError {
    #[error("NUL byte at offset {offset}; input is not markup")]
    NulByte { offset: usize },

    #[error("event limit of {0} reached")]
    EventLimit(usize),
}

#[derive(Debug, Clone, Copy)]
enum Mode {
    Data,
    /// Inside an element whose body is not tokenized.
    RawText { tag: &'static str, decode: bool },
    /// Positioned at the raw text element's close tag (or end of input).
    RawClose(&'static str),
}

/// Elements whose content is text up to the matching close tag.
fn raw_text_element(name: &str) -> Option<(&'static str, bool)> {
    match name {
        "script" => Some(("script", false)),
        "style" => Some(("style", false)),
        "title" => Some(("title", true)),
        "textarea" => Some(("textarea", true)),
        _ => None,
    }
}

fn is_void_element(name: &str) -> bool {
    matches!(
        name,
        "area" | "base" | "br" | "col" | "embed" | "hr" | "img" | "input" | "link" | "meta" | "param" | "source"
            | "track" | "wbr"
    )
}

fn is_tag_name_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || matches!(b, b'-' | b'_' | b':' | b'.')
}

fn is_attr_name_end(b: u8) -> bool {
    b.is_ascii_whitespace() || matches!(b, b'/' | b'>' | b'=' | b'"' | b'\'')
}

/// Offset of `</tag` (ASCII case-insensitive, followed by a non-name byte).
fn find_close_tag(haystack: &str, tag: &str) -> Option<usize> {
    let bytes = haystack.as_bytes();
    let tag = tag.as_bytes();
    let mut i = 0;
    while let Some(rel) = bytes[i..].iter().position(|&b| b == b'<') {
        let at = i + rel;
        let name_start = at + 2;
        let name_end = name_start + tag.len();
        if bytes.get(at + 1) == Some(&b'/')
            && name_end <= bytes.len()
            && bytes[name_start..name_end].eq_ignore_ascii_case(tag)
            && bytes.get(name_end).is_none_or(|&b| !is_tag_name_byte(b))
        {
            return Some(at);
        }
        i = at + 1;
    }
    None
}

/// Lazy event iterator over a markup string.
#[derive(Debug, Clone)]
pub struct TagScanner<'a> {
    input: &'a str,
    pos: usize,
    mode: Mode,
    emitted: usize,
    finished: bool,
}

impl<'a> TagScanner<'a> {
    pub fn new(input: &'a str) -> Self {
        Self { input, pos: 0, mode: Mode::Data, emitted: 0, finished: false }
    }

    fn bytes(&self) -> &'a [u8] {
        self.input.as_bytes()
    }

    fn check_nul(&self, start: usize, end: usize) -> Result<(), ScanError> {
        match self.bytes()[start..end].iter().position(|&b| b == 0) {
            Some(rel) => Err(ScanError::NulByte { offset: start + rel }),
            None => Ok(()),
        }
    }

    /// `<` that opens a tag, end tag, comment, declaration or instruction.
    fn is_markup_start(&self, at: usize) -> bool {
        let bytes = self.bytes();
        bytes[at] == b'<'
            && bytes
                .get(at + 1)
                .is_some_and(|&b| b.is_ascii_alphabetic() || matches!(b, b'/' | b'!' | b'?'))
    }

    /// Position just past the next `>` at or after `from`, or end of input.
    fn skip_past_gt(&self, from: usize) -> usize {
        self.bytes()[from..]
            .iter()
            .position(|&b| b == b'>')
            .map_or(self.input.len(), |rel| from + rel + 1)
    }

    /// Position just past `terminator` searched from `from`, or end of input.
    fn skip_past(&self, from: usize, terminator: &str) -> usize {
        self.input[from..]
            .find(terminator)
            .map_or(self.input.len(), |rel| from + rel + terminator.len())
    }

    fn step(&mut self) -> Result<Option<TagEvent>, ScanError> {
        loop {
            match self.mode {
                Mode::RawText { tag, decode } => {
                    let start = self.pos;
                    let end = find_close_tag(&self.input[start..], tag).map_or(self.input.len(), |rel| start + rel);
                    self.check_nul(start, end)?;
                    self.pos = end;
                    self.mode = Mode::RawClose(tag);
                    if end > start {
                        let raw = &self.input[start..end];
                        let text = if decode { decode_references(raw) } else { raw.to_string() };
                        return Ok(Some(TagEvent::Text(text)));
                    }
                }
                Mode::RawClose(tag) => {
                    self.mode = Mode::Data;
                    if self.pos < self.input.len() {
                        self.pos = self.skip_past_gt(self.pos);
                    }
                    return Ok(Some(TagEvent::EndTag(tag.to_string())));
                }
                Mode::Data => {
                    if self.pos >= self.input.len() {
                        return Ok(None);
                    }
                    if let Some(event) = self.scan_data()? {
                        return Ok(Some(event));
                    }
                }
            }
        }
    }

    /// Scan one construct in data mode. `Ok(None)` means something was skipped.
    fn scan_data(&mut self) -> Result<Option<TagEvent>, ScanError> {
        let start = self.pos;
        let rest = &self.input[start..];

        if !self.is_markup_start(start) {
            return self.scan_text(start).map(Some);
        }

        if rest.starts_with("<!--") {
            self.pos = self.skip_past(start + 4, "-->");
            return Ok(None);
        }
        if rest.starts_with("<![CDATA[") {
            self.pos = self.skip_past(start + 9, "]]>");
            return Ok(None);
        }
        if rest.starts_with("<!") || rest.starts_with("<?") {
            self.pos = self.skip_past_gt(start + 2);
            return Ok(None);
        }
        if rest.starts_with("</") {
            return self.scan_end_tag(start);
        }

        self.scan_start_tag(start).map(Some)
    }

    fn scan_text(&mut self, start: usize) -> Result<TagEvent, ScanError> {
        let len = self.input.len();
        let mut end = start + 1;
        while end < len && !self.is_markup_start(end) {
            end += 1;
        }
        self.check_nul(start, end)?;
        self.pos = end;
        Ok(TagEvent::Text(decode_references(&self.input[start..end])))
    }

    fn scan_end_tag(&mut self, start: usize) -> Result<Option<TagEvent>, ScanError> {
        let bytes = self.bytes();
        let name_start = start + 2;
        let mut j = name_start;
        while j < bytes.len() && is_tag_name_byte(bytes[j]) {
            j += 1;
        }
        let name = self.input[name_start..j].to_ascii_lowercase();

        self.pos = self.skip_past_gt(j);
        self.check_nul(start, self.pos)?;

        // `</>` and `</ x>` carry no name; treat them like comments.
        if name.is_empty() {
            return Ok(None);
        }
        Ok(Some(TagEvent::EndTag(name)))
    }

    fn scan_start_tag(&mut self, start: usize) -> Result<TagEvent, ScanError> {
        let input = self.input;
        let bytes = self.bytes();
        let len = bytes.len();

        let name_start = start + 1;
        let mut k = name_start;
        while k < len && is_tag_name_byte(bytes[k]) {
            k += 1;
        }
        let name = input[name_start..k].to_ascii_lowercase();

        let skip_whitespace = |k: &mut usize| {
            while *k < len && bytes[*k].is_ascii_whitespace() {
                *k += 1;
            }
        };

        let mut attributes = Vec::new();
        let mut self_closing = false;

        loop {
            skip_whitespace(&mut k);
            if k >= len {
                break;
            }
            if bytes[k] == b'>' {
                k += 1;
                break;
            }
            if bytes[k] == b'/' {
                if bytes.get(k + 1) == Some(&b'>') {
                    self_closing = true;
                    k += 2;
                    break;
                }
                k += 1;
                continue;
            }

            let attr_start = k;
            while k < len && !is_attr_name_end(bytes[k]) {
                k += 1;
            }
            if attr_start == k {
                // stray `=` or quote where a name should be
                k += 1;
                continue;
            }
            let attr_name = input[attr_start..k].to_ascii_lowercase();

            skip_whitespace(&mut k);
            let mut value = String::new();
            if k < len && bytes[k] == b'=' {
                k += 1;
                skip_whitespace(&mut k);
                if k < len && (bytes[k] == b'"' || bytes[k] == b'\'') {
                    let quote = bytes[k];
                    k += 1;
                    let value_start = k;
                    while k < len && bytes[k] != quote {
                        k += 1;
                    }
                    value = decode_references(&input[value_start..k]);
                    if k < len {
                        k += 1;
                    }
                } else {
                    let value_start = k;
                    while k < len && !bytes[k].is_ascii_whitespace() && bytes[k] != b'>' {
                        if bytes[k] == b'/' && bytes.get(k + 1) == Some(&b'>') {
                            break;
                        }
                        k += 1;
                    }
                    value = decode_references(&input[value_start..k]);
                }
            }

            attributes.push(Attribute { name: attr_name, value });
        }

        self.check_nul(start, k)?;
        self.pos = k;

        if is_void_element(&name) {
            self_closing = true;
        }
        if !self_closing && let Some((tag, decode)) = raw_text_element(&name) {
            self.mode = Mode::RawText { tag, decode };
        }

        Ok(TagEvent::StartTag { name, attributes, self_closing })
    }
}

impl Iterator for TagScanner<'_> {
    type Item = Result<TagEvent, ScanError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }

        match self.step() {
            Ok(Some(_)) if self.emitted >= MAX_EVENTS => {
                self.finished = true;
                Some(Err(ScanError::EventLimit(MAX_EVENTS)))
            }
            Ok(Some(event)) => {
                self.emitted += 1;
                Some(Ok(event))
            }
            Ok(None) => {
                self.finished = true;
                None
            }
            Err(e) => {
                self.finished = true;
                Some(Err(e))
            }
        }
    }
}

impl std::iter::FusedIterator for TagScanner<'_> {}
