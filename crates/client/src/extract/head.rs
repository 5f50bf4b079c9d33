//! Bounded reading of the `<head>` region.
//!
//! Only the start of a document matters for previews, so reading stops at the
//! first line that closes the head. Bodies are never buffered.

use std::io::BufRead;
use std::sync::LazyLock;

use regex::Regex;

const HEAD_CLOSE: &[u8] = b"</head>";

/// The `<head ...>` element through its closing tag.
#[allow(clippy::expect_used)]
static HEAD_ELEMENT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)<head(?:\s[^>]*)?>.*</head\s*>").expect("valid regex"));

/// Text read from the start of a document through the first `</head>`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HeadRegion {
    text: String,
    closed: bool,
}

impl HeadRegion {
    /// Read lines from `reader` until one contains `</head>` or the stream ends.
    ///
    /// A line ends at `\n`, `\r` or `\r\n`, and terminators are kept. Bytes
    /// that are not valid UTF-8 are replaced with U+FFFD rather than failing
    /// the read.
    pub fn read<R: BufRead>(mut reader: R) -> std::io::Result<Self> {
        let mut region = Self::default();
        let mut line = Vec::new();

        loop {
            line.clear();
            if read_line(&mut reader, &mut line)? == 0 {
                break;
            }

            region.text.push_str(&String::from_utf8_lossy(&line));

            if contains_head_close(&line) {
                region.closed = true;
                break;
            }
        }

        Ok(region)
    }

    pub fn as_str(&self) -> &str {
        &self.text
    }

    pub fn len(&self) -> usize {
        self.text.len()
    }

    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }

    /// Whether reading stopped at `</head>` rather than at end of stream.
    pub fn is_closed(&self) -> bool {
        self.closed
    }
}

impl From<String> for HeadRegion {
    fn from(text: String) -> Self {
        let closed = contains_head_close(text.as_bytes());
        Self { text, closed }
    }
}

/// Append one line to `line`, terminator included, and return its length.
///
/// Consumes nothing past the terminator; after a `\r` the next byte is only
/// taken when it is the `\n` of a CRLF pair.
fn read_line<R: BufRead>(reader: &mut R, line: &mut Vec<u8>) -> std::io::Result<usize> {
    let start = line.len();

    loop {
        let (used, terminator) = {
            let available = reader.fill_buf()?;
            if available.is_empty() {
                return Ok(line.len() - start);
            }
            match available.iter().position(|&b| b == b'\n' || b == b'\r') {
                Some(i) => {
                    line.extend_from_slice(&available[..=i]);
                    (i + 1, Some(available[i]))
                }
                None => {
                    line.extend_from_slice(available);
                    (available.len(), None)
                }
            }
        };
        reader.consume(used);

        match terminator {
            Some(b'\r') => {
                if reader.fill_buf()?.first() == Some(&b'\n') {
                    reader.consume(1);
                    line.push(b'\n');
                }
                return Ok(line.len() - start);
            }
            Some(_) => return Ok(line.len() - start),
            None => {}
        }
    }
}

/// ASCII case-insensitive search for `</head>`.
pub(crate) fn contains_head_close(haystack: &[u8]) -> bool {
    haystack
        .windows(HEAD_CLOSE.len())
        .any(|w| w.eq_ignore_ascii_case(HEAD_CLOSE))
}

/// Isolate the `<head>` element in `text`.
///
/// Returns `None` when there is no complete `<head>...</head>` pair, e.g. for
/// documents truncated before their head closes.
pub fn head_element(text: &str) -> Option<&str> {
    HEAD_ELEMENT_RE.find(text).map(|m| m.as_str())
}
