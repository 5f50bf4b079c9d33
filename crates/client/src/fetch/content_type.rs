//! `Content-Type` parsing and charset resolution.
//!
//! The header decides whether a response is worth scanning at all and, via its
//! `charset` parameter, how to decode the body. Labels are recorded verbatim;
//! whether `encoding_rs` knows them is only checked when a decoder is needed.

use std::sync::LazyLock;

use encoding_rs::{Encoding, UTF_8};
use regex::Regex;
use reqwest::header::HeaderValue;

#[allow(clippy::expect_used)]
static CHARSET_PARAM_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"(?i)charset\s*=\s*["']?([-_.:a-z0-9]+)"#).expect("valid regex"));

/// Match `<meta charset="...">`
#[allow(clippy::expect_used)]
static META_CHARSET_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"(?i)<meta[^>]+charset\s*=\s*["']?([-_.:a-z0-9]+)"#).expect("valid regex"));

/// Bytes inspected when sniffing a `<meta>` charset declaration.
const SNIFF_LIMIT: usize = 1024;

/// Error type for `Content-Type` values that cannot be parsed.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ContentTypeError {
    #[error("empty Content-Type value")]
    Empty,

    #[error("Content-Type value is not visible ASCII")]
    Opaque,
}

/// A parsed `Content-Type` header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentType {
    mime_type: String,
    charset: Option<String>,
}

impl ContentType {
    /// Parse a raw header value.
    ///
    /// The MIME type is everything before the first `;`, trimmed and lowercased.
    /// A `charset=` parameter is only looked for when parameters are present.
    pub fn parse(value: &str) -> Result<Self, ContentTypeError> {
        let (mime, params) = match value.split_once(';') {
            Some((mime, params)) => (mime, Some(params)),
            None => (value, None),
        };

        let mime_type = mime.trim().to_ascii_lowercase();
        if mime_type.is_empty() {
            return Err(ContentTypeError::Empty);
        }

        let charset = params
            .and_then(|p| CHARSET_PARAM_RE.captures(p))
            .and_then(|c| c.get(1))
            .map(|m| m.as_str().to_string());

        Ok(Self { mime_type, charset })
    }

    /// Resolve the `Content-Type` of a response.
    ///
    /// `Ok(None)` means the response carried no such header, which callers treat
    /// as "no preview" rather than as a failure.
    pub fn from_header(value: Option<&HeaderValue>) -> Result<Option<Self>, ContentTypeError> {
        match value {
            None => Ok(None),
            Some(v) => {
                let s = v.to_str().map_err(|_| ContentTypeError::Opaque)?;
                Self::parse(s).map(Some)
            }
        }
    }

    pub fn mime_type(&self) -> &str {
        &self.mime_type
    }

    /// The declared charset label, as written by the server.
    pub fn charset(&self) -> Option<&str> {
        self.charset.as_deref()
    }

    pub fn is_html(&self) -> bool {
        self.mime_type == "text/html"
    }

    /// Decoder for the declared charset, if `encoding_rs` supports the label.
    pub fn encoding(&self) -> Option<&'static Encoding> {
        self.charset.as_deref().and_then(|label| Encoding::for_label(label.as_bytes()))
    }
}

/// Pick the decoder for an HTML body.
///
/// Order: the header charset, then a `<meta>` declaration in the first bytes of
/// the body, then UTF-8. Unsupported labels fall through to the next source.
pub fn resolve_encoding(content_type: &ContentType, body: &[u8]) -> &'static Encoding {
    if let Some(encoding) = content_type.encoding() {
        return encoding;
    }

    if let Some(label) = content_type.charset() {
        tracing::debug!(charset = label, "unsupported charset in Content-Type, sniffing body");
    }

    sniff_meta_charset(body).unwrap_or(UTF_8)
}

/// Look for `<meta charset>` or an `http-equiv` Content-Type declaration.
pub fn sniff_meta_charset(body: &[u8]) -> Option<&'static Encoding> {
    let head = &body[..body.len().min(SNIFF_LIMIT)];
    let head = String::from_utf8_lossy(head);

    META_CHARSET_RE
        .captures(&head)
        .and_then(|c| c.get(1))
        .and_then(|m| Encoding::for_label(m.as_str().as_bytes()))
}

/// Decode body bytes, honouring a byte-order mark over `encoding`.
///
/// Malformed sequences become U+FFFD; decoding never fails.
pub fn decode(body: &[u8], encoding: &'static Encoding) -> String {
    let (text, used, had_errors) = encoding.decode(body);
    if had_errors {
        tracing::debug!(encoding = used.name(), "replaced malformed sequences while decoding");
    }
    text.into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_plain() {
        let ct = ContentType::parse("text/html").unwrap();
        assert_eq!(ct.mime_type(), "text/html");
        assert_eq!(ct.charset(), None);
        assert!(ct.is_html());
    }

    #[test]
    fn test_parse_with_charset() {
        let ct = ContentType::parse("text/html; charset=ISO-8859-1").unwrap();
        assert_eq!(ct.mime_type(), "text/html");
        assert_eq!(ct.charset(), Some("ISO-8859-1"));
    }

    #[test]
    fn test_parse_charset_case_insensitive() {
        let ct = ContentType::parse("text/html;CHARSET=utf-8").unwrap();
        assert_eq!(ct.charset(), Some("utf-8"));
    }

    #[test]
    fn test_parse_quoted_charset() {
        let ct = ContentType::parse(r#"text/html; charset="Shift_JIS""#).unwrap();
        assert_eq!(ct.charset(), Some("Shift_JIS"));
    }

    #[test]
    fn test_parse_records_unknown_charset() {
        let ct = ContentType::parse("text/html; charset=x-made-up").unwrap();
        assert_eq!(ct.charset(), Some("x-made-up"));
        assert!(ct.encoding().is_none());
    }

    #[test]
    fn test_parse_normalizes_mime() {
        let ct = ContentType::parse("  Text/HTML ; charset=utf-8").unwrap();
        assert_eq!(ct.mime_type(), "text/html");
        assert!(ct.is_html());
    }

    #[test]
    fn test_parse_non_html() {
        let ct = ContentType::parse("application/json").unwrap();
        assert!(!ct.is_html());

        let ct = ContentType::parse("application/xhtml+xml").unwrap();
        assert!(!ct.is_html());
    }

    #[test]
    fn test_parse_empty_is_error() {
        assert!(matches!(ContentType::parse(""), Err(ContentTypeError::Empty)));
        assert!(matches!(ContentType::parse("   ; charset=utf-8"), Err(ContentTypeError::Empty)));
    }

    #[test]
    fn test_from_header_absent() {
        assert_eq!(ContentType::from_header(None).unwrap(), None);
    }

    #[test]
    fn test_from_header_opaque() {
        let value = HeaderValue::from_bytes(b"text/html; charset=\xff").unwrap();
        assert!(matches!(ContentType::from_header(Some(&value)), Err(ContentTypeError::Opaque)));
    }

    #[test]
    fn test_from_header_present() {
        let value = HeaderValue::from_static("text/html; charset=utf-8");
        let ct = ContentType::from_header(Some(&value)).unwrap().unwrap();
        assert!(ct.is_html());
        assert_eq!(ct.encoding(), Some(UTF_8));
    }

    #[test]
    fn test_resolve_encoding_prefers_header() {
        let ct = ContentType::parse("text/html; charset=windows-1252").unwrap();
        let body = br#"<head><meta charset="shift_jis"></head>"#;
        assert_eq!(resolve_encoding(&ct, body).name(), "windows-1252");
    }

    #[test]
    fn test_resolve_encoding_sniffs_meta() {
        let ct = ContentType::parse("text/html").unwrap();
        let body = br#"<html><head><meta charset="ISO-8859-1"><title>x</title></head>"#;
        // encoding_rs maps ISO-8859-1 to windows-1252 per WHATWG
        assert_eq!(resolve_encoding(&ct, body).name(), "windows-1252");
    }

    #[test]
    fn test_resolve_encoding_sniffs_http_equiv() {
        let ct = ContentType::parse("text/html; charset=bogus").unwrap();
        let body = br#"<head><meta http-equiv="Content-Type" content="text/html; charset=Shift_JIS"></head>"#;
        assert_eq!(resolve_encoding(&ct, body).name(), "Shift_JIS");
    }

    #[test]
    fn test_resolve_encoding_defaults_to_utf8() {
        let ct = ContentType::parse("text/html").unwrap();
        assert_eq!(resolve_encoding(&ct, b"<head><title>x</title></head>"), UTF_8);
    }

    #[test]
    fn test_decode_latin1() {
        let encoding = Encoding::for_label(b"latin1").unwrap();
        assert_eq!(decode(b"caf\xe9", encoding), "café");
    }

    #[test]
    fn test_decode_bom_overrides_label() {
        let encoding = Encoding::for_label(b"latin1").unwrap();
        assert_eq!(decode(b"\xef\xbb\xbfcaf\xc3\xa9", encoding), "café");
    }

    #[test]
    fn test_decode_invalid_utf8_is_lossy() {
        assert_eq!(decode(b"ok\xff", UTF_8), "ok\u{FFFD}");
    }
}
