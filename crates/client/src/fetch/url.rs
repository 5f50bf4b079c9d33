//! URL canonicalization, root addresses and domain list matching.

/// Error type for URL canonicalization failures.
#[derive(Debug, Clone, thiserror::Error)]
pub enum UrlError {
    #[error("empty URL")]
    Empty,

    #[error("unsupported scheme: {0}")]
    UnsupportedScheme(String),

    #[error("URL has no host")]
    MissingHost,

    #[error("invalid URL: {0}")]
    InvalidUrl(String),
}

/// Canonicalize a user-supplied URL string before fetching it.
///
/// Normalization steps:
/// 1. Trim leading/trailing whitespace
/// 2. Default scheme to https:// if missing
/// 3. Lowercase the host
/// 4. Remove fragment (#...)
/// 5. Keep query string intact (do not reorder)
pub fn canonicalize(input: &str) -> Result<url::Url, UrlError> {
    let trimmed = input.trim();

    if trimmed.is_empty() {
        return Err(UrlError::Empty);
    }

    let url_str = if trimmed.contains("://") { trimmed.to_string() } else { format!("https://{trimmed}") };

    let mut parsed = url::Url::parse(&url_str).map_err(|e| UrlError::InvalidUrl(e.to_string()))?;

    match parsed.scheme() {
        "http" | "https" => {}
        scheme => return Err(UrlError::UnsupportedScheme(scheme.to_string())),
    }

    let host = parsed.host_str().ok_or(UrlError::MissingHost)?.to_lowercase();
    parsed
        .set_host(Some(&host))
        .map_err(|e| UrlError::InvalidUrl(e.to_string()))?;

    parsed.set_fragment(None);

    Ok(parsed)
}

/// The root address shown next to a preview: the URL without its
/// `http://`/`https://` prefix, cut at the first `/`.
///
/// ```
/// use linkpeek_client::root_address;
///
/// assert_eq!(root_address("https://example.com/a/b?c"), "example.com");
/// assert_eq!(root_address("example.com:8080/x"), "example.com:8080");
/// ```
pub fn root_address(url: &str) -> String {
    let rest = url
        .strip_prefix("http://")
        .or_else(|| url.strip_prefix("https://"))
        .unwrap_or(url);
    rest.split('/').next().unwrap_or_default().to_string()
}

/// Whether `host` is `domain` or a subdomain of it (ASCII case-insensitive).
pub fn host_matches(host: &str, domain: &str) -> bool {
    let host = host.trim_end_matches('.').to_ascii_lowercase();
    let domain = domain.trim().trim_start_matches('.').trim_end_matches('.').to_ascii_lowercase();
    if domain.is_empty() {
        return false;
    }
    host == domain || host.strip_suffix(&domain).is_some_and(|prefix| prefix.ends_with('.'))
}

/// Apply allow/deny lists to a host. A non-empty allowlist takes precedence.
pub fn is_host_permitted(host: &str, allowlist: &[String], denylist: &[String]) -> bool {
    if !allowlist.is_empty() {
        return allowlist.iter().any(|d| host_matches(host, d));
    }
    !denylist.iter().any(|d| host_matches(host, d))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_canonicalize_basic() {
        let url = canonicalize("https://example.com").unwrap();
        assert_eq!(url.scheme(), "https");
        assert_eq!(url.host_str(), Some("example.com"));
    }

    #[test]
    fn test_canonicalize_default_scheme() {
        let url = canonicalize("example.com").unwrap();
        assert_eq!(url.scheme(), "https");
        assert_eq!(url.host_str(), Some("example.com"));
    }

    #[test]
    fn test_canonicalize_lowercase_host() {
        let url = canonicalize("https://EXAMPLE.COM").unwrap();
        assert_eq!(url.host_str(), Some("example.com"));
    }

    #[test]
    fn test_canonicalize_remove_fragment() {
        let url = canonicalize("https://example.com#section").unwrap();
        assert_eq!(url.fragment(), None);
        assert_eq!(url.path(), "/");
    }

    #[test]
    fn test_canonicalize_preserve_query() {
        let url = canonicalize("https://example.com?a=1&b=2").unwrap();
        assert_eq!(url.query(), Some("a=1&b=2"));
    }

    #[test]
    fn test_canonicalize_trim_whitespace() {
        let url = canonicalize("  https://example.com  ").unwrap();
        assert_eq!(url.as_str(), "https://example.com/");
    }

    #[test]
    fn test_canonicalize_unsupported_scheme() {
        let result = canonicalize("file:///etc/passwd");
        assert!(matches!(result, Err(UrlError::UnsupportedScheme(_))));

        let result = canonicalize("ftp://example.com/file");
        assert!(matches!(result, Err(UrlError::UnsupportedScheme(_))));
    }

    #[test]
    fn test_canonicalize_empty() {
        assert!(matches!(canonicalize(""), Err(UrlError::Empty)));
        assert!(matches!(canonicalize("   "), Err(UrlError::Empty)));
    }

    #[test]
    fn test_canonicalize_http_allowed() {
        let url = canonicalize("http://example.com").unwrap();
        assert_eq!(url.scheme(), "http");
    }

    #[test]
    fn test_root_address_strips_scheme_and_path() {
        assert_eq!(root_address("https://example.com/"), "example.com");
        assert_eq!(root_address("http://news.example.org/2024/story.html"), "news.example.org");
        assert_eq!(root_address("example.com"), "example.com");
    }

    #[test]
    fn test_root_address_keeps_port_and_cuts_only_at_slash() {
        assert_eq!(root_address("https://example.com:8443/x"), "example.com:8443");
        assert_eq!(root_address("https://example.com?q=1"), "example.com?q=1");
    }

    #[test]
    fn test_root_address_only_strips_leading_scheme() {
        assert_eq!(root_address("ftp://example.com/a"), "ftp:");
        assert_eq!(root_address(""), "");
    }

    #[test]
    fn test_host_matches() {
        assert!(host_matches("example.com", "example.com"));
        assert!(host_matches("www.example.com", "example.com"));
        assert!(host_matches("WWW.Example.com", ".example.COM"));
        assert!(!host_matches("notexample.com", "example.com"));
        assert!(!host_matches("example.com", ""));
    }

    #[test]
    fn test_is_host_permitted() {
        let allow = vec!["example.com".to_string()];
        let deny = vec!["evil.test".to_string()];

        assert!(is_host_permitted("a.example.com", &allow, &[]));
        assert!(!is_host_permitted("other.org", &allow, &[]));
        assert!(!is_host_permitted("x.evil.test", &[], &deny));
        assert!(is_host_permitted("other.org", &[], &deny));
        // allowlist wins when both are set
        assert!(is_host_permitted("example.com", &allow, &["example.com".to_string()]));
    }
}
