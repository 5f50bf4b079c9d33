//! HTTP transport for link previews.
//!
//! ### URL Canonicalization
//! - Trim whitespace, ensure scheme (default: `https`)
//! - Lowercase host, remove fragments
//! - Preserve query string
//!
//! ### Safety Gates
//! - Allow/deny domain lists (allowlist wins when both are set).
//! - Deny private ranges (RFC1918, link-local, localhost, CGNAT, etc.) by
//!   resolving DNS and validating all A/AAAA answers before the request.
//! - Redirects are re-checked: literal private IPs and blocked domains stop them.
//!
//! ### Head-only Reads
//! - Only `text/html` responses with a status in `[200, 400)` are read.
//! - Body chunks are pulled until `</head>` appears or `max_head_bytes` is hit;
//!   the rest of the body is never downloaded.

pub mod content_type;
pub mod ssrf;
pub mod url;

use bytes::Bytes;
use encoding_rs::Encoding;
use reqwest::redirect::{Attempt, Policy};
use reqwest::{Client, StatusCode, Url, header};
use std::time::{Duration, Instant};

pub use content_type::{ContentType, ContentTypeError, decode, resolve_encoding, sniff_meta_charset};
pub use ssrf::{SsrfError, validate_ip};
pub use url::{UrlError, canonicalize, host_matches, is_host_permitted, root_address};

use crate::extract::{self, head::contains_head_close};
use linkpeek_core::{AppConfig, Error, LinkPreview};

const ACCEPT_HTML: &str = "text/html,application/xhtml+xml;q=0.9,*/*;q=0.1";

/// Bytes of overlap kept between chunk searches so a split `</head>` is found.
const HEAD_CLOSE_OVERLAP: usize = "</head>".len() - 1;

/// Configuration for the fetch client.
#[derive(Debug, Clone)]
pub struct FetchConfig {
    /// User agent string (default: desktop Chrome)
    pub user_agent: String,

    /// Maximum head bytes read from a body (default: 1MiB)
    pub max_head_bytes: usize,

    /// Request timeout (default: 20s)
    pub timeout: Duration,

    /// Maximum number of redirects to follow (default: 5)
    pub max_redirects: usize,

    /// Refuse private and reserved addresses (default: true)
    pub block_private_addresses: bool,

    pub allowlist_domains: Vec<String>,
    pub denylist_domains: Vec<String>,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self::from(&AppConfig::default())
    }
}

impl From<&AppConfig> for FetchConfig {
    fn from(config: &AppConfig) -> Self {
        Self {
            user_agent: config.user_agent.clone(),
            max_head_bytes: config.max_head_bytes,
            timeout: config.timeout(),
            max_redirects: config.max_redirects,
            block_private_addresses: config.block_private_addresses,
            allowlist_domains: config.allowlist_domains.clone(),
            denylist_domains: config.denylist_domains.clone(),
        }
    }
}

/// Why a redirect was refused.
#[derive(Debug, thiserror::Error)]
enum RedirectRejected {
    #[error("redirect blocked: {0}")]
    Ssrf(#[from] SsrfError),

    #[error("redirect to blocked domain: {0}")]
    Domain(String),

    #[error("too many redirects (max {0})")]
    TooMany(usize),
}

fn redirect_policy(config: &FetchConfig) -> Policy {
    let max = config.max_redirects;
    let block_private = config.block_private_addresses;
    let allow = config.allowlist_domains.clone();
    let deny = config.denylist_domains.clone();

    Policy::custom(move |attempt: Attempt| {
        if attempt.previous().len() > max {
            return attempt.error(RedirectRejected::TooMany(max));
        }

        let host = attempt.url().host_str().unwrap_or_default().to_string();
        if !is_host_permitted(&host, &allow, &deny) {
            return attempt.error(RedirectRejected::Domain(host));
        }

        if block_private
            && let Some(ip) = ssrf::literal_ip(attempt.url())
            && let Err(e) = validate_ip(ip)
        {
            return attempt.error(RedirectRejected::from(e));
        }

        attempt.follow()
    })
}

fn find_redirect_rejection(err: &reqwest::Error) -> Option<&RedirectRejected> {
    let mut source = std::error::Error::source(err);
    while let Some(e) = source {
        if let Some(rejected) = e.downcast_ref::<RedirectRejected>() {
            return Some(rejected);
        }
        source = e.source();
    }
    None
}

fn map_send_error(err: reqwest::Error) -> Error {
    if err.is_timeout() {
        return Error::FetchTimeout(err.to_string());
    }
    match find_redirect_rejection(&err) {
        Some(RedirectRejected::Ssrf(e)) => Error::SsrfBlocked(e.to_string()),
        Some(RedirectRejected::Domain(host)) => Error::DomainBlocked(host.clone()),
        Some(e @ RedirectRejected::TooMany(_)) => Error::HttpError(e.to_string()),
        None => Error::HttpError(format!("network error: {err}")),
    }
}

fn map_body_error(err: reqwest::Error) -> Error {
    if err.is_timeout() {
        Error::FetchTimeout(err.to_string())
    } else {
        Error::Transport(format!("failed to read response body: {err}"))
    }
}

/// The start of an HTML response, up to its `</head>`.
#[derive(Debug, Clone)]
pub struct HeadResponse {
    /// The canonical URL requested
    pub url: Url,
    /// The final URL after redirects
    pub final_url: Url,
    pub status: StatusCode,
    pub content_type: ContentType,
    /// Decoder chosen from the header, a `<meta>` charset or the default
    pub encoding: &'static Encoding,
    /// Raw body bytes through `</head>`, at most `max_head_bytes`
    pub bytes: Bytes,
    /// Whether the byte limit was hit before `</head>`
    pub truncated: bool,
    /// Time taken to fetch in milliseconds
    pub fetch_ms: u64,
}

impl HeadResponse {
    /// Body bytes decoded to text.
    pub fn text(&self) -> String {
        decode(&self.bytes, self.encoding)
    }
}

/// A fetched page and the preview extracted from it.
#[derive(Debug, Clone)]
pub struct PreviewResponse {
    pub url: Url,
    pub final_url: Url,
    pub status: u16,
    pub content_type: String,
    pub fetch_ms: u64,
    pub truncated: bool,
    pub preview: LinkPreview,
}

/// HTTP fetch client with safety checks.
pub struct FetchClient {
    http: Client,
    config: FetchConfig,
}

impl FetchClient {
    /// Create a new fetch client with the given configuration.
    pub fn new(config: FetchConfig) -> Result<Self, Error> {
        let http = Client::builder()
            .user_agent(&config.user_agent)
            .timeout(config.timeout)
            .redirect(redirect_policy(&config))
            .use_rustls_tls()
            .gzip(true)
            .brotli(true)
            .deflate(true)
            .build()
            .map_err(|e| Error::HttpError(format!("failed to build HTTP client: {e}")))?;

        Ok(Self { http, config })
    }

    async fn check_host(&self, url: &Url) -> Result<(), Error> {
        let host = url.host_str().unwrap_or_default();
        if !is_host_permitted(host, &self.config.allowlist_domains, &self.config.denylist_domains) {
            return Err(Error::DomainBlocked(host.to_string()));
        }

        if self.config.block_private_addresses {
            ssrf::validate_host(url).await.map_err(|e| match e {
                SsrfError::BlockedIp(_) => Error::SsrfBlocked(e.to_string()),
                SsrfError::DnsError(_) | SsrfError::NoAddresses(_) => Error::HttpError(e.to_string()),
            })?;
        }

        Ok(())
    }

    /// Fetch the head of an HTML document.
    ///
    /// Returns `Ok(None)` when there is nothing to preview: a status outside
    /// `[200, 400)`, no `Content-Type` header, or a type other than `text/html`.
    pub async fn fetch_head(&self, url_str: &str) -> Result<Option<HeadResponse>, Error> {
        let start = Instant::now();
        let url = canonicalize(url_str).map_err(|e| Error::InvalidUrl(e.to_string()))?;

        self.check_host(&url).await?;

        let mut response = self
            .http
            .get(url.as_str())
            .header(header::ACCEPT, ACCEPT_HTML)
            .send()
            .await
            .map_err(map_send_error)?;

        let status = response.status();
        if !(200..400).contains(&status.as_u16()) {
            tracing::debug!(%url, status = status.as_u16(), "status outside preview range");
            return Ok(None);
        }

        let content_type = match ContentType::from_header(response.headers().get(header::CONTENT_TYPE)) {
            Ok(Some(ct)) if ct.is_html() => ct,
            Ok(Some(ct)) => {
                tracing::debug!(%url, mime = ct.mime_type(), "skipping non-HTML response");
                return Ok(None);
            }
            Ok(None) => {
                tracing::debug!(%url, "skipping response without Content-Type");
                return Ok(None);
            }
            Err(e) => return Err(Error::HttpError(format!("malformed Content-Type header: {e}"))),
        };

        let final_url = response.url().clone();
        let max = self.config.max_head_bytes;
        let mut buf = Vec::with_capacity(max.min(16 * 1024));
        let mut truncated = false;

        while let Some(chunk) = response.chunk().await.map_err(map_body_error)? {
            let room = max - buf.len();
            if chunk.len() > room {
                buf.extend_from_slice(&chunk[..room]);
            } else {
                buf.extend_from_slice(&chunk);
            }

            let search_from = buf.len().saturating_sub(chunk.len().min(room) + HEAD_CLOSE_OVERLAP);
            if contains_head_close(&buf[search_from..]) {
                break;
            }
            if buf.len() >= max {
                truncated = true;
                break;
            }
        }

        let encoding = resolve_encoding(&content_type, &buf);
        let fetch_ms = start.elapsed().as_millis() as u64;

        tracing::debug!(
            %url,
            %final_url,
            fetch_ms,
            bytes = buf.len(),
            truncated,
            encoding = encoding.name(),
            "fetched head"
        );

        Ok(Some(HeadResponse {
            url,
            final_url,
            status,
            content_type,
            encoding,
            bytes: Bytes::from(buf),
            truncated,
            fetch_ms,
        }))
    }

    /// Fetch a URL and extract its link preview.
    pub async fn preview(&self, url_str: &str) -> Result<Option<PreviewResponse>, Error> {
        let Some(head) = self.fetch_head(url_str).await? else {
            return Ok(None);
        };

        let root = root_address(head.url.as_str());
        let text = head.text();
        let preview = extract::extract(text.as_bytes(), &root)?;

        Ok(Some(PreviewResponse {
            url: head.url,
            final_url: head.final_url,
            status: head.status.as_u16(),
            content_type: head.content_type.mime_type().to_string(),
            fetch_ms: head.fetch_ms,
            truncated: head.truncated,
            preview,
        }))
    }

    /// Get reference to the configuration.
    pub fn config(&self) -> &FetchConfig {
        &self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{header as header_is, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const HTML_TYPE: &str = "text/html; charset=utf-8";

    fn local_config() -> FetchConfig {
        FetchConfig { block_private_addresses: false, ..FetchConfig::default() }
    }

    fn client(config: FetchConfig) -> FetchClient {
        FetchClient::new(config).unwrap()
    }

    async fn serve(route: &str, template: ResponseTemplate) -> MockServer {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(route))
            .respond_with(template)
            .mount(&server)
            .await;
        server
    }

    #[test]
    fn test_fetch_config_default() {
        let config = FetchConfig::default();
        assert_eq!(config.user_agent, linkpeek_core::config::DEFAULT_USER_AGENT);
        assert_eq!(config.max_head_bytes, 1024 * 1024);
        assert_eq!(config.timeout, Duration::from_millis(20000));
        assert_eq!(config.max_redirects, 5);
        assert!(config.block_private_addresses);
    }

    #[test]
    fn test_fetch_config_from_app_config() {
        let app = AppConfig { max_head_bytes: 4096, denylist_domains: vec!["evil.test".into()], ..AppConfig::default() };
        let config = FetchConfig::from(&app);
        assert_eq!(config.max_head_bytes, 4096);
        assert_eq!(config.denylist_domains, vec!["evil.test".to_string()]);
    }

    #[tokio::test]
    async fn test_fetch_client_new() {
        assert!(FetchClient::new(FetchConfig::default()).is_ok());
    }

    #[tokio::test]
    async fn test_preview_end_to_end() {
        let html = r#"<html><head><title>Example</title><meta property="og:image" content="https://ex.com/a.png"></head><body>x</body></html>"#;
        let server = serve("/", ResponseTemplate::new(200).set_body_raw(html, HTML_TYPE)).await;

        let result = client(local_config()).preview(&server.uri()).await.unwrap().unwrap();
        let root = root_address(&server.uri());

        assert_eq!(result.status, 200);
        assert_eq!(result.content_type, "text/html");
        assert_eq!(result.preview.title(), Some("Example"));
        assert_eq!(result.preview.image_url(), Some("https://ex.com/a.png"));
        assert_eq!(result.preview.root_address(), root);
    }

    #[tokio::test]
    async fn test_sends_configured_user_agent() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(header_is("user-agent", "linkpeek-test/1.0"))
            .respond_with(ResponseTemplate::new(200).set_body_raw("<head><title>UA</title></head>", HTML_TYPE))
            .mount(&server)
            .await;

        let config = FetchConfig { user_agent: "linkpeek-test/1.0".into(), ..local_config() };
        let result = client(config).preview(&server.uri()).await.unwrap().unwrap();
        assert_eq!(result.preview.title(), Some("UA"));
    }

    #[tokio::test]
    async fn test_non_html_is_no_preview() {
        let server = serve("/", ResponseTemplate::new(200).set_body_raw(r#"{"a":1}"#, "application/json")).await;
        let result = client(local_config()).fetch_head(&server.uri()).await.unwrap();
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn test_missing_content_type_is_no_preview() {
        let server = serve("/", ResponseTemplate::new(200).set_body_bytes(b"<head></head>".to_vec())).await;
        let result = client(local_config()).fetch_head(&server.uri()).await.unwrap();
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn test_error_status_is_no_preview() {
        let server = serve("/", ResponseTemplate::new(404).set_body_raw("<head><title>404</title></head>", HTML_TYPE)).await;
        let result = client(local_config()).preview(&server.uri()).await.unwrap();
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn test_follows_redirects() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/old"))
            .respond_with(ResponseTemplate::new(301).insert_header("location", "/new"))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/new"))
            .respond_with(ResponseTemplate::new(200).set_body_raw("<head><title>Moved</title></head>", HTML_TYPE))
            .mount(&server)
            .await;

        let result = client(local_config())
            .preview(&format!("{}/old", server.uri()))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(result.final_url.path(), "/new");
        assert_eq!(result.preview.title(), Some("Moved"));
    }

    #[tokio::test]
    async fn test_redirect_limit() {
        let server = serve("/loop", ResponseTemplate::new(302).insert_header("location", "/loop")).await;
        let config = FetchConfig { max_redirects: 2, ..local_config() };
        let result = client(config).fetch_head(&format!("{}/loop", server.uri())).await;
        assert!(matches!(result, Err(Error::HttpError(_))));
    }

    #[tokio::test]
    async fn test_stops_at_head_close() {
        let mut body = String::from("<html><head><title>Short</title></head><body>");
        body.push_str(&"x".repeat(256 * 1024));
        let server = serve("/", ResponseTemplate::new(200).set_body_raw(body, HTML_TYPE)).await;

        let head = client(local_config()).fetch_head(&server.uri()).await.unwrap().unwrap();
        assert!(!head.truncated);
        assert!(head.bytes.len() < 256 * 1024);
        assert!(head.text().contains("</head>"));
    }

    #[tokio::test]
    async fn test_truncates_at_max_head_bytes() {
        let body = format!("<html><head><title>{}</title></head>", "t".repeat(1000));
        let server = serve("/", ResponseTemplate::new(200).set_body_raw(body, HTML_TYPE)).await;

        let config = FetchConfig { max_head_bytes: 64, ..local_config() };
        let fetcher = client(config);
        let head = fetcher.fetch_head(&server.uri()).await.unwrap().unwrap();
        assert!(head.truncated);
        assert_eq!(head.bytes.len(), 64);

        let result = fetcher.preview(&server.uri()).await.unwrap().unwrap();
        assert!(result.preview.is_empty());
    }

    #[tokio::test]
    async fn test_decodes_declared_charset() {
        let body: &[u8] = b"<head><title>Caf\xe9</title></head>";
        let server = serve("/", ResponseTemplate::new(200).set_body_raw(body, "text/html; charset=windows-1252")).await;

        let result = client(local_config()).preview(&server.uri()).await.unwrap().unwrap();
        assert_eq!(result.preview.title(), Some("Café"));
    }

    #[tokio::test]
    async fn test_decodes_meta_charset() {
        let body: &[u8] = b"<head><meta charset=\"iso-8859-1\"><title>Na\xefve</title></head>";
        let server = serve("/", ResponseTemplate::new(200).set_body_raw(body, "text/html")).await;

        let result = client(local_config()).preview(&server.uri()).await.unwrap().unwrap();
        assert_eq!(result.preview.title(), Some("Naïve"));
    }

    #[tokio::test]
    async fn test_timeout() {
        let template = ResponseTemplate::new(200)
            .set_body_raw("<head></head>", HTML_TYPE)
            .set_delay(Duration::from_millis(500));
        let server = serve("/", template).await;

        let config = FetchConfig { timeout: Duration::from_millis(100), ..local_config() };
        let result = client(config).fetch_head(&server.uri()).await;
        assert!(matches!(result, Err(Error::FetchTimeout(_))));
    }

    #[tokio::test]
    async fn test_blocks_private_address() {
        let result = client(FetchConfig::default()).fetch_head("http://127.0.0.1:9/").await;
        assert!(matches!(result, Err(Error::SsrfBlocked(_))));
    }

    #[tokio::test]
    async fn test_denylist_blocks_host() {
        let config = FetchConfig { denylist_domains: vec!["blocked.example".into()], ..local_config() };
        let result = client(config).fetch_head("https://www.blocked.example/page").await;
        assert!(matches!(result, Err(Error::DomainBlocked(_))));
    }

    #[tokio::test]
    async fn test_allowlist_rejects_other_hosts() {
        let server = serve("/", ResponseTemplate::new(200).set_body_raw("<head></head>", HTML_TYPE)).await;
        let config = FetchConfig { allowlist_domains: vec!["example.com".into()], ..local_config() };
        let result = client(config).fetch_head(&server.uri()).await;
        assert!(matches!(result, Err(Error::DomainBlocked(_))));
    }

    #[tokio::test]
    async fn test_redirect_to_private_address_blocked() {
        let server = serve("/", ResponseTemplate::new(302).insert_header("location", "http://10.0.0.1/")).await;

        // The mock itself is on loopback, so only the redirect target is checked here.
        let policy_config = FetchConfig { block_private_addresses: true, ..local_config() };
        let fetcher = FetchClient {
            http: Client::builder().redirect(redirect_policy(&policy_config)).build().unwrap(),
            config: local_config(),
        };

        let result = fetcher.fetch_head(&server.uri()).await;
        assert!(matches!(result, Err(Error::SsrfBlocked(_))));
    }

    #[tokio::test]
    async fn test_invalid_url() {
        let result = client(local_config()).fetch_head("ftp://example.com/").await;
        assert!(matches!(result, Err(Error::InvalidUrl(_))));
    }
}
