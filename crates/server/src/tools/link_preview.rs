//! link_preview tool implementation.
//!
//! Fetches the head of a page and resolves its link preview, answering from the
//! preview cache while an entry is fresh.

use chrono::Utc;
use linkpeek_client::FetchClient;
use linkpeek_client::fetch::canonicalize;
use linkpeek_core::cache::{hash::compute_cache_key, previews::timestamps};
use linkpeek_core::{AppConfig, CacheDb, CachedPreview, Error, LinkPreview};
use rmcp::{ErrorData as McpError, model::*};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Input parameters for link_preview tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct LinkPreviewParams {
    /// The URL to preview.
    pub url: String,

    /// Force a refresh, bypassing the cache.
    #[serde(default)]
    pub force_refresh: bool,

    /// Report no preview when the page has no title.
    /// Defaults to the server's `require_title` setting.
    #[serde(default)]
    pub require_title: Option<bool>,
}

/// Output structure for link_preview tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct LinkPreviewOutput {
    /// The canonical URL requested.
    pub url: String,
    /// The final URL after redirects, when the page was read.
    pub final_url: Option<String>,
    /// Cache key for cache_get.
    pub hash: String,
    /// Whether the preview came from the cache.
    pub cached: bool,
    /// The preview, or null when the page has nothing to show.
    pub preview: Option<LinkPreview>,
}

/// Empty previews are never shown; title-less ones only when titles are optional.
fn visible(preview: LinkPreview, require_title: bool) -> Option<LinkPreview> {
    if preview.is_empty() || (require_title && !preview.has_title()) { None } else { Some(preview) }
}

fn to_result(output: &LinkPreviewOutput) -> Result<CallToolResult, McpError> {
    let json = serde_json::to_string_pretty(output)
        .map_err(|e| Error::InvalidInput(format!("Failed to serialize output: {e}")))?;
    Ok(CallToolResult::success(vec![Content::text(json)]))
}

/// Implementation of the link_preview tool.
pub async fn preview_impl(
    cache: &CacheDb, fetcher: &FetchClient, config: &AppConfig, params: LinkPreviewParams,
) -> Result<CallToolResult, McpError> {
    if params.url.trim().is_empty() {
        return Err(Error::InvalidInput("url cannot be empty".into()).into());
    }

    let url = canonicalize(&params.url).map_err(|e| Error::InvalidUrl(e.to_string()))?;
    let hash = compute_cache_key(url.as_str(), &fetcher.config().user_agent);
    let require_title = params.require_title.unwrap_or(config.require_title);
    let ttl = config.cache_ttl();

    if ttl.is_some()
        && !params.force_refresh
        && let Ok(Some(entry)) = cache.get_fresh_preview(&hash).await
    {
        tracing::debug!(url = %url, "cache hit");

        let output = LinkPreviewOutput {
            url: entry.url,
            final_url: Some(entry.final_url),
            hash,
            cached: true,
            preview: visible(entry.preview, require_title),
        };
        return to_result(&output);
    }

    let Some(response) = fetcher.preview(url.as_str()).await? else {
        let output = LinkPreviewOutput { url: url.to_string(), final_url: None, hash, cached: false, preview: None };
        return to_result(&output);
    };

    if ttl.is_some() {
        let (fetched_at, expires_at) = timestamps(&Utc::now(), ttl);
        let entry = CachedPreview {
            hash: hash.clone(),
            url: response.url.to_string(),
            final_url: response.final_url.to_string(),
            content_type: Some(response.content_type.clone()),
            status_code: Some(i32::from(response.status)),
            fetched_at,
            expires_at,
            fetch_ms: i64::try_from(response.fetch_ms).ok(),
            preview: response.preview.clone(),
        };

        if let Err(e) = cache.upsert_preview(&entry).await {
            tracing::warn!(error = %e, url = %url, "failed to cache preview");
        }
    }

    let output = LinkPreviewOutput {
        url: response.url.to_string(),
        final_url: Some(response.final_url.to_string()),
        hash,
        cached: false,
        preview: visible(response.preview, require_title),
    };
    to_result(&output)
}
