//! cache_purge tool implementation.
//!
//! Purges cache entries by expiry, domain, or count.

use linkpeek_core::{CacheDb, Error};
use rmcp::{
    ErrorData as McpError,
    model::{CallToolResult, Content},
};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Parameters for the cache_purge tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CachePurgeParams {
    /// Purge entries whose TTL has run out.
    #[serde(default)]
    pub expired: bool,

    /// Purge entries for this domain and its subdomains.
    pub domain: Option<String>,

    /// Keep only the newest N entries (LRU purge).
    pub max_entries: Option<usize>,
}

/// Output from the cache_purge tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CachePurgeOutput {
    /// Number of entries deleted.
    pub deleted: u64,
}

/// Implementation of the cache_purge tool.
pub async fn purge_impl(cache: &CacheDb, params: CachePurgeParams) -> Result<CallToolResult, McpError> {
    if !params.expired && params.domain.is_none() && params.max_entries.is_none() {
        return Err(
            Error::InvalidInput("At least one of expired, domain, or max_entries must be specified".to_string()).into(),
        );
    }

    let mut deleted_total = 0u64;

    if params.expired {
        deleted_total += cache.purge_expired_previews().await?;
    }

    if let Some(domain) = params.domain {
        if domain.trim().is_empty() {
            return Err(Error::InvalidInput("domain cannot be empty".to_string()).into());
        }
        deleted_total += cache.purge_previews_by_domain(&domain).await?;
    }

    if let Some(max_entries) = params.max_entries {
        deleted_total += cache.purge_lru_previews(max_entries).await?;
    }

    tracing::debug!(deleted = deleted_total, "purged preview cache");

    let output = CachePurgeOutput { deleted: deleted_total };
    let json = serde_json::to_string_pretty(&output)
        .map_err(|e| Error::InvalidInput(format!("Failed to serialize output: {e}")))?;

    Ok(CallToolResult::success(vec![Content::text(json)]))
}
