//! cache_get tool implementation.
//!
//! Retrieves a cached preview by hash, whether or not it has expired.

use linkpeek_core::{CacheDb, CachedPreview, Error};
use rmcp::{
    ErrorData as McpError,
    model::{CallToolResult, Content},
};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Parameters for the cache_get tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CacheGetParams {
    /// The hash returned by link_preview.
    pub hash: String,
}

/// Output from the cache_get tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CacheGetOutput {
    /// The cached preview and its fetch metadata.
    pub entry: CachedPreview,
}

/// Implementation of the cache_get tool.
pub async fn get_impl(cache: &CacheDb, params: CacheGetParams) -> Result<CallToolResult, McpError> {
    let entry = cache
        .get_preview(&params.hash)
        .await?
        .ok_or_else(|| Error::CacheMiss(params.hash.clone()))?;

    let output = CacheGetOutput { entry };
    let json = serde_json::to_string_pretty(&output)
        .map_err(|e| Error::InvalidInput(format!("Failed to serialize preview: {e}")))?;

    Ok(CallToolResult::success(vec![Content::text(json)]))
}
