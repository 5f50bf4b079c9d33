//! MCP server handler implementation.
//!
//! This module defines the main server handler that
//! routes tool calls to the appropriate implementations.
use std::sync::Arc;

use crate::tools::{
    LinkPreviewParams,
    cache::{CacheGetParams, CachePurgeParams, get_impl, purge_impl},
    preview_impl,
};

use linkpeek_client::FetchClient;
use linkpeek_core::{AppConfig, CacheDb};
use rmcp::{
    ErrorData as McpError, ServerHandler,
    handler::server::{
        tool::{ToolCallContext, ToolRouter},
        wrapper::Parameters,
    },
    model::{
        CallToolRequestParam, CallToolResult, Implementation, ListToolsResult, PaginatedRequestParam, ProtocolVersion,
        ServerCapabilities, ServerInfo,
    },
    service::{RequestContext, RoleServer},
    tool, tool_router,
};

/// The main MCP server handler for linkpeek.
#[derive(Clone)]
pub struct LinkPeekServer {
    tool_router: ToolRouter<Self>,
    cache: CacheDb,
    fetcher: Arc<FetchClient>,
    config: Arc<AppConfig>,
}

/// Tool router implementation using the #[tool_router] macro.
///
/// This macro generates the routing logic that maps tool names to handler methods.
#[tool_router]
impl LinkPeekServer {
    /// Create a new server handler sharing one cache and one HTTP client.
    pub fn new(cache: CacheDb, fetcher: FetchClient, config: AppConfig) -> Self {
        Self { tool_router: Self::tool_router(), cache, fetcher: Arc::new(fetcher), config: Arc::new(config) }
    }

    #[tool(
        description = "Fetch a URL and return its link preview: title, description, thumbnail image URL and root domain. Only the page's <head> is downloaded. Results are cached; set force_refresh to bypass the cache."
    )]
    async fn link_preview(&self, params: Parameters<LinkPreviewParams>) -> Result<CallToolResult, McpError> {
        preview_impl(&self.cache, &self.fetcher, &self.config, params.0).await
    }

    #[tool(description = "Retrieve a cached link preview by the hash returned from link_preview.")]
    async fn cache_get(&self, params: Parameters<CacheGetParams>) -> Result<CallToolResult, McpError> {
        get_impl(&self.cache, params.0).await
    }

    #[tool(description = "Purge cached previews: expired entries, a domain and its subdomains, or all but the newest N.")]
    async fn cache_purge(&self, params: Parameters<CachePurgeParams>) -> Result<CallToolResult, McpError> {
        purge_impl(&self.cache, params.0).await
    }
}

impl ServerHandler for LinkPeekServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            server_info: Implementation {
                name: "linkpeek".into(),
                version: env!("CARGO_PKG_VERSION").into(),
                ..Default::default()
            },
            protocol_version: ProtocolVersion::LATEST,
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            ..Default::default()
        }
    }

    async fn list_tools(
        &self, _request: Option<PaginatedRequestParam>, _context: RequestContext<RoleServer>,
    ) -> Result<ListToolsResult, rmcp::model::ErrorData> {
        Ok(ListToolsResult { meta: None, tools: self.tool_router.list_all(), next_cursor: None })
    }

    async fn call_tool(
        &self, request: CallToolRequestParam, context: RequestContext<RoleServer>,
    ) -> Result<CallToolResult, rmcp::model::ErrorData> {
        self.tool_router
            .call(ToolCallContext::new(self, request, context))
            .await
    }
}
