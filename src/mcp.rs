use std::{collections::BTreeMap, sync::Arc};

use rmcp::{
    ServerHandler,
    ServiceExt,
    handler::server::{router::tool::ToolRouter, wrapper::Parameters},
    model::{
        CallToolResult,
        Content,
        Implementation,
        ServerCapabilities,
        ServerInfo,
    },
    tool,
    tool_handler,
    tool_router,
};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tokio_util::sync::CancellationToken;

use crate::{
    department::DepartmentNode,
    error,
    preview::ActionMetadata,
    reply::{
        Category,
        CollectingReply,
        ColumnLayout,
        ResultRecord,
        SearchReply,
    },
    scope::Scope,
};

const DEFAULT_SEARCH_LIMIT: usize = 25;

#[derive(Clone)]
pub struct ScopeMcpServer {
    scope: Arc<Scope>,
    tool_router: ToolRouter<Self>,
}

impl ScopeMcpServer {
    pub fn new(scope: Arc<Scope>) -> Self {
        Self {
            scope,
            tool_router: Self::tool_router(),
        }
    }
}

/// Collects results and cancels the search once `limit` are in.
struct LimitedReply {
    inner: CollectingReply,
    limit: usize,
    cancel: CancellationToken,
}

impl LimitedReply {
    fn new(limit: usize, cancel: CancellationToken) -> Self {
        if limit == 0 {
            cancel.cancel();
        }
        Self {
            inner: CollectingReply::default(),
            limit,
            cancel,
        }
    }
}

impl SearchReply for LimitedReply {
    fn register_departments(&mut self, root: DepartmentNode) {
        self.inner.register_departments(root);
    }

    fn register_category(&mut self, category: Category) {
        self.inner.register_category(category);
    }

    fn push(&mut self, result: ResultRecord) -> error::Result<()> {
        self.inner.push(result)?;
        if self.inner.results.len() >= self.limit {
            self.cancel.cancel();
        }
        Ok(())
    }
}

#[tool_router(router = tool_router)]
impl ScopeMcpServer {
    /// Search rows by plaintext tags within a department.
    #[tool(
        name = "cryptag_search",
        description = "Search CrypTag rows. Query words are tags that must all match; department narrows to Notes, Passwords or Files."
    )]
    pub async fn cryptag_search(
        &self,
        params: Parameters<SearchParams>,
    ) -> Result<CallToolResult, rmcp::ErrorData> {
        let params = params.0;
        let query = params.query;
        let department = params.department.unwrap_or_default();
        let limit = params.limit.unwrap_or(DEFAULT_SEARCH_LIMIT);

        let scope = Arc::clone(&self.scope);
        let (q, d) = (query.clone(), department.clone());
        let reply = tokio::task::spawn_blocking(move || {
            let cancel = CancellationToken::new();
            let mut reply = LimitedReply::new(limit, cancel.clone());
            scope.search(&q, &d, &mut reply, &cancel).map(|()| reply.inner)
        })
        .await
        .map_err(|e| mcp_error("search task failed", e))?
        .map_err(|e| mcp_error("search failed", e))?;

        let summary = format_search_summary(&reply.results, &query);
        let structured = serde_json::to_value(SearchResponse {
            query,
            department,
            result_count: reply.results.len(),
            departments: reply.departments,
            results: reply.results,
        })
        .map_err(|e| mcp_error("failed to serialize search results", e))?;

        let mut result = CallToolResult::success(vec![Content::text(summary)]);
        result.structured_content = Some(structured);
        Ok(result)
    }

    /// Preview widgets for one row.
    #[tool(
        name = "cryptag_preview",
        description = "Show the preview layout and widgets for a row, by its id tag value."
    )]
    pub async fn cryptag_preview(
        &self,
        params: Parameters<PreviewParams>,
    ) -> Result<CallToolResult, rmcp::ErrorData> {
        let params = params.0;
        let department = params.department.unwrap_or_default();
        let metadata = ActionMetadata {
            scope_data: params.scope_data,
            ..Default::default()
        };

        let scope = Arc::clone(&self.scope);
        let row_id = params.row_id.clone();
        let (result, reply) = tokio::task::spawn_blocking(move || {
            let result = scope.find_result(&row_id, &department)?;
            let mut reply = CollectingReply::default();
            scope.preview(&result, &metadata, &mut reply)?;
            Ok::<_, error::Error>((result, reply))
        })
        .await
        .map_err(|e| mcp_error("preview task failed", e))?
        .map_err(|e| mcp_error("preview failed", e))?;

        let widgets: Vec<ResolvedWidget> = reply
            .widgets
            .iter()
            .map(|w| ResolvedWidget {
                id: w.id.clone(),
                kind: w.kind.clone(),
                attributes: w.resolve(&result),
            })
            .collect();

        let text = format_preview_text(&widgets);
        let structured = serde_json::to_value(PreviewResponse {
            row_id: params.row_id,
            layout: reply.layouts.into_iter().next().unwrap_or_default(),
            widgets,
        })
        .map_err(|e| mcp_error("failed to serialize preview", e))?;

        let mut result = CallToolResult::success(vec![Content::text(text)]);
        result.structured_content = Some(structured);
        Ok(result)
    }

    /// The department tree searches can be narrowed to.
    #[tool(
        name = "cryptag_departments",
        description = "List the departments (Notes, Passwords, Files) and their ids."
    )]
    pub async fn cryptag_departments(
        &self,
        params: Parameters<DepartmentsParams>,
    ) -> Result<CallToolResult, rmcp::ErrorData> {
        let tree = self
            .scope
            .departments(params.0.query.as_deref().unwrap_or_default());
        let text = tree
            .subdepartments
            .iter()
            .map(|d| format!("{}: {}", d.id, d.label))
            .collect::<Vec<_>>()
            .join("\n");
        let structured = serde_json::to_value(&tree)
            .map_err(|e| mcp_error("failed to serialize departments", e))?;

        let mut result = CallToolResult::success(vec![Content::text(text)]);
        result.structured_content = Some(structured);
        Ok(result)
    }
}

#[tool_handler(router = self.tool_router)]
impl ServerHandler for ScopeMcpServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo::new(ServerCapabilities::builder().enable_tools().build())
            .with_server_info(
                Implementation::new("cryptag-scope", env!("CARGO_PKG_VERSION"))
                    .with_title("CrypTag scope"),
            )
            .with_instructions(
                "Use cryptag_search to find notes, passwords and files by tag, then cryptag_preview with a result's row_id to see it.",
            )
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct SearchParams {
    /// Whitespace-separated tags that must all match.
    pub query: String,
    /// Department id: "Notes", "Passwords", "Files", or empty for all.
    pub department: Option<String>,
    /// Maximum number of results (default: 25).
    pub limit: Option<usize>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct PreviewParams {
    /// Value of the row's `id:` tag.
    pub row_id: String,
    /// Department the row was found in.
    pub department: Option<String>,
    /// Extra text to show in the preview.
    pub scope_data: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct DepartmentsParams {
    /// Query text the department links should carry.
    pub query: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SearchResponse {
    query: String,
    department: String,
    result_count: usize,
    departments: Option<DepartmentNode>,
    results: Vec<ResultRecord>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct PreviewResponse {
    row_id: String,
    layout: ColumnLayout,
    widgets: Vec<ResolvedWidget>,
}

#[derive(Debug, Serialize)]
struct ResolvedWidget {
    id: String,
    #[serde(rename = "type")]
    kind: String,
    attributes: BTreeMap<String, Value>,
}

fn format_search_summary(results: &[ResultRecord], query: &str) -> String {
    if results.is_empty() {
        return format!("No results found for \"{query}\"");
    }

    let mut lines = Vec::with_capacity(results.len() + 1);
    let suffix = if results.len() == 1 { "" } else { "s" };
    lines.push(format!(
        "Found {} result{} for \"{query}\":",
        results.len(),
        suffix
    ));

    for result in results {
        lines.push(format!("{} {}", result.get("row_id"), result.title()));
    }

    lines.join("\n")
}

fn format_preview_text(widgets: &[ResolvedWidget]) -> String {
    widgets
        .iter()
        .filter_map(|w| {
            let text = w.attributes.get("text").or(w.attributes.get("title"))?;
            let text = text.as_str()?;
            (!text.is_empty()).then(|| format!("[{}] {text}", w.id))
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn mcp_error(message: &str, error: impl std::fmt::Display) -> rmcp::ErrorData {
    rmcp::ErrorData::internal_error(
        message.to_string(),
        Some(json!({ "error": error.to_string() })),
    )
}

pub fn run_mcp(scope: Scope) -> error::Result<()> {
    let server = ScopeMcpServer::new(Arc::new(scope));

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|e| {
            error::Error::Config(format!("failed to start tokio runtime: {e}"))
        })?;

    runtime.block_on(async move {
        let transport = rmcp::transport::stdio();
        let running = server.serve(transport).await.map_err(|e| {
            error::Error::Config(format!(
                "MCP server initialization failed: {e}"
            ))
        })?;
        running.waiting().await.map_err(|e| {
            error::Error::Config(format!("MCP server error: {e}"))
        })?;
        Ok(())
    })
}
