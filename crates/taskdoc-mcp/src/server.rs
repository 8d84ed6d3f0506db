//! Server state and stdio transport wiring.

use std::sync::Arc;

use rmcp::handler::server::tool::ToolRouter;
use rmcp::model::{Implementation, ProtocolVersion, ServerCapabilities, ServerInfo};
use rmcp::{ServerHandler, ServiceExt, tool_handler, transport::stdio};
use tracing_subscriber::EnvFilter;

use taskdoc::{
    AddressCache, DocumentCache, TaskEngine, WorkflowRegistry, WorkspacePaths,
};

use crate::prompts::builtin_registry;
use crate::tools;

/// MCP server over one taskdoc workspace.
pub struct TaskdocMcpServer {
    pub(crate) cache: Arc<DocumentCache>,
    pub(crate) engine: TaskEngine,
    /// Batch-scoped address cache; cleared at the end of every tool call.
    pub(crate) addresses: Arc<AddressCache>,
    pub(crate) workflows: Arc<dyn WorkflowRegistry>,
    pub(crate) tool_router: ToolRouter<Self>,
}

impl TaskdocMcpServer {
    pub fn new(workspace: WorkspacePaths) -> Self {
        Self::with_registry(workspace, Arc::new(builtin_registry()))
    }

    pub fn with_registry(workspace: WorkspacePaths, workflows: Arc<dyn WorkflowRegistry>) -> Self {
        let cache = Arc::new(DocumentCache::new(workspace));
        let engine = TaskEngine::new(cache.clone());
        Self {
            cache,
            engine,
            addresses: Arc::new(AddressCache::new()),
            workflows,
            tool_router: tools::build_tool_router(),
        }
    }

    pub fn cache(&self) -> &Arc<DocumentCache> {
        &self.cache
    }

    pub fn engine(&self) -> &TaskEngine {
        &self.engine
    }
}

#[tool_handler]
impl ServerHandler for TaskdocMcpServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            protocol_version: ProtocolVersion::default(),
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            server_info: Implementation::from_build_env(),
            instructions: Some(
                "Taskdoc exposes a sectioned markdown document store with task \
                 management. Browse and read documents, search them, and create, \
                 edit, and complete tasks through the task tools."
                    .into(),
            ),
        }
    }
}

/// Entry point used by the binary: initialises tracing, resolves the
/// workspace from the environment, and serves stdio until the client
/// disconnects.
pub async fn run_stdio_server() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let workspace = WorkspacePaths::from_env()?;
    tracing::info!(root = %workspace.root().display(), "starting taskdoc MCP server");

    let server = TaskdocMcpServer::new(workspace);
    let service = server.serve(stdio()).await?;
    service.waiting().await?;
    Ok(())
}
