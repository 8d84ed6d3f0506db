//! MCP tool surface over the taskdoc core.
//!
//! Tool-level parameter violations abort before any mutation; per-operation
//! failures inside a task batch are captured as `error` strings on the
//! affected result. Each invocation is one address-cache batch.

use std::collections::BTreeMap;

use chrono::Utc;
use fuzzy_matcher::FuzzyMatcher;
use fuzzy_matcher::skim::SkimMatcherV2;
use rmcp::handler::server::tool::ToolRouter;
use rmcp::handler::server::wrapper::{Json, Parameters};
use rmcp::schemars::JsonSchema;
use rmcp::{tool, tool_router};
use serde::{Deserialize, Serialize};

use taskdoc::{
    COORDINATOR_ACTIVE_PATH, CachedDocument, ReferenceStatus, SearchRequest, SearchType,
    TaskData, TaskStatus, TaskSummary, TaskdocError, WorkflowPrompt, classify_references,
    find_related_documents, search_documents,
};
use taskdoc::workflow::{GUIDE_PREFIX, WORKFLOW_PREFIX};

use crate::error::{McpError, invalid_params, to_mcp_error};
use crate::server::TaskdocMcpServer;

/// Maximum task slugs accepted by a single view call.
const MAX_VIEW_TASKS: usize = 10;

/// Title given to the auto-created coordinator document.
const COORDINATOR_DOCUMENT_TITLE: &str = "Active Tasks";

pub(crate) fn build_tool_router() -> ToolRouter<TaskdocMcpServer> {
    TaskdocMcpServer::tool_router()
}

// ---------------------------------------------------------------------------
// Payload shapes
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct BrowseDocumentsArgs {
    /// Virtual directory to browse (e.g. `/api`). Defaults to the whole
    /// store.
    #[serde(default)]
    pub path: Option<String>,
    /// Include per-document section outlines.
    #[serde(default)]
    pub verbose: Option<bool>,
    /// Reference-graph depth considered when ranking related documents.
    #[serde(default)]
    pub link_depth: Option<usize>,
    /// Attach the most relevant other documents to each entry.
    #[serde(default)]
    pub include_related: Option<bool>,
}

#[derive(Debug, Clone, Serialize, JsonSchema)]
pub struct SectionOutline {
    pub slug: String,
    pub title: String,
    pub depth: u8,
}

#[derive(Debug, Clone, Serialize, JsonSchema)]
pub struct RelatedDocumentView {
    pub path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    pub relevance: f64,
    pub explanation: String,
}

#[derive(Debug, Clone, Serialize, JsonSchema)]
pub struct BrowseDocumentEntry {
    pub path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    pub slug: String,
    pub namespace: String,
    #[serde(rename = "lastModified")]
    pub last_modified: String,
    pub section_count: usize,
    pub word_count: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sections: Option<Vec<SectionOutline>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub related: Option<Vec<RelatedDocumentView>>,
}

#[derive(Debug, Clone, Serialize, JsonSchema)]
pub struct BrowseStructure {
    pub documents: Vec<BrowseDocumentEntry>,
}

#[derive(Debug, Clone, Serialize, JsonSchema)]
pub struct BrowseDocumentsResult {
    pub structure: BrowseStructure,
}

#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct ViewDocumentArgs {
    /// One document path, or several separated by commas.
    pub document: String,
}

#[derive(Debug, Clone, Serialize, JsonSchema)]
pub struct DocumentLinksView {
    pub total: usize,
    pub internal: usize,
    pub external: usize,
}

#[derive(Debug, Clone, Serialize, JsonSchema)]
pub struct BrokenReferenceView {
    pub reference: String,
    pub status: ReferenceStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub document_path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub slug: Option<String>,
}

#[derive(Debug, Clone, Serialize, JsonSchema)]
pub struct DocumentView {
    pub path: String,
    pub slug: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    pub namespace: String,
    #[serde(rename = "documentLinks")]
    pub document_links: DocumentLinksView,
    #[serde(rename = "lastModified")]
    pub last_modified: String,
    #[serde(rename = "wordCount")]
    pub word_count: usize,
    #[serde(rename = "headingCount")]
    pub heading_count: usize,
    pub sections: Vec<SectionOutline>,
    #[serde(rename = "brokenReferences", skip_serializing_if = "Vec::is_empty")]
    pub broken_references: Vec<BrokenReferenceView>,
}

#[derive(Debug, Clone, Serialize, JsonSchema)]
pub struct ViewDocumentResult {
    pub documents: Vec<DocumentView>,
}

#[derive(Debug, Clone, Serialize, JsonSchema)]
pub struct TaskView {
    pub slug: String,
    pub title: String,
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub workflow_name: Option<String>,
    pub has_workflow: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub main_workflow_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub link: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub word_count: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub depth: Option<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub referenced_documents: Option<serde_json::Value>,
    pub full_path: String,
}

#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct ViewSubagentTaskArgs {
    /// `document#slug[,slug...]`, or a bare document path for an overview.
    pub task: String,
}

#[derive(Debug, Clone, Serialize, JsonSchema)]
pub struct ViewSubagentTaskResult {
    pub tasks: Vec<TaskView>,
}

#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct ViewCoordinatorTaskArgs {
    /// Detail view of one coordinator task; omit for the overview.
    #[serde(default)]
    pub slug: Option<String>,
}

#[derive(Debug, Clone, Serialize, JsonSchema)]
pub struct CoordinatorSummary {
    pub total_tasks: usize,
    pub by_status: BTreeMap<String, usize>,
    pub with_links: usize,
    pub with_references: usize,
    pub tasks_with_workflows: usize,
    pub tasks_with_main_workflow: usize,
}

#[derive(Debug, Clone, Serialize, JsonSchema)]
pub struct ViewCoordinatorTaskResult {
    pub mode: String,
    pub document: String,
    pub tasks: Vec<TaskView>,
    pub summary: CoordinatorSummary,
}

#[derive(Debug, Clone, Deserialize, JsonSchema)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum TaskOperation {
    /// Create a task; the slug is derived from the title.
    Create {
        title: String,
        #[serde(default)]
        content: String,
    },
    /// Replace a task body.
    Edit {
        #[serde(default)]
        slug: Option<String>,
        content: String,
    },
    /// List tasks, optionally filtered by status.
    List {
        #[serde(default)]
        status: Option<String>,
    },
}

#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct SubagentTaskArgs {
    /// Document path, optionally with `#slug` (used as the default target
    /// for edit operations).
    pub task: String,
    pub operations: Vec<TaskOperation>,
}

#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct CoordinatorTaskArgs {
    pub operations: Vec<TaskOperation>,
}

#[derive(Debug, Clone, Default, Serialize, JsonSchema)]
pub struct TaskOperationOutcome {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub task: Option<TaskView>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tasks: Option<Vec<TaskView>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub count: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_step: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize, JsonSchema)]
pub struct TaskBatchResult {
    pub operations_completed: usize,
    pub results: Vec<TaskOperationOutcome>,
}

#[derive(Debug, Clone, Serialize, JsonSchema)]
pub struct WorkflowView {
    pub name: String,
    pub description: String,
    #[serde(rename = "whenToUse")]
    pub when_to_use: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
}

#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct StartCoordinatorTaskArgs {
    /// Present only to reject explicit targets: sequential mode always
    /// operates on the next available coordinator task.
    #[serde(default)]
    pub task: Option<String>,
}

#[derive(Debug, Clone, Serialize, JsonSchema)]
pub struct StartedTaskView {
    #[serde(flatten)]
    pub task: TaskView,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub workflow: Option<WorkflowView>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub main_workflow: Option<WorkflowView>,
}

#[derive(Debug, Clone, Serialize, JsonSchema)]
pub struct StartCoordinatorTaskResult {
    pub mode: String,
    pub document: String,
    pub task: StartedTaskView,
}

#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct CompleteSubagentTaskArgs {
    /// `document#slug` naming the task to complete.
    pub task: String,
    pub note: String,
}

#[derive(Debug, Clone, Serialize, JsonSchema)]
pub struct CompletedTaskView {
    pub slug: String,
    pub title: String,
    pub note: String,
    pub completed_date: String,
}

#[derive(Debug, Clone, Serialize, JsonSchema)]
pub struct CompleteSubagentTaskResult {
    pub completed_task: CompletedTaskView,
    pub timestamp: String,
}

#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct CompleteCoordinatorTaskArgs {
    pub note: String,
    /// Include the next available task in the response (default true).
    #[serde(default)]
    pub return_next_task: Option<bool>,
    /// Attach full workflow content instead of the compact form.
    #[serde(default)]
    pub include_full_workflow: Option<bool>,
}

#[derive(Debug, Clone, Serialize, JsonSchema)]
pub struct NextTaskView {
    #[serde(flatten)]
    pub task: TaskView,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub workflow: Option<WorkflowView>,
}

#[derive(Debug, Clone, Serialize, JsonSchema)]
pub struct CompleteCoordinatorTaskResult {
    pub completed_task: CompletedTaskView,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_task: Option<NextTaskView>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub archived: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub archived_to: Option<String>,
}

#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct SearchDocumentsArgs {
    pub query: String,
    /// `fulltext` (default) or `regex`.
    #[serde(rename = "type", default)]
    pub search_type: Option<SearchType>,
    /// Virtual directory prefix; must start with `/`.
    #[serde(default)]
    pub scope: Option<String>,
    #[serde(default)]
    pub include_context: Option<bool>,
    /// 0..=10 context lines around each match.
    #[serde(default)]
    pub context_lines: Option<usize>,
    /// At most 500 matches.
    #[serde(default)]
    pub max_results: Option<usize>,
    /// 20..=500 characters per match line (default 80).
    #[serde(default)]
    pub max_match_length: Option<usize>,
}

#[derive(Debug, Clone, Serialize, JsonSchema)]
pub struct SearchMatchView {
    pub line: usize,
    pub match_text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context: Option<String>,
}

#[derive(Debug, Clone, Serialize, JsonSchema)]
pub struct SearchDocumentMatchesView {
    pub path: String,
    pub matches: Vec<SearchMatchView>,
}

#[derive(Debug, Clone, Serialize, JsonSchema)]
pub struct SearchDocumentsResult {
    pub query: String,
    pub search_type: String,
    pub scope: Option<String>,
    pub results: Vec<SearchDocumentMatchesView>,
    pub total_matches: usize,
    pub total_documents: usize,
    pub truncated: bool,
}

#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct GetWorkflowArgs {
    /// Workflow name, with or without the `workflow_` prefix.
    pub workflow: String,
}

#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct GetGuideArgs {
    /// Guide name, with or without the `guide_` prefix.
    pub guide: String,
}

#[derive(Debug, Clone, Serialize, JsonSchema)]
#[serde(untagged)]
pub enum PromptLookupResult {
    Found(WorkflowView),
    Missing {
        error: String,
        available: Vec<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        did_you_mean: Option<String>,
    },
}

// ---------------------------------------------------------------------------
// Tool handlers
// ---------------------------------------------------------------------------

#[tool_router]
impl TaskdocMcpServer {
    #[tool(
        name = "browse_documents",
        description = "List documents in the store, optionally with section outlines and related-document suggestions."
    )]
    pub(crate) async fn browse_documents(
        &self,
        Parameters(args): Parameters<BrowseDocumentsArgs>,
    ) -> Result<Json<BrowseDocumentsResult>, McpError> {
        let out = self.browse_documents_impl(args);
        self.addresses.clear_batch();
        out.map(Json)
    }

    #[tool(
        name = "view_document",
        description = "Structure view of one or more documents: metadata, link counts, and the section outline."
    )]
    pub(crate) async fn view_document(
        &self,
        Parameters(args): Parameters<ViewDocumentArgs>,
    ) -> Result<Json<ViewDocumentResult>, McpError> {
        let out = self.view_document_impl(args);
        self.addresses.clear_batch();
        out.map(Json)
    }

    #[tool(
        name = "view_subagent_task",
        description = "View tasks by explicit document#slug address, or every task of a document when no slug is given. At most 10 slugs per call."
    )]
    pub(crate) async fn view_subagent_task(
        &self,
        Parameters(args): Parameters<ViewSubagentTaskArgs>,
    ) -> Result<Json<ViewSubagentTaskResult>, McpError> {
        let out = self.view_subagent_task_impl(args);
        self.addresses.clear_batch();
        out.map(Json)
    }

    #[tool(
        name = "view_coordinator_task",
        description = "Overview or detail view of the coordinator document's tasks, with aggregate statistics."
    )]
    pub(crate) async fn view_coordinator_task(
        &self,
        Parameters(args): Parameters<ViewCoordinatorTaskArgs>,
    ) -> Result<Json<ViewCoordinatorTaskResult>, McpError> {
        let out = self.view_coordinator_task_impl(args);
        self.addresses.clear_batch();
        out.map(Json)
    }

    #[tool(
        name = "subagent_task",
        description = "Batch task operations (create, edit, list) on an explicitly addressed document. At most 100 operations."
    )]
    pub(crate) async fn subagent_task(
        &self,
        Parameters(args): Parameters<SubagentTaskArgs>,
    ) -> Result<Json<TaskBatchResult>, McpError> {
        let out = self.subagent_task_impl(args);
        self.addresses.clear_batch();
        out.map(Json)
    }

    #[tool(
        name = "coordinator_task",
        description = "Batch task operations on the coordinator document, creating it on first use. At most 100 operations."
    )]
    pub(crate) async fn coordinator_task(
        &self,
        Parameters(args): Parameters<CoordinatorTaskArgs>,
    ) -> Result<Json<TaskBatchResult>, McpError> {
        let out = self.coordinator_task_impl(args);
        self.addresses.clear_batch();
        out.map(Json)
    }

    #[tool(
        name = "start_coordinator_task",
        description = "Sequential mode: start the next available coordinator task, injecting its workflow and the document's main workflow."
    )]
    pub(crate) async fn start_coordinator_task(
        &self,
        Parameters(args): Parameters<StartCoordinatorTaskArgs>,
    ) -> Result<Json<StartCoordinatorTaskResult>, McpError> {
        let out = self.start_coordinator_task_impl(args);
        self.addresses.clear_batch();
        out.map(Json)
    }

    #[tool(
        name = "complete_subagent_task",
        description = "Complete an explicitly addressed task with a note. Never returns a follow-up task."
    )]
    pub(crate) async fn complete_subagent_task(
        &self,
        Parameters(args): Parameters<CompleteSubagentTaskArgs>,
    ) -> Result<Json<CompleteSubagentTaskResult>, McpError> {
        let out = self.complete_subagent_task_impl(args);
        self.addresses.clear_batch();
        out.map(Json)
    }

    #[tool(
        name = "complete_coordinator_task",
        description = "Sequential mode: complete the current coordinator task, optionally returning the next one; archives the document when drained."
    )]
    pub(crate) async fn complete_coordinator_task(
        &self,
        Parameters(args): Parameters<CompleteCoordinatorTaskArgs>,
    ) -> Result<Json<CompleteCoordinatorTaskResult>, McpError> {
        let out = self.complete_coordinator_task_impl(args);
        self.addresses.clear_batch();
        out.map(Json)
    }

    #[tool(
        name = "search_documents",
        description = "Fulltext or regex search across the store with optional scope and context lines."
    )]
    pub(crate) async fn search_documents(
        &self,
        Parameters(args): Parameters<SearchDocumentsArgs>,
    ) -> Result<Json<SearchDocumentsResult>, McpError> {
        let out = self.search_documents_impl(args);
        self.addresses.clear_batch();
        out.map(Json)
    }

    #[tool(
        name = "get_workflow",
        description = "Fetch a workflow prompt by name; unknown names return the available catalog.",
        output_schema = std::sync::Arc::new(serde_json::Map::from_iter([(
            "type".to_string(),
            serde_json::Value::String("object".to_string()),
        )]))
    )]
    pub(crate) async fn get_workflow(
        &self,
        Parameters(args): Parameters<GetWorkflowArgs>,
    ) -> Result<Json<PromptLookupResult>, McpError> {
        Ok(Json(self.lookup_prompt(&args.workflow, WORKFLOW_PREFIX)))
    }

    #[tool(
        name = "get_guide",
        description = "Fetch a guide prompt by name; unknown names return the available catalog.",
        output_schema = std::sync::Arc::new(serde_json::Map::from_iter([(
            "type".to_string(),
            serde_json::Value::String("object".to_string()),
        )]))
    )]
    pub(crate) async fn get_guide(
        &self,
        Parameters(args): Parameters<GetGuideArgs>,
    ) -> Result<Json<PromptLookupResult>, McpError> {
        Ok(Json(self.lookup_prompt(&args.guide, GUIDE_PREFIX)))
    }
}

// ---------------------------------------------------------------------------
// Implementations
// ---------------------------------------------------------------------------

impl TaskdocMcpServer {
    fn browse_documents_impl(
        &self,
        args: BrowseDocumentsArgs,
    ) -> Result<BrowseDocumentsResult, McpError> {
        if let Some(path) = args.path.as_deref() {
            if !path.starts_with('/') {
                return Err(invalid_params(format!("path must start with '/': {path:?}")));
            }
        }

        let verbose = args.verbose.unwrap_or(false);
        let include_related = args.include_related.unwrap_or(false);
        let link_depth = args.link_depth.unwrap_or(1);
        let relevance_options = taskdoc::RelevanceOptions {
            link_graph_boost: link_depth > 0,
        };

        let summaries = self
            .cache
            .list_documents(args.path.as_deref())
            .map_err(to_mcp_error)?;

        let mut documents = Vec::with_capacity(summaries.len());
        for summary in summaries {
            let sections = if verbose {
                let doc = self.cache.load_document(&summary.path).map_err(to_mcp_error)?;
                Some(section_outlines(&doc))
            } else {
                None
            };
            let related = if include_related {
                let related = find_related_documents(&self.cache, &summary.path, relevance_options)
                    .map_err(to_mcp_error)?;
                Some(
                    related
                        .into_iter()
                        .map(|r| RelatedDocumentView {
                            path: r.path,
                            title: r.title,
                            relevance: r.relevance,
                            explanation: r.explanation,
                        })
                        .collect(),
                )
            } else {
                None
            };

            documents.push(BrowseDocumentEntry {
                path: summary.path,
                title: summary.title,
                slug: summary.slug,
                namespace: summary.namespace,
                last_modified: summary.last_modified.to_rfc3339(),
                section_count: summary.section_count,
                word_count: summary.word_count,
                sections,
                related,
            });
        }

        Ok(BrowseDocumentsResult {
            structure: BrowseStructure { documents },
        })
    }

    fn view_document_impl(&self, args: ViewDocumentArgs) -> Result<ViewDocumentResult, McpError> {
        let mut documents = Vec::new();
        for raw in args.document.split(',').map(str::trim).filter(|s| !s.is_empty()) {
            let address = self.addresses.parse_document(raw).map_err(to_mcp_error)?;
            let doc = self
                .cache
                .load_document(&address.path)
                .map_err(to_mcp_error)?;
            let broken_references =
                classify_references(&self.cache, doc.content(), &doc.metadata.namespace)
                    .map_err(to_mcp_error)?
                    .into_iter()
                    .filter(|c| c.status != ReferenceStatus::Valid)
                    .map(|c| BrokenReferenceView {
                        reference: c.reference,
                        status: c.status,
                        document_path: c.document_path,
                        slug: c.slug,
                    })
                    .collect();
            documents.push(DocumentView {
                path: address.path.clone(),
                slug: address.slug.clone(),
                title: doc.metadata.title.clone(),
                namespace: doc.metadata.namespace.clone(),
                document_links: DocumentLinksView {
                    total: doc.metadata.link_counts.total,
                    internal: doc.metadata.link_counts.internal,
                    external: doc.metadata.link_counts.external,
                },
                last_modified: doc.metadata.last_modified.to_rfc3339(),
                word_count: doc.metadata.word_count,
                heading_count: doc.headings.len(),
                sections: section_outlines(&doc),
                broken_references,
            });
        }

        if documents.is_empty() {
            return Err(invalid_params("document must name at least one path"));
        }
        Ok(ViewDocumentResult { documents })
    }

    fn view_subagent_task_impl(
        &self,
        args: ViewSubagentTaskArgs,
    ) -> Result<ViewSubagentTaskResult, McpError> {
        let (document, tasks) =
            taskdoc::parse_task_list(&args.task, MAX_VIEW_TASKS).map_err(to_mcp_error)?;

        if tasks.is_empty() {
            // Overview: every task in the document.
            let summaries = self
                .engine
                .list_tasks(&document.path, None)
                .map_err(to_mcp_error)?;
            return Ok(ViewSubagentTaskResult {
                tasks: summaries.into_iter().map(summary_view).collect(),
            });
        }

        let mut views = Vec::with_capacity(tasks.len());
        for task in tasks {
            let data = self
                .engine
                .get_task(&document.path, &task.slug, true)
                .map_err(to_mcp_error)?;
            views.push(detail_view(data));
        }
        Ok(ViewSubagentTaskResult { tasks: views })
    }

    fn view_coordinator_task_impl(
        &self,
        args: ViewCoordinatorTaskArgs,
    ) -> Result<ViewCoordinatorTaskResult, McpError> {
        let summaries = self
            .engine
            .list_tasks(COORDINATOR_ACTIVE_PATH, None)
            .map_err(to_mcp_error)?;
        let summary = coordinator_summary(&summaries);

        let (mode, tasks) = match args.slug {
            Some(slug) => {
                let data = self
                    .engine
                    .get_task(COORDINATOR_ACTIVE_PATH, &slug, true)
                    .map_err(to_mcp_error)?;
                ("detail", vec![detail_view(data)])
            }
            None => (
                "overview",
                summaries.into_iter().map(summary_view).collect(),
            ),
        };

        Ok(ViewCoordinatorTaskResult {
            mode: mode.to_string(),
            document: COORDINATOR_ACTIVE_PATH.to_string(),
            tasks,
            summary,
        })
    }

    fn subagent_task_impl(&self, args: SubagentTaskArgs) -> Result<TaskBatchResult, McpError> {
        let (document, tasks) =
            taskdoc::parse_task_list(&args.task, MAX_VIEW_TASKS).map_err(to_mcp_error)?;
        let default_slug = tasks.first().map(|t| t.slug.clone());
        self.run_task_operations(&document.path, default_slug.as_deref(), args.operations)
    }

    fn coordinator_task_impl(
        &self,
        args: CoordinatorTaskArgs,
    ) -> Result<TaskBatchResult, McpError> {
        // The coordinator document exists from the first call onward.
        self.engine
            .editor()
            .create_document(COORDINATOR_ACTIVE_PATH, COORDINATOR_DOCUMENT_TITLE)
            .map_err(to_mcp_error)?;
        self.run_task_operations(COORDINATOR_ACTIVE_PATH, None, args.operations)
    }

    fn run_task_operations(
        &self,
        doc_path: &str,
        default_slug: Option<&str>,
        operations: Vec<TaskOperation>,
    ) -> Result<TaskBatchResult, McpError> {
        if operations.len() > taskdoc::MAX_BATCH_OPERATIONS {
            return Err(to_mcp_error(TaskdocError::BatchTooLarge {
                count: operations.len(),
                limit: taskdoc::MAX_BATCH_OPERATIONS,
            }));
        }

        let mut results = Vec::with_capacity(operations.len());
        let mut completed = 0usize;
        for operation in operations {
            match self.run_task_operation(doc_path, default_slug, operation) {
                Ok(outcome) => {
                    completed += 1;
                    results.push(outcome);
                }
                Err(err) => results.push(TaskOperationOutcome {
                    error: Some(err.to_string()),
                    ..TaskOperationOutcome::default()
                }),
            }
        }

        Ok(TaskBatchResult {
            operations_completed: completed,
            results,
        })
    }

    fn run_task_operation(
        &self,
        doc_path: &str,
        default_slug: Option<&str>,
        operation: TaskOperation,
    ) -> Result<TaskOperationOutcome, TaskdocError> {
        match operation {
            TaskOperation::Create { title, content } => {
                let (task, first) = self.engine.create_task(doc_path, &title, &content)?;
                let next_step = first.then(|| {
                    format!(
                        "First task created. Inspect it with {}#{} and complete it when done.",
                        doc_path, task.slug
                    )
                });
                Ok(TaskOperationOutcome {
                    task: Some(detail_view(task)),
                    next_step,
                    ..TaskOperationOutcome::default()
                })
            }
            TaskOperation::Edit { slug, content } => {
                let slug = slug
                    .as_deref()
                    .or(default_slug)
                    .ok_or_else(|| {
                        TaskdocError::Validation("edit requires a task slug".into())
                    })?
                    .to_string();
                let task = self.engine.edit_task(doc_path, &slug, &content)?;
                Ok(TaskOperationOutcome {
                    task: Some(detail_view(task)),
                    ..TaskOperationOutcome::default()
                })
            }
            TaskOperation::List { status } => {
                let filter = status.as_deref().map(TaskStatus::parse);
                let tasks = self.engine.list_tasks(doc_path, filter.as_ref())?;
                Ok(TaskOperationOutcome {
                    count: Some(tasks.len()),
                    tasks: Some(tasks.into_iter().map(summary_view).collect()),
                    ..TaskOperationOutcome::default()
                })
            }
        }
    }

    fn start_coordinator_task_impl(
        &self,
        args: StartCoordinatorTaskArgs,
    ) -> Result<StartCoordinatorTaskResult, McpError> {
        if args.task.as_deref().is_some_and(|task| task.contains('#')) {
            return Err(invalid_params(
                "start_coordinator_task is sequential and rejects an explicit #slug",
            ));
        }

        let data = self
            .engine
            .start_next_task(COORDINATOR_ACTIVE_PATH)
            .map_err(to_mcp_error)?;

        let workflow = self.resolve_workflow(data.workflow_name.as_deref(), true);
        let main_workflow = self.resolve_workflow(data.main_workflow_name.as_deref(), true);

        Ok(StartCoordinatorTaskResult {
            mode: "sequential".to_string(),
            document: COORDINATOR_ACTIVE_PATH.to_string(),
            task: StartedTaskView {
                task: detail_view(data),
                workflow,
                main_workflow,
            },
        })
    }

    fn complete_subagent_task_impl(
        &self,
        args: CompleteSubagentTaskArgs,
    ) -> Result<CompleteSubagentTaskResult, McpError> {
        let (document, tasks) =
            taskdoc::parse_task_list(&args.task, 1).map_err(to_mcp_error)?;
        let task = tasks
            .first()
            .ok_or_else(|| invalid_params("complete_subagent_task requires a #slug"))?;

        let completion = self
            .engine
            .complete_task(&document.path, &task.slug, &args.note)
            .map_err(to_mcp_error)?;

        Ok(CompleteSubagentTaskResult {
            completed_task: CompletedTaskView {
                slug: completion.slug,
                title: completion.title,
                note: completion.note,
                completed_date: completion.completed_date,
            },
            timestamp: Utc::now().to_rfc3339(),
        })
    }

    fn complete_coordinator_task_impl(
        &self,
        args: CompleteCoordinatorTaskArgs,
    ) -> Result<CompleteCoordinatorTaskResult, McpError> {
        let current = self
            .engine
            .find_next_available_task(COORDINATOR_ACTIVE_PATH)
            .map_err(to_mcp_error)?
            .ok_or_else(|| {
                to_mcp_error(TaskdocError::NoAvailableTasks(
                    COORDINATOR_ACTIVE_PATH.to_string(),
                ))
            })?;

        let completion = self
            .engine
            .complete_task(COORDINATOR_ACTIVE_PATH, &current.slug, &args.note)
            .map_err(to_mcp_error)?;

        let return_next = args.return_next_task.unwrap_or(true);
        let include_content = args.include_full_workflow.unwrap_or(false);
        let next_task = if return_next {
            completion.next_task.map(|data| {
                // Completion never injects the main workflow.
                let workflow = self.resolve_workflow(data.workflow_name.as_deref(), include_content);
                NextTaskView {
                    task: detail_view(data),
                    workflow,
                }
            })
        } else {
            None
        };

        Ok(CompleteCoordinatorTaskResult {
            completed_task: CompletedTaskView {
                slug: completion.slug,
                title: completion.title,
                note: completion.note,
                completed_date: completion.completed_date,
            },
            next_task,
            archived: completion.archived.then_some(true),
            archived_to: completion.archived_to,
        })
    }

    fn search_documents_impl(
        &self,
        args: SearchDocumentsArgs,
    ) -> Result<SearchDocumentsResult, McpError> {
        let defaults = SearchRequest::default();
        let request = SearchRequest {
            query: args.query,
            search_type: args.search_type.unwrap_or_default(),
            scope: args.scope,
            include_context: args.include_context.unwrap_or(defaults.include_context),
            context_lines: args.context_lines.unwrap_or(defaults.context_lines),
            max_results: args.max_results.unwrap_or(defaults.max_results),
            max_match_length: args.max_match_length.unwrap_or(defaults.max_match_length),
        };

        let results = search_documents(&self.cache, &request).map_err(to_mcp_error)?;
        Ok(SearchDocumentsResult {
            query: results.query,
            search_type: match results.search_type {
                SearchType::Fulltext => "fulltext".to_string(),
                SearchType::Regex => "regex".to_string(),
            },
            scope: results.scope,
            results: results
                .results
                .into_iter()
                .map(|doc| SearchDocumentMatchesView {
                    path: doc.path,
                    matches: doc
                        .matches
                        .into_iter()
                        .map(|m| SearchMatchView {
                            line: m.line,
                            match_text: m.match_text,
                            context: m.context,
                        })
                        .collect(),
                })
                .collect(),
            total_matches: results.total_matches,
            total_documents: results.total_documents,
            truncated: results.truncated,
        })
    }

    fn lookup_prompt(&self, raw: &str, prefix: &str) -> PromptLookupResult {
        let name = raw.trim();
        let qualified = if name.starts_with(prefix) {
            name.to_string()
        } else {
            format!("{prefix}{name}")
        };

        let catalog: Vec<WorkflowPrompt> = self
            .workflows
            .list()
            .into_iter()
            .filter(|prompt| prompt.name.starts_with(prefix))
            .collect();

        if let Some(prompt) = catalog.iter().find(|prompt| prompt.name == qualified) {
            return PromptLookupResult::Found(workflow_view(prompt.clone(), true));
        }

        let available: Vec<String> = catalog
            .iter()
            .map(|prompt| strip_prefix(&prompt.name))
            .collect();

        let matcher = SkimMatcherV2::default();
        let did_you_mean = available
            .iter()
            .filter_map(|candidate| {
                matcher
                    .fuzzy_match(candidate, name)
                    .map(|score| (score, candidate.clone()))
            })
            .max_by_key(|(score, _)| *score)
            .map(|(_, candidate)| candidate);

        PromptLookupResult::Missing {
            error: format!("unknown prompt: {name}"),
            available,
            did_you_mean,
        }
    }

    /// Resolves a workflow name against the registry. Unknown names are
    /// logged and omitted; they never fail the surrounding operation.
    fn resolve_workflow(&self, name: Option<&str>, include_content: bool) -> Option<WorkflowView> {
        let name = name?;
        match self.workflows.lookup(name) {
            Some(prompt) => Some(workflow_view(prompt, include_content)),
            None => {
                tracing::warn!(workflow = name, "unknown workflow name; omitting enrichment");
                None
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Mapping helpers
// ---------------------------------------------------------------------------

fn section_outlines(doc: &CachedDocument) -> Vec<SectionOutline> {
    doc.headings
        .iter()
        .map(|h| SectionOutline {
            slug: h.slug.clone(),
            title: h.title.clone(),
            depth: h.depth,
        })
        .collect()
}

fn summary_view(summary: TaskSummary) -> TaskView {
    TaskView {
        slug: summary.slug,
        title: summary.title,
        status: summary.status.to_string(),
        has_workflow: summary.has_workflow,
        workflow_name: summary.workflow_name,
        main_workflow_name: summary.main_workflow_name,
        link: summary.link,
        content: None,
        word_count: Some(summary.word_count),
        depth: None,
        referenced_documents: None,
        full_path: summary.full_path,
    }
}

fn detail_view(data: TaskData) -> TaskView {
    let referenced_documents = if data.referenced_documents.is_empty() {
        None
    } else {
        serde_json::to_value(&data.referenced_documents).ok()
    };
    TaskView {
        slug: data.slug,
        title: data.title,
        status: data.status.to_string(),
        has_workflow: data.workflow_name.is_some(),
        workflow_name: data.workflow_name,
        main_workflow_name: data.main_workflow_name,
        link: data.link,
        content: Some(data.content),
        word_count: Some(data.word_count),
        depth: Some(data.depth),
        referenced_documents,
        full_path: data.full_path,
    }
}

fn workflow_view(prompt: WorkflowPrompt, include_content: bool) -> WorkflowView {
    WorkflowView {
        name: strip_prefix(&prompt.name),
        description: prompt.description,
        when_to_use: prompt.when_to_use,
        content: include_content.then_some(prompt.content),
    }
}

fn strip_prefix(name: &str) -> String {
    name.strip_prefix(WORKFLOW_PREFIX)
        .or_else(|| name.strip_prefix(GUIDE_PREFIX))
        .unwrap_or(name)
        .to_string()
}

fn coordinator_summary(summaries: &[TaskSummary]) -> CoordinatorSummary {
    let mut by_status: BTreeMap<String, usize> = BTreeMap::new();
    for summary in summaries {
        *by_status.entry(summary.status.to_string()).or_insert(0) += 1;
    }
    CoordinatorSummary {
        total_tasks: summaries.len(),
        by_status,
        with_links: summaries.iter().filter(|s| s.link.is_some()).count(),
        with_references: summaries.iter().filter(|s| s.has_references).count(),
        tasks_with_workflows: summaries.iter().filter(|s| s.has_workflow).count(),
        tasks_with_main_workflow: summaries
            .iter()
            .filter(|s| s.main_workflow_name.is_some())
            .count(),
    }
}
