mod error;
mod prompts;
mod server;
mod tools;

pub use crate::error::McpError;
pub use crate::prompts::builtin_registry;
pub use crate::server::{TaskdocMcpServer, run_stdio_server};
pub use crate::tools::{
    BrowseDocumentsArgs, CompleteCoordinatorTaskArgs, CompleteSubagentTaskArgs,
    CoordinatorTaskArgs, GetGuideArgs, GetWorkflowArgs, SearchDocumentsArgs,
    StartCoordinatorTaskArgs, SubagentTaskArgs, TaskOperation, ViewCoordinatorTaskArgs,
    ViewDocumentArgs, ViewSubagentTaskArgs,
};

#[cfg(test)]
mod tests {
    use std::fs;

    use rmcp::handler::server::wrapper::Parameters;
    use taskdoc::WorkspacePaths;
    use tempfile::TempDir;

    use crate::server::TaskdocMcpServer;
    use crate::tools::{
        BrowseDocumentsArgs, CompleteCoordinatorTaskArgs, CompleteSubagentTaskArgs,
        CoordinatorTaskArgs, GetWorkflowArgs, PromptLookupResult, SearchDocumentsArgs,
        StartCoordinatorTaskArgs, SubagentTaskArgs, TaskOperation, ViewCoordinatorTaskArgs,
        ViewDocumentArgs, ViewSubagentTaskArgs,
    };

    struct TestWorkspace {
        _temp: TempDir,
        server: TaskdocMcpServer,
    }

    impl TestWorkspace {
        fn create() -> Self {
            let temp = tempfile::tempdir().unwrap();
            fs::create_dir_all(temp.path().join("docs")).unwrap();
            fs::create_dir_all(temp.path().join("coordinator")).unwrap();
            let server = TaskdocMcpServer::new(WorkspacePaths::new(temp.path()));
            Self {
                _temp: temp,
                server,
            }
        }

        fn write_doc(&self, path: &str, content: &str) {
            let physical = self.server.cache().workspace().resolve(path).unwrap();
            fs::create_dir_all(physical.parent().unwrap()).unwrap();
            fs::write(physical, content).unwrap();
        }
    }

    #[tokio::test]
    async fn browse_lists_documents_with_outlines() {
        let workspace = TestWorkspace::create();
        workspace.write_doc("/api/auth.md", "# Auth\n\n## JWT\n\nbody\n");

        let result = workspace
            .server
            .browse_documents(Parameters(BrowseDocumentsArgs {
                path: None,
                verbose: Some(true),
                link_depth: None,
                include_related: None,
            }))
            .await
            .unwrap();

        let documents = &result.0.structure.documents;
        assert_eq!(documents.len(), 1);
        assert_eq!(documents[0].path, "/api/auth.md");
        assert_eq!(documents[0].namespace, "api");
        let sections = documents[0].sections.as_ref().unwrap();
        assert_eq!(sections.len(), 2);
    }

    #[tokio::test]
    async fn view_document_reports_links_and_sections_only() {
        let workspace = TestWorkspace::create();
        workspace.write_doc(
            "/api/auth.md",
            "# Auth\n\n[ext](https://x.example) [int](/api/other.md)\n\n## JWT\n\nbody\n",
        );

        let result = workspace
            .server
            .view_document(Parameters(ViewDocumentArgs {
                document: "/api/auth.md".into(),
            }))
            .await
            .unwrap();

        let view = &result.0.documents[0];
        assert_eq!(view.document_links.total, 2);
        assert_eq!(view.document_links.external, 1);
        assert_eq!(view.document_links.internal, 1);
        assert_eq!(view.heading_count, 2);
        assert!(view.sections.iter().all(|s| !s.slug.is_empty()));
    }

    #[tokio::test]
    async fn view_document_surfaces_broken_references() {
        let workspace = TestWorkspace::create();
        workspace.write_doc("/api/auth.md", "# Auth\n\n## JWT\n\nbody\n");
        workspace.write_doc(
            "/api/notes.md",
            "# Notes\n\nok: @/api/auth.md#jwt\nbad: @/api/ghost.md\n",
        );

        let result = workspace
            .server
            .view_document(Parameters(ViewDocumentArgs {
                document: "/api/notes.md".into(),
            }))
            .await
            .unwrap();

        let view = &result.0.documents[0];
        assert_eq!(view.broken_references.len(), 1);
        assert_eq!(view.broken_references[0].reference, "@/api/ghost.md");
    }

    #[tokio::test]
    async fn subagent_task_batch_creates_and_lists() {
        let workspace = TestWorkspace::create();
        workspace.write_doc("/plan.md", "# Plan\n\nOverview.\n");

        let result = workspace
            .server
            .subagent_task(Parameters(SubagentTaskArgs {
                task: "/plan.md".into(),
                operations: vec![
                    TaskOperation::Create {
                        title: "First Item".into(),
                        content: "- Status: pending\n\nwork".into(),
                    },
                    TaskOperation::Create {
                        title: "Second Item".into(),
                        content: String::new(),
                    },
                    TaskOperation::List { status: None },
                ],
            }))
            .await
            .unwrap();

        let batch = result.0;
        assert_eq!(batch.operations_completed, 3);
        // next_step only accompanies the document's first task creation.
        assert!(batch.results[0].next_step.is_some());
        assert!(batch.results[1].next_step.is_none());
        assert_eq!(batch.results[2].count, Some(2));
    }

    #[tokio::test]
    async fn batches_over_one_hundred_operations_are_rejected() {
        let workspace = TestWorkspace::create();
        workspace.write_doc("/plan.md", "# Plan\n");

        let operations: Vec<TaskOperation> = (0..101)
            .map(|_| TaskOperation::List { status: None })
            .collect();
        let err = workspace
            .server
            .subagent_task(Parameters(SubagentTaskArgs {
                task: "/plan.md".into(),
                operations,
            }))
            .await
            .err().unwrap();
        assert!(err.message.contains("batch too large"), "{}", err.message);

        let operations: Vec<TaskOperation> = (0..100)
            .map(|_| TaskOperation::List { status: None })
            .collect();
        let ok = workspace
            .server
            .subagent_task(Parameters(SubagentTaskArgs {
                task: "/plan.md".into(),
                operations,
            }))
            .await
            .unwrap();
        assert_eq!(ok.0.results.len(), 100);
    }

    #[tokio::test]
    async fn per_operation_errors_do_not_abort_the_batch() {
        let workspace = TestWorkspace::create();
        workspace.write_doc("/plan.md", "# Plan\n");

        let result = workspace
            .server
            .subagent_task(Parameters(SubagentTaskArgs {
                task: "/plan.md".into(),
                operations: vec![
                    TaskOperation::Edit {
                        slug: Some("ghost".into()),
                        content: "x".into(),
                    },
                    TaskOperation::Create {
                        title: "Real".into(),
                        content: String::new(),
                    },
                ],
            }))
            .await
            .unwrap();

        let batch = result.0;
        assert_eq!(batch.operations_completed, 1);
        assert!(batch.results[0].error.is_some());
        assert!(batch.results[1].task.is_some());
    }

    #[tokio::test]
    async fn coordinator_document_is_created_on_first_call() {
        let workspace = TestWorkspace::create();

        let result = workspace
            .server
            .coordinator_task(Parameters(CoordinatorTaskArgs {
                operations: vec![TaskOperation::Create {
                    title: "Kickoff".into(),
                    content: "- Status: pending\n- Workflow: implement-feature\n".into(),
                }],
            }))
            .await
            .unwrap();
        assert_eq!(result.0.operations_completed, 1);

        let doc = workspace
            .server
            .cache()
            .load_document("/coordinator/active.md")
            .unwrap();
        assert!(doc.content().contains("### Kickoff"));
    }

    #[tokio::test]
    async fn sequential_start_and_complete_flow() {
        let workspace = TestWorkspace::create();
        workspace.write_doc(
            "/coordinator/active.md",
            "# Active Tasks\n\n## Tasks\n\n### Ship It\n\n- Status: pending\n- Workflow: implement-feature\n- Main-Workflow: investigate\n\n### Follow Up\n\n- Status: pending\n",
        );

        let started = workspace
            .server
            .start_coordinator_task(Parameters(StartCoordinatorTaskArgs { task: None }))
            .await
            .unwrap();
        let started = started.0;
        assert_eq!(started.mode, "sequential");
        assert_eq!(started.task.task.slug, "ship-it");
        // Start injects both workflows with full content.
        assert!(started.task.workflow.as_ref().unwrap().content.is_some());
        assert!(started.task.main_workflow.is_some());

        let completed = workspace
            .server
            .complete_coordinator_task(Parameters(CompleteCoordinatorTaskArgs {
                note: "shipped".into(),
                return_next_task: None,
                include_full_workflow: None,
            }))
            .await
            .unwrap();
        let completed = completed.0;
        assert_eq!(completed.completed_task.slug, "ship-it");
        let next = completed.next_task.unwrap();
        assert_eq!(next.task.slug, "follow-up");
        // Compact workflow payloads by default on completion.
        assert!(next.workflow.is_none() || next.workflow.unwrap().content.is_none());
        assert!(completed.archived.is_none());
    }

    #[tokio::test]
    async fn completing_the_last_coordinator_task_archives_the_document() {
        let workspace = TestWorkspace::create();
        workspace.write_doc(
            "/coordinator/active.md",
            "# Active Tasks\n\n## Tasks\n\n### Only One\n\n- Status: pending\n",
        );

        let completed = workspace
            .server
            .complete_coordinator_task(Parameters(CompleteCoordinatorTaskArgs {
                note: "All done".into(),
                return_next_task: None,
                include_full_workflow: None,
            }))
            .await
            .unwrap();
        let completed = completed.0;
        assert_eq!(completed.archived, Some(true));
        let archived_to = completed.archived_to.unwrap();
        assert!(archived_to.starts_with("/archived/coordinator/"));
        assert!(archived_to.ends_with(".md"));
        assert!(completed.next_task.is_none());
    }

    #[tokio::test]
    async fn start_rejects_an_explicit_slug() {
        let workspace = TestWorkspace::create();
        let err = workspace
            .server
            .start_coordinator_task(Parameters(StartCoordinatorTaskArgs {
                task: Some("/coordinator/active.md#ship-it".into()),
            }))
            .await
            .err().unwrap();
        assert!(err.message.contains("rejects"), "{}", err.message);
    }

    #[tokio::test]
    async fn subagent_completion_never_returns_a_next_task() {
        let workspace = TestWorkspace::create();
        workspace.write_doc(
            "/plan.md",
            "# Plan\n\n## Tasks\n\n### Alpha\n\n- Status: pending\n\n### Beta\n\n- Status: pending\n",
        );

        let completed = workspace
            .server
            .complete_subagent_task(Parameters(CompleteSubagentTaskArgs {
                task: "/plan.md#alpha".into(),
                note: "done".into(),
            }))
            .await
            .unwrap();

        let payload = serde_json::to_value(&completed.0).unwrap();
        assert!(payload.get("next_task").is_none());
        assert_eq!(payload["completed_task"]["slug"], "alpha");
        assert!(payload["timestamp"].is_string());
    }

    #[tokio::test]
    async fn view_subagent_task_overview_and_detail() {
        let workspace = TestWorkspace::create();
        workspace.write_doc(
            "/plan.md",
            "# Plan\n\n## Tasks\n\n### Alpha\n\n- Status: pending\n\nsee @/plan.md#beta\n\n### Beta\n\n- Status: completed\n",
        );

        let overview = workspace
            .server
            .view_subagent_task(Parameters(ViewSubagentTaskArgs {
                task: "/plan.md".into(),
            }))
            .await
            .unwrap();
        assert_eq!(overview.0.tasks.len(), 2);
        // List mode omits reference graphs.
        assert!(overview.0.tasks.iter().all(|t| t.referenced_documents.is_none()));

        let detail = workspace
            .server
            .view_subagent_task(Parameters(ViewSubagentTaskArgs {
                task: "/plan.md#alpha".into(),
            }))
            .await
            .unwrap();
        assert_eq!(detail.0.tasks.len(), 1);
        assert!(detail.0.tasks[0].content.is_some());
        assert!(detail.0.tasks[0].referenced_documents.is_some());

        let too_many = format!(
            "/plan.md#{}",
            (0..11).map(|i| format!("t{i}")).collect::<Vec<_>>().join(",")
        );
        let err = workspace
            .server
            .view_subagent_task(Parameters(ViewSubagentTaskArgs { task: too_many }))
            .await
            .err().unwrap();
        assert!(err.message.contains("task count exceeds limit"));
    }

    #[tokio::test]
    async fn coordinator_overview_summarizes_statuses() {
        let workspace = TestWorkspace::create();
        workspace.write_doc(
            "/coordinator/active.md",
            "# Active Tasks\n\n## Tasks\n\n### One\n\n- Status: completed\n\n### Two\n\n- Status: pending\n- Workflow: review\n",
        );

        let result = workspace
            .server
            .view_coordinator_task(Parameters(ViewCoordinatorTaskArgs { slug: None }))
            .await
            .unwrap();
        let view = result.0;
        assert_eq!(view.mode, "overview");
        assert_eq!(view.document, "/coordinator/active.md");
        assert_eq!(view.summary.total_tasks, 2);
        assert_eq!(view.summary.by_status["completed"], 1);
        assert_eq!(view.summary.by_status["pending"], 1);
        assert_eq!(view.summary.tasks_with_workflows, 1);
    }

    #[tokio::test]
    async fn search_tool_round_trips_parameters() {
        let workspace = TestWorkspace::create();
        workspace.write_doc("/a.md", "# A\n\nthe needle is here\n");

        let result = workspace
            .server
            .search_documents(Parameters(SearchDocumentsArgs {
                query: "needle".into(),
                search_type: None,
                scope: None,
                include_context: Some(true),
                context_lines: Some(1),
                max_results: None,
                max_match_length: None,
            }))
            .await
            .unwrap();
        let results = result.0;
        assert_eq!(results.search_type, "fulltext");
        assert_eq!(results.total_matches, 1);
        assert!(results.results[0].matches[0].context.is_some());
    }

    #[tokio::test]
    async fn get_workflow_strips_the_prefix_and_suggests_near_misses() {
        let workspace = TestWorkspace::create();

        let found = workspace
            .server
            .get_workflow(Parameters(GetWorkflowArgs {
                workflow: "implement-feature".into(),
            }))
            .await
            .unwrap();
        match found.0 {
            PromptLookupResult::Found(prompt) => {
                assert_eq!(prompt.name, "implement-feature");
                assert!(prompt.content.is_some());
            }
            other => panic!("expected a prompt, got {other:?}"),
        }

        let missing = workspace
            .server
            .get_workflow(Parameters(GetWorkflowArgs {
                workflow: "implement-featur".into(),
            }))
            .await
            .unwrap();
        match missing.0 {
            PromptLookupResult::Missing {
                available,
                did_you_mean,
                ..
            } => {
                assert!(available.contains(&"implement-feature".to_string()));
                assert_eq!(did_you_mean.as_deref(), Some("implement-feature"));
            }
            other => panic!("expected a miss, got {other:?}"),
        }
    }
}
