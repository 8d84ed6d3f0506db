//! Built-in workflow and guide prompt catalog.
//!
//! Prompt names carry a `workflow_` or `guide_` registry prefix; the tool
//! layer strips it before handing prompts back to callers.

use taskdoc::{StaticWorkflowRegistry, WorkflowPrompt};

pub fn builtin_registry() -> StaticWorkflowRegistry {
    StaticWorkflowRegistry::new(builtin_prompts())
}

fn builtin_prompts() -> Vec<WorkflowPrompt> {
    vec![
        WorkflowPrompt {
            name: "workflow_implement-feature".into(),
            description: "Step-by-step implementation flow for a planned feature task.".into(),
            content: "\
1. Read the task body and every referenced document before touching code.\n\
2. Sketch the change as a short list of edits and confirm it against the task title.\n\
3. Implement in small steps, keeping the task document updated with findings.\n\
4. Complete the task with a note summarizing what changed and what was deferred.\n"
                .into(),
            when_to_use: vec![
                "A task describes a concrete feature to build".into(),
                "The task body links to design documents".into(),
            ],
        },
        WorkflowPrompt {
            name: "workflow_investigate".into(),
            description: "Evidence-first investigation flow for bugs and open questions.".into(),
            content: "\
1. Restate the question the task is asking in one sentence.\n\
2. Collect evidence from the referenced documents and record it under the task.\n\
3. Write the conclusion into the task body before completing it, so the note can stay short.\n"
                .into(),
            when_to_use: vec!["A task asks a question rather than naming a deliverable".into()],
        },
        WorkflowPrompt {
            name: "workflow_review".into(),
            description: "Checklist-driven review of work another task produced.".into(),
            content: "\
1. List the acceptance criteria from the task body.\n\
2. Check each criterion against the produced artifact and note deviations.\n\
3. Either complete the task with a pass note, or create follow-up tasks for each deviation.\n"
                .into(),
            when_to_use: vec!["A task verifies the output of a previous task".into()],
        },
        WorkflowPrompt {
            name: "guide_getting-started".into(),
            description: "How documents, sections, and tasks fit together.".into(),
            content: "\
Documents live under virtual paths like /api/auth.md. Each document is a tree of\n\
sections addressed by slug; tasks are H3 sections under a `## Tasks` heading.\n\
Use browse_documents to explore, view_document for structure, and the task tools\n\
to create and complete work items.\n"
                .into(),
            when_to_use: vec!["First contact with a taskdoc workspace".into()],
        },
        WorkflowPrompt {
            name: "guide_task-authoring".into(),
            description: "Conventions for task bodies and their metadata fields.".into(),
            content: "\
Task bodies carry metadata lines: `- Status: pending`, `- Workflow: <name>`, and\n\
optionally `- Main-Workflow: <name>` on the document's first task. Reference other\n\
documents with @/path.md#slug so reviewers can follow the graph.\n"
                .into(),
            when_to_use: vec!["Writing new tasks by hand".into()],
        },
    ]
}
