use std::fs;
use std::sync::Arc;

use regex::Regex;
use taskdoc::{DocumentCache, TaskEngine, TaskStatus, TaskdocError, WorkspacePaths};
use tempfile::TempDir;

fn make_engine() -> (TempDir, Arc<DocumentCache>, TaskEngine) {
    let temp = tempfile::tempdir().unwrap();
    fs::create_dir_all(temp.path().join("docs")).unwrap();
    fs::create_dir_all(temp.path().join("coordinator")).unwrap();
    let cache = Arc::new(DocumentCache::new(WorkspacePaths::new(temp.path())));
    let engine = TaskEngine::new(cache.clone());
    (temp, cache, engine)
}

fn write_doc(cache: &DocumentCache, path: &str, content: &str) {
    let physical = cache.workspace().resolve(path).unwrap();
    fs::create_dir_all(physical.parent().unwrap()).unwrap();
    fs::write(physical, content).unwrap();
}

#[test]
fn creating_the_first_task_builds_the_tasks_section() {
    let (_temp, cache, engine) = make_engine();
    write_doc(&cache, "/plan.md", "# My Doc\n\nOverview.\n");

    let (task, first) = engine
        .create_task("/plan.md", "Task Title", "- Status: pending\n\nDo the thing.")
        .unwrap();
    assert!(first);
    assert_eq!(task.slug, "task-title");
    assert_eq!(task.depth, 3);
    assert_eq!(task.full_path, "/plan.md#task-title");

    let doc = cache.load_document("/plan.md").unwrap();
    let content = doc.content();
    assert!(content.contains("## Tasks"));
    assert!(content.contains("### Task Title"));

    let (_, second) = engine.create_task("/plan.md", "Another", "").unwrap();
    assert!(!second);
}

#[test]
fn tasks_are_only_h3_headings_under_the_tasks_section() {
    let (_temp, cache, engine) = make_engine();
    write_doc(
        &cache,
        "/plan.md",
        "# Plan\n\n## Notes\n\n### Not A Task\n\ntext\n\n## Tasks\n\n### Real Task\n\n- Status: pending\n",
    );

    let tasks = engine.list_tasks("/plan.md", None).unwrap();
    assert_eq!(tasks.len(), 1);
    assert_eq!(tasks[0].slug, "real-task");

    let err = engine.get_task("/plan.md", "not-a-task", false).unwrap_err();
    assert!(matches!(err, TaskdocError::TaskNotFound { .. }));
}

#[test]
fn list_filters_by_status_and_flags_references() {
    let (_temp, cache, engine) = make_engine();
    write_doc(
        &cache,
        "/plan.md",
        "# Plan\n\n## Tasks\n\n### One\n\n- Status: completed\n\n### Two\n\n- Status: pending\n\nsee @/api/auth.md\n",
    );

    let all = engine.list_tasks("/plan.md", None).unwrap();
    assert_eq!(all.len(), 2);
    assert!(!all[0].has_references);
    assert!(all[1].has_references);

    let pending = engine
        .list_tasks("/plan.md", Some(&TaskStatus::Pending))
        .unwrap();
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].slug, "two");
}

#[test]
fn completion_rewrites_status_and_appends_stamp_lines() {
    let (_temp, cache, engine) = make_engine();
    write_doc(
        &cache,
        "/plan.md",
        "# Plan\n\n## Tasks\n\n### Fix Login\n\n**Status:** in_progress\n\nDetails here.\n",
    );

    let completion = engine
        .complete_task("/plan.md", "fix-login", "All done")
        .unwrap();
    assert_eq!(completion.slug, "fix-login");
    assert_eq!(completion.note, "All done");
    assert!(Regex::new(r"^\d{4}-\d{2}-\d{2}$")
        .unwrap()
        .is_match(&completion.completed_date));

    let doc = cache.load_document("/plan.md").unwrap();
    let body = doc.section_body("fix-login").unwrap();
    // Marker style preserved, stamp lines appended with the dash marker.
    assert_eq!(body.matches("**Status:** completed").count(), 1);
    assert_eq!(body.matches("- Completed: ").count(), 1);
    assert!(body.trim_end().ends_with("- Note: All done"));
    assert!(body.contains("Details here."));
}

#[test]
fn completion_without_a_status_field_prepends_a_bold_one() {
    let (_temp, cache, engine) = make_engine();
    write_doc(
        &cache,
        "/plan.md",
        "# Plan\n\n## Tasks\n\n### Loose Task\n\nJust prose.\n",
    );

    engine.complete_task("/plan.md", "loose-task", "ok").unwrap();

    let doc = cache.load_document("/plan.md").unwrap();
    let body = doc.section_body("loose-task").unwrap();
    assert!(body.trim_start().starts_with("**Status:** completed"));
    assert!(body.contains("Just prose."));
}

#[test]
fn next_available_task_follows_document_order() {
    let (_temp, cache, engine) = make_engine();
    write_doc(
        &cache,
        "/plan.md",
        "# Plan\n\n## Tasks\n\n### Done\n\n- Status: completed\n\n### Second\n\n- Status: pending\n\n### Third\n\n- Status: pending\n",
    );

    let next = engine.find_next_available_task("/plan.md").unwrap().unwrap();
    assert_eq!(next.slug, "second");

    let completion = engine.complete_task("/plan.md", "second", "n").unwrap();
    assert_eq!(completion.next_task.unwrap().slug, "third");
}

#[test]
fn start_marks_the_next_task_in_progress() {
    let (_temp, cache, engine) = make_engine();
    write_doc(
        &cache,
        "/coordinator/active.md",
        "# Active Tasks\n\n## Tasks\n\n### First Job\n\n- Status: pending\n- Workflow: implement-feature\n",
    );

    let task = engine.start_next_task("/coordinator/active.md").unwrap();
    assert_eq!(task.slug, "first-job");
    assert_eq!(task.status, TaskStatus::InProgress);
    assert_eq!(task.workflow_name.as_deref(), Some("implement-feature"));

    let doc = cache.load_document("/coordinator/active.md").unwrap();
    assert!(doc
        .section_body("first-job")
        .unwrap()
        .contains("- Status: in_progress"));
}

#[test]
fn main_workflow_comes_from_the_first_task_only() {
    let (_temp, cache, engine) = make_engine();
    write_doc(
        &cache,
        "/plan.md",
        "# Plan\n\n## Tasks\n\n### Alpha\n\n- Status: pending\n- Main-Workflow: project-loop\n\n### Beta\n\n- Status: pending\n- Main-Workflow: ignored-on-later-tasks\n",
    );

    let beta = engine.get_task("/plan.md", "beta", false).unwrap();
    assert_eq!(beta.main_workflow_name.as_deref(), Some("project-loop"));
}

#[test]
fn draining_a_coordinator_document_archives_it() {
    let (_temp, cache, engine) = make_engine();
    write_doc(
        &cache,
        "/coordinator/active.md",
        "# Active Tasks\n\n## Tasks\n\n### Only Task\n\n- Status: pending\n",
    );

    let completion = engine
        .complete_task("/coordinator/active.md", "only-task", "All done")
        .unwrap();
    assert!(completion.archived);
    assert!(completion.next_task.is_none());

    let archived_to = completion.archived_to.unwrap();
    let pattern =
        Regex::new(r"^/archived/coordinator/\d{4}-\d{2}-\d{2}T\d{2}-\d{2}-\d{2}\.md$").unwrap();
    assert!(pattern.is_match(&archived_to), "{archived_to}");

    // The original virtual path is unmapped; the archive target exists.
    assert!(cache.get_document("/coordinator/active.md").unwrap().is_none());
    let archived = cache.load_document(&archived_to).unwrap();
    assert!(archived.content().contains("### Only Task"));
}

#[test]
fn docs_namespace_documents_never_archive() {
    let (_temp, cache, engine) = make_engine();
    write_doc(
        &cache,
        "/plan.md",
        "# Plan\n\n## Tasks\n\n### Solo\n\n- Status: pending\n",
    );

    let completion = engine.complete_task("/plan.md", "solo", "n").unwrap();
    assert!(!completion.archived);
    assert!(completion.archived_to.is_none());
    assert!(cache.get_document("/plan.md").unwrap().is_some());
}

#[test]
fn starting_with_no_pending_tasks_reports_no_available_tasks() {
    let (_temp, cache, engine) = make_engine();
    write_doc(
        &cache,
        "/coordinator/active.md",
        "# Active Tasks\n\n## Tasks\n\n### Done\n\n- Status: completed\n",
    );

    let err = engine.start_next_task("/coordinator/active.md").unwrap_err();
    assert!(matches!(err, TaskdocError::NoAvailableTasks(_)));
}

#[test]
fn edit_replaces_the_task_body() {
    let (_temp, cache, engine) = make_engine();
    write_doc(
        &cache,
        "/plan.md",
        "# Plan\n\n## Tasks\n\n### Item\n\n- Status: pending\n\nold text\n",
    );

    let task = engine
        .edit_task("/plan.md", "item", "- Status: in_progress\n\nnew text")
        .unwrap();
    assert_eq!(task.status, TaskStatus::InProgress);
    assert!(task.content.contains("new text"));

    let doc = cache.load_document("/plan.md").unwrap();
    assert!(!doc.section_body("item").unwrap().contains("old text"));
}
