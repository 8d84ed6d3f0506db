//! Higher-level task operations on top of the section editor.
//!
//! A task is an H3 heading whose nearest H2 ancestor is titled `Tasks`
//! (case-insensitive). Task state is durable only as markdown; `TaskData`
//! values are constructed per response.

use std::fs;
use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;

use crate::address::parse_document_address;
use crate::document::{CachedDocument, DocumentCache};
use crate::editor::{InsertPosition, SectionEditor};
use crate::error::TaskdocError;
use crate::reference::{
    DEFAULT_REFERENCE_DEPTH, ReferencedDocument, has_references, load_referenced_documents,
};
use crate::workspace::is_coordinator_path;

use super::metadata::{
    self, COMPLETED_LABEL, FieldMarker, MAIN_WORKFLOW_LABEL, NOTE_LABEL, STATUS_LABEL,
    TaskStatus, WORKFLOW_LABEL,
};

/// Maximum operations per batch invocation.
pub const MAX_BATCH_OPERATIONS: usize = 100;

/// Full task payload for detail responses.
#[derive(Debug, Clone, Serialize)]
pub struct TaskData {
    pub slug: String,
    pub title: String,
    pub content: String,
    pub status: TaskStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub link: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub linked_document: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub workflow_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub main_workflow_name: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub referenced_documents: Vec<ReferencedDocument>,
    pub depth: u8,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent: Option<String>,
    pub word_count: usize,
    pub full_path: String,
}

/// Compact task payload for list responses. `referenced_documents` is
/// deliberately omitted; `has_references` signals their presence.
#[derive(Debug, Clone, Serialize)]
pub struct TaskSummary {
    pub slug: String,
    pub title: String,
    pub status: TaskStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub workflow_name: Option<String>,
    pub has_workflow: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub main_workflow_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub link: Option<String>,
    pub has_references: bool,
    pub word_count: usize,
    pub full_path: String,
}

/// Result of a completion, including the archive outcome for drained
/// coordinator documents.
#[derive(Debug, Clone, Serialize)]
pub struct TaskCompletion {
    pub slug: String,
    pub title: String,
    pub note: String,
    pub completed_date: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_task: Option<TaskData>,
    pub archived: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub archived_to: Option<String>,
}

#[derive(Clone)]
pub struct TaskEngine {
    cache: Arc<DocumentCache>,
    editor: SectionEditor,
    reference_depth: usize,
}

impl TaskEngine {
    pub fn new(cache: Arc<DocumentCache>) -> Self {
        let editor = SectionEditor::new(cache.clone());
        Self {
            cache,
            editor,
            reference_depth: DEFAULT_REFERENCE_DEPTH,
        }
    }

    pub fn with_reference_depth(mut self, depth: usize) -> Self {
        self.reference_depth = depth;
        self
    }

    pub fn cache(&self) -> &Arc<DocumentCache> {
        &self.cache
    }

    pub fn editor(&self) -> &SectionEditor {
        &self.editor
    }

    /// Ensures the document has a `Tasks` section, creating one under the H1
    /// when missing.
    pub fn ensure_tasks_section(&self, doc_path: &str) -> Result<String, TaskdocError> {
        self.editor.ensure_tasks_section(doc_path)
    }

    /// Creates a task and returns it together with a flag marking whether it
    /// is the document's first task.
    pub fn create_task(
        &self,
        doc_path: &str,
        title: &str,
        body: &str,
    ) -> Result<(TaskData, bool), TaskdocError> {
        let tasks_slug = self.ensure_tasks_section(doc_path)?;
        let doc = self.cache.load_document(doc_path)?;
        let was_empty = doc.task_heading_indexes().is_empty();
        drop(doc);

        let slug = self.editor.insert_section(
            doc_path,
            &tasks_slug,
            InsertPosition::AppendChild,
            title,
            body,
        )?;

        let doc = self.cache.load_document(doc_path)?;
        let index = self.task_index(&doc, doc_path, &slug)?;
        Ok((self.build_task(&doc, index, true), was_empty))
    }

    /// Replace-body edit of an existing task.
    pub fn edit_task(
        &self,
        doc_path: &str,
        slug: &str,
        new_body: &str,
    ) -> Result<TaskData, TaskdocError> {
        let doc = self.cache.load_document(doc_path)?;
        self.task_index(&doc, doc_path, slug)?;
        drop(doc);

        self.editor.replace_body(doc_path, slug, new_body)?;

        let doc = self.cache.load_document(doc_path)?;
        let index = self.task_index(&doc, doc_path, slug)?;
        Ok(self.build_task(&doc, index, true))
    }

    /// Full task payload, optionally with its loaded reference graph.
    pub fn get_task(
        &self,
        doc_path: &str,
        slug: &str,
        include_references: bool,
    ) -> Result<TaskData, TaskdocError> {
        let doc = self.cache.load_document(doc_path)?;
        let index = self.task_index(&doc, doc_path, slug)?;
        Ok(self.build_task(&doc, index, include_references))
    }

    /// Summaries of every task in the document, optionally filtered by
    /// status.
    pub fn list_tasks(
        &self,
        doc_path: &str,
        status_filter: Option<&TaskStatus>,
    ) -> Result<Vec<TaskSummary>, TaskdocError> {
        let doc = self.cache.load_document(doc_path)?;
        let main_workflow = self.main_workflow_name(&doc);
        Ok(doc
            .task_heading_indexes()
            .into_iter()
            .filter_map(|index| {
                let summary = self.build_summary(&doc, index, main_workflow.clone());
                match status_filter {
                    Some(filter) if summary.status != *filter => None,
                    _ => Some(summary),
                }
            })
            .collect())
    }

    /// First task in document order whose status is not `completed`.
    pub fn find_next_available_task(
        &self,
        doc_path: &str,
    ) -> Result<Option<TaskData>, TaskdocError> {
        let doc = self.cache.load_document(doc_path)?;
        Ok(self.next_available_index(&doc).map(|index| self.build_task(&doc, index, true)))
    }

    /// Sequential start: picks the next available task and marks it
    /// `in_progress`, preserving the existing status marker.
    pub fn start_next_task(&self, doc_path: &str) -> Result<TaskData, TaskdocError> {
        let doc = self.cache.load_document(doc_path)?;
        let index = self
            .next_available_index(&doc)
            .ok_or_else(|| TaskdocError::NoAvailableTasks(doc_path.to_string()))?;
        let slug = doc.headings[index].slug.clone();
        let body = doc.section_body(&slug).unwrap_or_default().to_string();
        drop(doc);

        let updated = set_status(&body, TaskStatus::InProgress.as_str());
        self.editor.replace_body(doc_path, &slug, &updated)?;

        let doc = self.cache.load_document(doc_path)?;
        let index = self.task_index(&doc, doc_path, &slug)?;
        Ok(self.build_task(&doc, index, true))
    }

    /// Completion lifecycle: set status, stamp completion lines, pick the
    /// next task, and archive drained coordinator documents.
    pub fn complete_task(
        &self,
        doc_path: &str,
        slug: &str,
        note: &str,
    ) -> Result<TaskCompletion, TaskdocError> {
        let doc = self.cache.load_document(doc_path)?;
        let index = self.task_index(&doc, doc_path, slug)?;
        let title = doc.headings[index].title.clone();
        let body = doc.section_body(slug).unwrap_or_default().to_string();
        drop(doc);

        let completed_date = Utc::now().format("%Y-%m-%d").to_string();
        let mut updated = set_status(&body, TaskStatus::Completed.as_str());
        updated = metadata::append_field(&updated, COMPLETED_LABEL, &completed_date);
        updated = metadata::append_field(&updated, NOTE_LABEL, note);
        self.editor.replace_body(doc_path, slug, &updated)?;

        let doc = self.cache.load_document(doc_path)?;
        let next_task = self
            .next_available_index(&doc)
            .map(|idx| self.build_task(&doc, idx, true));

        let mut archived = false;
        let mut archived_to = None;
        if next_task.is_none() && is_coordinator_path(doc_path) {
            drop(doc);
            archived_to = Some(self.archive_document(doc_path)?);
            archived = true;
        }

        Ok(TaskCompletion {
            slug: slug.to_string(),
            title,
            note: note.to_string(),
            completed_date,
            next_task,
            archived,
            archived_to,
        })
    }

    /// The document's main workflow: the `Main-Workflow:` field of the first
    /// task under `Tasks`, located by document order rather than by slug.
    pub fn main_workflow_name(&self, doc: &CachedDocument) -> Option<String> {
        let first = doc.task_heading_indexes().into_iter().next()?;
        let slug = &doc.headings[first].slug;
        let body = doc.section_body(slug)?;
        metadata::extract_field(body, MAIN_WORKFLOW_LABEL)
            .map(|field| field.value)
            .filter(|value| !value.is_empty())
    }

    /// Moves a drained document under `archived/{original-namespace}/` with a
    /// UTC timestamp name; collisions retry with a numeric suffix. Returns
    /// the new virtual path.
    fn archive_document(&self, doc_path: &str) -> Result<String, TaskdocError> {
        let guard = self.cache.write_guard(doc_path);
        let _held = guard.lock();

        let address = parse_document_address(doc_path)?;
        let source = self.cache.workspace().resolve(doc_path)?;
        if !source.is_file() {
            return Err(TaskdocError::DocumentNotFound(doc_path.to_string()));
        }

        let stamp = Utc::now().format("%Y-%m-%dT%H-%M-%S").to_string();
        let mut attempt = 1usize;
        let archived_virtual = loop {
            let name = if attempt == 1 {
                format!("{stamp}.md")
            } else {
                format!("{stamp}-{attempt}.md")
            };
            let candidate = format!("/archived/{}/{name}", address.namespace);
            let physical = self.cache.workspace().resolve(&candidate)?;
            if !physical.exists() {
                break candidate;
            }
            attempt += 1;
        };

        let destination = self.cache.workspace().resolve(&archived_virtual)?;
        if let Some(parent) = destination.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::rename(&source, &destination)?;
        self.cache.invalidate_document(doc_path);
        Ok(archived_virtual)
    }

    fn next_available_index(&self, doc: &CachedDocument) -> Option<usize> {
        doc.task_heading_indexes().into_iter().find(|index| {
            let slug = &doc.headings[*index].slug;
            let status = doc
                .section_body(slug)
                .and_then(|body| metadata::extract_field(body, STATUS_LABEL))
                .map(|field| TaskStatus::parse(&field.value))
                .unwrap_or(TaskStatus::Pending);
            !status.is_completed()
        })
    }

    /// Resolves `slug` to a task heading index. A slug that exists but is
    /// not a task reports `TaskNotFound` as well.
    fn task_index(
        &self,
        doc: &CachedDocument,
        doc_path: &str,
        slug: &str,
    ) -> Result<usize, TaskdocError> {
        let index = *doc.slug_index.get(slug).ok_or_else(|| {
            TaskdocError::TaskNotFound {
                document: doc_path.to_string(),
                slug: slug.to_string(),
            }
        })?;
        if !doc.is_task_heading(index) {
            return Err(TaskdocError::TaskNotFound {
                document: doc_path.to_string(),
                slug: slug.to_string(),
            });
        }
        Ok(index)
    }

    fn build_task(
        &self,
        doc: &CachedDocument,
        index: usize,
        include_references: bool,
    ) -> TaskData {
        let heading = &doc.headings[index];
        let body = doc.section_body(&heading.slug).unwrap_or_default();
        let status = task_status(body);
        let workflow_name = field_value(body, WORKFLOW_LABEL);
        let referenced_documents = if include_references {
            load_referenced_documents(
                self.cache.as_ref(),
                body,
                &doc.metadata.namespace,
                self.reference_depth,
            )
        } else {
            Vec::new()
        };

        TaskData {
            slug: heading.slug.clone(),
            title: heading.title.clone(),
            content: body.trim().to_string(),
            status,
            link: metadata::extract_link(body),
            linked_document: first_linked_document(body),
            workflow_name,
            main_workflow_name: self.main_workflow_name(doc),
            referenced_documents,
            depth: heading.depth,
            parent: heading
                .parent_index
                .map(|parent| doc.headings[parent].slug.clone()),
            word_count: body.split_whitespace().count(),
            full_path: format!("{}#{}", doc.metadata.path, heading.slug),
        }
    }

    fn build_summary(
        &self,
        doc: &CachedDocument,
        index: usize,
        main_workflow_name: Option<String>,
    ) -> TaskSummary {
        let heading = &doc.headings[index];
        let body = doc.section_body(&heading.slug).unwrap_or_default();
        let workflow_name = field_value(body, WORKFLOW_LABEL);

        TaskSummary {
            slug: heading.slug.clone(),
            title: heading.title.clone(),
            status: task_status(body),
            has_workflow: workflow_name.is_some(),
            workflow_name,
            main_workflow_name,
            link: metadata::extract_link(body),
            has_references: has_references(body),
            word_count: body.split_whitespace().count(),
            full_path: format!("{}#{}", doc.metadata.path, heading.slug),
        }
    }
}

fn task_status(body: &str) -> TaskStatus {
    metadata::extract_field(body, STATUS_LABEL)
        .map(|field| TaskStatus::parse(&field.value))
        .unwrap_or(TaskStatus::Pending)
}

fn field_value(body: &str, label: &str) -> Option<String> {
    metadata::extract_field(body, label)
        .map(|field| field.value)
        .filter(|value| !value.is_empty())
}

/// First absolute `@/path.md` reference in the body, if any.
fn first_linked_document(body: &str) -> Option<String> {
    crate::reference::extract_references(body, crate::address::ROOT_NAMESPACE)
        .into_iter()
        .find_map(|reference| match reference.target {
            crate::reference::ReferenceTarget::Document { path, .. }
                if reference.raw.starts_with("@/") =>
            {
                Some(path)
            }
            _ => None,
        })
}

/// Sets `Status:` preserving the existing marker, or prepends a bold-format
/// entry when the field is missing.
fn set_status(body: &str, status: &str) -> String {
    metadata::update_field(body, STATUS_LABEL, status)
        .unwrap_or_else(|| metadata::prepend_field(body, FieldMarker::Bold, STATUS_LABEL, status))
}
