//! Structural mutations on cached documents.
//!
//! Every write goes through here: operations lock the per-document guard,
//! splice the current content, persist through the cache (which invalidates
//! the entry), and return. Readers keep the previous snapshot until the
//! write publishes.

use std::sync::Arc;

use crate::document::{CachedDocument, DocumentCache, slugify_heading};
use crate::error::TaskdocError;

/// Where to place an inserted section relative to its anchor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertPosition {
    /// Same depth as the anchor, before it.
    Before,
    /// Same depth as the anchor, after its entire sub-tree.
    After,
    /// One level deeper than the anchor, at the end of its sub-tree.
    AppendChild,
}

/// Title given to auto-created task container sections.
pub const TASKS_SECTION_HEADING: &str = "Tasks";

#[derive(Clone)]
pub struct SectionEditor {
    cache: Arc<DocumentCache>,
}

impl SectionEditor {
    pub fn new(cache: Arc<DocumentCache>) -> Self {
        Self { cache }
    }

    pub fn cache(&self) -> &Arc<DocumentCache> {
        &self.cache
    }

    /// Creates `path` with a single H1 title when it does not exist yet.
    pub fn create_document(&self, path: &str, title: &str) -> Result<bool, TaskdocError> {
        let guard = self.cache.write_guard(path);
        let _held = guard.lock();
        if self.cache.document_exists(path) {
            return Ok(false);
        }
        self.cache.write_document(path, &format!("# {title}\n"))?;
        Ok(true)
    }

    /// Inserts a new section relative to `anchor_slug` and returns the slug
    /// of the inserted heading.
    pub fn insert_section(
        &self,
        path: &str,
        anchor_slug: &str,
        position: InsertPosition,
        title: &str,
        body: &str,
    ) -> Result<String, TaskdocError> {
        let guard = self.cache.write_guard(path);
        let _held = guard.lock();

        let doc = self.cache.load_document(path)?;
        let anchor = doc
            .heading(anchor_slug)
            .ok_or_else(|| section_not_found(path, anchor_slug))?;
        let span = doc
            .section_span(anchor_slug)
            .ok_or_else(|| section_not_found(path, anchor_slug))?;

        let depth = match position {
            InsertPosition::Before | InsertPosition::After => anchor.depth,
            InsertPosition::AppendChild => (anchor.depth + 1).min(6),
        };
        let offset = match position {
            InsertPosition::Before => span.heading_start,
            InsertPosition::After | InsertPosition::AppendChild => span.end,
        };

        let slug = unique_slug(&doc, title);
        let block = format_section_block(depth, title, body);
        let content = splice_block(doc.content(), offset, &block);
        self.cache.write_document(path, &content)?;
        Ok(slug)
    }

    /// Replaces the immediate body of a section, leaving the heading and any
    /// child sections intact.
    pub fn replace_body(
        &self,
        path: &str,
        slug: &str,
        new_body: &str,
    ) -> Result<(), TaskdocError> {
        let guard = self.cache.write_guard(path);
        let _held = guard.lock();

        let doc = self.cache.load_document(path)?;
        let (body_start, body_end) = immediate_body_range(&doc, slug)
            .ok_or_else(|| section_not_found(path, slug))?;

        let content = doc.content();
        let at_eof = body_end == content.len();
        let mut next = String::with_capacity(content.len() + new_body.len());
        next.push_str(&content[..body_start]);
        next.push_str(&render_body(new_body, at_eof));
        next.push_str(&content[body_end..]);

        self.cache.write_document(path, &next)
    }

    /// Changes a heading title. The slug is regenerated; referrers are not
    /// rewritten (broken references are discoverable through analysis).
    pub fn rename_section(
        &self,
        path: &str,
        slug: &str,
        new_title: &str,
    ) -> Result<String, TaskdocError> {
        let guard = self.cache.write_guard(path);
        let _held = guard.lock();

        let doc = self.cache.load_document(path)?;
        let heading = doc
            .heading(slug)
            .ok_or_else(|| section_not_found(path, slug))?;
        let span = doc
            .section_span(slug)
            .ok_or_else(|| section_not_found(path, slug))?;

        let new_slug = unique_slug(&doc, new_title);
        let content = doc.content();
        let line = format!("{} {}", "#".repeat(heading.depth as usize), new_title);

        let mut next = String::with_capacity(content.len() + line.len());
        next.push_str(&content[..span.heading_start]);
        next.push_str(&line);
        if content[span.heading_start..span.body_start].ends_with('\n') {
            next.push('\n');
        }
        next.push_str(&content[span.body_start..]);

        self.cache.write_document(path, &next)?;
        Ok(new_slug)
    }

    /// Removes a heading and its entire sub-tree.
    pub fn delete_section(&self, path: &str, slug: &str) -> Result<(), TaskdocError> {
        let guard = self.cache.write_guard(path);
        let _held = guard.lock();

        let doc = self.cache.load_document(path)?;
        let span = doc
            .section_span(slug)
            .ok_or_else(|| section_not_found(path, slug))?;

        let content = doc.content();
        let mut next = String::with_capacity(content.len() - (span.end - span.heading_start));
        next.push_str(&content[..span.heading_start]);
        next.push_str(&content[span.end..]);

        self.cache.write_document(path, &next)
    }

    /// Returns the slug of the document's `Tasks` section, creating a depth-2
    /// section under the H1 title when absent. Detection is case-insensitive
    /// on the title; a document without an H1 cannot host tasks.
    pub fn ensure_tasks_section(&self, path: &str) -> Result<String, TaskdocError> {
        let doc = self.cache.load_document(path)?;
        if let Some(index) = doc.tasks_section_index() {
            return Ok(doc.headings[index].slug.clone());
        }
        let title_index = doc
            .title_heading_index()
            .ok_or_else(|| TaskdocError::MissingDocumentTitle(path.to_string()))?;
        let title_slug = doc.headings[title_index].slug.clone();
        drop(doc);
        self.insert_section(
            path,
            &title_slug,
            InsertPosition::AppendChild,
            TASKS_SECTION_HEADING,
            "",
        )
    }
}

fn section_not_found(path: &str, slug: &str) -> TaskdocError {
    TaskdocError::SectionNotFound {
        document: path.to_string(),
        slug: slug.to_string(),
    }
}

/// First free slug for `title` within `doc`, matching the suffix scheme the
/// parser uses for duplicate headings.
fn unique_slug(doc: &CachedDocument, title: &str) -> String {
    let base = slugify_heading(title);
    if !doc.slug_index.contains_key(&base) {
        return base;
    }
    let mut n = 1usize;
    loop {
        let candidate = format!("{base}-{n}");
        if !doc.slug_index.contains_key(&candidate) {
            return candidate;
        }
        n += 1;
    }
}

/// Byte range of a section's immediate body: everything after the heading
/// line up to the first child heading (or the end of the sub-tree).
fn immediate_body_range(doc: &CachedDocument, slug: &str) -> Option<(usize, usize)> {
    let index = *doc.slug_index.get(slug)?;
    let span = doc.span_at(index);
    let body_end = doc
        .headings
        .get(index + 1)
        .map(|next| doc.span_at(next.index).heading_start)
        .filter(|start| *start < span.end)
        .unwrap_or(span.end);
    Some((span.body_start, body_end))
}

fn format_section_block(depth: u8, title: &str, body: &str) -> String {
    let mut block = format!("{} {}\n", "#".repeat(depth as usize), title);
    let body = body.trim_end();
    if !body.trim().is_empty() {
        block.push('\n');
        block.push_str(body);
        block.push('\n');
    }
    block
}

fn render_body(body: &str, at_eof: bool) -> String {
    let trimmed = body.trim();
    if trimmed.is_empty() {
        return "\n".to_string();
    }
    if at_eof {
        format!("\n{trimmed}\n")
    } else {
        format!("\n{trimmed}\n\n")
    }
}

/// Splices `block` into `content` at `offset`, keeping one blank line of
/// separation on both sides.
fn splice_block(content: &str, offset: usize, block: &str) -> String {
    let before = &content[..offset];
    let after = &content[offset..];

    let mut out = String::with_capacity(content.len() + block.len() + 4);
    out.push_str(before.trim_end_matches('\n'));
    if !out.is_empty() {
        out.push_str("\n\n");
    }
    out.push_str(block);
    let after = after.trim_start_matches('\n');
    if !after.is_empty() {
        out.push('\n');
        out.push_str(after);
    }
    out
}
