//! Parsed markdown documents and the persistent-memory cache that owns them.

mod cache;
mod parse;
mod toc;

pub use cache::DocumentCache;
pub use parse::{content_hash, slugify_heading};
pub use toc::TOC_DEBOUNCE;

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::analysis::keywords::Keyword;

/// Normalized title that marks a document's task container section.
pub const TASKS_SECTION_TITLE: &str = "tasks";

/// Heading depth at which tasks live (H3 under the H2 `Tasks` section).
pub const TASK_DEPTH: u8 = 3;

/// One heading in document order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Heading {
    pub slug: String,
    pub title: String,
    /// 1..=6.
    pub depth: u8,
    /// Position in document order.
    pub index: usize,
    /// Index of the nearest prior heading with strictly smaller depth.
    pub parent_index: Option<usize>,
}

/// Byte range of a section: the heading line plus everything up to (but not
/// including) the next heading of equal-or-lesser depth.
#[derive(Debug, Clone, Copy)]
pub struct SectionSpan {
    pub heading_start: usize,
    /// First byte after the heading line.
    pub body_start: usize,
    pub end: usize,
}

/// Inline link tallies for a document.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct LinkCounts {
    pub total: usize,
    pub internal: usize,
    pub external: usize,
}

/// Metadata snapshot attached to a cached document.
#[derive(Debug, Clone)]
pub struct DocumentMetadata {
    pub path: String,
    pub title: Option<String>,
    pub namespace: String,
    pub last_modified: DateTime<Utc>,
    pub content_hash: String,
    pub word_count: usize,
    pub link_counts: LinkCounts,
    pub code_block_count: usize,
    /// Monotonic generation bumped on every (re)parse.
    pub cache_generation: u64,
    pub keywords: Vec<Keyword>,
    pub fingerprint_generated: bool,
}

/// Immutable parsed snapshot of one markdown document.
///
/// Snapshots are replaced atomically in the cache; readers holding an `Arc`
/// keep a consistent view across concurrent mutations.
#[derive(Debug)]
pub struct CachedDocument {
    pub metadata: DocumentMetadata,
    pub headings: Vec<Heading>,
    /// Rendered outline, one line per heading.
    pub toc: Vec<String>,
    pub slug_index: HashMap<String, usize>,
    sections: Vec<SectionSpan>,
    content: String,
    last_accessed: AtomicU64,
}

impl CachedDocument {
    pub(crate) fn new(
        metadata: DocumentMetadata,
        headings: Vec<Heading>,
        toc: Vec<String>,
        slug_index: HashMap<String, usize>,
        sections: Vec<SectionSpan>,
        content: String,
    ) -> Self {
        Self {
            metadata,
            headings,
            toc,
            slug_index,
            sections,
            content,
            last_accessed: AtomicU64::new(now_unix_ms()),
        }
    }

    pub fn content(&self) -> &str {
        &self.content
    }

    pub fn heading(&self, slug: &str) -> Option<&Heading> {
        self.slug_index.get(slug).map(|idx| &self.headings[*idx])
    }

    pub fn section_span(&self, slug: &str) -> Option<SectionSpan> {
        self.slug_index.get(slug).map(|idx| self.sections[*idx])
    }

    pub(crate) fn span_at(&self, index: usize) -> SectionSpan {
        self.sections[index]
    }

    /// Full section text including the heading line.
    pub fn section_content(&self, slug: &str) -> Option<&str> {
        self.section_span(slug)
            .map(|span| &self.content[span.heading_start..span.end])
    }

    /// Section text after the heading line.
    pub fn section_body(&self, slug: &str) -> Option<&str> {
        self.section_span(slug)
            .map(|span| &self.content[span.body_start..span.end])
    }

    /// Index of the `Tasks` container heading (depth 2, case-insensitive
    /// title match), if present.
    pub fn tasks_section_index(&self) -> Option<usize> {
        self.headings
            .iter()
            .position(|h| h.depth == 2 && h.title.trim().eq_ignore_ascii_case(TASKS_SECTION_TITLE))
    }

    /// True when the heading at `index` is a task: depth 3 with its nearest
    /// depth-2 ancestor being the `Tasks` section.
    pub fn is_task_heading(&self, index: usize) -> bool {
        let heading = &self.headings[index];
        if heading.depth != TASK_DEPTH {
            return false;
        }
        let mut parent = heading.parent_index;
        while let Some(idx) = parent {
            let candidate = &self.headings[idx];
            if candidate.depth == 2 {
                return candidate.title.trim().eq_ignore_ascii_case(TASKS_SECTION_TITLE);
            }
            parent = candidate.parent_index;
        }
        false
    }

    /// Task heading indexes in document order.
    pub fn task_heading_indexes(&self) -> Vec<usize> {
        (0..self.headings.len())
            .filter(|idx| self.is_task_heading(*idx))
            .collect()
    }

    /// Index of the document's first depth-1 heading.
    pub fn title_heading_index(&self) -> Option<usize> {
        self.headings.iter().position(|h| h.depth == 1)
    }

    pub fn fingerprint(&self) -> DocumentFingerprint {
        DocumentFingerprint {
            path: self.metadata.path.clone(),
            namespace: self.metadata.namespace.clone(),
            keywords: self.metadata.keywords.iter().map(|k| k.text.clone()).collect(),
            last_modified: self.metadata.last_modified,
            content_hash: self.metadata.content_hash.clone(),
        }
    }

    pub fn summary(&self) -> DocumentSummary {
        DocumentSummary {
            path: self.metadata.path.clone(),
            slug: document_slug(&self.metadata.path),
            title: self.metadata.title.clone(),
            namespace: self.metadata.namespace.clone(),
            last_modified: self.metadata.last_modified,
            section_count: self.headings.len(),
            word_count: self.metadata.word_count,
        }
    }

    pub(crate) fn touch(&self) {
        self.last_accessed.store(now_unix_ms(), Ordering::Relaxed);
    }

    pub fn last_accessed_unix_ms(&self) -> u64 {
        self.last_accessed.load(Ordering::Relaxed)
    }
}

/// Compact per-document record used by analysis to avoid full content loads.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentFingerprint {
    pub path: String,
    pub namespace: String,
    pub keywords: Vec<String>,
    pub last_modified: DateTime<Utc>,
    pub content_hash: String,
}

/// Listing entry for browse-style operations.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentSummary {
    pub path: String,
    pub slug: String,
    pub title: Option<String>,
    pub namespace: String,
    pub last_modified: DateTime<Utc>,
    pub section_count: usize,
    pub word_count: usize,
}

fn document_slug(path: &str) -> String {
    path.rsplit('/')
        .next()
        .unwrap_or(path)
        .trim_end_matches(".md")
        .to_string()
}

fn now_unix_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}
