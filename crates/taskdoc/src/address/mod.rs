//! Parsed document, section, and task addresses.
//!
//! Addresses are value types: parsing canonicalizes the user input once and
//! every later consumer works with the parsed form. The batch-scoped
//! [`AddressCache`] lives in [`cache`].

mod cache;

pub use cache::{AddressCache, AddressCacheStats, CachedAddress};

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::error::TaskdocError;
use crate::workspace::canonicalize_virtual;

/// Namespace assigned to documents that live directly at the base of the
/// virtual tree.
pub const ROOT_NAMESPACE: &str = "root";

/// A parsed, canonical document address.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct DocumentAddress {
    /// Canonical virtual path: leading `/`, `.md` extension.
    pub path: String,
    /// File stem of the document.
    pub slug: String,
    /// Parent directory chain joined by `/`, or `root` when absent.
    pub namespace: String,
    /// Identical to `path`; kept for callers that normalize separately.
    pub normalized_path: String,
    /// Cache key under which this address is memoized (equal to `path`).
    pub cache_key: String,
}

/// A parsed section address within a document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct SectionAddress {
    pub document: DocumentAddress,
    /// Section slug; may contain `/` for hierarchical slugs.
    pub slug: String,
    /// `{document.path}#{slug}`.
    pub full_path: String,
}

/// A parsed task address. Shape matches [`SectionAddress`]; `is_task` is set
/// by construction and later access validates the target against the
/// document's `Tasks` section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct TaskAddress {
    pub document: DocumentAddress,
    pub slug: String,
    pub full_path: String,
    pub is_task: bool,
}

/// Parses a document address from user input.
pub fn parse_document_address(input: &str) -> Result<DocumentAddress, TaskdocError> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Err(TaskdocError::InvalidAddress("empty path".into()));
    }
    if !trimmed.ends_with(".md") {
        return Err(TaskdocError::InvalidAddress(format!(
            "missing .md extension: {trimmed:?}"
        )));
    }

    let path = canonicalize_virtual(trimmed);
    let segments: Vec<&str> = path
        .trim_start_matches('/')
        .split('/')
        .filter(|seg| !seg.is_empty())
        .collect();

    let file = segments.last().ok_or_else(|| {
        TaskdocError::InvalidAddress(format!("empty path: {trimmed:?}"))
    })?;
    let slug = file.trim_end_matches(".md");
    if slug.is_empty() {
        return Err(TaskdocError::InvalidAddress(format!(
            "empty document name: {trimmed:?}"
        )));
    }

    let namespace = if segments.len() > 1 {
        segments[..segments.len() - 1].join("/")
    } else {
        ROOT_NAMESPACE.to_string()
    };

    Ok(DocumentAddress {
        slug: slug.to_string(),
        namespace,
        normalized_path: path.clone(),
        cache_key: path.clone(),
        path,
    })
}

/// Parses a section reference.
///
/// Accepted forms: bare `slug`, `#slug`, fully-qualified `path.md#slug`, and
/// hierarchical `a/b/c`. When no document component is present, `context`
/// names the document the reference is relative to.
pub fn parse_section_address(
    reference: &str,
    context: Option<&str>,
) -> Result<SectionAddress, TaskdocError> {
    let trimmed = reference.trim();
    if trimmed.is_empty() {
        return Err(TaskdocError::InvalidAddress("empty section reference".into()));
    }

    let (document, slug) = match trimmed.split_once('#') {
        Some((doc_part, slug_part)) => {
            let slug = slug_part.trim();
            if slug.is_empty() {
                return Err(TaskdocError::InvalidAddress(format!(
                    "empty slug after #: {trimmed:?}"
                )));
            }
            let document = if doc_part.is_empty() {
                parse_document_address(require_context(context, trimmed)?)?
            } else {
                parse_document_address(doc_part)?
            };
            (document, slug.to_string())
        }
        None => {
            if trimmed.ends_with(".md") {
                return Err(TaskdocError::InvalidAddress(format!(
                    "section reference is missing a slug: {trimmed:?}"
                )));
            }
            let document = parse_document_address(require_context(context, trimmed)?)?;
            (document, trimmed.to_string())
        }
    };

    let full_path = format!("{}#{}", document.path, slug);
    Ok(SectionAddress {
        document,
        slug,
        full_path,
    })
}

/// Parses a task reference. Identical grammar to sections.
pub fn parse_task_address(
    reference: &str,
    context: Option<&str>,
) -> Result<TaskAddress, TaskdocError> {
    let section = parse_section_address(reference, context)?;
    Ok(TaskAddress {
        document: section.document,
        slug: section.slug,
        full_path: section.full_path,
        is_task: true,
    })
}

/// Parses a `document#slug[,slug...]` reference into one task address per
/// slug. A reference without `#` yields the document with no task addresses
/// (overview form). More than `max_tasks` slugs is an address error.
pub fn parse_task_list(
    reference: &str,
    max_tasks: usize,
) -> Result<(DocumentAddress, Vec<TaskAddress>), TaskdocError> {
    let trimmed = reference.trim();
    match trimmed.split_once('#') {
        None => Ok((parse_document_address(trimmed)?, Vec::new())),
        Some((doc_part, slugs)) => {
            if doc_part.is_empty() {
                return Err(TaskdocError::InvalidAddress(format!(
                    "task reference requires a document: {trimmed:?}"
                )));
            }
            let document = parse_document_address(doc_part)?;
            let slugs: Vec<&str> = slugs
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .collect();
            if slugs.is_empty() {
                return Err(TaskdocError::InvalidAddress(format!(
                    "empty slug after #: {trimmed:?}"
                )));
            }
            if slugs.len() > max_tasks {
                return Err(TaskdocError::InvalidAddress(format!(
                    "task count exceeds limit: {} requested, {max_tasks} allowed",
                    slugs.len()
                )));
            }
            let tasks = slugs
                .into_iter()
                .map(|slug| TaskAddress {
                    document: document.clone(),
                    slug: slug.to_string(),
                    full_path: format!("{}#{}", document.path, slug),
                    is_task: true,
                })
                .collect();
            Ok((document, tasks))
        }
    }
}

fn require_context<'a>(
    context: Option<&'a str>,
    reference: &str,
) -> Result<&'a str, TaskdocError> {
    context.ok_or_else(|| {
        TaskdocError::InvalidAddress(format!(
            "section reference {reference:?} has no document component and no context"
        ))
    })
}
