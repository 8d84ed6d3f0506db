//! Classification of `@`-style references against the document store.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::document::DocumentCache;
use crate::error::TaskdocError;
use crate::reference::{ReferenceTarget, extract_references};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum ReferenceStatus {
    Valid,
    MissingDocument,
    MissingSection,
    Malformed,
}

/// One classified reference. Duplicates (same reference text) are collapsed
/// before classification.
#[derive(Debug, Clone, Serialize)]
pub struct ClassifiedReference {
    pub reference: String,
    pub status: ReferenceStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub document_path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub slug: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

/// Scans `content` for references and classifies each against the cache.
pub fn classify_references(
    cache: &DocumentCache,
    content: &str,
    context_namespace: &str,
) -> Result<Vec<ClassifiedReference>, TaskdocError> {
    let mut out = Vec::new();
    for reference in extract_references(content, context_namespace) {
        let classified = match reference.target {
            ReferenceTarget::Malformed { reason } => ClassifiedReference {
                reference: reference.raw,
                status: ReferenceStatus::Malformed,
                document_path: None,
                slug: None,
                detail: Some(reason),
            },
            ReferenceTarget::Document { path, slug } => {
                classify_document_reference(cache, reference.raw, path, slug)
            }
        };
        out.push(classified);
    }
    Ok(out)
}

fn classify_document_reference(
    cache: &DocumentCache,
    raw: String,
    path: String,
    slug: Option<String>,
) -> ClassifiedReference {
    let document = match cache.get_document(&path) {
        // An unresolvable path (e.g. traversal) is malformed, not missing.
        Err(TaskdocError::InvalidAddress(reason)) => {
            return ClassifiedReference {
                reference: raw,
                status: ReferenceStatus::Malformed,
                document_path: Some(path),
                slug,
                detail: Some(reason),
            };
        }
        Err(_) | Ok(None) => {
            return ClassifiedReference {
                reference: raw,
                status: ReferenceStatus::MissingDocument,
                document_path: Some(path),
                slug,
                detail: None,
            };
        }
        Ok(Some(document)) => document,
    };

    if let Some(section) = &slug {
        if !document.slug_index.contains_key(section.as_str()) {
            return ClassifiedReference {
                reference: raw,
                status: ReferenceStatus::MissingSection,
                document_path: Some(path),
                slug,
                detail: None,
            };
        }
    }

    ClassifiedReference {
        reference: raw,
        status: ReferenceStatus::Valid,
        document_path: Some(path),
        slug,
        detail: None,
    }
}
