//! `@`-style cross-document references.
//!
//! Two spellings are recognized: absolute `@/path/doc.md[#slug]` and
//! `@bare-name[.md][#slug]`, the latter resolved against the referencing
//! document's namespace. Loading follows references recursively to a bounded
//! depth with a per-load visited set, so cycles terminate without error.

use std::collections::HashSet;
use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::address::ROOT_NAMESPACE;
use crate::document::DocumentCache;

/// Default recursion bound for reference loading.
pub const DEFAULT_REFERENCE_DEPTH: usize = 3;

/// One reference as written, with its parse result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawReference {
    /// The reference text including the `@`.
    pub raw: String,
    pub target: ReferenceTarget,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReferenceTarget {
    Document {
        /// Canonical virtual path of the referenced document.
        path: String,
        slug: Option<String>,
    },
    Malformed {
        reason: String,
    },
}

/// A loaded reference with its transitively loaded children.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReferencedDocument {
    pub path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub slug: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub children: Vec<ReferencedDocument>,
}

/// True when `content` contains at least one `@`-reference candidate.
pub fn has_references(content: &str) -> bool {
    candidates(content).next().is_some()
}

/// Extracts references in document order, deduplicated by reference text.
pub fn extract_references(content: &str, context_namespace: &str) -> Vec<RawReference> {
    let mut seen = HashSet::new();
    let mut out = Vec::new();
    for raw in candidates(content) {
        if !seen.insert(raw.to_string()) {
            continue;
        }
        out.push(RawReference {
            raw: raw.to_string(),
            target: parse_reference(raw, context_namespace),
        });
    }
    out
}

/// Loads every document reference in `content`, recursing into loaded
/// section content down to `max_depth` levels.
pub fn load_referenced_documents(
    cache: &DocumentCache,
    content: &str,
    context_namespace: &str,
    max_depth: usize,
) -> Vec<ReferencedDocument> {
    let mut visited = HashSet::new();
    load_level(cache, content, context_namespace, max_depth, &mut visited)
}

fn load_level(
    cache: &DocumentCache,
    content: &str,
    context_namespace: &str,
    remaining_depth: usize,
    visited: &mut HashSet<String>,
) -> Vec<ReferencedDocument> {
    if remaining_depth == 0 {
        return Vec::new();
    }

    let mut out = Vec::new();
    for reference in extract_references(content, context_namespace) {
        let ReferenceTarget::Document { path, slug } = reference.target else {
            continue;
        };
        let key = match &slug {
            Some(slug) => format!("{path}#{slug}"),
            None => path.clone(),
        };
        if !visited.insert(key) {
            continue;
        }

        let Ok(Some(doc)) = cache.get_document(&path) else {
            out.push(ReferencedDocument {
                path,
                slug,
                title: None,
                content: None,
                children: Vec::new(),
            });
            continue;
        };

        let loaded = match &slug {
            Some(slug) => doc.section_content(slug).map(str::to_string),
            None => Some(doc.content().to_string()),
        };
        let children = match &loaded {
            Some(text) => load_level(
                cache,
                text,
                &doc.metadata.namespace,
                remaining_depth - 1,
                visited,
            ),
            None => Vec::new(),
        };

        out.push(ReferencedDocument {
            path,
            slug,
            title: doc.metadata.title.clone(),
            content: loaded,
            children,
        });
    }
    out
}

fn candidates(content: &str) -> impl Iterator<Item = &str> {
    static CANDIDATE: OnceLock<Regex> = OnceLock::new();
    let regex = CANDIDATE.get_or_init(|| {
        Regex::new(r"@/?[A-Za-z0-9][A-Za-z0-9._/#-]*").expect("reference regex")
    });
    regex.find_iter(content).filter_map(move |found| {
        // Skip e-mail-like text: a reference never follows an alphanumeric.
        let preceding = content[..found.start()].chars().next_back();
        if preceding.is_some_and(|c| c.is_alphanumeric()) {
            return None;
        }
        // Trailing sentence punctuation is not part of the reference.
        let mut text = found.as_str();
        while text.ends_with('.') && !text.ends_with(".md") {
            text = &text[..text.len() - 1];
        }
        Some(text)
    })
}

/// Parses one `@...` candidate against the referencing document's namespace.
pub fn parse_reference(raw: &str, context_namespace: &str) -> ReferenceTarget {
    let body = match raw.strip_prefix('@') {
        Some(body) if !body.is_empty() => body,
        _ => {
            return ReferenceTarget::Malformed {
                reason: "empty reference".into(),
            };
        }
    };

    let (doc_part, slug) = match body.split_once('#') {
        Some((doc_part, slug_part)) => {
            if slug_part.trim().is_empty() {
                return ReferenceTarget::Malformed {
                    reason: "empty slug after #".into(),
                };
            }
            (doc_part, Some(slug_part.trim().to_string()))
        }
        None => (body, None),
    };

    if let Some(stripped) = doc_part.strip_prefix('/') {
        if stripped.is_empty() {
            return ReferenceTarget::Malformed {
                reason: "empty document path".into(),
            };
        }
        if !doc_part.ends_with(".md") {
            return ReferenceTarget::Malformed {
                reason: "absolute references must end in .md".into(),
            };
        }
        return ReferenceTarget::Document {
            path: doc_part.to_string(),
            slug,
        };
    }

    // Relative bare name: resolved within the referencing namespace.
    if doc_part.contains('/') {
        return ReferenceTarget::Malformed {
            reason: "relative references must be bare names".into(),
        };
    }
    let file = if doc_part.ends_with(".md") {
        doc_part.to_string()
    } else {
        format!("{doc_part}.md")
    };
    let path = if context_namespace == ROOT_NAMESPACE {
        format!("/{file}")
    } else {
        format!("/{context_namespace}/{file}")
    };
    ReferenceTarget::Document { path, slug }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn absolute_reference_with_slug() {
        let refs = extract_references("see @/api/auth.md#jwt-tokens here", "root");
        assert_eq!(refs.len(), 1);
        assert_eq!(
            refs[0].target,
            ReferenceTarget::Document {
                path: "/api/auth.md".into(),
                slug: Some("jwt-tokens".into()),
            }
        );
    }

    #[test]
    fn relative_reference_resolves_in_namespace() {
        let refs = extract_references("see @sessions for details", "api");
        assert_eq!(
            refs[0].target,
            ReferenceTarget::Document {
                path: "/api/sessions.md".into(),
                slug: None,
            }
        );

        let root_refs = extract_references("see @sessions", "root");
        assert_eq!(
            root_refs[0].target,
            ReferenceTarget::Document {
                path: "/sessions.md".into(),
                slug: None,
            }
        );
    }

    #[test]
    fn duplicates_collapse() {
        let refs = extract_references("@/a.md then @/a.md again", "root");
        assert_eq!(refs.len(), 1);
    }

    #[test]
    fn email_addresses_are_not_references() {
        assert!(extract_references("mail ops@example.com", "root").is_empty());
    }

    #[test]
    fn wrong_extension_is_malformed() {
        let refs = extract_references("@/notes.txt", "root");
        assert!(matches!(refs[0].target, ReferenceTarget::Malformed { .. }));
    }
}
