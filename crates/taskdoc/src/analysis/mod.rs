//! Document analysis: keyword extraction, relevance scoring, related-document
//! discovery, and broken-reference classification.

pub mod keywords;

mod broken_refs;
mod relevance;

pub use broken_refs::{ClassifiedReference, ReferenceStatus, classify_references};
pub use keywords::{Keyword, KeywordSource, MAX_KEYWORDS, extract_keywords};
pub use relevance::{
    Relevance, RelevanceFactor, RelevanceOptions, ScoringCandidate, ScoringSource,
    keyword_overlap, namespace_affinity, score_relevance, title_similarity,
};

use chrono::Utc;
use serde::Serialize;

use crate::document::{DocumentCache, DocumentFingerprint};
use crate::error::TaskdocError;

/// Maximum related documents returned per query.
pub const RELATED_LIMIT: usize = 5;

/// Minimum shared fingerprint keywords for a candidate to pass the
/// first-stage filter.
const FINGERPRINT_KEYWORD_THRESHOLD: usize = 2;

/// A related document with its relevance breakdown.
#[derive(Debug, Clone, Serialize)]
pub struct RelatedDocument {
    pub path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    pub namespace: String,
    pub relevance: f64,
    pub factors: Vec<RelevanceFactor>,
    pub explanation: String,
}

/// Finds the most relevant documents for `source_path`.
///
/// Two stages: fingerprints pre-filter candidates by keyword intersection or
/// namespace affinity, then full multi-factor scores are computed on the
/// survivors. When the fingerprint listing fails, every candidate is scored.
pub fn find_related_documents(
    cache: &DocumentCache,
    source_path: &str,
    options: RelevanceOptions,
) -> Result<Vec<RelatedDocument>, TaskdocError> {
    let source = cache.load_document(source_path)?;
    let source_keyword_texts: Vec<&str> = source
        .metadata
        .keywords
        .iter()
        .map(|k| k.text.as_str())
        .collect();

    let candidate_paths: Vec<String> = match cache.list_document_fingerprints() {
        Ok(fingerprints) => fingerprints
            .iter()
            .filter(|fp| fp.path != source.metadata.path)
            .filter(|fp| {
                passes_fingerprint_filter(fp, &source_keyword_texts, &source.metadata.namespace)
            })
            .map(|fp| fp.path.clone())
            .collect(),
        // Fingerprint failure falls back to scoring every candidate.
        Err(_) => cache
            .list_documents(None)?
            .into_iter()
            .map(|summary| summary.path)
            .filter(|path| *path != source.metadata.path)
            .collect(),
    };

    let now = Utc::now();
    let source_title = source.metadata.title.clone().unwrap_or_default();
    let scoring_source = ScoringSource {
        keywords: &source.metadata.keywords,
        title: &source_title,
        namespace: &source.metadata.namespace,
        content: Some(source.content()),
    };

    let mut scored = Vec::new();
    for path in candidate_paths {
        let Some(candidate) = cache.get_document(&path)? else {
            continue;
        };
        let candidate_title = candidate.metadata.title.clone().unwrap_or_default();
        let relevance = score_relevance(
            &scoring_source,
            &ScoringCandidate {
                path: &candidate.metadata.path,
                title: &candidate_title,
                namespace: &candidate.metadata.namespace,
                keywords: &candidate.metadata.keywords,
                last_modified: candidate.metadata.last_modified,
            },
            now,
            options,
        );
        if relevance.total > 0.0 {
            scored.push(RelatedDocument {
                path: candidate.metadata.path.clone(),
                title: candidate.metadata.title.clone(),
                namespace: candidate.metadata.namespace.clone(),
                relevance: relevance.total,
                factors: relevance.top_factors,
                explanation: relevance.explanation,
            });
        }
    }

    scored.sort_by(|a, b| {
        b.relevance
            .partial_cmp(&a.relevance)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.path.cmp(&b.path))
    });
    scored.truncate(RELATED_LIMIT);
    Ok(scored)
}

fn passes_fingerprint_filter(
    fingerprint: &DocumentFingerprint,
    source_keywords: &[&str],
    source_namespace: &str,
) -> bool {
    let shared = fingerprint
        .keywords
        .iter()
        .filter(|kw| source_keywords.contains(&kw.as_str()))
        .count();
    shared >= FINGERPRINT_KEYWORD_THRESHOLD
        || namespace_affinity(source_namespace, &fingerprint.namespace) > 0.0
}
