//! Multi-factor relevance scoring between documents.
//!
//! Factors are summed and capped at 1.0:
//! - keyword overlap (0..0.7), weighted Jaccard over keyword sets
//! - title similarity (0..0.3), token-set based; exact match scores 0.3
//! - namespace affinity: same 0.2, parent/child 0.15, sibling 0.1
//! - recency boost: <=7d 0.1, <=30d 0.05, <=90d 0.02
//! - optional link-graph boost when enabled

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::keywords::Keyword;

const KEYWORD_OVERLAP_MAX: f64 = 0.7;
const TITLE_SIMILARITY_MAX: f64 = 0.3;
const LINK_GRAPH_BOOST: f64 = 0.1;

/// One named contribution to a relevance total.
#[derive(Debug, Clone, Serialize)]
pub struct RelevanceFactor {
    pub name: &'static str,
    pub score: f64,
}

/// Scoring result: capped total, the sorted top factors, and a one-line
/// explanation derived from them.
#[derive(Debug, Clone, Serialize)]
pub struct Relevance {
    pub total: f64,
    pub top_factors: Vec<RelevanceFactor>,
    pub explanation: String,
}

/// Source side of a comparison.
pub struct ScoringSource<'a> {
    pub keywords: &'a [Keyword],
    pub title: &'a str,
    pub namespace: &'a str,
    /// Source content, consulted for the link-graph boost.
    pub content: Option<&'a str>,
}

/// Candidate side of a comparison.
pub struct ScoringCandidate<'a> {
    pub path: &'a str,
    pub title: &'a str,
    pub namespace: &'a str,
    pub keywords: &'a [Keyword],
    pub last_modified: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct RelevanceOptions {
    /// Adds a boost when the source content references the candidate path.
    pub link_graph_boost: bool,
}

pub fn score_relevance(
    source: &ScoringSource<'_>,
    candidate: &ScoringCandidate<'_>,
    now: DateTime<Utc>,
    options: RelevanceOptions,
) -> Relevance {
    let mut factors = vec![
        RelevanceFactor {
            name: "keyword_overlap",
            score: keyword_overlap(source.keywords, candidate.keywords),
        },
        RelevanceFactor {
            name: "title_similarity",
            score: title_similarity(source.title, candidate.title),
        },
        RelevanceFactor {
            name: "namespace_affinity",
            score: namespace_affinity(source.namespace, candidate.namespace),
        },
        RelevanceFactor {
            name: "recency_boost",
            score: recency_boost(now, candidate.last_modified),
        },
    ];

    if options.link_graph_boost {
        let linked = source
            .content
            .is_some_and(|content| content.contains(&format!("@{}", candidate.path)));
        if linked {
            factors.push(RelevanceFactor {
                name: "link_graph",
                score: LINK_GRAPH_BOOST,
            });
        }
    }

    let total = factors.iter().map(|f| f.score).sum::<f64>().min(1.0);

    let mut sorted = factors;
    sorted.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    sorted.retain(|factor| factor.score > 0.0);
    sorted.truncate(3);

    let explanation = explain(&sorted, candidate.namespace);

    Relevance {
        total,
        top_factors: sorted,
        explanation,
    }
}

/// Weighted Jaccard overlap scaled into 0..=0.7.
pub fn keyword_overlap(source: &[Keyword], candidate: &[Keyword]) -> f64 {
    if source.is_empty() || candidate.is_empty() {
        return 0.0;
    }

    let left: BTreeMap<&str, f64> = source.iter().map(|k| (k.text.as_str(), k.weight)).collect();
    let right: BTreeMap<&str, f64> = candidate
        .iter()
        .map(|k| (k.text.as_str(), k.weight))
        .collect();

    let mut intersection = 0.0;
    let mut union = 0.0;
    let keys: BTreeSet<&str> = left.keys().chain(right.keys()).copied().collect();
    for key in keys {
        match (left.get(key), right.get(key)) {
            (Some(a), Some(b)) => {
                intersection += a.min(*b);
                union += a.max(*b);
            }
            (Some(a), None) => union += a,
            (None, Some(b)) => union += b,
            (None, None) => {}
        }
    }

    if union <= 0.0 {
        0.0
    } else {
        (intersection / union) * KEYWORD_OVERLAP_MAX
    }
}

/// Token-set similarity scaled into 0..=0.3; exact titles score the maximum.
pub fn title_similarity(source: &str, candidate: &str) -> f64 {
    let a = source.trim();
    let b = candidate.trim();
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }
    if a.eq_ignore_ascii_case(b) {
        return TITLE_SIMILARITY_MAX;
    }

    let left = title_tokens(a);
    let right = title_tokens(b);
    if left.is_empty() || right.is_empty() {
        return 0.0;
    }
    let intersection = left.intersection(&right).count() as f64;
    let union = left.union(&right).count() as f64;
    (intersection / union) * TITLE_SIMILARITY_MAX
}

/// Namespace relationship score: same 0.2, parent/child 0.15, sibling 0.1.
pub fn namespace_affinity(source: &str, candidate: &str) -> f64 {
    if source == candidate {
        return 0.2;
    }
    if is_parent_of(source, candidate) || is_parent_of(candidate, source) {
        return 0.15;
    }
    if parent_namespace(source) == parent_namespace(candidate) {
        return 0.1;
    }
    0.0
}

fn recency_boost(now: DateTime<Utc>, modified: DateTime<Utc>) -> f64 {
    let days = (now - modified).num_days();
    if days < 0 {
        return 0.1;
    }
    match days {
        0..=7 => 0.1,
        8..=30 => 0.05,
        31..=90 => 0.02,
        _ => 0.0,
    }
}

fn is_parent_of(parent: &str, child: &str) -> bool {
    child
        .strip_prefix(parent)
        .is_some_and(|rest| rest.starts_with('/'))
}

fn parent_namespace(namespace: &str) -> &str {
    namespace.rsplit_once('/').map(|(head, _)| head).unwrap_or("")
}

fn title_tokens(title: &str) -> BTreeSet<String> {
    title
        .split(|c: char| !c.is_alphanumeric())
        .filter(|token| !token.is_empty())
        .map(str::to_lowercase)
        .collect()
}

fn explain(factors: &[RelevanceFactor], candidate_namespace: &str) -> String {
    if factors.is_empty() {
        return "No meaningful overlap".to_string();
    }

    let phrases: Vec<&str> = factors.iter().map(|f| factor_phrase(f)).collect();
    let joined = match phrases.as_slice() {
        [only] => only.to_string(),
        [first, rest @ ..] => format!("{first} with {}", rest.join(" and ")),
        [] => unreachable!(),
    };
    format!("{joined} in {candidate_namespace}")
}

fn factor_phrase(factor: &RelevanceFactor) -> &'static str {
    match factor.name {
        "keyword_overlap" if factor.score >= 0.45 => "Strong keyword overlap",
        "keyword_overlap" => "Shared keywords",
        "title_similarity" if factor.score >= TITLE_SIMILARITY_MAX => "Matching title",
        "title_similarity" => "Similar title",
        "namespace_affinity" if factor.score >= 0.2 => "same namespace",
        "namespace_affinity" => "neighboring namespace",
        "recency_boost" => "recent activity",
        "link_graph" => "a direct reference",
        _ => "related signals",
    }
}
