//! Linear-scan search over the document store.
//!
//! Fulltext queries are compiled to a case-insensitive literal regex so both
//! search types share one matching and truncation path.

use regex::{Regex, RegexBuilder};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::document::DocumentCache;
use crate::error::TaskdocError;

pub const MAX_RESULTS_LIMIT: usize = 500;
pub const DEFAULT_MAX_RESULTS: usize = 100;
pub const MAX_CONTEXT_LINES: usize = 10;
pub const MIN_MATCH_LENGTH: usize = 20;
pub const MAX_MATCH_LENGTH: usize = 500;
pub const DEFAULT_MATCH_LENGTH: usize = 80;

const TRUNCATION_MARK: char = '…';

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum SearchType {
    Fulltext,
    Regex,
}

impl Default for SearchType {
    fn default() -> Self {
        SearchType::Fulltext
    }
}

#[derive(Debug, Clone)]
pub struct SearchRequest {
    pub query: String,
    pub search_type: SearchType,
    /// Virtual directory prefix limiting the scan; must start with `/`.
    pub scope: Option<String>,
    pub include_context: bool,
    pub context_lines: usize,
    pub max_results: usize,
    pub max_match_length: usize,
}

impl Default for SearchRequest {
    fn default() -> Self {
        Self {
            query: String::new(),
            search_type: SearchType::Fulltext,
            scope: None,
            include_context: false,
            context_lines: 2,
            max_results: DEFAULT_MAX_RESULTS,
            max_match_length: DEFAULT_MATCH_LENGTH,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SearchMatch {
    pub line: usize,
    pub match_text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct DocumentMatches {
    pub path: String,
    pub matches: Vec<SearchMatch>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SearchResults {
    pub query: String,
    pub search_type: SearchType,
    pub scope: Option<String>,
    pub results: Vec<DocumentMatches>,
    pub total_matches: usize,
    pub total_documents: usize,
    pub truncated: bool,
}

/// Runs a search across every document in scope.
pub fn search_documents(
    cache: &DocumentCache,
    request: &SearchRequest,
) -> Result<SearchResults, TaskdocError> {
    validate(request)?;
    let regex = build_regex(request)?;

    let summaries = cache.list_documents(request.scope.as_deref())?;
    let mut results: Vec<DocumentMatches> = Vec::new();
    let mut total_matches = 0usize;
    let mut truncated = false;

    'documents: for summary in &summaries {
        let Some(content) = cache.get_document_content(&summary.path)? else {
            continue;
        };
        let lines: Vec<&str> = content.lines().collect();
        let mut matches = Vec::new();

        for (index, line) in lines.iter().enumerate() {
            if !regex.is_match(line) {
                continue;
            }
            if total_matches >= request.max_results {
                truncated = true;
                if !matches.is_empty() {
                    results.push(DocumentMatches {
                        path: summary.path.clone(),
                        matches: std::mem::take(&mut matches),
                    });
                }
                break 'documents;
            }

            matches.push(SearchMatch {
                line: index + 1,
                match_text: truncate_match(line, request.max_match_length),
                context: if request.include_context {
                    Some(context_block(&lines, index, request.context_lines))
                } else {
                    None
                },
            });
            total_matches += 1;
        }

        if !matches.is_empty() {
            results.push(DocumentMatches {
                path: summary.path.clone(),
                matches,
            });
        }
    }

    Ok(SearchResults {
        query: request.query.clone(),
        search_type: request.search_type,
        scope: request.scope.clone(),
        total_documents: results.len(),
        results,
        total_matches,
        truncated,
    })
}

fn validate(request: &SearchRequest) -> Result<(), TaskdocError> {
    if request.query.is_empty() {
        return Err(TaskdocError::Validation("query must not be empty".into()));
    }
    if let Some(scope) = &request.scope {
        if !scope.starts_with('/') {
            return Err(TaskdocError::Validation(format!(
                "scope must start with '/': {scope:?}"
            )));
        }
    }
    if request.context_lines > MAX_CONTEXT_LINES {
        return Err(TaskdocError::Validation(format!(
            "context_lines must be 0..={MAX_CONTEXT_LINES}"
        )));
    }
    if request.max_results == 0 || request.max_results > MAX_RESULTS_LIMIT {
        return Err(TaskdocError::Validation(format!(
            "max_results must be 1..={MAX_RESULTS_LIMIT}"
        )));
    }
    if !(MIN_MATCH_LENGTH..=MAX_MATCH_LENGTH).contains(&request.max_match_length) {
        return Err(TaskdocError::Validation(format!(
            "max_match_length must be {MIN_MATCH_LENGTH}..={MAX_MATCH_LENGTH}"
        )));
    }
    Ok(())
}

fn build_regex(request: &SearchRequest) -> Result<Regex, TaskdocError> {
    let pattern = match request.search_type {
        SearchType::Fulltext => regex::escape(&request.query),
        SearchType::Regex => request.query.clone(),
    };
    RegexBuilder::new(&pattern)
        .case_insensitive(true)
        .build()
        .map_err(|err| TaskdocError::InvalidRegex(err.to_string()))
}

/// Caps the matched line at `max_length` characters, ending in `…` when cut.
fn truncate_match(line: &str, max_length: usize) -> String {
    let trimmed = line.trim();
    if trimmed.chars().count() <= max_length {
        return trimmed.to_string();
    }
    let mut out: String = trimmed.chars().take(max_length - 1).collect();
    out.push(TRUNCATION_MARK);
    out
}

fn context_block(lines: &[&str], index: usize, context_lines: usize) -> String {
    let start = index.saturating_sub(context_lines);
    let end = (index + context_lines + 1).min(lines.len());
    lines[start..end].join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truncation_appends_ellipsis_at_the_limit() {
        let long = "x".repeat(100);
        let cut = truncate_match(&long, 60);
        assert_eq!(cut.chars().count(), 60);
        assert!(cut.ends_with(TRUNCATION_MARK));

        let short = truncate_match("short line", 60);
        assert_eq!(short, "short line");
    }

    #[test]
    fn validation_rejects_out_of_range_parameters() {
        let mut request = SearchRequest {
            query: "x".into(),
            ..SearchRequest::default()
        };
        request.context_lines = 11;
        assert!(validate(&request).is_err());

        request.context_lines = 2;
        request.max_results = 501;
        assert!(validate(&request).is_err());

        request.max_results = 100;
        request.max_match_length = 19;
        assert!(validate(&request).is_err());

        request.max_match_length = 80;
        request.scope = Some("api".into());
        assert!(validate(&request).is_err());
    }

    #[test]
    fn fulltext_escapes_regex_metacharacters() {
        let request = SearchRequest {
            query: "a.b(c)".into(),
            ..SearchRequest::default()
        };
        let regex = build_regex(&request).unwrap();
        assert!(regex.is_match("a.b(c)"));
        assert!(!regex.is_match("aXb(c)"));
    }

    #[test]
    fn invalid_regex_reports_invalid_regex() {
        let request = SearchRequest {
            query: "(unclosed".into(),
            search_type: SearchType::Regex,
            ..SearchRequest::default()
        };
        assert!(matches!(
            build_regex(&request),
            Err(TaskdocError::InvalidRegex(_))
        ));
    }
}
