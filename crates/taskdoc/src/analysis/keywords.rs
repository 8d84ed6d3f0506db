//! Weighted keyword extraction.
//!
//! Two stages: documents with a `keywords:` list in their YAML frontmatter
//! use it verbatim at the highest weight; everything else is tokenized from
//! title, headings, emphasized spans, and body text with decreasing weights.
//! Malformed frontmatter falls through silently to the second stage.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

/// Upper bound on keywords kept per document.
pub const MAX_KEYWORDS: usize = 64;

const MIN_TOKEN_LEN: usize = 3;

/// Where a keyword was observed. Weights decrease top to bottom.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum KeywordSource {
    FrontMatter,
    Title,
    Heading,
    Emphasis,
    Content,
}

impl KeywordSource {
    pub fn weight(self) -> f64 {
        match self {
            KeywordSource::FrontMatter => 3.0,
            KeywordSource::Title => 2.0,
            KeywordSource::Heading => 1.5,
            KeywordSource::Emphasis => 1.2,
            KeywordSource::Content => 1.0,
        }
    }
}

/// A kept keyword with its contributing sources and summed weight.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Keyword {
    pub text: String,
    pub weight: f64,
    pub sources: Vec<KeywordSource>,
}

/// Extracts weighted keywords from markdown content.
///
/// `title` overrides the in-document H1 when the caller already knows it.
pub fn extract_keywords(content: &str, title: Option<&str>) -> Vec<Keyword> {
    if let Some(listed) = frontmatter_keywords(content) {
        if !listed.is_empty() {
            let mut seen = BTreeSet::new();
            let mut out = Vec::new();
            for raw in listed {
                let text = raw.trim().to_lowercase();
                if text.is_empty() || !seen.insert(text.clone()) {
                    continue;
                }
                out.push(Keyword {
                    text,
                    weight: KeywordSource::FrontMatter.weight(),
                    sources: vec![KeywordSource::FrontMatter],
                });
                if out.len() >= MAX_KEYWORDS {
                    break;
                }
            }
            return out;
        }
    }

    let body = split_frontmatter(content)
        .map(|(_, body)| body)
        .unwrap_or(content);

    let mut scores: BTreeMap<String, (f64, BTreeSet<KeywordSource>)> = BTreeMap::new();
    let mut add = |text: &str, source: KeywordSource| {
        for token in tokenize(text) {
            let entry = scores.entry(token).or_insert((0.0, BTreeSet::new()));
            // Each source contributes its weight once per keyword.
            if entry.1.insert(source) {
                entry.0 += source.weight();
            }
        }
    };

    let mut in_fence = false;
    let mut first_h1: Option<&str> = None;
    for line in body.lines() {
        let trimmed = line.trim_start();
        if trimmed.starts_with("```") || trimmed.starts_with("~~~") {
            in_fence = !in_fence;
            continue;
        }
        if in_fence {
            continue;
        }
        if let Some(rest) = heading_text(trimmed) {
            if trimmed.starts_with("# ") && first_h1.is_none() {
                first_h1 = Some(rest);
            }
            add(rest, KeywordSource::Heading);
        } else {
            add(line, KeywordSource::Content);
        }
        for span in emphasized_spans(line) {
            add(span, KeywordSource::Emphasis);
        }
    }

    if let Some(title) = title.or(first_h1) {
        add(title, KeywordSource::Title);
    }

    let mut keywords: Vec<Keyword> = scores
        .into_iter()
        .map(|(text, (weight, sources))| Keyword {
            text,
            weight,
            sources: sources.into_iter().collect(),
        })
        .collect();
    keywords.sort_by(|a, b| {
        b.weight
            .partial_cmp(&a.weight)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.text.cmp(&b.text))
    });
    keywords.truncate(MAX_KEYWORDS);
    keywords
}

/// Reads a `keywords: [...]` list from YAML-like frontmatter, if present.
/// Returns `None` for missing or malformed frontmatter.
pub fn frontmatter_keywords(content: &str) -> Option<Vec<String>> {
    #[derive(Deserialize)]
    struct FrontMatter {
        keywords: Option<Vec<String>>,
    }

    let yaml = frontmatter_block(content)?;
    let parsed: FrontMatter = serde_yaml::from_str(yaml).ok()?;
    parsed.keywords
}

/// Returns the raw YAML between the leading `---` fence pair, if any.
pub fn frontmatter_block(content: &str) -> Option<&str> {
    split_frontmatter(content).map(|(yaml, _)| yaml)
}

/// Splits content into the frontmatter YAML and the body after the closing
/// fence. `None` when no leading fence pair exists.
pub fn split_frontmatter(content: &str) -> Option<(&str, &str)> {
    let stripped = content.trim_start_matches('\u{feff}');
    let rest = stripped.strip_prefix("---")?;
    let rest = rest.strip_prefix("\r\n").or_else(|| rest.strip_prefix('\n'))?;
    let end = rest.find("\n---")?;
    let yaml = &rest[..end];
    let after = &rest[end + 4..];
    let body = after
        .strip_prefix('\n')
        .or_else(|| after.strip_prefix("\r\n"))
        .unwrap_or(after);
    Some((yaml, body))
}

fn heading_text(trimmed: &str) -> Option<&str> {
    let hashes = trimmed.chars().take_while(|c| *c == '#').count();
    if !(1..=6).contains(&hashes) {
        return None;
    }
    trimmed.get(hashes..)?.strip_prefix(' ').map(str::trim_end)
}

fn emphasized_spans(line: &str) -> impl Iterator<Item = &str> {
    static EMPHASIS: OnceLock<Regex> = OnceLock::new();
    let regex = EMPHASIS
        .get_or_init(|| Regex::new(r"\*\*([^*\n]+)\*\*|\*([^*\n]+)\*").expect("emphasis regex"));
    regex.captures_iter(line).filter_map(|caps| {
        caps.get(1)
            .or_else(|| caps.get(2))
            .map(|span| span.as_str())
    })
}

fn tokenize(text: &str) -> Vec<String> {
    text.split(|c: char| !c.is_alphanumeric() && c != '-' && c != '_')
        .filter_map(|raw| {
            let token = raw.trim_matches(|c: char| c == '-' || c == '_').to_lowercase();
            if token.len() < MIN_TOKEN_LEN
                || token.chars().all(|c| c.is_ascii_digit())
                || STOP_WORDS.contains(&token.as_str())
            {
                None
            } else {
                Some(token)
            }
        })
        .collect()
}

const STOP_WORDS: &[&str] = &[
    "about", "after", "all", "also", "and", "any", "are", "because", "been", "before", "being",
    "between", "both", "but", "can", "could", "did", "does", "doing", "down", "during", "each",
    "few", "for", "from", "further", "had", "has", "have", "having", "her", "here", "him", "his",
    "how", "into", "its", "just", "more", "most", "not", "now", "off", "once", "only", "other",
    "our", "out", "over", "own", "same", "she", "should", "some", "such", "than", "that", "the",
    "their", "them", "then", "there", "these", "they", "this", "those", "through", "too", "under",
    "until", "very", "was", "were", "what", "when", "where", "which", "while", "who", "whom",
    "why", "will", "with", "would", "you", "your",
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frontmatter_keywords_win_over_content() {
        let content = "---\nkeywords: [auth, jwt]\n---\n# Other Title\n\nBody text here.\n";
        let keywords = extract_keywords(content, None);
        assert_eq!(keywords.len(), 2);
        assert!(keywords.iter().all(|k| k.sources == [KeywordSource::FrontMatter]));
        assert!(keywords.iter().any(|k| k.text == "auth"));
    }

    #[test]
    fn malformed_frontmatter_falls_through() {
        let content = "---\nkeywords: [unclosed\n---\n# Release Planning\n\nPlanning notes.\n";
        let keywords = extract_keywords(content, None);
        assert!(keywords.iter().any(|k| k.text == "planning"));
    }

    #[test]
    fn title_outweighs_body() {
        let content = "# Authentication\n\nSome filler words repeated filler.\n";
        let keywords = extract_keywords(content, None);
        let auth = keywords.iter().find(|k| k.text == "authentication").unwrap();
        let filler = keywords.iter().find(|k| k.text == "filler").unwrap();
        assert!(auth.weight > filler.weight);
        assert!(auth.sources.contains(&KeywordSource::Title));
    }

    #[test]
    fn stop_words_and_short_tokens_are_dropped() {
        let keywords = extract_keywords("# The and of it\n\nan to we by\n", None);
        assert!(keywords.is_empty());
    }

    #[test]
    fn emphasis_is_weighted_above_content() {
        let content = "# Doc\n\nplain **emphasized** plain\n";
        let keywords = extract_keywords(content, None);
        let em = keywords.iter().find(|k| k.text == "emphasized").unwrap();
        assert!(em.sources.contains(&KeywordSource::Emphasis));
        let plain = keywords.iter().find(|k| k.text == "plain").unwrap();
        assert!(em.weight > plain.weight);
    }

    #[test]
    fn output_is_capped() {
        let mut body = String::from("# Cap\n\n");
        for i in 0..200 {
            body.push_str(&format!("uniqueword{i:03} "));
        }
        let keywords = extract_keywords(&body, None);
        assert!(keywords.len() <= MAX_KEYWORDS);
    }
}
