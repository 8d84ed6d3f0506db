//! Markdown structure parsing: headings, slugs, section byte ranges, counts.
//!
//! The scanner is line-oriented and fence-aware. Heading slugs use the
//! GitHub-style algorithm: NFKD-normalize, lowercase, keep alphanumerics and
//! hyphens, hyphenate spaces, collapse runs. Duplicate slugs within one
//! document get `-1`, `-2`, ... suffixes in document order.

use std::collections::HashMap;

use sha2::{Digest, Sha256};
use unicode_normalization::UnicodeNormalization;

use crate::analysis::keywords::{Keyword, extract_keywords, split_frontmatter};

use super::{Heading, LinkCounts, SectionSpan};

/// Slug assigned when a heading title produces no usable characters.
const EMPTY_SLUG_FALLBACK: &str = "section";

pub(crate) struct ParsedStructure {
    pub title: Option<String>,
    pub headings: Vec<Heading>,
    pub slug_index: HashMap<String, usize>,
    pub sections: Vec<SectionSpan>,
    pub toc: Vec<String>,
    pub word_count: usize,
    pub link_counts: LinkCounts,
    pub code_block_count: usize,
    pub keywords: Vec<Keyword>,
}

pub(crate) fn parse_structure(content: &str) -> ParsedStructure {
    let mut headings: Vec<Heading> = Vec::new();
    let mut slug_index: HashMap<String, usize> = HashMap::new();
    let mut heading_offsets: Vec<(usize, usize)> = Vec::new();
    let mut slug_counts: HashMap<String, usize> = HashMap::new();
    let mut heading_stack: Vec<(u8, usize)> = Vec::new();

    let mut link_counts = LinkCounts::default();
    let mut code_block_count = 0usize;

    let mut fence: Option<FenceState> = None;

    // Frontmatter is metadata, not structure; offsets stay absolute.
    let body_offset = split_frontmatter(content)
        .map(|(_, body)| content.len() - body.len())
        .unwrap_or(0);
    let mut offset = body_offset;

    for line in content[body_offset..].split_inclusive('\n') {
        let line_start = offset;
        offset += line.len();
        let text = line.strip_suffix('\n').unwrap_or(line);
        let text = text.strip_suffix('\r').unwrap_or(text);

        if let Some(updated) = fence_update(fence.as_ref(), text) {
            let opened = fence.is_none() && updated.is_some();
            if opened {
                code_block_count += 1;
            }
            fence = updated;
            continue;
        }

        if fence.is_some() {
            continue;
        }

        if let Some((depth, title)) = parse_atx_heading(text) {
            let base = slugify_heading(&title);
            let seen = slug_counts.entry(base.clone()).or_insert(0);
            let slug = if *seen == 0 {
                base.clone()
            } else {
                format!("{base}-{seen}")
            };
            *seen += 1;

            while let Some((level, _)) = heading_stack.last() {
                if *level < depth {
                    break;
                }
                heading_stack.pop();
            }
            let parent_index = heading_stack.last().map(|(_, idx)| *idx);

            let index = headings.len();
            slug_index.insert(slug.clone(), index);
            headings.push(Heading {
                slug,
                title,
                depth,
                index,
                parent_index,
            });
            heading_offsets.push((line_start, offset));
            heading_stack.push((depth, index));
            continue;
        }

        for dest in extract_inline_link_destinations(text) {
            link_counts.total += 1;
            if dest.starts_with("http://") || dest.starts_with("https://") {
                link_counts.external += 1;
            } else {
                link_counts.internal += 1;
            }
        }
    }

    let sections = section_spans(&headings, &heading_offsets, content.len());

    let toc = headings
        .iter()
        .map(|h| {
            format!(
                "{}- [{}](#{})",
                "  ".repeat(h.depth.saturating_sub(1) as usize),
                h.title,
                h.slug
            )
        })
        .collect();

    let title = headings
        .iter()
        .find(|h| h.depth == 1)
        .map(|h| h.title.clone());

    let keywords = extract_keywords(content, title.as_deref());

    ParsedStructure {
        word_count: content[body_offset..].split_whitespace().count(),
        title,
        headings,
        slug_index,
        sections,
        toc,
        link_counts,
        code_block_count,
        keywords,
    }
}

fn section_spans(
    headings: &[Heading],
    offsets: &[(usize, usize)],
    content_len: usize,
) -> Vec<SectionSpan> {
    headings
        .iter()
        .enumerate()
        .map(|(idx, heading)| {
            let (heading_start, body_start) = offsets[idx];
            let end = headings[idx + 1..]
                .iter()
                .position(|later| later.depth <= heading.depth)
                .map(|rel| offsets[idx + 1 + rel].0)
                .unwrap_or(content_len);
            SectionSpan {
                heading_start,
                body_start,
                end,
            }
        })
        .collect()
}

/// Stable hash of the whole file content.
pub fn content_hash(content: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    hex::encode(hasher.finalize())
}

/// GitHub-style slug for a heading title.
pub fn slugify_heading(title: &str) -> String {
    let plain = heading_inline_to_plain_text(title);
    let normalized: String = plain.nfkd().collect();
    let lower = normalized.to_lowercase();

    let mut out = String::new();
    let mut pending_hyphen = false;
    for ch in lower.chars() {
        if ch.is_alphanumeric() {
            if pending_hyphen && !out.is_empty() {
                out.push('-');
            }
            pending_hyphen = false;
            out.push(ch);
        } else if ch == '-' || ch.is_whitespace() {
            pending_hyphen = true;
        }
    }

    if out.is_empty() {
        EMPTY_SLUG_FALLBACK.to_string()
    } else {
        out
    }
}

pub(crate) fn parse_atx_heading(line: &str) -> Option<(u8, String)> {
    let trimmed = line.strip_prefix("   ").unwrap_or(line);
    let hashes = trimmed.chars().take_while(|c| *c == '#').count();
    if !(1..=6).contains(&hashes) {
        return None;
    }
    let after = trimmed.get(hashes..)?;
    let after = after.strip_prefix(' ')?;
    Some((hashes as u8, after.trim_end().to_string()))
}

#[derive(Clone, Debug)]
struct FenceState {
    ch: char,
    len: usize,
}

/// Returns `Some(new_state)` when the line opens or closes a fence, `None`
/// when the line is not a fence delimiter.
fn fence_update(current: Option<&FenceState>, line: &str) -> Option<Option<FenceState>> {
    let trimmed = line.strip_prefix("   ").unwrap_or(line);
    let (ch, run) = if trimmed.starts_with("```") {
        ('`', count_run(trimmed, '`'))
    } else if trimmed.starts_with("~~~") {
        ('~', count_run(trimmed, '~'))
    } else {
        return None;
    };

    match current {
        None => Some(Some(FenceState {
            ch,
            len: run.max(3),
        })),
        Some(open) if open.ch == ch && run >= open.len => Some(None),
        Some(open) => Some(Some(open.clone())),
    }
}

fn count_run(s: &str, ch: char) -> usize {
    s.chars().take_while(|c| *c == ch).count()
}

/// Minimal CommonMark inline link extractor: `[text](dest)`.
pub(crate) fn extract_inline_link_destinations(line: &str) -> Vec<&str> {
    let mut out = Vec::new();
    let bytes = line.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'[' {
            if let Some(close_bracket) = find_byte(bytes, b']', i + 1) {
                if close_bracket + 1 < bytes.len() && bytes[close_bracket + 1] == b'(' {
                    if let Some(close_paren) = find_byte(bytes, b')', close_bracket + 2) {
                        let dest = line[close_bracket + 2..close_paren].trim();
                        if !dest.is_empty() {
                            out.push(dest);
                        }
                        i = close_paren + 1;
                        continue;
                    }
                }
            }
        }
        i += 1;
    }
    out
}

fn find_byte(haystack: &[u8], needle: u8, start: usize) -> Option<usize> {
    haystack[start..]
        .iter()
        .position(|b| *b == needle)
        .map(|pos| start + pos)
}

fn heading_inline_to_plain_text(input: &str) -> String {
    let mut out = String::new();
    let bytes = input.as_bytes();
    let mut i = 0usize;
    while i < bytes.len() {
        match bytes[i] {
            b'[' => {
                if let Some(close_bracket) = find_byte(bytes, b']', i + 1) {
                    if close_bracket + 1 < bytes.len() && bytes[close_bracket + 1] == b'(' {
                        if let Some(close_paren) = find_byte(bytes, b')', close_bracket + 2) {
                            out.push_str(&input[i + 1..close_bracket]);
                            i = close_paren + 1;
                            continue;
                        }
                    }
                }
                out.push('[');
                i += 1;
            }
            b'`' | b'*' | b'_' => {
                i += 1;
            }
            _ => {
                let ch = input[i..].chars().next().unwrap();
                out.push(ch);
                i += ch.len_utf8();
            }
        }
    }
    out
}
