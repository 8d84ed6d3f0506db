//! Task metadata fields embedded in section bodies.
//!
//! A field is a line-start match of one of four markup flavors:
//! `- Label: value`, `* Label: value`, `**Label:** value`, or `Label: value`.
//! Labels match case-sensitively. The flavor is kept as a tagged marker on
//! read so edits preserve it; newly added lines default to the `-` marker.

use std::fmt;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

pub const STATUS_LABEL: &str = "Status";
pub const WORKFLOW_LABEL: &str = "Workflow";
pub const MAIN_WORKFLOW_LABEL: &str = "Main-Workflow";
pub const LINK_LABEL: &str = "Link";
pub const COMPLETED_LABEL: &str = "Completed";
pub const NOTE_LABEL: &str = "Note";

/// Markup flavor of a metadata line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldMarker {
    Dash,
    Star,
    Bold,
    Plain,
}

impl FieldMarker {
    pub fn render(self, label: &str, value: &str) -> String {
        let line = match self {
            FieldMarker::Dash => format!("- {label}: {value}"),
            FieldMarker::Star => format!("* {label}: {value}"),
            FieldMarker::Bold => format!("**{label}:** {value}"),
            FieldMarker::Plain => format!("{label}: {value}"),
        };
        line.trim_end().to_string()
    }
}

/// A parsed metadata field. An empty value is a present-but-empty field, not
/// an absent one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldValue {
    pub marker: FieldMarker,
    pub value: String,
}

/// Task lifecycle status. The set is open: unrecognized values round-trip
/// through [`TaskStatus::Other`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskStatus {
    Pending,
    InProgress,
    Completed,
    Other(String),
}

impl TaskStatus {
    pub fn parse(raw: &str) -> Self {
        match raw.trim().to_lowercase().as_str() {
            "" | "pending" => TaskStatus::Pending,
            "in_progress" | "in-progress" => TaskStatus::InProgress,
            "completed" => TaskStatus::Completed,
            _ => TaskStatus::Other(raw.trim().to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            TaskStatus::Pending => "pending",
            TaskStatus::InProgress => "in_progress",
            TaskStatus::Completed => "completed",
            TaskStatus::Other(raw) => raw,
        }
    }

    pub fn is_completed(&self) -> bool {
        matches!(self, TaskStatus::Completed)
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for TaskStatus {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for TaskStatus {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Ok(TaskStatus::parse(&raw))
    }
}

/// Finds the first `label` field in `body`.
pub fn extract_field(body: &str, label: &str) -> Option<FieldValue> {
    body.lines().find_map(|line| match_field_line(line, label))
}

/// Rewrites the first `label` line in place, preserving its marker. `None`
/// when the field is absent.
pub fn update_field(body: &str, label: &str, value: &str) -> Option<String> {
    let mut lines: Vec<&str> = body.split('\n').collect();
    let (index, existing) = lines
        .iter()
        .enumerate()
        .find_map(|(idx, line)| match_field_line(line, label).map(|field| (idx, field)))?;
    let rendered = existing.marker.render(label, value);
    lines[index] = &rendered;
    Some(lines.join("\n"))
}

/// Prepends a field line to the body using the given marker.
pub fn prepend_field(body: &str, marker: FieldMarker, label: &str, value: &str) -> String {
    let line = marker.render(label, value);
    let rest = body.trim_start_matches('\n');
    if rest.is_empty() {
        format!("\n{line}\n")
    } else {
        format!("\n{line}\n\n{rest}")
    }
}

/// Appends a `-`-marker field line at the end of the body.
pub fn append_field(body: &str, label: &str, value: &str) -> String {
    let line = FieldMarker::Dash.render(label, value);
    let trimmed = body.trim_end_matches('\n');
    if trimmed.is_empty() {
        format!("\n{line}\n")
    } else {
        format!("{trimmed}\n{line}\n")
    }
}

/// First task link: a `Link:` field, or the remainder of the first `→ `
/// arrow line.
pub fn extract_link(body: &str) -> Option<String> {
    if let Some(field) = extract_field(body, LINK_LABEL) {
        if !field.value.is_empty() {
            return Some(field.value);
        }
    }
    body.lines().find_map(|line| {
        line.split_once("→ ")
            .map(|(_, rest)| rest.trim().to_string())
            .filter(|rest| !rest.is_empty())
    })
}

fn match_field_line(line: &str, label: &str) -> Option<FieldValue> {
    if let Some(rest) = line.strip_prefix("- ") {
        return plain_value(rest, label).map(|value| FieldValue {
            marker: FieldMarker::Dash,
            value,
        });
    }
    if let Some(rest) = line.strip_prefix("* ") {
        return plain_value(rest, label).map(|value| FieldValue {
            marker: FieldMarker::Star,
            value,
        });
    }
    if let Some(rest) = line.strip_prefix("**") {
        // A bold open without its close (`**Label: value`) is not a field.
        let rest = rest.strip_prefix(label)?;
        let rest = rest.strip_prefix(":**")?;
        return Some(FieldValue {
            marker: FieldMarker::Bold,
            value: rest.trim().to_string(),
        });
    }
    plain_value(line, label).map(|value| FieldValue {
        marker: FieldMarker::Plain,
        value,
    })
}

fn plain_value(rest: &str, label: &str) -> Option<String> {
    let rest = rest.strip_prefix(label)?;
    let rest = rest.strip_prefix(':')?;
    Some(rest.trim().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn all_four_flavors_match() {
        for (line, marker) in [
            ("- Status: pending", FieldMarker::Dash),
            ("* Status: pending", FieldMarker::Star),
            ("**Status:** pending", FieldMarker::Bold),
            ("Status: pending", FieldMarker::Plain),
        ] {
            let field = match_field_line(line, STATUS_LABEL).expect(line);
            assert_eq!(field.marker, marker, "{line}");
            assert_eq!(field.value, "pending");
        }
    }

    #[test]
    fn label_match_is_case_sensitive() {
        assert!(match_field_line("- status: pending", STATUS_LABEL).is_none());
        assert!(match_field_line("- STATUS: pending", STATUS_LABEL).is_none());
    }

    #[test]
    fn unclosed_bold_is_not_a_field() {
        assert!(match_field_line("**Status: pending", STATUS_LABEL).is_none());
    }

    #[test]
    fn empty_value_parses_to_empty_string() {
        let field = match_field_line("- Status:", STATUS_LABEL).unwrap();
        assert_eq!(field.value, "");
    }

    #[test]
    fn update_preserves_marker() {
        let body = "\n**Status:** pending\n\nDetails.\n";
        let updated = update_field(body, STATUS_LABEL, "completed").unwrap();
        assert!(updated.contains("**Status:** completed"));
        assert!(updated.contains("Details."));
    }

    #[test]
    fn append_uses_dash_marker() {
        let body = "\nWork.\n";
        let appended = append_field(body, NOTE_LABEL, "done");
        assert!(appended.ends_with("- Note: done\n"));
    }

    #[test]
    fn link_prefers_field_over_arrow() {
        let body = "- Link: https://a.example\n→ https://b.example\n";
        assert_eq!(extract_link(body).as_deref(), Some("https://a.example"));
        assert_eq!(
            extract_link("see → https://b.example\n").as_deref(),
            Some("https://b.example")
        );
    }

    #[test]
    fn status_parse_round_trips() {
        assert_eq!(TaskStatus::parse("completed"), TaskStatus::Completed);
        assert_eq!(TaskStatus::parse(""), TaskStatus::Pending);
        assert_eq!(TaskStatus::parse("in-progress"), TaskStatus::InProgress);
        assert_eq!(
            TaskStatus::parse("blocked"),
            TaskStatus::Other("blocked".into())
        );
    }
}
