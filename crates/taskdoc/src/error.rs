use std::fmt;

use thiserror::Error;

/// High-level error type shared across taskdoc components.
#[derive(Debug, Error)]
pub enum TaskdocError {
    #[error("invalid address: {0}")]
    InvalidAddress(String),
    #[error("document not found: {0}")]
    DocumentNotFound(String),
    #[error("section not found: {document}#{slug}")]
    SectionNotFound { document: String, slug: String },
    #[error("task not found: {document}#{slug}")]
    TaskNotFound { document: String, slug: String },
    #[error("document has no title heading: {0}")]
    MissingDocumentTitle(String),
    #[error("no available tasks in {0}")]
    NoAvailableTasks(String),
    #[error("batch too large: {count} operations (limit {limit})")]
    BatchTooLarge { count: usize, limit: usize },
    #[error("validation error: {0}")]
    Validation(String),
    #[error("invalid regex pattern: {0}")]
    InvalidRegex(String),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl TaskdocError {
    pub fn context<T: fmt::Display>(self, ctx: T) -> Self {
        match self {
            TaskdocError::InvalidAddress(msg) => {
                TaskdocError::InvalidAddress(format!("{ctx}: {msg}"))
            }
            TaskdocError::Validation(msg) => TaskdocError::Validation(format!("{ctx}: {msg}")),
            TaskdocError::InvalidRegex(msg) => TaskdocError::InvalidRegex(format!("{ctx}: {msg}")),
            other => other,
        }
    }
}
