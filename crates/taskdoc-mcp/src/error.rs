use rmcp::model::ErrorData;
use taskdoc::TaskdocError;

pub type McpError = ErrorData;

pub fn to_mcp_error(err: TaskdocError) -> McpError {
    match &err {
        TaskdocError::InvalidAddress(_)
        | TaskdocError::Validation(_)
        | TaskdocError::InvalidRegex(_)
        | TaskdocError::BatchTooLarge { .. }
        | TaskdocError::DocumentNotFound(_)
        | TaskdocError::SectionNotFound { .. }
        | TaskdocError::TaskNotFound { .. }
        | TaskdocError::MissingDocumentTitle(_)
        | TaskdocError::NoAvailableTasks(_) => ErrorData::invalid_params(err.to_string(), None),
        TaskdocError::Io(_) => ErrorData::internal_error(err.to_string(), None),
    }
}

pub fn invalid_params(message: impl Into<String>) -> McpError {
    ErrorData::invalid_params(message.into(), None)
}
