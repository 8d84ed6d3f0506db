//! Taskdoc: an addressable, sectioned store over structured markdown
//! documents with tool-style task management.
//!
//! The store is organized as a handful of tightly coupled subsystems:
//! virtual-path and section [addressing](address), the parsed-document
//! [cache](document), the [section editor](editor) and [task engine](tasks),
//! cross-document [references](reference), and lightweight
//! [analysis](analysis). [`search`] and the opaque [`workflow`] registry sit
//! alongside them.

pub mod address;
pub mod analysis;
pub mod document;
pub mod editor;
pub mod error;
pub mod reference;
pub mod search;
pub mod tasks;
pub mod workflow;
pub mod workspace;

pub use address::{
    AddressCache, AddressCacheStats, DocumentAddress, SectionAddress, TaskAddress,
    parse_document_address, parse_section_address, parse_task_address, parse_task_list,
};
pub use analysis::{
    ClassifiedReference, Keyword, KeywordSource, ReferenceStatus, RelatedDocument, Relevance,
    RelevanceFactor, RelevanceOptions, classify_references, extract_keywords,
    find_related_documents,
};
pub use document::{
    CachedDocument, DocumentCache, DocumentFingerprint, DocumentMetadata, DocumentSummary,
    Heading, LinkCounts, content_hash, slugify_heading,
};
pub use editor::{InsertPosition, SectionEditor};
pub use error::TaskdocError;
pub use reference::{RawReference, ReferenceTarget, ReferencedDocument, extract_references};
pub use search::{
    DocumentMatches, SearchMatch, SearchRequest, SearchResults, SearchType, search_documents,
};
pub use tasks::{
    MAX_BATCH_OPERATIONS, TaskCompletion, TaskData, TaskEngine, TaskStatus, TaskSummary,
};
pub use workflow::{StaticWorkflowRegistry, WorkflowPrompt, WorkflowRegistry};
pub use workspace::{
    COORDINATOR_ACTIVE_PATH, WORKSPACE_ENV_VAR, WorkspacePaths, is_archived_path,
    is_coordinator_path,
};
