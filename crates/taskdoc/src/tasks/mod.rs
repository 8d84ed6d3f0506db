//! Task model and engine.

pub mod metadata;

mod engine;

pub use engine::{
    MAX_BATCH_OPERATIONS, TaskCompletion, TaskData, TaskEngine, TaskSummary,
};
pub use metadata::{FieldMarker, FieldValue, TaskStatus};
