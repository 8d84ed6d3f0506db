//! The workflow-prompt registry consumed by task tooling.
//!
//! Prompts are opaque to the store: tasks carry workflow names, and the
//! registry resolves them at response-building time. Unknown names degrade
//! gracefully (the enrichment is omitted) and never fail a task operation.

use std::collections::BTreeMap;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Registry name prefix for workflow prompts.
pub const WORKFLOW_PREFIX: &str = "workflow_";
/// Registry name prefix for guide prompts.
pub const GUIDE_PREFIX: &str = "guide_";

/// An opaque prompt record.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct WorkflowPrompt {
    pub name: String,
    pub description: String,
    pub content: String,
    #[serde(default)]
    pub when_to_use: Vec<String>,
}

/// Lookup interface over the prompt catalog.
pub trait WorkflowRegistry: Send + Sync {
    fn lookup(&self, name: &str) -> Option<WorkflowPrompt>;
    fn list(&self) -> Vec<WorkflowPrompt>;
}

/// In-memory registry keyed by prompt name.
#[derive(Debug, Default)]
pub struct StaticWorkflowRegistry {
    prompts: BTreeMap<String, WorkflowPrompt>,
}

impl StaticWorkflowRegistry {
    pub fn new(prompts: impl IntoIterator<Item = WorkflowPrompt>) -> Self {
        Self {
            prompts: prompts
                .into_iter()
                .map(|prompt| (prompt.name.clone(), prompt))
                .collect(),
        }
    }
}

impl WorkflowRegistry for StaticWorkflowRegistry {
    fn lookup(&self, name: &str) -> Option<WorkflowPrompt> {
        if let Some(found) = self.prompts.get(name) {
            return Some(found.clone());
        }
        // Tolerate lookups with the registry prefix omitted.
        for prefix in [WORKFLOW_PREFIX, GUIDE_PREFIX] {
            if let Some(found) = self.prompts.get(&format!("{prefix}{name}")) {
                return Some(found.clone());
            }
        }
        None
    }

    fn list(&self) -> Vec<WorkflowPrompt> {
        self.prompts.values().cloned().collect()
    }
}
