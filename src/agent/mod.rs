//! Capability-tagged agents and the job execution core.

mod executor;
mod kind;

use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::state_machine::{EvidenceRecord, Job, Payload};

pub use executor::PlaybookExecutor;
pub use kind::{EXECUTE_PLAY_PREFIX, JobKind};

/// Raised by an [`Executor`] when a job cannot be processed.
#[derive(Debug, Error)]
pub enum ExecutionError {
    #[error("invalid payload field `{field}`: {reason}")]
    InvalidPayload { field: String, reason: String },

    #[error("{0}")]
    Failed(String),

    /// The executor panicked; carries the panic message.
    #[error("executor panicked: {0}")]
    Panicked(String),
}

impl ExecutionError {
    pub fn invalid(field: &str, reason: impl Into<String>) -> Self {
        ExecutionError::InvalidPayload {
            field: field.to_string(),
            reason: reason.into(),
        }
    }

    /// Stable name recorded as `error_type` in `error` evidence.
    pub fn kind(&self) -> &'static str {
        match self {
            ExecutionError::InvalidPayload { .. } => "InvalidPayload",
            ExecutionError::Failed(_) => "ExecutionFailed",
            ExecutionError::Panicked(_) => "Panicked",
        }
    }
}

/// Turns a job into evidence. Must not block; `now` stamps `occurred_at`.
pub trait Executor: Send + Sync {
    fn execute(&self, job: &Job, now: DateTime<Utc>) -> Result<Vec<EvidenceRecord>, ExecutionError>;
}

/// Agent entry as it appears in `agents.yml`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentSpec {
    pub id: String,
    #[serde(default)]
    pub handles: Vec<String>,
    /// Any other keys (description, owner, ...), kept as metadata.
    #[serde(flatten)]
    pub extra: Payload,
}

/// A read-only capability holder that executes jobs of matching type.
#[derive(Clone)]
pub struct Agent {
    pub name: String,
    pub capabilities: BTreeSet<String>,
    pub metadata: Payload,
    executor: Arc<dyn Executor>,
}

impl fmt::Debug for Agent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Agent")
            .field("name", &self.name)
            .field("capabilities", &self.capabilities)
            .field("metadata", &self.metadata)
            .finish_non_exhaustive()
    }
}

impl Agent {
    /// An agent backed by the built-in [`PlaybookExecutor`].
    pub fn new<I, S>(name: impl Into<String>, capabilities: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            name: name.into(),
            capabilities: capabilities.into_iter().map(Into::into).collect(),
            metadata: Payload::new(),
            executor: Arc::new(PlaybookExecutor),
        }
    }

    /// Builds an agent from its catalog entry; the whole entry becomes metadata.
    pub fn from_spec(spec: &AgentSpec) -> Self {
        let mut metadata = spec.extra.clone();
        metadata.insert("id".into(), Value::from(spec.id.as_str()));
        metadata.insert("handles".into(), Value::from(spec.handles.clone()));
        Self::new(spec.id.as_str(), spec.handles.iter().cloned()).with_metadata(metadata)
    }

    pub fn with_metadata(mut self, metadata: Payload) -> Self {
        self.metadata = metadata;
        self
    }

    /// Swaps the execution strategy, e.g. for an integration-backed agent.
    pub fn with_executor(mut self, executor: Arc<dyn Executor>) -> Self {
        self.executor = executor;
        self
    }

    pub fn can_handle(&self, job_type: &str) -> bool {
        self.capabilities.contains(job_type)
    }

    pub fn handle(&self, job: &Job, now: DateTime<Utc>) -> Result<Vec<EvidenceRecord>, ExecutionError> {
        self.executor.execute(job, now)
    }
}
