use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::job::{Job, JobStatus};
use crate::error::ChimeraError;

/// An event that moves a job to its next status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Transition {
    /// An agent picked the job up.
    Start,
    /// The agent returned normally.
    Succeed,
    /// Execution failed, or no agent could take the job.
    Fail,
}

impl fmt::Display for Transition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Transition::Start => write!(f, "start"),
            Transition::Succeed => write!(f, "succeed"),
            Transition::Fail => write!(f, "fail"),
        }
    }
}

/// Drives a `Job` through its lifecycle.
///
/// ```text
/// queued --Start--> running --Succeed--> succeeded
///    |                 `------Fail-----> failed
///    `--------------Fail---------------> failed
/// ```
///
/// `succeeded` and `failed` are terminal; nothing ever leads back to `queued`.
pub struct StateMachine;

impl StateMachine {
    /// Returns the status `transition` leads to from `from`, or `None` if illegal.
    pub fn target(from: JobStatus, transition: Transition) -> Option<JobStatus> {
        match (from, transition) {
            (JobStatus::Queued, Transition::Start) => Some(JobStatus::Running),
            (JobStatus::Queued, Transition::Fail) => Some(JobStatus::Failed),
            (JobStatus::Running, Transition::Succeed) => Some(JobStatus::Succeeded),
            (JobStatus::Running, Transition::Fail) => Some(JobStatus::Failed),
            _ => None,
        }
    }

    /// Applies `transition` to `job`, stamping `updated_at` with `now`.
    pub fn apply(
        job: &mut Job,
        transition: Transition,
        now: DateTime<Utc>,
    ) -> Result<JobStatus, ChimeraError> {
        let next = Self::target(job.status, transition).ok_or_else(|| {
            ChimeraError::InvalidTransition {
                job_id: job.id.clone(),
                from: job.status,
                transition,
            }
        })?;
        job.status = next;
        job.updated_at = now;
        Ok(next)
    }
}
