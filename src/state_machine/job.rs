use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::agent::JobKind;

/// Free-form job/evidence payload.
pub type Payload = Map<String, Value>;

/// Tracks the lifecycle status of a job.
///
/// Transitions are monotonic: `queued → running → {succeeded | failed}`, or
/// `queued → failed` when no agent can take the job.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Queued,
    Running,
    Succeeded,
    Failed,
}

impl JobStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, JobStatus::Succeeded | JobStatus::Failed)
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JobStatus::Queued => write!(f, "queued"),
            JobStatus::Running => write!(f, "running"),
            JobStatus::Succeeded => write!(f, "succeeded"),
            JobStatus::Failed => write!(f, "failed"),
        }
    }
}

impl std::str::FromStr for JobStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "queued" => Ok(JobStatus::Queued),
            "running" => Ok(JobStatus::Running),
            "succeeded" => Ok(JobStatus::Succeeded),
            "failed" => Ok(JobStatus::Failed),
            other => Err(format!("unknown job status: {other}")),
        }
    }
}

/// A single unit of work routed to an agent by its `job_type`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Job {
    pub id: String,
    #[serde(rename = "type")]
    pub job_type: String,
    pub company_id: String,
    #[serde(default)]
    pub payload: Payload,
    pub status: JobStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Job {
    /// Creates a queued job with a fresh id.
    pub fn new(
        job_type: impl Into<String>,
        company_id: impl Into<String>,
        payload: Payload,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            job_type: job_type.into(),
            company_id: company_id.into(),
            payload,
            status: JobStatus::Queued,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn kind(&self) -> JobKind {
        JobKind::parse(&self.job_type)
    }

    /// Reads a string field from the payload, if present and a string.
    pub fn payload_str(&self, key: &str) -> Option<&str> {
        self.payload.get(key).and_then(Value::as_str)
    }
}

/// Immutable, append-only fact describing the outcome of a job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvidenceRecord {
    pub id: String,
    pub company_id: String,
    pub job_id: String,
    pub event_type: String,
    pub occurred_at: DateTime<Utc>,
    #[serde(default)]
    pub payload: Payload,
}

impl EvidenceRecord {
    /// Builds a record for `job` with a fresh id.
    pub fn for_job(
        job: &Job,
        event_type: impl Into<String>,
        payload: Payload,
        occurred_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            company_id: job.company_id.clone(),
            job_id: job.id.clone(),
            event_type: event_type.into(),
            occurred_at,
            payload,
        }
    }

    /// The `error` record synthesized when a job's execution fails.
    pub fn error(job: &Job, message: &str, kind: &str, occurred_at: DateTime<Utc>) -> Self {
        let mut payload = Payload::new();
        payload.insert("error".into(), Value::from(message));
        payload.insert("error_type".into(), Value::from(kind));
        Self::for_job(job, "error", payload, occurred_at)
    }
}
