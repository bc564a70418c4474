use thiserror::Error;

use crate::state_machine::{JobStatus, Transition};

#[derive(Debug, Error)]
pub enum ChimeraError {
    #[error("Config error: {0}")]
    Config(String),

    #[error("Company not found: {0}")]
    CompanyNotFound(String),

    #[error("Job not found: {0}")]
    JobNotFound(String),

    #[error("Job {0} is already held by this orchestrator")]
    DuplicateJob(String),

    #[error("Job {job_id} cannot {transition} from status {from}")]
    InvalidTransition {
        job_id: String,
        from: JobStatus,
        transition: Transition,
    },

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML parse error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
}

/// Failures of the persistence collaborator.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store IO failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("store serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("store lock poisoned")]
    Poisoned,
}

pub type StoreResult<T> = std::result::Result<T, StoreError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_transition_display() {
        let err = ChimeraError::InvalidTransition {
            job_id: "job-1".into(),
            from: JobStatus::Succeeded,
            transition: Transition::Start,
        };
        assert_eq!(
            err.to_string(),
            "Job job-1 cannot start from status succeeded"
        );
    }

    #[test]
    fn store_error_converts() {
        let err: ChimeraError = StoreError::Poisoned.into();
        assert_eq!(err.to_string(), "Store error: store lock poisoned");
    }

    #[test]
    fn error_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<ChimeraError>();
    }
}
