use std::fmt;

/// Prefix shared by the family of play-execution job types.
pub const EXECUTE_PLAY_PREFIX: &str = "EXECUTE_PLAY_";

/// The closed set of job kinds the execution core understands.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum JobKind {
    EvaluateKpis,
    SuggestPlays,
    IngestMetrics,
    LogEvidence,
    /// `EXECUTE_PLAY_<suffix>`; holds the suffix.
    ExecutePlay(String),
    PlanJobQueueForPlay,
    TrainAgent,
    /// Any other job type, kept verbatim.
    Unrecognized(String),
}

impl JobKind {
    /// Exact match for the fixed types, prefix match for `EXECUTE_PLAY_*`.
    pub fn parse(job_type: &str) -> Self {
        match job_type {
            "EVALUATE_KPIS" => JobKind::EvaluateKpis,
            "SUGGEST_PLAYS" => JobKind::SuggestPlays,
            "INGEST_METRICS" => JobKind::IngestMetrics,
            "LOG_EVIDENCE" => JobKind::LogEvidence,
            "PLAN_JOB_QUEUE_FOR_PLAY" => JobKind::PlanJobQueueForPlay,
            "TRAIN_AGENT" => JobKind::TrainAgent,
            other => match other.strip_prefix(EXECUTE_PLAY_PREFIX) {
                Some(suffix) => JobKind::ExecutePlay(suffix.to_string()),
                None => JobKind::Unrecognized(other.to_string()),
            },
        }
    }

    pub fn is_recognized(&self) -> bool {
        !matches!(self, JobKind::Unrecognized(_))
    }
}

impl fmt::Display for JobKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JobKind::EvaluateKpis => write!(f, "EVALUATE_KPIS"),
            JobKind::SuggestPlays => write!(f, "SUGGEST_PLAYS"),
            JobKind::IngestMetrics => write!(f, "INGEST_METRICS"),
            JobKind::LogEvidence => write!(f, "LOG_EVIDENCE"),
            JobKind::ExecutePlay(suffix) => write!(f, "{EXECUTE_PLAY_PREFIX}{suffix}"),
            JobKind::PlanJobQueueForPlay => write!(f, "PLAN_JOB_QUEUE_FOR_PLAY"),
            JobKind::TrainAgent => write!(f, "TRAIN_AGENT"),
            JobKind::Unrecognized(raw) => write!(f, "{raw}"),
        }
    }
}
