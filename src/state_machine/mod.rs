//! Jobs, evidence records, and the lifecycle transitions between job states.

mod job;
mod state;

pub use job::{EvidenceRecord, Job, JobStatus, Payload};
pub use state::{StateMachine, Transition};
