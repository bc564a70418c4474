use std::any::Any;
use std::collections::{BTreeMap, HashMap};
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, error, info, warn};

use crate::agent::ExecutionError;
use crate::error::ChimeraError;
use crate::router::AgentRegistry;
use crate::state_machine::{EvidenceRecord, Job, JobStatus, Payload, StateMachine, Transition};

/// Source of the current time; injected so cycles are reproducible in tests.
pub type Clock = Arc<dyn Fn() -> DateTime<Utc> + Send + Sync>;

/// What happens when no agent can take a job.
///
/// Either way the job ends `failed`. `Silent` emits no evidence, while an
/// execution failure always emits an `error` record. `RecordEvidence` closes
/// that gap with a `routing_failed` record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoutingFailurePolicy {
    #[default]
    Silent,
    RecordEvidence,
}

/// Owns the job queue and the evidence log, and runs jobs through agents.
///
/// Single-writer: one instance must not be shared by concurrent cycles. Run
/// one orchestrator per concurrent cycle, or serialize `run_cycle` calls.
pub struct Orchestrator {
    registry: AgentRegistry,
    /// Enqueue order.
    jobs: Vec<Job>,
    index: HashMap<String, usize>,
    evidence: Vec<EvidenceRecord>,
    clock: Clock,
    routing_failure: RoutingFailurePolicy,
}

impl Orchestrator {
    pub fn new(registry: AgentRegistry) -> Self {
        Self {
            registry,
            jobs: Vec::new(),
            index: HashMap::new(),
            evidence: Vec::new(),
            clock: Arc::new(Utc::now),
            routing_failure: RoutingFailurePolicy::default(),
        }
    }

    pub fn with_clock<F>(mut self, clock: F) -> Self
    where
        F: Fn() -> DateTime<Utc> + Send + Sync + 'static,
    {
        self.clock = Arc::new(clock);
        self
    }

    pub fn with_routing_failure(mut self, policy: RoutingFailurePolicy) -> Self {
        self.routing_failure = policy;
        self
    }

    pub fn registry(&self) -> &AgentRegistry {
        &self.registry
    }

    pub fn now(&self) -> DateTime<Utc> {
        (self.clock)()
    }

    /// Takes ownership of a job. Ids are unique per orchestrator, so a job
    /// that already left `queued` can never be queued again.
    pub fn enqueue(&mut self, job: Job) -> Result<(), ChimeraError> {
        if self.index.contains_key(&job.id) {
            return Err(ChimeraError::DuplicateJob(job.id));
        }
        info!(
            event = "job.enqueued",
            job_id = %job.id,
            job_type = %job.job_type,
            company_id = %job.company_id,
        );
        self.index.insert(job.id.clone(), self.jobs.len());
        self.jobs.push(job);
        Ok(())
    }

    pub fn enqueue_all<I>(&mut self, jobs: I) -> Result<usize, ChimeraError>
    where
        I: IntoIterator<Item = Job>,
    {
        let mut count = 0;
        for job in jobs {
            self.enqueue(job)?;
            count += 1;
        }
        Ok(count)
    }

    /// Runs every job that is `queued` when the call starts, in enqueue order.
    ///
    /// Returns only the evidence produced by this call; the cumulative log is
    /// available through [`Orchestrator::evidence`]. Never fails: routing and
    /// execution failures end up in job status and evidence.
    pub fn run_cycle(&mut self) -> Vec<EvidenceRecord> {
        let queued: Vec<usize> = self
            .jobs
            .iter()
            .enumerate()
            .filter(|(_, job)| job.status == JobStatus::Queued)
            .map(|(idx, _)| idx)
            .collect();

        debug!(event = "cycle.started", queued = queued.len());
        let mut batch = Vec::new();
        for idx in queued {
            let records = self.process(idx);
            self.evidence.extend(records.iter().cloned());
            batch.extend(records);
        }
        debug!(event = "cycle.finished", evidence = batch.len());
        batch
    }

    fn process(&mut self, idx: usize) -> Vec<EvidenceRecord> {
        let now = (self.clock)();
        let job = &mut self.jobs[idx];

        let Some(agent) = self.registry.select(&job.job_type) else {
            warn!(
                event = "job.unroutable",
                job_id = %job.id,
                job_type = %job.job_type,
                "no agent handles job type"
            );
            advance(job, Transition::Fail, now);
            return match self.routing_failure {
                RoutingFailurePolicy::Silent => Vec::new(),
                RoutingFailurePolicy::RecordEvidence => vec![routing_failed(job, now)],
            };
        };

        if !advance(job, Transition::Start, now) {
            return Vec::new();
        }
        debug!(event = "job.started", job_id = %job.id, agent = %agent.name);

        let outcome = panic::catch_unwind(AssertUnwindSafe(|| agent.handle(job, now)))
            .unwrap_or_else(|payload| Err(ExecutionError::Panicked(panic_message(payload.as_ref()))));
        let records = match outcome {
            Ok(records) => {
                advance(job, Transition::Succeed, (self.clock)());
                info!(
                    event = "job.succeeded",
                    job_id = %job.id,
                    agent = %agent.name,
                    evidence = records.len(),
                );
                records
            }
            Err(err) => {
                let at = (self.clock)();
                advance(job, Transition::Fail, at);
                error!(
                    event = "job.failed",
                    job_id = %job.id,
                    agent = %agent.name,
                    error_type = err.kind(),
                    error = %err,
                );
                vec![EvidenceRecord::error(job, &err.to_string(), err.kind(), at)]
            }
        };
        job.updated_at = (self.clock)();
        records
    }

    pub fn job(&self, job_id: &str) -> Option<&Job> {
        self.index.get(job_id).map(|&idx| &self.jobs[idx])
    }

    pub fn status(&self, job_id: &str) -> Option<JobStatus> {
        self.job(job_id).map(|job| job.status)
    }

    /// All held jobs in enqueue order.
    pub fn jobs(&self) -> &[Job] {
        &self.jobs
    }

    /// The cumulative evidence log across cycles.
    pub fn evidence(&self) -> &[EvidenceRecord] {
        &self.evidence
    }

    pub fn evidence_for(&self, company_id: &str) -> Vec<&EvidenceRecord> {
        self.evidence
            .iter()
            .filter(|rec| rec.company_id == company_id)
            .collect()
    }

    pub fn evidence_for_job(&self, job_id: &str) -> Vec<&EvidenceRecord> {
        self.evidence
            .iter()
            .filter(|rec| rec.job_id == job_id)
            .collect()
    }

    pub fn status_counts(&self) -> BTreeMap<JobStatus, usize> {
        let mut counts = BTreeMap::new();
        for job in &self.jobs {
            *counts.entry(job.status).or_insert(0) += 1;
        }
        counts
    }
}

fn advance(job: &mut Job, transition: Transition, now: DateTime<Utc>) -> bool {
    match StateMachine::apply(job, transition, now) {
        Ok(_) => true,
        Err(err) => {
            error!(event = "job.invalid_transition", job_id = %job.id, error = %err);
            false
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(msg) = payload.downcast_ref::<&str>() {
        (*msg).to_string()
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.clone()
    } else {
        "unknown panic".to_string()
    }
}

fn routing_failed(job: &Job, now: DateTime<Utc>) -> EvidenceRecord {
    let mut payload = Payload::new();
    payload.insert(
        "error".into(),
        Value::from(format!("no agent handles job type {}", job.job_type)),
    );
    payload.insert("error_type".into(), Value::from("NoAgent"));
    payload.insert("job_type".into(), Value::from(job.job_type.as_str()));
    EvidenceRecord::for_job(job, "routing_failed", payload, now)
}
