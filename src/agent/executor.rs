//! Built-in per-job-type handling.
//!
//! Every recognized job type produces exactly one evidence record built only
//! from the job payload (plus `now`). Missing fields fall back to `"unknown"`,
//! an empty mapping, or zero. Fields of the wrong shape are an
//! [`ExecutionError::InvalidPayload`]. Unrecognized job types yield no
//! evidence.

use chrono::{DateTime, Utc};
use serde_json::{Value, json};

use super::kind::JobKind;
use super::{ExecutionError, Executor};
use crate::playbook::KpiDefinition;
use crate::state_machine::{EvidenceRecord, Job, Payload};

/// The default executor shared by catalog-loaded agents.
#[derive(Debug, Clone, Copy, Default)]
pub struct PlaybookExecutor;

impl Executor for PlaybookExecutor {
    fn execute(&self, job: &Job, now: DateTime<Utc>) -> Result<Vec<EvidenceRecord>, ExecutionError> {
        let record = match job.kind() {
            JobKind::EvaluateKpis => evaluate_kpis(job, now)?,
            JobKind::SuggestPlays => suggest_plays(job, now),
            JobKind::IngestMetrics => ingest_metrics(job, now)?,
            JobKind::LogEvidence => log_evidence(job, now)?,
            JobKind::ExecutePlay(_) => execute_play(job, now)?,
            JobKind::PlanJobQueueForPlay => plan_job_queue(job, now),
            JobKind::TrainAgent => train_agent(job, now),
            JobKind::Unrecognized(_) => return Ok(Vec::new()),
        };
        Ok(vec![record])
    }
}

/// The payload value at `key`, or `default` when missing or null.
fn field_or(job: &Job, key: &str, default: Value) -> Value {
    match job.payload.get(key) {
        Some(Value::Null) | None => default,
        Some(value) => value.clone(),
    }
}

/// The mapping at `key`; empty when missing or null.
fn object_field(job: &Job, key: &str) -> Result<Payload, ExecutionError> {
    match job.payload.get(key) {
        Some(Value::Null) | None => Ok(Payload::new()),
        Some(Value::Object(map)) => Ok(map.clone()),
        Some(other) => Err(ExecutionError::invalid(
            key,
            format!("expected an object, got {}", type_name(other)),
        )),
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

fn into_payload(value: Value) -> Payload {
    match value {
        Value::Object(map) => map,
        _ => Payload::new(),
    }
}

fn evaluate_kpis(job: &Job, now: DateTime<Utc>) -> Result<EvidenceRecord, ExecutionError> {
    let kpis = object_field(job, "kpis")?;
    let definitions = object_field(job, "kpi_definitions")?;

    let mut evaluations = Vec::with_capacity(kpis.len());
    for (name, raw) in &kpis {
        let value = raw.as_f64().ok_or_else(|| {
            ExecutionError::invalid(
                &format!("kpis.{name}"),
                format!("expected a number, got {}", type_name(raw)),
            )
        })?;
        let definition = match definitions.get(name) {
            Some(raw_def) => serde_json::from_value::<KpiDefinition>(raw_def.clone())
                .map_err(|e| ExecutionError::invalid(&format!("kpi_definitions.{name}"), e.to_string()))?,
            None => KpiDefinition::default(),
        };
        evaluations.push(json!({
            "kpi": name,
            "value": value,
            "target": definition.target,
            "status": definition.assess(value).to_string(),
        }));
    }

    Ok(EvidenceRecord::for_job(
        job,
        "kpi_evaluated",
        into_payload(json!({ "evaluations": evaluations })),
        now,
    ))
}

fn suggest_plays(job: &Job, now: DateTime<Utc>) -> EvidenceRecord {
    let payload = json!({
        "plays": field_or(job, "suggested_plays", json!([])),
        "rationale": "Based on KPI evaluation and playbook triggers",
    });
    EvidenceRecord::for_job(job, "plays_suggested", into_payload(payload), now)
}

fn ingest_metrics(job: &Job, now: DateTime<Utc>) -> Result<EvidenceRecord, ExecutionError> {
    let metrics = object_field(job, "metrics")?;
    let payload = json!({
        "source": field_or(job, "source", json!("unknown")),
        "metrics_count": metrics.len(),
        "metrics": metrics,
    });
    Ok(EvidenceRecord::for_job(job, "metrics_ingested", into_payload(payload), now))
}

fn log_evidence(job: &Job, now: DateTime<Utc>) -> Result<EvidenceRecord, ExecutionError> {
    let event_type = job.payload_str("event_type").unwrap_or("evidence_logged");
    let data = object_field(job, "evidence_data")?;
    Ok(EvidenceRecord::for_job(job, event_type, data, now))
}

fn execute_play(job: &Job, now: DateTime<Utc>) -> Result<EvidenceRecord, ExecutionError> {
    let params = object_field(job, "params")?;
    let payload = json!({
        "play_id": field_or(job, "play_id", json!("unknown")),
        "handler": field_or(job, "handler", json!("unknown")),
        "params": params,
        "status": "completed",
    });
    Ok(EvidenceRecord::for_job(job, "play_executed", into_payload(payload), now))
}

fn plan_job_queue(job: &Job, now: DateTime<Utc>) -> EvidenceRecord {
    let payload = json!({
        "play_id": field_or(job, "play_id", json!("unknown")),
        "jobs_planned": field_or(job, "job_count", json!(0)),
    });
    EvidenceRecord::for_job(job, "job_queue_planned", into_payload(payload), now)
}

fn train_agent(job: &Job, now: DateTime<Utc>) -> EvidenceRecord {
    let payload = json!({
        "agent_id": field_or(job, "agent_id", json!("unknown")),
        "training_scenarios": field_or(job, "scenarios_count", json!(0)),
    });
    EvidenceRecord::for_job(job, "agent_trained", into_payload(payload), now)
}
