use chrono::{DateTime, Utc};
use serde_json::Value;

use super::kpi::{KpiDefinitions, KpiSnapshot};
use super::rules::{Play, RuleEvaluator};
use crate::state_machine::{Job, Payload};

/// Expands triggered plays into queued jobs.
pub struct JobFactory;

impl JobFactory {
    /// Plays that trigger for `snapshot`, in catalog order.
    ///
    /// Includes plays with an empty job plan, which trigger but emit no jobs.
    pub fn triggered<'a>(
        snapshot: &KpiSnapshot,
        plays: &'a [Play],
        definitions: &KpiDefinitions,
    ) -> Vec<&'a Play> {
        plays
            .iter()
            .filter(|play| RuleEvaluator::evaluate(snapshot, play, definitions))
            .collect()
    }

    /// One job per job-plan step of every triggered play.
    ///
    /// Output order is catalog order, then job-plan order: all jobs of an
    /// earlier play precede all jobs of a later one.
    pub fn generate(
        company_id: &str,
        snapshot: &KpiSnapshot,
        plays: &[Play],
        definitions: &KpiDefinitions,
        now: DateTime<Utc>,
    ) -> Vec<Job> {
        Self::triggered(snapshot, plays, definitions)
            .into_iter()
            .flat_map(|play| Self::jobs_for_play(company_id, play, now))
            .collect()
    }

    fn jobs_for_play(company_id: &str, play: &Play, now: DateTime<Utc>) -> Vec<Job> {
        play.job_plan
            .iter()
            .map(|step| {
                let mut payload = Payload::new();
                payload.insert("play_id".into(), Value::from(play.id.as_str()));
                payload.insert("play_name".into(), Value::from(play.name.as_str()));
                payload.insert(
                    "handler".into(),
                    step.handler.as_deref().map_or(Value::Null, Value::from),
                );
                payload.insert("params".into(), Value::Object(step.params.clone()));
                payload.insert("created_at".into(), Value::from(now.to_rfc3339()));
                Job::new(step.job_type.as_str(), company_id, payload, now)
            })
            .collect()
    }
}
