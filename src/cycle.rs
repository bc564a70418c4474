//! The growth cycle: evaluate plays for a KPI snapshot, generate jobs, run
//! them once through an orchestrator and persist the results.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use tracing::info;
use uuid::Uuid;

use crate::catalog::Catalog;
use crate::company::KpiReading;
use crate::error::ChimeraError;
use crate::orchestrator::{Clock, Orchestrator, RoutingFailurePolicy};
use crate::playbook::{JobFactory, KpiSnapshot};
use crate::state_machine::{EvidenceRecord, Job, JobStatus, Payload};
use crate::store::Store;

/// Summary of one play returned by [`evaluate_plays`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TriggeredPlay {
    pub id: String,
    pub name: String,
    pub intent: String,
    pub impact_hypothesis: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlayEvaluation {
    pub triggered: Vec<TriggeredPlay>,
    pub total_plays: usize,
    pub triggered_count: usize,
}

/// Which plays would trigger for `snapshot`, without creating any jobs.
pub fn evaluate_plays(snapshot: &KpiSnapshot, catalog: &Catalog) -> PlayEvaluation {
    let triggered: Vec<TriggeredPlay> = JobFactory::triggered(snapshot, &catalog.plays, &catalog.kpis)
        .into_iter()
        .map(|play| TriggeredPlay {
            id: play.id.clone(),
            name: play.name.clone(),
            intent: play.intent.clone(),
            impact_hypothesis: play.impact_hypothesis.clone(),
        })
        .collect();
    PlayEvaluation {
        triggered_count: triggered.len(),
        total_plays: catalog.plays.len(),
        triggered,
    }
}

/// The KPI snapshot of the bundled demo company: low traffic, funnel
/// conversion just under target and no marketplace orders yet.
pub fn demo_snapshot() -> KpiSnapshot {
    [
        ("revenue_total_30d", 3200.0),
        ("cr_main_funnel", 0.04),
        ("sessions_main_30d", 800.0),
        ("cac_paid", 45.0),
        ("retention_60d", 0.22),
        ("nps", 35.0),
        ("aov", 45.0),
        ("fiverr_impressions_7d", 50.0),
        ("fiverr_orders_30d", 0.0),
        ("shopify_sessions_30d", 150.0),
        ("shopify_orders_30d", 2.0),
    ]
    .into_iter()
    .map(|(name, value)| (name.to_string(), value))
    .collect()
}

#[derive(Debug, Clone, PartialEq)]
pub struct CycleRequest {
    pub company_id: String,
    pub snapshot: KpiSnapshot,
}

/// What a caller gets back from a cycle. Always `completed`: failed jobs show
/// up in `status_counts` and evidence, never as an error.
#[derive(Debug, Clone, Serialize)]
pub struct CycleReport {
    pub cycle_id: String,
    pub company_id: String,
    pub jobs_created: usize,
    /// Names of every triggered play in catalog order, including plays whose
    /// job plan is empty.
    pub plays_triggered: Vec<String>,
    pub evidence_count: usize,
    pub status_counts: BTreeMap<JobStatus, usize>,
    pub status: String,
    pub evidence: Vec<EvidenceRecord>,
}

/// Drives cycles against a loaded catalog.
pub struct GrowthCycle {
    catalog: Catalog,
    seed_kpi_evaluation: bool,
    routing_failure: RoutingFailurePolicy,
    clock: Option<Clock>,
}

impl GrowthCycle {
    pub fn new(catalog: Catalog) -> Self {
        Self {
            catalog,
            seed_kpi_evaluation: true,
            routing_failure: RoutingFailurePolicy::default(),
            clock: None,
        }
    }

    /// Queue an `EVALUATE_KPIS` job ahead of the play jobs.
    pub fn with_kpi_evaluation(mut self, enabled: bool) -> Self {
        self.seed_kpi_evaluation = enabled;
        self
    }

    pub fn with_routing_failure(mut self, policy: RoutingFailurePolicy) -> Self {
        self.routing_failure = policy;
        self
    }

    pub fn with_clock<F>(mut self, clock: F) -> Self
    where
        F: Fn() -> DateTime<Utc> + Send + Sync + 'static,
    {
        self.clock = Some(std::sync::Arc::new(clock));
        self
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    /// A fresh orchestrator over the catalog's agents.
    pub fn orchestrator(&self) -> Orchestrator {
        let orch = Orchestrator::new(self.catalog.registry()).with_routing_failure(self.routing_failure);
        match &self.clock {
            Some(clock) => {
                let clock = clock.clone();
                orch.with_clock(move || clock())
            }
            None => orch,
        }
    }

    /// Runs one cycle for a company that must already exist in `store`.
    pub fn run(&self, request: &CycleRequest, store: &dyn Store) -> Result<CycleReport, ChimeraError> {
        ensure_company(store, &request.company_id)?;
        let mut orch = self.orchestrator();
        self.run_on(&mut orch, &request.company_id, &request.snapshot, store)
    }

    /// Records `metrics` as KPI readings, runs an `INGEST_METRICS` job, then
    /// runs the play cycle with the metrics as the snapshot on the same
    /// orchestrator.
    pub fn ingest(
        &self,
        company_id: &str,
        source: &str,
        metrics: &KpiSnapshot,
        store: &dyn Store,
    ) -> Result<CycleReport, ChimeraError> {
        ensure_company(store, company_id)?;
        let mut orch = self.orchestrator();
        let now = orch.now();

        for (name, value) in metrics {
            let reading = KpiReading::assess(company_id, name, *value, self.catalog.kpis.get(name), now);
            store.record_kpi(reading)?;
        }

        let mut payload = Payload::new();
        payload.insert("source".into(), Value::from(source));
        payload.insert("metrics".into(), serde_json::to_value(metrics)?);
        let ingest = Job::new("INGEST_METRICS", company_id, payload, now);
        let ingest_id = ingest.id.clone();
        store.put_job(&ingest)?;
        orch.enqueue(ingest)?;

        let ingested = orch.run_cycle();
        if let Some(job) = orch.job(&ingest_id) {
            store.put_job(job)?;
        }
        store.append_evidence(&ingested)?;
        info!(
            event = "ingest.completed",
            company_id,
            source,
            metrics = metrics.len(),
        );

        let mut report = self.run_on(&mut orch, company_id, metrics, store)?;
        report.jobs_created += 1;
        report.evidence_count += ingested.len();
        let mut evidence = ingested;
        evidence.append(&mut report.evidence);
        report.evidence = evidence;
        Ok(report)
    }

    fn run_on(
        &self,
        orch: &mut Orchestrator,
        company_id: &str,
        snapshot: &KpiSnapshot,
        store: &dyn Store,
    ) -> Result<CycleReport, ChimeraError> {
        let cycle_id = Uuid::new_v4().to_string();
        let now = orch.now();
        info!(event = "cycle.started", cycle_id = %cycle_id, company_id, kpis = snapshot.len());

        let mut jobs = Vec::new();
        if self.seed_kpi_evaluation {
            jobs.push(self.kpi_evaluation_job(company_id, snapshot, now)?);
        }
        let plays_triggered: Vec<String> =
            JobFactory::triggered(snapshot, &self.catalog.plays, &self.catalog.kpis)
                .into_iter()
                .map(|play| play.name.clone())
                .collect();
        jobs.extend(JobFactory::generate(
            company_id,
            snapshot,
            &self.catalog.plays,
            &self.catalog.kpis,
            now,
        ));

        let ids: Vec<String> = jobs.iter().map(|job| job.id.clone()).collect();
        store.put_jobs(&jobs)?;
        orch.enqueue_all(jobs)?;

        let evidence = orch.run_cycle();

        let finished = ids
            .iter()
            .map(|id| {
                orch.job(id)
                    .cloned()
                    .ok_or_else(|| ChimeraError::JobNotFound(id.clone()))
            })
            .collect::<Result<Vec<_>, _>>()?;
        store.put_jobs(&finished)?;
        store.append_evidence(&evidence)?;

        let report = CycleReport {
            cycle_id,
            company_id: company_id.to_string(),
            jobs_created: ids.len(),
            plays_triggered,
            evidence_count: evidence.len(),
            status_counts: orch.status_counts(),
            status: "completed".to_string(),
            evidence,
        };
        info!(
            event = "cycle.completed",
            cycle_id = %report.cycle_id,
            company_id,
            jobs_created = report.jobs_created,
            plays_triggered = report.plays_triggered.len(),
            evidence = report.evidence_count,
        );
        Ok(report)
    }

    fn kpi_evaluation_job(
        &self,
        company_id: &str,
        snapshot: &KpiSnapshot,
        now: DateTime<Utc>,
    ) -> Result<Job, ChimeraError> {
        let mut payload = Payload::new();
        payload.insert("kpis".into(), serde_json::to_value(snapshot)?);
        payload.insert("kpi_definitions".into(), serde_json::to_value(&self.catalog.kpis)?);
        Ok(Job::new("EVALUATE_KPIS", company_id, payload, now))
    }
}

fn ensure_company(store: &dyn Store, company_id: &str) -> Result<(), ChimeraError> {
    match store.company(company_id)? {
        Some(_) => Ok(()),
        None => Err(ChimeraError::CompanyNotFound(company_id.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::company::Company;
    use crate::playbook::KpiStatus;
    use crate::store::MemoryStore;
    use std::path::PathBuf;

    const AGENTS: &str = "agents:\n  - id: analyst\n    handles: [EVALUATE_KPIS, INGEST_METRICS, EXECUTE_PLAY_NPS]\n";
    const KPIS: &str = "kpis:\n  - name: nps\n    target: 40\n";
    const PLAYS: &str = r#"
plays:
  - id: lift_nps
    name: Lift NPS
    triggers:
      all:
        - {kpi: nps, operator: "<", value: 40}
    job_plan:
      - {type: EXECUTE_PLAY_NPS, handler: survey.send}
      - {type: SEND_FAX}
  - id: watch
    name: Watch
    job_plan: []
"#;

    fn catalog() -> Catalog {
        Catalog::parse(AGENTS, KPIS, PLAYS).unwrap()
    }

    fn store_with(company: &str) -> MemoryStore {
        let store = MemoryStore::new();
        store.put_company(Company::new(company, "Acme", Utc::now())).unwrap();
        store
    }

    fn snapshot(nps: f64) -> KpiSnapshot {
        [("nps".to_string(), nps)].into_iter().collect()
    }

    fn request(nps: f64) -> CycleRequest {
        CycleRequest {
            company_id: "acme".into(),
            snapshot: snapshot(nps),
        }
    }

    #[test]
    fn evaluate_plays_lists_triggered() {
        let eval = evaluate_plays(&snapshot(30.0), &catalog());
        assert_eq!(eval.total_plays, 2);
        assert_eq!(eval.triggered_count, 2);
        assert_eq!(eval.triggered[0].id, "lift_nps");

        let calm = evaluate_plays(&snapshot(45.0), &catalog());
        assert_eq!(calm.triggered_count, 1);
        assert_eq!(calm.triggered[0].id, "watch");
    }

    #[test]
    fn unknown_company_is_rejected() {
        let store = MemoryStore::new();
        let err = GrowthCycle::new(catalog()).run(&request(30.0), &store).unwrap_err();
        assert!(matches!(err, ChimeraError::CompanyNotFound(id) if id == "acme"));
    }

    #[test]
    fn run_reports_and_persists() {
        let store = store_with("acme");
        let report = GrowthCycle::new(catalog()).run(&request(30.0), &store).unwrap();

        assert_eq!(report.status, "completed");
        assert_eq!(report.jobs_created, 3);
        assert_eq!(report.plays_triggered, ["Lift NPS", "Watch"]);
        // EVALUATE_KPIS and EXECUTE_PLAY_NPS emit one record each; SEND_FAX has no agent.
        assert_eq!(report.evidence_count, 2);
        assert_eq!(report.status_counts[&JobStatus::Succeeded], 2);
        assert_eq!(report.status_counts[&JobStatus::Failed], 1);

        let jobs = store.jobs_for_company("acme", None, 10).unwrap();
        assert_eq!(jobs.len(), 3);
        assert!(jobs.iter().all(|j| j.status.is_terminal()));
        assert_eq!(store.evidence_for_company("acme", None, 10).unwrap().len(), 2);
    }

    #[test]
    fn kpi_evaluation_runs_first() {
        let store = store_with("acme");
        let report = GrowthCycle::new(catalog()).run(&request(30.0), &store).unwrap();
        assert_eq!(report.evidence[0].event_type, "kpi_evaluated");
        let evals = report.evidence[0].payload["evaluations"].as_array().unwrap();
        assert_eq!(evals[0]["kpi"], "nps");
        assert_eq!(evals[0]["status"], "warning");
    }

    #[test]
    fn kpi_evaluation_can_be_disabled() {
        let store = store_with("acme");
        let report = GrowthCycle::new(catalog())
            .with_kpi_evaluation(false)
            .run(&request(30.0), &store)
            .unwrap();
        assert_eq!(report.jobs_created, 2);
        assert_eq!(report.evidence[0].event_type, "play_executed");
        assert_eq!(report.evidence[0].payload["handler"], "survey.send");
    }

    #[test]
    fn routing_failure_policy_is_forwarded() {
        let store = store_with("acme");
        let report = GrowthCycle::new(catalog())
            .with_kpi_evaluation(false)
            .with_routing_failure(RoutingFailurePolicy::RecordEvidence)
            .run(&request(30.0), &store)
            .unwrap();
        assert_eq!(report.evidence_count, 2);
        assert_eq!(report.evidence[1].event_type, "routing_failed");
    }

    #[test]
    fn empty_plan_play_still_reported() {
        let store = store_with("acme");
        let report = GrowthCycle::new(catalog())
            .with_kpi_evaluation(false)
            .run(&request(50.0), &store)
            .unwrap();
        assert_eq!(report.jobs_created, 0);
        assert_eq!(report.plays_triggered, ["Watch"]);
        assert_eq!(report.evidence_count, 0);
    }

    #[test]
    fn clock_stamps_jobs() {
        let fixed = DateTime::parse_from_rfc3339("2025-06-01T12:00:00Z")
            .unwrap()
            .with_timezone(&Utc);
        let store = store_with("acme");
        GrowthCycle::new(catalog())
            .with_clock(move || fixed)
            .run(&request(30.0), &store)
            .unwrap();
        let jobs = store.jobs_for_company("acme", None, 10).unwrap();
        assert!(jobs.iter().all(|j| j.created_at == fixed && j.updated_at == fixed));
    }

    #[test]
    fn ingest_records_readings_and_runs_plays() {
        let store = store_with("acme");
        let report = GrowthCycle::new(catalog())
            .ingest("acme", "survey", &snapshot(30.0), &store)
            .unwrap();

        assert_eq!(report.evidence[0].event_type, "metrics_ingested");
        assert_eq!(report.evidence[0].payload["source"], "survey");
        assert_eq!(report.jobs_created, 4);
        assert_eq!(report.evidence_count, 3);
        assert_eq!(report.evidence.len(), 3);
        assert_eq!(report.status_counts.values().sum::<usize>(), 4);

        assert_eq!(store.latest_kpis("acme").unwrap()["nps"], 30.0);
        let history = store.kpi_history("acme", 10).unwrap();
        assert_eq!(history[0].status, KpiStatus::Warning);
        assert_eq!(store.jobs_for_company("acme", None, 10).unwrap().len(), 4);
    }

    #[test]
    fn demo_cycle_on_shipped_catalog() {
        let dir = PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("configs");
        let catalog = Catalog::load(&dir).unwrap();
        let store = store_with("demo-company");
        let report = GrowthCycle::new(catalog)
            .run(
                &CycleRequest {
                    company_id: "demo-company".into(),
                    snapshot: demo_snapshot(),
                },
                &store,
            )
            .unwrap();

        assert_eq!(report.jobs_created, 8);
        assert_eq!(report.plays_triggered.len(), 6);
        assert!(report.plays_triggered.contains(&"KPI Watch".to_string()));
        assert_eq!(report.evidence_count, 8);
        assert_eq!(report.status_counts[&JobStatus::Succeeded], 8);

        let evals = report.evidence[0].payload["evaluations"].as_array().unwrap();
        let funnel = evals.iter().find(|e| e["kpi"] == "cr_main_funnel").unwrap();
        assert_eq!(funnel["status"], "warning");
    }
}
