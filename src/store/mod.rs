//! Persistence collaborator: companies, KPI readings, jobs and evidence.
//!
//! The core never touches a store during `run_cycle`; callers persist jobs and
//! evidence after the cycle returns.

mod file;
mod memory;

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::company::{Company, KpiReading};
use crate::error::StoreResult;
use crate::playbook::KpiSnapshot;
use crate::state_machine::{EvidenceRecord, Job, JobStatus};

pub use file::JsonFileStore;
pub use memory::MemoryStore;

/// Key-based CRUD over the entities a growth cycle reads and writes.
///
/// Listing queries return newest entries first.
pub trait Store: Send + Sync {
    fn put_company(&self, company: Company) -> StoreResult<()>;

    fn company(&self, id: &str) -> StoreResult<Option<Company>>;

    fn companies(&self) -> StoreResult<Vec<Company>>;

    fn record_kpi(&self, reading: KpiReading) -> StoreResult<()>;

    /// Most recent value per KPI name.
    fn latest_kpis(&self, company_id: &str) -> StoreResult<KpiSnapshot>;

    fn kpi_history(&self, company_id: &str, limit: usize) -> StoreResult<Vec<KpiReading>>;

    /// Inserts or replaces the job with the same id.
    fn put_job(&self, job: &Job) -> StoreResult<()>;

    /// Upserts a batch of jobs in one write.
    fn put_jobs(&self, jobs: &[Job]) -> StoreResult<()> {
        jobs.iter().try_for_each(|job| self.put_job(job))
    }

    fn job(&self, id: &str) -> StoreResult<Option<Job>>;

    fn jobs_for_company(
        &self,
        company_id: &str,
        status: Option<JobStatus>,
        limit: usize,
    ) -> StoreResult<Vec<Job>>;

    fn append_evidence(&self, records: &[EvidenceRecord]) -> StoreResult<()>;

    fn evidence_for_company(
        &self,
        company_id: &str,
        since: Option<DateTime<Utc>>,
        limit: usize,
    ) -> StoreResult<Vec<EvidenceRecord>>;
}

/// The tables shared by both store implementations; also the on-disk format
/// of [`JsonFileStore`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct Tables {
    #[serde(default)]
    companies: BTreeMap<String, Company>,
    #[serde(default)]
    kpis: Vec<KpiReading>,
    #[serde(default)]
    jobs: Vec<Job>,
    #[serde(default)]
    evidence: Vec<EvidenceRecord>,
}

impl Tables {
    fn put_company(&mut self, company: Company) {
        self.companies.insert(company.id.clone(), company);
    }

    fn latest_kpis(&self, company_id: &str) -> KpiSnapshot {
        let mut latest: BTreeMap<&str, &KpiReading> = BTreeMap::new();
        for reading in self.kpis.iter().filter(|r| r.company_id == company_id) {
            match latest.get(reading.name.as_str()) {
                Some(seen) if seen.recorded_at > reading.recorded_at => {}
                _ => {
                    latest.insert(reading.name.as_str(), reading);
                }
            }
        }
        latest
            .into_iter()
            .map(|(name, reading)| (name.to_string(), reading.value))
            .collect()
    }

    fn kpi_history(&self, company_id: &str, limit: usize) -> Vec<KpiReading> {
        newest_first(
            self.kpis.iter().filter(|r| r.company_id == company_id),
            |r| r.recorded_at,
            limit,
        )
    }

    fn put_job(&mut self, job: &Job) {
        match self.jobs.iter_mut().find(|held| held.id == job.id) {
            Some(held) => *held = job.clone(),
            None => self.jobs.push(job.clone()),
        }
    }

    fn jobs_for_company(&self, company_id: &str, status: Option<JobStatus>, limit: usize) -> Vec<Job> {
        newest_first(
            self.jobs
                .iter()
                .filter(|j| j.company_id == company_id)
                .filter(|j| status.is_none_or(|s| j.status == s)),
            |j| j.created_at,
            limit,
        )
    }

    fn evidence_for_company(
        &self,
        company_id: &str,
        since: Option<DateTime<Utc>>,
        limit: usize,
    ) -> Vec<EvidenceRecord> {
        newest_first(
            self.evidence
                .iter()
                .filter(|r| r.company_id == company_id)
                .filter(|r| since.is_none_or(|cutoff| r.occurred_at >= cutoff)),
            |r| r.occurred_at,
            limit,
        )
    }
}

/// Sorts by timestamp descending; among equal timestamps the later-inserted
/// entry comes first.
fn newest_first<'a, T, I, F>(items: I, at: F, limit: usize) -> Vec<T>
where
    T: Clone + 'a,
    I: DoubleEndedIterator<Item = &'a T>,
    F: Fn(&T) -> DateTime<Utc>,
{
    let mut out: Vec<&T> = items.rev().collect();
    out.sort_by_key(|item| std::cmp::Reverse(at(*item)));
    out.into_iter().take(limit).cloned().collect()
}
