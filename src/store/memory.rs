use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, Utc};

use super::{Store, Tables};
use crate::company::{Company, KpiReading};
use crate::error::{StoreError, StoreResult};
use crate::playbook::KpiSnapshot;
use crate::state_machine::{EvidenceRecord, Job, JobStatus};

/// In-process store backed by mutex-guarded tables. Nothing survives the
/// process; used by `chimera demo` and in tests.
#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> StoreResult<MutexGuard<'_, Tables>> {
        self.tables.lock().map_err(|_| StoreError::Poisoned)
    }
}

impl Store for MemoryStore {
    fn put_company(&self, company: Company) -> StoreResult<()> {
        self.lock()?.put_company(company);
        Ok(())
    }

    fn company(&self, id: &str) -> StoreResult<Option<Company>> {
        Ok(self.lock()?.companies.get(id).cloned())
    }

    fn companies(&self) -> StoreResult<Vec<Company>> {
        Ok(self.lock()?.companies.values().cloned().collect())
    }

    fn record_kpi(&self, reading: KpiReading) -> StoreResult<()> {
        self.lock()?.kpis.push(reading);
        Ok(())
    }

    fn latest_kpis(&self, company_id: &str) -> StoreResult<KpiSnapshot> {
        Ok(self.lock()?.latest_kpis(company_id))
    }

    fn kpi_history(&self, company_id: &str, limit: usize) -> StoreResult<Vec<KpiReading>> {
        Ok(self.lock()?.kpi_history(company_id, limit))
    }

    fn put_job(&self, job: &Job) -> StoreResult<()> {
        self.lock()?.put_job(job);
        Ok(())
    }

    fn put_jobs(&self, jobs: &[Job]) -> StoreResult<()> {
        let mut tables = self.lock()?;
        jobs.iter().for_each(|job| tables.put_job(job));
        Ok(())
    }

    fn job(&self, id: &str) -> StoreResult<Option<Job>> {
        Ok(self.lock()?.jobs.iter().find(|j| j.id == id).cloned())
    }

    fn jobs_for_company(
        &self,
        company_id: &str,
        status: Option<JobStatus>,
        limit: usize,
    ) -> StoreResult<Vec<Job>> {
        Ok(self.lock()?.jobs_for_company(company_id, status, limit))
    }

    fn append_evidence(&self, records: &[EvidenceRecord]) -> StoreResult<()> {
        self.lock()?.evidence.extend_from_slice(records);
        Ok(())
    }

    fn evidence_for_company(
        &self,
        company_id: &str,
        since: Option<DateTime<Utc>>,
        limit: usize,
    ) -> StoreResult<Vec<EvidenceRecord>> {
        Ok(self.lock()?.evidence_for_company(company_id, since, limit))
    }
}
