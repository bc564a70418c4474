use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use tempfile::NamedTempFile;
use tracing::debug;

use super::{Store, Tables};
use crate::company::{Company, KpiReading};
use crate::error::{StoreError, StoreResult};
use crate::playbook::KpiSnapshot;
use crate::state_machine::{EvidenceRecord, Job, JobStatus};

const STORE_FILE: &str = "store.json";

/// File-backed store: one pretty-printed JSON document under the data
/// directory, rewritten after every mutation.
///
/// A mutation is applied to a copy of the tables, written to a temporary file
/// and renamed over `store.json`; memory only changes once the rename lands.
#[derive(Debug)]
pub struct JsonFileStore {
    dir: PathBuf,
    path: PathBuf,
    tables: Mutex<Tables>,
}

impl JsonFileStore {
    /// Opens (or creates) the store in `dir`.
    pub fn open(dir: &Path) -> StoreResult<Self> {
        std::fs::create_dir_all(dir)?;
        let path = dir.join(STORE_FILE);
        let tables = if path.exists() {
            let json = std::fs::read_to_string(&path)?;
            serde_json::from_str(&json)?
        } else {
            Tables::default()
        };
        debug!(event = "store.opened", path = %path.display());
        Ok(Self {
            dir: dir.to_path_buf(),
            path,
            tables: Mutex::new(tables),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn lock(&self) -> StoreResult<MutexGuard<'_, Tables>> {
        self.tables.lock().map_err(|_| StoreError::Poisoned)
    }

    fn mutate<F>(&self, change: F) -> StoreResult<()>
    where
        F: FnOnce(&mut Tables),
    {
        let mut tables = self.lock()?;
        let mut next = tables.clone();
        change(&mut next);
        let json = serde_json::to_string_pretty(&next)?;

        let mut staged = NamedTempFile::new_in(&self.dir)?;
        staged.write_all(json.as_bytes())?;
        staged.as_file().sync_all()?;
        staged.persist(&self.path).map_err(|e| e.error)?;

        *tables = next;
        debug!(
            event = "store.saved",
            path = %self.path.display(),
            jobs = tables.jobs.len(),
            evidence = tables.evidence.len(),
        );
        Ok(())
    }
}

impl Store for JsonFileStore {
    fn put_company(&self, company: Company) -> StoreResult<()> {
        self.mutate(|t| t.put_company(company))
    }

    fn company(&self, id: &str) -> StoreResult<Option<Company>> {
        Ok(self.lock()?.companies.get(id).cloned())
    }

    fn companies(&self) -> StoreResult<Vec<Company>> {
        Ok(self.lock()?.companies.values().cloned().collect())
    }

    fn record_kpi(&self, reading: KpiReading) -> StoreResult<()> {
        self.mutate(|t| t.kpis.push(reading))
    }

    fn latest_kpis(&self, company_id: &str) -> StoreResult<KpiSnapshot> {
        Ok(self.lock()?.latest_kpis(company_id))
    }

    fn kpi_history(&self, company_id: &str, limit: usize) -> StoreResult<Vec<KpiReading>> {
        Ok(self.lock()?.kpi_history(company_id, limit))
    }

    fn put_job(&self, job: &Job) -> StoreResult<()> {
        self.mutate(|t| t.put_job(job))
    }

    fn put_jobs(&self, jobs: &[Job]) -> StoreResult<()> {
        if jobs.is_empty() {
            return Ok(());
        }
        self.mutate(|t| jobs.iter().for_each(|job| t.put_job(job)))
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
        if records.is_empty() {
            return Ok(());
        }
        self.mutate(|t| t.evidence.extend_from_slice(records))
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
