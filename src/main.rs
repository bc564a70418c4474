mod cli;
mod ui;

use std::path::Path;

use anyhow::{Context, Result};
use chimera::catalog::Catalog;
use chimera::company::Company;
use chimera::config::ChimeraConfig;
use chimera::cycle::{self, CycleRequest, GrowthCycle};
use chimera::error::ChimeraError;
use chimera::insights::{InsightSource, StaticInsights};
use chimera::playbook::KpiSnapshot;
use chimera::store::{JsonFileStore, MemoryStore, Store};
use chimera::telemetry;
use chrono::{Duration, Utc};
use clap::Parser;
use cli::{Cli, Command};
use serde::Deserialize;
use tracing::Level;

const DEMO_COMPANY: &str = "demo-company";

/// Snapshot files hold either a bare `{kpi: value}` map or `{"kpis": {...}}`.
#[derive(Deserialize)]
#[serde(untagged)]
enum SnapshotFile {
    Wrapped { kpis: KpiSnapshot },
    Plain(KpiSnapshot),
}

fn read_snapshot(path: &Path) -> Result<KpiSnapshot> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    let parsed: SnapshotFile = serde_json::from_str(&raw)
        .with_context(|| format!("{} is not a KPI snapshot", path.display()))?;
    Ok(match parsed {
        SnapshotFile::Wrapped { kpis } => kpis,
        SnapshotFile::Plain(kpis) => kpis,
    })
}

fn load_catalog(config: &ChimeraConfig) -> Result<Catalog> {
    Catalog::load(&config.catalog_dir)
        .with_context(|| format!("failed to load catalog from {}", config.catalog_dir.display()))
}

fn growth_cycle(config: &ChimeraConfig) -> Result<GrowthCycle> {
    Ok(GrowthCycle::new(load_catalog(config)?)
        .with_kpi_evaluation(config.seed_kpi_evaluation)
        .with_routing_failure(config.routing_failure))
}

fn open_store(config: &ChimeraConfig) -> Result<JsonFileStore> {
    JsonFileStore::open(&config.data_dir)
        .with_context(|| format!("failed to open store in {}", config.data_dir.display()))
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = ChimeraConfig::load(cli.config.as_deref())?;
    if let Some(dir) = cli.catalog_dir {
        config.catalog_dir = dir;
    }
    let level = if cli.verbose {
        Level::DEBUG
    } else {
        telemetry::parse_level(&config.log_level)
    };
    telemetry::init_tracing(cli.json_logs, level);

    match cli.command {
        Command::Run { company, snapshot } => {
            let store = open_store(&config)?;
            let snapshot = match snapshot {
                Some(path) => read_snapshot(&path)?,
                None => store.latest_kpis(&company)?,
            };
            if snapshot.is_empty() {
                anyhow::bail!(
                    "no KPI readings stored for {company}; pass --snapshot or run `chimera ingest` first"
                );
            }
            let growth = growth_cycle(&config)?;
            let progress = ui::CycleProgress::start(&format!("Running growth cycle for {company}"));
            let report = growth.run(&CycleRequest { company_id: company, snapshot }, &store)?;
            progress.complete(&report);
            ui::print_evidence(&report.evidence);
        }
        Command::Ingest {
            company,
            source,
            metrics,
        } => {
            let store = open_store(&config)?;
            let metrics = read_snapshot(&metrics)?;
            let growth = growth_cycle(&config)?;
            let progress = ui::CycleProgress::start(&format!("Ingesting {source} metrics for {company}"));
            let report = growth.ingest(&company, &source, &metrics, &store)?;
            progress.complete(&report);
            ui::print_evidence(&report.evidence);
        }
        Command::Evaluate { snapshot } => {
            let catalog = load_catalog(&config)?;
            let snapshot = read_snapshot(&snapshot)?;
            ui::print_evaluation(&cycle::evaluate_plays(&snapshot, &catalog));
        }
        Command::Plays => ui::print_plays(&load_catalog(&config)?),
        Command::Agents => ui::print_agents(&load_catalog(&config)?),
        Command::Register {
            id,
            name,
            industry,
            size,
        } => {
            let store = open_store(&config)?;
            let mut company = Company::new(id.as_str(), name, Utc::now()).with_size(size.into());
            if let Some(industry) = industry {
                company = company.with_industry(industry);
            }
            store.put_company(company)?;
            println!("Registered company {id}");
        }
        Command::Jobs {
            company,
            status,
            limit,
        } => {
            let store = open_store(&config)?;
            let jobs = store.jobs_for_company(&company, status.map(Into::into), limit)?;
            ui::print_jobs(&jobs);
        }
        Command::Evidence {
            company,
            days,
            limit,
        } => {
            let store = open_store(&config)?;
            let since = Utc::now() - Duration::days(days);
            let records = store.evidence_for_company(&company, Some(since), limit)?;
            ui::print_evidence(&records);
        }
        Command::Trends { company } => {
            let store = open_store(&config)?;
            let company = store
                .company(&company)?
                .ok_or(ChimeraError::CompanyNotFound(company))?;
            ui::print_trends(&StaticInsights.trends(&company));
        }
        Command::Demo => {
            let growth = growth_cycle(&config)?;
            let store = MemoryStore::new();
            store.put_company(Company::new(DEMO_COMPANY, "Demo Company", Utc::now()))?;

            let snapshot = cycle::demo_snapshot();
            ui::print_snapshot(&snapshot, &growth.catalog().kpis);
            ui::print_evaluation(&cycle::evaluate_plays(&snapshot, growth.catalog()));

            let progress = ui::CycleProgress::start("Running demo growth cycle");
            let report = growth.run(
                &CycleRequest {
                    company_id: DEMO_COMPANY.to_string(),
                    snapshot,
                },
                &store,
            )?;
            progress.complete(&report);
            ui::print_evidence(&report.evidence);
        }
    }

    Ok(())
}
