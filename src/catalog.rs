//! Loads and validates the static catalog: `agents.yml`, `kpis.yml` and
//! `plays.yml`.
//!
//! Malformed catalogs are rejected here, before any cycle runs. The rule
//! evaluator still fails closed on anything that slips past.

use std::collections::HashSet;
use std::path::Path;

use serde::Deserialize;
use serde::de::DeserializeOwned;
use tracing::{info, warn};

use crate::agent::{Agent, AgentSpec};
use crate::error::ChimeraError;
use crate::playbook::{Clause, KpiDefinition, KpiDefinitions, Play};
use crate::router::AgentRegistry;

pub const AGENTS_FILE: &str = "agents.yml";
pub const KPIS_FILE: &str = "kpis.yml";
pub const PLAYS_FILE: &str = "plays.yml";

#[derive(Debug, Default, Deserialize)]
struct AgentsFile {
    #[serde(default)]
    agents: Vec<AgentSpec>,
}

#[derive(Debug, Default, Deserialize)]
struct KpisFile {
    #[serde(default)]
    kpis: Vec<KpiDefinition>,
}

#[derive(Debug, Default, Deserialize)]
struct PlaysFile {
    #[serde(default)]
    plays: Vec<Play>,
}

/// Validated agents, KPI definitions and plays. Plays and agents keep their
/// file order, which decides job order and agent selection.
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    pub agents: Vec<AgentSpec>,
    pub kpis: KpiDefinitions,
    pub plays: Vec<Play>,
}

impl Catalog {
    /// Reads the three catalog files from `dir`. A missing file is a
    /// configuration error.
    pub fn load(dir: &Path) -> Result<Self, ChimeraError> {
        let agents = read_file(dir, AGENTS_FILE)?;
        let kpis = read_file(dir, KPIS_FILE)?;
        let plays = read_file(dir, PLAYS_FILE)?;
        let catalog = Self::parse(&agents, &kpis, &plays)?;
        info!(
            event = "catalog.loaded",
            dir = %dir.display(),
            agents = catalog.agents.len(),
            kpis = catalog.kpis.len(),
            plays = catalog.plays.len(),
        );
        Ok(catalog)
    }

    /// Parses and validates catalog documents already in memory.
    pub fn parse(agents_yaml: &str, kpis_yaml: &str, plays_yaml: &str) -> Result<Self, ChimeraError> {
        let agents: AgentsFile = parse_yaml(agents_yaml)?;
        let kpis: KpisFile = parse_yaml(kpis_yaml)?;
        let plays: PlaysFile = parse_yaml(plays_yaml)?;

        let mut definitions = KpiDefinitions::new();
        let mut problems = Vec::new();
        for def in kpis.kpis {
            if def.name.trim().is_empty() {
                problems.push(format!("{KPIS_FILE}: KPI definition without a name"));
            } else if definitions.contains_key(&def.name) {
                problems.push(format!("{KPIS_FILE}: duplicate KPI `{}`", def.name));
            } else {
                definitions.insert(def.name.clone(), def);
            }
        }
        if !problems.is_empty() {
            return Err(ChimeraError::Config(problems.join("; ")));
        }

        let catalog = Self {
            agents: agents.agents,
            kpis: definitions,
            plays: plays.plays,
        };
        catalog.validate()?;
        Ok(catalog)
    }

    /// Collects every shape problem and fails with all of them at once.
    pub fn validate(&self) -> Result<(), ChimeraError> {
        let mut problems = Vec::new();

        for (idx, agent) in self.agents.iter().enumerate() {
            if agent.id.trim().is_empty() {
                problems.push(format!("{AGENTS_FILE}: agent #{} has an empty id", idx + 1));
            }
        }

        let mut play_ids = HashSet::new();
        for play in &self.plays {
            if play.id.trim().is_empty() {
                problems.push(format!("{PLAYS_FILE}: play `{}` has an empty id", play.name));
            } else if !play_ids.insert(play.id.as_str()) {
                problems.push(format!("{PLAYS_FILE}: duplicate play id `{}`", play.id));
            }
            check_clauses(&play.id, "all", &play.triggers.all, &mut problems);
            check_clauses(&play.id, "any", &play.triggers.any, &mut problems);
            for (idx, step) in play.job_plan.iter().enumerate() {
                if step.job_type.trim().is_empty() {
                    problems.push(format!(
                        "{PLAYS_FILE}: play `{}` step #{} has an empty type",
                        play.id,
                        idx + 1
                    ));
                }
            }
        }

        if !problems.is_empty() {
            return Err(ChimeraError::Config(problems.join("; ")));
        }

        let registry = self.registry();
        for job_type in registry.unroutable(self.job_types()) {
            warn!(event = "catalog.unroutable", job_type, "no agent handles this job type");
        }
        Ok(())
    }

    /// Agents in load order.
    pub fn registry(&self) -> AgentRegistry {
        AgentRegistry::new(self.agents.iter().map(Agent::from_spec).collect())
    }

    pub fn play(&self, id: &str) -> Option<&Play> {
        self.plays.iter().find(|play| play.id == id)
    }

    /// Every job type named by a job plan, in catalog order.
    pub fn job_types(&self) -> impl Iterator<Item = &str> {
        self.plays
            .iter()
            .flat_map(|play| play.job_plan.iter().map(|step| step.job_type.as_str()))
    }
}

fn check_clauses(play_id: &str, block: &str, clauses: &[Clause], problems: &mut Vec<String>) {
    for (idx, clause) in clauses.iter().enumerate() {
        if let Some(problem) = clause.problem() {
            problems.push(format!(
                "{PLAYS_FILE}: play `{play_id}` {block} clause #{}: {problem}",
                idx + 1
            ));
        }
    }
}

fn read_file(dir: &Path, name: &str) -> Result<String, ChimeraError> {
    let path = dir.join(name);
    if !path.exists() {
        return Err(ChimeraError::Config(format!(
            "catalog file not found: {}",
            path.display()
        )));
    }
    Ok(std::fs::read_to_string(path)?)
}

/// An empty document is an empty catalog section.
fn parse_yaml<T: DeserializeOwned + Default>(raw: &str) -> Result<T, ChimeraError> {
    if raw.trim().is_empty() {
        return Ok(T::default());
    }
    Ok(serde_yaml::from_str(raw)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::playbook::{JobFactory, KpiSnapshot, RuleEvaluator};
    use std::path::PathBuf;
    use tempfile::TempDir;

    const AGENTS: &str = "agents:\n  - id: analyst\n    handles: [EVALUATE_KPIS]\n";
    const KPIS: &str = "kpis:\n  - name: nps\n    target: 40\n";

    fn shipped() -> PathBuf {
        PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("configs")
    }

    fn config_error(result: Result<Catalog, ChimeraError>) -> String {
        match result {
            Err(ChimeraError::Config(msg)) => msg,
            other => panic!("expected config error, got {other:?}"),
        }
    }

    #[test]
    fn parses_minimal_catalog() {
        let plays = "plays:\n  - id: p1\n    name: Lift NPS\n    triggers:\n      all:\n        - {kpi: nps, operator: '<', value: 40}\n    job_plan:\n      - {type: EVALUATE_KPIS}\n";
        let catalog = Catalog::parse(AGENTS, KPIS, plays).unwrap();
        assert_eq!(catalog.agents[0].id, "analyst");
        assert_eq!(catalog.kpis["nps"].target, Some(40.0));
        assert_eq!(catalog.kpis["nps"].warning_ratio_below, 0.8);
        assert_eq!(catalog.play("p1").unwrap().name, "Lift NPS");
        assert_eq!(catalog.job_types().collect::<Vec<_>>(), ["EVALUATE_KPIS"]);
    }

    #[test]
    fn empty_documents_are_empty_sections() {
        let catalog = Catalog::parse("", "", "").unwrap();
        assert!(catalog.agents.is_empty());
        assert!(catalog.kpis.is_empty());
        assert!(catalog.plays.is_empty());
    }

    #[test]
    fn rejects_duplicate_kpis() {
        let kpis = "kpis:\n  - name: nps\n  - name: nps\n";
        assert!(config_error(Catalog::parse(AGENTS, kpis, "")).contains("duplicate KPI `nps`"));
    }

    #[test]
    fn rejects_duplicate_play_ids() {
        let plays = "plays:\n  - id: p1\n  - id: p1\n";
        assert!(config_error(Catalog::parse(AGENTS, KPIS, plays)).contains("duplicate play id `p1`"));
    }

    #[test]
    fn rejects_malformed_clauses_and_steps() {
        let plays = "plays:\n  - id: p1\n    triggers:\n      all:\n        - {operator: '<', value: 1}\n      any:\n        - {kpi: nps, operator: '~', value: 1}\n    job_plan:\n      - {type: ''}\n";
        let msg = config_error(Catalog::parse(AGENTS, KPIS, plays));
        assert!(msg.contains("all clause #1: clause is missing `kpi`"));
        assert!(msg.contains("any clause #1: clause has unrecognized operator `~`"));
        assert!(msg.contains("step #1 has an empty type"));
    }

    #[test]
    fn rejects_empty_agent_id() {
        let agents = "agents:\n  - id: ''\n    handles: [X]\n";
        assert!(config_error(Catalog::parse(agents, KPIS, "")).contains("agent #1 has an empty id"));
    }

    #[test]
    fn syntax_errors_are_yaml_errors() {
        let err = Catalog::parse("agents: [", KPIS, "").unwrap_err();
        assert!(matches!(err, ChimeraError::Yaml(_)));
    }

    #[test]
    fn missing_file_is_config_error() {
        let tmp = TempDir::new().unwrap();
        std::fs::write(tmp.path().join(AGENTS_FILE), AGENTS).unwrap();
        let msg = config_error(Catalog::load(tmp.path()));
        assert!(msg.contains(KPIS_FILE));
    }

    #[test]
    fn load_reads_directory() {
        let tmp = TempDir::new().unwrap();
        std::fs::write(tmp.path().join(AGENTS_FILE), AGENTS).unwrap();
        std::fs::write(tmp.path().join(KPIS_FILE), KPIS).unwrap();
        std::fs::write(tmp.path().join(PLAYS_FILE), "plays: []\n").unwrap();
        let catalog = Catalog::load(tmp.path()).unwrap();
        assert_eq!(catalog.registry().len(), 1);
    }

    #[test]
    fn shipped_catalog_is_valid_and_routable() {
        let catalog = Catalog::load(&shipped()).unwrap();
        assert!(!catalog.plays.is_empty());
        let registry = catalog.registry();
        assert!(registry.unroutable(catalog.job_types()).is_empty());
        for base in ["EVALUATE_KPIS", "INGEST_METRICS", "SUGGEST_PLAYS", "LOG_EVIDENCE"] {
            assert!(registry.select(base).is_some(), "{base} has no agent");
        }
    }

    #[test]
    fn shipped_plays_trigger_on_demo_snapshot() {
        let catalog = Catalog::load(&shipped()).unwrap();
        let snapshot: KpiSnapshot = [
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
        .map(|(k, v)| (k.to_string(), v))
        .collect();

        let triggered: Vec<_> = JobFactory::triggered(&snapshot, &catalog.plays, &catalog.kpis)
            .into_iter()
            .map(|p| p.id.as_str())
            .collect();
        assert!(triggered.contains(&"funnel_cro"));
        assert!(triggered.contains(&"kpi_watch"));
        assert!(!triggered.contains(&"premium_upsell"));

        let upsell = catalog.play("premium_upsell").unwrap();
        assert!(!RuleEvaluator::evaluate(&snapshot, upsell, &catalog.kpis));
    }
}
