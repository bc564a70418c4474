//! Configuração do CHIMERA carregada a partir de `chimera.toml`.
//!
//! A struct [`ChimeraConfig`] reúne os parâmetros de execução do ciclo.
//! Campos ausentes no arquivo usam defaults sensíveis.
//! A variável de ambiente `CHIMERA_CATALOG_DIR` tem precedência sobre o arquivo.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::orchestrator::RoutingFailurePolicy;

/// Nome do arquivo de configuração procurado no diretório atual.
pub const CONFIG_FILE: &str = "chimera.toml";

/// Variável de ambiente que sobrescreve `catalog_dir`.
pub const CATALOG_DIR_ENV: &str = "CHIMERA_CATALOG_DIR";

/// Configuração de nível superior carregada de `chimera.toml`.
#[derive(Debug, Clone, Deserialize)]
pub struct ChimeraConfig {
    /// Diretório com `agents.yml`, `kpis.yml` e `plays.yml`.
    #[serde(default = "default_catalog_dir")]
    pub catalog_dir: PathBuf,

    /// Diretório onde o store JSON persiste empresas, jobs e evidências.
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    /// Enfileira um job `EVALUATE_KPIS` antes dos jobs das plays.
    #[serde(default = "default_seed_kpi_evaluation")]
    pub seed_kpi_evaluation: bool,

    /// O que registrar quando nenhum agente atende um job.
    #[serde(default)]
    pub routing_failure: RoutingFailurePolicy,

    /// Nível de log padrão quando `RUST_LOG` não está definido.
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

// Catálogo padrão: "configs".
fn default_catalog_dir() -> PathBuf {
    PathBuf::from("configs")
}

// Dados padrão: ".chimera".
fn default_data_dir() -> PathBuf {
    PathBuf::from(".chimera")
}

fn default_seed_kpi_evaluation() -> bool {
    true
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for ChimeraConfig {
    fn default() -> Self {
        Self {
            catalog_dir: default_catalog_dir(),
            data_dir: default_data_dir(),
            seed_kpi_evaluation: default_seed_kpi_evaluation(),
            routing_failure: RoutingFailurePolicy::default(),
            log_level: default_log_level(),
        }
    }
}

impl ChimeraConfig {
    /// Carrega a configuração de `path`, ou de `chimera.toml` no diretório atual.
    ///
    /// Sem caminho explícito, a ausência do arquivo resulta nos valores padrão;
    /// um caminho explícito inexistente é erro.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let (path, required) = match path {
            Some(p) => (p, true),
            None => (Path::new(CONFIG_FILE), false),
        };

        let mut config = if path.exists() {
            Self::from_file(path)?
        } else if required {
            anyhow::bail!("config file not found: {}", path.display());
        } else {
            Self::default()
        };

        config.apply_catalog_override(std::env::var(CATALOG_DIR_ENV).ok());
        Ok(config)
    }

    /// Lê e desserializa um arquivo TOML específico.
    pub fn from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        toml::from_str::<ChimeraConfig>(&contents)
            .with_context(|| format!("failed to parse {}", path.display()))
    }

    /// A variável de ambiente tem precedência sobre o arquivo para o catálogo.
    fn apply_catalog_override(&mut self, value: Option<String>) {
        if let Some(dir) = value
            && !dir.is_empty()
        {
            self.catalog_dir = PathBuf::from(dir);
        }
    }
}
