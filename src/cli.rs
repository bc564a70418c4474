//! Interface de linha de comando do CHIMERA baseada em clap.
//!
//! Define a struct [`Cli`] com subcomandos [`Command`] (run, ingest, evaluate,
//! plays, agents, register, jobs, evidence, trends, demo) e flags globais
//! (--config, --catalog-dir, --verbose, --json-logs).

use std::path::PathBuf;

use chimera::company::CompanySize;
use chimera::state_machine::JobStatus;
use clap::{Parser, Subcommand, ValueEnum};

/// CHIMERA: motor de plays de crescimento guiado por KPIs.
#[derive(Debug, Parser)]
#[command(name = "chimera", version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Caminho do arquivo de configuração (padrão: ./chimera.toml).
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Diretório do catálogo; sobrescreve a configuração e o ambiente.
    #[arg(long, global = true)]
    pub catalog_dir: Option<PathBuf>,

    /// Habilita saída detalhada (verbose).
    #[arg(long, short, global = true, default_value_t = false)]
    pub verbose: bool,

    /// Emite logs em JSON, uma linha por evento.
    #[arg(long, global = true, default_value_t = false)]
    pub json_logs: bool,
}

/// Porte da empresa aceito pela CLI, mapeado para [`CompanySize`].
#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum SizeArg {
    Solo,
    Smb,
    Mid,
    Enterprise,
}

impl From<SizeArg> for CompanySize {
    fn from(arg: SizeArg) -> Self {
        match arg {
            SizeArg::Solo => CompanySize::Solo,
            SizeArg::Smb => CompanySize::Smb,
            SizeArg::Mid => CompanySize::Mid,
            SizeArg::Enterprise => CompanySize::Enterprise,
        }
    }
}

/// Filtro de status de job aceito pela CLI.
#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum StatusArg {
    Queued,
    Running,
    Succeeded,
    Failed,
}

impl From<StatusArg> for JobStatus {
    fn from(arg: StatusArg) -> Self {
        match arg {
            StatusArg::Queued => JobStatus::Queued,
            StatusArg::Running => JobStatus::Running,
            StatusArg::Succeeded => JobStatus::Succeeded,
            StatusArg::Failed => JobStatus::Failed,
        }
    }
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Executa um ciclo de crescimento para uma empresa.
    Run {
        /// Identificador da empresa (precisa estar registrada).
        #[arg(long)]
        company: String,

        /// Snapshot de KPIs em JSON; sem ele, usa as últimas leituras salvas.
        #[arg(long)]
        snapshot: Option<PathBuf>,
    },

    /// Registra métricas de uma fonte e executa o ciclo sobre elas.
    Ingest {
        #[arg(long)]
        company: String,

        /// Origem das métricas (shopify, fiverr, manual...).
        #[arg(long)]
        source: String,

        /// Arquivo JSON com as métricas (nome do KPI para valor).
        #[arg(long)]
        metrics: PathBuf,
    },

    /// Mostra quais plays disparariam para um snapshot, sem criar jobs.
    Evaluate {
        #[arg(long)]
        snapshot: PathBuf,
    },

    /// Lista as plays do catálogo.
    Plays,

    /// Lista os agentes e suas capacidades, na ordem de seleção.
    Agents,

    /// Registra uma empresa no store.
    Register {
        #[arg(long)]
        id: String,

        #[arg(long)]
        name: String,

        #[arg(long)]
        industry: Option<String>,

        #[arg(long, value_enum, default_value_t = SizeArg::Solo)]
        size: SizeArg,
    },

    /// Lista os jobs de uma empresa, mais recentes primeiro.
    Jobs {
        #[arg(long)]
        company: String,

        #[arg(long, value_enum)]
        status: Option<StatusArg>,

        #[arg(long, default_value_t = 100)]
        limit: usize,
    },

    /// Lista as evidências recentes de uma empresa.
    Evidence {
        #[arg(long)]
        company: String,

        /// Janela em dias.
        #[arg(long, default_value_t = 30)]
        days: i64,

        #[arg(long, default_value_t = 100)]
        limit: usize,
    },

    /// Mostra tendências de mercado para uma empresa.
    Trends {
        #[arg(long)]
        company: String,
    },

    /// Executa a demonstração embutida com um store em memória.
    Demo,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_parses_run_subcommand() {
        let cli = Cli::parse_from(["chimera", "run", "--company", "acme", "--snapshot", "kpis.json"]);
        match cli.command {
            Command::Run { company, snapshot } => {
                assert_eq!(company, "acme");
                assert_eq!(snapshot.unwrap(), PathBuf::from("kpis.json"));
            }
            _ => panic!("expected Run command"),
        }
    }

    #[test]
    fn cli_parses_global_flags() {
        let cli = Cli::parse_from([
            "chimera",
            "--config",
            "prod.toml",
            "--catalog-dir",
            "/etc/chimera",
            "--verbose",
            "--json-logs",
            "demo",
        ]);
        assert!(cli.verbose);
        assert!(cli.json_logs);
        assert_eq!(cli.config, Some(PathBuf::from("prod.toml")));
        assert_eq!(cli.catalog_dir, Some(PathBuf::from("/etc/chimera")));
        assert!(matches!(cli.command, Command::Demo));
    }

    #[test]
    fn cli_parses_register_with_size() {
        let cli = Cli::parse_from(["chimera", "register", "--id", "acme", "--name", "Acme", "--size", "smb"]);
        match cli.command {
            Command::Register { id, size, industry, .. } => {
                assert_eq!(id, "acme");
                assert!(industry.is_none());
                assert_eq!(CompanySize::from(size), CompanySize::Smb);
            }
            _ => panic!("expected Register command"),
        }
    }

    #[test]
    fn cli_parses_jobs_filters() {
        let cli = Cli::parse_from(["chimera", "jobs", "--company", "acme", "--status", "failed"]);
        match cli.command {
            Command::Jobs { status, limit, .. } => {
                assert_eq!(status.map(JobStatus::from), Some(JobStatus::Failed));
                assert_eq!(limit, 100);
            }
            _ => panic!("expected Jobs command"),
        }
    }

    #[test]
    fn cli_evidence_defaults() {
        let cli = Cli::parse_from(["chimera", "evidence", "--company", "acme"]);
        match cli.command {
            Command::Evidence { days, limit, .. } => {
                assert_eq!(days, 30);
                assert_eq!(limit, 100);
            }
            _ => panic!("expected Evidence command"),
        }
    }

    #[test]
    fn cli_rejects_missing_company() {
        assert!(Cli::try_parse_from(["chimera", "run"]).is_err());
    }

    #[test]
    fn cli_verify() {
        Cli::command().debug_assert();
    }
}
