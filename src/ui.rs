//! Interface de terminal do CHIMERA: spinner de ciclo e saída colorida.
//!
//! Usa `indicatif` para o spinner enquanto o ciclo roda e `console` para
//! estilizar relatórios, jobs e evidências.

use chimera::catalog::Catalog;
use chimera::cycle::{CycleReport, PlayEvaluation};
use chimera::insights::Trend;
use chimera::playbook::{KpiDefinitions, KpiSnapshot, KpiStatus};
use chimera::state_machine::{EvidenceRecord, Job, JobStatus};
use console::Style;
use indicatif::{ProgressBar, ProgressStyle};

/// Indicador visual de progresso para a execução de um ciclo.
pub struct CycleProgress {
    pb: ProgressBar,
}

impl CycleProgress {
    /// Inicia o spinner com a descrição do ciclo.
    pub fn start(description: &str) -> Self {
        let pb = ProgressBar::new_spinner();
        pb.set_style(
            ProgressStyle::default_spinner()
                .template("{spinner:.cyan} {msg}")
                .expect("invalid template"),
        );
        pb.set_message(description.to_string());
        pb.enable_steady_tick(std::time::Duration::from_millis(100));
        Self { pb }
    }

    /// Finaliza o spinner e imprime o resumo do ciclo.
    pub fn complete(&self, report: &CycleReport) {
        self.pb.finish_and_clear();
        print_report(report);
    }
}

fn status_style(status: JobStatus) -> Style {
    match status {
        JobStatus::Succeeded => Style::new().green().bold(),
        JobStatus::Failed => Style::new().red().bold(),
        _ => Style::new().yellow(),
    }
}

fn kpi_style(status: KpiStatus) -> Style {
    match status {
        KpiStatus::Ok => Style::new().green(),
        KpiStatus::Warning => Style::new().yellow(),
        KpiStatus::Critical => Style::new().red().bold(),
        KpiStatus::Unknown => Style::new().dim(),
    }
}

fn heading(title: &str) {
    println!();
    println!("{}", Style::new().cyan().bold().apply_to(format!("─── {title} ───")));
}

/// Resumo do ciclo: jobs criados, plays disparadas e contagem por status.
pub fn print_report(report: &CycleReport) {
    heading("Cycle Summary");
    println!("  cycle     {}", report.cycle_id);
    println!("  company   {}", report.company_id);
    println!("  jobs      {}", report.jobs_created);
    println!("  evidence  {}", report.evidence_count);
    if report.plays_triggered.is_empty() {
        println!("  plays     {}", Style::new().dim().apply_to("none triggered"));
    } else {
        println!("  plays     {}", report.plays_triggered.join(", "));
    }
    for (status, count) in &report.status_counts {
        println!("    {} {count}", status_style(*status).apply_to(status));
    }
}

/// Snapshot de KPIs com o status de cada valor contra sua meta.
pub fn print_snapshot(snapshot: &KpiSnapshot, definitions: &KpiDefinitions) {
    heading("KPI Snapshot");
    for (name, value) in snapshot {
        let (status, target) = match definitions.get(name) {
            Some(def) => (def.assess(*value), def.target),
            None => (KpiStatus::Unknown, None),
        };
        let target = target.map_or_else(|| "-".to_string(), |t| t.to_string());
        println!(
            "  {:<9} {name}: {value} (target: {target})",
            kpi_style(status).apply_to(status)
        );
    }
}

pub fn print_evidence(records: &[EvidenceRecord]) {
    heading("Evidence");
    if records.is_empty() {
        println!("  {}", Style::new().dim().apply_to("no evidence"));
        return;
    }
    let event = Style::new().magenta().bold();
    for rec in records {
        let style = if rec.event_type == "error" || rec.event_type == "routing_failed" {
            Style::new().red().bold()
        } else {
            event.clone()
        };
        println!(
            "  {} {} job={}",
            style.apply_to(&rec.event_type),
            rec.occurred_at.to_rfc3339(),
            rec.job_id
        );
        println!("    {}", serde_json::to_string(&rec.payload).unwrap_or_default());
    }
}

pub fn print_jobs(jobs: &[Job]) {
    heading("Jobs");
    if jobs.is_empty() {
        println!("  {}", Style::new().dim().apply_to("no jobs"));
        return;
    }
    for job in jobs {
        println!(
            "  {:<10} {:<36} {} {}",
            status_style(job.status).apply_to(job.status),
            job.job_type,
            job.created_at.format("%Y-%m-%d %H:%M:%S"),
            job.id
        );
    }
}

pub fn print_evaluation(evaluation: &PlayEvaluation) {
    heading("Play Evaluation");
    println!(
        "  {} of {} plays triggered",
        evaluation.triggered_count, evaluation.total_plays
    );
    let name = Style::new().green().bold();
    for play in &evaluation.triggered {
        println!("  {} {} ({})", name.apply_to("▶"), play.name, play.id);
        if !play.intent.is_empty() {
            println!("      intent: {}", play.intent);
        }
        if !play.impact_hypothesis.is_empty() {
            println!("      hypothesis: {}", play.impact_hypothesis);
        }
    }
}

pub fn print_plays(catalog: &Catalog) {
    heading("Plays");
    let id = Style::new().bold();
    for play in &catalog.plays {
        let steps: Vec<&str> = play.job_plan.iter().map(|s| s.job_type.as_str()).collect();
        println!("  {} {}", id.apply_to(&play.id), play.name);
        println!(
            "      triggers: {} all / {} any, jobs: {}",
            play.triggers.all.len(),
            play.triggers.any.len(),
            if steps.is_empty() { "-".to_string() } else { steps.join(", ") }
        );
    }
}

pub fn print_agents(catalog: &Catalog) {
    heading("Agents");
    let id = Style::new().bold();
    for (idx, agent) in catalog.agents.iter().enumerate() {
        println!("  {}. {} {}", idx + 1, id.apply_to(&agent.id), agent.handles.join(", "));
    }
}

pub fn print_trends(trends: &[Trend]) {
    heading("Trends");
    let title = Style::new().bold();
    for trend in trends {
        println!(
            "  {} [{}] relevance {:.2}",
            title.apply_to(&trend.title),
            trend.impact_level,
            trend.relevance_score
        );
        println!("      {}", trend.description);
        for insight in &trend.actionable_insights {
            println!("      - {insight}");
        }
    }
}
