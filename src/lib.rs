//! KPI-driven growth plays: trigger rules turn KPI snapshots into jobs, jobs
//! are routed to capability-matched agents, and every outcome is recorded as
//! evidence.

pub mod agent;
pub mod catalog;
pub mod company;
pub mod config;
pub mod cycle;
pub mod error;
pub mod insights;
pub mod orchestrator;
pub mod playbook;
pub mod router;
pub mod state_machine;
pub mod store;
pub mod telemetry;

pub use agent::{Agent, AgentSpec, ExecutionError, Executor, JobKind, PlaybookExecutor};
pub use catalog::Catalog;
pub use company::{Company, CompanySize, KpiReading};
pub use config::ChimeraConfig;
pub use cycle::{CycleReport, CycleRequest, GrowthCycle, PlayEvaluation, TriggeredPlay};
pub use error::{ChimeraError, StoreError};
pub use orchestrator::{Clock, Orchestrator, RoutingFailurePolicy};
pub use playbook::{JobFactory, KpiDefinition, KpiSnapshot, KpiStatus, Play, RuleEvaluator};
pub use router::AgentRegistry;
pub use state_machine::{EvidenceRecord, Job, JobStatus, StateMachine, Transition};
pub use store::{JsonFileStore, MemoryStore, Store};
