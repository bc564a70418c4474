//! Growth plays: KPI definitions, trigger rules and job generation.

mod factory;
mod kpi;
mod rules;

pub use factory::JobFactory;
pub use kpi::{KpiDefinition, KpiDefinitions, KpiSnapshot, KpiStatus};
pub use rules::{Clause, Operator, Play, Relation, RuleEvaluator, StepSpec, Triggers};
