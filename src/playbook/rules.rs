//! Play definitions and the trigger rule evaluator.
//!
//! A play triggers iff every `all` clause passes and at least one `any`
//! clause passes; an empty list is vacuously satisfied. Clause evaluation is
//! total: missing data, a missing target or an unrecognized operator make the
//! clause fail instead of erroring, so missing data never triggers a play.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::kpi::{KpiDefinitions, KpiSnapshot};
use crate::state_machine::Payload;

/// What a clause compares: the raw value or its ratio to the KPI target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Relation {
    /// Also used for any unrecognized relation.
    #[default]
    Absolute,
    RatioToTarget,
}

impl From<String> for Relation {
    fn from(s: String) -> Self {
        match s.as_str() {
            "ratio_to_target" => Relation::RatioToTarget,
            _ => Relation::Absolute,
        }
    }
}

impl From<Relation> for String {
    fn from(r: Relation) -> Self {
        match r {
            Relation::Absolute => "absolute".into(),
            Relation::RatioToTarget => "ratio_to_target".into(),
        }
    }
}

/// Comparison operator of a clause.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Operator {
    Lt,
    Le,
    Gt,
    Ge,
    Eq,
    Ne,
    /// Anything else, kept verbatim; always evaluates to false.
    Unrecognized(String),
}

impl Default for Operator {
    fn default() -> Self {
        Operator::Unrecognized(String::new())
    }
}

impl Operator {
    pub fn as_str(&self) -> &str {
        match self {
            Operator::Lt => "<",
            Operator::Le => "<=",
            Operator::Gt => ">",
            Operator::Ge => ">=",
            Operator::Eq => "==",
            Operator::Ne => "!=",
            Operator::Unrecognized(raw) => raw,
        }
    }

    /// Standard numeric comparison of `lhs` against `rhs`.
    pub fn apply(&self, lhs: f64, rhs: f64) -> bool {
        match self {
            Operator::Lt => lhs < rhs,
            Operator::Le => lhs <= rhs,
            Operator::Gt => lhs > rhs,
            Operator::Ge => lhs >= rhs,
            Operator::Eq => lhs == rhs,
            Operator::Ne => lhs != rhs,
            Operator::Unrecognized(_) => false,
        }
    }
}

impl From<String> for Operator {
    fn from(s: String) -> Self {
        match s.as_str() {
            "<" => Operator::Lt,
            "<=" => Operator::Le,
            ">" => Operator::Gt,
            ">=" => Operator::Ge,
            "==" => Operator::Eq,
            "!=" => Operator::Ne,
            _ => Operator::Unrecognized(s),
        }
    }
}

impl From<Operator> for String {
    fn from(op: Operator) -> Self {
        op.as_str().to_string()
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single trigger condition on one KPI.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Clause {
    #[serde(default)]
    pub kpi: Option<String>,
    #[serde(default)]
    pub relation: Relation,
    #[serde(default)]
    pub operator: Operator,
    #[serde(default)]
    pub value: Option<f64>,
}

impl Clause {
    pub fn new(kpi: &str, relation: Relation, operator: &str, value: f64) -> Self {
        Self {
            kpi: Some(kpi.to_string()),
            relation,
            operator: Operator::from(operator.to_string()),
            value: Some(value),
        }
    }

    /// Evaluates the clause; fails closed on anything missing.
    pub fn holds(&self, snapshot: &KpiSnapshot, definitions: &KpiDefinitions) -> bool {
        let (Some(name), Some(value)) = (self.kpi.as_deref(), self.value) else {
            return false;
        };
        let Some(&actual) = snapshot.get(name) else {
            return false;
        };
        let metric = match self.relation {
            Relation::Absolute => Some(actual),
            Relation::RatioToTarget => definitions
                .get(name)
                .and_then(|def| def.ratio_to_target(actual)),
        };
        metric.is_some_and(|m| self.operator.apply(m, value))
    }

    /// Describes why the clause is malformed, if it is.
    pub fn problem(&self) -> Option<String> {
        if self.kpi.as_deref().is_none_or(str::is_empty) {
            return Some("clause is missing `kpi`".into());
        }
        if let Operator::Unrecognized(raw) = &self.operator {
            return Some(if raw.is_empty() {
                "clause is missing `operator`".into()
            } else {
                format!("clause has unrecognized operator `{raw}`")
            });
        }
        if self.value.is_none() {
            return Some("clause is missing `value`".into());
        }
        None
    }
}

/// The trigger block of a play.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Triggers {
    #[serde(default)]
    pub all: Vec<Clause>,
    #[serde(default)]
    pub any: Vec<Clause>,
}

/// One step of a play's job plan; becomes one job when the play triggers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepSpec {
    #[serde(rename = "type")]
    pub job_type: String,
    #[serde(default)]
    pub handler: Option<String>,
    #[serde(default)]
    pub params: Payload,
}

/// A named rule mapping a KPI trigger condition to a plan of jobs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Play {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub intent: String,
    #[serde(default)]
    pub impact_hypothesis: String,
    #[serde(default)]
    pub triggers: Triggers,
    #[serde(default)]
    pub job_plan: Vec<StepSpec>,
}

/// Decides whether a play triggers for a KPI snapshot.
pub struct RuleEvaluator;

impl RuleEvaluator {
    /// Pure and deterministic: identical inputs always give the same answer.
    pub fn evaluate(snapshot: &KpiSnapshot, play: &Play, definitions: &KpiDefinitions) -> bool {
        let triggers = &play.triggers;
        let all_pass = triggers
            .all
            .iter()
            .all(|c| c.holds(snapshot, definitions));
        let any_pass =
            triggers.any.is_empty() || triggers.any.iter().any(|c| c.holds(snapshot, definitions));
        all_pass && any_pass
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::playbook::KpiDefinition;

    fn snapshot(entries: &[(&str, f64)]) -> KpiSnapshot {
        entries.iter().map(|(k, v)| (k.to_string(), *v)).collect()
    }

    fn defs(entries: &[(&str, Option<f64>)]) -> KpiDefinitions {
        entries
            .iter()
            .map(|(k, t)| (k.to_string(), KpiDefinition::new(*k, *t)))
            .collect()
    }

    fn play(all: Vec<Clause>, any: Vec<Clause>) -> Play {
        Play {
            id: "p".into(),
            name: "Play".into(),
            intent: String::new(),
            impact_hypothesis: String::new(),
            triggers: Triggers { all, any },
            job_plan: Vec::new(),
        }
    }

    fn abs(kpi: &str, op: &str, value: f64) -> Clause {
        Clause::new(kpi, Relation::Absolute, op, value)
    }

    #[test]
    fn empty_triggers_are_vacuously_true() {
        let p = play(vec![], vec![]);
        assert!(RuleEvaluator::evaluate(&KpiSnapshot::new(), &p, &KpiDefinitions::new()));
    }

    #[test]
    fn absolute_clause_is_direct_comparison() {
        let snap = snapshot(&[("nps", 35.0)]);
        let d = KpiDefinitions::new();
        let cases = [
            ("<", 40.0, true),
            ("<", 35.0, false),
            ("<=", 35.0, true),
            (">", 35.0, false),
            (">=", 35.0, true),
            ("==", 35.0, true),
            ("!=", 35.0, false),
            ("!=", 36.0, true),
        ];
        for (op, value, expected) in cases {
            assert_eq!(abs("nps", op, value).holds(&snap, &d), expected, "nps {op} {value}");
        }
    }

    #[test]
    fn missing_kpi_fails_every_operator() {
        let snap = snapshot(&[("aov", 45.0)]);
        for op in ["<", "<=", ">", ">=", "==", "!="] {
            assert!(!abs("nps", op, 0.0).holds(&snap, &KpiDefinitions::new()));
        }
    }

    #[test]
    fn ratio_clause_divides_by_target() {
        let snap = snapshot(&[("cr_main_funnel", 0.04)]);
        let d = defs(&[("cr_main_funnel", Some(0.05))]);
        let clause = Clause::new("cr_main_funnel", Relation::RatioToTarget, "<", 0.9);
        assert!(clause.holds(&snap, &d));
        let clause = Clause::new("cr_main_funnel", Relation::RatioToTarget, "<", 0.7);
        assert!(!clause.holds(&snap, &d));
    }

    #[test]
    fn ratio_clause_without_positive_target_fails() {
        let snap = snapshot(&[("x", 1.0)]);
        for target in [None, Some(0.0), Some(-2.0)] {
            let d = defs(&[("x", target)]);
            for op in ["<", "<=", ">", ">=", "==", "!="] {
                let clause = Clause::new("x", Relation::RatioToTarget, op, 0.5);
                assert!(!clause.holds(&snap, &d), "target {target:?} op {op}");
            }
        }
        // No definition at all.
        let clause = Clause::new("x", Relation::RatioToTarget, "!=", 0.5);
        assert!(!clause.holds(&snap, &KpiDefinitions::new()));
    }

    #[test]
    fn unrecognized_operator_fails_closed() {
        let snap = snapshot(&[("nps", 35.0)]);
        assert!(!abs("nps", "=~", 35.0).holds(&snap, &KpiDefinitions::new()));
    }

    #[test]
    fn malformed_clause_fails_closed() {
        let snap = snapshot(&[("nps", 35.0)]);
        let d = KpiDefinitions::new();
        let mut clause = abs("nps", "<", 40.0);
        clause.kpi = None;
        assert!(!clause.holds(&snap, &d));

        let mut clause = abs("nps", "<", 40.0);
        clause.value = None;
        assert!(!clause.holds(&snap, &d));

        assert!(!Clause::default().holds(&snap, &d));
    }

    #[test]
    fn all_requires_every_clause() {
        let snap = snapshot(&[("a", 1.0), ("b", 5.0)]);
        let d = KpiDefinitions::new();
        let p = play(vec![abs("a", "<", 2.0), abs("b", "<", 2.0)], vec![]);
        assert!(!RuleEvaluator::evaluate(&snap, &p, &d));
        let p = play(vec![abs("a", "<", 2.0), abs("b", ">", 2.0)], vec![]);
        assert!(RuleEvaluator::evaluate(&snap, &p, &d));
    }

    #[test]
    fn any_requires_at_least_one_clause() {
        let snap = snapshot(&[("a", 1.0)]);
        let d = KpiDefinitions::new();
        let p = play(vec![], vec![abs("a", ">", 2.0), abs("missing", "<", 2.0)]);
        assert!(!RuleEvaluator::evaluate(&snap, &p, &d));
        let p = play(vec![], vec![abs("a", ">", 2.0), abs("a", "<", 2.0)]);
        assert!(RuleEvaluator::evaluate(&snap, &p, &d));
    }

    #[test]
    fn all_and_any_combine() {
        let snap = snapshot(&[("a", 1.0), ("b", 10.0)]);
        let d = KpiDefinitions::new();
        let p = play(vec![abs("a", "<", 2.0)], vec![abs("b", "<", 5.0)]);
        assert!(!RuleEvaluator::evaluate(&snap, &p, &d));
        let p = play(vec![abs("a", "<", 2.0)], vec![abs("b", "<", 5.0), abs("b", ">=", 10.0)]);
        assert!(RuleEvaluator::evaluate(&snap, &p, &d));
    }

    #[test]
    fn evaluation_is_idempotent() {
        let snap = snapshot(&[("a", 1.0)]);
        let d = KpiDefinitions::new();
        let p = play(vec![abs("a", "<", 2.0)], vec![]);
        let first = RuleEvaluator::evaluate(&snap, &p, &d);
        for _ in 0..5 {
            assert_eq!(RuleEvaluator::evaluate(&snap, &p, &d), first);
        }
    }

    #[test]
    fn parse_play_from_yaml() {
        let yaml = r#"
id: fix_funnel
name: Fix main funnel
triggers:
  all:
    - kpi: cr_main_funnel
      relation: ratio_to_target
      operator: "<"
      value: 0.9
  any:
    - kpi: sessions_main_30d
      operator: ">="
      value: 500
job_plan:
  - type: EXECUTE_PLAY_FUNNEL_AUDIT
    handler: funnel_audit
    params:
      depth: full
"#;
        let p: Play = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(p.triggers.all[0].relation, Relation::RatioToTarget);
        assert_eq!(p.triggers.all[0].operator, Operator::Lt);
        assert_eq!(p.triggers.any[0].relation, Relation::Absolute);
        assert_eq!(p.triggers.any[0].value, Some(500.0));
        assert_eq!(p.job_plan[0].job_type, "EXECUTE_PLAY_FUNNEL_AUDIT");
        assert_eq!(p.job_plan[0].handler.as_deref(), Some("funnel_audit"));
        assert_eq!(p.job_plan[0].params["depth"], "full");
        assert!(p.intent.is_empty());
    }

    #[test]
    fn unknown_relation_and_operator_deserialize() {
        let c: Clause =
            serde_yaml::from_str("kpi: a\nrelation: delta\noperator: '~'\nvalue: 1\n").unwrap();
        assert_eq!(c.relation, Relation::Absolute);
        assert_eq!(c.operator, Operator::Unrecognized("~".into()));
        assert_eq!(c.problem().unwrap(), "clause has unrecognized operator `~`");
    }

    #[test]
    fn clause_problems() {
        assert!(abs("a", "<", 1.0).problem().is_none());
        assert_eq!(Clause::default().problem().unwrap(), "clause is missing `kpi`");
        let mut c = abs("a", "<", 1.0);
        c.operator = Operator::default();
        assert_eq!(c.problem().unwrap(), "clause is missing `operator`");
        let mut c = abs("a", "<", 1.0);
        c.value = None;
        assert_eq!(c.problem().unwrap(), "clause is missing `value`");
    }
}
