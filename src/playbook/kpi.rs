use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Current KPI values keyed by metric name.
pub type KpiSnapshot = BTreeMap<String, f64>;

/// KPI definitions keyed by their (unique) name.
pub type KpiDefinitions = BTreeMap<String, KpiDefinition>;

/// Health of a single KPI relative to its target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KpiStatus {
    Ok,
    Warning,
    Critical,
    Unknown,
}

impl fmt::Display for KpiStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KpiStatus::Ok => write!(f, "ok"),
            KpiStatus::Warning => write!(f, "warning"),
            KpiStatus::Critical => write!(f, "critical"),
            KpiStatus::Unknown => write!(f, "unknown"),
        }
    }
}

/// Static definition of a KPI, loaded from `kpis.yml`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KpiDefinition {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub target: Option<f64>,
    #[serde(default = "default_warning_ratio")]
    pub warning_ratio_below: f64,
    #[serde(default = "default_critical_ratio")]
    pub critical_ratio_below: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unit: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

fn default_warning_ratio() -> f64 {
    0.8
}

fn default_critical_ratio() -> f64 {
    0.5
}

impl Default for KpiDefinition {
    fn default() -> Self {
        Self {
            name: String::new(),
            target: None,
            warning_ratio_below: default_warning_ratio(),
            critical_ratio_below: default_critical_ratio(),
            unit: None,
            description: None,
        }
    }
}

impl KpiDefinition {
    pub fn new(name: impl Into<String>, target: Option<f64>) -> Self {
        Self {
            name: name.into(),
            target,
            ..Default::default()
        }
    }

    /// `actual / target`, only when the target is strictly positive.
    pub fn ratio_to_target(&self, actual: f64) -> Option<f64> {
        self.target.filter(|t| *t > 0.0).map(|t| actual / t)
    }

    /// Classifies `value` against the target using strict `<` thresholds.
    ///
    /// No target (or a zero target) means there is nothing to fall short of,
    /// so the KPI is `Ok`. A negative target yields a ratio of 0.
    pub fn assess(&self, value: f64) -> KpiStatus {
        let target = match self.target {
            Some(t) if t != 0.0 => t,
            _ => return KpiStatus::Ok,
        };
        let ratio = if target > 0.0 { value / target } else { 0.0 };
        if ratio < self.critical_ratio_below {
            KpiStatus::Critical
        } else if ratio < self.warning_ratio_below {
            KpiStatus::Warning
        } else {
            KpiStatus::Ok
        }
    }
}
