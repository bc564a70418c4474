use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::playbook::{KpiDefinition, KpiStatus};
use crate::state_machine::Payload;

/// Rough company size bucket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CompanySize {
    #[default]
    Solo,
    Smb,
    Mid,
    Enterprise,
}

impl fmt::Display for CompanySize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CompanySize::Solo => write!(f, "solo"),
            CompanySize::Smb => write!(f, "smb"),
            CompanySize::Mid => write!(f, "mid"),
            CompanySize::Enterprise => write!(f, "enterprise"),
        }
    }
}

impl FromStr for CompanySize {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "solo" => Ok(CompanySize::Solo),
            "smb" => Ok(CompanySize::Smb),
            "mid" => Ok(CompanySize::Mid),
            "enterprise" => Ok(CompanySize::Enterprise),
            other => Err(format!("unknown company size: {other}")),
        }
    }
}

/// A tenant whose KPIs drive growth cycles. Identity is fixed once jobs or
/// readings reference it; only `metadata` is expected to change.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Company {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub industry: Option<String>,
    #[serde(default)]
    pub size: CompanySize,
    #[serde(default)]
    pub metadata: Payload,
    pub created_at: DateTime<Utc>,
}

impl Company {
    pub fn new(id: impl Into<String>, name: impl Into<String>, now: DateTime<Utc>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            industry: None,
            size: CompanySize::default(),
            metadata: Payload::new(),
            created_at: now,
        }
    }

    pub fn with_industry(mut self, industry: impl Into<String>) -> Self {
        self.industry = Some(industry.into());
        self
    }

    pub fn with_size(mut self, size: CompanySize) -> Self {
        self.size = size;
        self
    }
}

/// One recorded KPI value, assessed against its definition at record time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KpiReading {
    pub id: String,
    pub company_id: String,
    pub name: String,
    pub value: f64,
    #[serde(default)]
    pub target: Option<f64>,
    pub status: KpiStatus,
    pub recorded_at: DateTime<Utc>,
}

impl KpiReading {
    /// Without a definition the status is `Unknown`.
    pub fn assess(
        company_id: &str,
        name: &str,
        value: f64,
        definition: Option<&KpiDefinition>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            company_id: company_id.to_string(),
            name: name.to_string(),
            value,
            target: definition.and_then(|d| d.target),
            status: definition.map_or(KpiStatus::Unknown, |d| d.assess(value)),
            recorded_at: now,
        }
    }
}
