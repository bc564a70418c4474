//! Market-insight strategies. Only a static fixture ships; real sources plug
//! in behind [`InsightSource`].

use serde::{Deserialize, Serialize};

use crate::company::Company;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrendCategory {
    Technology,
    Market,
    Consumer,
    Business,
    Ai,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trend {
    pub id: String,
    pub category: TrendCategory,
    pub title: String,
    pub description: String,
    pub impact_level: String,
    /// 0 to 1.
    pub relevance_score: f64,
    pub actionable_insights: Vec<String>,
}

pub trait InsightSource: Send + Sync {
    /// Trends relevant to `company`, most relevant first.
    fn trends(&self, company: &Company) -> Vec<Trend>;
}

/// Returns the same hand-written trends for every company.
#[derive(Debug, Clone, Copy, Default)]
pub struct StaticInsights;

impl InsightSource for StaticInsights {
    fn trends(&self, _company: &Company) -> Vec<Trend> {
        vec![
            Trend {
                id: "trend_ai_automation_2025".into(),
                category: TrendCategory::Ai,
                title: "AI Automation Services Surge".into(),
                description: "High demand for AI automation setup services. Market growing 40% YoY."
                    .into(),
                impact_level: "high".into(),
                relevance_score: 0.95,
                actionable_insights: vec![
                    "Launch AI automation Fiverr gig".into(),
                    "Create YouTube content about AI automation".into(),
                    "Partner with AI tool providers".into(),
                ],
            },
            Trend {
                id: "trend_digital_products_2025".into(),
                category: TrendCategory::Market,
                title: "Digital Product Sales Growth".into(),
                description: "Digital products (art, templates, courses) seeing 60% growth.".into(),
                impact_level: "high".into(),
                relevance_score: 0.90,
                actionable_insights: vec![
                    "Expand Zen art collection".into(),
                    "Create digital product bundles".into(),
                    "Optimize Shopify store for digital products".into(),
                ],
            },
        ]
    }
}
