use std::fmt;

use chrono::NaiveDateTime;
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SalesRecord {
    pub order_id: String,
    pub order_date: NaiveDateTime,
    pub customer_id: String,
    pub customer_name: String,
    pub product: String,
    pub category: String,
    pub quantity: u32,
    pub revenue: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum HealthStatus {
    Good,
    Warning,
    Critical,
}

impl fmt::Display for HealthStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            HealthStatus::Good => "Good",
            HealthStatus::Warning => "Warning",
            HealthStatus::Critical => "Critical",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct KpiSnapshot {
    pub total_revenue: f64,
    pub total_orders: usize,
    pub total_customers: usize,
    pub avg_order_value: f64,
    pub health_score: u8,
    pub status: HealthStatus,
}

/// Recency tertile: the most recently active third of customers is `Low`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub enum RiskTier {
    #[serde(rename = "Low Risk")]
    Low,
    #[serde(rename = "Medium Risk")]
    Medium,
    #[serde(rename = "High Risk")]
    High,
}

impl fmt::Display for RiskTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            RiskTier::Low => "Low Risk",
            RiskTier::Medium => "Medium Risk",
            RiskTier::High => "High Risk",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CustomerRfm {
    pub customer_name: String,
    pub recency_days: i64,
    pub frequency: usize,
    pub monetary: f64,
    pub risk_tier: RiskTier,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub enum ValueSegment {
    #[serde(rename = "Low Value")]
    Low,
    #[serde(rename = "Medium Value")]
    Medium,
    #[serde(rename = "High Value")]
    High,
}

impl fmt::Display for ValueSegment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            ValueSegment::Low => "Low Value",
            ValueSegment::Medium => "Medium Value",
            ValueSegment::High => "High Value",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CustomerValue {
    pub customer_name: String,
    pub revenue: f64,
    pub segment: ValueSegment,
}

/// One calendar month of revenue, keyed `YYYY-MM`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrendPoint {
    pub month: String,
    pub revenue: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrendSummary {
    pub series: Vec<TrendPoint>,
    /// Mean month-over-month growth in percent; `None` with fewer than two months.
    pub avg_growth_rate: Option<f64>,
    pub forecast: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProductPerformance {
    pub product: String,
    pub revenue: f64,
    pub quantity: u64,
}
