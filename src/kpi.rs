use std::collections::HashSet;

use tracing::debug;

use crate::error::{AnalyticsError, Result};
use crate::models::{HealthStatus, KpiSnapshot, SalesRecord};

pub const DEFAULT_TARGET_REVENUE: f64 = 100_000.0;

pub fn compute_kpis(records: &[SalesRecord], target_revenue: f64) -> Result<KpiSnapshot> {
    if !(target_revenue > 0.0) {
        return Err(AnalyticsError::InvalidConfiguration(target_revenue));
    }

    let total_revenue: f64 = records.iter().map(|record| record.revenue).sum();
    let total_orders = records
        .iter()
        .map(|record| record.order_id.as_str())
        .collect::<HashSet<_>>()
        .len();
    let total_customers = records
        .iter()
        .map(|record| record.customer_id.as_str())
        .collect::<HashSet<_>>()
        .len();

    let avg_order_value = if total_orders == 0 {
        0.0
    } else {
        round_cents(total_revenue / total_orders as f64)
    };

    let health_score = health_score(total_revenue, target_revenue);
    let status = health_status(health_score);

    debug!(
        total_revenue,
        total_orders, total_customers, health_score, "computed kpis"
    );

    Ok(KpiSnapshot {
        total_revenue,
        total_orders,
        total_customers,
        avg_order_value,
        health_score,
        status,
    })
}

pub fn health_score(total_revenue: f64, target_revenue: f64) -> u8 {
    let ratio = (total_revenue / target_revenue) * 100.0;
    ratio.min(100.0).max(0.0).floor() as u8
}

pub fn health_status(health_score: u8) -> HealthStatus {
    match health_score {
        0..=49 => HealthStatus::Critical,
        50..=79 => HealthStatus::Warning,
        _ => HealthStatus::Good,
    }
}

fn round_cents(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
