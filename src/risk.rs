use std::cmp::Ordering;
use std::collections::BTreeMap;

use chrono::NaiveDateTime;
use tracing::debug;

use crate::error::{AnalyticsError, Result};
use crate::models::{CustomerRfm, CustomerValue, RiskTier, SalesRecord, ValueSegment};

struct CustomerActivity {
    frequency: usize,
    monetary: f64,
    last_order: NaiveDateTime,
}

/// Per-customer recency/frequency/monetary with recency tertile tiers.
///
/// Recency is measured against the latest order in the whole dataset, so
/// customers are comparable regardless of when their own activity stopped.
/// Rows come back sorted by customer name.
pub fn rfm_analysis(records: &[SalesRecord]) -> Result<Vec<CustomerRfm>> {
    let activity = group_by_customer(records);
    let Some(snapshot_date) = records.iter().map(|record| record.order_date).max() else {
        return Err(AnalyticsError::DegenerateSegmentation {
            customers: 0,
            distinct_values: 0,
        });
    };

    let recency: Vec<i64> = activity
        .values()
        .map(|customer| (snapshot_date - customer.last_order).num_days())
        .collect();
    let tiers = tertile_ranks(&recency)?;

    let rows: Vec<CustomerRfm> = activity
        .into_iter()
        .zip(recency)
        .zip(tiers)
        .map(|(((name, customer), recency_days), tier)| CustomerRfm {
            customer_name: name.to_string(),
            recency_days,
            frequency: customer.frequency,
            monetary: customer.monetary,
            risk_tier: match tier {
                0 => RiskTier::Low,
                1 => RiskTier::Medium,
                _ => RiskTier::High,
            },
        })
        .collect();

    debug!(customers = rows.len(), %snapshot_date, "rfm segmentation complete");
    Ok(rows)
}

/// Customers binned into revenue tertiles, sorted by customer name.
pub fn value_segments(records: &[SalesRecord]) -> Result<Vec<CustomerValue>> {
    let activity = group_by_customer(records);
    let revenue: Vec<f64> = activity.values().map(|customer| customer.monetary).collect();
    let tiers = tertile_ranks(&revenue)?;

    Ok(activity
        .into_keys()
        .zip(revenue)
        .zip(tiers)
        .map(|((name, revenue), tier)| CustomerValue {
            customer_name: name.to_string(),
            revenue,
            segment: match tier {
                0 => ValueSegment::Low,
                1 => ValueSegment::Medium,
                _ => ValueSegment::High,
            },
        })
        .collect())
}

pub fn tier_counts(rows: &[CustomerRfm]) -> BTreeMap<RiskTier, usize> {
    let mut counts = BTreeMap::new();
    for row in rows {
        *counts.entry(row.risk_tier).or_insert(0) += 1;
    }
    counts
}

fn group_by_customer(records: &[SalesRecord]) -> BTreeMap<&str, CustomerActivity> {
    let mut customers: BTreeMap<&str, CustomerActivity> = BTreeMap::new();

    for record in records {
        let entry = customers
            .entry(record.customer_name.as_str())
            .or_insert_with(|| CustomerActivity {
                frequency: 0,
                monetary: 0.0,
                last_order: record.order_date,
            });

        entry.frequency += 1;
        entry.monetary += record.revenue;
        entry.last_order = entry.last_order.max(record.order_date);
    }

    customers
}

/// Assigns each value a tertile index 0..=2 by ascending rank.
///
/// Equal values keep their input order, so the split is deterministic for a
/// fixed input. Needs at least three values and three distinct values.
pub fn tertile_ranks<T: PartialOrd>(values: &[T]) -> Result<Vec<usize>> {
    let mut order: Vec<usize> = (0..values.len()).collect();
    order.sort_by(|&a, &b| {
        values[a]
            .partial_cmp(&values[b])
            .unwrap_or(Ordering::Equal)
    });

    let distinct_values = if order.is_empty() {
        0
    } else {
        1 + order
            .windows(2)
            .filter(|pair| values[pair[0]] != values[pair[1]])
            .count()
    };

    if values.len() < 3 || distinct_values < 3 {
        return Err(AnalyticsError::DegenerateSegmentation {
            customers: values.len(),
            distinct_values,
        });
    }

    let n = values.len();
    let mut tiers = vec![0; n];
    for (rank, &index) in order.iter().enumerate() {
        tiers[index] = rank * 3 / n;
    }
    Ok(tiers)
}
