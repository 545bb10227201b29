use std::collections::BTreeMap;

use chrono::Datelike;
use tracing::debug;

use crate::error::{AnalyticsError, Result};
use crate::models::{SalesRecord, TrendPoint, TrendSummary};

/// Revenue summed per calendar month, oldest first.
pub fn monthly_trend(records: &[SalesRecord]) -> Vec<TrendPoint> {
    let mut buckets: BTreeMap<(i32, u32), f64> = BTreeMap::new();

    for record in records {
        let key = (record.order_date.year(), record.order_date.month());
        *buckets.entry(key).or_insert(0.0) += record.revenue;
    }

    buckets
        .into_iter()
        .map(|((year, month), revenue)| TrendPoint {
            month: format!("{year:04}-{month:02}"),
            revenue,
        })
        .collect()
}

/// Month-over-month growth rates in percent, one per step.
///
/// A month following a zero-revenue month has no defined growth rate and
/// fails the whole computation.
pub fn growth_rates(series: &[TrendPoint]) -> Result<Vec<f64>> {
    series
        .windows(2)
        .map(|pair| {
            let (previous, current) = (&pair[0], &pair[1]);
            if previous.revenue == 0.0 {
                return Err(AnalyticsError::UndefinedGrowthRate {
                    month: current.month.clone(),
                });
            }
            Ok((current.revenue - previous.revenue) / previous.revenue * 100.0)
        })
        .collect()
}

pub fn avg_growth_rate(series: &[TrendPoint]) -> Result<Option<f64>> {
    let rates = growth_rates(series)?;
    if rates.is_empty() {
        return Ok(None);
    }
    Ok(Some(rates.iter().sum::<f64>() / rates.len() as f64))
}

/// Projects the month after the last observed one by applying the average
/// growth rate once. Fewer than two months of history yields 0.
pub fn forecast(series: &[TrendPoint]) -> Result<f64> {
    let (Some(last), Some(rate)) = (series.last(), avg_growth_rate(series)?) else {
        return Ok(0.0);
    };
    Ok(last.revenue * (1.0 + rate / 100.0))
}

pub fn summarize_trend(records: &[SalesRecord]) -> Result<TrendSummary> {
    let series = monthly_trend(records);
    let avg_growth_rate = avg_growth_rate(&series)?;
    let forecast = forecast(&series)?;

    debug!(
        months = series.len(),
        ?avg_growth_rate,
        forecast,
        "trend summarized"
    );

    Ok(TrendSummary {
        series,
        avg_growth_rate,
        forecast,
    })
}
