use tracing::{info, warn};

use crate::error::Result;
use crate::insights::generate_insights;
use crate::kpi::compute_kpis;
use crate::models::{CustomerRfm, KpiSnapshot, SalesRecord, TrendSummary};
use crate::risk::rfm_analysis;
use crate::trend::summarize_trend;

/// Every derived view of one filtered dataset.
///
/// Segmentation and trend keep their own results so a degenerate customer
/// base or an undefined growth rate does not hide the rest. Insights depend
/// on the growth rate and carry the trend error when it is undefined.
#[derive(Debug, Clone)]
pub struct Analysis {
    pub kpis: KpiSnapshot,
    pub segments: Result<Vec<CustomerRfm>>,
    pub trend: Result<TrendSummary>,
    pub insights: Result<Vec<String>>,
}

impl Analysis {
    /// Average monthly growth in percent; `None` with fewer than two months.
    pub fn growth_rate(&self) -> Result<Option<f64>> {
        self.trend
            .as_ref()
            .map(|trend| trend.avg_growth_rate)
            .map_err(Clone::clone)
    }
}

pub fn analyze(records: &[SalesRecord], target_revenue: f64) -> Result<Analysis> {
    let (kpis, (segments, trend)) = rayon::join(
        || compute_kpis(records, target_revenue),
        || rayon::join(|| rfm_analysis(records), || summarize_trend(records)),
    );
    let kpis = kpis?;

    if let Err(err) = &segments {
        warn!(error = %err, "customer segmentation unavailable");
    }
    if let Err(err) = &trend {
        warn!(error = %err, "revenue trend unavailable");
    }

    let mut analysis = Analysis {
        kpis,
        segments,
        trend,
        insights: Ok(Vec::new()),
    };
    analysis.insights = analysis
        .growth_rate()
        .map(|rate| generate_insights(&analysis.kpis, rate.unwrap_or(0.0)));

    info!(
        records = records.len(),
        health_score = analysis.kpis.health_score,
        status = %analysis.kpis.status,
        "analysis complete"
    );

    Ok(analysis)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AnalyticsError;
    use crate::models::HealthStatus;
    use chrono::NaiveDate;

    fn sale(order_id: &str, customer: &str, date: (i32, u32, u32), revenue: f64) -> SalesRecord {
        SalesRecord {
            order_id: order_id.to_string(),
            order_date: NaiveDate::from_ymd_opt(date.0, date.1, date.2)
                .unwrap()
                .and_hms_opt(0, 0, 0)
                .unwrap(),
            customer_id: customer[..3].to_uppercase(),
            customer_name: customer.to_string(),
            product: "Printer".to_string(),
            category: "Office".to_string(),
            quantity: 1,
            revenue,
        }
    }

    #[test]
    fn two_sale_example() {
        let records = vec![
            sale("1", "Meera Shah", (2024, 1, 10), 100.0),
            sale("2", "Omar Farouk", (2024, 2, 10), 200.0),
        ];

        let analysis = analyze(&records, 1000.0).unwrap();
        assert_eq!(analysis.kpis.total_revenue, 300.0);
        assert_eq!(analysis.kpis.health_score, 30);
        assert_eq!(analysis.kpis.status, HealthStatus::Critical);
        assert_eq!(analysis.growth_rate(), Ok(Some(100.0)));
        assert_eq!(
            analysis.insights.unwrap(),
            vec![
                "Overall business health is critical.",
                "Average order value is low. Upselling recommended.",
            ]
        );
        assert!(matches!(
            analysis.segments,
            Err(AnalyticsError::DegenerateSegmentation { customers: 2, .. })
        ));
    }

    #[test]
    fn declining_trend_is_reported() {
        let records = vec![
            sale("1", "Meera Shah", (2024, 1, 3), 60_000.0),
            sale("2", "Omar Farouk", (2024, 2, 14), 30_000.0),
            sale("3", "Lina Torres", (2024, 3, 28), 15_000.0),
        ];

        let analysis = analyze(&records, 100_000.0).unwrap();
        assert_eq!(analysis.kpis.health_score, 100);
        assert_eq!(analysis.growth_rate(), Ok(Some(-50.0)));
        assert_eq!(analysis.insights.unwrap(), vec!["Sales trend shows decline."]);

        let segments = analysis.segments.unwrap();
        assert_eq!(segments.len(), 3);
        let trend = analysis.trend.unwrap();
        assert!((trend.forecast - 7_500.0).abs() < 1e-9);
    }

    #[test]
    fn zero_revenue_month_withholds_insights() {
        let records = vec![
            sale("1", "Meera Shah", (2024, 1, 3), 0.0),
            sale("2", "Omar Farouk", (2024, 2, 14), 60_000.0),
            sale("3", "Lina Torres", (2024, 3, 28), 50_000.0),
        ];

        let analysis = analyze(&records, 100_000.0).unwrap();
        let undefined = AnalyticsError::UndefinedGrowthRate {
            month: "2024-02".to_string(),
        };
        assert_eq!(analysis.kpis.health_score, 100);
        assert_eq!(analysis.growth_rate(), Err(undefined.clone()));
        assert_eq!(analysis.trend, Err(undefined.clone()));
        assert_eq!(analysis.insights, Err(undefined));
    }

    #[test]
    fn single_month_uses_zero_growth() {
        let records = vec![
            sale("1", "Meera Shah", (2024, 1, 3), 40_000.0),
            sale("2", "Omar Farouk", (2024, 1, 14), 45_000.0),
        ];

        let analysis = analyze(&records, 100_000.0).unwrap();
        assert_eq!(analysis.growth_rate(), Ok(None));
        assert_eq!(
            analysis.insights.unwrap(),
            vec!["Business performance indicators are positive."]
        );
    }

    #[test]
    fn invalid_target_fails_whole_analysis() {
        let records = vec![sale("1", "Meera Shah", (2024, 1, 3), 10.0)];
        assert!(matches!(
            analyze(&records, 0.0),
            Err(AnalyticsError::InvalidConfiguration(_))
        ));
    }
}
