use std::collections::HashMap;
use std::fmt::Write;

use chrono::NaiveDateTime;

use crate::dashboard::Analysis;
use crate::models::{ProductPerformance, SalesRecord};
use crate::risk;

pub fn product_performance(records: &[SalesRecord]) -> Vec<ProductPerformance> {
    let mut map: HashMap<&str, (f64, u64)> = HashMap::new();

    for record in records {
        let entry = map.entry(record.product.as_str()).or_insert((0.0, 0));
        entry.0 += record.revenue;
        entry.1 += u64::from(record.quantity);
    }

    let mut products: Vec<ProductPerformance> = map
        .into_iter()
        .map(|(product, (revenue, quantity))| ProductPerformance {
            product: product.to_string(),
            revenue,
            quantity,
        })
        .collect();

    products.sort_by(|a, b| {
        b.revenue
            .partial_cmp(&a.revenue)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.product.cmp(&b.product))
    });
    products
}

pub fn build_report(
    scope: Option<&str>,
    target_revenue: f64,
    generated_at: NaiveDateTime,
    analysis: &Analysis,
    products: &[ProductPerformance],
) -> String {
    let mut output = String::new();
    let scope_label = scope.unwrap_or("all categories and years");
    let kpis = &analysis.kpis;

    let _ = writeln!(output, "# Sales & Customer Analytics Report");
    let _ = writeln!(
        output,
        "Generated {} for {} (target revenue {:.2})",
        generated_at.format("%Y-%m-%d %H:%M:%S"),
        scope_label,
        target_revenue
    );
    let _ = writeln!(output);
    let _ = writeln!(output, "## Key Indicators");
    let _ = writeln!(output, "- Total revenue: {:.2}", kpis.total_revenue);
    let _ = writeln!(output, "- Total orders: {}", kpis.total_orders);
    let _ = writeln!(output, "- Total customers: {}", kpis.total_customers);
    let _ = writeln!(output, "- Average order value: {:.2}", kpis.avg_order_value);
    let _ = writeln!(output, "- Health score: {}/100", kpis.health_score);
    let _ = writeln!(output, "- Business status: {}", kpis.status);

    let _ = writeln!(output);
    let _ = writeln!(output, "## Revenue Trend");

    match &analysis.trend {
        Ok(trend) if trend.series.is_empty() => {
            let _ = writeln!(output, "No sales recorded for this selection.");
        }
        Ok(trend) => {
            for point in trend.series.iter() {
                let _ = writeln!(output, "- {}: {:.2}", point.month, point.revenue);
            }
            match trend.avg_growth_rate {
                Some(rate) => {
                    let _ = writeln!(output, "\nAverage growth rate: {:.2}%", rate);
                }
                None => {
                    let _ = writeln!(output, "\nAverage growth rate: not enough history");
                }
            }
            let _ = writeln!(output, "Forecast for next month: {:.0}", trend.forecast);
        }
        Err(err) => {
            let _ = writeln!(output, "Not available: {err}");
        }
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Customer Risk");

    match &analysis.segments {
        Ok(rows) => {
            for (tier, count) in risk::tier_counts(rows) {
                let _ = writeln!(output, "- {}: {} customers", tier, count);
            }

            let mut by_value = rows.clone();
            by_value.sort_by(|a, b| {
                b.monetary
                    .partial_cmp(&a.monetary)
                    .unwrap_or(std::cmp::Ordering::Equal)
            });
            let _ = writeln!(output, "\nTop customers:");
            for row in by_value.iter().take(5) {
                let _ = writeln!(
                    output,
                    "- {} ({}) {:.2} across {} orders, last seen {} days ago",
                    row.customer_name, row.risk_tier, row.monetary, row.frequency, row.recency_days
                );
            }
        }
        Err(err) => {
            let _ = writeln!(output, "Not available: {err}");
        }
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Top Products");

    if products.is_empty() {
        let _ = writeln!(output, "No products sold for this selection.");
    } else {
        for product in products.iter().take(10) {
            let _ = writeln!(
                output,
                "- {}: {:.2} revenue, {} units",
                product.product, product.revenue, product.quantity
            );
        }
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Insights");
    match &analysis.insights {
        Ok(insights) => {
            for insight in insights.iter() {
                let _ = writeln!(output, "- {insight}");
            }
        }
        Err(err) => {
            let _ = writeln!(output, "Not available: {err}");
        }
    }

    output
}
