use crate::models::KpiSnapshot;

pub const FALLBACK_INSIGHT: &str = "Business performance indicators are positive.";

struct InsightRule {
    applies: fn(&KpiSnapshot, f64) -> bool,
    message: &'static str,
}

/// Evaluated in order; every rule that applies contributes its message.
const RULES: &[InsightRule] = &[
    InsightRule {
        applies: health_is_critical,
        message: "Overall business health is critical.",
    },
    InsightRule {
        applies: sales_declining,
        message: "Sales trend shows decline.",
    },
    InsightRule {
        applies: order_value_low,
        message: "Average order value is low. Upselling recommended.",
    },
];

fn health_is_critical(kpis: &KpiSnapshot, _growth_rate: f64) -> bool {
    kpis.health_score < 50
}

fn sales_declining(_kpis: &KpiSnapshot, growth_rate: f64) -> bool {
    growth_rate < 0.0
}

fn order_value_low(kpis: &KpiSnapshot, _growth_rate: f64) -> bool {
    kpis.avg_order_value < 10_000.0
}

pub fn generate_insights(kpis: &KpiSnapshot, growth_rate: f64) -> Vec<String> {
    let mut insights: Vec<String> = RULES
        .iter()
        .filter(|rule| (rule.applies)(kpis, growth_rate))
        .map(|rule| rule.message.to_string())
        .collect();

    if insights.is_empty() {
        insights.push(FALLBACK_INSIGHT.to_string());
    }

    insights
}
