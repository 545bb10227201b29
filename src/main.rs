use std::path::PathBuf;

use anyhow::Context;
use chrono::Local;
use clap::{Args, Parser, Subcommand};
use serde::Serialize;
use tracing_subscriber::EnvFilter;

mod dashboard;
mod error;
mod insights;
mod kpi;
mod models;
mod report;
mod risk;
mod store;
mod trend;

use models::SalesRecord;

const DEFAULT_DATA_PATH: &str = "data/sales_data.csv";

#[derive(Parser)]
#[command(name = "sales-analytics")]
#[command(about = "Sales KPIs, customer segmentation, trend forecasting and insights", long_about = None)]
struct Cli {
    /// Sales ledger CSV (falls back to SALES_DATA_PATH, then data/sales_data.csv)
    #[arg(long, global = true)]
    data: Option<PathBuf>,

    /// Only include these categories (repeatable)
    #[arg(long = "category")]
    categories: Vec<String>,

    /// Only include orders from these years (repeatable)
    #[arg(long = "year")]
    years: Vec<i32>,

    /// Revenue goal that counts as a health score of 100
    #[arg(long, global = true, default_value_t = kpi::DEFAULT_TARGET_REVENUE)]
    target_revenue: f64,

    /// Print results as JSON
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Headline KPIs and business health
    Kpis,
    /// Recency/frequency/monetary segmentation with risk tiers
    Segments,
    /// Customers split into revenue tertiles
    ValueSegments,
    /// Monthly revenue, average growth and next-month forecast
    Trend,
    /// Product revenue and units sold
    Products {
        #[arg(long, default_value_t = 10)]
        limit: usize,
    },
    /// Rule-based observations on health and trend
    Insights,
    /// Generate a markdown report
    Report {
        #[arg(long, default_value = "report.md")]
        out: PathBuf,
    },
    /// Export the filtered ledger as a timestamped CSV
    Export {
        #[arg(long, default_value = "reports")]
        dir: PathBuf,
    },
    /// Append a sale to the ledger
    Add(NewSale),
}

#[derive(Args)]
struct NewSale {
    /// Order identifier; a UUID is generated when omitted
    #[arg(long)]
    order_id: Option<String>,
    /// Order date as YYYY-MM-DD (defaults to today)
    #[arg(long)]
    date: Option<String>,
    #[arg(long)]
    customer: String,
    #[arg(long)]
    product: String,
    #[arg(long)]
    category: String,
    #[arg(long, value_parser = clap::value_parser!(u32).range(1..))]
    quantity: u32,
    #[arg(long)]
    revenue: f64,
}

impl NewSale {
    fn into_record(self) -> anyhow::Result<SalesRecord> {
        if !self.revenue.is_finite() || self.revenue < 0.0 {
            anyhow::bail!("revenue must be a non-negative amount, got {}", self.revenue);
        }
        if self.customer.trim().is_empty() {
            anyhow::bail!("customer name must not be empty");
        }

        let order_date = match self.date.as_deref() {
            Some(value) => store::parse_order_date(value)
                .with_context(|| format!("invalid order date '{value}'"))?,
            None => Local::now()
                .date_naive()
                .and_hms_opt(0, 0, 0)
                .context("invalid order date")?,
        };

        Ok(SalesRecord {
            order_id: self.order_id.unwrap_or_else(store::new_order_id),
            order_date,
            customer_id: store::derive_customer_id(&self.customer),
            customer_name: self.customer,
            product: self.product,
            category: self.category,
            quantity: self.quantity,
            revenue: self.revenue,
        })
    }
}

fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let data_path = cli
        .data
        .clone()
        .or_else(|| std::env::var_os("SALES_DATA_PATH").map(PathBuf::from))
        .unwrap_or_else(|| PathBuf::from(DEFAULT_DATA_PATH));

    let load_selection = || -> anyhow::Result<Vec<SalesRecord>> {
        let ledger = store::load_records(&data_path)?;
        Ok(store::filter_records(&ledger, &cli.categories, &cli.years))
    };

    match cli.command {
        Commands::Add(sale) => {
            let record = sale.into_record()?;
            store::append_record(&data_path, &record)?;
            println!("Sale {} added to {}.", record.order_id, data_path.display());
        }
        Commands::Kpis => {
            let records = load_selection()?;
            let kpis = kpi::compute_kpis(&records, cli.target_revenue)?;
            if cli.json {
                return print_json(&kpis);
            }
            println!("Total revenue: {:.2}", kpis.total_revenue);
            println!("Total orders: {}", kpis.total_orders);
            println!("Total customers: {}", kpis.total_customers);
            println!("Avg order value: {:.2}", kpis.avg_order_value);
            println!("Health score: {}/100", kpis.health_score);
            println!("Business status: {}", kpis.status);
        }
        Commands::Segments => {
            let records = load_selection()?;
            let rows = risk::rfm_analysis(&records)?;
            if cli.json {
                return print_json(&rows);
            }
            println!("Customer segmentation by recency:");
            for row in rows.iter() {
                println!(
                    "- {} ({}) last order {} days ago, {} orders, {:.2} revenue",
                    row.customer_name,
                    row.risk_tier,
                    row.recency_days,
                    row.frequency,
                    row.monetary
                );
            }
        }
        Commands::ValueSegments => {
            let records = load_selection()?;
            let rows = risk::value_segments(&records)?;
            if cli.json {
                return print_json(&rows);
            }
            println!("Customer segmentation by revenue:");
            for row in rows.iter() {
                println!("- {} ({}) {:.2}", row.customer_name, row.segment, row.revenue);
            }
        }
        Commands::Trend => {
            let records = load_selection()?;
            let summary = trend::summarize_trend(&records)?;
            if cli.json {
                return print_json(&summary);
            }
            if summary.series.is_empty() {
                println!("No sales found for this selection.");
                return Ok(());
            }
            println!("Monthly revenue:");
            for point in summary.series.iter() {
                println!("- {}: {:.2}", point.month, point.revenue);
            }
            match summary.avg_growth_rate {
                Some(rate) => println!("Average growth rate: {:.2}%", rate),
                None => println!("Average growth rate: not enough history"),
            }
            println!("Forecasted next month revenue: {:.0}", summary.forecast);
        }
        Commands::Products { limit } => {
            let records = load_selection()?;
            let products = report::product_performance(&records);
            let top: Vec<_> = products.into_iter().take(limit).collect();
            if cli.json {
                return print_json(&top);
            }
            println!("Top products by revenue:");
            for product in top.iter() {
                println!(
                    "- {}: {:.2} revenue, {} units",
                    product.product, product.revenue, product.quantity
                );
            }
        }
        Commands::Insights => {
            let records = load_selection()?;
            let analysis = dashboard::analyze(&records, cli.target_revenue)?;
            if cli.json {
                let insights = analysis.insights.clone()?;
                return print_json(&insights);
            }
            for line in insight_lines(&analysis.insights) {
                println!("{line}");
            }
        }
        Commands::Report { out } => {
            let records = load_selection()?;
            let analysis = dashboard::analyze(&records, cli.target_revenue)?;
            let products = report::product_performance(&records);
            let scope = scope_label(&cli.categories, &cli.years);
            let report = report::build_report(
                scope.as_deref(),
                cli.target_revenue,
                Local::now().naive_local(),
                &analysis,
                &products,
            );
            std::fs::write(&out, report)
                .with_context(|| format!("failed to write {}", out.display()))?;
            println!("Report written to {}.", out.display());
        }
        Commands::Export { dir } => {
            let records = load_selection()?;
            let path = store::export_records(&dir, &records, Local::now().naive_local())?;
            println!("Exported {} sales to {}.", records.len(), path.display());
        }
    }

    Ok(())
}

fn insight_lines(insights: &error::Result<Vec<String>>) -> Vec<String> {
    match insights {
        Ok(insights) => insights.iter().map(|insight| format!("- {insight}")).collect(),
        Err(err) => vec![format!("Not available: {err}")],
    }
}

fn scope_label(categories: &[String], years: &[i32]) -> Option<String> {
    let mut parts = Vec::new();
    if !categories.is_empty() {
        parts.push(categories.join(", "));
    }
    if !years.is_empty() {
        let years: Vec<String> = years.iter().map(|year| year.to_string()).collect();
        parts.push(years.join(", "));
    }
    if parts.is_empty() {
        None
    } else {
        Some(parts.join(" / "))
    }
}
