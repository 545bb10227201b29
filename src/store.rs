use std::fs::{self, OpenOptions};
use std::path::{Path, PathBuf};

use anyhow::Context;
use chrono::{Datelike, NaiveDate, NaiveDateTime, Timelike};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use uuid::Uuid;

use crate::models::SalesRecord;

const DATE_TIME_FORMATS: [&str; 2] = ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S"];

#[derive(Debug, Deserialize)]
struct CsvRow {
    #[serde(rename = "Order_ID")]
    order_id: Option<String>,
    #[serde(rename = "Order_Date")]
    order_date: Option<String>,
    #[serde(rename = "Customer_ID")]
    customer_id: Option<String>,
    #[serde(rename = "Customer_Name")]
    customer_name: Option<String>,
    #[serde(rename = "Product")]
    product: Option<String>,
    #[serde(rename = "Category")]
    category: Option<String>,
    #[serde(rename = "Quantity")]
    quantity: Option<String>,
    #[serde(rename = "Revenue")]
    revenue: Option<String>,
}

#[derive(Debug, Serialize)]
struct CsvOutRow<'a> {
    #[serde(rename = "Order_ID")]
    order_id: &'a str,
    #[serde(rename = "Order_Date")]
    order_date: String,
    #[serde(rename = "Customer_ID")]
    customer_id: &'a str,
    #[serde(rename = "Customer_Name")]
    customer_name: &'a str,
    #[serde(rename = "Product")]
    product: &'a str,
    #[serde(rename = "Category")]
    category: &'a str,
    #[serde(rename = "Quantity")]
    quantity: u32,
    #[serde(rename = "Revenue")]
    revenue: f64,
}

impl<'a> From<&'a SalesRecord> for CsvOutRow<'a> {
    fn from(record: &'a SalesRecord) -> Self {
        CsvOutRow {
            order_id: &record.order_id,
            order_date: format_order_date(record.order_date),
            customer_id: &record.customer_id,
            customer_name: &record.customer_name,
            product: &record.product,
            category: &record.category,
            quantity: record.quantity,
            revenue: record.revenue,
        }
    }
}

impl CsvRow {
    fn into_record(self) -> Option<SalesRecord> {
        let non_empty = |value: Option<String>| {
            value
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let quantity = non_empty(self.quantity)?.parse::<u32>().ok()?;
        let revenue = non_empty(self.revenue)?.parse::<f64>().ok()?;
        if quantity == 0 || !revenue.is_finite() || revenue < 0.0 {
            return None;
        }

        Some(SalesRecord {
            order_id: non_empty(self.order_id)?,
            order_date: parse_order_date(&non_empty(self.order_date)?)?,
            customer_id: non_empty(self.customer_id)?,
            customer_name: non_empty(self.customer_name)?,
            product: non_empty(self.product)?,
            category: non_empty(self.category)?,
            quantity,
            revenue,
        })
    }
}

pub fn parse_order_date(value: &str) -> Option<NaiveDateTime> {
    DATE_TIME_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(value, format).ok())
        .or_else(|| {
            NaiveDate::parse_from_str(value, "%Y-%m-%d")
                .ok()
                .and_then(|date| date.and_hms_opt(0, 0, 0))
        })
}

fn format_order_date(value: NaiveDateTime) -> String {
    if value.num_seconds_from_midnight() == 0 {
        value.format("%Y-%m-%d").to_string()
    } else {
        value.format("%Y-%m-%d %H:%M:%S").to_string()
    }
}

/// Reads the sales ledger, dropping rows that are incomplete or carry an
/// unparsable date, quantity or revenue.
pub fn load_records(csv_path: &Path) -> anyhow::Result<Vec<SalesRecord>> {
    let mut reader = csv::Reader::from_path(csv_path)
        .with_context(|| format!("failed to open {}", csv_path.display()))?;
    let mut records = Vec::new();
    let mut dropped = 0usize;

    for result in reader.deserialize::<CsvRow>() {
        let row = result.with_context(|| format!("malformed CSV in {}", csv_path.display()))?;
        match row.into_record() {
            Some(record) => records.push(record),
            None => dropped += 1,
        }
    }

    if dropped > 0 {
        warn!(dropped, path = %csv_path.display(), "dropped invalid sales rows");
    }
    info!(records = records.len(), path = %csv_path.display(), "loaded sales ledger");

    Ok(records)
}

/// Keeps records in the selected categories and order years. An empty
/// selection keeps everything.
pub fn filter_records(
    records: &[SalesRecord],
    categories: &[String],
    years: &[i32],
) -> Vec<SalesRecord> {
    records
        .iter()
        .filter(|record| categories.is_empty() || categories.contains(&record.category))
        .filter(|record| years.is_empty() || years.contains(&record.order_date.year()))
        .cloned()
        .collect()
}

pub fn derive_customer_id(customer_name: &str) -> String {
    customer_name.chars().take(3).collect::<String>().to_uppercase()
}

pub fn new_order_id() -> String {
    Uuid::new_v4().to_string()
}

/// Appends one sale, writing the header first when the ledger is new.
pub fn append_record(csv_path: &Path, record: &SalesRecord) -> anyhow::Result<()> {
    let needs_header = fs::metadata(csv_path)
        .map(|meta| meta.len() == 0)
        .unwrap_or(true);

    if let Some(parent) = csv_path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }

    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(csv_path)
        .with_context(|| format!("failed to open {} for append", csv_path.display()))?;

    let mut writer = csv::WriterBuilder::new()
        .has_headers(needs_header)
        .from_writer(file);
    writer.serialize(CsvOutRow::from(record))?;
    writer.flush()?;

    info!(order_id = %record.order_id, path = %csv_path.display(), "appended sale");
    Ok(())
}

/// Writes the records to `report_<timestamp>.csv` inside `dir`.
pub fn export_records(
    dir: &Path,
    records: &[SalesRecord],
    generated_at: NaiveDateTime,
) -> anyhow::Result<PathBuf> {
    fs::create_dir_all(dir)
        .with_context(|| format!("failed to create {}", dir.display()))?;
    let path = dir.join(format!(
        "report_{}.csv",
        generated_at.format("%Y%m%d_%H%M%S")
    ));

    let mut writer = csv::Writer::from_path(&path)
        .with_context(|| format!("failed to create {}", path.display()))?;
    if records.is_empty() {
        writer.write_record([
            "Order_ID",
            "Order_Date",
            "Customer_ID",
            "Customer_Name",
            "Product",
            "Category",
            "Quantity",
            "Revenue",
        ])?;
    }
    for record in records {
        writer.serialize(CsvOutRow::from(record))?;
    }
    writer.flush()?;

    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::{tempdir, NamedTempFile};

    const HEADER: &str =
        "Order_ID,Order_Date,Customer_ID,Customer_Name,Product,Category,Quantity,Revenue";

    fn ledger(lines: &[&str]) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "{HEADER}").unwrap();
        for line in lines {
            writeln!(file, "{line}").unwrap();
        }
        file
    }

    fn sample(order_id: &str, date: &str, category: &str) -> SalesRecord {
        SalesRecord {
            order_id: order_id.to_string(),
            order_date: parse_order_date(date).unwrap(),
            customer_id: "RAV".to_string(),
            customer_name: "Ravi Kumar".to_string(),
            product: "Monitor".to_string(),
            category: category.to_string(),
            quantity: 2,
            revenue: 18500.5,
        }
    }

    #[test]
    fn parses_supported_date_formats() {
        let midnight = NaiveDate::from_ymd_opt(2024, 2, 29)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap();
        assert_eq!(parse_order_date("2024-02-29"), Some(midnight));
        assert_eq!(
            parse_order_date("2024-02-29 13:45:00"),
            NaiveDate::from_ymd_opt(2024, 2, 29).unwrap().and_hms_opt(13, 45, 0)
        );
        assert!(parse_order_date("2024-02-29T13:45:00").is_some());
        assert_eq!(parse_order_date("29/02/2024"), None);
        assert_eq!(parse_order_date("2023-02-29"), None);
    }

    #[test]
    fn loads_and_drops_invalid_rows() {
        let file = ledger(&[
            "1001,2024-01-05,RAV,Ravi Kumar,Monitor,Electronics,2,18500",
            "1002,not-a-date,ANI,Anita Rao,Desk,Furniture,1,7000",
            "1003,2024-01-09,ANI,Anita Rao,Desk,Furniture,1,",
            "1004,2024-02-11 10:00:00,ANI,Anita Rao,Chair,Furniture,4,3200.75",
            "1005,2024-02-12,ANI,Anita Rao,Lamp,Furniture,0,900",
            "1006,2024-02-13,ANI,Anita Rao,Lamp,Furniture,1,-900",
            "1007,2024-02-14,ANI,Anita Rao,Lamp,Furniture,1,NaN",
            "1008,2024-02-15,ANI,Anita Rao,Lamp,Furniture,1,inf",
            "1009,2024-02-16,ANI,Anita Rao,Lamp,Furniture,-1,900",
            "1010,2024-02-17,ANI,Anita Rao,Sample Kit,Furniture,1,0",
        ]);

        let records = load_records(file.path()).unwrap();
        let ids: Vec<&str> = records.iter().map(|record| record.order_id.as_str()).collect();
        assert_eq!(ids, vec!["1001", "1004", "1010"]);
        assert_eq!(records[2].revenue, 0.0);
        assert_eq!(records[0].order_id, "1001");
        assert_eq!(records[0].revenue, 18500.0);
        assert_eq!(records[1].quantity, 4);
        assert_eq!(records[1].revenue, 3200.75);
    }

    #[test]
    fn missing_file_is_an_error() {
        let dir = tempdir().unwrap();
        assert!(load_records(&dir.path().join("absent.csv")).is_err());
    }

    #[test]
    fn filters_by_category_and_year() {
        let records = vec![
            sample("1", "2023-06-01", "Electronics"),
            sample("2", "2024-06-01", "Electronics"),
            sample("3", "2024-07-01", "Furniture"),
        ];

        assert_eq!(filter_records(&records, &[], &[]).len(), 3);

        let electronics = filter_records(&records, &["Electronics".to_string()], &[]);
        assert_eq!(electronics.len(), 2);

        let recent = filter_records(&records, &["Electronics".to_string()], &[2024]);
        assert_eq!(recent.len(), 1);
        assert_eq!(recent[0].order_id, "2");
    }

    #[test]
    fn customer_id_from_name_prefix() {
        assert_eq!(derive_customer_id("ravi kumar"), "RAV");
        assert_eq!(derive_customer_id("Al"), "AL");
        assert_ne!(new_order_id(), new_order_id());
    }

    #[test]
    fn append_creates_ledger_with_header() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("data").join("sales.csv");

        append_record(&path, &sample("1", "2024-03-01", "Electronics")).unwrap();
        append_record(&path, &sample("2", "2024-03-02 08:15:00", "Furniture")).unwrap();

        let contents = fs::read_to_string(&path).unwrap();
        assert_eq!(contents.lines().next(), Some(HEADER));
        assert_eq!(contents.lines().count(), 3);

        let records = load_records(&path).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[1], sample("2", "2024-03-02 08:15:00", "Furniture"));
    }

    #[test]
    fn export_names_file_by_timestamp() {
        let dir = tempdir().unwrap();
        let generated_at = parse_order_date("2024-04-01 09:05:30").unwrap();
        let records = vec![sample("1", "2024-03-01", "Electronics")];

        let path = export_records(dir.path(), &records, generated_at).unwrap();
        assert_eq!(
            path.file_name().and_then(|name| name.to_str()),
            Some("report_20240401_090530.csv")
        );
        assert_eq!(load_records(&path).unwrap(), records);
    }
}
