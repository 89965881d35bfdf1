use chrono::NaiveDate;
use duckdb::params;
use serde::Deserialize;
use std::path::Path;
use tracing::{info, warn};

use crate::config::DatabaseConfig;
use crate::db::session;
use crate::ingest::IngestError;

/// One row of the Kaggle chocolate sales export.
#[derive(Debug, Deserialize)]
struct RawSaleRow {
    #[serde(rename = "Sales Person")]
    sales_person: String,
    #[serde(rename = "Country")]
    country: String,
    #[serde(rename = "Product")]
    product: String,
    #[serde(rename = "Date")]
    date: String,
    #[serde(rename = "Amount")]
    amount: String,
    #[serde(rename = "Boxes Shipped")]
    boxes_shipped: String,
}

/// Bulk-loads the chocolate sales CSV into the database.
///
/// Admin path: this is the one writable session in the codebase, used from
/// the CLI before the server is started. Unparseable rows are skipped and
/// logged rather than failing the load.
pub struct ChocolateSalesLoader {
    db: DatabaseConfig,
}

impl ChocolateSalesLoader {
    pub fn new(db: DatabaseConfig) -> Self {
        Self { db }
    }

    pub fn load(&self, csv_path: &Path) -> Result<usize, IngestError> {
        let conn = session::open_admin(&self.db)
            .map_err(|e| IngestError::DatabaseError(e.to_string()))?;

        conn.execute_batch(
            "CREATE SEQUENCE IF NOT EXISTS chocolate_sales_id_seq;
             CREATE TABLE IF NOT EXISTS chocolate_sales (
                 id INTEGER PRIMARY KEY DEFAULT nextval('chocolate_sales_id_seq'),
                 sales_person VARCHAR(100),
                 country VARCHAR(50),
                 product VARCHAR(100),
                 date DATE,
                 amount DECIMAL(10, 2),
                 boxes_shipped INTEGER,
                 created_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP
             );",
        )
        .map_err(|e| IngestError::DatabaseError(e.to_string()))?;

        let mut reader = csv::Reader::from_path(csv_path)?;
        let mut stmt = conn
            .prepare(
                "INSERT INTO chocolate_sales \
                 (sales_person, country, product, date, amount, boxes_shipped) \
                 VALUES (?, ?, ?, ?, ?, ?)",
            )
            .map_err(|e| IngestError::DatabaseError(e.to_string()))?;

        let mut loaded = 0usize;
        // Row numbers are reported 1-based counting the header line.
        for (line, record) in reader.deserialize::<RawSaleRow>().enumerate() {
            let row_num = line + 2;
            let row = match record {
                Ok(row) => row,
                Err(e) => {
                    warn!("Skipping row {}: {}", row_num, e);
                    continue;
                }
            };
            let (date, amount, boxes) = match parse_row(&row) {
                Ok(parsed) => parsed,
                Err(e) => {
                    warn!("Skipping row {}: {}", row_num, e);
                    continue;
                }
            };
            stmt.execute(params![
                row.sales_person,
                row.country,
                row.product,
                date.to_string(),
                amount,
                boxes,
            ])
            .map_err(|e| IngestError::DatabaseError(e.to_string()))?;
            loaded += 1;
        }

        info!("Loaded {} chocolate sales rows from {}", loaded, csv_path.display());
        Ok(loaded)
    }
}

fn parse_row(row: &RawSaleRow) -> Result<(NaiveDate, f64, i32), IngestError> {
    let date = parse_date(&row.date)?;
    let amount = parse_amount(&row.amount)?;
    let boxes = row
        .boxes_shipped
        .trim()
        .parse::<i32>()
        .map_err(|e| IngestError::ParsingError(format!("bad box count '{}': {}", row.boxes_shipped, e)))?;
    Ok((date, amount, boxes))
}

/// Converts `$5,320.00` to `5320.00`.
fn parse_amount(amount: &str) -> Result<f64, IngestError> {
    let cleaned = amount.trim().replace(['$', ','], "");
    cleaned
        .parse::<f64>()
        .map_err(|e| IngestError::ParsingError(format!("bad amount '{}': {}", amount, e)))
}

/// The export uses DD/MM/YYYY dates.
fn parse_date(date: &str) -> Result<NaiveDate, IngestError> {
    NaiveDate::parse_from_str(date.trim(), "%d/%m/%Y")
        .map_err(|e| IngestError::ParsingError(format!("bad date '{}': {}", date, e)))
}
