use chrono::DateTime;
use duckdb::types::{TimeUnit, ValueRef};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as JsonValue};
use tracing::debug;

use crate::config::DatabaseConfig;
use crate::db::introspect::{format_schema, SchemaDescriptor, SchemaIntrospector};
use crate::db::session;
use crate::query::{guard, intent, QueryError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueryStatus {
    Success,
    Error,
    NeedsSql,
}

#[derive(Debug, Clone, Serialize)]
pub struct ResultMetadata {
    pub columns: Vec<String>,
    pub row_count: usize,
    pub truncated: bool,
}

/// Visualization-ready query outcome. Field names are a wire contract
/// consumed verbatim by the HTTP layer; absent fields are omitted from the
/// serialized form.
#[derive(Debug, Clone, Serialize)]
pub struct QueryResult {
    pub status: QueryStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sql: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub columns: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rows: Option<Vec<Vec<JsonValue>>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub row_count: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub truncated: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Vec<Map<String, JsonValue>>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<ResultMetadata>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub schema_text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub generated_sql: Option<bool>,
}

impl QueryResult {
    fn empty(status: QueryStatus) -> Self {
        Self {
            status,
            error_message: None,
            sql: None,
            columns: None,
            rows: None,
            row_count: None,
            truncated: None,
            data: None,
            metadata: None,
            schema_text: None,
            generated_sql: None,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        let mut result = Self::empty(QueryStatus::Error);
        result.error_message = Some(message.into());
        result
    }

    pub fn needs_sql(schema_text: String) -> Self {
        let mut result = Self::empty(QueryStatus::NeedsSql);
        result.error_message = Some(
            "Provide SQL for this request. Use the schema to craft a read-only query.".to_string(),
        );
        result.schema_text = Some(schema_text);
        result
    }

    fn success(
        sql: String,
        columns: Vec<String>,
        rows: Vec<Vec<JsonValue>>,
        truncated: bool,
    ) -> Self {
        let data: Vec<Map<String, JsonValue>> = rows
            .iter()
            .map(|row| columns.iter().cloned().zip(row.iter().cloned()).collect())
            .collect();
        let metadata = ResultMetadata {
            columns: columns.clone(),
            row_count: rows.len(),
            truncated,
        };
        let mut result = Self::empty(QueryStatus::Success);
        result.sql = Some(sql);
        result.row_count = Some(rows.len());
        result.truncated = Some(truncated);
        result.columns = Some(columns);
        result.rows = Some(rows);
        result.data = Some(data);
        result.metadata = Some(metadata);
        result
    }
}

/// Schema display payload for the standalone introspection endpoint.
#[derive(Debug, Serialize)]
pub struct SchemaResponse {
    pub status: QueryStatus,
    pub schema: SchemaDescriptor,
    pub schema_text: String,
}

/// Runs vetted read-only statements against a per-request session and
/// answers natural-language questions through the intent patterns.
pub struct QueryEngine {
    db: DatabaseConfig,
    introspector: SchemaIntrospector,
}

impl QueryEngine {
    pub fn new(db: DatabaseConfig) -> Self {
        let introspector = SchemaIntrospector::new(db.clone());
        Self { db, introspector }
    }

    pub fn get_schema(&self) -> Result<SchemaResponse, QueryError> {
        let schema = self.introspector.fetch_schema()?;
        let schema_text = format_schema(&schema);
        Ok(SchemaResponse {
            status: QueryStatus::Success,
            schema,
            schema_text,
        })
    }

    /// Executes a read-only statement, capping the result at `max_rows`.
    ///
    /// Guard rejections come back as `status = error` without a session ever
    /// being opened. Database failures return `Err` and surface to the
    /// caller; no partial results.
    pub fn run_readonly_query(
        &self,
        sql: &str,
        max_rows: usize,
    ) -> Result<QueryResult, QueryError> {
        if !guard::is_readonly_sql(sql) {
            return Ok(QueryResult::error(
                "Only read-only SELECT/WITH queries are allowed.",
            ));
        }

        let conn = session::open_readonly(&self.db)?;
        let mut stmt = conn.prepare(sql)?;

        // Column metadata is only available once the statement has run.
        let mut rows = stmt.query([])?;
        let columns: Vec<String> = rows
            .as_ref()
            .map(|s| s.column_names())
            .unwrap_or_default();
        let column_count = columns.len();

        // Read one row past the cap so truncation is detected without a
        // second round trip.
        let mut raw_rows: Vec<Vec<JsonValue>> = Vec::new();
        let mut truncated = false;
        while let Some(row) = rows.next()? {
            if raw_rows.len() == max_rows {
                truncated = true;
                break;
            }
            let mut values = Vec::with_capacity(column_count);
            for i in 0..column_count {
                values.push(json_safe_value(row.get_ref(i)?));
            }
            raw_rows.push(values);
        }
        drop(rows);

        debug!(
            "Query returned {} rows (truncated: {})",
            raw_rows.len(),
            truncated
        );
        Ok(QueryResult::success(
            sql.to_string(),
            columns,
            raw_rows,
            truncated,
        ))
    }

    /// Answers a question: caller-supplied SQL verbatim, else the intent
    /// patterns; neither yields SQL → `needs_sql` with the schema text so
    /// the caller can craft a statement itself.
    pub fn query_sales(
        &self,
        question: &str,
        sql: Option<&str>,
        max_rows: usize,
    ) -> Result<QueryResult, QueryError> {
        let schema = self.introspector.fetch_schema()?;
        let schema_text = format_schema(&schema);

        let query = match sql {
            Some(given) => Some(given.to_string()),
            None => intent::translate(question, &schema),
        };
        let Some(query) = query else {
            return Ok(QueryResult::needs_sql(schema_text));
        };

        let mut result = self.run_readonly_query(&query, max_rows)?;
        result.schema_text = Some(schema_text);
        result.generated_sql = Some(sql.is_none());
        Ok(result)
    }
}

/// Converts one column value into a JSON-safe representation: temporal
/// values become ISO-8601 text, decimals become exact decimal text, plain
/// scalars pass through unchanged.
fn json_safe_value(value: ValueRef<'_>) -> JsonValue {
    match value {
        ValueRef::Null => JsonValue::Null,
        ValueRef::Boolean(b) => JsonValue::Bool(b),
        ValueRef::TinyInt(v) => JsonValue::from(v),
        ValueRef::SmallInt(v) => JsonValue::from(v),
        ValueRef::Int(v) => JsonValue::from(v),
        ValueRef::BigInt(v) => JsonValue::from(v),
        ValueRef::HugeInt(v) => match i64::try_from(v) {
            Ok(narrow) => JsonValue::from(narrow),
            Err(_) => JsonValue::String(v.to_string()),
        },
        ValueRef::UTinyInt(v) => JsonValue::from(v),
        ValueRef::USmallInt(v) => JsonValue::from(v),
        ValueRef::UInt(v) => JsonValue::from(v),
        ValueRef::UBigInt(v) => JsonValue::from(v),
        ValueRef::Float(v) => JsonValue::from(v),
        ValueRef::Double(v) => JsonValue::from(v),
        // Exact decimal text, never a binary float.
        ValueRef::Decimal(d) => JsonValue::String(d.to_string()),
        ValueRef::Text(bytes) => JsonValue::String(String::from_utf8_lossy(bytes).to_string()),
        ValueRef::Blob(bytes) => JsonValue::String(String::from_utf8_lossy(bytes).to_string()),
        ValueRef::Date32(days) => match DateTime::from_timestamp(i64::from(days) * 86_400, 0) {
            Some(ts) => JsonValue::String(ts.date_naive().to_string()),
            None => JsonValue::Null,
        },
        ValueRef::Timestamp(unit, v) => match DateTime::from_timestamp_micros(to_micros(unit, v)) {
            Some(ts) => JsonValue::String(
                ts.naive_utc().format("%Y-%m-%dT%H:%M:%S%.6f").to_string(),
            ),
            None => JsonValue::Null,
        },
        ValueRef::Time64(unit, v) => {
            let micros = to_micros(unit, v);
            let secs = (micros / 1_000_000).rem_euclid(86_400) as u32;
            let nanos = (micros.rem_euclid(1_000_000) * 1_000) as u32;
            match chrono::NaiveTime::from_num_seconds_from_midnight_opt(secs, nanos) {
                Some(t) => JsonValue::String(t.format("%H:%M:%S%.6f").to_string()),
                None => JsonValue::Null,
            }
        }
        other => JsonValue::String(format!("{:?}", other)),
    }
}

fn to_micros(unit: TimeUnit, value: i64) -> i64 {
    match unit {
        TimeUnit::Second => value * 1_000_000,
        TimeUnit::Millisecond => value * 1_000,
        TimeUnit::Microsecond => value,
        TimeUnit::Nanosecond => value / 1_000,
    }
}
