//! Fixed-vocabulary question-to-SQL translation.
//!
//! An ordered table of named patterns, evaluated first-match-wins. Order
//! matters: some predicates overlap (a question mentioning "sample" and
//! "sales" must hit the sample pattern before the top-sales aggregate).
//! A pattern whose builder cannot produce SQL (table resolution found zero
//! or several candidates) falls through to the later patterns rather than
//! failing the translation outright.

use crate::db::introspect::SchemaDescriptor;

pub struct IntentPattern {
    pub name: &'static str,
    matches: fn(&str) -> bool,
    build: fn(&str, &SchemaDescriptor) -> Option<String>,
}

/// The pattern table, in evaluation order.
const PATTERNS: [IntentPattern; 10] = [
    IntentPattern {
        name: "list_tables",
        matches: |q| q.contains("list tables") || q.contains("show tables"),
        build: |_, _| {
            Some(
                "SELECT table_schema, table_name FROM information_schema.tables \
                 WHERE table_schema NOT IN ('pg_catalog', 'information_schema') \
                 ORDER BY table_schema, table_name;"
                    .to_string(),
            )
        },
    },
    IntentPattern {
        name: "describe_table",
        matches: |q| q.starts_with("describe ") || q.starts_with("show schema for "),
        build: build_describe,
    },
    IntentPattern {
        name: "total_sales",
        matches: |q| q.contains("total sales") || q.contains("sum amount"),
        build: |_, _| {
            Some("SELECT SUM(amount) AS total_amount FROM chocolate_sales;".to_string())
        },
    },
    IntentPattern {
        name: "total_boxes",
        matches: |q| q.contains("total boxes") || q.contains("sum boxes"),
        build: |_, _| {
            Some("SELECT SUM(boxes_shipped) AS total_boxes FROM chocolate_sales;".to_string())
        },
    },
    IntentPattern {
        name: "row_count",
        matches: |q| q.contains("row count") || q.contains("count rows"),
        build: |q, schema| {
            resolve_last_token(q, schema)
                .map(|table| format!("SELECT COUNT(*) AS row_count FROM {};", table))
        },
    },
    IntentPattern {
        name: "sample_rows",
        matches: |q| q.contains("sample") || q.contains("example rows"),
        build: |q, schema| {
            resolve_last_token(q, schema).map(|table| format!("SELECT * FROM {} LIMIT 5;", table))
        },
    },
    IntentPattern {
        name: "top_sales_people",
        matches: |q| q.contains("top") && q.contains("sales"),
        build: |_, _| {
            Some(
                "SELECT sales_person, SUM(amount) AS total_amount \
                 FROM chocolate_sales \
                 GROUP BY sales_person \
                 ORDER BY total_amount DESC LIMIT 10;"
                    .to_string(),
            )
        },
    },
    IntentPattern {
        name: "sales_by_country",
        matches: |q| q.contains("sales by country"),
        build: |_, _| {
            Some(
                "SELECT country, SUM(amount) AS total_amount \
                 FROM chocolate_sales \
                 GROUP BY country \
                 ORDER BY total_amount DESC;"
                    .to_string(),
            )
        },
    },
    IntentPattern {
        name: "sales_by_product",
        matches: |q| q.contains("sales by product"),
        build: |_, _| {
            Some(
                "SELECT product, SUM(amount) AS total_amount \
                 FROM chocolate_sales \
                 GROUP BY product \
                 ORDER BY total_amount DESC;"
                    .to_string(),
            )
        },
    },
    IntentPattern {
        name: "sales_by_month",
        matches: |q| q.contains("sales by month") || q.contains("monthly sales"),
        build: |_, _| {
            Some(
                "SELECT DATE_TRUNC('month', date) AS month, SUM(amount) AS total_amount \
                 FROM chocolate_sales \
                 GROUP BY month \
                 ORDER BY month;"
                    .to_string(),
            )
        },
    },
];

/// Translates a question into SQL, or `None` when no pattern produces a
/// statement (the caller reports `needs_sql`).
pub fn translate(question: &str, schema: &SchemaDescriptor) -> Option<String> {
    let normalized = normalize(question);
    for pattern in &PATTERNS {
        if (pattern.matches)(&normalized) {
            if let Some(sql) = (pattern.build)(&normalized, schema) {
                tracing::debug!("Question matched intent pattern '{}'", pattern.name);
                return Some(sql);
            }
        }
    }
    None
}

fn normalize(question: &str) -> String {
    question
        .to_lowercase()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

fn build_describe(question: &str, schema: &SchemaDescriptor) -> Option<String> {
    let bare = question
        .strip_prefix("describe ")
        .or_else(|| question.strip_prefix("show schema for "))
        .unwrap_or("")
        .trim();

    let mut table_name = bare.to_string();
    if !table_name.is_empty() && !table_name.contains('.') {
        if let Some(resolved) = schema.resolve_table(&table_name) {
            table_name = resolved;
        }
    }

    // The qualified name lands in the statement as a literal. This is a query
    // about catalog metadata, not user data; it must not be copied as a
    // template for interpolating anything else.
    Some(format!(
        "SELECT column_name, data_type, is_nullable \
         FROM information_schema.columns \
         WHERE table_schema || '.' || table_name = '{}' \
         ORDER BY ordinal_position;",
        table_name
    ))
}

fn resolve_last_token(question: &str, schema: &SchemaDescriptor) -> Option<String> {
    let token = question.split_whitespace().last()?;
    schema.resolve_table(token)
}
