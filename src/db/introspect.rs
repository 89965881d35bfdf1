use duckdb::{params_from_iter, Connection};
use serde::Serialize;
use std::collections::BTreeMap;
use tracing::debug;

use crate::config::DatabaseConfig;
use crate::db::session;

/// One column as reported by the catalog, in ordinal order.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ColumnDescriptor {
    pub name: String,
    #[serde(rename = "type")]
    pub data_type: String,
    pub nullable: bool,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ForeignKeyRef {
    pub column: String,
    /// Rendered as `<schema>.<table>(<column>)`.
    pub references: String,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct TableDescriptor {
    pub columns: Vec<ColumnDescriptor>,
    pub primary_key: Vec<String>,
    pub foreign_keys: Vec<ForeignKeyRef>,
}

/// Snapshot of the visible schema, keyed by `<schema>.<table>`.
///
/// Built fresh per request — there is no cache to invalidate. The BTreeMap
/// keeps table iteration alphabetic by qualified name.
#[derive(Debug, Clone, Default, Serialize)]
pub struct SchemaDescriptor {
    pub tables: BTreeMap<String, TableDescriptor>,
    pub table_count: usize,
}

impl SchemaDescriptor {
    /// Resolves a bare table name to its fully-qualified form when exactly
    /// one visible table matches by `.<name>` suffix.
    pub fn resolve_table(&self, name: &str) -> Option<String> {
        let suffix = format!(".{}", name);
        let mut matches = self.tables.keys().filter(|key| key.ends_with(&suffix));
        match (matches.next(), matches.next()) {
            (Some(only), None) => Some(only.clone()),
            _ => None,
        }
    }
}

/// Reads catalog metadata for the allow-listed tables.
///
/// Only tables named in the allow-list are ever visible, regardless of what
/// else exists in the database. Errors propagate to the caller; the
/// per-call session closes on drop.
pub struct SchemaIntrospector {
    db: DatabaseConfig,
}

impl SchemaIntrospector {
    pub fn new(db: DatabaseConfig) -> Self {
        Self { db }
    }

    pub fn fetch_schema(&self) -> Result<SchemaDescriptor, duckdb::Error> {
        let mut schema = SchemaDescriptor::default();
        let allowed = &self.db.allowed_tables;
        if allowed.is_empty() {
            return Ok(schema);
        }

        let conn = session::open_readonly(&self.db)?;
        self.fetch_columns(&conn, &mut schema)?;
        self.fetch_primary_keys(&conn, &mut schema)?;
        self.fetch_foreign_keys(&conn, &mut schema)?;
        schema.table_count = schema.tables.len();
        debug!("Introspected {} visible tables", schema.table_count);
        Ok(schema)
    }

    fn placeholders(&self) -> String {
        vec!["?"; self.db.allowed_tables.len()].join(", ")
    }

    fn fetch_columns(
        &self,
        conn: &Connection,
        schema: &mut SchemaDescriptor,
    ) -> Result<(), duckdb::Error> {
        let sql = format!(
            "SELECT table_schema, table_name, column_name, data_type, is_nullable \
             FROM information_schema.columns \
             WHERE table_schema NOT IN ('pg_catalog', 'information_schema') \
               AND table_name IN ({}) \
             ORDER BY table_schema, table_name, ordinal_position",
            self.placeholders()
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(params_from_iter(self.db.allowed_tables.iter()), |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, String>(3)?,
                row.get::<_, String>(4)?,
            ))
        })?;
        for row in rows {
            let (table_schema, table_name, column_name, data_type, is_nullable) = row?;
            let key = format!("{}.{}", table_schema, table_name);
            let table = schema.tables.entry(key).or_default();
            table.columns.push(ColumnDescriptor {
                name: column_name,
                data_type,
                nullable: is_nullable == "YES",
            });
        }
        Ok(())
    }

    fn fetch_primary_keys(
        &self,
        conn: &Connection,
        schema: &mut SchemaDescriptor,
    ) -> Result<(), duckdb::Error> {
        let sql = format!(
            "SELECT tc.table_schema, tc.table_name, kcu.column_name \
             FROM information_schema.table_constraints tc \
             JOIN information_schema.key_column_usage kcu \
               ON tc.constraint_name = kcu.constraint_name \
              AND tc.table_schema = kcu.table_schema \
             WHERE tc.constraint_type = 'PRIMARY KEY' \
               AND tc.table_schema NOT IN ('pg_catalog', 'information_schema') \
               AND tc.table_name IN ({}) \
             ORDER BY tc.table_schema, tc.table_name, kcu.ordinal_position",
            self.placeholders()
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(params_from_iter(self.db.allowed_tables.iter()), |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
            ))
        })?;
        for row in rows {
            let (table_schema, table_name, column_name) = row?;
            let key = format!("{}.{}", table_schema, table_name);
            let table = schema.tables.entry(key).or_default();
            table.primary_key.push(column_name);
        }
        Ok(())
    }

    fn fetch_foreign_keys(
        &self,
        conn: &Connection,
        schema: &mut SchemaDescriptor,
    ) -> Result<(), duckdb::Error> {
        let sql = format!(
            "SELECT tc.table_schema, tc.table_name, kcu.column_name, \
                    ccu.table_schema, ccu.table_name, ccu.column_name \
             FROM information_schema.table_constraints tc \
             JOIN information_schema.key_column_usage kcu \
               ON tc.constraint_name = kcu.constraint_name \
              AND tc.table_schema = kcu.table_schema \
             JOIN information_schema.constraint_column_usage ccu \
               ON ccu.constraint_name = tc.constraint_name \
              AND ccu.table_schema = tc.table_schema \
             WHERE tc.constraint_type = 'FOREIGN KEY' \
               AND tc.table_schema NOT IN ('pg_catalog', 'information_schema') \
               AND tc.table_name IN ({}) \
             ORDER BY tc.table_schema, tc.table_name, kcu.ordinal_position",
            self.placeholders()
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(params_from_iter(self.db.allowed_tables.iter()), |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, String>(3)?,
                row.get::<_, String>(4)?,
                row.get::<_, String>(5)?,
            ))
        })?;
        for row in rows {
            let (table_schema, table_name, column_name, f_schema, f_table, f_column) = row?;
            let key = format!("{}.{}", table_schema, table_name);
            let table = schema.tables.entry(key).or_default();
            table.foreign_keys.push(ForeignKeyRef {
                column: column_name,
                references: format!("{}.{}({})", f_schema, f_table, f_column),
            });
        }
        Ok(())
    }
}

/// Renders a descriptor as the human-readable text handed to callers that
/// need to write their own SQL.
pub fn format_schema(schema: &SchemaDescriptor) -> String {
    let mut lines: Vec<String> = Vec::new();
    for (table_name, table) in &schema.tables {
        lines.push(format!("Table {}:", table_name));
        for column in &table.columns {
            let nullable = if column.nullable { "NULL" } else { "NOT NULL" };
            lines.push(format!(
                "  - {} ({}, {})",
                column.name, column.data_type, nullable
            ));
        }
        if !table.primary_key.is_empty() {
            lines.push(format!("  Primary key: {}", table.primary_key.join(", ")));
        }
        for fk in &table.foreign_keys {
            lines.push(format!("  Foreign key: {} -> {}", fk.column, fk.references));
        }
        lines.push(String::new());
    }
    lines.join("\n").trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_descriptor() -> SchemaDescriptor {
        let mut schema = SchemaDescriptor::default();
        schema.tables.insert(
            "main.chocolate_sales".to_string(),
            TableDescriptor {
                columns: vec![
                    ColumnDescriptor {
                        name: "id".to_string(),
                        data_type: "INTEGER".to_string(),
                        nullable: false,
                    },
                    ColumnDescriptor {
                        name: "amount".to_string(),
                        data_type: "DECIMAL(10,2)".to_string(),
                        nullable: true,
                    },
                ],
                primary_key: vec!["id".to_string()],
                foreign_keys: vec![ForeignKeyRef {
                    column: "region_id".to_string(),
                    references: "main.regions(id)".to_string(),
                }],
            },
        );
        schema.table_count = 1;
        schema
    }

    #[test]
    fn formats_tables_columns_and_constraints() {
        let text = format_schema(&sample_descriptor());
        let expected = [
            "Table main.chocolate_sales:",
            "  - id (INTEGER, NOT NULL)",
            "  - amount (DECIMAL(10,2), NULL)",
            "  Primary key: id",
            "  Foreign key: region_id -> main.regions(id)",
        ]
        .join("\n");
        assert_eq!(text, expected);
    }

    #[test]
    fn column_type_serializes_as_type() {
        let schema = sample_descriptor();
        let json = serde_json::to_value(&schema).unwrap();
        assert_eq!(
            json["tables"]["main.chocolate_sales"]["columns"][0]["type"],
            "INTEGER"
        );
    }

    #[test]
    fn resolve_table_requires_a_unique_suffix_match() {
        let mut schema = SchemaDescriptor::default();
        schema
            .tables
            .insert("main.car_sales".to_string(), TableDescriptor::default());
        schema
            .tables
            .insert("other.car_sales".to_string(), TableDescriptor::default());
        schema
            .tables
            .insert("main.chocolate_sales".to_string(), TableDescriptor::default());

        assert_eq!(
            schema.resolve_table("chocolate_sales"),
            Some("main.chocolate_sales".to_string())
        );
        // Two schemas expose car_sales, so the bare name stays ambiguous.
        assert_eq!(schema.resolve_table("car_sales"), None);
        assert_eq!(schema.resolve_table("walmart_grocery_sales"), None);
    }

    #[test]
    fn fetch_schema_only_sees_allow_listed_tables() {
        let dir = tempfile::tempdir().unwrap();
        let db_path = dir.path().join("introspect.db");
        let config = DatabaseConfig {
            path: db_path.to_string_lossy().to_string(),
            allowed_tables: vec!["chocolate_sales".to_string(), "car_sales".to_string()],
        };

        {
            let admin = crate::db::session::open_admin(&config).unwrap();
            admin
                .execute_batch(
                    "CREATE TABLE chocolate_sales (
                         id INTEGER PRIMARY KEY,
                         sales_person VARCHAR,
                         amount DECIMAL(10,2)
                     );
                     CREATE TABLE car_sales (id INTEGER, model VARCHAR);
                     CREATE TABLE internal_audit_log (id INTEGER, detail VARCHAR);",
                )
                .unwrap();
        }

        let introspector = SchemaIntrospector::new(config);
        let schema = introspector.fetch_schema().unwrap();

        assert_eq!(schema.table_count, 2);
        assert!(schema.tables.contains_key("main.chocolate_sales"));
        assert!(schema.tables.contains_key("main.car_sales"));
        assert!(!schema
            .tables
            .keys()
            .any(|key| key.contains("internal_audit_log")));

        let chocolate = &schema.tables["main.chocolate_sales"];
        let names: Vec<&str> = chocolate.columns.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["id", "sales_person", "amount"]);
        assert_eq!(chocolate.primary_key, vec!["id"]);

        let text = format_schema(&schema);
        assert!(text.starts_with("Table main.car_sales:"));
        assert!(text.contains("Table main.chocolate_sales:"));
    }
}
