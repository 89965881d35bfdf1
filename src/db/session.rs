use duckdb::{AccessMode, Config, Connection};

use crate::config::DatabaseConfig;

/// Opens a fresh read-only session for one unit of work.
///
/// Every query path goes through here rather than a pool: each request is a
/// single read-only round trip, and the `AccessMode::ReadOnly` open is the
/// protocol-level line of defense beneath the lexical guard. DuckDB sessions
/// are autocommit, and the connection closes on drop on every exit path.
pub fn open_readonly(db: &DatabaseConfig) -> Result<Connection, duckdb::Error> {
    let config = Config::default().access_mode(AccessMode::ReadOnly)?;
    Connection::open_with_flags(&db.path, config)
}

/// Opens a writable session for admin paths (bulk loading). Never used by the
/// query or introspection code.
pub fn open_admin(db: &DatabaseConfig) -> Result<Connection, duckdb::Error> {
    Connection::open(&db.path)
}
