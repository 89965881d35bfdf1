pub mod executor;
pub mod guard;
pub mod intent;

use std::error::Error;
use std::fmt;

/// Failures inside the query core. Guard rejections and untranslatable
/// questions are not errors here — they come back as structured results.
#[derive(Debug)]
pub enum QueryError {
    DatabaseError(duckdb::Error),
}

impl fmt::Display for QueryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QueryError::DatabaseError(err) => write!(f, "Database error: {}", err),
        }
    }
}

impl Error for QueryError {}

impl From<duckdb::Error> for QueryError {
    fn from(err: duckdb::Error) -> Self {
        QueryError::DatabaseError(err)
    }
}
