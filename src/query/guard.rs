//! Lexical read-only gate.
//!
//! This is a textual classifier, not a SQL parser. It normalizes the
//! statement and accepts only `SELECT`/`WITH` prefixes with no mutating
//! keyword appearing as a standalone token. Known blind spots, accepted as
//! a documented risk for the single-statement trusted-schema context: it
//! false-positives on forbidden words inside string literals, comments, or
//! identifiers, and it cannot see through obfuscation such as comments
//! splitting a keyword. The read-only database session underneath is the
//! second line of defense.

/// Keywords rejected when they appear as a space-delimited token anywhere
/// in the normalized statement.
const FORBIDDEN_KEYWORDS: [&str; 11] = [
    "insert", "update", "delete", "drop", "alter", "create", "truncate", "grant", "revoke",
    "commit", "rollback",
];

/// Returns true when `sql` is lexically classified as non-mutating.
pub fn is_readonly_sql(sql: &str) -> bool {
    // Collapse whitespace runs, strip a single trailing semicolon, lowercase.
    let collapsed = sql.split_whitespace().collect::<Vec<_>>().join(" ");
    let normalized = collapsed
        .strip_suffix(';')
        .unwrap_or(&collapsed)
        .trim()
        .to_lowercase();

    if normalized.is_empty() {
        return false;
    }
    if !normalized.starts_with("select ") && !normalized.starts_with("with ") {
        return false;
    }

    let padded = format!(" {} ", normalized);
    !FORBIDDEN_KEYWORDS
        .iter()
        .any(|keyword| padded.contains(&format!(" {} ", keyword)))
}
