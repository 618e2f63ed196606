//! Pulls the SQL statement out of raw model output.

use lazy_static::lazy_static;
use regex::Regex;

/// Tag word marking a fenced SQL block.
pub const SQL_TAG: &str = "sql";

lazy_static! {
    static ref FENCED_SQL_REGEX: Regex =
        Regex::new(r"(?s)```sql[ \t]*\r?\n(.*?)\r?\n[ \t]*```").unwrap();
}

/// Returns the interior of the first ```sql fenced block, trimmed.
///
/// Without a fence, falls back to removing every backtick and every literal `sql`
/// and trimming what is left. The fallback can produce malformed SQL; that text is
/// meant to fail at execution time, where the error feeds the repair prompt.
pub fn extract_sql(raw: &str) -> String {
    if let Some(captures) = FENCED_SQL_REGEX.captures(raw) {
        if let Some(body) = captures.get(1) {
            return body.as_str().trim().to_string();
        }
    }

    raw.replace('`', "").replace(SQL_TAG, "").trim().to_string()
}
