//! Quoting helpers for the catalog queries sent through psql.

/// Wraps `name` in double quotes, doubling embedded ones.
pub fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// Single-quoted string literal with embedded quotes doubled.
pub fn quote_literal(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}

/// Literal `LIKE` pattern matching every name starting with `prefix`.
pub fn like_prefix(prefix: &str) -> String {
    let escaped = prefix
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_");
    quote_literal(&format!("{escaped}%"))
}
