//! SQL identifiers and DDL rendering.
//!
//! Every identifier that ends up in a statement goes through [`Ident`], so
//! caller-controlled stream and property names are never interpolated raw.

use strid::braid;

mod ddl;
pub use ddl::*;


/// The name of a table.
#[braid]
pub struct TableName;

/// The name of a column.
#[braid]
pub struct ColumnName;

/// A quoted SQL identifier wrapper.
///
/// Display writes the value escaped and quoted with double quotes. Both
/// Postgres and Snowflake treat double-quoted identifiers as case-sensitive,
/// so the name reaches the catalog exactly as the naming strategy produced it.
///
/// # Example
/// ```
/// use sluice_sql::Ident;
/// assert_eq!(format!("{}", Ident("user")), "\"user\"");
/// assert_eq!(format!("{}", Ident("bla\"h")), "\"bla\"\"h\"");
/// ```
pub struct Ident<T: AsRef<str>>(pub T);

impl<T: AsRef<str>> std::fmt::Display for Ident<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "\"")?;
        for c in self.0.as_ref().chars() {
            if c == '"' {
                write!(f, "\"\"")?;
            } else {
                write!(f, "{}", c)?;
            }
        }
        write!(f, "\"")
    }
}

/// Quote an identifier.
///
/// Always quotes, which sidesteps reserved words like `user`, `order` or
/// `table` and doubles any embedded quotes.
pub fn quote_ident(name: &str) -> String {
    format!("{}", Ident(name))
}

/// A table name qualified by its namespace, rendered as `"namespace"."table"`.
///
/// The namespace may itself be dotted into several parts (Snowflake's
/// `database.schema`); each part is quoted separately.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QualifiedTable {
    /// Namespace parts, outermost first.
    pub namespace: Vec<String>,
    /// Table name inside the namespace.
    pub table: TableName,
}

impl QualifiedTable {
    pub fn new(namespace: impl IntoIterator<Item = impl Into<String>>, table: TableName) -> Self {
        Self {
            namespace: namespace.into_iter().map(Into::into).collect(),
            table,
        }
    }
}

impl std::fmt::Display for QualifiedTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for part in &self.namespace {
            write!(f, "{}.", Ident(part))?;
        }
        write!(f, "{}", Ident(self.table.as_str()))
    }
}
