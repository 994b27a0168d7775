//! DDL statements.
//!
//! Column types are carried as already-rendered type strings: the dialect
//! owns its type vocabulary, this module only owns the statement shape.

use std::fmt;

use crate::{ColumnName, Ident, QualifiedTable};

/// A DDL statement.
#[derive(Debug, Clone)]
pub enum DdlStmt {
    CreateSchema(CreateSchemaStmt),
    CreateTable(CreateTableStmt),
    AddColumn(AddColumnStmt),
    RenameColumn(RenameColumnStmt),
}

/// A column definition inside `CREATE TABLE`.
#[derive(Debug, Clone)]
pub struct ColumnDef {
    pub name: ColumnName,
    pub sql_type: String,
}

impl ColumnDef {
    pub fn new(name: ColumnName, sql_type: impl fmt::Display) -> Self {
        Self {
            name,
            sql_type: sql_type.to_string(),
        }
    }
}

/// `CREATE SCHEMA IF NOT EXISTS ns`
#[derive(Debug, Clone)]
pub struct CreateSchemaStmt {
    /// Namespace parts, outermost first; each is quoted separately.
    pub namespace: Vec<String>,
}

/// `CREATE TABLE t (c1 type, ..., PRIMARY KEY (k1, ...))`
#[derive(Debug, Clone)]
pub struct CreateTableStmt {
    pub table: QualifiedTable,
    pub columns: Vec<ColumnDef>,
    /// Omitted from the statement when empty.
    pub primary_key: Vec<ColumnName>,
}

/// `ALTER TABLE t ADD COLUMN c type`
#[derive(Debug, Clone)]
pub struct AddColumnStmt {
    pub table: QualifiedTable,
    pub column: ColumnDef,
}

/// `ALTER TABLE t RENAME COLUMN old TO new`
#[derive(Debug, Clone)]
pub struct RenameColumnStmt {
    pub table: QualifiedTable,
    pub from: ColumnName,
    pub to: ColumnName,
}

impl fmt::Display for ColumnDef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", Ident(self.name.as_str()), self.sql_type)
    }
}

impl fmt::Display for CreateSchemaStmt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CREATE SCHEMA IF NOT EXISTS ")?;
        for (i, part) in self.namespace.iter().enumerate() {
            if i > 0 {
                write!(f, ".")?;
            }
            write!(f, "{}", Ident(part))?;
        }
        Ok(())
    }
}

impl fmt::Display for CreateTableStmt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CREATE TABLE {} (", self.table)?;
        for (i, col) in self.columns.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{col}")?;
        }
        if !self.primary_key.is_empty() {
            if !self.columns.is_empty() {
                write!(f, ", ")?;
            }
            write!(f, "PRIMARY KEY (")?;
            for (i, key) in self.primary_key.iter().enumerate() {
                if i > 0 {
                    write!(f, ", ")?;
                }
                write!(f, "{}", Ident(key.as_str()))?;
            }
            write!(f, ")")?;
        }
        write!(f, ")")
    }
}

impl fmt::Display for AddColumnStmt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ALTER TABLE {} ADD COLUMN {}", self.table, self.column)
    }
}

impl fmt::Display for RenameColumnStmt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "ALTER TABLE {} RENAME COLUMN {} TO {}",
            self.table,
            Ident(self.from.as_str()),
            Ident(self.to.as_str())
        )
    }
}

impl fmt::Display for DdlStmt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DdlStmt::CreateSchema(stmt) => stmt.fmt(f),
            DdlStmt::CreateTable(stmt) => stmt.fmt(f),
            DdlStmt::AddColumn(stmt) => stmt.fmt(f),
            DdlStmt::RenameColumn(stmt) => stmt.fmt(f),
        }
    }
}
