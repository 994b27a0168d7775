//! Table diffing: compare a desired table shape against the live one.
//!
//! The diff only ever grows a table. Columns present live but absent from the
//! desired schema are left alone, and a column whose type changed is either
//! versioned out of the way or reported as a conflict, depending on the
//! [`ConflictPolicy`].
//!
//! ```text
//! USERS:
//!   + EMAIL: TEXT
//!   ~ rename AGE -> AGE_20210920_0745
//!   + AGE: FLOAT
//! ```

use std::fmt;

use sluice_schema::TableSchema;
use sluice_sql::{
    AddColumnStmt, ColumnDef, ColumnName, CreateTableStmt, DdlStmt, QualifiedTable,
    RenameColumnStmt, TableName,
};

use crate::clock::{Clock, versioned_column_name};
use crate::config::ConflictPolicy;

/// A single schema change.
#[derive(Debug, Clone, PartialEq)]
pub enum Change<T> {
    /// Create the table with every desired column.
    CreateTable {
        key_columns: Vec<ColumnName>,
        columns: TableSchema<T>,
    },
    /// Add a new column.
    AddColumn { name: ColumnName, ty: T },
    /// Rename an existing column.
    RenameColumn { from: ColumnName, to: ColumnName },
}

impl<T: fmt::Display> Change<T> {
    /// Render this change as a statement against `table`.
    pub fn to_stmt(&self, table: QualifiedTable) -> DdlStmt {
        match self {
            Change::CreateTable {
                key_columns,
                columns,
            } => DdlStmt::CreateTable(create_table_stmt(table, key_columns, columns)),
            Change::AddColumn { name, ty } => DdlStmt::AddColumn(AddColumnStmt {
                table,
                column: ColumnDef::new(name.clone(), ty),
            }),
            Change::RenameColumn { from, to } => DdlStmt::RenameColumn(RenameColumnStmt {
                table,
                from: from.clone(),
                to: to.clone(),
            }),
        }
    }
}

impl<T: fmt::Display> fmt::Display for Change<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Change::CreateTable { columns, .. } => {
                write!(f, "+ table ({} columns)", columns.len())
            }
            Change::AddColumn { name, ty } => write!(f, "+ {}: {}", name, ty),
            Change::RenameColumn { from, to } => write!(f, "~ rename {} -> {}", from, to),
        }
    }
}

pub(crate) fn create_table_stmt<T: fmt::Display>(
    table: QualifiedTable,
    key_columns: &[ColumnName],
    columns: &TableSchema<T>,
) -> CreateTableStmt {
    CreateTableStmt {
        table,
        columns: columns
            .iter()
            .map(|(name, ty)| ColumnDef::new(name.clone(), ty))
            .collect(),
        primary_key: key_columns.to_vec(),
    }
}

/// A column whose live type differs from the desired one, left unresolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnConflict<T> {
    pub column: ColumnName,
    pub from: T,
    pub to: T,
}

/// The changes needed to bring one table up to date, in application order.
#[derive(Debug, Clone, PartialEq)]
pub struct MigrationPlan<T> {
    pub table: TableName,
    pub changes: Vec<Change<T>>,
    /// Set under [`ConflictPolicy::Strict`]; nothing after the conflicting
    /// column was planned.
    pub conflict: Option<ColumnConflict<T>>,
}

impl<T> MigrationPlan<T> {
    /// True if the table is already up to date.
    pub fn is_empty(&self) -> bool {
        self.changes.is_empty() && self.conflict.is_none()
    }

    /// True if the plan creates the table.
    pub fn creates_table(&self) -> bool {
        matches!(self.changes.first(), Some(Change::CreateTable { .. }))
    }
}

impl<T: fmt::Display> fmt::Display for MigrationPlan<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:", self.table)?;
        if self.is_empty() {
            return write!(f, "\n  (up to date)");
        }
        for change in &self.changes {
            write!(f, "\n  {}", change)?;
        }
        if let Some(conflict) = &self.conflict {
            write!(
                f,
                "\n  ! {}: {} -> {} (conflict)",
                conflict.column, conflict.from, conflict.to
            )?;
        }
        Ok(())
    }
}

/// Compute the changes that bring `live` up to `desired`.
///
/// `live == None` means the table does not exist yet. Desired columns are
/// visited in order; each column yields at most a rename and an add.
pub fn diff_table<T: Clone + PartialEq>(
    table: TableName,
    key_columns: &[ColumnName],
    desired: &TableSchema<T>,
    live: Option<&TableSchema<T>>,
    policy: ConflictPolicy,
    clock: &dyn Clock,
) -> MigrationPlan<T> {
    let mut plan = MigrationPlan {
        table,
        changes: Vec::new(),
        conflict: None,
    };

    let Some(live) = live else {
        plan.changes.push(Change::CreateTable {
            key_columns: key_columns.to_vec(),
            columns: desired.clone(),
        });
        return plan;
    };

    for (name, ty) in desired {
        match live.get(name) {
            None => plan.changes.push(Change::AddColumn {
                name: name.clone(),
                ty: ty.clone(),
            }),
            Some(live_ty) if live_ty == ty => {}
            Some(live_ty) => match policy {
                ConflictPolicy::Strict => {
                    plan.conflict = Some(ColumnConflict {
                        column: name.clone(),
                        from: live_ty.clone(),
                        to: ty.clone(),
                    });
                    break;
                }
                ConflictPolicy::Versioning => {
                    let versioned = ColumnName::from(versioned_column_name(name.as_str(), clock));
                    plan.changes.push(Change::RenameColumn {
                        from: name.clone(),
                        to: versioned,
                    });
                    plan.changes.push(Change::AddColumn {
                        name: name.clone(),
                        ty: ty.clone(),
                    });
                }
            },
        }
    }

    plan
}
