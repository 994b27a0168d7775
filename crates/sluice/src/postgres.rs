//! PostgreSQL backend.
//!
//! Tables live in one configured schema (`public` by default). Stream and
//! property names are used verbatim and always quoted, so case is kept.

use std::fmt;

use sluice_schema::{JsonType, PropertySchema, TableSchema};
use sluice_sql::{ColumnName, CreateSchemaStmt, DdlStmt, QualifiedTable, TableName};

use crate::config::PostgresConfig;
use crate::connection::{BoxError, Connection};
use crate::dialect::{DdlEmitter, Dialect, Introspector, NamingStrategy, TypeMapper};
use crate::plan::{Change, MigrationPlan, create_table_stmt};

/// Postgres column types, spelled the way `information_schema.columns`
/// reports them.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PgType {
    /// BIGINT (8 bytes)
    BigInt,
    /// NUMERIC (arbitrary precision)
    Numeric,
    /// BOOLEAN
    Boolean,
    /// CHARACTER VARYING, unbounded
    CharacterVarying,
    /// DATE
    Date,
    /// TIMESTAMP WITH TIME ZONE
    Timestamptz,
    /// JSONB, for objects and arrays
    Jsonb,
    /// Anything else found in the catalog, as reported.
    Other(String),
}

impl PgType {
    /// Canonicalize a catalog type name, folding short aliases.
    pub fn from_catalog(name: &str) -> Self {
        match name.trim().to_ascii_lowercase().as_str() {
            "bigint" | "int8" => PgType::BigInt,
            "numeric" | "decimal" => PgType::Numeric,
            "boolean" | "bool" => PgType::Boolean,
            "character varying" | "varchar" => PgType::CharacterVarying,
            "date" => PgType::Date,
            "timestamp with time zone" | "timestamptz" => PgType::Timestamptz,
            "jsonb" => PgType::Jsonb,
            _ => PgType::Other(name.to_string()),
        }
    }
}

impl fmt::Display for PgType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PgType::BigInt => write!(f, "bigint"),
            PgType::Numeric => write!(f, "numeric"),
            PgType::Boolean => write!(f, "boolean"),
            PgType::CharacterVarying => write!(f, "character varying"),
            PgType::Date => write!(f, "date"),
            PgType::Timestamptz => write!(f, "timestamp with time zone"),
            PgType::Jsonb => write!(f, "jsonb"),
            PgType::Other(name) => write!(f, "{}", name),
        }
    }
}

/// Map a normalized property schema to a Postgres column type.
///
/// Postgres has no untyped array, so arrays are stored as `jsonb` alongside
/// objects.
pub fn map_type(schema: &PropertySchema) -> PgType {
    if schema.has_type(&JsonType::Array) || schema.has_type(&JsonType::Object) {
        PgType::Jsonb
    } else if schema.has_type(&JsonType::String) && schema.has_format("date-time") {
        PgType::Timestamptz
    } else if schema.has_type(&JsonType::String) && schema.has_format("date") {
        PgType::Date
    } else if schema.has_type(&JsonType::String) {
        PgType::CharacterVarying
    } else if schema.has_type(&JsonType::Number) {
        PgType::Numeric
    } else if schema.has_type(&JsonType::Integer) {
        PgType::BigInt
    } else if schema.has_type(&JsonType::Boolean) {
        PgType::Boolean
    } else {
        PgType::CharacterVarying
    }
}

const COLUMNS_QUERY: &str = "SELECT column_name::text, data_type::text \
     FROM information_schema.columns \
     WHERE table_schema = $1::text AND table_name = $2::text \
     ORDER BY ordinal_position";

const TABLE_EXISTS_QUERY: &str = "SELECT table_name::text \
     FROM information_schema.tables \
     WHERE table_schema = $1::text AND table_name = $2::text";

/// A Postgres database reached through one session.
pub struct PostgresDialect<C> {
    conn: C,
    config: PostgresConfig,
}

impl<C: Connection> PostgresDialect<C> {
    pub fn new(conn: C, config: PostgresConfig) -> Self {
        Self { conn, config }
    }

    pub fn connection(&self) -> &C {
        &self.conn
    }

    pub fn schema(&self) -> &str {
        &self.config.schema
    }

    /// `"schema"."table"`
    pub fn qualified(&self, table: &TableName) -> QualifiedTable {
        QualifiedTable::new([self.config.schema.as_str()], table.clone())
    }

    /// `CREATE SCHEMA IF NOT EXISTS "schema"`
    pub fn create_schema_stmt(&self) -> CreateSchemaStmt {
        CreateSchemaStmt {
            namespace: vec![self.config.schema.clone()],
        }
    }

    /// The statements `plan` would run, for dry runs.
    pub fn statements(&self, plan: &MigrationPlan<PgType>) -> Vec<DdlStmt> {
        plan.changes
            .iter()
            .map(|change| change.to_stmt(self.qualified(&plan.table)))
            .collect()
    }

    async fn run(&self, stmt: DdlStmt) -> Result<(), BoxError> {
        self.conn.execute(&stmt.to_string()).await?;
        Ok(())
    }
}

impl<C: Connection> TypeMapper for PostgresDialect<C> {
    type ColumnType = PgType;

    fn map_type(&self, schema: &PropertySchema) -> PgType {
        map_type(schema)
    }
}

impl<C: Connection> Introspector for PostgresDialect<C> {
    async fn get_table(&self, table: &TableName) -> Result<Option<TableSchema<PgType>>, BoxError> {
        let rows = self
            .conn
            .query(COLUMNS_QUERY, &[self.config.schema.as_str(), table.as_str()])
            .await?;

        if rows.is_empty() {
            // `CREATE TABLE t ()` is legal, so no columns does not mean no table.
            let tables = self
                .conn
                .query(TABLE_EXISTS_QUERY, &[self.config.schema.as_str(), table.as_str()])
                .await?;
            return Ok((!tables.is_empty()).then(TableSchema::new));
        }

        let mut columns = TableSchema::new();
        for row in &rows {
            let (Some(name), Some(data_type)) = (row.get(0), row.get(1)) else {
                return Err(format!("malformed catalog row for table {table}: {row:?}").into());
            };
            columns.insert(ColumnName::from(name), PgType::from_catalog(data_type));
        }
        Ok(Some(columns))
    }
}

impl<C: Connection> DdlEmitter for PostgresDialect<C> {
    async fn ensure_namespace(&self) -> Result<(), BoxError> {
        self.run(DdlStmt::CreateSchema(self.create_schema_stmt())).await
    }

    async fn create_table(
        &self,
        table: &TableName,
        key_columns: &[ColumnName],
        columns: &TableSchema<PgType>,
    ) -> Result<(), BoxError> {
        let stmt = create_table_stmt(self.qualified(table), key_columns, columns);
        self.run(DdlStmt::CreateTable(stmt)).await
    }

    async fn add_column(
        &self,
        table: &TableName,
        column: &ColumnName,
        ty: &PgType,
    ) -> Result<(), BoxError> {
        let change = Change::AddColumn {
            name: column.clone(),
            ty: ty.clone(),
        };
        self.run(change.to_stmt(self.qualified(table))).await
    }

    async fn rename_column(
        &self,
        table: &TableName,
        from: &ColumnName,
        to: &ColumnName,
    ) -> Result<(), BoxError> {
        let change: Change<PgType> = Change::RenameColumn {
            from: from.clone(),
            to: to.clone(),
        };
        self.run(change.to_stmt(self.qualified(table))).await
    }
}

impl<C: Connection> NamingStrategy for PostgresDialect<C> {}

impl<C: Connection> Dialect for PostgresDialect<C> {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FakeConn;
    use serde_json::json;

    fn schema(value: serde_json::Value) -> PropertySchema {
        sluice_schema::normalize(&PropertySchema::from_value(&value).unwrap())
    }

    #[test]
    fn test_map_type_rules() {
        let cases = [
            (json!({ "type": ["null", "array"] }), PgType::Jsonb),
            (json!({ "type": "object" }), PgType::Jsonb),
            (
                json!({ "type": ["null", "string"], "format": "date-time" }),
                PgType::Timestamptz,
            ),
            (json!({ "type": "string", "format": "date" }), PgType::Date),
            (json!({ "type": "string", "format": "email" }), PgType::CharacterVarying),
            (json!({ "type": ["null", "number"] }), PgType::Numeric),
            (json!({ "type": "integer" }), PgType::BigInt),
            (json!({ "type": ["boolean", "null"] }), PgType::Boolean),
            (json!({ "type": "null" }), PgType::CharacterVarying),
            (json!({}), PgType::CharacterVarying),
        ];
        for (value, expected) in cases {
            assert_eq!(map_type(&schema(value.clone())), expected, "{value}");
        }
    }

    #[test]
    fn test_map_type_first_rule_wins() {
        // Array beats string; number beats integer.
        assert_eq!(map_type(&schema(json!({ "type": ["string", "array"] }))), PgType::Jsonb);
        assert_eq!(map_type(&schema(json!({ "type": ["integer", "number"] }))), PgType::Numeric);
        // A date format without a string type is not a date.
        assert_eq!(
            map_type(&schema(json!({ "type": "integer", "format": "date" }))),
            PgType::BigInt
        );
    }

    #[test]
    fn test_catalog_names_fold_to_long_forms() {
        assert_eq!(PgType::from_catalog("int8"), PgType::BigInt);
        assert_eq!(PgType::from_catalog("varchar"), PgType::CharacterVarying);
        assert_eq!(PgType::from_catalog("timestamptz"), PgType::Timestamptz);
        assert_eq!(PgType::from_catalog("bool"), PgType::Boolean);
        assert_eq!(PgType::from_catalog("DECIMAL"), PgType::Numeric);
        assert_eq!(
            PgType::from_catalog("timestamp with time zone"),
            PgType::Timestamptz
        );
        assert_eq!(
            PgType::from_catalog("text"),
            PgType::Other("text".to_string())
        );
        assert_ne!(PgType::from_catalog("text"), PgType::CharacterVarying);
    }

    #[tokio::test]
    async fn test_get_table_reads_catalog() {
        let conn = FakeConn::with_rows([
            [Some("id"), Some("bigint")],
            [Some("name"), Some("character varying")],
            [Some("created_at"), Some("timestamp with time zone")],
        ]);
        let dialect = PostgresDialect::new(&conn, PostgresConfig::default());

        let table = dialect.get_table(&"users".into()).await.unwrap().unwrap();
        let columns: Vec<(&str, &PgType)> = table.iter().map(|(c, t)| (c.as_str(), t)).collect();
        assert_eq!(
            columns,
            [
                ("id", &PgType::BigInt),
                ("name", &PgType::CharacterVarying),
                ("created_at", &PgType::Timestamptz),
            ]
        );

        let queries = conn.queries();
        assert_eq!(queries.len(), 1);
        assert_eq!(queries[0].1, ["public", "users"]);
        assert!(conn.executed().is_empty());
    }

    #[tokio::test]
    async fn test_get_table_absent() {
        let conn = FakeConn::default();
        let dialect = PostgresDialect::new(&conn, PostgresConfig::default());
        assert!(dialect.get_table(&"users".into()).await.unwrap().is_none());

        let queries = conn.queries();
        assert_eq!(queries.len(), 2);
        assert_eq!(queries[1].0, TABLE_EXISTS_QUERY);
        assert_eq!(queries[1].1, ["public", "users"]);
    }

    #[tokio::test]
    async fn test_get_table_without_columns_still_exists() {
        let conn = FakeConn::answering([vec![], vec![[Some("users")]]]);
        let dialect = PostgresDialect::new(&conn, PostgresConfig::default());

        let table = dialect.get_table(&"users".into()).await.unwrap().unwrap();
        assert!(table.is_empty());
    }

    #[tokio::test]
    async fn test_ensure_namespace() {
        let conn = FakeConn::default();
        let dialect = PostgresDialect::new(
            &conn,
            PostgresConfig {
                schema: "raw".to_string(),
            },
        );
        dialect.ensure_namespace().await.unwrap();

        insta::assert_snapshot!(conn.executed().join("\n"), @r#"CREATE SCHEMA IF NOT EXISTS "raw""#);
    }

    #[test]
    fn test_statements_for_plan() {
        let conn = FakeConn::default();
        let dialect = PostgresDialect::new(&conn, PostgresConfig::default());
        let plan = MigrationPlan {
            table: "users".into(),
            changes: vec![
                Change::RenameColumn {
                    from: "age".into(),
                    to: "age_20210920_0745".into(),
                },
                Change::AddColumn {
                    name: "age".into(),
                    ty: PgType::Numeric,
                },
            ],
            conflict: None,
        };
        let sql: Vec<String> = dialect
            .statements(&plan)
            .iter()
            .map(ToString::to_string)
            .collect();
        assert_eq!(
            sql,
            [
                r#"ALTER TABLE "public"."users" RENAME COLUMN "age" TO "age_20210920_0745""#,
                r#"ALTER TABLE "public"."users" ADD COLUMN "age" numeric"#,
            ]
        );
        assert!(conn.executed().is_empty());
    }

    #[tokio::test]
    async fn test_ddl_statements() {
        let conn = FakeConn::default();
        let dialect = PostgresDialect::new(
            &conn,
            PostgresConfig {
                schema: "raw".to_string(),
            },
        );

        let columns: TableSchema<PgType> = [
            (ColumnName::from("id"), PgType::BigInt),
            (ColumnName::from("name"), PgType::CharacterVarying),
            (ColumnName::from("payload"), PgType::Jsonb),
        ]
        .into_iter()
        .collect();
        dialect
            .create_table(&"users".into(), &[ColumnName::from("id")], &columns)
            .await
            .unwrap();
        dialect
            .add_column(&"users".into(), &"signed_up".into(), &PgType::Date)
            .await
            .unwrap();
        dialect
            .rename_column(&"users".into(), &"age".into(), &"age_20210920_0745".into())
            .await
            .unwrap();

        insta::assert_snapshot!(conn.executed().join("\n"), @r#"
        CREATE TABLE "raw"."users" ("id" bigint, "name" character varying, "payload" jsonb, PRIMARY KEY ("id"))
        ALTER TABLE "raw"."users" ADD COLUMN "signed_up" date
        ALTER TABLE "raw"."users" RENAME COLUMN "age" TO "age_20210920_0745"
        "#);
    }

    #[tokio::test]
    async fn test_hostile_names_are_quoted() {
        let conn = FakeConn::default();
        let dialect = PostgresDialect::new(&conn, PostgresConfig::default());
        dialect
            .add_column(&r#"us"ers"#.into(), &"drop table; --".into(), &PgType::Boolean)
            .await
            .unwrap();
        assert_eq!(
            conn.executed(),
            [r#"ALTER TABLE "public"."us""ers" ADD COLUMN "drop table; --" boolean"#]
        );
    }

    #[tokio::test]
    async fn test_connection_errors_propagate() {
        let conn = FakeConn::failing("connection reset");
        let dialect = PostgresDialect::new(&conn, PostgresConfig::default());
        let err = dialect.get_table(&"users".into()).await.unwrap_err();
        assert_eq!(err.to_string(), "connection reset");
    }
}
