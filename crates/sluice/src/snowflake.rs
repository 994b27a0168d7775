//! Snowflake backend.
//!
//! Table and column names are uppercased, matching how Snowflake folds
//! unquoted identifiers, so loaded tables can be queried without quotes.
//! The session is supplied by the caller through [`Connection`]; queries use
//! `?` placeholders.

use std::fmt;

use serde::Deserialize;
use sluice_schema::{JsonType, PropertySchema, TableSchema};
use sluice_sql::{ColumnName, CreateSchemaStmt, DdlStmt, QualifiedTable, TableName, quote_ident};

use crate::config::SnowflakeConfig;
use crate::connection::{BoxError, Connection};
use crate::dialect::{DdlEmitter, Dialect, Introspector, NamingStrategy, TypeMapper};
use crate::plan::{Change, MigrationPlan, create_table_stmt};

/// Snowflake column types, spelled the way they are written in DDL.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum SnowflakeType {
    Array,
    Variant,
    TimestampTz,
    Date,
    /// VARCHAR(16777216)
    Text,
    Float,
    /// NUMBER(38, 0)
    Number,
    Boolean,
    /// Anything else found in the catalog, as reported.
    Other(String),
}

impl SnowflakeType {
    /// Canonicalize the `type` tag of a `SHOW COLUMNS` data type.
    pub fn from_catalog(tag: &str) -> Self {
        match tag.trim().to_ascii_uppercase().as_str() {
            "ARRAY" => SnowflakeType::Array,
            "VARIANT" => SnowflakeType::Variant,
            "TIMESTAMP_TZ" | "TIMESTAMPTZ" => SnowflakeType::TimestampTz,
            "DATE" => SnowflakeType::Date,
            "TEXT" | "VARCHAR" | "STRING" => SnowflakeType::Text,
            "FLOAT" | "REAL" | "DOUBLE" => SnowflakeType::Float,
            "NUMBER" | "FIXED" => SnowflakeType::Number,
            "BOOLEAN" => SnowflakeType::Boolean,
            _ => SnowflakeType::Other(tag.to_string()),
        }
    }
}

impl fmt::Display for SnowflakeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SnowflakeType::Array => write!(f, "ARRAY"),
            SnowflakeType::Variant => write!(f, "VARIANT"),
            SnowflakeType::TimestampTz => write!(f, "TIMESTAMP_TZ"),
            SnowflakeType::Date => write!(f, "DATE"),
            SnowflakeType::Text => write!(f, "TEXT"),
            SnowflakeType::Float => write!(f, "FLOAT"),
            SnowflakeType::Number => write!(f, "NUMBER"),
            SnowflakeType::Boolean => write!(f, "BOOLEAN"),
            SnowflakeType::Other(tag) => write!(f, "{}", tag),
        }
    }
}

/// Map a normalized property schema to a Snowflake column type.
pub fn map_type(schema: &PropertySchema) -> SnowflakeType {
    if schema.has_type(&JsonType::Array) {
        SnowflakeType::Array
    } else if schema.has_type(&JsonType::Object) {
        SnowflakeType::Variant
    } else if schema.has_type(&JsonType::String) && schema.has_format("date-time") {
        SnowflakeType::TimestampTz
    } else if schema.has_type(&JsonType::String) && schema.has_format("date") {
        SnowflakeType::Date
    } else if schema.has_type(&JsonType::String) {
        SnowflakeType::Text
    } else if schema.has_type(&JsonType::Number) {
        SnowflakeType::Float
    } else if schema.has_type(&JsonType::Integer) {
        SnowflakeType::Number
    } else if schema.has_type(&JsonType::Boolean) {
        SnowflakeType::Boolean
    } else {
        SnowflakeType::Text
    }
}

/// The JSON document `SHOW COLUMNS` puts in its `data_type` column.
#[derive(Debug, Deserialize)]
struct DataType {
    #[serde(rename = "type")]
    tag: String,
}

const RESULT_SCAN_QUERY: &str = r#"SELECT "column_name", "data_type" FROM TABLE(RESULT_SCAN(LAST_QUERY_ID())) WHERE "table_name" = ?"#;

/// A Snowflake database reached through one session.
pub struct SnowflakeDialect<C> {
    conn: C,
    database: String,
    schema: String,
}

impl<C: Connection> SnowflakeDialect<C> {
    /// The configured schema is uppercased; the database is used as given.
    pub fn new(conn: C, config: SnowflakeConfig) -> Self {
        Self {
            conn,
            database: config.database,
            schema: config.schema.to_uppercase(),
        }
    }

    pub fn connection(&self) -> &C {
        &self.conn
    }

    pub fn database(&self) -> &str {
        &self.database
    }

    pub fn schema(&self) -> &str {
        &self.schema
    }

    /// `"database"."schema"."table"`
    pub fn qualified(&self, table: &TableName) -> QualifiedTable {
        QualifiedTable::new(
            [self.database.as_str(), self.schema.as_str()],
            table.clone(),
        )
    }

    /// `CREATE SCHEMA IF NOT EXISTS "database"."schema"`
    pub fn create_schema_stmt(&self) -> CreateSchemaStmt {
        CreateSchemaStmt {
            namespace: vec![self.database.clone(), self.schema.clone()],
        }
    }

    /// The statements `plan` would run, for dry runs.
    pub fn statements(&self, plan: &MigrationPlan<SnowflakeType>) -> Vec<DdlStmt> {
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

impl<C: Connection> TypeMapper for SnowflakeDialect<C> {
    type ColumnType = SnowflakeType;

    fn map_type(&self, schema: &PropertySchema) -> SnowflakeType {
        map_type(schema)
    }
}

impl<C: Connection> Introspector for SnowflakeDialect<C> {
    async fn get_table(
        &self,
        table: &TableName,
    ) -> Result<Option<TableSchema<SnowflakeType>>, BoxError> {
        // RESULT_SCAN reads the previous statement of this session, so the
        // two must run back to back on the same connection.
        let show = format!(
            "SHOW COLUMNS IN SCHEMA {}.{}",
            quote_ident(&self.database),
            quote_ident(&self.schema)
        );
        self.conn.execute(&show).await?;
        let rows = self
            .conn
            .query(RESULT_SCAN_QUERY, &[table.as_str()])
            .await?;

        if rows.is_empty() {
            return Ok(None);
        }

        let mut columns = TableSchema::new();
        for row in &rows {
            let (Some(name), Some(data_type)) = (row.get(0), row.get(1)) else {
                return Err(format!("malformed catalog row for table {table}: {row:?}").into());
            };
            let data_type: DataType = serde_json::from_str(data_type)?;
            columns.insert(
                ColumnName::from(name),
                SnowflakeType::from_catalog(&data_type.tag),
            );
        }
        Ok(Some(columns))
    }
}

impl<C: Connection> DdlEmitter for SnowflakeDialect<C> {
    async fn ensure_namespace(&self) -> Result<(), BoxError> {
        self.run(DdlStmt::CreateSchema(self.create_schema_stmt())).await
    }

    async fn create_table(
        &self,
        table: &TableName,
        key_columns: &[ColumnName],
        columns: &TableSchema<SnowflakeType>,
    ) -> Result<(), BoxError> {
        let stmt = create_table_stmt(self.qualified(table), key_columns, columns);
        self.run(DdlStmt::CreateTable(stmt)).await
    }

    async fn add_column(
        &self,
        table: &TableName,
        column: &ColumnName,
        ty: &SnowflakeType,
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
        let change: Change<SnowflakeType> = Change::RenameColumn {
            from: from.clone(),
            to: to.clone(),
        };
        self.run(change.to_stmt(self.qualified(table))).await
    }
}

impl<C: Connection> NamingStrategy for SnowflakeDialect<C> {
    fn table_name(&self, stream_name: &str) -> TableName {
        TableName::from(stream_name.to_uppercase())
    }

    fn column_name(&self, property_name: &str) -> ColumnName {
        ColumnName::from(property_name.to_uppercase())
    }
}

impl<C: Connection> Dialect for SnowflakeDialect<C> {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FakeConn;
    use serde_json::json;

    fn schema(value: serde_json::Value) -> PropertySchema {
        sluice_schema::normalize(&PropertySchema::from_value(&value).unwrap())
    }

    fn config() -> SnowflakeConfig {
        SnowflakeConfig {
            database: "ANALYTICS".to_string(),
            schema: "raw".to_string(),
        }
    }

    #[test]
    fn test_map_type_rules() {
        let cases = [
            (json!({ "type": ["null", "array"], "items": { "type": "string" } }), SnowflakeType::Array),
            (json!({ "type": ["object", "null"] }), SnowflakeType::Variant),
            (
                json!({ "type": ["null", "string"], "format": "date-time" }),
                SnowflakeType::TimestampTz,
            ),
            (json!({ "type": "string", "format": "date" }), SnowflakeType::Date),
            (json!({ "type": ["null", "string"] }), SnowflakeType::Text),
            (json!({ "type": "number" }), SnowflakeType::Float),
            (json!({ "type": ["null", "integer"] }), SnowflakeType::Number),
            (json!({ "type": "boolean" }), SnowflakeType::Boolean),
            (json!({ "type": ["null", "any"] }), SnowflakeType::Text),
            (json!({ "anyOf": [{ "type": "integer" }] }), SnowflakeType::Text),
        ];
        for (value, expected) in cases {
            assert_eq!(map_type(&schema(value.clone())), expected, "{value}");
        }
    }

    #[test]
    fn test_map_type_first_rule_wins() {
        assert_eq!(
            map_type(&schema(json!({ "type": ["object", "array"] }))),
            SnowflakeType::Array
        );
        assert_eq!(
            map_type(&schema(json!({ "type": ["string", "integer"] }))),
            SnowflakeType::Text
        );
    }

    #[test]
    fn test_catalog_tags_fold_to_ddl_names() {
        assert_eq!(SnowflakeType::from_catalog("FIXED"), SnowflakeType::Number);
        assert_eq!(SnowflakeType::from_catalog("REAL"), SnowflakeType::Float);
        assert_eq!(SnowflakeType::from_catalog("VARCHAR"), SnowflakeType::Text);
        assert_eq!(SnowflakeType::from_catalog("STRING"), SnowflakeType::Text);
        assert_eq!(
            SnowflakeType::from_catalog("TIMESTAMPTZ"),
            SnowflakeType::TimestampTz
        );
        assert_eq!(
            SnowflakeType::from_catalog("TIMESTAMP_NTZ"),
            SnowflakeType::Other("TIMESTAMP_NTZ".to_string())
        );
        assert_ne!(
            SnowflakeType::from_catalog("TIMESTAMP_NTZ"),
            SnowflakeType::TimestampTz
        );
    }

    #[test]
    fn test_names_are_uppercased() {
        let conn = FakeConn::default();
        let dialect = SnowflakeDialect::new(&conn, config());
        assert_eq!(dialect.table_name("users"), TableName::from("USERS"));
        assert_eq!(dialect.column_name("signedUp"), ColumnName::from("SIGNEDUP"));
        assert_eq!(dialect.schema(), "RAW");
    }

    #[tokio::test]
    async fn test_get_table_reads_show_columns() {
        let conn = FakeConn::with_rows([
            [
                Some("ID"),
                Some(r#"{"type":"FIXED","precision":38,"scale":0,"nullable":false}"#),
            ],
            [
                Some("NAME"),
                Some(r#"{"type":"TEXT","length":16777216,"byteLength":16777216,"nullable":true,"fixed":false}"#),
            ],
            [Some("AGE"), Some(r#"{"type":"REAL","nullable":true}"#)],
        ]);
        let dialect = SnowflakeDialect::new(&conn, config());

        let table = dialect.get_table(&"USERS".into()).await.unwrap().unwrap();
        let columns: Vec<(&str, &SnowflakeType)> =
            table.iter().map(|(c, t)| (c.as_str(), t)).collect();
        assert_eq!(
            columns,
            [
                ("ID", &SnowflakeType::Number),
                ("NAME", &SnowflakeType::Text),
                ("AGE", &SnowflakeType::Float),
            ]
        );

        assert_eq!(conn.executed(), [r#"SHOW COLUMNS IN SCHEMA "ANALYTICS"."RAW""#]);
        let queries = conn.queries();
        assert_eq!(queries.len(), 1);
        assert_eq!(queries[0].0, RESULT_SCAN_QUERY);
        assert_eq!(queries[0].1, ["USERS"]);
    }

    #[tokio::test]
    async fn test_get_table_absent() {
        let conn = FakeConn::default();
        let dialect = SnowflakeDialect::new(&conn, config());
        assert!(dialect.get_table(&"USERS".into()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_get_table_rejects_unparseable_data_type() {
        let conn = FakeConn::with_rows([[Some("ID"), Some("not json")]]);
        let dialect = SnowflakeDialect::new(&conn, config());
        assert!(dialect.get_table(&"USERS".into()).await.is_err());
    }

    #[tokio::test]
    async fn test_ddl_statements() {
        let conn = FakeConn::default();
        let dialect = SnowflakeDialect::new(&conn, config());

        let columns: TableSchema<SnowflakeType> = [
            (ColumnName::from("ID"), SnowflakeType::Number),
            (ColumnName::from("NAME"), SnowflakeType::Text),
            (ColumnName::from("TAGS"), SnowflakeType::Array),
        ]
        .into_iter()
        .collect();
        dialect
            .create_table(&"USERS".into(), &[ColumnName::from("ID")], &columns)
            .await
            .unwrap();
        dialect
            .add_column(&"USERS".into(), &"EMAIL".into(), &SnowflakeType::Text)
            .await
            .unwrap();
        dialect
            .rename_column(&"USERS".into(), &"AGE".into(), &"AGE_20210920_0745".into())
            .await
            .unwrap();

        insta::assert_snapshot!(conn.executed().join("\n"), @r#"
        CREATE TABLE "ANALYTICS"."RAW"."USERS" ("ID" NUMBER, "NAME" TEXT, "TAGS" ARRAY, PRIMARY KEY ("ID"))
        ALTER TABLE "ANALYTICS"."RAW"."USERS" ADD COLUMN "EMAIL" TEXT
        ALTER TABLE "ANALYTICS"."RAW"."USERS" RENAME COLUMN "AGE" TO "AGE_20210920_0745"
        "#);
    }

    #[tokio::test]
    async fn test_ensure_namespace() {
        let conn = FakeConn::default();
        let dialect = SnowflakeDialect::new(&conn, config());
        dialect.ensure_namespace().await.unwrap();

        insta::assert_snapshot!(
            conn.executed().join("\n"),
            @r#"CREATE SCHEMA IF NOT EXISTS "ANALYTICS"."RAW""#
        );
    }

    #[test]
    fn test_statements_for_plan() {
        let conn = FakeConn::default();
        let dialect = SnowflakeDialect::new(&conn, config());
        let plan = MigrationPlan {
            table: "USERS".into(),
            changes: vec![
                Change::RenameColumn {
                    from: "AGE".into(),
                    to: "AGE_20210920_0745".into(),
                },
                Change::AddColumn {
                    name: "AGE".into(),
                    ty: SnowflakeType::Float,
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
                r#"ALTER TABLE "ANALYTICS"."RAW"."USERS" RENAME COLUMN "AGE" TO "AGE_20210920_0745""#,
                r#"ALTER TABLE "ANALYTICS"."RAW"."USERS" ADD COLUMN "AGE" FLOAT"#,
            ]
        );
    }
}
