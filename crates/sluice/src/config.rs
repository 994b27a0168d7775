//! Target configuration.
//!
//! The load stage hands the target a single JSON document. Only the keys the
//! schema synchronizer cares about are modelled here; the rest (staging,
//! file naming, batching) belong to other parts of the pipeline and are
//! ignored on deserialization.
//!
//! ```json
//! {
//!   "raise_on_column_conflicts": false,
//!   "snowflake": { "database": "ANALYTICS", "schema": "raw" }
//! }
//! ```

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// What to do when a live column's type differs from the desired one.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ConflictPolicy {
    /// Rename the live column to a timestamped name and add a fresh one.
    #[default]
    Versioning,
    /// Stop with [`Error::MigrationConflict`].
    Strict,
}

/// Synchronizer settings shared by all dialects.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// Fail on type conflicts instead of versioning the column.
    pub raise_on_column_conflicts: bool,
}

impl SyncConfig {
    pub fn conflict_policy(&self) -> ConflictPolicy {
        if self.raise_on_column_conflicts {
            ConflictPolicy::Strict
        } else {
            ConflictPolicy::Versioning
        }
    }
}

/// Where Postgres tables live.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PostgresConfig {
    /// Defaults to `public`.
    pub schema: String,
}

impl Default for PostgresConfig {
    fn default() -> Self {
        Self {
            schema: "public".to_string(),
        }
    }
}

/// Where Snowflake tables live.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnowflakeConfig {
    pub database: String,

    /// Uppercased by the dialect. Defaults to `PUBLIC`.
    #[serde(default = "default_snowflake_schema")]
    pub schema: String,
}

fn default_snowflake_schema() -> String {
    "PUBLIC".to_string()
}

/// The whole target configuration document.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetConfig {
    #[serde(flatten)]
    pub sync: SyncConfig,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub postgres: Option<PostgresConfig>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub snowflake: Option<SnowflakeConfig>,
}

impl TargetConfig {
    pub fn from_json_str(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| Error::Config(e.to_string()))
    }

    pub fn from_json_value(value: serde_json::Value) -> Result<Self> {
        serde_json::from_value(value).map_err(|e| Error::Config(e.to_string()))
    }
}
