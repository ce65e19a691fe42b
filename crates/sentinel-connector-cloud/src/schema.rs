//! Custom Log Analytics table schemas
//!
//! The two schemas are fixed. They ship as declarative documents under
//! `assets/` and are compiled into the binary.

use crate::error::{CloudError, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

const ACTIVITY_TABLE_JSON: &str = include_str!("../assets/activity-table.json");
const THREAT_TABLE_JSON: &str = include_str!("../assets/threat-table.json");

pub const ACTIVITY_TABLE: &str = "ObsidianActivity_CL";
pub const THREAT_TABLE: &str = "ObsidianThreat_CL";
pub const ACTIVITY_STREAM: &str = "Custom-ObsidianActivity";
pub const THREAT_STREAM: &str = "Custom-ObsidianThreat";

/// Interactive retention (and total retention) for both tables
pub const RETENTION_DAYS: u32 = 90;

/// Log Analytics column types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColumnType {
    String,
    Datetime,
    Int,
    Long,
    Real,
    Boolean,
    Dynamic,
    Guid,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Column {
    pub name: String,
    #[serde(rename = "type")]
    pub column_type: ColumnType,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableSchema {
    pub name: String,
    pub columns: Vec<Column>,
}

impl TableSchema {
    /// Parse and validate a schema document
    pub fn from_json(content: &str) -> Result<Self> {
        let schema: TableSchema = serde_json::from_str(content)?;
        schema.validate()?;
        Ok(schema)
    }

    fn validate(&self) -> Result<()> {
        if !self.name.ends_with("_CL") || self.name.len() <= 3 {
            return Err(CloudError::InvalidTemplate(format!(
                "custom table name '{}' must end with _CL",
                self.name
            )));
        }

        let time_generated = self.columns.iter().find(|c| c.name == "TimeGenerated");
        if time_generated.map(|c| c.column_type) != Some(ColumnType::Datetime) {
            return Err(CloudError::InvalidTemplate(format!(
                "table '{}' needs a TimeGenerated datetime column",
                self.name
            )));
        }

        let mut seen = HashSet::new();
        for column in &self.columns {
            if !seen.insert(column.name.to_ascii_lowercase()) {
                return Err(CloudError::InvalidTemplate(format!(
                    "table '{}' declares column '{}' twice",
                    self.name, column.name
                )));
            }
        }
        Ok(())
    }

    /// Name of the DCR input stream feeding this table
    pub fn stream_name(&self) -> String {
        format!("Custom-{}", self.name.trim_end_matches("_CL"))
    }

    /// Name of the DCR output stream writing into this table
    pub fn output_stream(&self) -> String {
        format!("Custom-{}", self.name)
    }
}

pub fn activity_table() -> Result<TableSchema> {
    TableSchema::from_json(ACTIVITY_TABLE_JSON)
}

pub fn threat_table() -> Result<TableSchema> {
    TableSchema::from_json(THREAT_TABLE_JSON)
}

/// Both schemas in provisioning order (activity, threat)
pub fn builtin_tables() -> Result<Vec<TableSchema>> {
    Ok(vec![activity_table()?, threat_table()?])
}

/// Log Analytics table plan
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TablePlan {
    Analytics,
}

impl std::fmt::Display for TablePlan {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TablePlan::Analytics => write!(f, "Analytics"),
        }
    }
}

/// Everything a table create request carries
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableDefinition {
    pub schema: TableSchema,
    pub retention_in_days: u32,
    pub total_retention_in_days: u32,
    pub plan: TablePlan,
}

impl TableDefinition {
    /// Analytics-tier table with the standard retention
    pub fn analytics(schema: TableSchema) -> Self {
        Self {
            schema,
            retention_in_days: RETENTION_DAYS,
            total_retention_in_days: RETENTION_DAYS,
            plan: TablePlan::Analytics,
        }
    }
}
