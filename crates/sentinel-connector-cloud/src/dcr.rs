//! Data collection rule descriptor
//!
//! Stream declarations come verbatim from `assets/dcr-streams.json`. The
//! descriptor renders to a single ARM template containing one Direct-kind
//! rule, so no separate data collection endpoint is needed.

use crate::api::{Deployment, WorkspaceRef};
use crate::error::{CloudError, Result};
use crate::schema::{Column, TableSchema};
use serde_json::{Map, Value, json};

const DCR_STREAMS_JSON: &str = include_str!("../assets/dcr-streams.json");

pub const DCR_API_VERSION: &str = "2023-03-11";
const DEPLOYMENT_TEMPLATE_SCHEMA: &str =
    "https://schema.management.azure.com/schemas/2019-04-01/deploymentTemplate.json#";
const DESTINATION_NAME: &str = "sentinelWorkspace";
/// ARM deployment names are limited to 64 characters
const MAX_DEPLOYMENT_NAME: usize = 64;

/// Routing of one input stream into one table
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataFlow {
    pub stream: String,
    pub output_stream: String,
    pub transform_kql: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DcrDescriptor {
    pub name: String,
    pub location: String,
    pub workspace: WorkspaceRef,
    pub stream_declarations: Map<String, Value>,
    pub data_flows: Vec<DataFlow>,
}

/// Load the bundled stream declarations document
pub fn stream_declarations() -> Result<Map<String, Value>> {
    parse_stream_declarations(DCR_STREAMS_JSON)
}

fn parse_stream_declarations(content: &str) -> Result<Map<String, Value>> {
    match serde_json::from_str::<Value>(content)? {
        Value::Object(map) => {
            for (stream, declaration) in &map {
                if !stream.starts_with("Custom-") {
                    return Err(CloudError::InvalidTemplate(format!(
                        "stream '{}' must start with Custom-",
                        stream
                    )));
                }
                if !declaration.get("columns").is_some_and(Value::is_array) {
                    return Err(CloudError::InvalidTemplate(format!(
                        "stream '{}' has no columns array",
                        stream
                    )));
                }
            }
            Ok(map)
        }
        _ => Err(CloudError::InvalidTemplate(
            "stream declarations must be a JSON object".to_string(),
        )),
    }
}

/// A stream must declare exactly the table's columns, in the table's order
fn check_columns(stream: &str, declaration: &Value, table: &TableSchema) -> Result<()> {
    let columns: Vec<Column> = serde_json::from_value(declaration["columns"].clone())
        .map_err(|e| {
            CloudError::InvalidTemplate(format!("stream '{}' has unreadable columns: {}", stream, e))
        })?;
    if columns == table.columns {
        return Ok(());
    }

    let mismatch = columns
        .iter()
        .zip(&table.columns)
        .position(|(declared, expected)| declared != expected)
        .unwrap_or(columns.len().min(table.columns.len()));
    Err(CloudError::InvalidTemplate(format!(
        "stream '{}' does not match table {} at column {} ({} declared, {} in table)",
        stream,
        table.name,
        mismatch + 1,
        columns.len(),
        table.columns.len()
    )))
}

impl DcrDescriptor {
    /// Build a descriptor routing each table's stream into that table
    pub fn new(
        name: impl Into<String>,
        location: impl Into<String>,
        workspace: WorkspaceRef,
        tables: &[TableSchema],
    ) -> Result<Self> {
        Self::with_declarations(name, location, workspace, tables, stream_declarations()?)
    }

    pub fn with_declarations(
        name: impl Into<String>,
        location: impl Into<String>,
        workspace: WorkspaceRef,
        tables: &[TableSchema],
        stream_declarations: Map<String, Value>,
    ) -> Result<Self> {
        let data_flows = tables
            .iter()
            .map(|table| {
                let stream = table.stream_name();
                let declaration = stream_declarations.get(&stream).ok_or_else(|| {
                    CloudError::InvalidTemplate(format!(
                        "no stream declaration for '{}' (table {})",
                        stream, table.name
                    ))
                })?;
                check_columns(&stream, declaration, table)?;
                Ok(DataFlow {
                    stream,
                    output_stream: table.output_stream(),
                    transform_kql: "source".to_string(),
                })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            name: name.into(),
            location: location.into(),
            workspace,
            stream_declarations,
            data_flows,
        })
    }

    /// Stream names in data-flow order
    pub fn streams(&self) -> Vec<&str> {
        self.data_flows.iter().map(|f| f.stream.as_str()).collect()
    }

    /// Render the ARM deployment template
    pub fn to_template(&self) -> Value {
        let data_flows: Vec<Value> = self
            .data_flows
            .iter()
            .map(|flow| {
                json!({
                    "streams": [flow.stream],
                    "destinations": [DESTINATION_NAME],
                    "transformKql": flow.transform_kql,
                    "outputStream": flow.output_stream,
                })
            })
            .collect();

        json!({
            "$schema": DEPLOYMENT_TEMPLATE_SCHEMA,
            "contentVersion": "1.0.0.0",
            "resources": [{
                "type": "Microsoft.Insights/dataCollectionRules",
                "apiVersion": DCR_API_VERSION,
                "name": self.name,
                "location": self.location,
                "kind": "Direct",
                "properties": {
                    "streamDeclarations": self.stream_declarations,
                    "destinations": {
                        "logAnalytics": [{
                            "workspaceResourceId": self.workspace.resource_id,
                            "name": DESTINATION_NAME,
                        }]
                    },
                    "dataFlows": data_flows,
                }
            }],
            "outputs": {
                "immutableId": {
                    "type": "string",
                    "value": format!(
                        "[reference(resourceId('Microsoft.Insights/dataCollectionRules', '{}'), '{}').immutableId]",
                        self.name, DCR_API_VERSION
                    ),
                }
            }
        })
    }

    /// Deployment unit for `resource_group`. The name is stable across runs.
    pub fn deployment(&self, resource_group: impl Into<String>) -> Deployment {
        let mut name = format!("{}-deployment", self.name);
        if let Some((cut, _)) = name.char_indices().nth(MAX_DEPLOYMENT_NAME) {
            name.truncate(cut);
        }
        Deployment {
            name,
            resource_group: resource_group.into(),
            template: self.to_template(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{ACTIVITY_STREAM, THREAT_STREAM, builtin_tables};

    fn workspace() -> WorkspaceRef {
        WorkspaceRef::new(
            "/subscriptions/S/resourceGroups/RG/providers/Microsoft.OperationalInsights/workspaces/W",
        )
    }

    #[test]
    fn test_template_shape() {
        let tables = builtin_tables().unwrap();
        let dcr = DcrDescriptor::new("dcr-test", "usgovvirginia", workspace(), &tables).unwrap();
        let template = dcr.to_template();

        let resource = &template["resources"][0];
        assert_eq!(resource["kind"], "Direct");
        assert_eq!(resource["name"], "dcr-test");
        assert_eq!(resource["location"], "usgovvirginia");
        assert_eq!(
            resource["properties"]["destinations"]["logAnalytics"][0]["workspaceResourceId"],
            workspace().resource_id
        );

        let flows = resource["properties"]["dataFlows"].as_array().unwrap();
        assert_eq!(flows.len(), 2);
        assert_eq!(flows[0]["streams"][0], ACTIVITY_STREAM);
        assert_eq!(flows[0]["outputStream"], "Custom-ObsidianActivity_CL");
        assert_eq!(flows[1]["streams"][0], THREAT_STREAM);
    }

    #[test]
    fn test_stream_declarations_are_verbatim() {
        let tables = builtin_tables().unwrap();
        let dcr = DcrDescriptor::new("dcr", "usgovvirginia", workspace(), &tables).unwrap();
        let template = dcr.to_template();

        let expected: Value = serde_json::from_str(DCR_STREAMS_JSON).unwrap();
        assert_eq!(
            template["resources"][0]["properties"]["streamDeclarations"],
            expected
        );
    }

    #[test]
    fn test_missing_stream_declaration() {
        let tables = builtin_tables().unwrap();
        let mut declarations = stream_declarations().unwrap();
        declarations.remove(THREAT_STREAM);

        let result =
            DcrDescriptor::with_declarations("dcr", "usgovvirginia", workspace(), &tables, declarations);
        assert!(matches!(result, Err(CloudError::InvalidTemplate(_))));
    }

    #[test]
    fn test_rejects_bad_declarations() {
        assert!(parse_stream_declarations("[]").is_err());
        assert!(parse_stream_declarations(r#"{ "Activity": { "columns": [] } }"#).is_err());
        assert!(parse_stream_declarations(r#"{ "Custom-A": {} }"#).is_err());
    }

    #[test]
    fn test_deployment_name_is_stable_and_bounded() {
        let tables = builtin_tables().unwrap();
        let long_name = "d".repeat(80);
        let dcr = DcrDescriptor::new(long_name, "usgovvirginia", workspace(), &tables).unwrap();

        let first = dcr.deployment("RG");
        let second = dcr.deployment("RG");
        assert_eq!(first.name, second.name);
        assert_eq!(first.name.len(), 64);
        assert_eq!(first.resource_group, "RG");
    }

    #[test]
    fn test_deployment_name_cuts_on_character_boundary() {
        let tables = builtin_tables().unwrap();
        let name = format!("{}é-rule", "d".repeat(63));
        let dcr = DcrDescriptor::new(name, "usgovvirginia", workspace(), &tables).unwrap();

        let deployment = dcr.deployment("RG");
        assert_eq!(deployment.name.chars().count(), 64);
        assert!(deployment.name.ends_with('é'));

        let short = DcrDescriptor::new("dcr-é", "usgovvirginia", workspace(), &tables).unwrap();
        assert_eq!(short.deployment("RG").name, "dcr-é-deployment");
    }

    #[test]
    fn test_rejects_declaration_that_drifted_from_table() {
        let tables = builtin_tables().unwrap();
        let mut declarations = stream_declarations().unwrap();
        declarations.insert(
            THREAT_STREAM.to_string(),
            json!({ "columns": [
                { "name": "TimeGenerated", "type": "datetime" },
                { "name": "Bogus", "type": "string" }
            ] }),
        );

        let result =
            DcrDescriptor::with_declarations("dcr", "usgovvirginia", workspace(), &tables, declarations);
        match result {
            Err(CloudError::InvalidTemplate(message)) => {
                assert!(message.contains(THREAT_STREAM));
                assert!(message.contains("column 2"));
            }
            other => panic!("expected InvalidTemplate, got {:?}", other),
        }
    }

    #[test]
    fn test_rejects_declaration_with_changed_column_type() {
        let tables = builtin_tables().unwrap();
        let mut declarations = stream_declarations().unwrap();
        let mut columns: Vec<Column> = tables[0].columns.clone();
        columns[0].column_type = crate::schema::ColumnType::String;
        declarations.insert(ACTIVITY_STREAM.to_string(), json!({ "columns": columns }));

        let result =
            DcrDescriptor::with_declarations("dcr", "usgovvirginia", workspace(), &tables, declarations);
        assert!(matches!(result, Err(CloudError::InvalidTemplate(_))));
    }
}
