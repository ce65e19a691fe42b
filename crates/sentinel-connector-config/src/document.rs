//! On-disk configuration document
//!
//! The canonical layout groups settings into sections:
//!
//! ```json
//! {
//!   "Azure": {
//!     "TenantId": "...",
//!     "SubscriptionId": "...",
//!     "ResourceGroupName": "rg-sentinel",
//!     "Location": "usgovvirginia"
//!   },
//!   "Workspace": { "Name": "law-sentinel", "ResourceGroupName": "rg-sentinel" },
//!   "AppRegistration": { "DisplayName": "Obsidian-Sentinel-Connector" },
//!   "DataCollectionRule": { "Name": "dcr-obsidian-sentinel" }
//! }
//! ```
//!
//! The older flat layout (`SubscriptionId`, `WorkspaceName`, `DcrName`, ...)
//! is still read and normalized into the sectioned form.

use serde::{Deserialize, Serialize};

/// Keys that mark a document as the sectioned layout
const SECTION_KEYS: [&str; 4] = ["Azure", "Workspace", "AppRegistration", "DataCollectionRule"];

pub const DEFAULT_LOCATION: &str = "usgovvirginia";
pub const DEFAULT_APP_DISPLAY_NAME: &str = "Obsidian-Sentinel-Connector";
pub const DEFAULT_DCR_NAME: &str = "dcr-obsidian-sentinel";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ConfigDocument {
    #[serde(default)]
    pub azure: AzureSection,

    #[serde(default)]
    pub workspace: WorkspaceSection,

    #[serde(default)]
    pub app_registration: AppRegistrationSection,

    #[serde(default)]
    pub data_collection_rule: DataCollectionRuleSection,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct AzureSection {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tenant_id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subscription_id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource_group_name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct WorkspaceSection {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource_group_name: Option<String>,

    /// Full ARM resource path; when present the name lookup is skipped
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource_id: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct AppRegistrationSection {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct DataCollectionRuleSection {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

/// Flat layout used by the first generation of the deployment scripts
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct FlatDocument {
    tenant_id: Option<String>,
    subscription_id: Option<String>,
    resource_group_name: Option<String>,
    workspace_name: Option<String>,
    workspace_resource_id: Option<String>,
    location: Option<String>,
    dcr_name: Option<String>,
    app_display_name: Option<String>,
}

impl From<FlatDocument> for ConfigDocument {
    fn from(flat: FlatDocument) -> Self {
        Self {
            azure: AzureSection {
                tenant_id: flat.tenant_id,
                subscription_id: flat.subscription_id,
                resource_group_name: flat.resource_group_name,
                location: flat.location,
            },
            workspace: WorkspaceSection {
                name: flat.workspace_name,
                resource_group_name: None,
                resource_id: flat.workspace_resource_id,
            },
            app_registration: AppRegistrationSection {
                display_name: flat.app_display_name,
            },
            data_collection_rule: DataCollectionRuleSection {
                name: flat.dcr_name,
            },
        }
    }
}

impl ConfigDocument {
    /// Parse either layout. Returns the document and whether it was the flat one.
    pub fn from_json(content: &str) -> Result<(Self, bool), serde_json::Error> {
        let value: serde_json::Value = serde_json::from_str(content)?;
        let Some(object) = value.as_object() else {
            return Err(<serde_json::Error as serde::de::Error>::custom(
                "the configuration document must be a JSON object",
            ));
        };

        let sectioned = object.is_empty() || SECTION_KEYS.iter().any(|k| object.contains_key(*k));
        if sectioned {
            Ok((serde_json::from_value(value)?, false))
        } else {
            let flat: FlatDocument = serde_json::from_value(value)?;
            Ok((flat.into(), true))
        }
    }

    /// Pretty-printed sectioned JSON
    pub fn to_json_pretty(&self) -> Result<String, serde_json::Error> {
        let mut content = serde_json::to_string_pretty(self)?;
        content.push('\n');
        Ok(content)
    }

    /// Value of a key, ignoring blank strings
    pub fn get(&self, key: ConfigKey) -> Option<&str> {
        let slot = match key {
            ConfigKey::TenantId => &self.azure.tenant_id,
            ConfigKey::SubscriptionId => &self.azure.subscription_id,
            ConfigKey::ResourceGroupName => &self.azure.resource_group_name,
            ConfigKey::Location => &self.azure.location,
            ConfigKey::WorkspaceName => &self.workspace.name,
            ConfigKey::WorkspaceResourceGroupName => &self.workspace.resource_group_name,
            ConfigKey::WorkspaceResourceId => &self.workspace.resource_id,
            ConfigKey::AppDisplayName => &self.app_registration.display_name,
            ConfigKey::DcrName => &self.data_collection_rule.name,
        };
        slot.as_deref().map(str::trim).filter(|v| !v.is_empty())
    }

    pub fn set(&mut self, key: ConfigKey, value: impl Into<String>) {
        let slot = match key {
            ConfigKey::TenantId => &mut self.azure.tenant_id,
            ConfigKey::SubscriptionId => &mut self.azure.subscription_id,
            ConfigKey::ResourceGroupName => &mut self.azure.resource_group_name,
            ConfigKey::Location => &mut self.azure.location,
            ConfigKey::WorkspaceName => &mut self.workspace.name,
            ConfigKey::WorkspaceResourceGroupName => &mut self.workspace.resource_group_name,
            ConfigKey::WorkspaceResourceId => &mut self.workspace.resource_id,
            ConfigKey::AppDisplayName => &mut self.app_registration.display_name,
            ConfigKey::DcrName => &mut self.data_collection_rule.name,
        };
        *slot = Some(value.into());
    }

    /// Default for a key given the rest of the document
    pub fn default_for(&self, key: ConfigKey) -> Option<String> {
        match key {
            ConfigKey::Location => Some(DEFAULT_LOCATION.to_string()),
            ConfigKey::WorkspaceResourceGroupName => {
                self.get(ConfigKey::ResourceGroupName).map(str::to_string)
            }
            ConfigKey::AppDisplayName => Some(DEFAULT_APP_DISPLAY_NAME.to_string()),
            ConfigKey::DcrName => Some(DEFAULT_DCR_NAME.to_string()),
            _ => None,
        }
    }
}

/// Individually addressable settings
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigKey {
    TenantId,
    SubscriptionId,
    ResourceGroupName,
    Location,
    WorkspaceName,
    WorkspaceResourceGroupName,
    WorkspaceResourceId,
    AppDisplayName,
    DcrName,
}

impl ConfigKey {
    /// Keys asked for during interactive completion, in prompt order.
    /// `WorkspaceResourceId` is file-only.
    pub const PROMPTED: [ConfigKey; 8] = [
        ConfigKey::TenantId,
        ConfigKey::SubscriptionId,
        ConfigKey::ResourceGroupName,
        ConfigKey::Location,
        ConfigKey::WorkspaceName,
        ConfigKey::WorkspaceResourceGroupName,
        ConfigKey::AppDisplayName,
        ConfigKey::DcrName,
    ];

    /// Dotted path in the sectioned document
    pub fn path(&self) -> &'static str {
        match self {
            Self::TenantId => "Azure.TenantId",
            Self::SubscriptionId => "Azure.SubscriptionId",
            Self::ResourceGroupName => "Azure.ResourceGroupName",
            Self::Location => "Azure.Location",
            Self::WorkspaceName => "Workspace.Name",
            Self::WorkspaceResourceGroupName => "Workspace.ResourceGroupName",
            Self::WorkspaceResourceId => "Workspace.ResourceId",
            Self::AppDisplayName => "AppRegistration.DisplayName",
            Self::DcrName => "DataCollectionRule.Name",
        }
    }

    /// Prompt label
    pub fn label(&self) -> &'static str {
        match self {
            Self::TenantId => "Tenant (directory) ID (blank = read from subscription)",
            Self::SubscriptionId => "Subscription ID",
            Self::ResourceGroupName => "Resource group",
            Self::Location => "Location",
            Self::WorkspaceName => "Log Analytics workspace name",
            Self::WorkspaceResourceGroupName => "Workspace resource group",
            Self::WorkspaceResourceId => "Workspace resource ID",
            Self::AppDisplayName => "App registration display name",
            Self::DcrName => "Data collection rule name",
        }
    }

    pub fn is_required(&self) -> bool {
        matches!(
            self,
            Self::SubscriptionId | Self::ResourceGroupName | Self::WorkspaceName
        )
    }
}

impl std::fmt::Display for ConfigKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.path())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_sectioned_document() {
        let (doc, legacy) = ConfigDocument::from_json(
            r#"{
                "Azure": { "SubscriptionId": "S", "ResourceGroupName": "RG" },
                "Workspace": { "Name": "W" }
            }"#,
        )
        .unwrap();

        assert!(!legacy);
        assert_eq!(doc.get(ConfigKey::SubscriptionId), Some("S"));
        assert_eq!(doc.get(ConfigKey::WorkspaceName), Some("W"));
        assert_eq!(doc.get(ConfigKey::DcrName), None);
    }

    #[test]
    fn test_parse_flat_document() {
        let (doc, legacy) = ConfigDocument::from_json(
            r#"{
                "TenantId": "T",
                "SubscriptionId": "S",
                "ResourceGroupName": "RG",
                "WorkspaceName": "W",
                "DcrName": "my-dcr"
            }"#,
        )
        .unwrap();

        assert!(legacy);
        assert_eq!(doc.get(ConfigKey::TenantId), Some("T"));
        assert_eq!(doc.get(ConfigKey::WorkspaceName), Some("W"));
        assert_eq!(doc.get(ConfigKey::DcrName), Some("my-dcr"));
        assert_eq!(doc.get(ConfigKey::WorkspaceResourceGroupName), None);
    }

    #[test]
    fn test_blank_values_are_missing() {
        let mut doc = ConfigDocument::default();
        doc.set(ConfigKey::SubscriptionId, "   ");
        assert_eq!(doc.get(ConfigKey::SubscriptionId), None);
    }

    #[test]
    fn test_non_object_is_rejected() {
        assert!(ConfigDocument::from_json("[1, 2]").is_err());
        assert!(ConfigDocument::from_json("{ not json").is_err());
    }

    #[test]
    fn test_workspace_resource_group_defaults_to_azure_group() {
        let mut doc = ConfigDocument::default();
        assert_eq!(doc.default_for(ConfigKey::WorkspaceResourceGroupName), None);

        doc.set(ConfigKey::ResourceGroupName, "RG");
        assert_eq!(
            doc.default_for(ConfigKey::WorkspaceResourceGroupName).as_deref(),
            Some("RG")
        );
    }

    #[test]
    fn test_pretty_output_omits_unset_keys() {
        let mut doc = ConfigDocument::default();
        doc.set(ConfigKey::SubscriptionId, "S");
        let json = doc.to_json_pretty().unwrap();

        assert!(json.contains("\"SubscriptionId\": \"S\""));
        assert!(!json.contains("TenantId"));
        assert!(json.ends_with('\n'));
    }
}
