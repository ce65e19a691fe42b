//! Validated settings
//!
//! `resolve` is a pure function: defaults + document → `Settings`, or the
//! first missing/invalid key. No I/O, no prompting.

use crate::document::{ConfigDocument, ConfigKey};
use crate::error::{ConfigError, Result};

const WORKSPACE_PROVIDER_SEGMENT: &str = "/providers/microsoft.operationalinsights/workspaces/";

/// Settings consumed by the provisioning run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    /// Expected tenant; when absent the tenant is read from the subscription
    pub tenant_id: Option<String>,
    pub subscription_id: String,
    /// Resource group that receives the data collection rule
    pub resource_group_name: String,
    pub location: String,
    pub workspace: WorkspaceSettings,
    pub app_display_name: String,
    pub dcr_name: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkspaceSettings {
    pub name: String,
    pub resource_group_name: String,
    pub resource_id: Option<String>,
}

/// Apply defaults and validate required keys
pub fn resolve(doc: &ConfigDocument) -> Result<Settings> {
    let required = |key: ConfigKey| -> Result<String> {
        doc.get(key)
            .map(str::to_string)
            .ok_or(ConfigError::MissingRequired(key.path()))
    };
    let defaulted = |key: ConfigKey| -> Result<String> {
        doc.get(key)
            .map(str::to_string)
            .or_else(|| doc.default_for(key))
            .ok_or(ConfigError::MissingRequired(key.path()))
    };

    let subscription_id = required(ConfigKey::SubscriptionId)?;
    let resource_group_name = required(ConfigKey::ResourceGroupName)?;
    let workspace_name = required(ConfigKey::WorkspaceName)?;

    let resource_id = doc
        .get(ConfigKey::WorkspaceResourceId)
        .map(str::to_string);
    if let Some(id) = &resource_id {
        validate_workspace_resource_id(id)?;
    }

    Ok(Settings {
        tenant_id: doc.get(ConfigKey::TenantId).map(str::to_string),
        subscription_id,
        resource_group_name,
        location: defaulted(ConfigKey::Location)?,
        workspace: WorkspaceSettings {
            name: workspace_name,
            resource_group_name: defaulted(ConfigKey::WorkspaceResourceGroupName)?,
            resource_id,
        },
        app_display_name: defaulted(ConfigKey::AppDisplayName)?,
        dcr_name: defaulted(ConfigKey::DcrName)?,
    })
}

fn validate_workspace_resource_id(id: &str) -> Result<()> {
    let lower = id.to_ascii_lowercase();
    if lower.starts_with("/subscriptions/") && lower.contains(WORKSPACE_PROVIDER_SEGMENT) {
        Ok(())
    } else {
        Err(ConfigError::Invalid {
            key: ConfigKey::WorkspaceResourceId.path(),
            message: format!(
                "expected /subscriptions/<id>/resourceGroups/<rg>/providers/Microsoft.OperationalInsights/workspaces/<name>, got '{}'",
                id
            ),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::{DEFAULT_APP_DISPLAY_NAME, DEFAULT_DCR_NAME, DEFAULT_LOCATION};

    fn minimal() -> ConfigDocument {
        let mut doc = ConfigDocument::default();
        doc.set(ConfigKey::SubscriptionId, "S");
        doc.set(ConfigKey::ResourceGroupName, "RG");
        doc.set(ConfigKey::WorkspaceName, "W");
        doc
    }

    #[test]
    fn test_resolve_applies_defaults() {
        let settings = resolve(&minimal()).unwrap();

        assert_eq!(settings.subscription_id, "S");
        assert_eq!(settings.tenant_id, None);
        assert_eq!(settings.location, DEFAULT_LOCATION);
        assert_eq!(settings.workspace.resource_group_name, "RG");
        assert_eq!(settings.workspace.resource_id, None);
        assert_eq!(settings.app_display_name, DEFAULT_APP_DISPLAY_NAME);
        assert_eq!(settings.dcr_name, DEFAULT_DCR_NAME);
    }

    #[test]
    fn test_resolve_fails_for_each_missing_required_key() {
        for key in [
            ConfigKey::SubscriptionId,
            ConfigKey::ResourceGroupName,
            ConfigKey::WorkspaceName,
        ] {
            let mut doc = minimal();
            doc.set(key, "");
            match resolve(&doc) {
                Err(ConfigError::MissingRequired(path)) => assert_eq!(path, key.path()),
                other => panic!("expected MissingRequired({}), got {:?}", key, other),
            }
        }
    }

    #[test]
    fn test_resolve_keeps_explicit_values() {
        let mut doc = minimal();
        doc.set(ConfigKey::Location, "usgovarizona");
        doc.set(ConfigKey::WorkspaceResourceGroupName, "RG-LAW");
        doc.set(ConfigKey::DcrName, "dcr-custom");
        doc.set(ConfigKey::TenantId, " T ");

        let settings = resolve(&doc).unwrap();
        assert_eq!(settings.location, "usgovarizona");
        assert_eq!(settings.workspace.resource_group_name, "RG-LAW");
        assert_eq!(settings.dcr_name, "dcr-custom");
        assert_eq!(settings.tenant_id.as_deref(), Some("T"));
    }

    #[test]
    fn test_resolve_accepts_workspace_resource_id() {
        let id = "/subscriptions/S/resourceGroups/RG/providers/Microsoft.OperationalInsights/workspaces/W";
        let mut doc = minimal();
        doc.set(ConfigKey::WorkspaceResourceId, id);

        let settings = resolve(&doc).unwrap();
        assert_eq!(settings.workspace.resource_id.as_deref(), Some(id));
    }

    #[test]
    fn test_resolve_rejects_malformed_workspace_resource_id() {
        let mut doc = minimal();
        doc.set(ConfigKey::WorkspaceResourceId, "law-sentinel");

        assert!(matches!(
            resolve(&doc),
            Err(ConfigError::Invalid {
                key: "Workspace.ResourceId",
                ..
            })
        ));
    }
}
