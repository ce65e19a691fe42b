//! Azure Resource Manager calls
//!
//! Paths and request bodies are built by plain functions so they can be
//! checked without a network.

use crate::error::{AzureError, Result};
use crate::rest::RestClient;
use sentinel_connector_cloud::{
    DCR_API_VERSION, DataCollectionRule, Deployment, DeploymentStatus, ProvisioningState,
    RoleAssignment, Session, SubscriptionInfo, TableDefinition, WorkspaceRef,
};
use serde::Deserialize;
use serde_json::{Value, json};

pub const SUBSCRIPTIONS_API_VERSION: &str = "2022-12-01";
pub const WORKSPACES_API_VERSION: &str = "2022-10-01";
pub const DEPLOYMENTS_API_VERSION: &str = "2021-04-01";
pub const ROLE_ASSIGNMENTS_API_VERSION: &str = "2022-04-01";

pub fn workspace_path(subscription_id: &str, resource_group: &str, name: &str) -> String {
    format!(
        "/subscriptions/{}/resourceGroups/{}/providers/Microsoft.OperationalInsights/workspaces/{}",
        subscription_id, resource_group, name
    )
}

pub fn table_path(workspace: &WorkspaceRef, table: &str) -> String {
    format!("{}/tables/{}", workspace.resource_id.trim_end_matches('/'), table)
}

pub fn deployment_path(subscription_id: &str, resource_group: &str, name: &str) -> String {
    format!(
        "/subscriptions/{}/resourcegroups/{}/providers/Microsoft.Resources/deployments/{}",
        subscription_id, resource_group, name
    )
}

pub fn dcr_path(subscription_id: &str, resource_group: &str, name: &str) -> String {
    format!(
        "/subscriptions/{}/resourceGroups/{}/providers/Microsoft.Insights/dataCollectionRules/{}",
        subscription_id, resource_group, name
    )
}

pub fn role_assignment_path(assignment: &RoleAssignment) -> String {
    format!(
        "{}/providers/Microsoft.Authorization/roleAssignments/{}",
        assignment.scope.trim_end_matches('/'),
        assignment.name
    )
}

pub fn table_body(table: &TableDefinition) -> Value {
    json!({
        "properties": {
            "schema": {
                "name": table.schema.name,
                "columns": table.schema.columns,
            },
            "retentionInDays": table.retention_in_days,
            "totalRetentionInDays": table.total_retention_in_days,
            "plan": table.plan.to_string(),
        }
    })
}

pub fn deployment_body(deployment: &Deployment) -> Value {
    json!({
        "properties": {
            "mode": "Incremental",
            "template": deployment.template,
        }
    })
}

pub fn role_assignment_body(assignment: &RoleAssignment) -> Value {
    json!({
        "properties": {
            "roleDefinitionId": assignment.role_definition_id,
            "principalId": assignment.principal_id,
            // Skips the directory lookup that fails for brand-new principals
            "principalType": "ServicePrincipal",
        }
    })
}

/// Read `properties.provisioningState` / `properties.error` of a deployment
pub fn deployment_status(value: &Value) -> Result<DeploymentStatus> {
    let properties = value.get("properties");
    let state = properties
        .and_then(|p| p.get("provisioningState"))
        .and_then(Value::as_str)
        .ok_or_else(|| {
            AzureError::InvalidResponse("deployment has no provisioningState".to_string())
        })?;

    Ok(DeploymentStatus {
        state: ProvisioningState::parse(state),
        error: properties.and_then(|p| p.get("error")).map(describe_error),
    })
}

/// Flatten an ARM error object and its details into one line
fn describe_error(error: &Value) -> String {
    let mut parts = Vec::new();
    let mut pending = vec![error];
    while let Some(current) = pending.pop() {
        let code = current.get("code").and_then(Value::as_str);
        let message = current.get("message").and_then(Value::as_str);
        match (code, message) {
            (Some(c), Some(m)) => parts.push(format!("{}: {}", c, m)),
            (Some(c), None) => parts.push(c.to_string()),
            (None, Some(m)) => parts.push(m.to_string()),
            (None, None) => {}
        }
        if let Some(details) = current.get("details").and_then(Value::as_array) {
            pending.extend(details.iter().rev());
        }
    }
    if parts.is_empty() {
        error.to_string()
    } else {
        parts.join("; ")
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApiSubscription {
    subscription_id: String,
    tenant_id: String,
    #[serde(default)]
    display_name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiResource {
    id: String,
}

#[derive(Debug, Deserialize)]
struct ApiDataCollectionRule {
    id: String,
    properties: ApiDcrProperties,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApiDcrProperties {
    immutable_id: String,
    #[serde(default)]
    endpoints: Option<ApiDcrEndpoints>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApiDcrEndpoints {
    #[serde(default)]
    logs_ingestion: Option<String>,
}

/// ARM client for the resources the pipeline touches
#[derive(Clone)]
pub struct ArmClient {
    rest: RestClient,
}

impl ArmClient {
    pub fn new(rest: RestClient) -> Self {
        Self { rest }
    }

    pub async fn get_subscription(&self, session: &Session) -> Result<SubscriptionInfo> {
        let url = session.arm_url(&format!("/subscriptions/{}", session.subscription_id()));
        let sub: ApiSubscription = self
            .rest
            .get(&url, token(session), &[("api-version", SUBSCRIPTIONS_API_VERSION)])
            .await?;
        Ok(SubscriptionInfo {
            subscription_id: sub.subscription_id,
            tenant_id: sub.tenant_id,
            display_name: sub.display_name,
        })
    }

    pub async fn find_workspace(
        &self,
        session: &Session,
        resource_group: &str,
        name: &str,
    ) -> Result<Option<WorkspaceRef>> {
        let url = session.arm_url(&workspace_path(session.subscription_id(), resource_group, name));
        let ws: Option<ApiResource> = self
            .rest
            .get_optional(&url, token(session), &[("api-version", WORKSPACES_API_VERSION)])
            .await?;
        Ok(ws.map(|ws| WorkspaceRef::new(ws.id)))
    }

    pub async fn table_exists(
        &self,
        session: &Session,
        workspace: &WorkspaceRef,
        table: &str,
    ) -> Result<bool> {
        let url = session.arm_url(&table_path(workspace, table));
        let found: Option<Value> = self
            .rest
            .get_optional(&url, token(session), &[("api-version", WORKSPACES_API_VERSION)])
            .await?;
        Ok(found.is_some())
    }

    pub async fn create_table(
        &self,
        session: &Session,
        workspace: &WorkspaceRef,
        table: &TableDefinition,
    ) -> Result<()> {
        let url = session.arm_url(&table_path(workspace, &table.schema.name));
        let _: Value = self
            .rest
            .put(
                &url,
                token(session),
                &[("api-version", WORKSPACES_API_VERSION)],
                &table_body(table),
            )
            .await?;
        tracing::info!(table = %table.schema.name, "Table submitted");
        Ok(())
    }

    pub async fn start_deployment(
        &self,
        session: &Session,
        deployment: &Deployment,
    ) -> Result<DeploymentStatus> {
        let url = session.arm_url(&deployment_path(
            session.subscription_id(),
            &deployment.resource_group,
            &deployment.name,
        ));
        let response: Value = self
            .rest
            .put(
                &url,
                token(session),
                &[("api-version", DEPLOYMENTS_API_VERSION)],
                &deployment_body(deployment),
            )
            .await?;
        deployment_status(&response)
    }

    pub async fn get_deployment(
        &self,
        session: &Session,
        resource_group: &str,
        name: &str,
    ) -> Result<DeploymentStatus> {
        let url = session.arm_url(&deployment_path(session.subscription_id(), resource_group, name));
        let response: Value = self
            .rest
            .get(&url, token(session), &[("api-version", DEPLOYMENTS_API_VERSION)])
            .await?;
        deployment_status(&response)
    }

    pub async fn get_data_collection_rule(
        &self,
        session: &Session,
        resource_group: &str,
        name: &str,
    ) -> Result<DataCollectionRule> {
        let url = session.arm_url(&dcr_path(session.subscription_id(), resource_group, name));
        let dcr: ApiDataCollectionRule = self
            .rest
            .get(&url, token(session), &[("api-version", DCR_API_VERSION)])
            .await?;
        Ok(DataCollectionRule {
            resource_id: dcr.id,
            immutable_id: dcr.properties.immutable_id,
            logs_ingestion_endpoint: dcr.properties.endpoints.and_then(|e| e.logs_ingestion),
        })
    }

    pub async fn create_role_assignment(
        &self,
        session: &Session,
        assignment: &RoleAssignment,
    ) -> Result<()> {
        let url = session.arm_url(&role_assignment_path(assignment));
        let _: Value = self
            .rest
            .put(
                &url,
                token(session),
                &[("api-version", ROLE_ASSIGNMENTS_API_VERSION)],
                &role_assignment_body(assignment),
            )
            .await?;
        Ok(())
    }
}

fn token(session: &Session) -> &str {
    session.management_token().secret()
}
