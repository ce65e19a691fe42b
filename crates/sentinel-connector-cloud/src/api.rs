//! Management API seam
//!
//! Every remote call the pipeline makes goes through `ManagementApi`. The
//! Azure implementation lives in `sentinel-connector-azure`; tests use an
//! in-memory fake.

use crate::error::Result;
use crate::schema::TableDefinition;
use crate::session::Session;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubscriptionInfo {
    pub subscription_id: String,
    pub tenant_id: String,
    pub display_name: Option<String>,
}

/// Resolved Log Analytics workspace
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkspaceRef {
    pub resource_id: String,
}

impl WorkspaceRef {
    pub fn new(resource_id: impl Into<String>) -> Self {
        Self {
            resource_id: resource_id.into(),
        }
    }

    /// Workspace name (last path segment)
    pub fn name(&self) -> &str {
        self.resource_id
            .trim_end_matches('/')
            .rsplit('/')
            .next()
            .unwrap_or_default()
    }
}

impl std::fmt::Display for WorkspaceRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.resource_id)
    }
}

/// Entra ID application registration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Application {
    /// Directory object id (used by addPassword)
    pub object_id: String,
    /// Client id handed to the vendor
    pub app_id: String,
    pub display_name: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServicePrincipal {
    pub object_id: String,
    pub app_id: String,
}

/// Client secret value. Only available in the response that created it.
#[derive(Clone, PartialEq, Eq)]
pub struct ClientSecret {
    pub key_id: String,
    value: String,
    pub expires_at: DateTime<Utc>,
}

impl ClientSecret {
    pub fn new(key_id: impl Into<String>, value: impl Into<String>, expires_at: DateTime<Utc>) -> Self {
        Self {
            key_id: key_id.into(),
            value: value.into(),
            expires_at,
        }
    }

    pub fn value(&self) -> &str {
        &self.value
    }
}

impl std::fmt::Debug for ClientSecret {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientSecret")
            .field("key_id", &self.key_id)
            .field("value", &"<redacted>")
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

/// ARM template deployment request
#[derive(Debug, Clone, PartialEq)]
pub struct Deployment {
    pub name: String,
    pub resource_group: String,
    pub template: serde_json::Value,
}

/// ARM provisioning state
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProvisioningState {
    Accepted,
    Running,
    Succeeded,
    Failed,
    Canceled,
    Other(String),
}

impl ProvisioningState {
    pub fn parse(state: &str) -> Self {
        match state.to_ascii_lowercase().as_str() {
            "accepted" => Self::Accepted,
            "running" | "creating" | "updating" => Self::Running,
            "succeeded" => Self::Succeeded,
            "failed" => Self::Failed,
            "canceled" | "cancelled" => Self::Canceled,
            _ => Self::Other(state.to_string()),
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed | Self::Canceled)
    }
}

impl std::fmt::Display for ProvisioningState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProvisioningState::Accepted => write!(f, "Accepted"),
            ProvisioningState::Running => write!(f, "Running"),
            ProvisioningState::Succeeded => write!(f, "Succeeded"),
            ProvisioningState::Failed => write!(f, "Failed"),
            ProvisioningState::Canceled => write!(f, "Canceled"),
            ProvisioningState::Other(s) => write!(f, "{}", s),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeploymentStatus {
    pub state: ProvisioningState,
    /// Provider error detail, if any
    pub error: Option<String>,
}

/// Deployed data collection rule
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataCollectionRule {
    pub resource_id: String,
    pub immutable_id: String,
    /// Present on Direct-kind rules
    pub logs_ingestion_endpoint: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoleAssignment {
    /// Assignment name (GUID)
    pub name: Uuid,
    pub principal_id: String,
    /// Full role definition resource id
    pub role_definition_id: String,
    pub scope: String,
}

impl RoleAssignment {
    /// Deterministic assignment name so reruns address the same assignment
    pub fn new(
        principal_id: impl Into<String>,
        role_definition_id: impl Into<String>,
        scope: impl Into<String>,
    ) -> Self {
        let principal_id = principal_id.into();
        let role_definition_id = role_definition_id.into();
        let scope = scope.into();
        let seed = format!(
            "{}|{}|{}",
            scope.to_ascii_lowercase(),
            principal_id.to_ascii_lowercase(),
            role_definition_id.to_ascii_lowercase()
        );
        Self {
            name: Uuid::new_v5(&Uuid::NAMESPACE_URL, seed.as_bytes()),
            principal_id,
            role_definition_id,
            scope,
        }
    }
}

/// Control-plane operations used by the provisioning pipeline
#[async_trait]
pub trait ManagementApi: Send + Sync {
    /// Read the session's subscription (and its tenant)
    async fn get_subscription(&self, session: &Session) -> Result<SubscriptionInfo>;

    /// Look up a workspace by name; `None` when it does not exist
    async fn find_workspace(
        &self,
        session: &Session,
        resource_group: &str,
        name: &str,
    ) -> Result<Option<WorkspaceRef>>;

    async fn find_application(
        &self,
        session: &Session,
        display_name: &str,
    ) -> Result<Option<Application>>;

    async fn create_application(&self, session: &Session, display_name: &str)
    -> Result<Application>;

    async fn find_service_principal(
        &self,
        session: &Session,
        app_id: &str,
    ) -> Result<Option<ServicePrincipal>>;

    async fn create_service_principal(
        &self,
        session: &Session,
        app_id: &str,
    ) -> Result<ServicePrincipal>;

    /// Add a new password credential to the application
    async fn add_client_secret(
        &self,
        session: &Session,
        application: &Application,
        display_name: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<ClientSecret>;

    async fn table_exists(
        &self,
        session: &Session,
        workspace: &WorkspaceRef,
        table_name: &str,
    ) -> Result<bool>;

    async fn create_table(
        &self,
        session: &Session,
        workspace: &WorkspaceRef,
        table: &TableDefinition,
    ) -> Result<()>;

    /// Submit a deployment; returns the state reported by the submit call
    async fn start_deployment(
        &self,
        session: &Session,
        deployment: &Deployment,
    ) -> Result<DeploymentStatus>;

    async fn get_deployment(
        &self,
        session: &Session,
        resource_group: &str,
        name: &str,
    ) -> Result<DeploymentStatus>;

    async fn get_data_collection_rule(
        &self,
        session: &Session,
        resource_group: &str,
        name: &str,
    ) -> Result<DataCollectionRule>;

    async fn create_role_assignment(
        &self,
        session: &Session,
        assignment: &RoleAssignment,
    ) -> Result<()>;
}
