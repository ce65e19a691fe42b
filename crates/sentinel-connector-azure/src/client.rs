//! `ManagementApi` over ARM and Microsoft Graph

use crate::arm::ArmClient;
use crate::error::{AzureError, Result};
use crate::graph::GraphClient;
use crate::rest::RestClient;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sentinel_connector_cloud::{
    Application, ClientSecret, DataCollectionRule, Deployment, DeploymentStatus, ManagementApi,
    RoleAssignment, ServicePrincipal, Session, SubscriptionInfo, TableDefinition, WorkspaceRef,
};
use std::future::Future;
use std::time::Duration;

/// Retry for calls that race directory replication
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Maximum number of attempts (including the first)
    pub max_attempts: u32,

    /// Initial delay between retries
    pub initial_delay: Duration,

    /// Maximum delay between retries
    pub max_delay: Duration,

    /// Backoff multiplier
    pub backoff_multiplier: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 6,
            initial_delay: Duration::from_secs(2),
            max_delay: Duration::from_secs(30),
            backoff_multiplier: 2.0,
        }
    }
}

/// A freshly created application or principal not yet visible everywhere
pub fn is_replication_delay(err: &AzureError) -> bool {
    match err {
        AzureError::Api {
            status,
            code,
            message,
        } => {
            let code = code.as_deref().unwrap_or_default();
            code.eq_ignore_ascii_case("Request_ResourceNotFound")
                || code.eq_ignore_ascii_case("PrincipalNotFound")
                || (*status == 400
                    && message.contains("does not reference a valid application object"))
        }
        _ => false,
    }
}

/// Run `op`, retrying replication delays with exponential backoff
pub async fn retry_replication<T, F, Fut>(config: &RetryConfig, what: &str, mut op: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut delay = config.initial_delay;
    let mut attempt = 1;
    loop {
        match op().await {
            Err(err) if attempt < config.max_attempts && is_replication_delay(&err) => {
                tracing::warn!(
                    what,
                    attempt,
                    delay_secs = delay.as_secs_f64(),
                    error = %err,
                    "Not replicated yet, retrying"
                );
                tokio::time::sleep(delay).await;
                delay = delay.mul_f64(config.backoff_multiplier).min(config.max_delay);
                attempt += 1;
            }
            result => return result,
        }
    }
}

/// Azure Government management client
pub struct AzureManagementClient {
    arm: ArmClient,
    graph: GraphClient,
    retry: RetryConfig,
}

impl AzureManagementClient {
    pub fn new() -> Result<Self> {
        let rest = RestClient::new()?;
        Ok(Self {
            arm: ArmClient::new(rest.clone()),
            graph: GraphClient::new(rest),
            retry: RetryConfig::default(),
        })
    }

    pub fn with_retry_config(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }
}

#[async_trait]
impl ManagementApi for AzureManagementClient {
    async fn get_subscription(
        &self,
        session: &Session,
    ) -> sentinel_connector_cloud::Result<SubscriptionInfo> {
        Ok(self.arm.get_subscription(session).await?)
    }

    async fn find_workspace(
        &self,
        session: &Session,
        resource_group: &str,
        name: &str,
    ) -> sentinel_connector_cloud::Result<Option<WorkspaceRef>> {
        Ok(self.arm.find_workspace(session, resource_group, name).await?)
    }

    async fn find_application(
        &self,
        session: &Session,
        display_name: &str,
    ) -> sentinel_connector_cloud::Result<Option<Application>> {
        Ok(self.graph.find_application(session, display_name).await?)
    }

    async fn create_application(
        &self,
        session: &Session,
        display_name: &str,
    ) -> sentinel_connector_cloud::Result<Application> {
        Ok(self.graph.create_application(session, display_name).await?)
    }

    async fn find_service_principal(
        &self,
        session: &Session,
        app_id: &str,
    ) -> sentinel_connector_cloud::Result<Option<ServicePrincipal>> {
        Ok(self.graph.find_service_principal(session, app_id).await?)
    }

    async fn create_service_principal(
        &self,
        session: &Session,
        app_id: &str,
    ) -> sentinel_connector_cloud::Result<ServicePrincipal> {
        let graph = &self.graph;
        Ok(retry_replication(&self.retry, "create service principal", move || {
            graph.create_service_principal(session, app_id)
        })
        .await?)
    }

    async fn add_client_secret(
        &self,
        session: &Session,
        application: &Application,
        display_name: &str,
        expires_at: DateTime<Utc>,
    ) -> sentinel_connector_cloud::Result<ClientSecret> {
        let graph = &self.graph;
        Ok(retry_replication(&self.retry, "add client secret", move || {
            graph.add_password(session, application, display_name, expires_at)
        })
        .await?)
    }

    async fn table_exists(
        &self,
        session: &Session,
        workspace: &WorkspaceRef,
        table_name: &str,
    ) -> sentinel_connector_cloud::Result<bool> {
        Ok(self.arm.table_exists(session, workspace, table_name).await?)
    }

    async fn create_table(
        &self,
        session: &Session,
        workspace: &WorkspaceRef,
        table: &TableDefinition,
    ) -> sentinel_connector_cloud::Result<()> {
        Ok(self.arm.create_table(session, workspace, table).await?)
    }

    async fn start_deployment(
        &self,
        session: &Session,
        deployment: &Deployment,
    ) -> sentinel_connector_cloud::Result<DeploymentStatus> {
        Ok(self.arm.start_deployment(session, deployment).await?)
    }

    async fn get_deployment(
        &self,
        session: &Session,
        resource_group: &str,
        name: &str,
    ) -> sentinel_connector_cloud::Result<DeploymentStatus> {
        Ok(self.arm.get_deployment(session, resource_group, name).await?)
    }

    async fn get_data_collection_rule(
        &self,
        session: &Session,
        resource_group: &str,
        name: &str,
    ) -> sentinel_connector_cloud::Result<DataCollectionRule> {
        Ok(self
            .arm
            .get_data_collection_rule(session, resource_group, name)
            .await?)
    }

    async fn create_role_assignment(
        &self,
        session: &Session,
        assignment: &RoleAssignment,
    ) -> sentinel_connector_cloud::Result<()> {
        let arm = &self.arm;
        Ok(retry_replication(&self.retry, "create role assignment", move || {
            arm.create_role_assignment(session, assignment)
        })
        .await?)
    }
}
