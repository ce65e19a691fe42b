use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sentinel_connector_cloud::{
    AccessToken, Application, ClientSecret, CloudError, DataCollectionRule, Deployment,
    DeploymentStatus, ManagementApi, ProvisioningState, Result, RoleAssignment, ServicePrincipal,
    Session, SessionTarget, SubscriptionInfo, TARGET_ENVIRONMENT, TableDefinition, WorkspaceRef,
};
use sentinel_connector_config::{ConfigDocument, ConfigKey, Settings, resolve};
use std::collections::{BTreeSet, HashMap, VecDeque};
use std::sync::{Mutex, MutexGuard};

pub const TENANT: &str = "00000000-0000-0000-0000-0000000000aa";
pub const SUBSCRIPTION: &str = "S";
pub const RESOURCE_GROUP: &str = "RG";
pub const WORKSPACE: &str = "W";
pub const WORKSPACE_ID: &str =
    "/subscriptions/S/resourceGroups/RG/providers/Microsoft.OperationalInsights/workspaces/W";

pub fn session() -> Session {
    let target = SessionTarget::government(Some(TENANT.to_string()), SUBSCRIPTION);
    Session::new(
        &target,
        TARGET_ENVIRONMENT,
        TENANT,
        AccessToken::new("arm-token", None),
        AccessToken::new("graph-token", None),
    )
    .unwrap()
}

/// Settings for S / RG / W with every other key defaulted
pub fn settings() -> Settings {
    let mut doc = ConfigDocument::default();
    doc.set(ConfigKey::SubscriptionId, SUBSCRIPTION);
    doc.set(ConfigKey::ResourceGroupName, RESOURCE_GROUP);
    doc.set(ConfigKey::WorkspaceName, WORKSPACE);
    resolve(&doc).unwrap()
}

/// Error injected into a create call
#[derive(Debug, Clone)]
pub struct InjectedError {
    pub status: u16,
    pub code: Option<String>,
}

impl InjectedError {
    pub fn new(status: u16, code: Option<&str>) -> Self {
        Self {
            status,
            code: code.map(str::to_string),
        }
    }

    fn to_error(&self) -> CloudError {
        CloudError::api(self.status, self.code.clone(), "injected")
    }
}

#[derive(Debug, Default)]
pub struct FakeState {
    pub workspaces: HashMap<(String, String), String>,
    pub applications: Vec<Application>,
    pub service_principals: Vec<ServicePrincipal>,
    pub secrets: Vec<String>,
    /// `expires_at` of every requested secret
    pub secret_expiries: Vec<DateTime<Utc>>,
    /// (workspace id, table name)
    pub tables: BTreeSet<(String, String)>,
    pub dcrs: HashMap<String, DataCollectionRule>,
    pub role_assignments: BTreeSet<uuid::Uuid>,

    /// States returned by successive deployment reads; empty means `Succeeded`
    pub deployment_script: VecDeque<ProvisioningState>,
    pub table_error: Option<InjectedError>,
    pub role_error: Option<InjectedError>,
    /// Rule comes back without an ingestion endpoint
    pub dcr_without_endpoint: bool,

    pub calls: Vec<String>,
    pub table_puts: usize,
    pub deployments_started: usize,
    pub deployment_polls: usize,
}

impl FakeState {
    pub fn count(&self, call: &str) -> usize {
        self.calls.iter().filter(|c| c.as_str() == call).count()
    }
}

/// In-memory `ManagementApi`
pub struct FakeCloud {
    state: Mutex<FakeState>,
}

impl FakeCloud {
    /// Fake with workspace RG/W present and nothing else
    pub fn new() -> Self {
        let mut state = FakeState::default();
        state.workspaces.insert(
            (RESOURCE_GROUP.to_string(), WORKSPACE.to_string()),
            WORKSPACE_ID.to_string(),
        );
        Self {
            state: Mutex::new(state),
        }
    }

    pub fn state(&self) -> MutexGuard<'_, FakeState> {
        self.state.lock().unwrap()
    }

    fn call(&self, name: &str) -> MutexGuard<'_, FakeState> {
        let mut state = self.state();
        state.calls.push(name.to_string());
        state
    }

    fn next_deployment_state(state: &mut FakeState, deployment: &str) -> DeploymentStatus {
        let next = state
            .deployment_script
            .pop_front()
            .unwrap_or(ProvisioningState::Succeeded);
        let error = match next {
            ProvisioningState::Failed => Some(format!("{}: InvalidPayload", deployment)),
            _ => None,
        };
        DeploymentStatus { state: next, error }
    }
}

#[async_trait]
impl ManagementApi for FakeCloud {
    async fn get_subscription(&self, session: &Session) -> Result<SubscriptionInfo> {
        let _state = self.call("get_subscription");
        Ok(SubscriptionInfo {
            subscription_id: session.subscription_id().to_string(),
            tenant_id: TENANT.to_string(),
            display_name: Some("GCCH Production".to_string()),
        })
    }

    async fn find_workspace(
        &self,
        _session: &Session,
        resource_group: &str,
        name: &str,
    ) -> Result<Option<WorkspaceRef>> {
        let state = self.call("find_workspace");
        Ok(state
            .workspaces
            .get(&(resource_group.to_string(), name.to_string()))
            .map(WorkspaceRef::new))
    }

    async fn find_application(
        &self,
        _session: &Session,
        display_name: &str,
    ) -> Result<Option<Application>> {
        let state = self.call("find_application");
        Ok(state
            .applications
            .iter()
            .find(|a| a.display_name == display_name)
            .cloned())
    }

    async fn create_application(
        &self,
        _session: &Session,
        display_name: &str,
    ) -> Result<Application> {
        let mut state = self.call("create_application");
        let n = state.applications.len() + 1;
        let app = Application {
            object_id: format!("app-object-{}", n),
            app_id: format!("app-id-{}", n),
            display_name: display_name.to_string(),
        };
        state.applications.push(app.clone());
        Ok(app)
    }

    async fn find_service_principal(
        &self,
        _session: &Session,
        app_id: &str,
    ) -> Result<Option<ServicePrincipal>> {
        let state = self.call("find_service_principal");
        Ok(state
            .service_principals
            .iter()
            .find(|sp| sp.app_id == app_id)
            .cloned())
    }

    async fn create_service_principal(
        &self,
        _session: &Session,
        app_id: &str,
    ) -> Result<ServicePrincipal> {
        let mut state = self.call("create_service_principal");
        let sp = ServicePrincipal {
            object_id: format!("sp-{}", app_id),
            app_id: app_id.to_string(),
        };
        state.service_principals.push(sp.clone());
        Ok(sp)
    }

    async fn add_client_secret(
        &self,
        _session: &Session,
        application: &Application,
        _display_name: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<ClientSecret> {
        let mut state = self.call("add_client_secret");
        let n = state.secrets.len() + 1;
        let value = format!("secret-{}-{}", application.app_id, n);
        state.secrets.push(value.clone());
        state.secret_expiries.push(expires_at);
        Ok(ClientSecret::new(format!("key-{}", n), value, expires_at))
    }

    async fn table_exists(
        &self,
        _session: &Session,
        workspace: &WorkspaceRef,
        table_name: &str,
    ) -> Result<bool> {
        let state = self.call("table_exists");
        Ok(state
            .tables
            .contains(&(workspace.resource_id.clone(), table_name.to_string())))
    }

    async fn create_table(
        &self,
        _session: &Session,
        workspace: &WorkspaceRef,
        table: &TableDefinition,
    ) -> Result<()> {
        let mut state = self.call("create_table");
        state.table_puts += 1;
        if let Some(err) = &state.table_error {
            return Err(err.to_error());
        }
        state
            .tables
            .insert((workspace.resource_id.clone(), table.schema.name.clone()));
        Ok(())
    }

    async fn start_deployment(
        &self,
        session: &Session,
        deployment: &Deployment,
    ) -> Result<DeploymentStatus> {
        let mut state = self.call("start_deployment");
        state.deployments_started += 1;

        let resource = &deployment.template["resources"][0];
        let name = resource["name"].as_str().unwrap_or_default().to_string();
        let status = Self::next_deployment_state(&mut state, &deployment.name);

        // The rule exists as soon as the deployment is accepted
        let resource_id = format!(
            "/subscriptions/{}/resourceGroups/{}/providers/Microsoft.Insights/dataCollectionRules/{}",
            session.subscription_id(),
            deployment.resource_group,
            name
        );
        let endpoint = if state.dcr_without_endpoint {
            None
        } else {
            Some("https://dcr-obsidian.usgovvirginia-1.ingest.monitor.azure.us".to_string())
        };
        state.dcrs.insert(
            name,
            DataCollectionRule {
                resource_id,
                immutable_id: "dcr-00000000000000000000000000000001".to_string(),
                logs_ingestion_endpoint: endpoint,
            },
        );

        Ok(status)
    }

    async fn get_deployment(
        &self,
        _session: &Session,
        _resource_group: &str,
        name: &str,
    ) -> Result<DeploymentStatus> {
        let mut state = self.call("get_deployment");
        state.deployment_polls += 1;
        Ok(Self::next_deployment_state(&mut state, name))
    }

    async fn get_data_collection_rule(
        &self,
        _session: &Session,
        _resource_group: &str,
        name: &str,
    ) -> Result<DataCollectionRule> {
        let state = self.call("get_data_collection_rule");
        state
            .dcrs
            .get(name)
            .cloned()
            .ok_or_else(|| CloudError::api(404, Some("ResourceNotFound".into()), name))
    }

    async fn create_role_assignment(
        &self,
        _session: &Session,
        assignment: &RoleAssignment,
    ) -> Result<()> {
        let mut state = self.call("create_role_assignment");
        if let Some(err) = &state.role_error {
            return Err(err.to_error());
        }
        if !state.role_assignments.insert(assignment.name) {
            return Err(CloudError::api(
                409,
                Some("RoleAssignmentExists".into()),
                "The role assignment already exists.",
            ));
        }
        Ok(())
    }
}
