//! Provisioning pipeline
//!
//! Six steps, always in the same order, each awaited before the next:
//!
//! 1. subscription binding
//! 2. workspace resolution
//! 3. application identity (app registration, service principal, one new secret)
//! 4. custom tables
//! 5. data collection rule deployment
//! 6. role assignment on the rule
//!
//! The first failure aborts the run. Nothing is rolled back; every step is
//! safe to repeat, so the remedy for a failed run is to run it again.

use crate::api::{
    Application, ClientSecret, DataCollectionRule, DeploymentStatus, ManagementApi,
    ProvisioningState, RoleAssignment, ServicePrincipal, WorkspaceRef,
};
use crate::dcr::DcrDescriptor;
use crate::error::{CloudError, Result};
use crate::idempotency::{ROLE_ASSIGNMENT, TABLE_CREATION};
use crate::report::CredentialReport;
use crate::schema::{TableDefinition, TableSchema, builtin_tables};
use crate::session::Session;
use crate::step::{ProgressObserver, RunSummary, Step, StepRecord, StepStatus};
use chrono::Utc;
use sentinel_connector_config::Settings;
use std::time::Duration;
use tracing::{info, instrument};

/// Client secrets are valid for two years
pub const SECRET_VALIDITY_DAYS: i64 = 730;

/// Display name given to each password credential
pub const SECRET_DISPLAY_NAME: &str = "Obsidian-Sentinel-Connector-Secret";

/// Built-in "Monitoring Metrics Publisher" role
pub const MONITORING_METRICS_PUBLISHER_ROLE_ID: &str = "3913510d-42f4-4e42-8a64-420c390055eb";

/// Deployment polling
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollConfig {
    /// Delay between status reads
    pub interval: Duration,

    /// Give up after this long without a terminal state
    pub timeout: Duration,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(5),
            timeout: Duration::from_secs(600),
        }
    }
}

/// Application registration plus its service principal
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppIdentity {
    pub object_id: String,
    pub app_id: String,
    pub display_name: String,
    pub service_principal_id: String,
    /// True when this run registered the application
    pub created: bool,
}

/// Everything a successful run produced
#[derive(Debug, Clone)]
pub struct ProvisionOutcome {
    pub tenant_id: String,
    pub workspace: WorkspaceRef,
    pub identity: AppIdentity,
    pub secret: ClientSecret,
    pub tables: Vec<TableSchema>,
    pub dcr: DataCollectionRule,
    /// Stream names routed by the rule
    pub streams: Vec<String>,
    pub role_assignment: RoleAssignment,
    pub steps: Vec<StepRecord>,
}

impl ProvisionOutcome {
    pub fn summary(&self) -> RunSummary {
        RunSummary::from_records(&self.steps)
    }

    /// Values the vendor needs to start sending data
    pub fn credential_report(&self) -> CredentialReport {
        CredentialReport {
            tenant_id: self.tenant_id.clone(),
            client_id: self.identity.app_id.clone(),
            client_secret: self.secret.clone(),
            dcr_immutable_id: self.dcr.immutable_id.clone(),
            logs_ingestion_endpoint: self
                .dcr
                .logs_ingestion_endpoint
                .clone()
                .unwrap_or_default(),
            streams: self.streams.clone(),
            dcr_resource_id: self.dcr.resource_id.clone(),
            generated_at: Utc::now(),
        }
    }
}

/// Runs the provisioning steps against a `ManagementApi`
pub struct Provisioner<'a> {
    api: &'a dyn ManagementApi,
    poll: PollConfig,
    observer: &'a dyn ProgressObserver,
}

impl<'a> Provisioner<'a> {
    pub fn new(api: &'a dyn ManagementApi) -> Self {
        Self {
            api,
            poll: PollConfig::default(),
            observer: &(),
        }
    }

    pub fn with_poll_config(mut self, poll: PollConfig) -> Self {
        self.poll = poll;
        self
    }

    pub fn with_observer(mut self, observer: &'a dyn ProgressObserver) -> Self {
        self.observer = observer;
        self
    }

    #[instrument(skip_all, fields(subscription = %settings.subscription_id))]
    pub async fn run(&self, session: &Session, settings: &Settings) -> Result<ProvisionOutcome> {
        let mut steps = Vec::new();

        self.observer.step_started(Step::SubscriptionBinding);
        let tenant_id = self.bind_subscription(session, settings, &mut steps).await?;

        self.observer.step_started(Step::WorkspaceResolution);
        let workspace = self.resolve_workspace(session, settings, &mut steps).await?;

        self.observer.step_started(Step::ApplicationIdentity);
        let (identity, secret) = self.ensure_identity(session, settings, &mut steps).await?;

        self.observer.step_started(Step::Tables);
        let tables = self.ensure_tables(session, &workspace, &mut steps).await?;

        self.observer.step_started(Step::DataCollectionRule);
        let (dcr, streams) = self
            .deploy_rule(session, settings, &workspace, &tables, &mut steps)
            .await?;

        self.observer.step_started(Step::RoleAssignment);
        let role_assignment = self
            .assign_role(session, &identity, &dcr, &mut steps)
            .await?;

        info!(summary = %RunSummary::from_records(&steps), "Provisioning complete");

        Ok(ProvisionOutcome {
            tenant_id,
            workspace,
            identity,
            secret,
            tables,
            dcr,
            streams,
            role_assignment,
            steps,
        })
    }

    fn record(&self, steps: &mut Vec<StepRecord>, record: StepRecord) {
        info!(step = %record.step, status = %record.status, subject = %record.subject, "Step result");
        self.observer.record(&record);
        steps.push(record);
    }

    /// Step 1: confirm the subscription and read its tenant
    async fn bind_subscription(
        &self,
        session: &Session,
        settings: &Settings,
        steps: &mut Vec<StepRecord>,
    ) -> Result<String> {
        let subscription = self.api.get_subscription(session).await?;

        if !subscription
            .subscription_id
            .eq_ignore_ascii_case(&settings.subscription_id)
        {
            return Err(CloudError::authentication(format!(
                "session is bound to subscription {}, expected {}",
                subscription.subscription_id, settings.subscription_id
            )));
        }
        if let Some(expected) = &settings.tenant_id {
            if !expected.eq_ignore_ascii_case(&subscription.tenant_id) {
                return Err(CloudError::authentication(format!(
                    "subscription {} belongs to tenant {}, but tenant {} is configured",
                    subscription.subscription_id, subscription.tenant_id, expected
                )));
            }
        }

        let subject = match &subscription.display_name {
            Some(name) => format!("{} ({})", subscription.subscription_id, name),
            None => subscription.subscription_id.clone(),
        };
        self.record(
            steps,
            StepRecord::new(Step::SubscriptionBinding, StepStatus::Resolved, subject),
        );
        Ok(subscription.tenant_id)
    }

    /// Step 2: explicit resource id wins; otherwise look the workspace up
    async fn resolve_workspace(
        &self,
        session: &Session,
        settings: &Settings,
        steps: &mut Vec<StepRecord>,
    ) -> Result<WorkspaceRef> {
        let ws = &settings.workspace;
        let workspace = match &ws.resource_id {
            Some(resource_id) => WorkspaceRef::new(resource_id.clone()),
            None => self
                .api
                .find_workspace(session, &ws.resource_group_name, &ws.name)
                .await?
                .ok_or_else(|| CloudError::WorkspaceNotFound {
                    name: ws.name.clone(),
                    resource_group: ws.resource_group_name.clone(),
                })?,
        };

        self.record(
            steps,
            StepRecord::new(
                Step::WorkspaceResolution,
                StepStatus::Resolved,
                workspace.resource_id.clone(),
            ),
        );
        Ok(workspace)
    }

    /// Step 3: reuse or register the application, then mint one new secret
    async fn ensure_identity(
        &self,
        session: &Session,
        settings: &Settings,
        steps: &mut Vec<StepRecord>,
    ) -> Result<(AppIdentity, ClientSecret)> {
        let display_name = &settings.app_display_name;

        let (application, created) = match self.api.find_application(session, display_name).await? {
            Some(app) => (app, false),
            None => (self.api.create_application(session, display_name).await?, true),
        };
        self.record(
            steps,
            StepRecord::new(
                Step::ApplicationIdentity,
                if created { StepStatus::Created } else { StepStatus::Reused },
                format!("application {} ({})", application.display_name, application.app_id),
            ),
        );

        let service_principal = self
            .ensure_service_principal(session, &application, steps)
            .await?;

        let expires_at = Utc::now() + chrono::Duration::days(SECRET_VALIDITY_DAYS);
        let secret = self
            .api
            .add_client_secret(session, &application, SECRET_DISPLAY_NAME, expires_at)
            .await?;
        self.record(
            steps,
            StepRecord::new(
                Step::ApplicationIdentity,
                StepStatus::Created,
                format!(
                    "client secret {} (expires {})",
                    secret.key_id,
                    secret.expires_at.format("%Y-%m-%d")
                ),
            ),
        );

        let identity = AppIdentity {
            object_id: application.object_id,
            app_id: application.app_id,
            display_name: application.display_name,
            service_principal_id: service_principal.object_id,
            created,
        };
        Ok((identity, secret))
    }

    async fn ensure_service_principal(
        &self,
        session: &Session,
        application: &Application,
        steps: &mut Vec<StepRecord>,
    ) -> Result<ServicePrincipal> {
        let (sp, status) = match self
            .api
            .find_service_principal(session, &application.app_id)
            .await?
        {
            Some(sp) => (sp, StepStatus::Reused),
            None => (
                self.api
                    .create_service_principal(session, &application.app_id)
                    .await?,
                StepStatus::Created,
            ),
        };
        self.record(
            steps,
            StepRecord::new(
                Step::ApplicationIdentity,
                status,
                format!("service principal {}", sp.object_id),
            ),
        );
        Ok(sp)
    }

    /// Step 4: create whichever custom tables are missing
    async fn ensure_tables(
        &self,
        session: &Session,
        workspace: &WorkspaceRef,
        steps: &mut Vec<StepRecord>,
    ) -> Result<Vec<TableSchema>> {
        let tables = builtin_tables()?;

        for schema in &tables {
            let status = if self.api.table_exists(session, workspace, &schema.name).await? {
                StepStatus::Skipped
            } else {
                let definition = TableDefinition::analytics(schema.clone());
                let result = self.api.create_table(session, workspace, &definition).await;
                TABLE_CREATION.settle(result, &schema.name)?
            };
            self.record(steps, StepRecord::new(Step::Tables, status, schema.name.clone()));
        }

        Ok(tables)
    }

    /// Step 5: deploy the rule and read back its identifiers
    async fn deploy_rule(
        &self,
        session: &Session,
        settings: &Settings,
        workspace: &WorkspaceRef,
        tables: &[TableSchema],
        steps: &mut Vec<StepRecord>,
    ) -> Result<(DataCollectionRule, Vec<String>)> {
        let descriptor = DcrDescriptor::new(
            settings.dcr_name.clone(),
            settings.location.clone(),
            workspace.clone(),
            tables,
        )?;
        let deployment = descriptor.deployment(settings.resource_group_name.clone());

        info!(deployment = %deployment.name, resource_group = %deployment.resource_group, "Submitting deployment");
        let submitted = self.api.start_deployment(session, &deployment).await?;
        let status = self
            .wait_for_deployment(session, &deployment.resource_group, &deployment.name, submitted)
            .await?;

        if status.state != ProvisioningState::Succeeded {
            return Err(CloudError::DeploymentFailed {
                name: deployment.name,
                state: status.state.to_string(),
                detail: status
                    .error
                    .unwrap_or_else(|| "no error detail returned".to_string()),
            });
        }

        let dcr = self
            .api
            .get_data_collection_rule(session, &settings.resource_group_name, &settings.dcr_name)
            .await?;
        if dcr.logs_ingestion_endpoint.is_none() {
            return Err(CloudError::DeploymentFailed {
                name: deployment.name,
                state: status.state.to_string(),
                detail: format!("rule {} has no logs ingestion endpoint", dcr.resource_id),
            });
        }

        self.record(
            steps,
            StepRecord::new(
                Step::DataCollectionRule,
                StepStatus::Deployed,
                format!("{} ({})", settings.dcr_name, dcr.immutable_id),
            ),
        );

        let streams = descriptor.streams().into_iter().map(str::to_string).collect();
        Ok((dcr, streams))
    }

    async fn wait_for_deployment(
        &self,
        session: &Session,
        resource_group: &str,
        name: &str,
        mut status: DeploymentStatus,
    ) -> Result<DeploymentStatus> {
        let deadline = tokio::time::Instant::now() + self.poll.timeout;

        while !status.state.is_terminal() {
            if tokio::time::Instant::now() >= deadline {
                return Err(CloudError::DeploymentFailed {
                    name: name.to_string(),
                    state: status.state.to_string(),
                    detail: format!(
                        "no terminal state after {}s",
                        self.poll.timeout.as_secs()
                    ),
                });
            }
            tracing::debug!(deployment = name, state = %status.state, "Waiting for deployment");
            tokio::time::sleep(self.poll.interval).await;
            status = self.api.get_deployment(session, resource_group, name).await?;
        }

        Ok(status)
    }

    /// Step 6: let the service principal publish to the rule
    async fn assign_role(
        &self,
        session: &Session,
        identity: &AppIdentity,
        dcr: &DataCollectionRule,
        steps: &mut Vec<StepRecord>,
    ) -> Result<RoleAssignment> {
        let role_definition_id = format!(
            "/subscriptions/{}/providers/Microsoft.Authorization/roleDefinitions/{}",
            session.subscription_id(),
            MONITORING_METRICS_PUBLISHER_ROLE_ID
        );
        let assignment = RoleAssignment::new(
            identity.service_principal_id.clone(),
            role_definition_id,
            dcr.resource_id.clone(),
        );

        let result = self.api.create_role_assignment(session, &assignment).await;
        let subject = format!("Monitoring Metrics Publisher ({})", assignment.name);
        let status = ROLE_ASSIGNMENT.settle(result, &subject)?;
        self.record(steps, StepRecord::new(Step::RoleAssignment, status, subject));

        Ok(assignment)
    }
}
