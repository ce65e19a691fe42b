//! Session establishment through the Azure CLI

use crate::az::{AzAccount, AzCli, LoginMethod};
use crate::error::AzureError;
use async_trait::async_trait;
use sentinel_connector_cloud::{
    CloudEnvironment, CloudError, Result, Session, SessionProvider, SessionTarget,
};
use tracing::{info, warn};

/// What to do with the CLI's current login
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignInAction {
    /// Right cloud, right tenant: keep the existing login
    Reuse,
    /// Sign in on the already-selected cloud
    Login,
    /// Select the target cloud first, then sign in
    SwitchCloudAndLogin,
}

/// Decide how to reach the target from the CLI's current state.
/// A login on another cloud is never reused.
pub fn plan_sign_in(
    target: &SessionTarget,
    active_cloud: Option<CloudEnvironment>,
    account: Option<&AzAccount>,
) -> SignInAction {
    if active_cloud != Some(target.environment) {
        return SignInAction::SwitchCloudAndLogin;
    }
    let Some(account) = account else {
        return SignInAction::Login;
    };
    match &target.tenant_id {
        Some(tenant) if !tenant.eq_ignore_ascii_case(&account.tenant_id) => SignInAction::Login,
        _ => SignInAction::Reuse,
    }
}

/// `SessionProvider` backed by the `az` CLI
pub struct AzCliSessionProvider {
    az: AzCli,
    login: LoginMethod,
}

impl AzCliSessionProvider {
    pub fn new(az: AzCli, login: LoginMethod) -> Self {
        Self { az, login }
    }

    /// Default CLI; service principal sign-in when the environment provides one
    pub fn from_env() -> Self {
        Self::new(AzCli::new(), LoginMethod::from_env())
    }

    async fn active_cloud(&self) -> crate::error::Result<Option<CloudEnvironment>> {
        let cloud = self.az.cloud_show().await?;
        Ok(CloudEnvironment::from_cli_name(&cloud.name))
    }

    async fn sign_in(&self, target: &SessionTarget) -> crate::error::Result<AzAccount> {
        self.az.ensure_installed().await?;

        let active = self.active_cloud().await?;
        let account = self.az.account_show().await?;

        match plan_sign_in(target, active, account.as_ref()) {
            SignInAction::Reuse => {
                info!(cloud = %target.environment, "Reusing existing Azure CLI login");
            }
            SignInAction::Login => {
                info!(cloud = %target.environment, login = ?self.login, "Signing in");
                self.az.login(&self.login, target.tenant_id.as_deref()).await?;
            }
            SignInAction::SwitchCloudAndLogin => {
                warn!(
                    active = ?active,
                    target = %target.environment,
                    "Azure CLI is on another cloud; switching and signing in again"
                );
                self.az.set_cloud(target.environment).await?;
                self.az.login(&self.login, target.tenant_id.as_deref()).await?;
            }
        }

        self.az.set_subscription(&target.subscription_id).await?;
        self.az.account_show().await?.ok_or_else(|| {
            AzureError::NotSignedIn("az account show reports no login after sign-in".to_string())
        })
    }
}

#[async_trait]
impl SessionProvider for AzCliSessionProvider {
    async fn establish(&self, target: &SessionTarget) -> Result<Session> {
        let account = self.sign_in(target).await?;

        // Re-read: the session must reflect the cloud the CLI is actually on
        let active = self.active_cloud().await?.ok_or_else(|| CloudError::WrongCloud {
            expected: target.environment.to_string(),
            actual: account
                .environment_name
                .clone()
                .unwrap_or_else(|| "unknown".to_string()),
        })?;

        let management = self
            .az
            .get_access_token(target.environment.resource_manager())
            .await
            .map_err(CloudError::from)?;
        let graph = self
            .az
            .get_access_token(target.environment.graph())
            .await
            .map_err(CloudError::from)?;

        let user = account.user.map(|u| u.name).unwrap_or_default();
        let subscription_name = account.name.unwrap_or_default();
        let session = Session::new(
            target,
            active,
            account.tenant_id,
            management.into(),
            graph.into(),
        )?;
        info!(
            cloud = %session.environment(),
            tenant = session.tenant_id(),
            subscription = session.subscription_id(),
            subscription_name = %subscription_name,
            user = %user,
            "Session established"
        );
        Ok(session)
    }
}
