//! Authenticated session passed explicitly to every management call

use crate::error::{CloudError, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};

/// Azure cloud environments as named by `az cloud list`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloudEnvironment {
    /// Azure Government (GCC High)
    AzureUsGovernment,
    AzureCloud,
    AzureChinaCloud,
}

/// The only environment this tool provisions into
pub const TARGET_ENVIRONMENT: CloudEnvironment = CloudEnvironment::AzureUsGovernment;

impl CloudEnvironment {
    /// Name understood by `az cloud set --name`
    pub fn cli_name(&self) -> &'static str {
        match self {
            Self::AzureUsGovernment => "AzureUSGovernment",
            Self::AzureCloud => "AzureCloud",
            Self::AzureChinaCloud => "AzureChinaCloud",
        }
    }

    pub fn from_cli_name(name: &str) -> Option<Self> {
        [Self::AzureUsGovernment, Self::AzureCloud, Self::AzureChinaCloud]
            .into_iter()
            .find(|env| env.cli_name().eq_ignore_ascii_case(name.trim()))
    }

    /// Azure Resource Manager endpoint (also the token audience)
    pub fn resource_manager(&self) -> &'static str {
        match self {
            Self::AzureUsGovernment => "https://management.usgovcloudapi.net",
            Self::AzureCloud => "https://management.azure.com",
            Self::AzureChinaCloud => "https://management.chinacloudapi.cn",
        }
    }

    /// Microsoft Graph endpoint (also the token audience)
    pub fn graph(&self) -> &'static str {
        match self {
            Self::AzureUsGovernment => "https://graph.microsoft.us",
            Self::AzureCloud => "https://graph.microsoft.com",
            Self::AzureChinaCloud => "https://microsoftgraph.chinacloudapi.cn",
        }
    }

    pub fn login(&self) -> &'static str {
        match self {
            Self::AzureUsGovernment => "https://login.microsoftonline.us",
            Self::AzureCloud => "https://login.microsoftonline.com",
            Self::AzureChinaCloud => "https://login.chinacloudapi.cn",
        }
    }
}

impl std::fmt::Display for CloudEnvironment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.cli_name())
    }
}

/// Bearer token for one audience
#[derive(Clone)]
pub struct AccessToken {
    token: String,
    pub expires_on: Option<DateTime<Utc>>,
}

impl AccessToken {
    pub fn new(token: impl Into<String>, expires_on: Option<DateTime<Utc>>) -> Self {
        Self {
            token: token.into(),
            expires_on,
        }
    }

    pub fn secret(&self) -> &str {
        &self.token
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_on.is_some_and(|exp| exp <= now)
    }
}

impl std::fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AccessToken")
            .field("token", &"<redacted>")
            .field("expires_on", &self.expires_on)
            .finish()
    }
}

/// What the operator asked to sign in to
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionTarget {
    pub environment: CloudEnvironment,
    pub tenant_id: Option<String>,
    pub subscription_id: String,
}

impl SessionTarget {
    /// Target in Azure Government
    pub fn government(tenant_id: Option<String>, subscription_id: impl Into<String>) -> Self {
        Self {
            environment: TARGET_ENVIRONMENT,
            tenant_id,
            subscription_id: subscription_id.into(),
        }
    }
}

/// Authenticated context for one provisioning run
#[derive(Debug, Clone)]
pub struct Session {
    environment: CloudEnvironment,
    tenant_id: String,
    subscription_id: String,
    management_token: AccessToken,
    graph_token: AccessToken,
}

impl Session {
    /// Build a session, refusing one that belongs to another cloud or tenant
    pub fn new(
        target: &SessionTarget,
        active_environment: CloudEnvironment,
        tenant_id: impl Into<String>,
        management_token: AccessToken,
        graph_token: AccessToken,
    ) -> Result<Self> {
        if active_environment != target.environment {
            return Err(CloudError::WrongCloud {
                expected: target.environment.to_string(),
                actual: active_environment.to_string(),
            });
        }

        let tenant_id = tenant_id.into();
        if let Some(expected) = &target.tenant_id {
            if !expected.eq_ignore_ascii_case(&tenant_id) {
                return Err(CloudError::authentication(format!(
                    "signed in to tenant {}, but tenant {} is configured",
                    tenant_id, expected
                )));
            }
        }

        let now = Utc::now();
        if management_token.is_expired(now) || graph_token.is_expired(now) {
            return Err(CloudError::authentication("access token has already expired"));
        }

        Ok(Self {
            environment: active_environment,
            tenant_id,
            subscription_id: target.subscription_id.clone(),
            management_token,
            graph_token,
        })
    }

    pub fn environment(&self) -> CloudEnvironment {
        self.environment
    }

    pub fn tenant_id(&self) -> &str {
        &self.tenant_id
    }

    pub fn subscription_id(&self) -> &str {
        &self.subscription_id
    }

    pub fn management_token(&self) -> &AccessToken {
        &self.management_token
    }

    pub fn graph_token(&self) -> &AccessToken {
        &self.graph_token
    }

    /// Absolute ARM URL for a resource path such as `/subscriptions/...`
    pub fn arm_url(&self, path: &str) -> String {
        format!("{}{}", self.environment.resource_manager(), path)
    }

    /// Absolute Graph URL for a path such as `/v1.0/applications`
    pub fn graph_url(&self, path: &str) -> String {
        format!("{}{}", self.environment.graph(), path)
    }
}

/// Establishes sessions (the Azure CLI in production)
#[async_trait]
pub trait SessionProvider: Send + Sync {
    async fn establish(&self, target: &SessionTarget) -> Result<Session>;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn token() -> AccessToken {
        AccessToken::new("t", None)
    }

    #[test]
    fn test_from_cli_name() {
        assert_eq!(
            CloudEnvironment::from_cli_name("azureusgovernment"),
            Some(CloudEnvironment::AzureUsGovernment)
        );
        assert_eq!(
            CloudEnvironment::from_cli_name("AzureCloud"),
            Some(CloudEnvironment::AzureCloud)
        );
        assert_eq!(CloudEnvironment::from_cli_name("AzureGermanCloud"), None);
    }

    #[test]
    fn test_government_endpoints() {
        let env = CloudEnvironment::AzureUsGovernment;
        assert_eq!(env.resource_manager(), "https://management.usgovcloudapi.net");
        assert_eq!(env.graph(), "https://graph.microsoft.us");
    }

    #[test]
    fn test_session_rejects_wrong_cloud() {
        let target = SessionTarget::government(None, "S");
        let result = Session::new(&target, CloudEnvironment::AzureCloud, "T", token(), token());

        match result {
            Err(CloudError::WrongCloud { expected, actual }) => {
                assert_eq!(expected, "AzureUSGovernment");
                assert_eq!(actual, "AzureCloud");
            }
            other => panic!("expected WrongCloud, got {:?}", other),
        }
    }

    #[test]
    fn test_session_rejects_other_tenant() {
        let target = SessionTarget::government(Some("T1".into()), "S");
        let result = Session::new(&target, TARGET_ENVIRONMENT, "T2", token(), token());
        assert!(matches!(result, Err(CloudError::Authentication { .. })));
    }

    #[test]
    fn test_session_rejects_expired_token() {
        let target = SessionTarget::government(None, "S");
        let expired = AccessToken::new("t", Some(Utc::now() - chrono::Duration::minutes(1)));
        let result = Session::new(&target, TARGET_ENVIRONMENT, "T", expired, token());
        assert!(matches!(result, Err(CloudError::Authentication { .. })));
    }

    #[test]
    fn test_session_urls() {
        let target = SessionTarget::government(Some("t".into()), "S");
        let session = Session::new(&target, TARGET_ENVIRONMENT, "T", token(), token()).unwrap();

        assert_eq!(session.subscription_id(), "S");
        assert_eq!(
            session.arm_url("/subscriptions/S"),
            "https://management.usgovcloudapi.net/subscriptions/S"
        );
        assert_eq!(
            session.graph_url("/v1.0/applications"),
            "https://graph.microsoft.us/v1.0/applications"
        );
    }

    #[test]
    fn test_token_debug_is_redacted() {
        let token = AccessToken::new("super-secret", None);
        assert!(!format!("{:?}", token).contains("super-secret"));
    }
}
