//! Azure CLI wrapper
//!
//! Wraps the `az` commands needed to sign in to Azure Government and obtain
//! bearer tokens for ARM and Microsoft Graph.

use crate::error::{AzureError, Result};
use chrono::{DateTime, Local, NaiveDateTime, TimeZone, Utc};
use sentinel_connector_cloud::{AccessToken, CloudEnvironment};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use std::process::Stdio;
use tokio::process::Command;

pub const CLIENT_ID_ENV: &str = "AZURE_CLIENT_ID";
pub const CLIENT_SECRET_ENV: &str = "AZURE_CLIENT_SECRET";
pub const TENANT_ID_ENV: &str = "AZURE_TENANT_ID";

/// `az cloud show`
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AzCloud {
    pub name: String,
}

/// `az account show`
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AzAccount {
    /// Subscription id
    pub id: String,
    pub tenant_id: String,
    #[serde(default)]
    pub environment_name: Option<String>,
    /// Subscription display name
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub user: Option<AzUser>,
}

/// Signed-in user or service principal
#[derive(Debug, Clone, Deserialize)]
pub struct AzUser {
    pub name: String,
}

/// `az account get-access-token`
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AzAccessToken {
    pub access_token: String,
    /// Local time, `2024-01-01 12:00:00.000000`
    #[serde(default)]
    pub expires_on: Option<String>,
    /// Unix timestamp (newer CLI versions)
    #[serde(default, rename = "expires_on")]
    pub expires_on_unix: Option<i64>,
}

impl AzAccessToken {
    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        if let Some(ts) = self.expires_on_unix {
            return Utc.timestamp_opt(ts, 0).single();
        }
        let raw = self.expires_on.as_deref()?;
        NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S%.f")
            .ok()?
            .and_local_timezone(Local)
            .single()
            .map(|t| t.with_timezone(&Utc))
    }
}

impl From<AzAccessToken> for AccessToken {
    fn from(token: AzAccessToken) -> Self {
        let expires_on = token.expires_at();
        AccessToken::new(token.access_token, expires_on)
    }
}

/// How `az login` authenticates
#[derive(Clone, PartialEq, Eq)]
pub enum LoginMethod {
    /// Browser / device code sign-in
    Interactive,
    /// Non-interactive sign-in with a client secret
    ///
    /// `az login` only accepts the secret as a `--password` argument, so it is
    /// visible in the process table to other local users for the duration of
    /// the login call. Log output is redacted (`redact_args`). Use this only on
    /// single-user automation hosts; prefer interactive sign-in elsewhere.
    ServicePrincipal {
        client_id: String,
        client_secret: String,
        tenant_id: Option<String>,
    },
}

impl std::fmt::Debug for LoginMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Interactive => write!(f, "Interactive"),
            Self::ServicePrincipal {
                client_id,
                tenant_id,
                ..
            } => f
                .debug_struct("ServicePrincipal")
                .field("client_id", client_id)
                .field("tenant_id", tenant_id)
                .finish_non_exhaustive(),
        }
    }
}

impl LoginMethod {
    /// Service principal when `AZURE_CLIENT_ID` and `AZURE_CLIENT_SECRET` are set
    pub fn from_env() -> Self {
        Self::from_values(
            std::env::var(CLIENT_ID_ENV).ok(),
            std::env::var(CLIENT_SECRET_ENV).ok(),
            std::env::var(TENANT_ID_ENV).ok(),
        )
    }

    fn from_values(
        client_id: Option<String>,
        client_secret: Option<String>,
        tenant_id: Option<String>,
    ) -> Self {
        let non_empty = |v: Option<String>| v.filter(|s| !s.trim().is_empty());
        match (non_empty(client_id), non_empty(client_secret)) {
            (Some(client_id), Some(client_secret)) => Self::ServicePrincipal {
                client_id,
                client_secret,
                tenant_id: non_empty(tenant_id),
            },
            _ => Self::Interactive,
        }
    }
}

/// Azure CLI wrapper
pub struct AzCli {
    program: String,
}

impl Default for AzCli {
    fn default() -> Self {
        Self::new()
    }
}

impl AzCli {
    pub fn new() -> Self {
        Self {
            program: "az".to_string(),
        }
    }

    /// Check that the CLI is on PATH
    pub async fn ensure_installed(&self) -> Result<()> {
        let which = Command::new("which")
            .arg(&self.program)
            .output()
            .await?;

        if !which.status.success() {
            return Err(AzureError::AzCliNotFound);
        }
        Ok(())
    }

    /// Run an az command and return stdout
    async fn run_command(&self, args: &[&str]) -> Result<String> {
        let mut cmd = Command::new(&self.program);
        cmd.args(args);
        cmd.stdout(Stdio::piped());
        cmd.stderr(Stdio::piped());

        tracing::debug!("Running: {} {}", self.program, redact_args(args));

        let output = cmd.output().await.map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => AzureError::AzCliNotFound,
            _ => AzureError::IoError(e),
        })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(AzureError::CommandFailed(stderr.trim().to_string()));
        }

        Ok(String::from_utf8_lossy(&output.stdout).to_string())
    }

    /// Run an az command attached to the terminal (sign-in prompts)
    async fn run_attached(&self, args: &[&str]) -> Result<()> {
        tracing::debug!("Running: {} {}", self.program, redact_args(args));

        let status = Command::new(&self.program)
            .args(args)
            .stdin(Stdio::inherit())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit())
            .status()
            .await?;

        if !status.success() {
            return Err(AzureError::CommandFailed(format!(
                "{} {} exited with {}",
                self.program,
                args.first().copied().unwrap_or_default(),
                status
            )));
        }
        Ok(())
    }

    async fn run_json<T: DeserializeOwned>(&self, args: &[&str]) -> Result<T> {
        let output = self.run_command(args).await?;
        Ok(serde_json::from_str(&output)?)
    }

    /// Currently selected cloud
    pub async fn cloud_show(&self) -> Result<AzCloud> {
        self.run_json(&["cloud", "show", "--output", "json"]).await
    }

    pub async fn set_cloud(&self, environment: CloudEnvironment) -> Result<()> {
        self.run_command(&["cloud", "set", "--name", environment.cli_name()])
            .await?;
        Ok(())
    }

    /// Current login, or `None` when nobody is signed in
    pub async fn account_show(&self) -> Result<Option<AzAccount>> {
        match self.run_json(&["account", "show", "--output", "json"]).await {
            Ok(account) => Ok(Some(account)),
            Err(AzureError::CommandFailed(stderr)) if is_not_signed_in(&stderr) => Ok(None),
            Err(e) => Err(e),
        }
    }

    pub async fn login(&self, method: &LoginMethod, tenant_id: Option<&str>) -> Result<()> {
        match method {
            LoginMethod::Interactive => {
                let mut args = vec!["login", "--output", "none"];
                if let Some(tenant) = tenant_id {
                    args.push("--tenant");
                    args.push(tenant);
                }
                self.run_attached(&args).await?;
            }
            LoginMethod::ServicePrincipal {
                client_id,
                client_secret,
                tenant_id: sp_tenant,
            } => {
                let tenant = sp_tenant.as_deref().or(tenant_id).ok_or_else(|| {
                    AzureError::NotSignedIn(format!(
                        "service principal sign-in needs a tenant ({} or Azure.TenantId)",
                        TENANT_ID_ENV
                    ))
                })?;
                self.run_command(&service_principal_login_args(client_id, client_secret, tenant))
                    .await?;
            }
        }
        Ok(())
    }

    pub async fn set_subscription(&self, subscription_id: &str) -> Result<()> {
        self.run_command(&["account", "set", "--subscription", subscription_id])
            .await?;
        Ok(())
    }

    /// Bearer token for `resource` (the audience URL)
    pub async fn get_access_token(&self, resource: &str) -> Result<AzAccessToken> {
        self.run_json(&[
            "account",
            "get-access-token",
            "--resource",
            resource,
            "--output",
            "json",
        ])
        .await
    }
}

fn is_not_signed_in(stderr: &str) -> bool {
    let lower = stderr.to_ascii_lowercase();
    lower.contains("az login") || lower.contains("no subscription found")
}

/// Command line for logs, with password values masked
/// `az login` arguments for a service principal. The secret travels in argv.
fn service_principal_login_args<'a>(
    client_id: &'a str,
    client_secret: &'a str,
    tenant: &'a str,
) -> [&'a str; 10] {
    [
        "login",
        "--service-principal",
        "--username",
        client_id,
        "--password",
        client_secret,
        "--tenant",
        tenant,
        "--output",
        "none",
    ]
}

fn redact_args(args: &[&str]) -> String {
    let mut out = Vec::with_capacity(args.len());
    let mut mask_next = false;
    for arg in args {
        if mask_next {
            out.push("***");
            mask_next = false;
            continue;
        }
        mask_next = matches!(*arg, "--password" | "-p");
        out.push(*arg);
    }
    out.join(" ")
}
