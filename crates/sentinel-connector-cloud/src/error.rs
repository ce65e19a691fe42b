//! Provisioning error types

use thiserror::Error;

/// Errors surfaced by sessions, management calls and the provisioning pipeline
#[derive(Error, Debug)]
pub enum CloudError {
    #[error("Authentication failed: {message}\nHint: {hint}")]
    Authentication { message: String, hint: String },

    #[error(
        "Signed in to cloud '{actual}', but '{expected}' is required\n\
        Hint: az cloud set --name {expected} && az login"
    )]
    WrongCloud { expected: String, actual: String },

    #[error("Log Analytics workspace '{name}' not found in resource group '{resource_group}'")]
    WorkspaceNotFound {
        name: String,
        resource_group: String,
    },

    #[error("Resource already exists: {0}")]
    ResourceAlreadyExists(String),

    #[error("API error (HTTP {status}, {}): {message}", .code.as_deref().unwrap_or("no error code"))]
    Api {
        status: u16,
        code: Option<String>,
        message: String,
    },

    #[error("Request failed: {0}")]
    Transport(String),

    #[error("Deployment '{name}' finished in state {state}: {detail}")]
    DeploymentFailed {
        name: String,
        state: String,
        detail: String,
    },

    #[error("Invalid template: {0}")]
    InvalidTemplate(String),

    #[error("Command execution failed: {0}")]
    CommandFailed(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl CloudError {
    pub fn api(status: u16, code: Option<String>, message: impl Into<String>) -> Self {
        Self::Api {
            status,
            code,
            message: message.into(),
        }
    }

    /// Authentication failure with the standard government-cloud hint
    pub fn authentication(message: impl Into<String>) -> Self {
        Self::Authentication {
            message: message.into(),
            hint: "az cloud set --name AzureUSGovernment && az login".to_string(),
        }
    }

    /// HTTP status of an API error
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Api { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Provider error code of an API error (e.g. `RoleAssignmentExists`)
    pub fn code(&self) -> Option<&str> {
        match self {
            Self::Api { code, .. } => code.as_deref(),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, CloudError>;
