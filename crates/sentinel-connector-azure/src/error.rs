//! Azure provider error types

use sentinel_connector_cloud::CloudError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AzureError {
    #[error(
        "Azure CLI (az) not found. Please install: https://learn.microsoft.com/cli/azure/install-azure-cli"
    )]
    AzCliNotFound,

    #[error("az command failed: {0}")]
    CommandFailed(String),

    #[error("Not signed in: {0}")]
    NotSignedIn(String),

    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error (HTTP {status}): {message}")]
    Api {
        status: u16,
        code: Option<String>,
        message: String,
    },

    #[error("Unexpected response: {0}")]
    InvalidResponse(String),

    #[error("JSON parse error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Cloud error: {0}")]
    CloudError(#[from] CloudError),
}

pub type Result<T> = std::result::Result<T, AzureError>;

impl From<AzureError> for CloudError {
    fn from(err: AzureError) -> Self {
        match err {
            AzureError::AzCliNotFound => CloudError::Authentication {
                message: AzureError::AzCliNotFound.to_string(),
                hint: "install the Azure CLI, then: az cloud set --name AzureUSGovernment && az login"
                    .to_string(),
            },
            AzureError::NotSignedIn(message) => CloudError::authentication(message),
            AzureError::CommandFailed(message) => CloudError::CommandFailed(message),
            AzureError::Api {
                status: 401,
                message,
                ..
            } => CloudError::authentication(message),
            AzureError::Api {
                status,
                code,
                message,
            } => CloudError::Api {
                status,
                code,
                message,
            },
            AzureError::Http(e) => CloudError::Transport(e.to_string()),
            AzureError::InvalidResponse(message) => {
                CloudError::Transport(format!("unexpected response: {}", message))
            }
            AzureError::JsonError(e) => CloudError::Json(e),
            AzureError::IoError(e) => CloudError::Io(e),
            AzureError::CloudError(e) => e,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_api_error_keeps_status_and_code() {
        let err: CloudError = AzureError::Api {
            status: 409,
            code: Some("RoleAssignmentExists".into()),
            message: "exists".into(),
        }
        .into();

        assert_eq!(err.status(), Some(409));
        assert_eq!(err.code(), Some("RoleAssignmentExists"));
    }

    #[test]
    fn test_unauthorized_becomes_authentication() {
        let err: CloudError = AzureError::Api {
            status: 401,
            code: Some("InvalidAuthenticationToken".into()),
            message: "token expired".into(),
        }
        .into();

        assert!(matches!(err, CloudError::Authentication { .. }));
        assert!(err.to_string().contains("az login"));
    }

    #[test]
    fn test_missing_cli_has_install_hint() {
        let err: CloudError = AzureError::AzCliNotFound.into();
        match err {
            CloudError::Authentication { message, hint } => {
                assert!(message.contains("install-azure-cli"));
                assert!(hint.contains("AzureUSGovernment"));
            }
            other => panic!("expected Authentication, got {:?}", other),
        }
    }
}
