//! Bearer-authenticated JSON client shared by ARM and Graph

use crate::error::{AzureError, Result};
use reqwest::{Method, StatusCode};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::time::Duration;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);
const USER_AGENT: &str = concat!("sentinel-connector/", env!("CARGO_PKG_VERSION"));

#[derive(Clone)]
pub struct RestClient {
    client: reqwest::Client,
}

impl RestClient {
    pub fn new() -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .user_agent(USER_AGENT)
            .build()?;
        Ok(Self { client })
    }

    /// Send a request; non-2xx becomes `AzureError::Api`
    async fn send(
        &self,
        method: Method,
        url: &str,
        token: &str,
        query: &[(&str, &str)],
        body: Option<&Value>,
    ) -> Result<(StatusCode, String)> {
        tracing::debug!(%method, url, "Request");

        let mut request = self
            .client
            .request(method.clone(), url)
            .bearer_auth(token)
            .query(query);
        if let Some(body) = body {
            request = request.json(body);
        }

        let response = request.send().await?;
        let status = response.status();
        let text = response.text().await?;

        if !status.is_success() {
            return Err(parse_error(status.as_u16(), &text));
        }
        Ok((status, text))
    }

    pub async fn get<T: DeserializeOwned>(
        &self,
        url: &str,
        token: &str,
        query: &[(&str, &str)],
    ) -> Result<T> {
        let (_, text) = self.send(Method::GET, url, token, query, None).await?;
        decode(&text)
    }

    /// GET that maps 404 to `None`
    pub async fn get_optional<T: DeserializeOwned>(
        &self,
        url: &str,
        token: &str,
        query: &[(&str, &str)],
    ) -> Result<Option<T>> {
        match self.send(Method::GET, url, token, query, None).await {
            Ok((_, text)) => decode(&text).map(Some),
            Err(AzureError::Api { status: 404, .. }) => Ok(None),
            Err(e) => Err(e),
        }
    }

    pub async fn put<B: Serialize, T: DeserializeOwned>(
        &self,
        url: &str,
        token: &str,
        query: &[(&str, &str)],
        body: &B,
    ) -> Result<T> {
        let body = serde_json::to_value(body)?;
        let (_, text) = self
            .send(Method::PUT, url, token, query, Some(&body))
            .await?;
        decode(&text)
    }

    pub async fn post<B: Serialize, T: DeserializeOwned>(
        &self,
        url: &str,
        token: &str,
        body: &B,
    ) -> Result<T> {
        let body = serde_json::to_value(body)?;
        let (_, text) = self
            .send(Method::POST, url, token, &[], Some(&body))
            .await?;
        decode(&text)
    }
}

/// Empty bodies (202 Accepted) decode as JSON `null`
fn decode<T: DeserializeOwned>(text: &str) -> Result<T> {
    let text = if text.trim().is_empty() { "null" } else { text };
    serde_json::from_str(text).map_err(|e| {
        AzureError::InvalidResponse(format!("{} in body: {}", e, truncate(text, 200)))
    })
}

/// ARM and Graph both use `{"error": {"code": ..., "message": ...}}`
pub(crate) fn parse_error(status: u16, body: &str) -> AzureError {
    let parsed: Option<Value> = serde_json::from_str(body).ok();
    let error = parsed.as_ref().and_then(|v| v.get("error"));

    let code = error
        .and_then(|e| e.get("code"))
        .and_then(Value::as_str)
        .map(str::to_string);
    let message = error
        .and_then(|e| e.get("message"))
        .and_then(Value::as_str)
        .map(str::to_string)
        .unwrap_or_else(|| {
            if body.trim().is_empty() {
                StatusCode::from_u16(status)
                    .ok()
                    .and_then(|s| s.canonical_reason())
                    .unwrap_or("no response body")
                    .to_string()
            } else {
                truncate(body, 500)
            }
        });

    AzureError::Api {
        status,
        code,
        message,
    }
}

fn truncate(text: &str, max: usize) -> String {
    match text.char_indices().nth(max) {
        Some((idx, _)) => format!("{}…", &text[..idx]),
        None => text.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_arm_error() {
        let body = r#"{"error":{"code":"RoleAssignmentExists","message":"The role assignment already exists."}}"#;
        match parse_error(409, body) {
            AzureError::Api {
                status,
                code,
                message,
            } => {
                assert_eq!(status, 409);
                assert_eq!(code.as_deref(), Some("RoleAssignmentExists"));
                assert_eq!(message, "The role assignment already exists.");
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_parse_graph_error() {
        let body = r#"{"error":{"code":"Request_ResourceNotFound","message":"Resource does not exist.","innerError":{"date":"2026-01-01T00:00:00"}}}"#;
        let err = parse_error(404, body);
        assert!(matches!(
            err,
            AzureError::Api { status: 404, code: Some(ref c), .. } if c == "Request_ResourceNotFound"
        ));
    }

    #[test]
    fn test_parse_error_without_json() {
        match parse_error(502, "") {
            AzureError::Api { code, message, .. } => {
                assert!(code.is_none());
                assert_eq!(message, "Bad Gateway");
            }
            other => panic!("unexpected {:?}", other),
        }

        match parse_error(500, "<html>oops</html>") {
            AzureError::Api { message, .. } => assert_eq!(message, "<html>oops</html>"),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_decode_empty_body() {
        let value: Value = decode("").unwrap();
        assert!(value.is_null());
        assert!(decode::<Vec<String>>("{}").is_err());
    }
}
