//! Microsoft Graph calls (application registrations and service principals)

use crate::error::{AzureError, Result};
use crate::rest::RestClient;
use chrono::{DateTime, SecondsFormat, Utc};
use sentinel_connector_cloud::{Application, ClientSecret, ServicePrincipal, Session};
use serde::Deserialize;
use serde_json::{Value, json};

const GRAPH_VERSION: &str = "v1.0";

/// Quote a string literal for an OData `$filter`
pub fn odata_literal(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}

pub fn application_body(display_name: &str) -> Value {
    json!({
        "displayName": display_name,
        "signInAudience": "AzureADMyOrg",
    })
}

pub fn password_body(display_name: &str, expires_at: DateTime<Utc>) -> Value {
    json!({
        "passwordCredential": {
            "displayName": display_name,
            "endDateTime": expires_at.to_rfc3339_opts(SecondsFormat::Secs, true),
        }
    })
}

#[derive(Debug, Deserialize)]
struct GraphList<T> {
    value: Vec<T>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GraphApplication {
    id: String,
    app_id: String,
    display_name: String,
}

impl From<GraphApplication> for Application {
    fn from(app: GraphApplication) -> Self {
        Application {
            object_id: app.id,
            app_id: app.app_id,
            display_name: app.display_name,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GraphServicePrincipal {
    id: String,
    app_id: String,
}

impl From<GraphServicePrincipal> for ServicePrincipal {
    fn from(sp: GraphServicePrincipal) -> Self {
        ServicePrincipal {
            object_id: sp.id,
            app_id: sp.app_id,
        }
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct GraphPasswordCredential {
    key_id: String,
    secret_text: Option<String>,
    end_date_time: DateTime<Utc>,
}

#[derive(Clone)]
pub struct GraphClient {
    rest: RestClient,
}

impl GraphClient {
    pub fn new(rest: RestClient) -> Self {
        Self { rest }
    }

    fn url(session: &Session, path: &str) -> String {
        session.graph_url(&format!("/{}{}", GRAPH_VERSION, path))
    }

    pub async fn find_application(
        &self,
        session: &Session,
        display_name: &str,
    ) -> Result<Option<Application>> {
        let filter = format!("displayName eq {}", odata_literal(display_name));
        let list: GraphList<GraphApplication> = self
            .rest
            .get(
                &Self::url(session, "/applications"),
                token(session),
                &[("$filter", filter.as_str())],
            )
            .await?;

        if list.value.len() > 1 {
            tracing::warn!(
                display_name,
                count = list.value.len(),
                "Several applications share this display name; using the first"
            );
        }
        Ok(list.value.into_iter().next().map(Application::from))
    }

    pub async fn create_application(
        &self,
        session: &Session,
        display_name: &str,
    ) -> Result<Application> {
        let app: GraphApplication = self
            .rest
            .post(
                &Self::url(session, "/applications"),
                token(session),
                &application_body(display_name),
            )
            .await?;
        tracing::info!(app_id = %app.app_id, "Application registered");
        Ok(app.into())
    }

    pub async fn find_service_principal(
        &self,
        session: &Session,
        app_id: &str,
    ) -> Result<Option<ServicePrincipal>> {
        let filter = format!("appId eq {}", odata_literal(app_id));
        let list: GraphList<GraphServicePrincipal> = self
            .rest
            .get(
                &Self::url(session, "/servicePrincipals"),
                token(session),
                &[("$filter", filter.as_str())],
            )
            .await?;
        Ok(list.value.into_iter().next().map(ServicePrincipal::from))
    }

    pub async fn create_service_principal(
        &self,
        session: &Session,
        app_id: &str,
    ) -> Result<ServicePrincipal> {
        let sp: GraphServicePrincipal = self
            .rest
            .post(
                &Self::url(session, "/servicePrincipals"),
                token(session),
                &json!({ "appId": app_id }),
            )
            .await?;
        Ok(sp.into())
    }

    pub async fn add_password(
        &self,
        session: &Session,
        application: &Application,
        display_name: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<ClientSecret> {
        let path = format!("/applications/{}/addPassword", application.object_id);
        let credential: GraphPasswordCredential = self
            .rest
            .post(
                &Self::url(session, &path),
                token(session),
                &password_body(display_name, expires_at),
            )
            .await?;

        let value = credential.secret_text.ok_or_else(|| {
            AzureError::InvalidResponse("addPassword returned no secretText".to_string())
        })?;
        Ok(ClientSecret::new(
            credential.key_id,
            value,
            credential.end_date_time,
        ))
    }
}

fn token(session: &Session) -> &str {
    session.graph_token().secret()
}
