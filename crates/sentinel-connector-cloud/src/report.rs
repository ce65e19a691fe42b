//! Credential report handed to the vendor

use crate::api::ClientSecret;
use crate::error::Result;
use chrono::{DateTime, Utc};
use std::fmt::Write as _;
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;

const FILE_PREFIX: &str = "obsidian-sentinel-credentials";

/// Connection values for the Obsidian integration
///
/// `Debug` never prints the secret value; only `render()` does.
#[derive(Debug, Clone)]
pub struct CredentialReport {
    pub tenant_id: String,
    pub client_id: String,
    pub client_secret: ClientSecret,
    pub dcr_immutable_id: String,
    pub logs_ingestion_endpoint: String,
    pub streams: Vec<String>,
    pub dcr_resource_id: String,
    pub generated_at: DateTime<Utc>,
}

impl CredentialReport {
    /// Plain-text record, one `Label: value` per line
    pub fn render(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "Obsidian -> Microsoft Sentinel connector (Azure Government)");
        let _ = writeln!(out, "Generated: {}", self.generated_at.to_rfc3339());
        let _ = writeln!(out);
        let _ = writeln!(out, "Tenant ID:               {}", self.tenant_id);
        let _ = writeln!(out, "Client ID:               {}", self.client_id);
        let _ = writeln!(out, "Client Secret:           {}", self.client_secret.value());
        let _ = writeln!(
            out,
            "Client Secret Expires:   {}",
            self.client_secret.expires_at.format("%Y-%m-%d")
        );
        let _ = writeln!(out, "DCR Immutable ID:        {}", self.dcr_immutable_id);
        let _ = writeln!(out, "Logs Ingestion Endpoint: {}", self.logs_ingestion_endpoint);
        for stream in &self.streams {
            let _ = writeln!(out, "Stream Name:             {}", stream);
        }
        let _ = writeln!(out, "DCR Resource ID:         {}", self.dcr_resource_id);
        let _ = writeln!(out);
        let _ = writeln!(
            out,
            "The client secret cannot be retrieved again. Store it securely and delete this file."
        );
        out
    }

    /// `obsidian-sentinel-credentials-<YYYYMMDD-HHMMSS>.txt`
    pub fn file_name(&self) -> String {
        format!(
            "{}-{}.txt",
            FILE_PREFIX,
            self.generated_at.format("%Y%m%d-%H%M%S")
        )
    }

    /// Write the report into `dir`, readable by the owner only
    pub async fn persist(&self, dir: &Path) -> Result<PathBuf> {
        tokio::fs::create_dir_all(dir).await?;
        let path = dir.join(self.file_name());

        let mut options = tokio::fs::OpenOptions::new();
        options.write(true).create(true).truncate(true);
        #[cfg(unix)]
        options.mode(0o600);

        let mut file = options.open(&path).await?;
        file.write_all(self.render().as_bytes()).await?;
        file.flush().await?;

        tracing::info!(path = %path.display(), "Credential report written");
        Ok(path)
    }
}
