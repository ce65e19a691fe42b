//! Load configuration → establish session → provision → report

use crate::progress::ConsoleProgress;
use crate::prompt::StdioPrompter;
use anyhow::Context;
use colored::Colorize;
use sentinel_connector_azure::{AzCliSessionProvider, AzureManagementClient};
use sentinel_connector_cloud::{
    CredentialReport, Provisioner, SessionProvider, SessionTarget, TARGET_ENVIRONMENT,
};
use sentinel_connector_config::LoadMode;
use std::path::{Path, PathBuf};

pub struct ProvisionOptions {
    pub config_path: PathBuf,
    pub mode: LoadMode,
    pub output_dir: Option<PathBuf>,
}

pub async fn run(options: ProvisionOptions) -> anyhow::Result<()> {
    println!("{}", "Obsidian → Microsoft Sentinel connector".bold());
    println!(
        "{} {}",
        "Cloud:".dimmed(),
        TARGET_ENVIRONMENT.to_string().cyan()
    );
    println!(
        "{} {}",
        "Config:".dimmed(),
        options.config_path.display().to_string().cyan()
    );
    println!();

    // No network until the configuration is complete and valid
    let settings = sentinel_connector_config::load(
        &options.config_path,
        options.mode,
        &mut StdioPrompter,
    )?;
    tracing::debug!(?settings, "configuration resolved");

    let target = SessionTarget::government(
        settings.tenant_id.clone(),
        settings.subscription_id.clone(),
    );
    let session = AzCliSessionProvider::from_env()
        .establish(&target)
        .await
        .context("Could not establish an Azure Government session")?;

    let api = AzureManagementClient::new().context("Failed to create HTTP client")?;
    let progress = ConsoleProgress::new();
    let outcome = Provisioner::new(&api)
        .with_observer(&progress)
        .run(&session, &settings)
        .await?;

    progress.print_summary(outcome.summary());

    let report = outcome.credential_report();
    print_report(&report);

    let output_dir = options
        .output_dir
        .unwrap_or_else(|| report_dir_for(&options.config_path));
    match report.persist(&output_dir).await {
        Ok(path) => println!(
            "{} Credentials saved to {} (owner read/write only)",
            "✓".green().bold(),
            path.display().to_string().cyan()
        ),
        // The values are already on screen; losing the file is not fatal
        Err(e) => {
            tracing::warn!(dir = %output_dir.display(), error = %e, "could not save credential report");
            println!(
                "{} Could not save the credential report: {}",
                "⚠".yellow(),
                e
            );
        }
    }

    Ok(())
}

fn print_report(report: &CredentialReport) {
    println!();
    println!("{}", "Connection details for Obsidian".bold());
    println!("{}", "─".repeat(60).dimmed());
    print!("{}", report.render());
    println!("{}", "─".repeat(60).dimmed());
}

/// Directory holding the configuration file (current directory if none)
fn report_dir_for(config_path: &Path) -> PathBuf {
    config_path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("."))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_report_dir_for() {
        assert_eq!(
            report_dir_for(Path::new("/etc/connector/config.json")),
            PathBuf::from("/etc/connector")
        );
        assert_eq!(report_dir_for(Path::new("config.json")), PathBuf::from("."));
    }
}
