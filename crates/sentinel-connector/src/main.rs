mod progress;
mod prompt;
mod provision;

use clap::Parser;
use colored::Colorize;
use sentinel_connector_config::{CONFIG_ENV_VAR, LoadMode};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "sentinel-connector")]
#[command(version)]
#[command(
    about = "Provision the Obsidian → Microsoft Sentinel connector in Azure Government (GCC High)",
    long_about = None
)]
struct Cli {
    /// Configuration file (JSON). Default: $SENTINEL_CONNECTOR_CONFIG, then ./sentinel-connector.json
    config: Option<PathBuf>,

    /// Configuration file (-c/--config flag)
    #[arg(short = 'c', long = "config", conflicts_with = "config", hide = true)]
    config_flag: Option<PathBuf>,

    /// Fail instead of prompting when the file or a required setting is missing
    #[arg(long)]
    non_interactive: bool,

    /// Where to write the credential report (default: next to the configuration file)
    #[arg(short, long)]
    output_dir: Option<PathBuf>,
}

impl Cli {
    fn config_path(&self) -> anyhow::Result<PathBuf> {
        if let Some(path) = self.config.as_ref().or(self.config_flag.as_ref()) {
            return Ok(path.clone());
        }
        // 環境変数のパスはまだ存在しなくても採用する (対話モードで作成される)
        if let Some(path) = std::env::var_os(CONFIG_ENV_VAR).filter(|p| !p.is_empty()) {
            return Ok(PathBuf::from(path));
        }
        match sentinel_connector_config::find_config_file() {
            Some(path) => Ok(path),
            None => Ok(sentinel_connector_config::default_config_path()?),
        }
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // stdout はレポート表示に使うので、ログは stderr に出力
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    if let Err(e) = run(cli).await {
        eprintln!("{} {:#}", "✗".red().bold(), e);
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let options = provision::ProvisionOptions {
        config_path: cli.config_path()?,
        mode: if cli.non_interactive {
            LoadMode::Strict
        } else {
            LoadMode::Interactive
        },
        output_dir: cli.output_dir,
    };
    provision::run(options).await
}
