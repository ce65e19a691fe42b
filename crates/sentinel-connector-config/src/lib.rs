//! sentinel-connector configuration
//!
//! Reads the JSON settings document, completes it interactively when asked
//! to, validates it, and writes completed documents back so reruns need no
//! prompting.

pub mod document;
pub mod error;
pub mod prompt;
pub mod settings;

pub use document::{ConfigDocument, ConfigKey};
pub use error::*;
pub use prompt::{Prompter, complete};
pub use settings::{Settings, WorkspaceSettings, resolve};

use std::path::{Path, PathBuf};

/// Environment variable that points directly at a configuration file
pub const CONFIG_ENV_VAR: &str = "SENTINEL_CONNECTOR_CONFIG";

/// File name used when nothing else is found
pub const DEFAULT_CONFIG_FILE: &str = "sentinel-connector.json";

const CANDIDATES: [&str; 2] = ["sentinel-connector.local.json", DEFAULT_CONFIG_FILE];

/// How a missing configuration file is handled
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadMode {
    /// Missing file or keys are fatal
    Strict,
    /// Missing file or keys are prompted for, then saved
    Interactive,
}

/// Look for an existing configuration file
///
/// Search order:
/// 1. `SENTINEL_CONNECTOR_CONFIG`
/// 2. current directory: sentinel-connector.local.json, sentinel-connector.json
/// 3. ~/.config/sentinel-connector/config.json
pub fn find_config_file() -> Option<PathBuf> {
    if let Ok(config_path) = std::env::var(CONFIG_ENV_VAR) {
        let path = PathBuf::from(config_path);
        if path.exists() {
            return Some(path);
        }
    }

    if let Ok(current_dir) = std::env::current_dir() {
        for filename in &CANDIDATES {
            let path = current_dir.join(filename);
            if path.exists() {
                return Some(path);
            }
        }
    }

    dirs::config_dir()
        .map(|dir| dir.join("sentinel-connector").join("config.json"))
        .filter(|path| path.exists())
}

/// Path used when no file exists yet
pub fn default_config_path() -> Result<PathBuf> {
    Ok(std::env::current_dir()?.join(DEFAULT_CONFIG_FILE))
}

/// Read a document from disk; `None` if the file does not exist.
///
/// The flag is `true` when the file used the flat legacy layout.
pub fn read_document(path: &Path) -> Result<Option<(ConfigDocument, bool)>> {
    if !path.exists() {
        return Ok(None);
    }

    let content = std::fs::read_to_string(path)?;
    let parsed = ConfigDocument::from_json(&content).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(Some(parsed))
}

/// Write a document back, pretty-printed
pub fn save_document(path: &Path, doc: &ConfigDocument) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, doc.to_json_pretty()?)?;
    tracing::info!(path = %path.display(), "saved configuration");
    Ok(())
}

/// Load and validate without any interaction
pub fn load_strict(path: &Path) -> Result<Settings> {
    let (doc, _) = read_document(path)?.ok_or_else(|| ConfigError::NotFound(path.to_path_buf()))?;
    resolve(&doc)
}

/// Load, prompt for anything missing, persist if completed, then validate
pub fn load_interactive(path: &Path, prompter: &mut dyn Prompter) -> Result<Settings> {
    let (mut doc, mut dirty) = match read_document(path)? {
        Some((doc, legacy)) => (doc, legacy),
        None => {
            tracing::info!(path = %path.display(), "configuration not found, starting from defaults");
            (ConfigDocument::default(), true)
        }
    };

    dirty |= complete(&mut doc, prompter)?;
    let settings = resolve(&doc)?;

    if dirty {
        save_document(path, &doc)?;
    }
    Ok(settings)
}

/// Dispatch on `LoadMode`
pub fn load(path: &Path, mode: LoadMode, prompter: &mut dyn Prompter) -> Result<Settings> {
    match mode {
        LoadMode::Strict => load_strict(path),
        LoadMode::Interactive => load_interactive(path, prompter),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::prompt::tests::ScriptedPrompter;
    use serial_test::serial;
    use std::fs;

    const SECTIONED: &str = r#"{
        "Azure": { "SubscriptionId": "S", "ResourceGroupName": "RG" },
        "Workspace": { "Name": "W" }
    }"#;

    #[test]
    fn test_load_strict_missing_file() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("missing.json");

        let result = load_strict(&path);
        assert!(matches!(result, Err(ConfigError::NotFound(p)) if p == path));
    }

    #[test]
    fn test_load_strict_missing_required_key() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("config.json");
        fs::write(&path, r#"{ "Azure": { "SubscriptionId": "S" } }"#).unwrap();

        let result = load_strict(&path);
        assert!(matches!(
            result,
            Err(ConfigError::MissingRequired("Azure.ResourceGroupName"))
        ));
    }

    #[test]
    fn test_load_strict_malformed_document() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("config.json");
        fs::write(&path, "{ \"Azure\": ").unwrap();

        assert!(matches!(load_strict(&path), Err(ConfigError::Parse { .. })));
    }

    #[test]
    fn test_load_strict_does_not_rewrite_file() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("config.json");
        fs::write(&path, SECTIONED).unwrap();

        let settings = load_strict(&path).unwrap();
        assert_eq!(settings.workspace.name, "W");
        assert_eq!(fs::read_to_string(&path).unwrap(), SECTIONED);
    }

    #[test]
    fn test_load_interactive_creates_and_persists() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("nested").join("config.json");
        let mut prompter = ScriptedPrompter::new(&["T", "S", "RG", "", "W", "", "", ""]);

        let settings = load_interactive(&path, &mut prompter).unwrap();
        assert_eq!(settings.tenant_id.as_deref(), Some("T"));
        assert_eq!(settings.workspace.name, "W");

        // 保存されたファイルで再実行してもプロンプトは出ない
        let mut silent = ScriptedPrompter::new(&[]);
        let again = load_interactive(&path, &mut silent).unwrap();
        assert_eq!(again, settings);
        assert!(silent.asked.is_empty());

        let saved = fs::read_to_string(&path).unwrap();
        assert!(saved.contains("\"AppRegistration\""));
        assert!(saved.contains("\"DisplayName\": \"Obsidian-Sentinel-Connector\""));
    }

    #[test]
    fn test_load_interactive_normalizes_flat_document() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("config.json");
        fs::write(
            &path,
            r#"{
                "TenantId": "T",
                "SubscriptionId": "S",
                "ResourceGroupName": "RG",
                "WorkspaceName": "W",
                "Location": "usgovvirginia",
                "DcrName": "dcr",
                "AppDisplayName": "App"
            }"#,
        )
        .unwrap();
        let mut prompter = ScriptedPrompter::new(&[""]);

        let settings = load_interactive(&path, &mut prompter).unwrap();
        assert_eq!(settings.dcr_name, "dcr");

        let saved = fs::read_to_string(&path).unwrap();
        assert!(saved.contains("\"DataCollectionRule\""));
        assert!(!saved.contains("\"DcrName\""));
    }

    #[test]
    fn test_load_interactive_failure_leaves_no_file() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("config.json");
        let mut prompter = ScriptedPrompter::new(&[]);

        assert!(load_interactive(&path, &mut prompter).is_err());
        assert!(!path.exists());
    }

    #[test]
    #[serial]
    fn test_find_config_file_env_var() {
        let temp_dir = tempfile::tempdir().unwrap();
        let config_path = temp_dir.path().join("custom.json");
        fs::write(&config_path, SECTIONED).unwrap();

        unsafe {
            std::env::set_var(CONFIG_ENV_VAR, config_path.to_str().unwrap());
        }

        assert_eq!(find_config_file(), Some(config_path));

        unsafe {
            std::env::remove_var(CONFIG_ENV_VAR);
        }
    }

    #[test]
    #[serial]
    fn test_find_config_file_local_priority() {
        let temp_dir = tempfile::tempdir().unwrap();
        let original_dir = std::env::current_dir().unwrap();

        fs::write(temp_dir.path().join("sentinel-connector.json"), SECTIONED).unwrap();
        fs::write(temp_dir.path().join("sentinel-connector.local.json"), SECTIONED).unwrap();

        std::env::set_current_dir(&temp_dir).unwrap();
        let result = find_config_file();
        std::env::set_current_dir(original_dir).unwrap();

        assert!(result.unwrap().ends_with("sentinel-connector.local.json"));
    }
}
