//! Configuration loader and validator for the instance sync service.
use reqwest::Url;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use thiserror::Error;

pub const DEFAULT_INTEGRATION: &str = "WHATSAPP-BAILEYS";
pub const DEFAULT_TIMEOUT_SECONDS: u64 = 60;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("YAML parse error: {0}")]
    Parse(#[from] serde_yaml::Error),
    #[error("Invalid configuration: {0}")]
    Invalid(&'static str),
}

/// Root configuration struct mirroring the YAML schema.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Config {
    pub app: App,
    pub gateway: Gateway,
}

/// App-level settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct App {
    pub data_dir: String,
    /// Identity every reconciliation is scoped to.
    pub user_id: String,
    pub sync_interval_ms: u64,
}

/// Evolution API connection settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Gateway {
    pub base_url: String,
    pub api_key: String,
    #[serde(default = "default_timeout_seconds")]
    pub timeout_seconds: u64,
    #[serde(default = "default_integration")]
    pub integration: String,
}

fn default_timeout_seconds() -> u64 {
    DEFAULT_TIMEOUT_SECONDS
}

fn default_integration() -> String {
    DEFAULT_INTEGRATION.to_string()
}

impl Config {
    /// Ensure required directories exist (creates `app.data_dir` if missing).
    pub fn ensure_dirs(&self) -> Result<(), std::io::Error> {
        if self.app.data_dir.trim().is_empty() {
            return Ok(());
        }
        fs::create_dir_all(self.resolved_data_dir())
    }

    /// `app.data_dir` with a leading `~/` expanded to `$HOME`.
    pub fn resolved_data_dir(&self) -> String {
        let dir = self.app.data_dir.trim();
        if let Some(rest) = dir.strip_prefix("~/") {
            if let Ok(home) = std::env::var("HOME") {
                return format!("{}/{}", home.trim_end_matches('/'), rest);
            }
        }
        dir.to_string()
    }

    /// `DATABASE_URL` if set, otherwise a SQLite file inside the data dir.
    pub fn database_url(&self) -> String {
        std::env::var("DATABASE_URL")
            .unwrap_or_else(|_| format!("sqlite://{}/evo-sync.db", self.resolved_data_dir()))
    }
}

/// Load configuration from a YAML file and validate it.
/// - If `path` is None, uses `config.yaml` in the current working directory.
pub fn load(path: Option<&Path>) -> Result<Config, ConfigError> {
    let path = path.unwrap_or_else(|| Path::new("config.yaml"));
    let content = fs::read_to_string(path)?;
    let cfg: Config = serde_yaml::from_str(&content)?;
    validate(&cfg)?;
    Ok(cfg)
}

/// Validate a configuration instance.
pub fn validate(cfg: &Config) -> Result<(), ConfigError> {
    if cfg.app.data_dir.trim().is_empty() {
        return Err(ConfigError::Invalid("app.data_dir must be non-empty"));
    }
    if cfg.app.user_id.trim().is_empty() {
        return Err(ConfigError::Invalid("app.user_id must be non-empty"));
    }
    if cfg.app.sync_interval_ms == 0 {
        return Err(ConfigError::Invalid("app.sync_interval_ms must be > 0"));
    }

    if cfg.gateway.base_url.trim().is_empty() {
        return Err(ConfigError::Invalid("gateway.base_url must be non-empty"));
    }
    if Url::parse(cfg.gateway.base_url.trim()).is_err() {
        return Err(ConfigError::Invalid("gateway.base_url must be a valid URL"));
    }
    if cfg.gateway.api_key.trim().is_empty() {
        return Err(ConfigError::Invalid("gateway.api_key must be non-empty"));
    }
    if cfg.gateway.timeout_seconds == 0 {
        return Err(ConfigError::Invalid("gateway.timeout_seconds must be > 0"));
    }
    if cfg.gateway.integration.trim().is_empty() {
        return Err(ConfigError::Invalid("gateway.integration must be non-empty"));
    }

    Ok(())
}

/// Returns the example YAML shipped with the service.
pub fn example() -> &'static str {
    r#"app:
  data_dir: "./data"
  user_id: "local-operator"
  sync_interval_ms: 60000

gateway:
  base_url: "https://evolution.example.com"
  api_key: "YOUR_EVOLUTION_API_KEY"
  timeout_seconds: 60
  integration: "WHATSAPP-BAILEYS"
"#
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn example_cfg() -> Config {
        serde_yaml::from_str(example()).unwrap()
    }

    #[test]
    fn parse_example_ok() {
        let cfg = example_cfg();
        validate(&cfg).unwrap();
        assert_eq!(cfg.gateway.timeout_seconds, 60);
        assert_eq!(cfg.gateway.integration, "WHATSAPP-BAILEYS");
    }

    #[test]
    fn gateway_defaults_apply_when_omitted() {
        let yaml = r#"app:
  data_dir: "./data"
  user_id: "u1"
  sync_interval_ms: 1000
gateway:
  base_url: "http://localhost:8080"
  api_key: "k"
"#;
        let cfg: Config = serde_yaml::from_str(yaml).unwrap();
        validate(&cfg).unwrap();
        assert_eq!(cfg.gateway.timeout_seconds, DEFAULT_TIMEOUT_SECONDS);
        assert_eq!(cfg.gateway.integration, DEFAULT_INTEGRATION);
    }

    #[test]
    fn invalid_app_fields() {
        let mut cfg = example_cfg();
        cfg.app.user_id = "  ".into();
        let err = validate(&cfg).unwrap_err();
        match err {
            ConfigError::Invalid(msg) => assert!(msg.contains("app.user_id")),
            _ => panic!("wrong error"),
        }

        let mut cfg = example_cfg();
        cfg.app.sync_interval_ms = 0;
        let err = validate(&cfg).unwrap_err();
        match err {
            ConfigError::Invalid(msg) => assert!(msg.contains("sync_interval_ms")),
            _ => panic!("wrong error"),
        }
    }

    #[test]
    fn invalid_gateway_fields() {
        let mut cfg = example_cfg();
        cfg.gateway.base_url = "not a url".into();
        let err = validate(&cfg).unwrap_err();
        match err {
            ConfigError::Invalid(msg) => assert!(msg.contains("valid URL")),
            _ => panic!("wrong error"),
        }

        let mut cfg = example_cfg();
        cfg.gateway.api_key = "".into();
        assert!(matches!(validate(&cfg), Err(ConfigError::Invalid(_))));

        let mut cfg = example_cfg();
        cfg.gateway.timeout_seconds = 0;
        assert!(matches!(validate(&cfg), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn ensure_dirs_creates_data_dir() {
        let td = tempdir().unwrap();
        let data_path = td.path().join("data");
        let mut cfg = example_cfg();
        cfg.app.data_dir = data_path.to_string_lossy().to_string();
        cfg.ensure_dirs().unwrap();
        assert!(data_path.exists());
    }

    #[test]
    fn load_from_file_ok() {
        let td = tempdir().unwrap();
        let p = td.path().join("config.yaml");
        fs::write(&p, example()).unwrap();
        let cfg = load(Some(&p)).unwrap();
        assert_eq!(cfg.app.user_id, "local-operator");
        assert_eq!(cfg.app.sync_interval_ms, 60000);
    }

    #[test]
    fn shipped_example_file_matches_builtin() {
        let cfg = load(Some(Path::new("config.example.yaml"))).unwrap();
        assert_eq!(cfg, example_cfg());
    }

    #[test]
    fn load_missing_file_is_io_error() {
        let td = tempdir().unwrap();
        let err = load(Some(&td.path().join("absent.yaml"))).unwrap_err();
        assert!(matches!(err, ConfigError::Io(_)));
    }
}
