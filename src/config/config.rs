use std::time::Duration;

use figment::providers::{Env, Format, Yaml};
use figment::Figment;
use schemars::{schema_for, JsonSchema};
use serde::{Deserialize, Serialize};

use super::logging::LoggingConfig;
use super::storage::StorageConfig;
use crate::error::ConfigError;

/// A top-level enum for versioned configurations.
#[derive(Deserialize, Serialize, JsonSchema)]
#[serde(tag = "version")]
pub enum Config {
    #[serde(rename = "1.0.0")]
    ConfigV1(ConfigV1),
}

/// Main config for v1.0.0: backend API, token storage and logging.
#[derive(Deserialize, Serialize, Debug, Clone, JsonSchema)]
pub struct ConfigV1 {
    pub api: ApiConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Backend endpoints and time bounds.
#[derive(Deserialize, Serialize, Debug, Clone, JsonSchema)]
pub struct ApiConfig {
    pub base_url: String,
    #[serde(default = "default_request_timeout_in_ms")]
    pub request_timeout_in_ms: u64,
    /// Ceiling for the refresh call; must stay below the request timeout.
    #[serde(default = "default_refresh_timeout_in_ms")]
    pub refresh_timeout_in_ms: u64,
    #[serde(default = "default_refresh_path")]
    pub refresh_path: String,
    #[serde(default = "default_login_path")]
    pub login_path: String,
    #[serde(default = "default_register_path")]
    pub register_path: String,
}

fn default_request_timeout_in_ms() -> u64 {
    30_000
}

fn default_refresh_timeout_in_ms() -> u64 {
    10_000
}

fn default_refresh_path() -> String {
    "/auth/token/refresh/".to_string()
}

fn default_login_path() -> String {
    "/auth/token/".to_string()
}

fn default_register_path() -> String {
    "/auth/register/".to_string()
}

impl ApiConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_in_ms)
    }

    pub fn refresh_timeout(&self) -> Duration {
        Duration::from_millis(self.refresh_timeout_in_ms)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.base_url.trim().is_empty() {
            return Err(ConfigError::Invalid("api.base_url must not be empty".into()));
        }
        if self.refresh_timeout_in_ms == 0 {
            return Err(ConfigError::Invalid(
                "api.refresh_timeout_in_ms must be positive".into(),
            ));
        }
        if self.refresh_timeout_in_ms >= self.request_timeout_in_ms {
            return Err(ConfigError::Invalid(format!(
                "api.refresh_timeout_in_ms ({}) must be lower than api.request_timeout_in_ms ({})",
                self.refresh_timeout_in_ms, self.request_timeout_in_ms
            )));
        }
        Ok(())
    }
}

/// Extracts and validates a config from any figment (file, string, env...).
pub fn extract_config(figment: Figment) -> Result<ConfigV1, ConfigError> {
    let config = match figment.extract::<Config>()? {
        Config::ConfigV1(c) => c,
    };
    config.api.validate()?;
    Ok(config)
}

/// Load config from a YAML file, with `AUTHGATE_` environment overrides
/// (e.g. `AUTHGATE_API__BASE_URL`).
pub fn load_config(path: &str) -> Result<ConfigV1, ConfigError> {
    let figment = Figment::new()
        .merge(Yaml::file(path))
        .merge(Env::prefixed("AUTHGATE_").split("__"));
    extract_config(figment)
}

/// Print the JSON schema for the configuration to stdout.
pub fn print_schema() -> Result<(), serde_json::Error> {
    let schema = schema_for!(Config);
    println!("{}", serde_json::to_string_pretty(&schema)?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::StorageConfig;

    fn from_yaml(yaml: &str) -> Result<ConfigV1, ConfigError> {
        extract_config(Figment::new().merge(Yaml::string(yaml)))
    }

    #[test]
    fn test_minimal_config_gets_defaults() {
        let config = from_yaml(
            r#"
version: "1.0.0"
api:
  base_url: https://api.example.com/v1
"#,
        )
        .unwrap();

        assert_eq!(config.api.refresh_path, "/auth/token/refresh/");
        assert_eq!(config.api.login_path, "/auth/token/");
        assert_eq!(config.api.request_timeout(), Duration::from_secs(30));
        assert_eq!(config.api.refresh_timeout(), Duration::from_secs(10));
        assert!(matches!(config.storage, StorageConfig::File(_)));
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_memory_storage_and_logging() {
        let config = from_yaml(
            r#"
version: "1.0.0"
logging:
  level: debug
  format: json
api:
  base_url: http://localhost:8000
storage:
  type: memory
"#,
        )
        .unwrap();

        assert!(matches!(config.storage, StorageConfig::Memory));
        assert_eq!(config.logging.format, "json");
        assert_eq!(config.logging.service_name, "authgate");
    }

    #[test]
    fn test_refresh_timeout_must_be_shorter_than_request_timeout() {
        let err = from_yaml(
            r#"
version: "1.0.0"
api:
  base_url: http://localhost:8000
  request_timeout_in_ms: 5000
  refresh_timeout_in_ms: 5000
"#,
        )
        .unwrap_err();

        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn test_unknown_version_is_rejected() {
        let err = from_yaml(
            r#"
version: "0.9.0"
api:
  base_url: http://localhost:8000
"#,
        )
        .unwrap_err();

        assert!(matches!(err, ConfigError::Load(_)));
    }

    #[test]
    fn test_env_overrides_file_values() {
        figment::Jail::expect_with(|jail| {
            jail.create_file(
                "config.yaml",
                r#"
version: "1.0.0"
api:
  base_url: http://from-file
"#,
            )?;
            jail.set_env("AUTHGATE_API__BASE_URL", "http://from-env");

            let config = load_config("config.yaml").expect("config should load");
            assert_eq!(config.api.base_url, "http://from-env");
            Ok(())
        });
    }
}
