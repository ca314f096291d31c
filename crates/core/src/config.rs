use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    pub dispatch: DispatchConfig,
    pub notify: NotifyConfig,
    pub server: ServerConfig,
    pub logging: LoggingConfig,
}

#[derive(Clone, Debug)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub timeout_secs: u64,
}

/// Settings for the external AI responder endpoint.
#[derive(Clone, Debug)]
pub struct DispatchConfig {
    pub webhook_url: String,
    pub timeout_secs: u64,
    pub auth_token: Option<SecretString>,
}

/// Settings for the owner notification side-channel. An absent webhook URL
/// turns the dispatcher into a no-op.
#[derive(Clone, Debug)]
pub struct NotifyConfig {
    pub webhook_url: Option<String>,
    pub low_credit_threshold: i64,
}

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub bind_address: String,
    pub port: u16,
    pub health_check_port: u16,
    pub graceful_shutdown_secs: u64,
}

#[derive(Clone, Debug)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    Compact,
    Pretty,
    Json,
}

#[derive(Clone, Debug, Default)]
pub struct ConfigOverrides {
    pub database_url: Option<String>,
    pub log_level: Option<String>,
    pub dispatch_webhook_url: Option<String>,
    pub dispatch_timeout_secs: Option<u64>,
    pub notify_webhook_url: Option<String>,
    pub low_credit_threshold: Option<i64>,
    pub server_port: Option<u16>,
}

#[derive(Clone, Debug, Default)]
pub struct LoadOptions {
    pub config_path: Option<PathBuf>,
    pub require_file: bool,
    pub overrides: ConfigOverrides,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read config file `{path}`: {source}")]
    ReadFile { path: PathBuf, source: std::io::Error },
    #[error("could not parse config file `{path}`: {source}")]
    ParseFile { path: PathBuf, source: toml::de::Error },
    #[error("required config file was not found: `{0}`")]
    MissingConfigFile(PathBuf),
    #[error("invalid environment override for `{key}`: `{value}`")]
    InvalidEnvOverride { key: String, value: String },
    #[error("configuration validation failed: {0}")]
    Validation(String),
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database: DatabaseConfig {
                url: "sqlite://convey.db".to_string(),
                max_connections: 5,
                timeout_secs: 30,
            },
            dispatch: DispatchConfig {
                webhook_url: "http://localhost:5678/webhook/chat".to_string(),
                timeout_secs: 30,
                auth_token: None,
            },
            notify: NotifyConfig { webhook_url: None, low_credit_threshold: 10 },
            server: ServerConfig {
                bind_address: "127.0.0.1".to_string(),
                port: 8090,
                health_check_port: 8091,
                graceful_shutdown_secs: 15,
            },
            logging: LoggingConfig { level: "info".to_string(), format: LogFormat::Compact },
        }
    }
}

impl std::str::FromStr for LogFormat {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "compact" => Ok(Self::Compact),
            "pretty" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            other => Err(ConfigError::Validation(format!(
                "unsupported log format `{other}` (expected compact|pretty|json)"
            ))),
        }
    }
}

impl AppConfig {
    pub fn load(options: LoadOptions) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        let maybe_path = resolve_config_path(options.config_path.as_deref());

        if let Some(path) = maybe_path {
            let patch = read_patch(&path)?;
            config.apply_patch(patch);
        } else if options.require_file {
            let expected = options.config_path.unwrap_or_else(|| PathBuf::from("convey.toml"));
            return Err(ConfigError::MissingConfigFile(expected));
        }

        config.apply_env_overrides()?;
        config.apply_overrides(options.overrides);
        config.validate()?;

        Ok(config)
    }

    fn apply_patch(&mut self, patch: ConfigPatch) {
        if let Some(database) = patch.database {
            if let Some(url) = database.url {
                self.database.url = url;
            }
            if let Some(max_connections) = database.max_connections {
                self.database.max_connections = max_connections;
            }
            if let Some(timeout_secs) = database.timeout_secs {
                self.database.timeout_secs = timeout_secs;
            }
        }

        if let Some(dispatch) = patch.dispatch {
            if let Some(webhook_url) = dispatch.webhook_url {
                self.dispatch.webhook_url = webhook_url;
            }
            if let Some(timeout_secs) = dispatch.timeout_secs {
                self.dispatch.timeout_secs = timeout_secs;
            }
            if let Some(auth_token) = dispatch.auth_token {
                self.dispatch.auth_token = Some(auth_token.into());
            }
        }

        if let Some(notify) = patch.notify {
            if let Some(webhook_url) = notify.webhook_url {
                self.notify.webhook_url = Some(webhook_url);
            }
            if let Some(low_credit_threshold) = notify.low_credit_threshold {
                self.notify.low_credit_threshold = low_credit_threshold;
            }
        }

        if let Some(server) = patch.server {
            if let Some(bind_address) = server.bind_address {
                self.server.bind_address = bind_address;
            }
            if let Some(port) = server.port {
                self.server.port = port;
            }
            if let Some(health_check_port) = server.health_check_port {
                self.server.health_check_port = health_check_port;
            }
            if let Some(graceful_shutdown_secs) = server.graceful_shutdown_secs {
                self.server.graceful_shutdown_secs = graceful_shutdown_secs;
            }
        }

        if let Some(logging) = patch.logging {
            if let Some(level) = logging.level {
                self.logging.level = level;
            }
            if let Some(format) = logging.format {
                self.logging.format = format;
            }
        }
    }

    fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        if let Ok(url) = env::var("CONVEY_DATABASE_URL") {
            self.database.url = url;
        }
        if let Ok(url) = env::var("CONVEY_DISPATCH_WEBHOOK_URL") {
            self.dispatch.webhook_url = url;
        }
        if let Ok(value) = env::var("CONVEY_DISPATCH_TIMEOUT_SECS") {
            self.dispatch.timeout_secs = parse_env("CONVEY_DISPATCH_TIMEOUT_SECS", &value)?;
        }
        if let Ok(token) = env::var("CONVEY_DISPATCH_AUTH_TOKEN") {
            self.dispatch.auth_token = Some(token.into());
        }
        if let Ok(url) = env::var("CONVEY_NOTIFY_WEBHOOK_URL") {
            self.notify.webhook_url = Some(url);
        }
        if let Ok(value) = env::var("CONVEY_LOW_CREDIT_THRESHOLD") {
            self.notify.low_credit_threshold = parse_env("CONVEY_LOW_CREDIT_THRESHOLD", &value)?;
        }
        if let Ok(value) = env::var("CONVEY_SERVER_PORT") {
            self.server.port = parse_env("CONVEY_SERVER_PORT", &value)?;
        }
        if let Ok(level) = env::var("CONVEY_LOG_LEVEL") {
            self.logging.level = level;
        }
        if let Ok(value) = env::var("CONVEY_LOG_FORMAT") {
            self.logging.format = value.parse()?;
        }

        Ok(())
    }

    fn apply_overrides(&mut self, overrides: ConfigOverrides) {
        if let Some(url) = overrides.database_url {
            self.database.url = url;
        }
        if let Some(level) = overrides.log_level {
            self.logging.level = level;
        }
        if let Some(url) = overrides.dispatch_webhook_url {
            self.dispatch.webhook_url = url;
        }
        if let Some(timeout_secs) = overrides.dispatch_timeout_secs {
            self.dispatch.timeout_secs = timeout_secs;
        }
        if let Some(url) = overrides.notify_webhook_url {
            self.notify.webhook_url = Some(url);
        }
        if let Some(threshold) = overrides.low_credit_threshold {
            self.notify.low_credit_threshold = threshold;
        }
        if let Some(port) = overrides.server_port {
            self.server.port = port;
        }
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.database.url.trim().is_empty() {
            return Err(ConfigError::Validation("database.url must not be empty".to_string()));
        }
        if !self.dispatch.webhook_url.starts_with("http") {
            return Err(ConfigError::Validation(format!(
                "dispatch.webhook_url must be an http(s) URL, got `{}`",
                self.dispatch.webhook_url
            )));
        }
        if self.dispatch.timeout_secs == 0 {
            return Err(ConfigError::Validation(
                "dispatch.timeout_secs must be at least 1".to_string(),
            ));
        }
        if let Some(url) = &self.notify.webhook_url {
            if !url.starts_with("http") {
                return Err(ConfigError::Validation(format!(
                    "notify.webhook_url must be an http(s) URL, got `{url}`"
                )));
            }
        }
        if self.notify.low_credit_threshold < 0 {
            return Err(ConfigError::Validation(
                "notify.low_credit_threshold must not be negative".to_string(),
            ));
        }

        Ok(())
    }
}

fn parse_env<T: std::str::FromStr>(key: &str, value: &str) -> Result<T, ConfigError> {
    value.trim().parse().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn resolve_config_path(explicit: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit {
        return path.exists().then(|| path.to_path_buf());
    }

    let default = PathBuf::from("convey.toml");
    default.exists().then_some(default)
}

fn read_patch(path: &Path) -> Result<ConfigPatch, ConfigError> {
    let raw = fs::read_to_string(path)
        .map_err(|source| ConfigError::ReadFile { path: path.to_path_buf(), source })?;

    toml::from_str(&raw)
        .map_err(|source| ConfigError::ParseFile { path: path.to_path_buf(), source })
}

#[derive(Debug, Default, Deserialize)]
struct ConfigPatch {
    database: Option<DatabasePatch>,
    dispatch: Option<DispatchPatch>,
    notify: Option<NotifyPatch>,
    server: Option<ServerPatch>,
    logging: Option<LoggingPatch>,
}

#[derive(Debug, Default, Deserialize)]
struct DatabasePatch {
    url: Option<String>,
    max_connections: Option<u32>,
    timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct DispatchPatch {
    webhook_url: Option<String>,
    timeout_secs: Option<u64>,
    auth_token: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct NotifyPatch {
    webhook_url: Option<String>,
    low_credit_threshold: Option<i64>,
}

#[derive(Debug, Default, Deserialize)]
struct ServerPatch {
    bind_address: Option<String>,
    port: Option<u16>,
    health_check_port: Option<u16>,
    graceful_shutdown_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct LoggingPatch {
    level: Option<String>,
    format: Option<LogFormat>,
}

#[cfg(test)]
mod tests {
    use std::io::Write;
    use std::path::PathBuf;

    use super::{AppConfig, ConfigError, ConfigOverrides, LoadOptions, LogFormat};

    #[test]
    fn defaults_are_valid() {
        let config = AppConfig::load(LoadOptions::default()).expect("defaults should load");

        assert_eq!(config.database.url, "sqlite://convey.db");
        assert_eq!(config.dispatch.timeout_secs, 30);
        assert_eq!(config.notify.low_credit_threshold, 10);
        assert!(config.notify.webhook_url.is_none());
        assert_eq!(config.logging.format, LogFormat::Compact);
    }

    #[test]
    fn file_patch_overrides_defaults() {
        let mut file = tempfile::NamedTempFile::new().expect("temp file");
        writeln!(
            file,
            r#"
[database]
url = "sqlite::memory:"

[dispatch]
webhook_url = "https://hooks.example.com/chat"
timeout_secs = 5

[notify]
webhook_url = "https://hooks.example.com/owner"
low_credit_threshold = 3

[logging]
level = "debug"
format = "json"
"#
        )
        .expect("write config");

        let config = AppConfig::load(LoadOptions {
            config_path: Some(file.path().to_path_buf()),
            ..LoadOptions::default()
        })
        .expect("patched config should load");

        assert_eq!(config.database.url, "sqlite::memory:");
        assert_eq!(config.dispatch.webhook_url, "https://hooks.example.com/chat");
        assert_eq!(config.dispatch.timeout_secs, 5);
        assert_eq!(config.notify.webhook_url.as_deref(), Some("https://hooks.example.com/owner"));
        assert_eq!(config.notify.low_credit_threshold, 3);
        assert_eq!(config.logging.level, "debug");
        assert_eq!(config.logging.format, LogFormat::Json);
    }

    #[test]
    fn programmatic_overrides_win_over_file() {
        let mut file = tempfile::NamedTempFile::new().expect("temp file");
        writeln!(file, "[database]\nurl = \"sqlite://file.db\"").expect("write config");

        let config = AppConfig::load(LoadOptions {
            config_path: Some(file.path().to_path_buf()),
            overrides: ConfigOverrides {
                database_url: Some("sqlite::memory:".to_string()),
                dispatch_timeout_secs: Some(2),
                ..ConfigOverrides::default()
            },
            ..LoadOptions::default()
        })
        .expect("config should load");

        assert_eq!(config.database.url, "sqlite::memory:");
        assert_eq!(config.dispatch.timeout_secs, 2);
    }

    #[test]
    fn missing_required_file_fails() {
        let result = AppConfig::load(LoadOptions {
            config_path: Some(PathBuf::from("/nonexistent/convey.toml")),
            require_file: true,
            ..LoadOptions::default()
        });

        assert!(matches!(result, Err(ConfigError::MissingConfigFile(_))));
    }

    #[test]
    fn rejects_non_http_dispatch_url() {
        let result = AppConfig::load(LoadOptions {
            overrides: ConfigOverrides {
                dispatch_webhook_url: Some("ftp://hooks.example.com".to_string()),
                ..ConfigOverrides::default()
            },
            ..LoadOptions::default()
        });

        let error = result.expect_err("validation should fail");
        assert!(error.to_string().contains("dispatch.webhook_url"));
    }

    #[test]
    fn rejects_zero_dispatch_timeout() {
        let result = AppConfig::load(LoadOptions {
            overrides: ConfigOverrides {
                dispatch_timeout_secs: Some(0),
                ..ConfigOverrides::default()
            },
            ..LoadOptions::default()
        });

        let error = result.expect_err("validation should fail");
        assert!(error.to_string().contains("dispatch.timeout_secs"));
    }
}
