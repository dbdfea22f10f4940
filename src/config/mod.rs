//! Configuration loading for the SQS monitor.
//!
//! Loads layered `.env` files and environment variables prefixed with
//! `SQS_MONITOR_`, producing a typed [`AppConfig`] that is built once at
//! process start and passed explicitly to every client constructor.

use std::{collections::BTreeMap, env, net::SocketAddr, path::PathBuf, time::Duration};

use serde::{Deserialize, Serialize};
use thiserror::Error;

const ENV_PREFIX: &str = "SQS_MONITOR_";

/// Upper bound the queue service accepts for a single receive call.
pub const MAX_BATCH_SIZE: u32 = 10;

/// Upper bound the queue service accepts for a long-poll wait.
pub const MAX_WAIT_TIME_SECONDS: u32 = 20;

/// Application configuration derived from `SQS_MONITOR_*` environment variables.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub struct AppConfig {
    #[serde(default = "default_profile")]
    pub profile: String,
    #[serde(default = "default_api_bind_addr")]
    pub api_bind_addr: String,
    #[serde(default = "default_log_level")]
    pub log_level: String,
    #[serde(default = "default_log_format")]
    pub log_format: String,
    #[serde(default = "default_database_url")]
    pub database_url: String,
    #[serde(default = "default_db_max_connections")]
    pub db_max_connections: u32,
    #[serde(default = "default_db_acquire_timeout_ms")]
    pub db_acquire_timeout_ms: u64,
    #[serde(default)]
    pub aws: AwsConfig,
    #[serde(default)]
    pub monitor: MonitorConfig,
    #[serde(default)]
    pub refresh: BatchSettings,
}

/// Region, credentials and endpoint shared by the queue and pub/sub clients.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub struct AwsConfig {
    #[serde(default = "default_aws_region")]
    pub region: String,
    /// Static access key; when absent the SDK default provider chain is used.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub access_key_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secret_access_key: Option<String>,
    /// Session token for temporary credentials.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_token: Option<String>,
    /// Endpoint override for local emulators.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub endpoint_url: Option<String>,
}

impl Default for AwsConfig {
    fn default() -> Self {
        Self {
            region: default_aws_region(),
            access_key_id: None,
            secret_access_key: None,
            session_token: None,
            endpoint_url: None,
        }
    }
}

impl AwsConfig {
    /// Returns both halves of the static credential pair when configured.
    pub fn static_credentials(&self) -> Option<(&str, &str)> {
        match (&self.access_key_id, &self.secret_access_key) {
            (Some(key), Some(secret)) => Some((key.as_str(), secret.as_str())),
            _ => None,
        }
    }

    /// Validate region and credential pairing.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.region.trim().is_empty() {
            return Err(ConfigError::MissingAwsRegion);
        }

        match (&self.access_key_id, &self.secret_access_key) {
            (Some(_), None) | (None, Some(_)) => {
                return Err(ConfigError::IncompleteAwsCredentials);
            }
            (None, None) if self.session_token.is_some() => {
                return Err(ConfigError::SessionTokenWithoutCredentials);
            }
            _ => {}
        }

        if let Some(endpoint) = &self.endpoint_url {
            url::Url::parse(endpoint).map_err(|source| ConfigError::InvalidEndpointUrl {
                value: endpoint.clone(),
                source,
            })?;
        }

        Ok(())
    }
}

/// Batch parameters for a single receive call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub struct BatchSettings {
    #[serde(default = "default_max_messages")]
    pub max_messages: u32,
    #[serde(default = "default_refresh_wait_time_seconds")]
    pub wait_time_seconds: u32,
}

impl Default for BatchSettings {
    fn default() -> Self {
        Self {
            max_messages: default_max_messages(),
            wait_time_seconds: default_refresh_wait_time_seconds(),
        }
    }
}

impl BatchSettings {
    pub fn new(max_messages: u32, wait_time_seconds: u32) -> Self {
        Self {
            max_messages,
            wait_time_seconds,
        }
    }

    /// Validate against the queue service's receive limits.
    pub fn validate(&self, scope: &'static str) -> Result<(), ConfigError> {
        if self.max_messages == 0 || self.max_messages > MAX_BATCH_SIZE {
            return Err(ConfigError::InvalidMaxMessages {
                scope,
                value: self.max_messages,
            });
        }

        if self.wait_time_seconds > MAX_WAIT_TIME_SECONDS {
            return Err(ConfigError::InvalidWaitTime {
                scope,
                value: self.wait_time_seconds,
            });
        }

        Ok(())
    }
}

/// Dedicated monitoring queue polled by the `fetch-monitor` command.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub struct MonitorConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub queue_url: Option<String>,
    #[serde(default = "default_monitor_batch")]
    pub batch: BatchSettings,
    /// Sleep between cycles in continuous mode.
    #[serde(default = "default_monitor_interval_seconds")]
    pub interval_seconds: u64,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            queue_url: None,
            batch: default_monitor_batch(),
            interval_seconds: default_monitor_interval_seconds(),
        }
    }
}

impl MonitorConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_seconds)
    }

    /// Validate monitor polling bounds. The queue URL itself is only required
    /// by the command that polls it.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.batch.validate("monitor")?;

        if self.interval_seconds == 0 {
            return Err(ConfigError::InvalidMonitorInterval {
                value: self.interval_seconds,
            });
        }

        if let Some(queue_url) = &self.queue_url
            && queue_url.trim().is_empty()
        {
            return Err(ConfigError::MissingMonitorQueueUrl);
        }

        Ok(())
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            profile: default_profile(),
            api_bind_addr: default_api_bind_addr(),
            log_level: default_log_level(),
            log_format: default_log_format(),
            database_url: default_database_url(),
            db_max_connections: default_db_max_connections(),
            db_acquire_timeout_ms: default_db_acquire_timeout_ms(),
            aws: AwsConfig::default(),
            monitor: MonitorConfig::default(),
            refresh: BatchSettings::default(),
        }
    }
}

impl AppConfig {
    /// Returns the configured bind address as a socket address.
    pub fn bind_addr(&self) -> Result<SocketAddr, std::net::AddrParseError> {
        self.api_bind_addr.parse()
    }

    /// Returns the monitoring queue endpoint or an error if it is not configured.
    pub fn monitor_queue_url(&self) -> Result<&str, ConfigError> {
        self.monitor
            .queue_url
            .as_deref()
            .filter(|url| !url.trim().is_empty())
            .ok_or(ConfigError::MissingMonitorQueueUrl)
    }

    /// Returns a redacted JSON representation (secrets are redacted).
    pub fn redacted_json(&self) -> serde_json::Result<String> {
        let mut config = self.clone();
        if config.aws.access_key_id.is_some() {
            config.aws.access_key_id = Some("[REDACTED]".to_string());
        }
        if config.aws.secret_access_key.is_some() {
            config.aws.secret_access_key = Some("[REDACTED]".to_string());
        }
        if config.aws.session_token.is_some() {
            config.aws.session_token = Some("[REDACTED]".to_string());
        }
        if let Ok(mut url) = url::Url::parse(&config.database_url)
            && url.password().is_some()
        {
            let _ = url.set_password(Some("[REDACTED]"));
            config.database_url = url.to_string();
        }
        serde_json::to_string_pretty(&config)
    }

    /// Validates the configuration, returning an error if required settings are missing.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.database_url.trim().is_empty() {
            return Err(ConfigError::MissingDatabaseUrl);
        }

        if self.db_max_connections == 0 {
            return Err(ConfigError::InvalidDbMaxConnections {
                value: self.db_max_connections,
            });
        }

        if !matches!(self.log_format.as_str(), "json" | "pretty") {
            return Err(ConfigError::InvalidLogFormat {
                value: self.log_format.clone(),
            });
        }

        self.aws.validate()?;
        self.monitor.validate()?;
        self.refresh.validate("refresh")?;

        Ok(())
    }
}

fn default_profile() -> String {
    "local".to_string()
}

fn default_api_bind_addr() -> String {
    "0.0.0.0:8080".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "json".to_string()
}

fn default_database_url() -> String {
    "sqlite://sqs_monitor.db?mode=rwc".to_string()
}

fn default_db_max_connections() -> u32 {
    10
}

fn default_db_acquire_timeout_ms() -> u64 {
    5000
}

fn default_aws_region() -> String {
    "us-east-1".to_string()
}

fn default_max_messages() -> u32 {
    10
}

fn default_refresh_wait_time_seconds() -> u32 {
    1
}

fn default_monitor_wait_time_seconds() -> u32 {
    5
}

fn default_monitor_batch() -> BatchSettings {
    BatchSettings {
        max_messages: default_max_messages(),
        wait_time_seconds: default_monitor_wait_time_seconds(),
    }
}

fn default_monitor_interval_seconds() -> u64 {
    5
}

/// Errors that can occur while loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read env file {path}: {source}")]
    EnvFile {
        path: PathBuf,
        #[source]
        source: dotenvy::Error,
    },
    #[error("invalid API bind address '{value}': {source}")]
    InvalidBindAddr {
        value: String,
        #[source]
        source: std::net::AddrParseError,
    },
    #[error("invalid value '{value}' for {key}")]
    InvalidNumber { key: &'static str, value: String },
    #[error("database URL must not be empty")]
    MissingDatabaseUrl,
    #[error("database max connections must be at least 1, got {value}")]
    InvalidDbMaxConnections { value: u32 },
    #[error("log format must be 'json' or 'pretty', got '{value}'")]
    InvalidLogFormat { value: String },
    #[error("AWS region must be configured")]
    MissingAwsRegion,
    #[error("AWS access key id and secret access key must be configured together")]
    IncompleteAwsCredentials,
    #[error("AWS session token requires an access key id and secret access key")]
    SessionTokenWithoutCredentials,
    #[error("invalid AWS endpoint URL '{value}': {source}")]
    InvalidEndpointUrl {
        value: String,
        #[source]
        source: url::ParseError,
    },
    #[error("monitor queue URL is not configured (set SQS_MONITOR_MONITOR_QUEUE_URL)")]
    MissingMonitorQueueUrl,
    #[error("{scope} max messages must be between 1 and 10, got {value}")]
    InvalidMaxMessages { scope: &'static str, value: u32 },
    #[error("{scope} wait time must be at most 20 seconds, got {value}")]
    InvalidWaitTime { scope: &'static str, value: u32 },
    #[error("monitor interval must be at least 1 second, got {value}")]
    InvalidMonitorInterval { value: u64 },
}

/// Loads configuration using layered `.env` files and `SQS_MONITOR_*` env vars.
pub struct ConfigLoader {
    base_dir: PathBuf,
}

impl ConfigLoader {
    /// Creates a new loader rooted at the current working directory.
    pub fn new() -> Self {
        Self {
            base_dir: env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
        }
    }

    /// Creates a loader rooted at the provided directory (useful for tests).
    pub fn with_base_dir(base_dir: PathBuf) -> Self {
        Self { base_dir }
    }

    /// Loads and validates configuration. Process environment wins over env files.
    pub fn load(&self) -> Result<AppConfig, ConfigError> {
        let (mut layered, profile_hint) = self.collect_layered_env()?;

        for (key, value) in env::vars() {
            if let Some(stripped) = key.strip_prefix(ENV_PREFIX) {
                layered.insert(stripped.to_string(), value);
            }
        }

        let profile = take_string(&mut layered, "PROFILE").unwrap_or(profile_hint);
        let api_bind_addr =
            take_string(&mut layered, "API_BIND_ADDR").unwrap_or_else(default_api_bind_addr);
        let log_level = take_string(&mut layered, "LOG_LEVEL").unwrap_or_else(default_log_level);
        let log_format =
            take_string(&mut layered, "LOG_FORMAT").unwrap_or_else(default_log_format);
        let database_url =
            take_string(&mut layered, "DATABASE_URL").unwrap_or_else(default_database_url);
        let db_max_connections = take_parsed(&mut layered, "DB_MAX_CONNECTIONS")?
            .unwrap_or_else(default_db_max_connections);
        let db_acquire_timeout_ms = take_parsed(&mut layered, "DB_ACQUIRE_TIMEOUT_MS")?
            .unwrap_or_else(default_db_acquire_timeout_ms);

        let aws = AwsConfig {
            region: take_string(&mut layered, "AWS_REGION").unwrap_or_else(default_aws_region),
            access_key_id: take_string(&mut layered, "AWS_ACCESS_KEY_ID"),
            secret_access_key: take_string(&mut layered, "AWS_SECRET_ACCESS_KEY"),
            session_token: take_string(&mut layered, "AWS_SESSION_TOKEN"),
            endpoint_url: take_string(&mut layered, "AWS_ENDPOINT_URL"),
        };

        let monitor = MonitorConfig {
            queue_url: take_string(&mut layered, "MONITOR_QUEUE_URL"),
            batch: BatchSettings {
                max_messages: take_parsed(&mut layered, "MONITOR_MAX_MESSAGES")?
                    .unwrap_or_else(default_max_messages),
                wait_time_seconds: take_parsed(&mut layered, "MONITOR_WAIT_TIME_SECONDS")?
                    .unwrap_or_else(default_monitor_wait_time_seconds),
            },
            interval_seconds: take_parsed(&mut layered, "MONITOR_INTERVAL_SECONDS")?
                .unwrap_or_else(default_monitor_interval_seconds),
        };

        let refresh = BatchSettings {
            max_messages: take_parsed(&mut layered, "REFRESH_MAX_MESSAGES")?
                .unwrap_or_else(default_max_messages),
            wait_time_seconds: take_parsed(&mut layered, "REFRESH_WAIT_TIME_SECONDS")?
                .unwrap_or_else(default_refresh_wait_time_seconds),
        };

        let config = AppConfig {
            profile,
            api_bind_addr,
            log_level,
            log_format,
            database_url,
            db_max_connections,
            db_acquire_timeout_ms,
            aws,
            monitor,
            refresh,
        };

        config.validate()?;

        match config.bind_addr() {
            Ok(_) => Ok(config),
            Err(source) => Err(ConfigError::InvalidBindAddr {
                value: config.api_bind_addr.clone(),
                source,
            }),
        }
    }

    fn collect_layered_env(&self) -> Result<(BTreeMap<String, String>, String), ConfigError> {
        let mut values = BTreeMap::new();

        self.merge_dotenv(self.base_dir.join(".env"), &mut values)?;
        self.merge_dotenv(self.base_dir.join(".env.local"), &mut values)?;

        let profile = env::var(format!("{ENV_PREFIX}PROFILE"))
            .ok()
            .or_else(|| values.get("PROFILE").cloned())
            .unwrap_or_else(default_profile);

        self.merge_dotenv(
            self.base_dir.join(format!(".env.{}", &profile)),
            &mut values,
        )?;
        self.merge_dotenv(
            self.base_dir.join(format!(".env.{}.local", &profile)),
            &mut values,
        )?;

        Ok((values, profile))
    }

    fn merge_dotenv(
        &self,
        path: PathBuf,
        values: &mut BTreeMap<String, String>,
    ) -> Result<(), ConfigError> {
        match dotenvy::from_path_iter(&path) {
            Ok(iter) => {
                for item in iter {
                    let (key, value) = item.map_err(|source| ConfigError::EnvFile {
                        path: path.clone(),
                        source,
                    })?;
                    if let Some(stripped) = key.strip_prefix(ENV_PREFIX) {
                        values.insert(stripped.to_string(), value);
                    }
                }
                Ok(())
            }
            Err(dotenvy::Error::Io(ref io_err))
                if io_err.kind() == std::io::ErrorKind::NotFound =>
            {
                Ok(())
            }
            Err(err) => Err(ConfigError::EnvFile { path, source: err }),
        }
    }
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

fn take_string(layered: &mut BTreeMap<String, String>, key: &str) -> Option<String> {
    layered
        .remove(key)
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

fn take_parsed<T: std::str::FromStr>(
    layered: &mut BTreeMap<String, String>,
    key: &'static str,
) -> Result<Option<T>, ConfigError> {
    match take_string(layered, key) {
        Some(value) => value
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::InvalidNumber { key, value }),
        None => Ok(None),
    }
}
