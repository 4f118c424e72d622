use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;
use tracing::Level;
use tug_core::SessionSettings;

/// A custom error type for configuration loading failures.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingVar(String),
    #[error("Invalid value for environment variable {0}: {1}")]
    InvalidValue(String, String),
}

/// Holds all configuration loaded from the environment at startup.
#[derive(Clone, Debug)]
pub struct Config {
    pub name: String,
    pub bind_address: SocketAddr,
    pub period: Duration,
    pub phrases_path: PathBuf,
    pub finish_line_thresh: f64,
    pub standing_thresh: f64,
    pub analyzer_url: String,
    pub attention_url: String,
    pub speech_status_url: String,
    pub rpc_timeout: Duration,
    pub log_level: Level,
}

fn required(var: &str) -> Result<String, ConfigError> {
    std::env::var(var).map_err(|_| ConfigError::MissingVar(var.to_string()))
}

fn parse_f64(var: &str, default: f64) -> Result<f64, ConfigError> {
    match std::env::var(var) {
        Ok(raw) => raw
            .trim()
            .parse::<f64>()
            .map_err(|e| ConfigError::InvalidValue(var.to_string(), e.to_string())),
        Err(_) => Ok(default),
    }
}

impl Config {
    /// Loads configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Only load from .env in non-test mode to avoid contamination
        if !cfg!(test) {
            dotenvy::dotenv().ok();
        }

        let name = std::env::var("MANAGER_NAME").unwrap_or_else(|_| "managerTUG".to_string());
        if name.is_empty() || name.contains('/') {
            return Err(ConfigError::InvalidValue(
                "MANAGER_NAME".to_string(),
                format!("'{}' is not a valid route segment", name),
            ));
        }

        let bind_address_str =
            std::env::var("BIND_ADDRESS").unwrap_or_else(|_| "0.0.0.0:3100".to_string());
        let bind_address = bind_address_str
            .parse::<SocketAddr>()
            .map_err(|e| ConfigError::InvalidValue("BIND_ADDRESS".to_string(), e.to_string()))?;

        let period_secs = parse_f64("TICK_PERIOD_SECS", 0.1)?;
        // Checked after conversion: tiny values round down to a zero period.
        let period = Duration::try_from_secs_f64(period_secs)
            .ok()
            .filter(|period| !period.is_zero())
            .ok_or_else(|| {
                ConfigError::InvalidValue(
                    "TICK_PERIOD_SECS".to_string(),
                    format!("{} must be a positive number of seconds", period_secs),
                )
            })?;

        let phrases_path = std::env::var("PHRASES_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("./phrases/speak-en.json"));

        let finish_line_thresh = parse_f64("FINISH_LINE_THRESH", 0.2)?;
        let standing_thresh = parse_f64("STANDING_THRESH", 0.3)?;

        let analyzer_url = required("ANALYZER_URL")?;
        let attention_url = required("ATTENTION_URL")?;
        let speech_status_url = required("SPEECH_STATUS_URL")?;

        let rpc_timeout_str = std::env::var("RPC_TIMEOUT_MS").unwrap_or_else(|_| "1000".to_string());
        let rpc_timeout = rpc_timeout_str
            .parse::<u64>()
            .map(Duration::from_millis)
            .map_err(|e| ConfigError::InvalidValue("RPC_TIMEOUT_MS".to_string(), e.to_string()))?;

        let log_level_str = std::env::var("RUST_LOG").unwrap_or_else(|_| "INFO".to_string());
        let log_level = log_level_str.parse::<Level>().map_err(|_| {
            ConfigError::InvalidValue(
                "RUST_LOG".to_string(),
                format!("'{}' is not a valid log level", log_level_str),
            )
        })?;

        Ok(Self {
            name,
            bind_address,
            period,
            phrases_path,
            finish_line_thresh,
            standing_thresh,
            analyzer_url,
            attention_url,
            speech_status_url,
            rpc_timeout,
            log_level,
        })
    }

    /// Assessment tunables derived from this configuration.
    pub fn session_settings(&self) -> SessionSettings {
        SessionSettings {
            period: self.period,
            finish_line_thresh: self.finish_line_thresh,
            standing_thresh: self.standing_thresh,
            ..Default::default()
        }
    }
}
