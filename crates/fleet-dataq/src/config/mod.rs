use std::env;
use std::fmt;
use std::net::{IpAddr, SocketAddr};
use std::str::FromStr;

use crate::workflows::dataq::TriageConfig;

/// Distinguishes runtime behavior for different stages of the service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppEnvironment {
    Development,
    Test,
    Production,
}

impl AppEnvironment {
    fn from_str(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "prod" | "production" => Self::Production,
            "test" | "ci" => Self::Test,
            _ => Self::Development,
        }
    }
}

/// Top-level configuration for the application.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub environment: AppEnvironment,
    pub server: ServerConfig,
    pub telemetry: TelemetryConfig,
    pub triage: TriageConfig,
}

impl AppConfig {
    pub fn load() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let environment = AppEnvironment::from_str(
            &env::var("APP_ENV").unwrap_or_else(|_| "development".to_string()),
        );

        let host = env::var("APP_HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
        let port = env::var("APP_PORT")
            .unwrap_or_else(|_| "3000".to_string())
            .parse::<u16>()
            .map_err(|_| ConfigError::InvalidPort)?;

        let log_level = env::var("APP_LOG_LEVEL").unwrap_or_else(|_| "info".to_string());

        Ok(Self {
            environment,
            server: ServerConfig { host, port },
            telemetry: TelemetryConfig { log_level },
            triage: load_triage()?,
        })
    }
}

fn override_from_env<T: FromStr>(key: &'static str, target: &mut T) -> Result<(), ConfigError> {
    if let Ok(raw) = env::var(key) {
        *target = raw
            .trim()
            .parse::<T>()
            .map_err(|_| ConfigError::Invalid { key })?;
    }
    Ok(())
}

/// Calibration defaults with `DATAQ_*` environment overrides applied.
fn load_triage() -> Result<TriageConfig, ConfigError> {
    let mut triage = TriageConfig::default();

    override_from_env("DATAQ_EASY_WIN_SCORE", &mut triage.easy_win_score)?;
    override_from_env(
        "DATAQ_WORTH_CHALLENGING_SCORE",
        &mut triage.worth_challenging_score,
    )?;
    override_from_env(
        "DATAQ_NOT_RECOMMENDED_FLOOR",
        &mut triage.not_recommended_floor,
    )?;
    override_from_env(
        "DATAQ_EXPIRY_WINDOW_MONTHS",
        &mut triage.expiry_window_months,
    )?;
    override_from_env("DATAQ_LOOKBACK_MONTHS", &mut triage.impact.lookback_months)?;
    override_from_env("DATAQ_URGENT_DAYS", &mut triage.urgent_days)?;
    override_from_env("DATAQ_SAVINGS_PER_POINT", &mut triage.roi.savings_per_point)?;
    override_from_env(
        "DATAQ_SCAN_COOLDOWN_HOURS",
        &mut triage.scan_cooldown_hours,
    )?;

    if triage.worth_challenging_score > triage.easy_win_score {
        return Err(ConfigError::Invalid {
            key: "DATAQ_WORTH_CHALLENGING_SCORE",
        });
    }
    if triage.impact.lookback_months == 0 {
        return Err(ConfigError::Invalid {
            key: "DATAQ_LOOKBACK_MONTHS",
        });
    }
    if !triage.roi.savings_per_point.is_finite() || triage.roi.savings_per_point < 0.0 {
        return Err(ConfigError::Invalid {
            key: "DATAQ_SAVINGS_PER_POINT",
        });
    }

    Ok(triage)
}

/// Settings controlling the HTTP server binding.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl ServerConfig {
    pub fn socket_addr(&self) -> Result<SocketAddr, ConfigError> {
        if self.host.eq_ignore_ascii_case("localhost") {
            return Ok(SocketAddr::new(IpAddr::from([127, 0, 0, 1]), self.port));
        }

        let ip: IpAddr = self
            .host
            .parse()
            .map_err(|source| ConfigError::InvalidHost { source })?;

        Ok(SocketAddr::new(ip, self.port))
    }
}

/// Tracing and metrics controls.
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    pub log_level: String,
}

#[derive(Debug)]
pub enum ConfigError {
    InvalidPort,
    InvalidHost { source: std::net::AddrParseError },
    Invalid { key: &'static str },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::InvalidPort => write!(f, "APP_PORT must be a valid u16"),
            ConfigError::InvalidHost { .. } => {
                write!(f, "APP_HOST must parse to an IPv4 or IPv6 address")
            }
            ConfigError::Invalid { key } => write!(f, "{key} has an invalid value"),
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::InvalidPort | ConfigError::Invalid { .. } => None,
            ConfigError::InvalidHost { source } => Some(source),
        }
    }
}
