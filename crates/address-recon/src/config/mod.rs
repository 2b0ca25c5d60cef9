use std::env;
use std::fmt;
use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_USPS_SERVER: &str = "http://production.shippingapis.com/ShippingAPI.dll";

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

/// Top-level configuration for the reconciliation service.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub environment: AppEnvironment,
    pub server: ServerConfig,
    pub telemetry: TelemetryConfig,
    pub verification: VerificationConfig,
    pub batch: BatchConfig,
}

impl AppConfig {
    pub fn load() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let environment = AppEnvironment::from_str(
            &env::var("RECON_ENV").unwrap_or_else(|_| "development".to_string()),
        );

        let host = env::var("RECON_HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
        let port = env::var("RECON_PORT")
            .unwrap_or_else(|_| "5000".to_string())
            .parse::<u16>()
            .map_err(|_| ConfigError::InvalidPort)?;

        let log_level = env::var("RECON_LOG_LEVEL").unwrap_or_else(|_| "info".to_string());

        let verification = VerificationConfig {
            server: env::var("USPS_SERVER").unwrap_or_else(|_| DEFAULT_USPS_SERVER.to_string()),
            user_id: env::var("USPS_USER_ID")
                .ok()
                .filter(|value| !value.trim().is_empty()),
            timeout: Duration::from_millis(millis("USPS_TIMEOUT_MS", 10_000)?),
        };

        let batch = BatchConfig {
            source_path: path("RECON_SOURCE_PATH", "data/address_summary.csv"),
            output_path: path("RECON_OUTPUT_PATH", "data/address_validation.csv"),
            checkpoint_path: path("RECON_CHECKPOINT_PATH", "data/checked_log.json"),
            min_interval: Duration::from_millis(millis("RECON_MIN_INTERVAL_MS", 1)?),
        };

        Ok(Self {
            environment,
            server: ServerConfig { host, port },
            telemetry: TelemetryConfig { log_level },
            verification,
            batch,
        })
    }
}

fn millis(variable: &'static str, default: u64) -> Result<u64, ConfigError> {
    match env::var(variable) {
        Ok(raw) => raw
            .trim()
            .parse::<u64>()
            .map_err(|_| ConfigError::InvalidDuration { variable }),
        Err(_) => Ok(default),
    }
}

fn path(variable: &str, default: &str) -> PathBuf {
    env::var(variable)
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from(default))
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

/// Tracing controls.
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    pub log_level: String,
}

/// USPS Web Tools endpoint and credentials.
#[derive(Debug, Clone)]
pub struct VerificationConfig {
    pub server: String,
    pub user_id: Option<String>,
    pub timeout: Duration,
}

impl VerificationConfig {
    pub fn require_user_id(&self) -> Result<&str, ConfigError> {
        self.user_id.as_deref().ok_or(ConfigError::MissingUserId)
    }
}

/// File locations and pacing for batch runs.
#[derive(Debug, Clone)]
pub struct BatchConfig {
    pub source_path: PathBuf,
    pub output_path: PathBuf,
    pub checkpoint_path: PathBuf,
    pub min_interval: Duration,
}

#[derive(Debug)]
pub enum ConfigError {
    InvalidPort,
    InvalidHost { source: std::net::AddrParseError },
    InvalidDuration { variable: &'static str },
    MissingUserId,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::InvalidPort => write!(f, "RECON_PORT must be a valid u16"),
            ConfigError::InvalidHost { .. } => {
                write!(f, "RECON_HOST must parse to an IPv4 or IPv6 address")
            }
            ConfigError::InvalidDuration { variable } => {
                write!(f, "{variable} must be a whole number of milliseconds")
            }
            ConfigError::MissingUserId => {
                write!(f, "USPS_USER_ID is required to reach the verification service")
            }
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::InvalidHost { source } => Some(source),
            ConfigError::InvalidPort
            | ConfigError::InvalidDuration { .. }
            | ConfigError::MissingUserId => None,
        }
    }
}
