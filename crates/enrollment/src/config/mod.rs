use std::env;
use std::fmt;
use std::net::{IpAddr, SocketAddr};

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
    pub allocation: AllocationConfig,
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

        let allocation = AllocationConfig {
            default_municipality_limit: positive_var(
                "APP_DEFAULT_MUNICIPALITY_LIMIT",
                AllocationConfig::DEFAULT_MUNICIPALITY_LIMIT,
            )
            .map_err(ConfigError::InvalidMunicipalityLimit)?,
            max_transaction_attempts: positive_var(
                "APP_TX_MAX_ATTEMPTS",
                AllocationConfig::DEFAULT_TRANSACTION_ATTEMPTS,
            )
            .map_err(ConfigError::InvalidTransactionAttempts)?,
        };

        Ok(Self {
            environment,
            server: ServerConfig { host, port },
            telemetry: TelemetryConfig { log_level },
            allocation,
        })
    }
}

fn positive_var(name: &str, default: u32) -> Result<u32, String> {
    match env::var(name) {
        Ok(raw) => match raw.trim().parse::<u32>() {
            Ok(value) if value > 0 => Ok(value),
            _ => Err(raw),
        },
        Err(_) => Ok(default),
    }
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

/// Capacity engine knobs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AllocationConfig {
    /// Class size given to municipality limits created on first registration.
    pub default_municipality_limit: u32,
    /// Attempts per admission before a serialization or conflict failure is surfaced.
    pub max_transaction_attempts: u32,
}

impl AllocationConfig {
    pub const DEFAULT_MUNICIPALITY_LIMIT: u32 = 20;
    pub const DEFAULT_TRANSACTION_ATTEMPTS: u32 = 3;
}

impl Default for AllocationConfig {
    fn default() -> Self {
        Self {
            default_municipality_limit: Self::DEFAULT_MUNICIPALITY_LIMIT,
            max_transaction_attempts: Self::DEFAULT_TRANSACTION_ATTEMPTS,
        }
    }
}

#[derive(Debug)]
pub enum ConfigError {
    InvalidPort,
    InvalidHost { source: std::net::AddrParseError },
    InvalidMunicipalityLimit(String),
    InvalidTransactionAttempts(String),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::InvalidPort => write!(f, "APP_PORT must be a valid u16"),
            ConfigError::InvalidHost { .. } => {
                write!(f, "APP_HOST must parse to an IPv4 or IPv6 address")
            }
            ConfigError::InvalidMunicipalityLimit(value) => write!(
                f,
                "APP_DEFAULT_MUNICIPALITY_LIMIT must be a positive integer, found '{}'",
                value
            ),
            ConfigError::InvalidTransactionAttempts(value) => write!(
                f,
                "APP_TX_MAX_ATTEMPTS must be a positive integer, found '{}'",
                value
            ),
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::InvalidHost { source } => Some(source),
            ConfigError::InvalidPort
            | ConfigError::InvalidMunicipalityLimit(_)
            | ConfigError::InvalidTransactionAttempts(_) => None,
        }
    }
}
