use std::env;
use std::fmt;
use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::time::Duration;

use crate::workflows::admission::{AccountFlagOrder, OwnerId};

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

/// Top-level configuration for the portal binaries.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub environment: AppEnvironment,
    pub server: ServerConfig,
    pub telemetry: TelemetryConfig,
    pub portal: PortalConfig,
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
            portal: PortalConfig::from_env()?,
        })
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

/// Where the REST collaborators live and how the workflows talk to them.
#[derive(Debug, Clone)]
pub struct PortalConfig {
    pub base_url: String,
    pub api_token: Option<String>,
    pub request_timeout: Duration,
    pub fallback_path: PathBuf,
    pub default_student_password: String,
    pub account_flag_order: AccountFlagOrder,
}

impl PortalConfig {
    fn from_env() -> Result<Self, ConfigError> {
        let base_url =
            env::var("PORTAL_BASE_URL").unwrap_or_else(|_| "http://127.0.0.1:3000".to_string());
        reqwest::Url::parse(&base_url).map_err(|_| ConfigError::InvalidBaseUrl {
            value: base_url.clone(),
        })?;

        let api_token = env::var("PORTAL_API_TOKEN")
            .ok()
            .map(|token| token.trim().to_string())
            .filter(|token| !token.is_empty());

        let timeout_secs = env::var("PORTAL_REQUEST_TIMEOUT_SECS")
            .unwrap_or_else(|_| "30".to_string())
            .parse::<u64>()
            .map_err(|_| ConfigError::InvalidTimeout)?;
        if timeout_secs == 0 {
            return Err(ConfigError::InvalidTimeout);
        }

        let fallback_path = env::var("PORTAL_FALLBACK_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from(".admission-fallback"));

        let default_student_password = env::var("PORTAL_DEFAULT_STUDENT_PASSWORD")
            .unwrap_or_else(|_| "Student@123".to_string());

        let raw_order =
            env::var("PORTAL_ACCOUNT_FLAG_ORDER").unwrap_or_else(|_| "eager".to_string());
        let account_flag_order = AccountFlagOrder::parse(&raw_order)
            .ok_or(ConfigError::InvalidFlagOrder { value: raw_order })?;

        Ok(Self {
            base_url,
            api_token,
            request_timeout: Duration::from_secs(timeout_secs),
            fallback_path,
            default_student_password,
            account_flag_order,
        })
    }

    /// Identity the configured token signs in as. The reference backend treats the token as
    /// the user id.
    pub fn owner(&self) -> Result<OwnerId, ConfigError> {
        self.api_token
            .clone()
            .map(OwnerId)
            .ok_or(ConfigError::MissingApiToken)
    }
}

#[derive(Debug)]
pub enum ConfigError {
    InvalidPort,
    InvalidHost { source: std::net::AddrParseError },
    InvalidBaseUrl { value: String },
    InvalidTimeout,
    InvalidFlagOrder { value: String },
    MissingApiToken,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::InvalidPort => write!(f, "APP_PORT must be a valid u16"),
            ConfigError::InvalidHost { .. } => {
                write!(f, "APP_HOST must parse to an IPv4 or IPv6 address")
            }
            ConfigError::InvalidBaseUrl { value } => {
                write!(f, "PORTAL_BASE_URL '{value}' is not an absolute URL")
            }
            ConfigError::InvalidTimeout => {
                write!(f, "PORTAL_REQUEST_TIMEOUT_SECS must be a positive integer")
            }
            ConfigError::InvalidFlagOrder { value } => write!(
                f,
                "PORTAL_ACCOUNT_FLAG_ORDER '{value}' must be 'eager' or 'two_phase'"
            ),
            ConfigError::MissingApiToken => {
                write!(f, "PORTAL_API_TOKEN must be set to act as a signed-in user")
            }
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::InvalidHost { source } => Some(source),
            _ => None,
        }
    }
}
