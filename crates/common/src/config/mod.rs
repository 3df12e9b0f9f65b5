//! Configuration management for SkuMap services
//!
//! Supports loading configuration from:
//! - Environment variables (prefixed with APP__)
//! - Configuration files (config.toml, config.yaml)
//! - Default values

use axum::http::HeaderName;
use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Main application configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AppConfig {
    /// Server configuration
    #[serde(default = "default_server")]
    pub server: ServerConfig,

    /// Database configuration
    pub database: DatabaseConfig,

    /// Authentication configuration
    #[serde(default = "default_auth")]
    pub auth: AuthConfig,

    /// Observability configuration
    #[serde(default = "default_observability")]
    pub observability: ObservabilityConfig,

    /// Rate limiting configuration
    #[serde(default = "default_rate_limit_config")]
    pub rate_limit: RateLimitConfig,

    /// SKU matching configuration
    #[serde(default = "default_matching")]
    pub matching: MatchingConfig,

    /// Import/export and listing limits
    #[serde(default = "default_interchange")]
    pub interchange: InterchangeConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    /// Host to bind to
    #[serde(default = "default_host")]
    pub host: String,

    /// Port to listen on
    #[serde(default = "default_port")]
    pub port: u16,

    /// Request timeout in seconds
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,

    /// Shutdown timeout in seconds
    #[serde(default = "default_shutdown_timeout")]
    pub shutdown_timeout_secs: u64,

    /// Maximum concurrent requests
    #[serde(default = "default_max_concurrent")]
    pub max_concurrent_requests: usize,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DatabaseConfig {
    /// Primary database URL (for writes)
    pub url: String,

    /// Read replica URL (optional, falls back to primary)
    pub read_url: Option<String>,

    /// Maximum number of connections
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,

    /// Minimum number of connections
    #[serde(default = "default_min_connections")]
    pub min_connections: u32,

    /// Connection timeout in seconds
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,

    /// Idle timeout in seconds
    #[serde(default = "default_idle_timeout")]
    pub idle_timeout_secs: u64,

    /// Create missing tables and indexes on startup
    #[serde(default)]
    pub auto_migrate: bool,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AuthConfig {
    /// JWT secret for token signing
    pub jwt_secret: Option<String>,

    /// JWT expiration in seconds
    #[serde(default = "default_jwt_expiration")]
    pub jwt_expiration_secs: u64,

    /// Request ID header name
    #[serde(default = "default_request_id_header")]
    pub request_id_header: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ObservabilityConfig {
    /// Log level or filter directive (debug, info, skumap_common=debug,...)
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Enable JSON logging
    #[serde(default = "default_json_logging")]
    pub json_logging: bool,

    /// Service name for tracing
    #[serde(default = "default_service_name")]
    pub service_name: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RateLimitConfig {
    /// Requests per second (global)
    #[serde(default = "default_rate_limit")]
    pub requests_per_second: u32,

    /// Burst capacity
    #[serde(default = "default_burst")]
    pub burst: u32,

    /// Enable rate limiting
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct MatchingConfig {
    /// Minimum similarity (exclusive) for a fuzzy candidate
    #[serde(default = "default_fuzzy_threshold")]
    pub fuzzy_threshold: f64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct InterchangeConfig {
    /// Largest accepted import upload
    #[serde(default = "default_max_upload_bytes")]
    pub max_upload_bytes: usize,

    /// Page size used when a listing request omits one
    #[serde(default = "default_page_size")]
    pub default_page_size: u64,

    /// Upper clamp for requested page sizes
    #[serde(default = "default_max_page_size")]
    pub max_page_size: u64,
}

// Default value functions
fn default_host() -> String { "0.0.0.0".to_string() }
fn default_port() -> u16 { 8080 }
fn default_request_timeout() -> u64 { 30 }
fn default_shutdown_timeout() -> u64 { 30 }
fn default_max_concurrent() -> usize { 100 }
fn default_max_connections() -> u32 { 20 }
fn default_min_connections() -> u32 { 2 }
fn default_connect_timeout() -> u64 { 10 }
fn default_idle_timeout() -> u64 { 300 }
fn default_jwt_expiration() -> u64 { 3600 }
fn default_request_id_header() -> String { "X-Request-ID".to_string() }
fn default_log_level() -> String { "info".to_string() }
fn default_json_logging() -> bool { true }
fn default_service_name() -> String { "skumap".to_string() }
fn default_rate_limit() -> u32 { 50 }
fn default_burst() -> u32 { 100 }
fn default_enabled() -> bool { true }
fn default_fuzzy_threshold() -> f64 { crate::matching::DEFAULT_FUZZY_THRESHOLD }
fn default_max_upload_bytes() -> usize { 10 * 1024 * 1024 }
fn default_page_size() -> u64 { 20 }
fn default_max_page_size() -> u64 { 100 }

fn default_server() -> ServerConfig {
    ServerConfig {
        host: default_host(),
        port: default_port(),
        request_timeout_secs: default_request_timeout(),
        shutdown_timeout_secs: default_shutdown_timeout(),
        max_concurrent_requests: default_max_concurrent(),
    }
}

fn default_auth() -> AuthConfig {
    AuthConfig {
        jwt_secret: None,
        jwt_expiration_secs: default_jwt_expiration(),
        request_id_header: default_request_id_header(),
    }
}

fn default_observability() -> ObservabilityConfig {
    ObservabilityConfig {
        log_level: default_log_level(),
        json_logging: default_json_logging(),
        service_name: default_service_name(),
    }
}

fn default_rate_limit_config() -> RateLimitConfig {
    RateLimitConfig {
        requests_per_second: default_rate_limit(),
        burst: default_burst(),
        enabled: default_enabled(),
    }
}

fn default_matching() -> MatchingConfig {
    MatchingConfig {
        fuzzy_threshold: default_fuzzy_threshold(),
    }
}

fn default_interchange() -> InterchangeConfig {
    InterchangeConfig {
        max_upload_bytes: default_max_upload_bytes(),
        default_page_size: default_page_size(),
        max_page_size: default_max_page_size(),
    }
}

impl AppConfig {
    /// Load configuration from environment and files
    pub fn load() -> Result<Self, ConfigError> {
        let env = std::env::var("APP_ENV").unwrap_or_else(|_| "development".to_string());

        let config = Config::builder()
            // Start with defaults
            .set_default("server.host", "0.0.0.0")?
            .set_default("server.port", 8080)?
            .set_default("database.url", "postgres://localhost/skumap")?

            // Load base config file
            .add_source(File::with_name("config/default").required(false))

            // Load environment-specific config
            .add_source(File::with_name(&format!("config/{}", env)).required(false))

            // Load local overrides
            .add_source(File::with_name("config/local").required(false))

            // Load from environment variables with APP__ prefix
            // e.g., APP__SERVER__PORT=8081
            .add_source(
                Environment::with_prefix("APP")
                    .separator("__")
                    .try_parsing(true)
            )

            .build()?;

        let config: Self = config.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Load from a specific TOML file
    pub fn from_file(path: &str) -> Result<Self, ConfigError> {
        let config = Config::builder()
            .add_source(File::with_name(path))
            .add_source(
                Environment::with_prefix("APP")
                    .separator("__")
                    .try_parsing(true)
            )
            .build()?;

        let config: Self = config.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values the services cannot run with
    pub fn validate(&self) -> Result<(), ConfigError> {
        let threshold = self.matching.fuzzy_threshold;
        if !(0.0..=1.0).contains(&threshold) {
            return Err(ConfigError::Message(format!(
                "matching.fuzzy_threshold must be within [0, 1], got {}",
                threshold
            )));
        }

        let limits = &self.interchange;
        if limits.default_page_size == 0 || limits.max_page_size == 0 {
            return Err(ConfigError::Message(
                "interchange page sizes must be positive".to_string(),
            ));
        }
        if limits.default_page_size > limits.max_page_size {
            return Err(ConfigError::Message(format!(
                "interchange.default_page_size ({}) exceeds max_page_size ({})",
                limits.default_page_size, limits.max_page_size
            )));
        }

        self.request_id_header()?;

        Ok(())
    }

    /// Header carrying the request id, set on requests and echoed on responses
    pub fn request_id_header(&self) -> Result<HeaderName, ConfigError> {
        HeaderName::from_bytes(self.auth.request_id_header.as_bytes()).map_err(|_| {
            ConfigError::Message(format!(
                "auth.request_id_header '{}' is not a valid header name",
                self.auth.request_id_header
            ))
        })
    }

    /// Get request timeout as Duration
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.server.request_timeout_secs)
    }

    /// Get shutdown timeout as Duration
    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_secs(self.server.shutdown_timeout_secs)
    }

    /// Get the read database URL (falls back to primary)
    pub fn read_database_url(&self) -> &str {
        self.database.read_url.as_deref().unwrap_or(&self.database.url)
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server: default_server(),
            database: DatabaseConfig {
                url: "postgres://localhost/skumap".to_string(),
                read_url: None,
                max_connections: default_max_connections(),
                min_connections: default_min_connections(),
                connect_timeout_secs: default_connect_timeout(),
                idle_timeout_secs: default_idle_timeout(),
                auto_migrate: false,
            },
            auth: default_auth(),
            observability: default_observability(),
            rate_limit: default_rate_limit_config(),
            matching: default_matching(),
            interchange: default_interchange(),
        }
    }
}
