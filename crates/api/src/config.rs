//! # API Configuration Module
//!
//! Configuration for the SlotSync server, read from environment variables
//! with defaults where one makes sense.
//!
//! ## Environment Variables
//!
//! - `API_HOST`: The host address to bind the server to (default: "0.0.0.0")
//! - `API_PORT`: The port to listen on (default: 3000)
//! - `BACKEND_URL`: Base URL of the booking and messaging backend (required)
//! - `BACKEND_TOKEN`: Bearer token sent to the backend
//! - `LOG_LEVEL`: Logging level (default: "info")
//! - `API_CORS_ORIGINS`: Comma-separated list of allowed CORS origins
//! - `API_REQUEST_TIMEOUT_SECONDS`: Request timeout (default: 30)
//! - `TYPING_TIMEOUT_MS`: Silence before a typing peer is cleared (default: 1800)
//! - `HISTORY_PAGE_SIZE`: Messages per history page (default: 50)

use eyre::{Result, WrapErr};
use slotsync_sync::context::SessionSettings;
use std::{env, str::FromStr, time::Duration};
use tracing::Level;

/// Configuration for the SlotSync API server
///
/// # Example
///
/// ```no_run
/// use eyre::Result;
/// use slotsync_api::config::ApiConfig;
///
/// fn example() -> Result<()> {
///     let config = ApiConfig::from_env()?;
///     println!("Starting server on {}", config.server_addr());
///     Ok(())
/// }
/// ```
#[derive(Debug, Clone)]
pub struct ApiConfig {
    /// Host address for the API server (e.g., "127.0.0.1", "0.0.0.0")
    pub host: String,

    /// Port for the API server to listen on
    pub port: u16,

    /// Base URL of the backend that owns appointments and messages
    pub backend_url: String,

    /// Bearer token for the backend (optional)
    pub backend_token: Option<String>,

    /// Log level for the application
    pub log_level: Level,

    /// CORS allowed origins (optional)
    pub cors_origins: Option<Vec<String>>,

    /// Request timeout in seconds
    pub request_timeout: u64,

    /// Tunables handed to every slot view and conversation
    pub session: SessionSettings,
}

impl ApiConfig {
    /// Creates a new ApiConfig from environment variables
    ///
    /// # Errors
    ///
    /// This function will return an error if:
    /// - The BACKEND_URL environment variable is not set
    /// - API_PORT, API_REQUEST_TIMEOUT_SECONDS, TYPING_TIMEOUT_MS or
    ///   HISTORY_PAGE_SIZE is set but cannot be parsed
    pub fn from_env() -> Result<Self> {
        // Network settings
        let host = env::var("API_HOST").unwrap_or_else(|_| "0.0.0.0".to_string());
        let port = parse_var("API_PORT", env::var("API_PORT").ok(), 3000)?;

        // Backend settings
        let backend_url =
            env::var("BACKEND_URL").wrap_err("BACKEND_URL environment variable must be set")?;
        let backend_token = env::var("BACKEND_TOKEN").ok().filter(|t| !t.is_empty());

        let log_level = parse_level(&env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()));

        // CORS settings
        let cors_origins = env::var("API_CORS_ORIGINS")
            .ok()
            .map(|origins| origins.split(',').map(|s| s.trim().to_string()).collect());

        let request_timeout = parse_var(
            "API_REQUEST_TIMEOUT_SECONDS",
            env::var("API_REQUEST_TIMEOUT_SECONDS").ok(),
            30,
        )?;

        // Session settings
        let defaults = SessionSettings::default();
        let typing_timeout = Duration::from_millis(parse_var(
            "TYPING_TIMEOUT_MS",
            env::var("TYPING_TIMEOUT_MS").ok(),
            defaults.typing_timeout.as_millis() as u64,
        )?);
        let history_page_size = parse_var(
            "HISTORY_PAGE_SIZE",
            env::var("HISTORY_PAGE_SIZE").ok(),
            defaults.history_page_size,
        )?;

        Ok(Self {
            host,
            port,
            backend_url,
            backend_token,
            log_level,
            cors_origins,
            request_timeout,
            session: SessionSettings {
                typing_timeout,
                history_page_size,
            },
        })
    }

    /// Returns the server address as a string (e.g., "127.0.0.1:8080")
    pub fn server_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Parse an optional variable, falling back to `default` only when it is unset.
fn parse_var<T>(name: &str, raw: Option<String>, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match raw {
        Some(raw) => raw
            .trim()
            .parse()
            .wrap_err_with(|| format!("Invalid {name} value: {raw:?}")),
        None => Ok(default),
    }
}

fn parse_level(level: &str) -> Level {
    match level.to_ascii_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    }
}
