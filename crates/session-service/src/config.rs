//! Session service configuration.
//!
//! Configuration is loaded from environment variables. The registry bearer
//! token is redacted in Debug output.

use common::secret::SecretString;
use std::collections::HashMap;
use std::env;
use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// Default session registry base URL.
pub const DEFAULT_REGISTRY_URL: &str = "http://localhost:8080";

/// Default registry HTTP timeout in milliseconds.
pub const DEFAULT_REGISTRY_TIMEOUT_MS: u64 = 10_000;

/// Default countdown re-evaluation period in milliseconds (1 Hz).
pub const DEFAULT_COUNTDOWN_TICK_MS: u64 = 1_000;

/// Default local preview surface identifier.
pub const DEFAULT_PREVIEW_SURFACE: &str = "local-preview";

/// Default health endpoint bind address.
pub const DEFAULT_HEALTH_BIND_ADDRESS: &str = "0.0.0.0:8090";

/// Session service configuration.
#[derive(Clone)]
pub struct Config {
    /// Session registry base URL.
    pub registry_url: String,

    /// Optional bearer token for the registry.
    pub registry_token: Option<SecretString>,

    /// Registry HTTP timeout.
    pub registry_timeout: Duration,

    /// Bypass the registry, fabricate credentials, force the eligibility override.
    pub preview_mode: bool,

    /// Degrade network-facing registry failures to the preview registry.
    pub preview_fallback: bool,

    /// Countdown re-evaluation period.
    pub countdown_tick: Duration,

    /// Surface the local camera preview is bound to.
    pub preview_surface: String,

    /// Health endpoint bind address.
    pub health_bind_address: String,

    /// Emit JSON-formatted logs.
    pub log_json: bool,
}

/// Custom Debug implementation that redacts sensitive fields.
impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("registry_url", &self.registry_url)
            .field(
                "registry_token",
                &self.registry_token.as_ref().map(|_| "[REDACTED]"),
            )
            .field("registry_timeout", &self.registry_timeout)
            .field("preview_mode", &self.preview_mode)
            .field("preview_fallback", &self.preview_fallback)
            .field("countdown_tick", &self.countdown_tick)
            .field("preview_surface", &self.preview_surface)
            .field("health_bind_address", &self.health_bind_address)
            .field("log_json", &self.log_json)
            .finish()
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid configuration value: {0}")]
    InvalidValue(String),
}

fn parse_bool(vars: &HashMap<String, String>, key: &str) -> Result<bool, ConfigError> {
    match vars.get(key).map(|v| v.trim().to_ascii_lowercase()) {
        None => Ok(false),
        Some(v) => match v.as_str() {
            "1" | "true" | "yes" | "on" => Ok(true),
            "0" | "false" | "no" | "off" | "" => Ok(false),
            _ => Err(ConfigError::InvalidValue(format!(
                "{key} must be a boolean, got '{v}'"
            ))),
        },
    }
}

fn parse_millis(
    vars: &HashMap<String, String>,
    key: &str,
    default: u64,
) -> Result<Duration, ConfigError> {
    let millis = match vars.get(key) {
        None => default,
        Some(v) => v.trim().parse::<u64>().map_err(|_| {
            ConfigError::InvalidValue(format!("{key} must be a whole number of milliseconds"))
        })?,
    };
    if millis == 0 {
        return Err(ConfigError::InvalidValue(format!(
            "{key} must be greater than zero"
        )));
    }
    Ok(Duration::from_millis(millis))
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidValue` for malformed values.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_vars(&env::vars().collect())
    }

    /// Load configuration from a `HashMap` (for testing).
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidValue` for malformed values.
    pub fn from_vars(vars: &HashMap<String, String>) -> Result<Self, ConfigError> {
        let registry_url = vars
            .get("SESSION_REGISTRY_URL")
            .map(|s| s.trim_end_matches('/').to_string())
            .unwrap_or_else(|| DEFAULT_REGISTRY_URL.to_string());

        if !registry_url.starts_with("http://") && !registry_url.starts_with("https://") {
            return Err(ConfigError::InvalidValue(format!(
                "SESSION_REGISTRY_URL must be an http(s) URL, got '{registry_url}'"
            )));
        }

        let registry_token = vars
            .get("SESSION_REGISTRY_TOKEN")
            .filter(|s| !s.is_empty())
            .map(|s| SecretString::from(s.clone()));

        let registry_timeout = parse_millis(
            vars,
            "SESSION_REGISTRY_TIMEOUT_MS",
            DEFAULT_REGISTRY_TIMEOUT_MS,
        )?;

        let countdown_tick =
            parse_millis(vars, "SESSION_COUNTDOWN_TICK_MS", DEFAULT_COUNTDOWN_TICK_MS)?;

        let preview_mode = parse_bool(vars, "SESSION_PREVIEW_MODE")?;
        let preview_fallback = parse_bool(vars, "SESSION_PREVIEW_FALLBACK")?;
        let log_json = parse_bool(vars, "SESSION_LOG_JSON")?;

        let preview_surface = vars
            .get("SESSION_PREVIEW_SURFACE")
            .cloned()
            .unwrap_or_else(|| DEFAULT_PREVIEW_SURFACE.to_string());

        let health_bind_address = vars
            .get("SESSION_HEALTH_BIND_ADDRESS")
            .cloned()
            .unwrap_or_else(|| DEFAULT_HEALTH_BIND_ADDRESS.to_string());

        Ok(Config {
            registry_url,
            registry_token,
            registry_timeout,
            preview_mode,
            preview_fallback,
            countdown_tick,
            preview_surface,
            health_bind_address,
            log_json,
        })
    }
}

/// Which session the binary opens, and as whom.
#[derive(Debug, Clone)]
pub struct LaunchTarget {
    pub session_id: String,
    pub user_id: String,
}

impl LaunchTarget {
    /// Load the launch target from environment variables.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::MissingEnvVar` when `SESSION_ID` or `SESSION_USER_ID`
    /// is absent and preview mode is off.
    pub fn from_vars(
        vars: &HashMap<String, String>,
        preview_mode: bool,
    ) -> Result<Self, ConfigError> {
        let lookup = |key: &str, preview_default: &str| -> Result<String, ConfigError> {
            match vars.get(key).filter(|v| !v.is_empty()) {
                Some(v) => Ok(v.clone()),
                None if preview_mode => Ok(preview_default.to_string()),
                None => Err(ConfigError::MissingEnvVar(key.to_string())),
            }
        };

        Ok(Self {
            session_id: lookup("SESSION_ID", "preview-session")?,
            user_id: lookup("SESSION_USER_ID", "preview-host")?,
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use common::secret::ExposeSecret;

    #[test]
    fn test_from_vars_success_with_defaults() {
        let config = Config::from_vars(&HashMap::new()).expect("Config should load");

        assert_eq!(config.registry_url, DEFAULT_REGISTRY_URL);
        assert!(config.registry_token.is_none());
        assert_eq!(
            config.registry_timeout,
            Duration::from_millis(DEFAULT_REGISTRY_TIMEOUT_MS)
        );
        assert!(!config.preview_mode);
        assert!(!config.preview_fallback);
        assert_eq!(config.countdown_tick, Duration::from_secs(1));
        assert_eq!(config.preview_surface, DEFAULT_PREVIEW_SURFACE);
        assert_eq!(config.health_bind_address, DEFAULT_HEALTH_BIND_ADDRESS);
        assert!(!config.log_json);
    }

    #[test]
    fn test_from_vars_success_with_custom_values() {
        let vars = HashMap::from([
            (
                "SESSION_REGISTRY_URL".to_string(),
                "https://registry.example.com/".to_string(),
            ),
            (
                "SESSION_REGISTRY_TOKEN".to_string(),
                "registry-bearer".to_string(),
            ),
            ("SESSION_REGISTRY_TIMEOUT_MS".to_string(), "2500".to_string()),
            ("SESSION_PREVIEW_MODE".to_string(), "true".to_string()),
            ("SESSION_PREVIEW_FALLBACK".to_string(), "1".to_string()),
            ("SESSION_COUNTDOWN_TICK_MS".to_string(), "250".to_string()),
            ("SESSION_PREVIEW_SURFACE".to_string(), "pip".to_string()),
            (
                "SESSION_HEALTH_BIND_ADDRESS".to_string(),
                "127.0.0.1:9000".to_string(),
            ),
            ("SESSION_LOG_JSON".to_string(), "yes".to_string()),
        ]);

        let config = Config::from_vars(&vars).expect("Config should load");

        assert_eq!(config.registry_url, "https://registry.example.com");
        assert_eq!(
            config.registry_token.as_ref().unwrap().expose_secret(),
            "registry-bearer"
        );
        assert_eq!(config.registry_timeout, Duration::from_millis(2500));
        assert!(config.preview_mode);
        assert!(config.preview_fallback);
        assert_eq!(config.countdown_tick, Duration::from_millis(250));
        assert_eq!(config.preview_surface, "pip");
        assert_eq!(config.health_bind_address, "127.0.0.1:9000");
        assert!(config.log_json);
    }

    #[test]
    fn test_invalid_values_are_rejected() {
        let vars = HashMap::from([("SESSION_PREVIEW_MODE".to_string(), "maybe".to_string())]);
        assert!(matches!(
            Config::from_vars(&vars),
            Err(ConfigError::InvalidValue(_))
        ));

        let vars = HashMap::from([("SESSION_COUNTDOWN_TICK_MS".to_string(), "0".to_string())]);
        assert!(matches!(
            Config::from_vars(&vars),
            Err(ConfigError::InvalidValue(_))
        ));

        let vars = HashMap::from([(
            "SESSION_REGISTRY_URL".to_string(),
            "registry.local".to_string(),
        )]);
        assert!(matches!(
            Config::from_vars(&vars),
            Err(ConfigError::InvalidValue(_))
        ));
    }

    #[test]
    fn test_debug_redacts_registry_token() {
        let vars = HashMap::from([(
            "SESSION_REGISTRY_TOKEN".to_string(),
            "super-secret-bearer".to_string(),
        )]);
        let config = Config::from_vars(&vars).expect("Config should load");

        let debug_output = format!("{config:?}");
        assert!(debug_output.contains("[REDACTED]"));
        assert!(!debug_output.contains("super-secret-bearer"));
    }

    #[test]
    fn test_launch_target_required_outside_preview() {
        let result = LaunchTarget::from_vars(&HashMap::new(), false);
        assert!(matches!(result, Err(ConfigError::MissingEnvVar(v)) if v == "SESSION_ID"));

        let target = LaunchTarget::from_vars(&HashMap::new(), true).expect("preview defaults");
        assert_eq!(target.session_id, "preview-session");
        assert_eq!(target.user_id, "preview-host");
    }
}
