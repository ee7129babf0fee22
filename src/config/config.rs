use crate::error::ConfigError;
use crate::resolver::ResolverSettings;
use crate::transport::Credentials;
use crate::watchdog::WatchdogSchedule;
use chrono_tz::Tz;
use log::{info, warn};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::time::Duration;

/// Main application configuration
///
/// Every section falls back to its defaults when omitted from the file, so a
/// file only needs the endpoints and credentials.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub kener: KenerConfig,
    pub kuma: KumaConfig,
    pub watchdog: WatchdogConfig,
    pub liveness: LivenessConfig,
}

/// Downstream status API
#[derive(Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct KenerConfig {
    pub url: String,
    pub token: String,
    pub timeout_ms: u64,
    pub publish_tag: String,
    pub latency_tag: String,
    pub default_max_latency_ms: f64,
}

impl Default for KenerConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            token: String::new(),
            timeout_ms: 1_000,
            publish_tag: "kener".to_string(),
            latency_tag: "max_ping".to_string(),
            default_max_latency_ms: 2000.0,
        }
    }
}

impl fmt::Debug for KenerConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KenerConfig")
            .field("url", &self.url)
            .field("token", &"<redacted>")
            .field("timeout_ms", &self.timeout_ms)
            .field("publish_tag", &self.publish_tag)
            .field("latency_tag", &self.latency_tag)
            .field("default_max_latency_ms", &self.default_max_latency_ms)
            .finish()
    }
}

/// Monitoring backend feed
#[derive(Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct KumaConfig {
    pub url: String,
    pub username: String,
    pub password: String,
    /// Stop the process when the feed connection ends instead of carrying on
    /// with watchdog republishes only
    pub exit_on_disconnect: bool,
}

impl fmt::Debug for KumaConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KumaConfig")
            .field("url", &self.url)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("exit_on_disconnect", &self.exit_on_disconnect)
            .finish()
    }
}

/// Staleness sweep cadence
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WatchdogConfig {
    pub interval_seconds: u32,
    pub offset_seconds: u32,
    /// IANA timezone name the schedule is evaluated in
    pub timezone: String,
}

impl Default for WatchdogConfig {
    fn default() -> Self {
        Self {
            interval_seconds: 60,
            offset_seconds: 5,
            timezone: "Europe/Paris".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LivenessConfig {
    /// Minimum heartbeat age before an uptime ping republishes it
    pub threshold_ms: u64,
}

impl Default for LivenessConfig {
    fn default() -> Self {
        Self { threshold_ms: 30 }
    }
}

impl Config {
    /// Load configuration from a TOML file
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::ReadError(format!("{}: {}", path.display(), e)))?;
        let config = toml::from_str(&content)?;
        Ok(config)
    }

    /// Load the file (if any) and apply environment overrides
    ///
    /// A missing file is not an error: defaults are used with a warning.
    /// The result is not validated.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = match path {
            Some(path) if path.exists() => {
                info!("Loading configuration from: {}", path.display());
                Self::from_file(path)?
            }
            Some(path) => {
                warn!(
                    "Configuration file '{}' not found, using defaults",
                    path.display()
                );
                Self::default()
            }
            None => {
                info!("No configuration file given, using defaults");
                Self::default()
            }
        };

        config.apply_overrides(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    /// Override file values from environment-style variables
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let strings: [(&str, &mut String); 6] = [
            ("KENER_URL", &mut self.kener.url),
            ("KENER_TOKEN", &mut self.kener.token),
            ("KUMA_URL", &mut self.kuma.url),
            ("KUMA_USER", &mut self.kuma.username),
            ("KUMA_PASS", &mut self.kuma.password),
            ("HEARTLINE_TZ", &mut self.watchdog.timezone),
        ];
        for (key, field) in strings {
            if let Some(value) = lookup(key) {
                *field = value;
            }
        }

        if let Some(value) = lookup("HEARTLINE_LIVENESS_MS") {
            self.liveness.threshold_ms = value.trim().parse().map_err(|e| {
                ConfigError::ParseError(format!("HEARTLINE_LIVENESS_MS='{}': {}", value, e))
            })?;
        }

        Ok(())
    }

    /// Check that the configuration can actually run the bridge
    pub fn validate(&self) -> Result<(), ConfigError> {
        require("kener.url", &self.kener.url)?;
        require("kener.token", &self.kener.token)?;
        require("kener.publish_tag", &self.kener.publish_tag)?;
        require("kuma.url", &self.kuma.url)?;
        require("kuma.username", &self.kuma.username)?;
        require("kuma.password", &self.kuma.password)?;

        if !self.kener.url.starts_with("http://") && !self.kener.url.starts_with("https://") {
            return Err(ConfigError::ValidationError(format!(
                "kener.url must be an http(s) url, got '{}'",
                self.kener.url
            )));
        }

        if self.kener.timeout_ms == 0 {
            return Err(ConfigError::ValidationError(
                "kener.timeout_ms must be greater than 0".to_string(),
            ));
        }

        if !self.kener.default_max_latency_ms.is_finite() || self.kener.default_max_latency_ms < 0.0 {
            return Err(ConfigError::ValidationError(format!(
                "kener.default_max_latency_ms must be a non-negative number, got {}",
                self.kener.default_max_latency_ms
            )));
        }

        if self.watchdog.interval_seconds == 0 {
            return Err(ConfigError::ValidationError(
                "watchdog.interval_seconds must be greater than 0".to_string(),
            ));
        }

        if self.watchdog.offset_seconds >= self.watchdog.interval_seconds {
            return Err(ConfigError::ValidationError(format!(
                "watchdog.offset_seconds ({}) must be less than interval_seconds ({})",
                self.watchdog.offset_seconds, self.watchdog.interval_seconds
            )));
        }

        self.timezone()?;
        Ok(())
    }

    pub fn timezone(&self) -> Result<Tz, ConfigError> {
        self.watchdog.timezone.trim().parse::<Tz>().map_err(|e| {
            ConfigError::ValidationError(format!(
                "unknown timezone '{}': {}",
                self.watchdog.timezone, e
            ))
        })
    }

    pub fn resolver_settings(&self) -> ResolverSettings {
        ResolverSettings {
            publish_tag: self.kener.publish_tag.clone(),
            latency_tag: self.kener.latency_tag.clone(),
            default_max_latency: self.kener.default_max_latency_ms,
        }
    }

    pub fn watchdog_schedule(&self) -> Result<WatchdogSchedule, ConfigError> {
        Ok(WatchdogSchedule {
            interval_seconds: self.watchdog.interval_seconds,
            offset_seconds: self.watchdog.offset_seconds,
            timezone: self.timezone()?,
        })
    }

    pub fn liveness_threshold(&self) -> chrono::Duration {
        chrono::Duration::milliseconds(i64::try_from(self.liveness.threshold_ms).unwrap_or(i64::MAX))
    }

    pub fn publish_timeout(&self) -> Duration {
        Duration::from_millis(self.kener.timeout_ms)
    }

    pub fn credentials(&self) -> Credentials {
        Credentials {
            username: self.kuma.username.clone(),
            password: self.kuma.password.clone(),
        }
    }
}

fn require(name: &str, value: &str) -> Result<(), ConfigError> {
    if value.trim().is_empty() {
        return Err(ConfigError::ValidationError(format!("{} must be set", name)));
    }
    Ok(())
}
