//! Global configuration parsing, validation, and credential loading.

use std::env;
use std::fs;
use std::path::Path;
use std::time::Duration;

use serde::Deserialize;
use tracing::debug;

use crate::{AppError, Result};

/// Environment variable holding the optional bearer token for collaborator services.
pub const SERVICE_TOKEN_ENV: &str = "METAGEN_SERVICE_TOKEN";

/// Queue scheduling parameters.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct QueueConfig {
    /// Maximum number of sessions allowed in an active status at once.
    #[serde(default = "default_max_active_sessions")]
    pub max_active_sessions: usize,
    /// Scheduler tick period.
    #[serde(default = "default_tick_interval_ms")]
    pub tick_interval_ms: u64,
    /// Cadence of the synthetic progress reporter while a stage call is outstanding.
    #[serde(default = "default_progress_interval_ms")]
    pub progress_interval_ms: u64,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            max_active_sessions: default_max_active_sessions(),
            tick_interval_ms: default_tick_interval_ms(),
            progress_interval_ms: default_progress_interval_ms(),
        }
    }
}

fn default_max_active_sessions() -> usize {
    1
}

fn default_tick_interval_ms() -> u64 {
    1000
}

fn default_progress_interval_ms() -> u64 {
    1500
}

/// Per-stage deadlines (seconds).
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct TimeoutConfig {
    /// Grounding stage deadline.
    #[serde(default = "default_grounding_seconds")]
    pub grounding_seconds: u64,
    /// Generation stage deadline.
    #[serde(default = "default_generation_seconds")]
    pub generation_seconds: u64,
    /// Draft persistence deadline.
    #[serde(default = "default_persistence_seconds")]
    pub persistence_seconds: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            grounding_seconds: default_grounding_seconds(),
            generation_seconds: default_generation_seconds(),
            persistence_seconds: default_persistence_seconds(),
        }
    }
}

fn default_grounding_seconds() -> u64 {
    120
}

fn default_generation_seconds() -> u64 {
    600
}

fn default_persistence_seconds() -> u64 {
    30
}

/// Collaborator service endpoints.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct ServicesConfig {
    /// Keyword grounding (retrieval) endpoint.
    pub grounding_url: String,
    /// Generation pipeline endpoint.
    pub generation_url: String,
    /// Draft persistence endpoint.
    pub persistence_url: String,
    /// Bearer token sent to every service (populated at runtime).
    #[serde(skip)]
    pub token: Option<String>,
}

/// Defaults applied to enqueue requests arriving over HTTP.
#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct GenerationDefaults {
    /// Hashtags appended to every generated result when the request names none.
    #[serde(default)]
    pub default_fixed_hashtags: Vec<String>,
}

fn default_http_port() -> u16 {
    8080
}

/// Global configuration parsed from `config.toml`.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct GlobalConfig {
    /// Port for the HTTP surface.
    #[serde(default = "default_http_port")]
    pub http_port: u16,
    /// Minutes a settled session is kept before the host purges it; 0 keeps forever.
    #[serde(default)]
    pub retention_minutes: u64,
    /// Scheduling parameters.
    #[serde(default)]
    pub queue: QueueConfig,
    /// Stage deadlines.
    #[serde(default)]
    pub timeouts: TimeoutConfig,
    /// Collaborator endpoints.
    pub services: ServicesConfig,
    /// Enqueue defaults.
    #[serde(default)]
    pub generation: GenerationDefaults,
}

impl GlobalConfig {
    /// Load and validate configuration from a TOML file path.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if the file cannot be read or contains
    /// invalid TOML, or if validation fails.
    pub fn load_from_path(path: impl AsRef<Path>) -> Result<Self> {
        let raw = fs::read_to_string(path)
            .map_err(|err| AppError::Config(format!("failed to read config: {err}")))?;
        Self::from_toml_str(&raw)
    }

    /// Parse configuration from a TOML string.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if parsing or validation fails.
    pub fn from_toml_str(raw: &str) -> Result<Self> {
        let config: Self = toml::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    /// Load the collaborator bearer token from the environment.
    ///
    /// The token is optional; an unset or empty variable leaves it `None`.
    pub fn load_credentials(&mut self) {
        self.services.token = env::var(SERVICE_TOKEN_ENV)
            .ok()
            .map(|value| value.trim().to_owned())
            .filter(|value| !value.is_empty());
        debug!(
            present = self.services.token.is_some(),
            "service token loaded"
        );
    }

    /// Scheduler tick period.
    #[must_use]
    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.queue.tick_interval_ms)
    }

    /// Synthetic progress cadence.
    #[must_use]
    pub fn progress_interval(&self) -> Duration {
        Duration::from_millis(self.queue.progress_interval_ms)
    }

    /// Grounding stage deadline.
    #[must_use]
    pub fn grounding_timeout(&self) -> Duration {
        Duration::from_secs(self.timeouts.grounding_seconds)
    }

    /// Generation stage deadline.
    #[must_use]
    pub fn generation_timeout(&self) -> Duration {
        Duration::from_secs(self.timeouts.generation_seconds)
    }

    /// Draft persistence deadline.
    #[must_use]
    pub fn persistence_timeout(&self) -> Duration {
        Duration::from_secs(self.timeouts.persistence_seconds)
    }

    /// Retention window for settled sessions, if enabled.
    #[must_use]
    pub fn retention(&self) -> Option<Duration> {
        (self.retention_minutes > 0).then(|| Duration::from_secs(self.retention_minutes * 60))
    }

    fn validate(&self) -> Result<()> {
        if self.queue.max_active_sessions == 0 {
            return Err(AppError::Config(
                "queue.max_active_sessions must be greater than zero".into(),
            ));
        }
        if self.queue.tick_interval_ms == 0 || self.queue.progress_interval_ms == 0 {
            return Err(AppError::Config(
                "queue intervals must be greater than zero".into(),
            ));
        }
        if self.timeouts.grounding_seconds == 0
            || self.timeouts.generation_seconds == 0
            || self.timeouts.persistence_seconds == 0
        {
            return Err(AppError::Config(
                "stage timeouts must be greater than zero".into(),
            ));
        }

        for (name, url) in [
            ("grounding_url", &self.services.grounding_url),
            ("generation_url", &self.services.generation_url),
            ("persistence_url", &self.services.persistence_url),
        ] {
            if !(url.starts_with("http://") || url.starts_with("https://")) {
                return Err(AppError::Config(format!(
                    "services.{name} must be an http(s) URL"
                )));
            }
        }

        Ok(())
    }
}
