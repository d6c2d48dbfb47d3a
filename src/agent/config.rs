//! Orchestrator configuration with builder pattern and environment variable support.
//!
//! Configuration is resolved in order: explicit values → environment variables → defaults.

use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::ConfigError;

/// Default model identifier.
const DEFAULT_MODEL: &str = "gpt-4.1-mini";
/// Default response cache directory.
const DEFAULT_CACHE_DIR: &str = ".cache";
/// Default data directory (sessions, sandboxed files).
const DEFAULT_DATA_DIR: &str = "data";
/// Default request timeout in seconds.
const DEFAULT_TIMEOUT_SECS: u64 = 120;
/// Default sampling temperature for specialist calls.
const DEFAULT_TEMPERATURE: f32 = 0.2;
/// Sandbox subdirectory under the data directory.
const SANDBOX_SUBDIR: &str = "files";

/// Configuration for the orchestration core.
#[derive(Debug, Clone)]
pub struct OrchestraConfig {
    /// Backend provider name (`"openai"` or `"mock"`).
    pub provider: String,
    /// Model identifier sent to the backend and folded into cache keys.
    pub model: String,
    /// Use the deterministic offline generator instead of a live backend.
    pub mock_mode: bool,
    /// API key for the live backend.
    pub api_key: Option<String>,
    /// Optional base URL override (for proxies or compatible APIs).
    pub base_url: Option<String>,
    /// Directory holding the response cache database.
    pub cache_dir: PathBuf,
    /// Directory holding session history and the tool sandbox.
    pub data_dir: PathBuf,
    /// Directory containing prompt template files.
    ///
    /// Missing files fall back to compiled-in defaults.
    pub prompt_dir: Option<PathBuf>,
    /// Request timeout for the live backend.
    pub timeout: Duration,
    /// Sampling temperature for specialist calls.
    pub temperature: f32,
}

impl OrchestraConfig {
    /// Creates a new builder for `OrchestraConfig`.
    #[must_use]
    pub fn builder() -> OrchestraConfigBuilder {
        OrchestraConfigBuilder::default()
    }

    /// Creates configuration from environment variables with defaults.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::ApiKeyMissing`] if live mode is selected and
    /// no API key is found.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::builder().from_env().build()
    }

    /// Root directory for sandboxed file tools.
    #[must_use]
    pub fn sandbox_root(&self) -> PathBuf {
        self.data_dir.join(SANDBOX_SUBDIR)
    }

    /// Path of the response cache database.
    #[must_use]
    pub fn cache_db_path(&self) -> PathBuf {
        self.cache_dir.join("llm-cache.db")
    }

    /// Path of the session history database.
    #[must_use]
    pub fn sessions_db_path(&self) -> PathBuf {
        self.data_dir.join("sessions.db")
    }

    /// Prompt directory, if configured.
    #[must_use]
    pub fn prompt_dir(&self) -> Option<&Path> {
        self.prompt_dir.as_deref()
    }
}

/// Builder for [`OrchestraConfig`].
#[derive(Debug, Clone, Default)]
pub struct OrchestraConfigBuilder {
    provider: Option<String>,
    model: Option<String>,
    mock_mode: Option<bool>,
    api_key: Option<String>,
    base_url: Option<String>,
    cache_dir: Option<PathBuf>,
    data_dir: Option<PathBuf>,
    prompt_dir: Option<PathBuf>,
    timeout: Option<Duration>,
    temperature: Option<f32>,
}

/// Reads the first set variable among `names`.
fn env_any(names: &[&str]) -> Option<String> {
    names.iter().find_map(|name| std::env::var(name).ok())
}

impl OrchestraConfigBuilder {
    /// Populates unset fields from environment variables.
    #[must_use]
    pub fn from_env(mut self) -> Self {
        if self.provider.is_none() {
            self.provider = env_any(&["ORCHESTRA_PROVIDER"]);
        }
        if self.model.is_none() {
            self.model = env_any(&["ORCHESTRA_MODEL", "OPENAI_MODEL"]);
        }
        if self.mock_mode.is_none() {
            self.mock_mode = env_any(&["ORCHESTRA_MOCK_MODE", "MOCK_MODE"])
                .map(|v| v.trim().eq_ignore_ascii_case("true"));
        }
        if self.api_key.is_none() {
            self.api_key = env_any(&["OPENAI_API_KEY", "ORCHESTRA_API_KEY"]);
        }
        if self.base_url.is_none() {
            self.base_url = env_any(&["OPENAI_BASE_URL", "ORCHESTRA_BASE_URL"]);
        }
        if self.cache_dir.is_none() {
            self.cache_dir = env_any(&["ORCHESTRA_CACHE_DIR", "CACHE_DIR"]).map(PathBuf::from);
        }
        if self.data_dir.is_none() {
            self.data_dir = env_any(&["ORCHESTRA_DATA_DIR", "DATA_DIR"]).map(PathBuf::from);
        }
        if self.prompt_dir.is_none() {
            self.prompt_dir = env_any(&["ORCHESTRA_PROMPT_DIR"]).map(PathBuf::from);
        }
        if self.timeout.is_none() {
            self.timeout = env_any(&["ORCHESTRA_TIMEOUT_SECS"])
                .and_then(|v| v.parse().ok())
                .map(Duration::from_secs);
        }
        self
    }

    /// Sets the backend provider name.
    #[must_use]
    pub fn provider(mut self, provider: impl Into<String>) -> Self {
        self.provider = Some(provider.into());
        self
    }

    /// Sets the model identifier.
    #[must_use]
    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    /// Enables or disables mock mode.
    #[must_use]
    pub const fn mock_mode(mut self, enabled: bool) -> Self {
        self.mock_mode = Some(enabled);
        self
    }

    /// Sets the API key.
    #[must_use]
    pub fn api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    /// Sets the base URL override.
    #[must_use]
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    /// Sets the cache directory.
    #[must_use]
    pub fn cache_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.cache_dir = Some(dir.into());
        self
    }

    /// Sets the data directory.
    #[must_use]
    pub fn data_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.data_dir = Some(dir.into());
        self
    }

    /// Sets the prompt template directory.
    #[must_use]
    pub fn prompt_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.prompt_dir = Some(dir.into());
        self
    }

    /// Sets the request timeout.
    #[must_use]
    pub const fn timeout(mut self, duration: Duration) -> Self {
        self.timeout = Some(duration);
        self
    }

    /// Sets the specialist sampling temperature.
    #[must_use]
    pub const fn temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    /// Builds the [`OrchestraConfig`].
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::ApiKeyMissing`] if live mode is selected without
    /// an API key, or [`ConfigError::Invalid`] for an out-of-range temperature.
    pub fn build(self) -> Result<OrchestraConfig, ConfigError> {
        let mock_mode = self.mock_mode.unwrap_or(true);
        let provider = if mock_mode {
            "mock".to_string()
        } else {
            self.provider.unwrap_or_else(|| "openai".to_string())
        };

        if !mock_mode && self.api_key.as_deref().is_none_or(str::is_empty) {
            return Err(ConfigError::ApiKeyMissing);
        }

        let temperature = self.temperature.unwrap_or(DEFAULT_TEMPERATURE);
        if !(0.0..=2.0).contains(&temperature) {
            return Err(ConfigError::Invalid {
                message: format!("temperature must be within 0.0-2.0, got {temperature}"),
            });
        }

        Ok(OrchestraConfig {
            provider,
            model: self.model.unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            mock_mode,
            api_key: self.api_key,
            base_url: self.base_url,
            cache_dir: self
                .cache_dir
                .unwrap_or_else(|| PathBuf::from(DEFAULT_CACHE_DIR)),
            data_dir: self
                .data_dir
                .unwrap_or_else(|| PathBuf::from(DEFAULT_DATA_DIR)),
            prompt_dir: self.prompt_dir,
            timeout: self
                .timeout
                .unwrap_or(Duration::from_secs(DEFAULT_TIMEOUT_SECS)),
            temperature,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_defaults() {
        let config = OrchestraConfig::builder()
            .build()
            .unwrap_or_else(|_| unreachable!());
        assert!(config.mock_mode);
        assert_eq!(config.provider, "mock");
        assert_eq!(config.model, DEFAULT_MODEL);
        assert_eq!(config.cache_dir, PathBuf::from(".cache"));
        assert_eq!(config.sandbox_root(), PathBuf::from("data").join("files"));
        assert!((config.temperature - DEFAULT_TEMPERATURE).abs() < f32::EPSILON);
    }

    #[test]
    fn test_live_mode_requires_api_key() {
        let result = OrchestraConfig::builder().mock_mode(false).build();
        assert!(matches!(result, Err(ConfigError::ApiKeyMissing)));

        let result = OrchestraConfig::builder()
            .mock_mode(false)
            .api_key("")
            .build();
        assert!(matches!(result, Err(ConfigError::ApiKeyMissing)));
    }

    #[test]
    fn test_builder_custom_values() {
        let config = OrchestraConfig::builder()
            .mock_mode(false)
            .api_key("key")
            .model("gpt-4o")
            .data_dir("/tmp/orchestra")
            .timeout(Duration::from_secs(30))
            .build()
            .unwrap_or_else(|_| unreachable!());
        assert_eq!(config.provider, "openai");
        assert_eq!(config.model, "gpt-4o");
        assert_eq!(config.timeout, Duration::from_secs(30));
        assert_eq!(
            config.sessions_db_path(),
            PathBuf::from("/tmp/orchestra/sessions.db")
        );
    }

    #[test]
    fn test_invalid_temperature() {
        let result = OrchestraConfig::builder().temperature(3.5).build();
        assert!(matches!(result, Err(ConfigError::Invalid { .. })));
    }
}
