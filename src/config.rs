use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

/// Failure to load a [`Config`] file.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid config {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: toml::de::Error,
    },
}

/// Runtime settings for the client core.
///
/// Every field has a default, so an empty file (or no file at all) yields a
/// working configuration pointed at a local API.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Root of the REST API, e.g. `http://localhost:3001/api`.
    pub base_url: String,
    /// Upper bound for any single HTTP request.
    pub request_timeout_ms: u64,
    /// Delay between two settled notification poll cycles.
    pub poll_interval_ms: u64,
    /// How long a toast stays visible unless dismissed.
    pub toast_duration_ms: u64,
    /// Length of the curation countdown for imported candidates.
    pub countdown_seconds: u32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:3001/api".into(),
            request_timeout_ms: 10_000,
            poll_interval_ms: 20_000,
            toast_duration_ms: 4_500,
            countdown_seconds: 60,
        }
    }
}

impl Config {
    /// Load a configuration from a TOML file.
    ///
    /// ```no_run
    /// # async fn example() {
    /// let cfg = leadflow::Config::load("leadflow.toml").await.unwrap();
    /// println!("{}", cfg.base_url);
    /// # }
    /// ```
    pub async fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = tokio::fs::read_to_string(path)
            .await
            .map_err(|source| ConfigError::Read {
                path: path.display().to_string(),
                source,
            })?;
        Self::from_toml(&text).map_err(|source| ConfigError::Parse {
            path: path.display().to_string(),
            source,
        })
    }

    /// Parse a configuration from TOML text.
    pub fn from_toml(text: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(text)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn toast_duration(&self) -> Duration {
        Duration::from_millis(self.toast_duration_ms)
    }
}
