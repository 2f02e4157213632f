use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::PathBuf;
use std::time::Duration;
use url::Url;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    pub api: ApiConfig,
    pub scan: ScanConfig,
    pub search: SearchConfig,
    pub ui: UiConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    pub base_url: String,
    pub request_timeout: u64,
    pub user_agent: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanConfig {
    pub poll_interval_ms: u64,
    /// Unset means poll until the server reports completion.
    pub max_poll_duration_secs: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchConfig {
    pub debounce_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UiConfig {
    /// List offers through the grouped endpoint instead of the flat one.
    pub grouped: bool,
    pub theme_file: Option<String>,
    pub color: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
    pub directory: Option<String>,
}

impl ApiConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout)
    }
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:5000".to_string(),
            request_timeout: 30,
            user_agent: format!("op-stock-client/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: 3_000,
            max_poll_duration_secs: None,
        }
    }
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self { debounce_ms: 400 }
    }
}

impl Default for UiConfig {
    fn default() -> Self {
        Self {
            grouped: false,
            theme_file: None,
            color: true,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            directory: None,
        }
    }
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        let run_mode = env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

        let s = Config::builder()
            // Built-in defaults so the client runs without any config file
            .add_source(Config::try_from(&AppConfig::default())?)
            .add_source(File::with_name("config/default").required(false))
            // Add environment-specific config
            .add_source(File::with_name(&format!("config/{}", run_mode)).required(false))
            // Add local config (ignored by git)
            .add_source(File::with_name("config/local").required(false))
            // Environment variables such as OPSTOCK__API__BASE_URL
            .add_source(
                Environment::with_prefix("OPSTOCK")
                    .prefix_separator("__")
                    .separator("__"),
            )
            .build()?;

        let config: AppConfig = s.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if Url::parse(&self.api.base_url).is_err() {
            return Err(ConfigError::Message("Invalid API base URL format".into()));
        }

        if self.api.request_timeout == 0 {
            return Err(ConfigError::Message("API request_timeout must be greater than 0".into()));
        }

        if self.scan.poll_interval_ms == 0 {
            return Err(ConfigError::Message("Scan poll_interval_ms must be greater than 0".into()));
        }

        if let Some(max) = self.scan.max_poll_duration_secs {
            if max.saturating_mul(1_000) < self.scan.poll_interval_ms {
                return Err(ConfigError::Message(
                    "Scan max_poll_duration_secs must cover at least one poll interval".into(),
                ));
            }
        }

        if self.search.debounce_ms == 0 {
            return Err(ConfigError::Message("Search debounce_ms must be greater than 0".into()));
        }

        if self.logging.level.parse::<tracing::Level>().is_err() {
            return Err(ConfigError::Message(format!(
                "Unknown logging level: {}",
                self.logging.level
            )));
        }

        Ok(())
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.scan.poll_interval_ms)
    }

    pub fn max_poll_duration(&self) -> Option<Duration> {
        self.scan.max_poll_duration_secs.map(Duration::from_secs)
    }

    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.search.debounce_ms)
    }

    /// Where the theme preference lives: explicit setting, else the user's
    /// config directory.
    pub fn theme_path(&self) -> Option<PathBuf> {
        match &self.ui.theme_file {
            Some(path) => Some(PathBuf::from(path)),
            None => dirs::config_dir().map(|dir| dir.join("op-stock").join("theme.toml")),
        }
    }
}
