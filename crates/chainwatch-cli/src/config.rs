use chainwatch_client::ChainClientConfig;
use chainwatch_client::client::HttpClientConfig;
use chainwatch_core::{Error, Result};
use chainwatch_poll::{BridgeConfig, RefreshInterval, RefresherConfig};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChainwatchConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,

    #[serde(default)]
    pub http: HttpConfig,

    #[serde(default)]
    pub refresh: RefreshConfig,

    #[serde(default)]
    pub rag: RagConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpConfig {
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,

    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefreshConfig {
    #[serde(default)]
    pub default_interval: RefreshInterval,

    #[serde(default = "default_short_secs")]
    pub short_secs: u64,

    #[serde(default = "default_long_secs")]
    pub long_secs: u64,

    #[serde(default = "default_stale_after_secs")]
    pub stale_after_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RagConfig {
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    #[serde(default = "default_rag_timeout_secs")]
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,

    #[serde(default = "default_false")]
    pub json: bool,
}

impl Default for ChainwatchConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            http: HttpConfig::default(),
            refresh: RefreshConfig::default(),
            rag: RagConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout_secs(),
            connect_timeout_secs: default_connect_timeout_secs(),
            max_retries: default_max_retries(),
        }
    }
}

impl Default for RefreshConfig {
    fn default() -> Self {
        Self {
            default_interval: RefreshInterval::default(),
            short_secs: default_short_secs(),
            long_secs: default_long_secs(),
            stale_after_secs: default_stale_after_secs(),
        }
    }
}

impl Default for RagConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: default_poll_interval_ms(),
            timeout_secs: default_rag_timeout_secs(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

impl ChainwatchConfig {
    /// Load from a YAML or TOML file; `~` in the path is expanded
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let expanded = shellexpand::tilde(&path.to_string_lossy()).to_string();
        let path = Path::new(&expanded);
        let contents = std::fs::read_to_string(path)?;

        let config = if path.extension().and_then(|s| s.to_str()) == Some("toml") {
            toml::from_str(&contents)
                .map_err(|e| Error::Config(format!("{}: {}", path.display(), e)))?
        } else {
            // Default to YAML
            serde_yaml::from_str(&contents)
                .map_err(|e| Error::Config(format!("{}: {}", path.display(), e)))?
        };

        Ok(config)
    }

    /// Merge environment variables into config (env vars take precedence)
    pub fn merge_env(&mut self) {
        if let Ok(val) = std::env::var("CHAINWATCH_BASE_URL") {
            self.base_url = val;
        }

        // HTTP settings
        if let Ok(val) = std::env::var("CHAINWATCH_HTTP_TIMEOUT_SECS") {
            match val.parse::<u64>() {
                Ok(secs) => self.http.timeout_secs = secs,
                Err(_) => eprintln!("Warning: Invalid CHAINWATCH_HTTP_TIMEOUT_SECS '{}', ignoring", val),
            }
        }

        if let Ok(val) = std::env::var("CHAINWATCH_MAX_RETRIES") {
            match val.parse::<u32>() {
                Ok(retries) => self.http.max_retries = retries,
                Err(_) => eprintln!("Warning: Invalid CHAINWATCH_MAX_RETRIES '{}', ignoring", val),
            }
        }

        // Refresh settings
        if let Ok(val) = std::env::var("CHAINWATCH_REFRESH_INTERVAL") {
            match val.parse::<RefreshInterval>() {
                Ok(interval) => self.refresh.default_interval = interval,
                Err(e) => eprintln!("Warning: {}, using default", e),
            }
        }

        // Logging settings
        if let Ok(val) = std::env::var("CHAINWATCH_LOG_LEVEL") {
            self.logging.level = val;
        }

        if let Ok(val) = std::env::var("CHAINWATCH_LOG_JSON") {
            if let Ok(json) = val.parse::<bool>() {
                self.logging.json = json;
            }
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.base_url.trim().is_empty() {
            return Err(Error::ConfigValidation("base_url must not be empty".to_string()));
        }
        if self.http.timeout_secs == 0 {
            return Err(Error::ConfigValidation(
                "http.timeout_secs must be greater than zero".to_string(),
            ));
        }
        self.refresher_config().validate()?;
        self.bridge_config().validate()?;
        Ok(())
    }

    pub fn client_config(&self) -> ChainClientConfig {
        let http = HttpClientConfig {
            timeout_secs: self.http.timeout_secs,
            connect_timeout_secs: self.http.connect_timeout_secs,
            max_retries: self.http.max_retries,
            ..Default::default()
        };
        ChainClientConfig::new(self.base_url.clone()).with_client_config(http)
    }

    pub fn refresher_config(&self) -> RefresherConfig {
        RefresherConfig {
            short_interval: Duration::from_secs(self.refresh.short_secs),
            long_interval: Duration::from_secs(self.refresh.long_secs),
            stale_after: Duration::from_secs(self.refresh.stale_after_secs),
        }
    }

    pub fn bridge_config(&self) -> BridgeConfig {
        BridgeConfig {
            poll_interval: Duration::from_millis(self.rag.poll_interval_ms),
            timeout: Duration::from_secs(self.rag.timeout_secs),
        }
    }
}

fn default_base_url() -> String {
    "http://localhost:8000".to_string()
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_connect_timeout_secs() -> u64 {
    10
}

fn default_max_retries() -> u32 {
    2
}

fn default_short_secs() -> u64 {
    60
}

fn default_long_secs() -> u64 {
    300
}

fn default_stale_after_secs() -> u64 {
    3600
}

fn default_poll_interval_ms() -> u64 {
    2000
}

fn default_rag_timeout_secs() -> u64 {
    120
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_false() -> bool {
    false
}
