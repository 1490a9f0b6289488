//! Configuration loading and root folder resolution
//!
//! Settings sources, highest priority first:
//! 1. Command-line arguments (handled by the service binary)
//! 2. Environment variables
//! 3. TOML configuration file
//! 4. Compiled defaults
//!
//! A missing or unreadable TOML file never stops startup; defaults are used
//! and a warning is logged.

use crate::{Error, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::warn;

/// Environment variable naming the root folder
pub const ROOT_FOLDER_ENV: &str = "MIRAGE_ROOT_FOLDER";

/// Environment variable naming the TOML config file
pub const CONFIG_FILE_ENV: &str = "MIRAGE_CONFIG";

/// Bootstrap configuration loaded from TOML
#[derive(Debug, Clone, Deserialize)]
pub struct TomlConfig {
    /// Folder holding the database (optional)
    #[serde(default)]
    pub root_folder: Option<PathBuf>,

    /// Database file name inside the root folder, or an absolute path
    #[serde(default = "default_database_file")]
    pub database_file: PathBuf,

    #[serde(default)]
    pub logging: LoggingConfig,

    #[serde(default)]
    pub generation: GenerationConfig,

    #[serde(default)]
    pub flow: FlowConfig,
}

impl Default for TomlConfig {
    fn default() -> Self {
        Self {
            root_folder: None,
            database_file: default_database_file(),
            logging: LoggingConfig::default(),
            generation: GenerationConfig::default(),
            flow: FlowConfig::default(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

/// Image generation backend settings
#[derive(Debug, Clone, Deserialize)]
pub struct GenerationConfig {
    /// API key (GEMINI_API_KEY and --gemini-api-key take precedence)
    #[serde(default)]
    pub api_key: Option<String>,

    #[serde(default = "default_model")]
    pub model: String,

    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Minimum spacing between successive generation requests
    #[serde(default = "default_pacing_ms")]
    pub pacing_ms: u64,

    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    /// Extra attempts for throttled requests (0 disables retry)
    #[serde(default)]
    pub throttle_retries: u32,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            model: default_model(),
            base_url: default_base_url(),
            pacing_ms: default_pacing_ms(),
            request_timeout_secs: default_request_timeout_secs(),
            throttle_retries: 0,
        }
    }
}

/// Visitor flow presentation settings
#[derive(Debug, Clone, Deserialize)]
pub struct FlowConfig {
    /// Pause before the reveal text is shown
    #[serde(default = "default_reveal_delay_ms")]
    pub reveal_delay_ms: u64,

    /// Origin used when building result links for the QR code
    #[serde(default)]
    pub public_base_url: Option<String>,

    /// Idle time after which a tab's transient data is dropped
    #[serde(default = "default_tab_ttl_secs")]
    pub tab_ttl_secs: u64,
}

impl Default for FlowConfig {
    fn default() -> Self {
        Self {
            reveal_delay_ms: default_reveal_delay_ms(),
            public_base_url: None,
            tab_ttl_secs: default_tab_ttl_secs(),
        }
    }
}

fn default_tab_ttl_secs() -> u64 {
    1800
}

fn default_database_file() -> PathBuf {
    PathBuf::from("mirage.db")
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_model() -> String {
    "gemini-2.5-flash-image".to_string()
}

fn default_base_url() -> String {
    "https://generativelanguage.googleapis.com".to_string()
}

fn default_pacing_ms() -> u64 {
    500
}

fn default_request_timeout_secs() -> u64 {
    120
}

fn default_reveal_delay_ms() -> u64 {
    1000
}

impl TomlConfig {
    /// Parse a TOML document
    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| Error::Config(format!("Parse TOML failed: {}", e)))
    }

    /// Load configuration from a file, falling back to defaults when absent
    ///
    /// Problems with the file are returned as messages instead of logged, so
    /// a caller that has not set up tracing yet can report them afterwards.
    pub fn load(path: Option<&Path>) -> (Self, Vec<String>) {
        let path = match path.map(Path::to_path_buf).or_else(default_config_path) {
            Some(path) => path,
            None => {
                return (
                    Self::default(),
                    vec!["No config file location available, using defaults".to_string()],
                );
            }
        };

        if !path.exists() {
            let warning = format!("Config file not found at {}, using defaults", path.display());
            return (Self::default(), vec![warning]);
        }

        let loaded = std::fs::read_to_string(&path)
            .map_err(|e| Error::Config(format!("Read TOML failed: {}", e)))
            .and_then(|content| Self::from_toml_str(&content));

        match loaded {
            Ok(config) => (config, Vec::new()),
            Err(e) => (
                Self::default(),
                vec![format!("Ignoring config file {}: {}", path.display(), e)],
            ),
        }
    }

    /// [`load`](Self::load), logging any problems straight away
    pub fn load_or_default(path: Option<&Path>) -> Self {
        let (config, warnings) = Self::load(path);
        for warning in &warnings {
            warn!("{}", warning);
        }
        config
    }

    /// Database location: absolute `database_file` wins, otherwise joined onto the root folder
    pub fn database_path(&self, root_folder: &Path) -> PathBuf {
        if self.database_file.is_absolute() {
            self.database_file.clone()
        } else {
            root_folder.join(&self.database_file)
        }
    }
}

/// Root folder resolution:
/// 1. Command-line argument (highest priority)
/// 2. Environment variable
/// 3. TOML config file
/// 4. OS-dependent compiled default (fallback)
pub fn resolve_root_folder(cli_arg: Option<&Path>, toml_config: &TomlConfig) -> PathBuf {
    if let Some(path) = cli_arg {
        return path.to_path_buf();
    }

    if let Ok(path) = std::env::var(ROOT_FOLDER_ENV) {
        if !path.trim().is_empty() {
            return PathBuf::from(path);
        }
    }

    if let Some(path) = &toml_config.root_folder {
        return path.clone();
    }

    default_root_folder()
}

/// Default config file location (`<config dir>/mirage/config.toml`)
pub fn default_config_path() -> Option<PathBuf> {
    if let Ok(path) = std::env::var(CONFIG_FILE_ENV) {
        return Some(PathBuf::from(path));
    }
    dirs::config_dir().map(|d| d.join("mirage").join("config.toml"))
}

/// OS-dependent default root folder path
pub fn default_root_folder() -> PathBuf {
    if cfg!(target_os = "linux") {
        // ~/.local/share/mirage (or /var/lib/mirage for system-wide)
        dirs::data_local_dir()
            .map(|d| d.join("mirage"))
            .unwrap_or_else(|| PathBuf::from("/var/lib/mirage"))
    } else if cfg!(target_os = "macos") {
        dirs::data_dir()
            .map(|d| d.join("mirage"))
            .unwrap_or_else(|| PathBuf::from("/Library/Application Support/mirage"))
    } else if cfg!(target_os = "windows") {
        dirs::data_local_dir()
            .map(|d| d.join("mirage"))
            .unwrap_or_else(|| PathBuf::from("C:\\ProgramData\\mirage"))
    } else {
        PathBuf::from("./mirage_data")
    }
}
