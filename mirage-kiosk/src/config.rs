//! Command-line arguments and resolved service configuration

use clap::Parser;
use mirage_common::config::{resolve_root_folder, FlowConfig, GenerationConfig, TomlConfig};
use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;

/// Default listen port
pub const DEFAULT_PORT: u16 = 5780;

/// Command-line arguments for mirage-kiosk
#[derive(Parser, Debug, Clone)]
#[command(name = "mirage-kiosk")]
#[command(about = "Photo installation kiosk service")]
#[command(version)]
pub struct Args {
    /// Port to listen on
    #[arg(short, long, default_value_t = DEFAULT_PORT, env = "MIRAGE_PORT")]
    pub port: u16,

    /// Address to bind
    #[arg(short, long, default_value = "127.0.0.1", env = "MIRAGE_BIND")]
    pub bind: IpAddr,

    /// Root folder holding the database
    #[arg(short, long, env = "MIRAGE_ROOT_FOLDER")]
    pub root_folder: Option<PathBuf>,

    /// TOML configuration file
    #[arg(short, long, env = "MIRAGE_CONFIG")]
    pub config: Option<PathBuf>,

    /// Gemini API key
    #[arg(long, env = "GEMINI_API_KEY", hide_env_values = true)]
    pub gemini_api_key: Option<String>,
}

/// Fully resolved settings for one service run
#[derive(Debug, Clone)]
pub struct KioskConfig {
    pub listen_addr: SocketAddr,
    pub root_folder: PathBuf,
    pub database_path: PathBuf,
    pub log_level: String,
    pub generation: GenerationConfig,
    pub flow: FlowConfig,
}

impl KioskConfig {
    /// Merge arguments over the TOML file and compiled defaults
    pub fn resolve(args: &Args, toml_config: TomlConfig) -> Self {
        let root_folder = resolve_root_folder(args.root_folder.as_deref(), &toml_config);
        let database_path = toml_config.database_path(&root_folder);

        let mut generation = toml_config.generation;
        if let Some(key) = args.gemini_api_key.as_ref().filter(|k| !k.trim().is_empty()) {
            generation.api_key = Some(key.clone());
        }

        Self {
            listen_addr: SocketAddr::new(args.bind, args.port),
            root_folder,
            database_path,
            log_level: toml_config.logging.level,
            generation,
            flow: toml_config.flow,
        }
    }

    /// API key, if one was configured anywhere
    pub fn api_key(&self) -> Option<&str> {
        self.generation
            .api_key
            .as_deref()
            .map(str::trim)
            .filter(|k| !k.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(extra: &[&str]) -> Args {
        let mut argv = vec!["mirage-kiosk", "--root-folder", "/tmp/mirage-test"];
        argv.extend_from_slice(extra);
        Args::try_parse_from(argv).unwrap()
    }

    #[test]
    fn test_cli_key_overrides_toml() {
        let toml_config = TomlConfig::from_toml_str("[generation]\napi_key = \"from-toml\"\n").unwrap();
        let config = KioskConfig::resolve(&args(&["--gemini-api-key", "from-cli"]), toml_config);
        assert_eq!(config.api_key(), Some("from-cli"));
    }

    #[test]
    fn test_toml_key_used_when_no_cli_key() {
        let toml_config = TomlConfig::from_toml_str("[generation]\napi_key = \"from-toml\"\n").unwrap();
        let mut parsed = args(&[]);
        parsed.gemini_api_key = None;
        let config = KioskConfig::resolve(&parsed, toml_config);
        assert_eq!(config.api_key(), Some("from-toml"));
    }

    #[test]
    fn test_blank_key_is_absent() {
        let mut parsed = args(&[]);
        parsed.gemini_api_key = Some("   ".to_string());
        let config = KioskConfig::resolve(&parsed, TomlConfig::default());
        assert_eq!(config.api_key(), None);
    }

    #[test]
    fn test_listen_addr_and_database_path() {
        let mut parsed = args(&["--port", "6000", "--bind", "0.0.0.0"]);
        parsed.gemini_api_key = None;
        let config = KioskConfig::resolve(&parsed, TomlConfig::default());

        assert_eq!(config.listen_addr, "0.0.0.0:6000".parse().unwrap());
        assert_eq!(config.root_folder, PathBuf::from("/tmp/mirage-test"));
        assert_eq!(config.database_path, PathBuf::from("/tmp/mirage-test/mirage.db"));
        assert_eq!(config.flow.reveal_delay_ms, 1000);
    }
}
