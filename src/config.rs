//! Configuration loading
//!
//! Resolution priority, highest first:
//! 1. Command-line argument
//! 2. Environment variable (`ROLLCALL_*`)
//! 3. TOML config file (`rollcall.toml` or `--config <path>`)
//! 4. Compiled default

use clap::Parser;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, warn};

use crate::{Error, Result};

/// Command-line arguments. Each option also has an environment fallback, so
/// tiers 1 and 2 are resolved together by clap.
#[derive(Debug, Parser, Default)]
#[command(name = "rollcall", about = "Event check-in and attendance tracking")]
pub struct Args {
    /// Session key override, M_D_YYYY (resume a previous session's records)
    pub session: Option<String>,

    /// Path to a TOML config file
    #[arg(long, env = "ROLLCALL_CONFIG")]
    pub config: Option<PathBuf>,

    /// Directory holding the database, roster sheets, and exports
    #[arg(long, env = "ROLLCALL_DATA_DIR")]
    pub data_dir: Option<PathBuf>,

    /// HTTP listen host
    #[arg(long, env = "ROLLCALL_HOST")]
    pub host: Option<String>,

    /// HTTP listen port
    #[arg(long, env = "ROLLCALL_PORT")]
    pub port: Option<u16>,

    /// Remote aggregation server address (host:port)
    #[arg(long, env = "ROLLCALL_SYNC_ADDR")]
    pub sync_addr: Option<String>,

    /// Debug mode: never contact the remote aggregation server
    #[arg(short, long)]
    pub debug: bool,
}

/// Optional values from the TOML config file.
#[derive(Debug, Default, Deserialize)]
pub struct TomlConfig {
    pub data_dir: Option<PathBuf>,
    pub host: Option<String>,
    pub port: Option<u16>,
    pub roster_file: Option<String>,
    pub static_dir: Option<PathBuf>,
    pub autosave_interval_secs: Option<u64>,
    pub sync_addr: Option<String>,
    pub sync_retry_attempts: Option<u32>,
    pub sync_retry_delay_ms: Option<u64>,
}

/// Fully resolved configuration.
#[derive(Debug, Clone)]
pub struct Config {
    pub data_dir: PathBuf,
    pub host: String,
    pub port: u16,
    /// Shared roster sheet filename (per-session variants derive from it)
    pub roster_file: String,
    pub static_dir: PathBuf,
    pub autosave_interval: Duration,
    /// None disables the remote sync client entirely
    pub sync_addr: Option<String>,
    pub sync_retry_attempts: u32,
    pub sync_retry_delay: Duration,
    /// Session key override from the command line, if any
    pub session_override: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("./rollcall_data"),
            host: "127.0.0.1".to_string(),
            port: 8000,
            roster_file: "Master.csv".to_string(),
            static_dir: PathBuf::from("static"),
            autosave_interval: Duration::from_secs(60),
            sync_addr: None,
            sync_retry_attempts: 3,
            sync_retry_delay: Duration::from_secs(5),
            session_override: None,
        }
    }
}

impl Config {
    /// Resolve configuration from the process arguments and environment.
    pub fn load() -> Result<Self> {
        let args = Args::parse();
        let toml = load_toml(args.config.as_deref())?;
        Ok(resolve(args, toml))
    }

    /// Path of the SQLite database file.
    pub fn database_path(&self) -> PathBuf {
        self.data_dir.join("rollcall.db")
    }

    /// Path of the shared roster sheet.
    pub fn roster_path(&self) -> PathBuf {
        self.data_dir.join(&self.roster_file)
    }

    /// Path of the per-session roster sheet for a session key.
    pub fn session_roster_path(&self, session_key: &str) -> PathBuf {
        self.data_dir
            .join(format!("{}_{}", session_key, self.roster_file))
    }

    /// Path of the per-session flat CSV export.
    pub fn export_path(&self, session_key: &str) -> PathBuf {
        self.data_dir.join(format!("{}_Export.csv", session_key))
    }
}

fn load_toml(explicit: Option<&Path>) -> Result<TomlConfig> {
    let path = match explicit {
        Some(p) => p.to_path_buf(),
        None => {
            let default = PathBuf::from("rollcall.toml");
            if !default.exists() {
                return Ok(TomlConfig::default());
            }
            default
        }
    };

    let content = std::fs::read_to_string(&path)
        .map_err(|e| Error::Config(format!("Failed to read {}: {}", path.display(), e)))?;
    let parsed: TomlConfig = toml::from_str(&content)
        .map_err(|e| Error::Config(format!("Failed to parse {}: {}", path.display(), e)))?;
    info!("Loaded config file {}", path.display());
    Ok(parsed)
}

/// Merge the tiers. Pure so tests can drive it without a process
/// environment.
fn resolve(args: Args, toml: TomlConfig) -> Config {
    let defaults = Config::default();

    let sync_addr = if args.debug {
        if args.sync_addr.is_some() || toml.sync_addr.is_some() {
            warn!("Debug mode: remote sync disabled");
        }
        None
    } else {
        args.sync_addr.or(toml.sync_addr)
    };

    Config {
        data_dir: args.data_dir.or(toml.data_dir).unwrap_or(defaults.data_dir),
        host: args.host.or(toml.host).unwrap_or(defaults.host),
        port: args.port.or(toml.port).unwrap_or(defaults.port),
        roster_file: toml.roster_file.unwrap_or(defaults.roster_file),
        static_dir: toml.static_dir.unwrap_or(defaults.static_dir),
        autosave_interval: toml
            .autosave_interval_secs
            .map(Duration::from_secs)
            .unwrap_or(defaults.autosave_interval),
        sync_addr,
        sync_retry_attempts: toml
            .sync_retry_attempts
            .unwrap_or(defaults.sync_retry_attempts),
        sync_retry_delay: toml
            .sync_retry_delay_ms
            .map(Duration::from_millis)
            .unwrap_or(defaults.sync_retry_delay),
        session_override: args.session,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_apply_when_nothing_is_set() {
        let config = resolve(Args::default(), TomlConfig::default());
        assert_eq!(config.port, 8000);
        assert_eq!(config.host, "127.0.0.1");
        assert_eq!(config.roster_file, "Master.csv");
        assert_eq!(config.autosave_interval, Duration::from_secs(60));
        assert_eq!(config.sync_retry_attempts, 3);
        assert!(config.sync_addr.is_none());
    }

    #[test]
    fn cli_overrides_toml() {
        let args = Args {
            port: Some(9001),
            ..Default::default()
        };
        let toml: TomlConfig = toml::from_str("port = 8080\nroster_file = \"Roster.csv\"").unwrap();

        let config = resolve(args, toml);
        assert_eq!(config.port, 9001);
        assert_eq!(config.roster_file, "Roster.csv");
    }

    #[test]
    fn debug_mode_disables_sync() {
        let args = Args {
            debug: true,
            sync_addr: Some("sync.example:7777".into()),
            ..Default::default()
        };
        let config = resolve(args, TomlConfig::default());
        assert!(config.sync_addr.is_none());
    }

    #[test]
    fn derived_paths_land_in_data_dir() {
        let config = resolve(Args::default(), TomlConfig::default());
        assert_eq!(
            config.session_roster_path("3_10_2016"),
            PathBuf::from("./rollcall_data/3_10_2016_Master.csv")
        );
        assert_eq!(
            config.export_path("3_10_2016"),
            PathBuf::from("./rollcall_data/3_10_2016_Export.csv")
        );
    }
}
