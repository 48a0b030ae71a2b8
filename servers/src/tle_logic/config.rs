use clap::Parser;
use lib_tlestream::configs::config_engine::RECORD_ID_PLACEHOLDER;
use lib_tlestream::configs::EngineConfig;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

const DEFAULT_CONFIG_FILE: &str = "server_tle.conf";
const DEFAULT_HOST: &str = "0.0.0.0";
const DEFAULT_PORT: u16 = 8000;
const DEFAULT_LOG_LEVEL: &str = "info";

/// printf-style placeholder accepted in `TLE_POLL_URL` for compatibility with
/// older deployments.
const LEGACY_ID_PLACEHOLDER: &str = "%u";

#[derive(Parser, Deserialize, Serialize, Debug, Clone, Default, PartialEq)]
#[clap(about = "TLE streaming server", version)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    #[clap(long, env = "SERVER_HOST", help = "Address to bind the HTTP / WebSocket server to.")]
    pub host: Option<String>,

    #[clap(long, env = "SERVER_PORT", help = "Port to listen on for client connections.")]
    pub port: Option<u16>,

    #[clap(long, env = "TLE_CONFIG_PATH", help = "Path to the JSON configuration file.")]
    pub config_path: Option<PathBuf>,

    #[clap(long, env = "TLE_LOG_DIR", help = "Directory for log files.")]
    pub log_dir: Option<PathBuf>,

    #[clap(long, env = "TLE_LOG_LEVEL", help = "Logging level (trace, debug, info, warn, error).")]
    pub log_level: Option<String>,

    #[clap(long, env = "TLE_DATASTORE_DIR", help = "Directory holding <id>.tle files and satcat.csv.")]
    pub datastore_dir: Option<PathBuf>,

    #[clap(long, env = "SATCAT_POLL_URL", help = "URL of the satellite catalog CSV.")]
    pub catalog_url: Option<String>,

    #[clap(long, env = "SATCAT_POLL_INTERVAL_S", help = "Seconds between catalog refreshes.")]
    pub catalog_poll_interval_s: Option<u64>,

    #[clap(long, env = "TLE_POLL_URL", help = "Record URL template; {id} (or %u) is replaced by the object id.")]
    pub record_url: Option<String>,

    #[clap(long, env = "TLE_POLL_INTERVAL_S", help = "Seconds between single-record refreshes.")]
    pub record_poll_interval_s: Option<u64>,

    #[clap(long, env = "TLE_SUBSCRIBER_BUFFER", help = "Queued events per subscriber before it is dropped as unresponsive.")]
    pub subscriber_buffer: Option<usize>,
}

impl Config {
    // Merge two Config structs, where 'other' overrides 'self' for Some values
    fn merge(self, other: Config) -> Config {
        Config {
            host: other.host.or(self.host),
            port: other.port.or(self.port),
            config_path: other.config_path.or(self.config_path),
            log_dir: other.log_dir.or(self.log_dir),
            log_level: other.log_level.or(self.log_level),
            datastore_dir: other.datastore_dir.or(self.datastore_dir),
            catalog_url: other.catalog_url.or(self.catalog_url),
            catalog_poll_interval_s: other.catalog_poll_interval_s.or(self.catalog_poll_interval_s),
            record_url: other.record_url.or(self.record_url),
            record_poll_interval_s: other.record_poll_interval_s.or(self.record_poll_interval_s),
            subscriber_buffer: other.subscriber_buffer.or(self.subscriber_buffer),
        }
    }

    /// Built-in values, mirroring [`EngineConfig::default`] for the engine knobs.
    pub fn defaults() -> Config {
        let engine = EngineConfig::default();
        Config {
            host: Some(DEFAULT_HOST.to_string()),
            port: Some(DEFAULT_PORT),
            log_dir: Some(PathBuf::from("./logs")),
            log_level: Some(DEFAULT_LOG_LEVEL.to_string()),
            datastore_dir: Some(engine.datastore_dir),
            catalog_url: Some(engine.catalog_url),
            catalog_poll_interval_s: Some(engine.catalog_poll_interval.as_secs()),
            record_url: Some(engine.record_url_template),
            record_poll_interval_s: Some(engine.record_poll_interval.as_secs()),
            subscriber_buffer: Some(engine.subscriber_buffer),
            ..Default::default()
        }
    }

    pub fn bind_addr(&self) -> String {
        format!(
            "{}:{}",
            self.host.as_deref().unwrap_or(DEFAULT_HOST),
            self.port.unwrap_or(DEFAULT_PORT)
        )
    }

    pub fn log_dir(&self) -> PathBuf {
        self.log_dir.clone().unwrap_or_else(|| PathBuf::from("./logs"))
    }

    pub fn log_level(&self) -> String {
        self.log_level.clone().unwrap_or_else(|| DEFAULT_LOG_LEVEL.to_string())
    }

    /// The engine's view of this configuration; unset fields keep the engine defaults.
    pub fn to_engine_config(&self) -> EngineConfig {
        let mut engine = EngineConfig::default();
        if let Some(dir) = &self.datastore_dir {
            engine.datastore_dir = dir.clone();
        }
        if let Some(url) = &self.catalog_url {
            engine.catalog_url = url.clone();
        }
        if let Some(secs) = self.catalog_poll_interval_s {
            engine.catalog_poll_interval = Duration::from_secs(secs.max(1));
        }
        if let Some(url) = &self.record_url {
            engine.record_url_template = url.replace(LEGACY_ID_PLACEHOLDER, RECORD_ID_PLACEHOLDER);
        }
        if let Some(secs) = self.record_poll_interval_s {
            engine.record_poll_interval = Duration::from_secs(secs.max(1));
        }
        if let Some(buffer) = self.subscriber_buffer {
            engine.subscriber_buffer = buffer.max(1);
        }
        engine
    }
}

/// Reads a JSON config file. A missing or malformed file yields `None`.
fn read_config_file(path: &Path) -> Option<Config> {
    if !path.exists() {
        log::info!(
            "Config file not found at {}. Using defaults and environment/CLI variables.",
            path.display()
        );
        return None;
    }

    match fs::read_to_string(path) {
        Ok(config_str) => match serde_json::from_str::<Config>(&config_str) {
            Ok(file_config) => Some(file_config),
            Err(e) => {
                log::warn!("Failed to parse config file {}: {}. Falling back to other sources.", path.display(), e);
                None
            }
        },
        Err(e) => {
            log::warn!("Failed to read config file {}: {}. Falling back to other sources.", path.display(), e);
            None
        }
    }
}

/// Layers defaults, then the config file, then CLI / environment values.
fn resolve(cli: Config, file: Option<Config>) -> Config {
    let mut current_config = Config::defaults();
    if let Some(file_config) = file {
        current_config = current_config.merge(file_config);
    }
    current_config.merge(cli)
}

pub fn load_config() -> Config {
    // clap handles both CLI arguments and environment variables.
    let cli_args = Config::parse();

    let config_file_path = cli_args
        .config_path
        .clone()
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE));

    let file_config = read_config_file(&config_file_path);
    resolve(cli_args, file_config)
}
