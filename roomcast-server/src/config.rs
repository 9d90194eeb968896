//! Configuration for the Roomcast server.
//!
//! Supports layered configuration with the following priority (highest first):
//! 1. CLI arguments
//! 2. Environment variables (via clap `env` attribute)
//! 3. TOML config file (`~/.config/roomcast/config.toml`)
//! 4. Compiled defaults

use std::path::PathBuf;
use std::time::Duration;

/// Errors that can occur when loading server configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read the configuration file.
    #[error("failed to read config file {path}: {source}")]
    ReadFile {
        /// Path that was attempted.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// Failed to parse the TOML configuration.
    #[error("failed to parse config file: {0}")]
    ParseToml(#[from] toml::de::Error),
}

// ---------------------------------------------------------------------------
// TOML file structs (all fields Option for partial overrides)
// ---------------------------------------------------------------------------

/// Top-level TOML config file structure.
#[derive(Debug, Default, serde::Deserialize)]
#[serde(default)]
struct ServerConfigFile {
    server: ServerFileSection,
    limits: LimitsFileSection,
}

/// `[server]` section of the config file.
#[derive(Debug, Default, serde::Deserialize)]
#[serde(default)]
struct ServerFileSection {
    bind_host: Option<String>,
    tcp_port: Option<u16>,
    udp_port: Option<u16>,
}

/// `[limits]` section of the config file.
#[derive(Debug, Default, serde::Deserialize)]
#[serde(default)]
struct LimitsFileSection {
    idle_timeout_secs: Option<u64>,
    max_payload_size: Option<usize>,
    max_message_len: Option<usize>,
    rate_limit_per_sec: Option<u32>,
}

// ---------------------------------------------------------------------------
// CLI arguments
// ---------------------------------------------------------------------------

/// CLI arguments for the Roomcast server.
#[derive(clap::Parser, Debug, Default)]
#[command(version, about = "Roomcast chat relay server")]
pub struct ServerCliArgs {
    /// Host address to bind both listeners to.
    #[arg(short = 'H', long, env = "ROOMCAST_HOST")]
    pub host: Option<String>,

    /// TCP port for the control plane (create/join requests).
    #[arg(short, long, env = "ROOMCAST_TCP_PORT")]
    pub tcp_port: Option<u16>,

    /// UDP port for the data plane (chat datagrams).
    #[arg(short, long, env = "ROOMCAST_UDP_PORT")]
    pub udp_port: Option<u16>,

    /// Path to config file (default: `~/.config/roomcast/config.toml`).
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Inactivity timeout in seconds before an endpoint is evicted.
    #[arg(long)]
    pub idle_timeout_secs: Option<u64>,

    /// Maximum control-plane payload size in bytes.
    #[arg(long)]
    pub max_payload_size: Option<usize>,

    /// Maximum chat message length in bytes.
    #[arg(long)]
    pub max_message_len: Option<usize>,

    /// Maximum datagrams accepted per endpoint per second.
    #[arg(long)]
    pub rate_limit_per_sec: Option<u32>,

    /// Log level filter (trace, debug, info, warn, error).
    #[arg(long, default_value = "info", env = "ROOMCAST_LOG")]
    pub log_level: String,
}

// ---------------------------------------------------------------------------
// Resolved configuration
// ---------------------------------------------------------------------------

/// Fully resolved server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Host address to bind both listeners to (e.g. `0.0.0.0`).
    pub bind_host: String,
    /// TCP port for the control plane.
    pub tcp_port: u16,
    /// UDP port for the data plane.
    pub udp_port: u16,
    /// Inactivity timeout; also the reaper's scan period.
    pub idle_timeout: Duration,
    /// Maximum control-plane payload size in bytes.
    pub max_payload_size: usize,
    /// Maximum chat message length in bytes.
    pub max_message_len: usize,
    /// Maximum datagrams accepted per endpoint per second.
    pub rate_limit_per_sec: u32,
    /// Log level filter string.
    pub log_level: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_host: "0.0.0.0".to_string(),
            tcp_port: 9091,
            udp_port: 9090,
            idle_timeout: Duration::from_secs(300),
            max_payload_size: 64 * 1024,
            max_message_len: 1024,
            rate_limit_per_sec: 5,
            log_level: "info".to_string(),
        }
    }
}

impl ServerConfig {
    /// Load configuration by merging CLI args, env vars, and a TOML file.
    ///
    /// If `--config` is given and the file does not exist, returns an error.
    /// If no `--config` is given, the default path is tried and a missing
    /// file is treated as empty config.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the explicit config file cannot be read
    /// or parsed.
    pub fn load(cli: &ServerCliArgs) -> Result<Self, ConfigError> {
        let file = load_config_file(cli.config.as_deref())?;
        Ok(Self::resolve(cli, &file))
    }

    /// Resolve a `ServerConfig` from CLI args and a parsed config file.
    ///
    /// Priority: CLI > file > default.
    #[must_use]
    fn resolve(cli: &ServerCliArgs, file: &ServerConfigFile) -> Self {
        let defaults = Self::default();

        Self {
            bind_host: cli
                .host
                .clone()
                .or_else(|| file.server.bind_host.clone())
                .unwrap_or(defaults.bind_host),
            tcp_port: cli
                .tcp_port
                .or(file.server.tcp_port)
                .unwrap_or(defaults.tcp_port),
            udp_port: cli
                .udp_port
                .or(file.server.udp_port)
                .unwrap_or(defaults.udp_port),
            idle_timeout: cli
                .idle_timeout_secs
                .or(file.limits.idle_timeout_secs)
                .map_or(defaults.idle_timeout, Duration::from_secs),
            max_payload_size: cli
                .max_payload_size
                .or(file.limits.max_payload_size)
                .unwrap_or(defaults.max_payload_size),
            max_message_len: cli
                .max_message_len
                .or(file.limits.max_message_len)
                .unwrap_or(defaults.max_message_len),
            rate_limit_per_sec: cli
                .rate_limit_per_sec
                .or(file.limits.rate_limit_per_sec)
                .unwrap_or(defaults.rate_limit_per_sec),
            log_level: cli.log_level.clone(),
        }
    }

    /// Control-plane bind address, `host:tcp_port`.
    #[must_use]
    pub fn tcp_addr(&self) -> String {
        format!("{}:{}", self.bind_host, self.tcp_port)
    }

    /// Data-plane bind address, `host:udp_port`.
    #[must_use]
    pub fn udp_addr(&self) -> String {
        format!("{}:{}", self.bind_host, self.udp_port)
    }
}

// ---------------------------------------------------------------------------
// Internal helpers
// ---------------------------------------------------------------------------

/// Load and parse a TOML config file for the server.
fn load_config_file(
    explicit_path: Option<&std::path::Path>,
) -> Result<ServerConfigFile, ConfigError> {
    let path = if let Some(p) = explicit_path {
        let contents = std::fs::read_to_string(p).map_err(|e| ConfigError::ReadFile {
            path: p.to_path_buf(),
            source: e,
        })?;
        return Ok(toml::from_str(&contents)?);
    } else {
        let Some(config_dir) = dirs::config_dir() else {
            return Ok(ServerConfigFile::default());
        };
        config_dir.join("roomcast").join("config.toml")
    };

    match std::fs::read_to_string(&path) {
        Ok(contents) => Ok(toml::from_str(&contents)?),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(ServerConfigFile::default()),
        Err(e) => Err(ConfigError::ReadFile { path, source: e }),
    }
}
