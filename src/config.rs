//! # Configuration Management
//!
//! Centralized configuration for the listener and its logging.
//!
//! ## Configuration Sources
//! - TOML files via `from_file()` / `from_toml()`
//! - Direct instantiation with defaults
//! - Environment overrides via `from_env()`
//!
//! A server clones its [`ServerConfig`] at construction; later changes to the
//! caller's copy have no effect on a running listener.

use crate::error::{ProtocolError, Result};
use crate::utils::timeout;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::Read;
use std::path::Path;
use std::time::Duration;
use tracing::Level;

/// Default bind port
pub const DEFAULT_PORT: u16 = 62817;

/// Default ceiling on concurrently registered connections
pub const MAX_CONNECTIONS: usize = 512;

/// Default number of worker slots (0 disables the pool)
pub const WORKER_POOL_SIZE: usize = 8;

/// Default capacity of each worker slot's queue
pub const WORKER_QUEUE_LENGTH: usize = 1024;

/// Default maximum inbound payload size in bytes (0 = unlimited)
pub const MAX_PACKET_SIZE: u32 = 4096;

/// Default capacity of each connection's outbound queue
pub const OUTBOUND_QUEUE_LENGTH: usize = 1024;

/// Main configuration structure that contains all configurable settings
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct NetworkConfig {
    /// Listener configuration
    #[serde(default)]
    pub server: ServerConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl NetworkConfig {
    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut file = File::open(path)
            .map_err(|e| ProtocolError::ConfigError(format!("Failed to open config file: {e}")))?;

        let mut contents = String::new();
        file.read_to_string(&mut contents)
            .map_err(|e| ProtocolError::ConfigError(format!("Failed to read config file: {e}")))?;

        Self::from_toml(&contents)
    }

    /// Load configuration from TOML string
    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str::<Self>(content)
            .map_err(|e| ProtocolError::ConfigError(format!("Failed to parse TOML: {e}")))
    }

    /// Load configuration from environment variables
    ///
    /// Unparseable values are ignored and the default is kept.
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();

        if let Ok(ip) = std::env::var("ORBIT_IP") {
            config.server.ip = ip;
        }

        if let Ok(port) = std::env::var("ORBIT_PORT") {
            if let Ok(val) = port.parse::<u16>() {
                config.server.port = val;
            }
        }

        if let Ok(conns) = std::env::var("ORBIT_MAX_CONNECTIONS") {
            if let Ok(val) = conns.parse::<usize>() {
                config.server.max_connections = val;
            }
        }

        if let Ok(pool) = std::env::var("ORBIT_WORKER_POOL_SIZE") {
            if let Ok(val) = pool.parse::<usize>() {
                config.server.worker_pool_size = val;
            }
        }

        if let Ok(len) = std::env::var("ORBIT_WORKER_QUEUE_LENGTH") {
            if let Ok(val) = len.parse::<usize>() {
                config.server.worker_queue_length = val;
            }
        }

        if let Ok(size) = std::env::var("ORBIT_MAX_PACKET_SIZE") {
            if let Ok(val) = size.parse::<u32>() {
                config.server.max_packet_size = val;
            }
        }

        if let Ok(timeout) = std::env::var("ORBIT_SHUTDOWN_TIMEOUT_MS") {
            if let Ok(val) = timeout.parse::<u64>() {
                config.server.shutdown_timeout = Duration::from_millis(val);
            }
        }

        Ok(config)
    }

    /// Apply overrides to the default configuration
    pub fn default_with_overrides<F>(mutator: F) -> Self
    where
        F: FnOnce(&mut Self),
    {
        let mut config = Self::default();
        mutator(&mut config);
        config
    }

    /// Generate example configuration file content
    pub fn example_config() -> String {
        toml::to_string_pretty(&Self::default())
            .unwrap_or_else(|_| String::from("# Failed to generate example config"))
    }

    /// Save configuration to a file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| ProtocolError::ConfigError(format!("Failed to serialize config: {e}")))?;

        std::fs::write(path, content)
            .map_err(|e| ProtocolError::ConfigError(format!("Failed to write config file: {e}")))?;

        Ok(())
    }

    /// Validate the configuration for common issues and misconfigurations
    ///
    /// Returns a list of validation errors. Empty list means configuration is valid.
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();
        errors.extend(self.server.validate());
        errors.extend(self.logging.validate());
        errors
    }

    /// Validate and return Result - convenience method
    pub fn validate_strict(&self) -> Result<()> {
        let errors = self.validate();
        if errors.is_empty() {
            Ok(())
        } else {
            Err(ProtocolError::ConfigError(format!(
                "Configuration validation failed:\n  - {}",
                errors.join("\n  - ")
            )))
        }
    }
}

/// Transport family used when resolving the bind address
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Network {
    /// IPv4 or IPv6, whichever resolves first
    #[default]
    Tcp,
    /// IPv4 only
    Tcp4,
    /// IPv6 only
    Tcp6,
}

impl Network {
    /// Whether `addr` belongs to this family
    pub fn accepts(self, addr: &std::net::SocketAddr) -> bool {
        match self {
            Network::Tcp => true,
            Network::Tcp4 => addr.is_ipv4(),
            Network::Tcp6 => addr.is_ipv6(),
        }
    }
}

/// Operating-system signals that trigger a graceful shutdown
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ShutdownSignal {
    /// SIGINT / Ctrl-C
    Interrupt,
    /// SIGTERM
    Terminate,
    /// SIGHUP
    Hangup,
    /// SIGQUIT
    Quit,
}

/// Listener configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Address family filter for resolution
    pub network: Network,

    /// Bind host (IP literal or resolvable name)
    pub ip: String,

    /// Bind port (0 picks an ephemeral port)
    pub port: u16,

    /// Maximum number of concurrently registered connections
    pub max_connections: usize,

    /// Number of worker slots; 0 dispatches directly on each connection's reader
    pub worker_pool_size: usize,

    /// Capacity of each worker slot's task queue
    pub worker_queue_length: usize,

    /// Maximum inbound payload size in bytes; 0 means unlimited
    pub max_packet_size: u32,

    /// Capacity of each connection's outbound frame queue
    pub outbound_queue_length: usize,

    /// Bounded wait when enqueuing an outbound frame
    #[serde(with = "duration_serde")]
    pub send_timeout: Duration,

    /// How long `run` waits for connections to finish teardown after stopping
    #[serde(with = "duration_serde")]
    pub shutdown_timeout: Duration,

    /// Signals that trigger shutdown; empty leaves only external cancellation
    pub shutdown_signals: Vec<ShutdownSignal>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            network: Network::Tcp,
            ip: String::from("127.0.0.1"),
            port: DEFAULT_PORT,
            max_connections: MAX_CONNECTIONS,
            worker_pool_size: WORKER_POOL_SIZE,
            worker_queue_length: WORKER_QUEUE_LENGTH,
            max_packet_size: MAX_PACKET_SIZE,
            outbound_queue_length: OUTBOUND_QUEUE_LENGTH,
            send_timeout: timeout::SEND_TIMEOUT,
            shutdown_timeout: timeout::SHUTDOWN_TIMEOUT,
            shutdown_signals: vec![ShutdownSignal::Interrupt, ShutdownSignal::Terminate],
        }
    }
}

impl ServerConfig {
    /// `ip:port` as handed to the resolver; IPv6 literals are bracketed
    pub fn address(&self) -> String {
        if self.ip.contains(':') && !self.ip.starts_with('[') {
            format!("[{}]:{}", self.ip, self.port)
        } else {
            format!("{}:{}", self.ip, self.port)
        }
    }

    /// Whether inbound frames go through the worker pool
    pub fn uses_worker_pool(&self) -> bool {
        self.worker_pool_size > 0
    }

    /// Validate server configuration
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        if self.ip.is_empty() {
            errors.push("Server ip cannot be empty".to_string());
        }

        if self.max_connections == 0 {
            errors.push("Max connections must be greater than 0".to_string());
        }

        if self.uses_worker_pool() && self.worker_queue_length == 0 {
            errors.push(
                "Worker queue length must be greater than 0 when the worker pool is enabled"
                    .to_string(),
            );
        }

        if self.worker_pool_size > 4096 {
            errors.push(format!(
                "Worker pool size too large: {} (maximum: 4096)",
                self.worker_pool_size
            ));
        }

        if self.outbound_queue_length == 0 {
            errors.push("Outbound queue length must be greater than 0".to_string());
        }

        if self.send_timeout.is_zero() {
            errors.push("Send timeout must be greater than 0".to_string());
        } else if self.send_timeout.as_secs() > 10 {
            errors.push("Send timeout too long (maximum: 10s)".to_string());
        }

        if self.shutdown_timeout.as_secs() > 60 {
            errors.push("Shutdown timeout too long (maximum: 60s)".to_string());
        }

        errors
    }
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Application name for logs
    pub app_name: String,

    /// Log level
    #[serde(with = "log_level_serde")]
    pub log_level: Level,

    /// Whether to log to console
    pub log_to_console: bool,

    /// Whether to log to file
    pub log_to_file: bool,

    /// Path to log file (if log_to_file is true)
    pub log_file_path: Option<String>,

    /// Whether to use JSON formatting for logs
    pub json_format: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            app_name: String::from("orbit"),
            log_level: Level::INFO,
            log_to_console: true,
            log_to_file: false,
            log_file_path: None,
            json_format: false,
        }
    }
}

impl LoggingConfig {
    /// Validate logging configuration
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        if self.app_name.is_empty() {
            errors.push("Application name cannot be empty".to_string());
        } else if self.app_name.len() > 64 {
            errors.push(format!(
                "Application name too long: {} characters (maximum: 64)",
                self.app_name.len()
            ));
        }

        if self.log_to_file {
            if let Some(ref path) = self.log_file_path {
                if let Some(parent) = std::path::Path::new(path).parent() {
                    if !parent.as_os_str().is_empty() && !parent.exists() {
                        errors.push(format!(
                            "Log file directory does not exist: {}",
                            parent.display()
                        ));
                    }
                }
            } else {
                errors.push("log_file_path must be specified when log_to_file is true".to_string());
            }
        }

        if !self.log_to_console && !self.log_to_file {
            errors
                .push("At least one logging output (console or file) must be enabled".to_string());
        }

        errors
    }
}

/// Helper module for Duration serialization/deserialization
mod duration_serde {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let millis = duration.as_millis() as u64;
        millis.serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let millis = u64::deserialize(deserializer)?;
        Ok(Duration::from_millis(millis))
    }
}

/// Helper module for tracing::Level serialization/deserialization
mod log_level_serde {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::str::FromStr;
    use tracing::Level;

    pub fn serialize<S>(level: &Level, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let level_str = match *level {
            Level::TRACE => "trace",
            Level::DEBUG => "debug",
            Level::INFO => "info",
            Level::WARN => "warn",
            Level::ERROR => "error",
        };
        level_str.serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Level, D::Error>
    where
        D: Deserializer<'de>,
    {
        let level_str = String::deserialize(deserializer)?;
        Level::from_str(&level_str)
            .map_err(|_| serde::de::Error::custom(format!("Invalid log level: {level_str}")))
    }
}
