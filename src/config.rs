//! Server configuration.
//!
//! Every field has a default, so an empty TOML file is a valid configuration:
//!
//! ```toml
//! socket = ":9000"
//! backlog = 16
//! workers = 5
//! read_timeout = 30
//! uri_prefix = "/"
//! format = "compat"
//! log_level = "info"
//! log_json = false
//! proc_root = "/proc"
//! ```

use std::{
    fmt, fs,
    path::{Path, PathBuf},
    str::FromStr,
    time::Duration,
};

use serde::Deserialize;

use crate::{response::Format, v1::PROC_ROOT, Error, ErrorKind, Result};

/// Where the server listens.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(try_from = "String")]
pub enum SocketSpec {
    /// A TCP address. `:<port>` listens on every IPv4 interface.
    Tcp {
        /// Host name or address.
        host: String,
        /// Port number.
        port: u16,
    },
    /// A Unix domain socket path.
    Unix(PathBuf),
}

impl FromStr for SocketSpec {
    type Err = Error;

    /// Parses `:<port>`, `<host>:<port>`, or a Unix socket path.
    fn from_str(s: &str) -> Result<Self> {
        if let Some(port) = s.strip_prefix(':') {
            return match port.parse() {
                Ok(port) => Ok(SocketSpec::Tcp {
                    host: "0.0.0.0".to_string(),
                    port,
                }),
                Err(e) => Err(Error::with_context(
                    ErrorKind::InvalidArgument,
                    format!("invalid port `{}': {}", port, e),
                )),
            };
        }

        if let Some((host, port)) = s.rsplit_once(':') {
            if let Ok(port) = port.parse() {
                let host = host.trim_start_matches('[').trim_end_matches(']');
                return Ok(SocketSpec::Tcp {
                    host: host.to_string(),
                    port,
                });
            }
        }

        if s.is_empty() {
            bail_invalid!("empty socket");
        }
        Ok(SocketSpec::Unix(PathBuf::from(s)))
    }
}

impl TryFrom<String> for SocketSpec {
    type Error = Error;

    fn try_from(s: String) -> Result<Self> {
        s.parse()
    }
}

impl fmt::Display for SocketSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SocketSpec::Tcp { host, port } if host.contains(':') => write!(f, "[{}]:{}", host, port),
            SocketSpec::Tcp { host, port } => write!(f, "{}:{}", host, port),
            SocketSpec::Unix(path) => write!(f, "{}", path.display()),
        }
    }
}

/// Server configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Listening socket.
    pub socket: SocketSpec,
    /// Depth of the queue of pending connections.
    pub backlog: u32,
    /// Number of worker threads.
    pub workers: usize,
    /// Seconds a connection may stay silent while its request head is read. `0` waits forever.
    pub read_timeout: u64,
    /// Prefix every request URI must start with.
    pub uri_prefix: String,
    /// Output format of response bodies.
    pub format: Format,
    /// Default log filter, overridden by `RUST_LOG`.
    pub log_level: String,
    /// Whether to log in JSON.
    pub log_json: bool,
    /// Root of the proc file system.
    pub proc_root: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            socket: SocketSpec::Tcp {
                host: "0.0.0.0".to_string(),
                port: 9000,
            },
            backlog: 16,
            workers: 5,
            read_timeout: 30,
            uri_prefix: "/".to_string(),
            format: Format::Compat,
            log_level: "info".to_string(),
            log_json: false,
            proc_root: PathBuf::from(PROC_ROOT),
        }
    }
}

impl Config {
    /// Reads a configuration from a TOML file. Missing fields take their defaults.
    ///
    /// # Errors
    ///
    /// Returns an error if the file could not be read, is not valid TOML, or has an invalid
    /// value.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content).map_err(Error::parse)?;
        config.validate()?;
        Ok(config)
    }

    /// Checks the values that have no valid zero.
    ///
    /// # Errors
    ///
    /// Returns an error with kind `InvalidArgument` if `backlog` or `workers` is zero.
    pub fn validate(&self) -> Result<()> {
        if self.backlog == 0 {
            bail_invalid!("backlog must be a positive integer");
        }
        if self.workers == 0 {
            bail_invalid!("number of threads must be a positive integer");
        }
        Ok(())
    }

    /// Returns the read timeout of accepted connections, `None` if disabled.
    pub fn read_timeout(&self) -> Option<Duration> {
        match self.read_timeout {
            0 => None,
            secs => Some(Duration::from_secs(secs)),
        }
    }

    /// Describes the worker count for humans, e.g. `1 worker` or `5 workers`.
    pub fn workers_description(&self) -> String {
        match self.workers {
            1 => "1 worker".to_string(),
            n => format!("{} workers", n),
        }
    }
}
