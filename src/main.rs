use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use cgroups_rest::{
    config::{Config, SocketSpec},
    response::Format,
    router::Dispatcher,
    server::{HttpListener, WorkerPool},
    v1::Cgroupfs,
};

/// HTTP interface to cgroup hierarchies.
#[derive(Debug, Parser)]
#[command(version, about)]
struct Args {
    /// TOML configuration file. Command-line options override its values.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Socket to listen on: a Unix socket path, `:port`, or `host:port` [default: :9000]
    #[arg(short, long)]
    socket: Option<SocketSpec>,

    /// Listen queue depth [default: 16]
    #[arg(short, long)]
    backlog: Option<u32>,

    /// Number of worker threads [default: 5]
    #[arg(short = 'w', long = "threads")]
    workers: Option<usize>,

    /// Seconds to wait for a request head before dropping the connection, 0 for no limit
    /// [default: 30]
    #[arg(long)]
    read_timeout: Option<u64>,

    /// Prefix every request URI must start with [default: /]
    #[arg(short, long)]
    uri_prefix: Option<String>,

    /// Render response bodies as strict JSON.
    #[arg(long)]
    strict_json: bool,

    /// Log filter used when RUST_LOG is not set [default: info]
    #[arg(long)]
    log_level: Option<String>,

    /// Log in JSON.
    #[arg(long)]
    log_json: bool,

    /// Root of the proc file system [default: /proc]
    #[arg(long)]
    proc_root: Option<PathBuf>,
}

impl Args {
    fn into_config(self) -> Result<Config> {
        let mut config = match &self.config {
            Some(path) => Config::from_file(path)
                .with_context(|| format!("failed to load {}", path.display()))?,
            None => Config::default(),
        };

        if let Some(socket) = self.socket {
            config.socket = socket;
        }
        if let Some(backlog) = self.backlog {
            config.backlog = backlog;
        }
        if let Some(workers) = self.workers {
            config.workers = workers;
        }
        if let Some(read_timeout) = self.read_timeout {
            config.read_timeout = read_timeout;
        }
        if let Some(uri_prefix) = self.uri_prefix {
            config.uri_prefix = uri_prefix;
        }
        if self.strict_json {
            config.format = Format::Json;
        }
        if let Some(log_level) = self.log_level {
            config.log_level = log_level;
        }
        if self.log_json {
            config.log_json = true;
        }
        if let Some(proc_root) = self.proc_root {
            config.proc_root = proc_root;
        }

        config.validate().context("invalid configuration")?;
        Ok(config)
    }
}

fn init_logging(config: &Config) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.log_level))
        .with_context(|| format!("invalid log level `{}'", config.log_level))?;

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_thread_names(true);
    let result = if config.log_json {
        builder.json().try_init()
    } else {
        builder.compact().try_init()
    };
    result.map_err(|e| anyhow::anyhow!(e)).context("failed to set tracing subscriber")
}

fn main() -> Result<()> {
    let config = Args::parse().into_config()?;
    init_logging(&config)?;

    let fs = Cgroupfs::with_proc_root(&config.proc_root)
        .context("failed to initialize cgroup access")?;
    let listener = HttpListener::bind(&config.socket, config.backlog)
        .with_context(|| format!("failed to listen on {}", config.socket))?
        .with_read_timeout(config.read_timeout());

    info!(
        "listening on {}, backlog {}, {}, URI prefix `{}'",
        config.socket,
        config.backlog,
        config.workers_description(),
        config.uri_prefix
    );

    let dispatcher = Dispatcher::new(fs, config.uri_prefix.clone(), config.format);
    WorkerPool::new(config.workers)
        .run(listener, move |uri| dispatcher.dispatch(uri))
        .context("failed to start workers")?;

    info!("all workers exited");
    Ok(())
}
