mod client;
mod config;
mod discovery;
mod error;
mod localapi;
mod readiness;
mod report;
mod shutdown;
mod tags;
mod types;

use clap::Parser;
use config::{EnvFile, NodeConfig};
use error::Error;
use localapi::LocalApiClient;
use readiness::{ReadinessPoller, DEFAULT_POLL_INTERVAL};
use std::io;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tags::TagSet;
use tokio::{signal, sync::Notify};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

const LONG_VERSION: &str = concat!(env!("CARGO_PKG_VERSION"), " (", env!("GIT_COMMIT_HASH"), ")");

#[derive(Parser, Debug, Clone)]
#[command(author, version, long_version = LONG_VERSION, about)]
struct Args {
    #[arg(long, default_value = ".env", help = "Environment file to load")]
    env: PathBuf,

    /// Only list peers carrying this tag; repeat to accept any of several
    #[arg(long = "tag", value_name = "TAG")]
    tags: Vec<String>,

    #[arg(long, default_value = "tsls", help = "Hostname this node joins the tailnet as")]
    hostname: String,

    /// tailscaled LocalAPI endpoint: a unix socket path or tcp://<ip>:<port>.
    /// Required unless TS_SOCKET is set; overrides it otherwise
    #[arg(value_name = "ENDPOINT")]
    #[arg(long)]
    socket: Option<String>,

    #[arg(
        long,
        default_value_t = DEFAULT_POLL_INTERVAL.as_secs(),
        value_parser = clap::value_parser!(u64).range(1..),
        help = "Backend readiness poll interval, in seconds"
    )]
    poll_interval: u64,

    /// Give up if the backend is not running after this many seconds
    #[arg(long)]
    timeout: Option<u64>,

    /// Keep the node registered after exiting instead of logging it out
    #[arg(long)]
    persistent: bool,
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(io::stderr)
        .init();
    let args = Args::parse();

    if let Err(e) = run(args).await {
        error!("{}", e);
        std::process::exit(1);
    }
}

async fn run(args: Args) -> Result<(), Error> {
    let env_file = EnvFile::load(&args.env)?;
    let config = NodeConfig::resolve(
        &env_file,
        |key| std::env::var(key).ok(),
        &args.hostname,
        args.socket.as_deref(),
        !args.persistent,
    )?;
    let mut filter = TagSet::new();
    for tag in args.tags {
        filter.push(tag);
    }

    info!("hostname: {}", config.hostname);
    info!(
        "control server URL: {}",
        config.control_url.as_deref().unwrap_or("(daemon default)")
    );
    match &config.auth_key {
        Some(key) => info!("auth key: {}", key),
        None => info!("auth key: (none, relying on existing login)"),
    }
    info!("LocalAPI: {}", config.endpoint);
    info!("filter tags: {}", filter);

    let shutdown_notify = Arc::new(Notify::new());
    tokio::spawn({
        let interrupt_handle = shutdown_notify.clone();
        async move {
            if let Err(e) = signal::ctrl_c().await {
                error!("Failed to listen for shutdown signal: {}", e);
                return;
            }
            interrupt_handle.notify_one();
        }
    });

    let mut poller = ReadinessPoller::new(Duration::from_secs(args.poll_interval), shutdown_notify);
    if let Some(timeout) = args.timeout {
        poller = poller.with_timeout(Duration::from_secs(timeout));
    }

    let client = LocalApiClient::new(config.endpoint.clone());
    let stdout = io::stdout();
    let mut out = stdout.lock();
    discovery::run(&client, &config.start_options(), &poller, &filter, &mut out).await?;

    Ok(())
}
