//! minnowvpn CLI - peer-to-peer VPN daemon.
//!
//! Bootstraps the supervisor bring-up sequence (STUN discovery, virtual
//! interface, datapath, monitor loop) and the RPC surface a separate UI
//! process drives, then waits for `Ctrl+C`/`SIGTERM` or a `StopProcess` RPC
//! call to tear everything down.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use tracing_subscriber::{fmt, EnvFilter};

use minnowvpn::config::Config;
use minnowvpn::error::MinnowVpnError;
use minnowvpn::state::{NetworkEvent, StateManager};
use minnowvpn::{rpc, supervisor};

/// minnowvpn - peer-to-peer VPN daemon
#[derive(Parser, Debug)]
#[command(name = "minnowvpn")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to the daemon configuration file. Defaults apply for any field
    /// the file omits; the daemon runs entirely on defaults if no file is
    /// given.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Enable verbose (debug) logging.
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    let filter = if args.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };
    fmt().with_env_filter(filter).with_target(false).init();

    match run(args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {}", e.user_message());
            ExitCode::from(e.exit_code() as u8)
        }
    }
}

async fn run(args: Args) -> Result<(), MinnowVpnError> {
    let config = match &args.config {
        Some(path) => Config::from_file(path)?,
        None => Config::default(),
    };

    tracing::info!(overlay_base = %config.overlay_base, rpc_listen = %config.rpc_listen, "minnowvpn starting");

    let handle = supervisor::initialize(config.clone()).await?;
    tracing::info!(
        public_ip = %handle.stun_info.public_ip,
        public_port = handle.stun_info.public_port,
        "bring-up complete, RPC surface starting"
    );

    let app_state = rpc::AppState {
        supervisor: handle.clone(),
        overlay_base: config.overlay_base,
    };

    tokio::select! {
        result = rpc::serve(&config.rpc_listen, app_state) => result,
        () = shutdown_signal(&handle.state) => Ok(()),
    }
}

/// Wait for `Ctrl+C` or `SIGTERM`, enqueue `SHUTDOWN_REQUESTED`, and return —
/// letting the caller's `select!` drop the RPC listener and exit the process.
/// The monitor loop (spawned inside `supervisor::initialize`) drains the event
/// on its next 250 ms tick and drives teardown.
async fn shutdown_signal(state: &StateManager) {
    let ctrl_c = tokio::signal::ctrl_c();

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => tracing::info!("received Ctrl+C, shutting down"),
        _ = terminate => tracing::info!("received SIGTERM, shutting down"),
    }

    state.queue_event(NetworkEvent::ShutdownRequested);
    // Give the monitor loop a tick to observe the event and begin teardown
    // before the process exits.
    tokio::time::sleep(std::time::Duration::from_millis(300)).await;
}
