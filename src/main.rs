//! mcp-host-bridge: MCP server exposing a host application's tools and resources
//!
//! `serve` (the default) runs the MCP transports and forwards tool calls over
//! the IPC bridge. `host` runs the reference host endpoint those calls reach.

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::{Arc, RwLock};
use std::time::Duration;

use clap::{Parser, Subcommand, ValueEnum};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn, Level};
use tracing_subscriber::EnvFilter;

use mcp_host_bridge::bridge::IpcBridge;
use mcp_host_bridge::catalog;
use mcp_host_bridge::config::{self, Config};
use mcp_host_bridge::error::ServeError;
use mcp_host_bridge::host::endpoint as host_endpoint;
use mcp_host_bridge::host::{workspace, AffinityExecutor, HostEndpoint, Workspace};
use mcp_host_bridge::mcp::http::{self, HttpState};
use mcp_host_bridge::mcp::{McpServer, ServerInfo, StdioTransport};

/// How long the runtime waits for blocking work (such as a pending stdin
/// read) once everything else has stopped.
const RUNTIME_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(1);

/// MCP server exposing a host application's tools and resources.
///
/// Speaks JSON-RPC over HTTP, SSE and stdio, and forwards tool calls to the
/// host application over a private loopback IPC channel.
#[derive(Parser, Debug)]
#[command(name = "mcp-host-bridge")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(short, long, value_name = "CONFIG_FILE", global = true)]
    config: Option<PathBuf>,

    /// Increase logging verbosity (-v for info, -vv for debug, -vvv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Decrease logging verbosity (only show errors)
    #[arg(short, long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    mode: Option<Mode>,
}

#[derive(Subcommand, Debug)]
enum Mode {
    /// Run the MCP server (default)
    Serve {
        /// Transports to run, overriding the configuration file
        #[arg(long, value_enum)]
        transport: Option<TransportArg>,
    },
    /// Run the reference host IPC endpoint
    Host,
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
enum TransportArg {
    Stdio,
    Http,
    All,
}

/// Determines the log level from CLI arguments.
#[allow(clippy::match_same_arms)] // Explicit "warn" arm for clarity
fn get_log_level(verbose: u8, quiet: bool, config_level: &str) -> Level {
    if quiet {
        return Level::ERROR;
    }

    match verbose {
        0 => match config_level.to_lowercase().as_str() {
            "trace" => Level::TRACE,
            "debug" => Level::DEBUG,
            "info" => Level::INFO,
            "warn" => Level::WARN,
            "error" => Level::ERROR,
            _ => Level::WARN, // Default to warn for unknown levels
        },
        1 => Level::INFO,
        2 => Level::DEBUG,
        _ => Level::TRACE,
    }
}

/// Initialises the tracing subscriber. Logs go to stderr; stdout belongs to
/// the stdio transport.
fn init_tracing(level: Level) {
    let filter = EnvFilter::from_default_env().add_directive(level.into());

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

/// Applies a `--transport` override to the configuration.
fn apply_transport(cfg: &mut Config, transport: Option<TransportArg>) {
    let Some(transport) = transport else {
        return;
    };
    cfg.server.http.enabled = matches!(transport, TransportArg::Http | TransportArg::All);
    cfg.server.stdio.enabled = matches!(transport, TransportArg::Stdio | TransportArg::All);
}

/// Waits for SIGINT or SIGTERM.
#[cfg(unix)]
async fn wait_for_signal() -> std::io::Result<()> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut sigint = signal(SignalKind::interrupt())?;
    let mut sigterm = signal(SignalKind::terminate())?;

    tokio::select! {
        _ = sigint.recv() => info!("Received SIGINT, initiating graceful shutdown"),
        _ = sigterm.recv() => info!("Received SIGTERM, initiating graceful shutdown"),
    }
    Ok(())
}

/// Waits for Ctrl+C.
#[cfg(windows)]
async fn wait_for_signal() -> std::io::Result<()> {
    tokio::signal::ctrl_c().await?;
    info!("Received Ctrl+C, initiating graceful shutdown");
    Ok(())
}

/// Cancels `shutdown` when a termination signal arrives.
fn spawn_signal_watcher(shutdown: CancellationToken) {
    tokio::spawn(async move {
        match wait_for_signal().await {
            Ok(()) => shutdown.cancel(),
            Err(e) => warn!(error = %e, "Signal handling unavailable"),
        }
    });
}

/// Runs the MCP transports until shutdown.
async fn run_server(cfg: Config, shutdown: CancellationToken) -> Result<(), ServeError> {
    if !cfg.server.http.enabled && !cfg.server.stdio.enabled {
        return Err(ServeError::NoTransport);
    }

    let bridge = Arc::new(IpcBridge::new(&cfg.bridge)?);
    bridge.initialize(cfg.bridge.port);
    let probe = bridge.spawn_connection_probe(cfg.bridge.startup_probe_delay());

    let server = Arc::new(McpServer::new(ServerInfo::named(cfg.server.name.clone())));
    catalog::register(&server, &bridge);

    let mut transports = JoinSet::new();

    if cfg.server.http.enabled {
        let listener = http::bind(cfg.server.http.socket_addr()).await?;
        let router = http::router(HttpState::new(
            Arc::clone(&server),
            Some(Arc::clone(&bridge)),
        ));
        transports.spawn(http::serve(listener, router, shutdown.clone()));
    }

    if cfg.server.stdio.enabled {
        let server = Arc::clone(&server);
        let shutdown = shutdown.clone();
        // With no HTTP transport, closing stdin ends the process.
        let stdio_only = !cfg.server.http.enabled;
        transports.spawn(async move {
            let result = StdioTransport::stdio()
                .run(server, shutdown.clone())
                .await;
            if stdio_only {
                shutdown.cancel();
            }
            result.map_err(ServeError::from)
        });
    }

    info!(
        http = cfg.server.http.enabled,
        stdio = cfg.server.stdio.enabled,
        "MCP server ready"
    );

    let mut result = Ok(());
    while let Some(finished) = transports.join_next().await {
        let failure = match finished {
            Ok(Ok(())) => continue,
            Ok(Err(e)) => e,
            Err(e) => ServeError::Io(std::io::Error::other(e)),
        };
        error!(error = %failure, "Transport failed, shutting down");
        shutdown.cancel();
        if result.is_ok() {
            result = Err(failure);
        }
    }

    bridge.shutdown().await;
    if let Err(e) = probe.await {
        warn!(error = %e, "Connection probe task failed");
    }
    result
}

/// Runs the reference host endpoint until shutdown.
async fn run_host(cfg: Config, shutdown: CancellationToken) -> Result<(), ServeError> {
    let state = Arc::new(RwLock::new(Workspace::sample()));
    let executor = Arc::new(AffinityExecutor::spawn("host-affinity")?);
    let endpoint = Arc::new(HostEndpoint::new(workspace::operations(&state), executor));

    info!(
        actions = ?endpoint.table().actions(),
        path = %cfg.host.path,
        "Host endpoint ready"
    );

    let listener = host_endpoint::bind(cfg.host.port).await?;
    host_endpoint::serve(listener, endpoint.router(&cfg.host.path), shutdown).await
}

/// Entry point for the mcp-host-bridge server.
fn main() -> ExitCode {
    let args = Args::parse();

    // Load configuration
    let config_path = args.config.as_deref();
    let mut cfg = match config::load_config(config_path) {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("Configuration error: {e}");
            if config_path.is_none() {
                if let Some(default_path) = config::default_config_path() {
                    eprintln!("\nExpected config at: {}", default_path.display());
                    eprintln!("Create one based on config/example-config.json");
                }
            }
            return ExitCode::FAILURE;
        }
    };

    // Initialise logging
    let log_level = get_log_level(args.verbose, args.quiet, &cfg.logging.level);
    init_tracing(log_level);

    // Display GPL license notice (required by GPLv3 Section 5d)
    eprintln!(
        "mcp-host-bridge {}  Copyright (C) 2026  The Embedded Society",
        env!("CARGO_PKG_VERSION")
    );
    eprintln!("This program comes with ABSOLUTELY NO WARRANTY.");
    eprintln!("This is free software, licensed under GPL-3.0-or-later.");
    eprintln!("Source: {}", env!("CARGO_PKG_REPOSITORY"));
    eprintln!();

    let runtime = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            error!(error = %e, "Failed to create Tokio runtime");
            return ExitCode::FAILURE;
        }
    };

    let shutdown = CancellationToken::new();
    let mode = args.mode.unwrap_or(Mode::Serve { transport: None });

    let result = runtime.block_on(async {
        spawn_signal_watcher(shutdown.clone());
        match mode {
            Mode::Serve { transport } => {
                apply_transport(&mut cfg, transport);
                info!(
                    version = env!("CARGO_PKG_VERSION"),
                    "Starting mcp-host-bridge server"
                );
                run_server(cfg, shutdown).await
            }
            Mode::Host => {
                info!(
                    version = env!("CARGO_PKG_VERSION"),
                    "Starting mcp-host-bridge host endpoint"
                );
                run_host(cfg, shutdown).await
            }
        }
    });
    runtime.shutdown_timeout(RUNTIME_SHUTDOWN_TIMEOUT);

    match result {
        Ok(()) => {
            info!("Shut down gracefully");
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!(error = %e, "Server error");
            ExitCode::FAILURE
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verify_cli() {
        use clap::CommandFactory;
        Args::command().debug_assert();
    }

    #[test]
    fn serve_is_the_default_mode() {
        let args = Args::try_parse_from(["mcp-host-bridge", "-vv"]).unwrap();
        assert!(args.mode.is_none());
        assert_eq!(args.verbose, 2);
    }

    #[test]
    fn transport_override_toggles_config() {
        let args =
            Args::try_parse_from(["mcp-host-bridge", "serve", "--transport", "stdio"]).unwrap();
        let Some(Mode::Serve { transport }) = args.mode else {
            panic!("expected serve mode");
        };

        let mut cfg = Config::default();
        apply_transport(&mut cfg, transport);
        assert!(cfg.server.stdio.enabled);
        assert!(!cfg.server.http.enabled);

        apply_transport(&mut cfg, Some(TransportArg::All));
        assert!(cfg.server.stdio.enabled && cfg.server.http.enabled);
    }

    #[test]
    fn log_level_flags() {
        assert_eq!(get_log_level(0, true, "trace"), Level::ERROR);
        assert_eq!(get_log_level(0, false, "debug"), Level::DEBUG);
        assert_eq!(get_log_level(3, false, "warn"), Level::TRACE);
    }
}
