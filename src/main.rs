//! Cobrowse server entry point.
//!
//! Handles CLI argument parsing, configuration loading, and startup of the
//! coordinator, reaper, and HTTP/WebSocket server.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Arg, ArgAction, Command};
use tokio::signal;
use tokio::sync::watch;
use tracing::{error, info, Level};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use cobrowse::{
    api::{ApiServer, AppState},
    config::CliArgs,
    engine::MockEngineSpawner,
    session::{run_reaper, Broadcaster, SessionCoordinator},
    NAME, VERSION,
};

/// Build the CLI command parser
fn build_cli() -> Command {
    Command::new(NAME)
        .version(VERSION)
        .about("Collaborative browsing server: one shared session, many observers, one leader")
        .arg(
            Arg::new("config")
                .short('c')
                .long("config")
                .value_name("FILE")
                .help("Path to configuration file (TOML or JSON)")
                .value_parser(clap::value_parser!(PathBuf)),
        )
        .arg(
            Arg::new("port")
                .short('p')
                .long("port")
                .value_name("PORT")
                .help("Server port (default: 3000)")
                .value_parser(clap::value_parser!(u16)),
        )
        .arg(
            Arg::new("width")
                .long("width")
                .value_name("PIXELS")
                .help("Rendering viewport width")
                .value_parser(clap::value_parser!(u32)),
        )
        .arg(
            Arg::new("height")
                .long("height")
                .value_name("PIXELS")
                .help("Rendering viewport height")
                .value_parser(clap::value_parser!(u32)),
        )
        .arg(
            Arg::new("reap-interval")
                .long("reap-interval")
                .value_name("SECONDS")
                .help("Seconds between sweeps of empty rooms")
                .value_parser(clap::value_parser!(u64)),
        )
        .arg(
            Arg::new("nav-timeout")
                .long("nav-timeout")
                .value_name("MS")
                .help("Navigation timeout in milliseconds")
                .value_parser(clap::value_parser!(u64)),
        )
        .arg(
            Arg::new("verbose")
                .short('v')
                .long("verbose")
                .help("Enable verbose logging")
                .action(ArgAction::Count),
        )
        .arg(
            Arg::new("quiet")
                .short('q')
                .long("quiet")
                .help("Suppress output except errors")
                .action(ArgAction::SetTrue)
                .conflicts_with("verbose"),
        )
}

/// Parse CLI arguments into CliArgs struct
fn parse_cli_args(matches: &clap::ArgMatches) -> CliArgs {
    CliArgs {
        config_file: matches.get_one::<PathBuf>("config").cloned(),
        port: matches.get_one::<u16>("port").copied(),
        width: matches.get_one::<u32>("width").copied(),
        height: matches.get_one::<u32>("height").copied(),
        reap_interval_secs: matches.get_one::<u64>("reap-interval").copied(),
        navigation_timeout_ms: matches.get_one::<u64>("nav-timeout").copied(),
    }
}

/// Initialize the tracing/logging subsystem
fn init_tracing(verbosity: u8, quiet: bool) {
    let level = if quiet {
        Level::ERROR
    } else {
        match verbosity {
            0 => Level::INFO,
            1 => Level::DEBUG,
            _ => Level::TRACE,
        }
    };

    let filter = EnvFilter::from_default_env()
        .add_directive(level.into())
        .add_directive("hyper=warn".parse().unwrap())
        .add_directive("tower_http=info".parse().unwrap());

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(true).with_thread_ids(false))
        .with(filter)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let matches = build_cli().get_matches();

    let verbosity = matches.get_count("verbose");
    let quiet = matches.get_flag("quiet");
    init_tracing(verbosity, quiet);

    let cli_args = parse_cli_args(&matches);
    let settings = cli_args
        .load_settings()
        .context("Failed to load configuration")?;

    info!(
        port = settings.port,
        viewport = %format!("{}x{}", settings.viewport_width, settings.viewport_height),
        reap_interval_secs = settings.reap_interval_secs,
        "starting {} v{}",
        NAME,
        VERSION
    );

    // The mock engine keeps the server runnable without a browser attached;
    // real deployments swap in an adapter over a headless browser here.
    let spawner = Arc::new(MockEngineSpawner::new());
    let broadcaster = Arc::new(Broadcaster::new());
    let coordinator = Arc::new(SessionCoordinator::new(
        broadcaster,
        spawner,
        settings.clone(),
    ));

    // Reaper sweeps empty rooms until shutdown.
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let reaper_handle = tokio::spawn(run_reaper(
        coordinator.clone(),
        Duration::from_secs(settings.reap_interval_secs),
        shutdown_rx,
    ));

    let addr: SocketAddr = format!("{}:{}", settings.bind_addr, settings.port)
        .parse()
        .context("Invalid bind address")?;

    let mut server = ApiServer::new(addr, AppState::new(coordinator.clone(), settings));
    server.start().await.context("Failed to start server")?;

    info!("cobrowse is running, press Ctrl+C to stop");

    match signal::ctrl_c().await {
        Ok(()) => {
            info!("received shutdown signal, stopping gracefully...");
        }
        Err(e) => {
            error!("failed to listen for shutdown signal: {}", e);
        }
    }

    // Graceful teardown: stop accepting traffic, halt the reaper, then
    // close every room's engine.
    server.stop().await;
    let _ = shutdown_tx.send(true);
    let _ = reaper_handle.await;
    coordinator.registry().close_all().await;

    info!("cobrowse stopped");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parsing() {
        let matches = build_cli()
            .try_get_matches_from(["cobrowse", "--port", "8080", "--reap-interval", "5"])
            .unwrap();

        let args = parse_cli_args(&matches);
        assert_eq!(args.port, Some(8080));
        assert_eq!(args.reap_interval_secs, Some(5));
        assert!(args.config_file.is_none());
    }

    #[test]
    fn test_cli_conflicts() {
        let result = build_cli().try_get_matches_from(["cobrowse", "-v", "--quiet"]);
        assert!(result.is_err());
    }
}
