//! XPression control client binary.
//!
//! Connects to a remote XPression engine over WebSocket, logs in with
//! the configured credentials, and keeps the session alive across
//! network interruptions. Session and network events are logged to the
//! console; the process runs until interrupted.

use clap::Parser;
use std::path::PathBuf;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;
use xpn_bus::{Event, EventBus, Topic};
use xpn_session::{CommandEncoder, SessionConfig, SessionController, SocketTransport, TransportConfig};

mod config;
mod logging;

use config::ControlConfig;
use logging::ConsoleLogFormatter;

/// XPression engine control client
#[derive(Parser, Debug)]
#[command(name = "xpn-control", version, about = "WebSocket control client for XPression")]
struct Args {
    /// Engine host name or address
    #[arg(long)]
    host: Option<String>,

    /// Engine WebSocket port
    #[arg(long)]
    port: Option<u16>,

    /// Login user name
    #[arg(long)]
    username: Option<String>,

    /// Login password
    #[arg(long)]
    password: Option<String>,

    /// Interval between status snapshots in the log, e.g. 30s
    #[arg(long, default_value = "30s")]
    status_interval: humantime::Duration,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,

    /// Configuration file path
    #[arg(long, default_value = "config.yaml")]
    config: PathBuf,
}

#[tokio::main(flavor = "multi_thread")]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let env_filter = EnvFilter::new("info")
        .add_directive(format!("xpn_session={}", args.log_level).parse()?)
        .add_directive(format!("xpn_bus={}", args.log_level).parse()?)
        .add_directive(format!("xpn_wire={}", args.log_level).parse()?)
        .add_directive(format!("xpn_control={}", args.log_level).parse()?);

    let formatter = ConsoleLogFormatter::new("xpn-control".to_string());

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .with_ansi(true)
        .event_format(formatter)
        .init();

    info!("Starting XPression control client v{}", env!("CARGO_PKG_VERSION"));

    let mut control_config = ControlConfig::load_from_file(&args.config)?;
    if let Some(host) = args.host {
        control_config.host = host;
    }
    if let Some(port) = args.port {
        control_config.port = port;
    }
    if let Some(username) = args.username {
        control_config.username = username;
    }
    if let Some(password) = args.password {
        control_config.password = password;
    }

    let settings = control_config.settings();
    info!("Engine endpoint: {}", settings.url());

    // Everything couples through the bus; components are constructed
    // once here and passed their dependencies explicitly.
    let bus = EventBus::new();
    let transport =
        SocketTransport::spawn(bus.clone(), settings.clone(), TransportConfig::default());
    let controller =
        SessionController::new(bus.clone(), transport, settings, SessionConfig::default());
    controller.bind();

    let encoder = CommandEncoder::new(bus.clone());
    encoder.add_listeners();

    // Mirror session traffic into the console log
    bus.subscribe_always(Topic::SessionAuthenticated, |_| {
        info!("Session authenticated");
    });
    bus.subscribe_always(Topic::SessionError, |event| {
        if let Event::StatusMessage(message) = event {
            warn!("Session error: {}", message);
        }
    });
    bus.subscribe_always(Topic::NetworkConnectionMsg, |event| {
        if let Event::StatusMessage(message) = event {
            info!("{}", message);
        }
    });
    bus.subscribe_always(Topic::ConnStatus, |event| {
        if let Event::Status(report) = event {
            info!(
                "Status: {:?} ({}) auto_reconnect={}",
                report.state, report.message, report.auto_reconnect
            );
        }
    });

    bus.publish(Topic::ConnConnect, Event::Trigger);

    // Periodic status snapshot in the log
    let status_bus = bus.clone();
    let status_interval = std::time::Duration::from(args.status_interval);
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(status_interval);
        ticker.tick().await;
        loop {
            ticker.tick().await;
            status_bus.publish(Topic::ConnGetStatus, Event::Trigger);
        }
    });

    let mut sigterm = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
        .map_err(|e| anyhow::anyhow!("Failed to install SIGTERM handler: {}", e))?;

    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            info!("Received SIGINT, shutting down");
        }
        _ = sigterm.recv() => {
            info!("Received SIGTERM, shutting down");
        }
    }

    controller.disconnect().await;
    encoder.remove_listeners();
    controller.unbind();

    info!("Control client shutdown complete");
    Ok(())
}
