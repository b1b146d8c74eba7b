use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use tokio::sync::broadcast::error::RecvError;
use tracing::{error, info, warn};

use esmed::config::{Config, TransportKind};
use esmed::session::{Event, Session};
use esmed::telemetry::{init_metrics, init_tracing, shutdown_tracing};

#[derive(Parser, Debug)]
#[command(name = "esmed")]
#[command(author, version, about = "SMPP ESME session manager")]
struct Args {
    /// Path to config file
    #[arg(short, long, value_name = "FILE")]
    config: PathBuf,

    /// Validate config and exit
    #[arg(long)]
    validate: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Load configuration first (to get log settings)
    let config = Config::load(&args.config)?;

    init_tracing(&config.tracing_config())?;

    info!(
        version = env!("CARGO_PKG_VERSION"),
        config = %args.config.display(),
        "starting esmed"
    );

    let session_config = config.session_config();
    info!(
        peer = %session_config.target,
        system_id = %session_config.bind.system_id,
        transport = ?config.transport.kind,
        throttle = ?session_config.throttle,
        "configuration loaded"
    );

    // Validate only mode
    if args.validate {
        info!("configuration is valid");
        return Ok(());
    }

    if config.transport.kind == TransportKind::Mock {
        warn!(
            peer = %session_config.target,
            "transport is the in-process mock; connection host/port are not dialled"
        );
    }

    let meter_provider = init_metrics();

    let session = Session::spawn(session_config, config.connector());
    let logger = tokio::spawn(log_events(session.clone()));

    session.connect().await;

    wait_for_signal().await;
    info!(timeout = ?config.shutdown.timeout, "shutdown requested");

    session.stop(config.shutdown.timeout).await;
    logger.abort();

    if let Err(e) = meter_provider.shutdown() {
        warn!(error = %e, "meter provider shutdown failed");
    }
    shutdown_tracing();

    Ok(())
}

/// Log lifecycle events until the session stops.
async fn log_events(session: Session) {
    let mut events = session.subscribe();

    loop {
        match events.recv().await {
            Ok(Event::Error { kind, status, detail }) => {
                warn!(kind = %kind, status = ?status, detail = %detail, "session error");
            }
            Ok(Event::Message(delivery)) => {
                info!(
                    source = %delivery.source_addr,
                    destination = %delivery.destination_addr,
                    receipt = delivery.receipted_message_id.as_deref().unwrap_or(""),
                    "message received"
                );
            }
            Ok(Event::Stopped) => break,
            Ok(event) => info!(event = event.name(), state = %session.state(), "session event"),
            Err(RecvError::Lagged(n)) => warn!(skipped = n, "event log lagging"),
            Err(RecvError::Closed) => break,
        }
    }
}

async fn wait_for_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        match signal(SignalKind::terminate()) {
            Ok(mut term) => {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => {}
                    _ = term.recv() => {}
                }
            }
            Err(e) => {
                error!(error = %e, "cannot install SIGTERM handler");
                let _ = tokio::signal::ctrl_c().await;
            }
        }
    }

    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}
