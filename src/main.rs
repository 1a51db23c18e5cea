//! Demo service for the request tracing middleware.
//!
//! ```text
//! config (TOML or defaults)
//!     → console subscriber
//!     → Telemetry::install (global tracer provider + W3C propagator)
//!     → RequestTracingLayer (log pipeline, filters)
//!     → HttpServer until SIGINT/SIGTERM
//!     → Telemetry::shutdown (flush spans and logs)
//! ```

use std::path::PathBuf;

use clap::Parser;
use tokio::net::TcpListener;

use otelaxum::config::{load_config, TelemetryConfig};
use otelaxum::lifecycle::{shutdown_signal, Shutdown};
use otelaxum::observability::logging::init_subscriber;
use otelaxum::{HttpServer, RequestTracingLayer, Telemetry, TraceOptions};

#[derive(Debug, Parser)]
#[command(name = "otelaxum", version, about = "Traced axum demo service")]
struct Cli {
    /// Path to a TOML config file. Defaults apply when omitted.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override `listener.bind_address`.
    #[arg(short, long)]
    bind: Option<String>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => load_config(path)?,
        None => TelemetryConfig::default(),
    };
    if let Some(bind) = cli.bind {
        config.listener.bind_address = bind;
    }

    init_subscriber(&config.logging.level);
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "otelaxum starting");

    tracing::info!(
        service = %config.service.name,
        bind_address = %config.listener.bind_address,
        tracing_exporter = ?config.tracing.exporter,
        logging_exporter = ?config.logging.exporter,
        request_timeout_secs = config.timeouts.request_secs,
        "Configuration loaded"
    );

    let mut telemetry = Telemetry::install(&config.service.name, &config.tracing)?;

    let layer = match RequestTracingLayer::new(
        config.service.name.clone(),
        TraceOptions::new()
            .with_logging(config.logging.clone())
            .with_filter_config(&config.filters),
    ) {
        Ok(layer) => layer,
        Err(err) => {
            telemetry.shutdown();
            return Err(err.into());
        }
    };
    telemetry.track_logger(layer.logger_provider().clone());

    let listener = TcpListener::bind(&config.listener.bind_address).await?;
    tracing::info!(address = %listener.local_addr()?, "Listening for connections");

    let shutdown = Shutdown::new();
    let server = HttpServer::new(config, layer);
    let signals = {
        let shutdown = shutdown.clone();
        tokio::spawn(async move {
            shutdown_signal().await;
            shutdown.trigger();
        })
    };

    let served = server.run(listener, shutdown.subscribe()).await;
    signals.abort();
    telemetry.shutdown();
    served?;

    tracing::info!("Shutdown complete");
    Ok(())
}
