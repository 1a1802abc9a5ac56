use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tracing::{info, warn};

use stowage_lifecycle::{BackgroundProcessorBuilder, CancellationToken};
use stowage_server::api::{self, AppState};
use stowage_server::config::{StowageConfig, background_config};
use stowage_server::factory::build_service;

/// Attachment storage server.
#[derive(Parser, Debug)]
#[command(name = "stowage-server", about = "Content-addressed attachment server")]
struct Cli {
    /// Path to the TOML configuration file.
    #[arg(short, long, default_value = "stowage.toml")]
    config: PathBuf,

    /// Override the bind host.
    #[arg(long)]
    host: Option<String>,

    /// Override the bind port.
    #[arg(long)]
    port: Option<u16>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Serve HTTP and run background maintenance (the default).
    Serve,
    /// Rebuild the upload-time index from the stored records, then exit.
    RebuildIndex,
    /// Pin every attachment known to the metadata index, then exit.
    PinAll,
    /// Report attachments whose content is missing locally, then exit.
    CheckPins,
    /// Run one expiration sweep, then exit.
    Clean,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let config = StowageConfig::load(&cli.config)?;
    stowage_server::logging::init(&config.logging);
    if !cli.config.exists() {
        info!(path = %cli.config.display(), "config file not found, using defaults");
    }

    let service = Arc::new(build_service(&config)?);
    let cancel = CancellationToken::new();

    match cli.command.unwrap_or(Commands::Serve) {
        Commands::Serve => serve(cli.host, cli.port, config, service, cancel).await,
        Commands::RebuildIndex => {
            let report = service.rebuild_time_index().await?;
            info!(
                indexed = report.indexed,
                skipped = report.skipped,
                pruned = report.pruned,
                "index rebuilt"
            );
            Ok(())
        }
        Commands::PinAll => {
            let report = service
                .reconciler()
                .pin_all(&cancel_on_signal(cancel))
                .await?;
            info!(
                total = report.total,
                pinned = report.pinned,
                failed = report.failed.len(),
                "pin run finished"
            );
            for failure in &report.failed {
                warn!(id = %failure.id, error = %failure.error, "could not pin");
            }
            Ok(())
        }
        Commands::CheckPins => {
            let missing = service.reconciler().check_missing().await?;
            let mut missing: Vec<_> = missing.into_iter().collect();
            missing.sort();
            for id in &missing {
                println!("{id}");
            }
            info!(missing = missing.len(), "pin check finished");
            Ok(())
        }
        Commands::Clean => {
            let report = service.run_cleanup_sweep(&cancel_on_signal(cancel)).await?;
            info!(
                candidates = report.candidates,
                deleted = report.deleted,
                purged = report.purged,
                failed = report.failed,
                cancelled = report.cancelled,
                "sweep finished"
            );
            Ok(())
        }
    }
}

async fn serve(
    host: Option<String>,
    port: Option<u16>,
    config: StowageConfig,
    service: Arc<stowage_lifecycle::AttachmentService>,
    cancel: CancellationToken,
) -> Result<(), Box<dyn std::error::Error>> {
    let background = background_config(&config.cleaner, &config.reconciler);
    let background_tx = if background.enable_cleaner || background.enable_reconciler {
        let (mut processor, shutdown_tx) = BackgroundProcessorBuilder::new()
            .service(Arc::clone(&service))
            .config(background)
            .cancellation_token(cancel.clone())
            .build()
            .map_err(|e| format!("failed to build background processor: {e}"))?;
        tokio::spawn(async move {
            processor.run().await;
        });
        info!("background processor started");
        Some(shutdown_tx)
    } else {
        None
    };

    let state = AppState {
        service,
        cache_duration_seconds: config.server.cache_duration_seconds,
    };
    let app = api::router(state);

    let host = host.unwrap_or(config.server.host);
    let port = port.unwrap_or(config.server.port);
    let addr = format!("{host}:{port}");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!(address = %addr, "stowage-server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    // Interrupt any in-flight sweep, then stop the scheduler loop.
    cancel.cancel();
    if let Some(tx) = background_tx {
        let _ = tx.send(()).await;
    }

    info!("stowage-server shut down");
    Ok(())
}

/// Cancel `token` when the process is asked to stop, so a one-shot run can
/// finish its in-flight items and exit with a partial report.
fn cancel_on_signal(token: CancellationToken) -> CancellationToken {
    let child = token.clone();
    tokio::spawn(async move {
        shutdown_signal().await;
        token.cancel();
    });
    child
}

/// Wait for SIGINT (Ctrl+C) or SIGTERM, then return to trigger graceful shutdown.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => { info!("received SIGINT"); }
        () = terminate => { info!("received SIGTERM"); }
    }
}
