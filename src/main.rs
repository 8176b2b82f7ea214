//! mongo-exporter
//!
//! Exports every collection of a MongoDB database into extended-JSON files
//! under a dated run directory, then zips that directory.
//!
//! # Usage
//!
//! ```bash
//! mongo-exporter mongodb://localhost:27017 --db shop --out /backups
//! ```

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{Level, warn};

use mongo_exporter::cli::{self, CliInterface};
use mongo_exporter::connection::ConnectionManager;
use mongo_exporter::error::Result;
use mongo_exporter::export::{ExportCoordinator, TerminalEvent, event_channel};
use mongo_exporter::source::MongoSource;

/// Application entry point
#[tokio::main]
async fn main() {
    match run().await {
        Ok(code) => std::process::exit(code),
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    }
}

/// Main application logic
///
/// 1. Parse command-line arguments and load configuration
/// 2. Initialize logging
/// 3. Connect and verify the deployment
/// 4. Run the export with Ctrl+C wired to cancellation
///
/// # Returns
/// * `Result<i32>` - Process exit code
async fn run() -> Result<i32> {
    let cli = CliInterface::new()?;
    initialize_logging(cli.log_level(), cli.config().logging.timestamps);

    let job = cli.job();
    let mut conn_manager =
        ConnectionManager::new(job.connection_target.clone(), cli.config().connection.clone());
    conn_manager.connect().await?;
    let database = conn_manager.database(&job.database)?;

    let token = CancellationToken::new();
    let (sink, events) = event_channel();
    let coordinator = ExportCoordinator::new(
        Arc::new(MongoSource::new(database)),
        cli.export_options(),
    )
    .with_cancellation(token.clone())
    .with_events(sink);

    let renderer = cli::spawn_renderer(events, cli.show_progress());
    let interrupt = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupt received, stopping export");
            token.cancel();
        }
    });

    let terminal = coordinator.run(&job).await;

    interrupt.abort();
    // Closes the event stream so the renderer drains and exits
    drop(coordinator);
    let _ = renderer.await;
    conn_manager.disconnect().await;

    match &terminal {
        TerminalEvent::Error { .. } => eprintln!("{}", terminal),
        _ => println!("{}", terminal),
    }
    Ok(cli::exit_code(&terminal))
}

/// Initialize logging system
fn initialize_logging(level: Level, timestamps: bool) {
    let subscriber = tracing_subscriber::fmt()
        .with_max_level(level)
        .with_target(false)
        .with_writer(std::io::stderr);

    if timestamps {
        subscriber.init();
    } else {
        subscriber.without_time().init();
    }
}
