use checkout_flow::application::engine::CheckoutEngine;
use checkout_flow::config::CheckoutConfig;
use checkout_flow::domain::ports::WorkflowStoreBox;
use checkout_flow::infrastructure::in_memory::InMemoryWorkflowStore;
use checkout_flow::infrastructure::simulated_gateway::{ScriptedResponse, SimulatedGateway};
use checkout_flow::interfaces::csv::event_reader::EventReader;
use checkout_flow::interfaces::json::summary_writer::{CheckoutSummary, SummaryWriter};
use clap::Parser;
use miette::{IntoDiagnostic, Result};
use std::fs::File;
use std::io;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Input events CSV file (`action, field, value`)
    input: PathBuf,

    /// TOML configuration (retry policy, custom steps)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Path to persistent database (optional). If provided, uses RocksDB.
    #[arg(long)]
    db_path: Option<PathBuf>,

    /// Scripted payment responses: success[:id], transient, declined[:reason]
    #[arg(long, value_delimiter = ',')]
    responses: Vec<ScriptedResponse>,
}

fn open_store(db_path: Option<PathBuf>) -> Result<WorkflowStoreBox> {
    match db_path {
        #[cfg(feature = "storage-rocksdb")]
        Some(path) => {
            let store = checkout_flow::infrastructure::rocksdb::RocksDbWorkflowStore::open(path)
                .into_diagnostic()?;
            Ok(Box::new(store))
        }
        #[cfg(not(feature = "storage-rocksdb"))]
        Some(_) => {
            warn!(
                "Persistent storage requested via --db-path, but 'storage-rocksdb' feature is not enabled. Falling back to in-memory storage."
            );
            Ok(Box::new(InMemoryWorkflowStore::new()))
        }
        None => Ok(Box::new(InMemoryWorkflowStore::new())),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => CheckoutConfig::load(path).into_diagnostic()?,
        None => CheckoutConfig::default(),
    };
    let gateway = Arc::new(SimulatedGateway::scripted(cli.responses));
    let store = open_store(cli.db_path)?;
    let engine = CheckoutEngine::from_config(&config, gateway, store).into_diagnostic()?;

    let session = engine.start().await.into_diagnostic()?;

    // Replay events
    let file = File::open(cli.input).into_diagnostic()?;
    let reader = EventReader::new(file);
    for event_result in reader.events() {
        match event_result {
            Ok(event) => {
                if let Err(e) = event.apply_to(&engine, &session).await {
                    error!(action = ?event.action, "Error processing event: {}", e);
                }
                engine.save(&session).await.into_diagnostic()?;
            }
            Err(e) => {
                error!("Error reading event: {}", e);
            }
        }
    }

    // Output final state
    let summary = CheckoutSummary::of(&session).await;
    let stdout = io::stdout();
    let mut writer = SummaryWriter::new(stdout.lock());
    writer.write_summary(&summary).into_diagnostic()?;

    Ok(())
}
