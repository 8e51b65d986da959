//! services/audit/src/bin/scan.rs
//!
//! Command-line front end for the scan orchestrator: runs a scan against an
//! admin-ajax endpoint and lists or edits its findings.

use audit_lib::{
    adapters::{AjaxScanService, ConsoleConfirmer, ConsoleView},
    config::Config,
    error::AuditError,
};
use clap::{Parser, Subcommand};
use site_audit_core::{ResultFilter, ScanOrchestrator, ScanOutcome, TokioSleeper};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "audit-scan")]
#[command(about = "Scan a site for broken links or missing image alt text.")]
struct CommandLine {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a full scan in batches (the default)
    #[command(alias = "s")]
    Scan,
    /// List findings from the latest scan
    #[command(alias = "l")]
    List {
        #[arg(long, default_value = "all")]
        filter: ResultFilter,
        #[arg(long, default_value = "")]
        search: String,
        #[arg(long, default_value_t = 1)]
        page: u32,
    },
    /// Apply the stored suggestions to the given entries
    Fix { ids: Vec<u64> },
    /// Delete one entry
    Delete { id: u64 },
    /// Replace the suggestion of one entry
    Suggest { id: u64, value: String },
}

#[tokio::main]
async fn main() -> Result<(), AuditError> {
    // --- 1. Parse Arguments, Load Configuration & Set Up Logging ---
    let commands = CommandLine::parse();
    let config = Config::from_env()?;
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(config.log_level.to_string()))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    // --- 2. Wire the Orchestrator ---
    let client = reqwest::Client::builder()
        .connect_timeout(Duration::from_secs(10))
        .build()?;
    let service = Arc::new(AjaxScanService::with_client(
        client,
        config.ajax_url.clone(),
        config.ajax_nonce.clone(),
        config.scan_target,
    ));
    let orchestrator = Arc::new(ScanOrchestrator::new(
        service,
        Arc::new(ConsoleView::new(config.scan_target)),
        Arc::new(ConsoleConfirmer::new(config.assume_yes)),
        Arc::new(TokioSleeper),
        config.orchestrator_settings(),
    ));
    info!(
        scan_target = config.scan_target.label(),
        endpoint = %config.ajax_url,
        "Scan client ready."
    );

    // --- 3. Run the Command ---
    match commands.command.unwrap_or(Commands::Scan) {
        Commands::Scan => run_scan(orchestrator).await?,
        Commands::List { filter, search, page } => {
            orchestrator
                .edit_view(|view| {
                    view.set_filter(filter);
                    view.set_search(search);
                    view.set_page(page);
                })
                .await;
            orchestrator.load_results().await?;
        }
        Commands::Fix { ids } => {
            orchestrator.apply_fixes(&ids).await?;
        }
        Commands::Delete { id } => {
            orchestrator.delete_entry(id).await?;
        }
        Commands::Suggest { id, value } => {
            orchestrator.update_suggestion(id, &value).await?;
        }
    }

    Ok(())
}

/// Runs one scan. Each Ctrl-C asks it to stop after the in-flight call,
/// including one pressed while the start prompt is still open.
async fn run_scan(orchestrator: Arc<ScanOrchestrator>) -> Result<(), AuditError> {
    let mut scan = orchestrator.spawn_scan();

    let joined = loop {
        tokio::select! {
            joined = &mut scan => break joined,
            signal = tokio::signal::ctrl_c() => match signal {
                Ok(()) => {
                    if orchestrator.cancel_scan().await {
                        warn!("Interrupted. Stopping once the current call returns.");
                    }
                }
                Err(e) => {
                    warn!("Cannot listen for Ctrl-C: {}", e);
                    break (&mut scan).await;
                }
            },
        }
    };
    let outcome = joined.map_err(|e| AuditError::Internal(format!("Scan task failed: {}", e)))?;

    match outcome? {
        ScanOutcome::Completed { scan_id, progress } => {
            info!(%scan_id, pages = progress.pages_processed, "Scan finished.");
        }
        ScanOutcome::Cancelled { scan_id: Some(scan_id), .. } => {
            info!(%scan_id, "Scan cancelled.");
        }
        ScanOutcome::Cancelled { scan_id: None, .. } => info!("Scan cancelled before it started."),
        ScanOutcome::Declined => info!("Nothing to do."),
    }
    Ok(())
}
