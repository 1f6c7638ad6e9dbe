//! # Redundancy Scanner CLI
//!
//! Local demo front-end for the duplicate-detection pipeline: scans one or
//! more directories on the real filesystem through [`LocalFsStorageProvider`]
//! and prints a scan report.

use anyhow::Result;
use clap::Parser;
use tracing::{error, info};

use redundancy_scanner::output::{OutputFormat, OutputFormatter};
use redundancy_scanner::storage::LocalFsStorageProvider;
use redundancy_scanner::{PipelineConfig, PipelineOrchestrator, ScanRequest};

/// Scans directories for exact, superset/subset, and near-duplicate files.
#[derive(Parser, Debug)]
#[command(name = "redundancy-scanner")]
#[command(about = "Finds exact, containment, and near duplicates across directories")]
#[command(version = env!("CARGO_PKG_VERSION"))]
struct Cli {
    /// One or more directories to scan.
    #[arg(required = true)]
    directories: Vec<String>,

    /// Recurse into subdirectories.
    #[arg(short = 'r', long, default_value_t = true)]
    recurse: bool,

    /// Print verbose per-file logging.
    #[arg(short, long)]
    verbose: bool,

    /// Output format: text or json.
    #[arg(short = 'f', long, default_value = "text")]
    output_format: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let subscriber = tracing_subscriber::fmt()
        .with_max_level(if cli.verbose { tracing::Level::DEBUG } else { tracing::Level::INFO })
        .with_target(false)
        .finish();
    tracing::subscriber::set_global_default(subscriber).expect("failed to set global logger");

    info!("Starting redundancy-scanner v{}", env!("CARGO_PKG_VERSION"));
    println!("Redundancy Scanner v{}", env!("CARGO_PKG_VERSION"));
    for dir in &cli.directories {
        println!("  scanning: {dir}");
    }
    println!();

    let provider = LocalFsStorageProvider::new();
    let orchestrator = PipelineOrchestrator::new(provider, PipelineConfig::default());

    let request = ScanRequest {
        token: "local".to_string(),
        folder_ids: cli.directories.clone(),
        include_subfolders: cli.recurse,
    };

    match orchestrator.scan(request).await {
        Ok(report) => {
            info!("scan completed successfully");

            let format = match cli.output_format.as_str() {
                "json" => OutputFormat::Json,
                _ => OutputFormat::Text,
            };
            let formatter = OutputFormatter::new(format);
            match formatter.render(&report) {
                Ok(rendered) => println!("{rendered}"),
                Err(err) => {
                    error!("failed to render report: {err}");
                    std::process::exit(1);
                }
            }
        }
        Err(err) => {
            error!("scan failed: {err}");
            eprintln!("scan failed: {err}");
            std::process::exit(1);
        }
    }

    Ok(())
}
