//! # kuitti-edge
//!
//! Command line front end for the print service.
//!
//! ```bash
//! kuitti-edge discover --save
//! kuitti-edge preview order.json
//! kuitti-edge print order.json --printer 192.168.1.50:9100
//! kuitti-edge test-print 192.168.1.50:9100
//! kuitti-edge cloud-status
//! ```

use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::{Parser, Subcommand};
use kuitti_edge::printing::{load_printers_file, save_printers_file};
use kuitti_edge::{Config, PrintService, init_logger_with_file};
use shared::Order;
use tokio_util::sync::CancellationToken;

/// Kuitti - receipt printing for the till
#[derive(Parser, Debug)]
#[command(name = "kuitti-edge")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Printers file (overrides PRINTERS_FILE)
    #[arg(long, global = true, env = "PRINTERS_FILE")]
    printers_file: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// List configured printers
    Printers,

    /// Scan every channel for printers
    Discover {
        /// Write discovered printers to the printers file
        #[arg(long)]
        save: bool,
    },

    /// Render an order as plain text
    Preview {
        /// Order JSON file
        order: PathBuf,
    },

    /// Print an order
    Print {
        /// Order JSON file
        order: PathBuf,

        /// Printer id; the default printer when omitted
        #[arg(long)]
        printer: Option<String>,
    },

    /// Print the self-test page
    TestPrint { printer: String },

    /// Print one QR per layout to pick the one the printer renders
    QrCalibration { printer: String },

    /// Pulse the cash drawer
    OpenDrawer { printer: String },

    /// CloudPRNT server health and known printers
    CloudStatus,
}

fn read_order(path: &Path) -> anyhow::Result<Order> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("Invalid order in {}", path.display()))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    let cli = Cli::parse();

    let config = Config::from_env();
    init_logger_with_file(&config.log_level, config.log_dir.as_deref())?;

    let shutdown = CancellationToken::new();
    let service = PrintService::from_config(&config, shutdown.clone())?;

    let printers_file = cli
        .printers_file
        .clone()
        .unwrap_or_else(|| PathBuf::from(&config.printers_file));
    let loaded = load_printers_file(&printers_file)?;
    for device in loaded.printers {
        service.register_printer(device);
    }
    if let Some(settings) = loaded.settings {
        service.update_settings(settings);
    }

    let result = run(&service, cli.command, &printers_file).await;
    service.shutdown().await;
    if let Err(e) = &result {
        tracing::error!(error = %e, "Command failed");
    }
    result
}

async fn run(service: &PrintService, command: Commands, printers_file: &Path) -> anyhow::Result<()> {
    match command {
        Commands::Printers => {
            for device in service.printers() {
                println!(
                    "{:<24} {:<20} {:<16} {:<7} {}",
                    device.id,
                    device.name,
                    device.transport_kind,
                    device.printer_family,
                    device.connection_state
                );
            }
        }
        Commands::Discover { save } => {
            let report = service.discover().await;
            for device in &report.found {
                println!("found      {:<24} {} ({})", device.id, device.name, device.transport_kind);
            }
            for (address, reason) in &report.skipped {
                println!("skipped    {:<24} {}", address, reason);
            }
            for (kind, reason) in &report.unavailable {
                println!("unavailable {:<23} {}", kind, reason);
            }
            if save {
                let settings = service.settings();
                save_printers_file(printers_file, &service.registry().list_all(), Some(&settings))?;
                println!("Saved to {}", printers_file.display());
            }
        }
        Commands::Preview { order } => {
            let order = read_order(&order)?;
            println!("{}", service.preview(&order)?);
        }
        Commands::Print { order, printer } => {
            let order = read_order(&order)?;
            let device = match printer {
                Some(id) => id,
                None => service.default_printer()?.id,
            };
            service.connect(&device).await?;
            let delivery = service.print_order(&device, &order).await?;
            println!("{}", delivery.operator_message());
        }
        Commands::TestPrint { printer } => {
            service.connect(&printer).await?;
            println!("{}", service.test_print(&printer).await?.operator_message());
        }
        Commands::QrCalibration { printer } => {
            service.connect(&printer).await?;
            println!("{}", service.qr_calibration(&printer).await?.operator_message());
        }
        Commands::OpenDrawer { printer } => {
            service.connect(&printer).await?;
            println!("{}", service.open_drawer(&printer).await?.operator_message());
        }
        Commands::CloudStatus => {
            let (status, printers) = service.cloud_status().await?;
            println!("status: {}", status.status);
            if let Some(queued) = status.queued_jobs {
                println!("queued jobs: {}", queued);
            }
            for p in printers {
                println!(
                    "{:<18} {:<20} queued={} last_poll={}",
                    p.mac,
                    p.name.as_deref().unwrap_or("-"),
                    p.queued_jobs,
                    p.last_poll.as_deref().unwrap_or("never")
                );
            }
        }
    }
    Ok(())
}
