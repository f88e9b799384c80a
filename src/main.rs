use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use dispatch_board::board::{BoardSnapshot, DateRange, Dispatcher, Reconciled};
use dispatch_board::config::{BoardConfig, ClientConfig, DEFAULT_SERVICE_URL, SERVICE_URL_ENV};
use dispatch_board::display::{print_day_board, write_day_board_to_file};
use dispatch_board::form::export_routes_to_file;
use dispatch_board::model::DateKey;
use dispatch_board::parser::load_appointments;
use dispatch_board::sync::SyncClient;
use dispatch_board::web::{self, AppState};

#[derive(Parser)]
#[command(name = "dispatch-board")]
#[command(about = "Delivery appointment dispatch board", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct ServiceArgs {
    /// Base URL of the persistence service
    #[arg(long, env = SERVICE_URL_ENV, default_value = DEFAULT_SERVICE_URL)]
    service_url: String,
}

impl ServiceArgs {
    fn client(&self) -> SyncClient {
        SyncClient::new(&ClientConfig::new(self.service_url.as_str()))
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Run the persistence service
    Serve {
        #[arg(long, default_value_t = 8080)]
        port: u16,
        /// JSON file the board is mirrored to (in memory only when omitted)
        #[arg(long)]
        data: Option<PathBuf>,
        /// Truck and slot configuration (built-in roster when omitted)
        #[arg(long)]
        config: Option<PathBuf>,
        /// First day of the board, YYYY-MM-DD
        #[arg(long, requires = "to")]
        from: Option<DateKey>,
        /// Last day of the board, inclusive
        #[arg(long, requires = "from")]
        to: Option<DateKey>,
    },
    /// Create appointments from a CSV sheet
    Import {
        csv: PathBuf,
        #[command(flatten)]
        service: ServiceArgs,
    },
    /// Write the scheduled routes to CSV
    Export {
        out: PathBuf,
        #[command(flatten)]
        service: ServiceArgs,
    },
    /// Print one day of the board
    Show {
        /// Day to show (first day of the board when omitted)
        #[arg(long)]
        date: Option<DateKey>,
        /// Write to a text file instead of stdout
        #[arg(long)]
        out: Option<PathBuf>,
        #[command(flatten)]
        service: ServiceArgs,
    },
    /// Save a board snapshot read from a JSON file
    Save {
        snapshot: PathBuf,
        #[command(flatten)]
        service: ServiceArgs,
    },
}

async fn serve(
    port: u16,
    data: Option<PathBuf>,
    config: Option<PathBuf>,
    from: Option<DateKey>,
    to: Option<DateKey>,
) -> Result<()> {
    let config = BoardConfig::load_or_default(config)?;
    let dates = match (from, to) {
        (Some(from), Some(to)) => Some(DateRange::from_bounds(from, to)?.dates().to_vec()),
        _ => None,
    };

    let state = match data {
        Some(path) => AppState::open(config, path, dates)?,
        None => AppState::in_memory(config, dates.unwrap_or_default()),
    };

    info!(port, "starting persistence service");
    web::start_server(port, state).await?;
    Ok(())
}

async fn import(csv: PathBuf, service: ServiceArgs) -> Result<()> {
    let drafts = load_appointments(&csv).with_context(|| format!("failed to import {}", csv.display()))?;
    info!(count = drafts.len(), "appointments read from sheet");

    let client = service.client();
    let mut dispatcher = Dispatcher::load(client.load_board().await?)?;

    let mut created = 0;
    let mut failed = 0;
    let mut off_board = 0;
    for draft in &drafts {
        match client.create_appointment(draft).await {
            Ok(outcome) => {
                if let Reconciled::Created { in_range: false, .. } = dispatcher.reconcile(outcome) {
                    off_board += 1;
                }
                created += 1;
            }
            Err(e) => {
                warn!(account = %draft.account_name, error = %e, "appointment not created");
                failed += 1;
            }
        }
    }

    println!("Created {} appointments ({} failed)", created, failed);
    if off_board > 0 {
        println!("{} of them fall outside the board's date range", off_board);
    }
    if created == 0 {
        bail!("no appointments were created");
    }
    Ok(())
}

async fn export(out: PathBuf, service: ServiceArgs) -> Result<()> {
    let dispatcher = Dispatcher::load(service.client().load_board().await?)?;
    let rows = export_routes_to_file(&dispatcher.snapshot(), dispatcher.index(), &out)?;
    println!("Wrote {} routes to {}", rows, out.display());
    Ok(())
}

async fn show(date: Option<DateKey>, out: Option<PathBuf>, service: ServiceArgs) -> Result<()> {
    let mut dispatcher = Dispatcher::load(service.client().load_board().await?)?;
    let date = match date.or_else(|| dispatcher.current_date()) {
        Some(date) => date,
        None => bail!("the board has no dates; pass --date"),
    };
    if !dispatcher.range().contains(&date) {
        dispatcher.extend_and_focus(date);
    }

    match out {
        Some(path) => {
            write_day_board_to_file(&dispatcher, &date, &path)?;
            println!("Board for {} saved to {}", date, path.display());
        }
        None => print_day_board(&dispatcher, &date),
    }
    Ok(())
}

async fn save(snapshot: PathBuf, service: ServiceArgs) -> Result<()> {
    let raw = std::fs::read_to_string(&snapshot).with_context(|| format!("failed to read {}", snapshot.display()))?;
    let saved: BoardSnapshot = serde_json::from_str(&raw).context("snapshot is not a valid board")?;

    let client = service.client();
    let mut payload = client.load_board().await?;
    payload.saved_assignments = Some(saved);
    // Loading drops cells and ids the board doesn't know about
    let mut dispatcher = Dispatcher::load(payload)?;

    let outcome = client.save_board(&dispatcher.snapshot()).await?;
    dispatcher.reconcile(outcome);
    println!("Board saved");
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();
    match cli.command {
        Commands::Serve { port, data, config, from, to } => serve(port, data, config, from, to).await,
        Commands::Import { csv, service } => import(csv, service).await,
        Commands::Export { out, service } => export(out, service).await,
        Commands::Show { date, out, service } => show(date, out, service).await,
        Commands::Save { snapshot, service } => save(snapshot, service).await,
    }
}
