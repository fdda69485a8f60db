//! Fieldmark CLI - capture and sync field markings from the terminal

mod commands;
mod error;
mod settings;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{CommandFactory, Parser, Subcommand};

use commands::add::{run_add, AddArgs};
use commands::completions::{run_completions, CompletionShell};
use commands::delete::run_delete;
use commands::devices::run_devices;
use commands::export::{run_export, CliExportFormat};
use commands::list::run_list;
use commands::sync::{run_sync, run_sync_watch};
use commands::works::run_works;
use error::CliError;

#[derive(Parser)]
#[command(name = "fieldmark")]
#[command(about = "Track and synchronize field-works markings")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Optional path to local database file
    #[arg(long, value_name = "PATH", global = true)]
    db_path: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Add a point marking
    #[command(alias = "new")]
    Add {
        /// Position as 'lat,lng' in decimal degrees
        position: String,
        /// Work-order number
        #[arg(long)]
        work_order: Option<String>,
        /// Product being placed or inspected
        #[arg(long)]
        product: Option<String>,
        /// Measurement note (length, depth, ...)
        #[arg(long)]
        measurement: Option<String>,
        /// Free-form description
        #[arg(long)]
        description: Option<String>,
    },
    /// List recent markings
    List {
        /// Number of markings to show
        #[arg(short, long, default_value = "20")]
        limit: usize,
        /// Filter by work-order number
        #[arg(long)]
        work_order: Option<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show work orders aggregated from the markings
    Works {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Delete a marking
    Delete {
        /// Marking id
        id: String,
    },
    /// Synchronize with the configured backends
    Sync {
        /// Keep syncing periodically until interrupted
        #[arg(long)]
        watch: bool,
    },
    /// Show other devices active in the last 5 minutes
    Devices {
        /// Publish our own position first, as 'lat,lng'
        #[arg(long, value_name = "LAT,LNG")]
        announce: Option<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Export markings
    Export {
        /// Export format
        #[arg(long, value_enum, default_value_t = CliExportFormat::Json)]
        format: CliExportFormat,
        /// Optional output path (stdout when omitted)
        #[arg(short, long, value_name = "PATH")]
        output: Option<PathBuf>,
    },
    /// Generate shell completion scripts
    Completions {
        /// Target shell
        #[arg(value_enum)]
        shell: CompletionShell,
        /// Optional output path (stdout when omitted)
        #[arg(short, long, value_name = "PATH")]
        output: Option<PathBuf>,
    },
}

async fn run(cli: Cli) -> Result<(), CliError> {
    let db_path = cli.db_path.as_deref();
    match cli.command {
        Commands::Add {
            position,
            work_order,
            product,
            measurement,
            description,
        } => run_add(
            AddArgs {
                position,
                work_order,
                product,
                measurement,
                description,
            },
            db_path,
        ),
        Commands::List {
            limit,
            work_order,
            json,
        } => run_list(limit, work_order.as_deref(), json, db_path),
        Commands::Works { json } => run_works(json, db_path),
        Commands::Delete { id } => run_delete(&id, db_path).await,
        Commands::Sync { watch } => {
            if watch {
                run_sync_watch(db_path).await
            } else {
                run_sync(db_path).await
            }
        }
        Commands::Devices { announce, json } => {
            run_devices(announce.as_deref(), json, db_path).await
        }
        Commands::Export { format, output } => run_export(format, output.as_ref(), db_path),
        Commands::Completions { shell, output } => {
            run_completions(shell, output.as_ref(), &mut Cli::command())
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(error) => {
            eprintln!("Error: {error}");
            ExitCode::FAILURE
        }
    }
}
