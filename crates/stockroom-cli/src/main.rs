// SPDX-License-Identifier: Apache-2.0

#![forbid(unsafe_code)]

mod commands;
mod output;

use clap::error::ErrorKind;
use clap::{ArgAction, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use std::process::ExitCode as ProcessExitCode;
use stockroom_core::ExitCode;
use stockroom_model::TransactionKind;
use stockroom_server::ServerConfig;

use crate::output::{emit_error, CliError, OutputMode};

#[derive(Parser)]
#[command(name = "stockroom")]
#[command(about = "Stockroom inventory ledger operations CLI")]
struct Cli {
    /// Ledger database; overrides STOCKROOM_DB_PATH.
    #[arg(long, global = true)]
    db: Option<PathBuf>,
    #[arg(long, global = true, default_value_t = false)]
    json: bool,
    #[arg(long, global = true, action = ArgAction::Count)]
    verbose: u8,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Reconcile items from the spreadsheet or a JSON export.
    Sync {
        #[arg(long)]
        file: Option<PathBuf>,
        #[arg(long, default_value_t = false)]
        full: bool,
        #[arg(long = "section")]
        sections: Vec<String>,
    },
    Items {
        /// Only items whose available count is below their minimum stock.
        #[arg(long, default_value_t = false)]
        low_stock: bool,
    },
    Item {
        id: i64,
    },
    Search {
        query: String,
        #[arg(long, default_value_t = 20)]
        limit: usize,
    },
    History {
        #[arg(long)]
        item: Option<i64>,
        #[arg(long, default_value_t = 50)]
        limit: usize,
    },
    Usage {
        #[arg(long)]
        item: Option<i64>,
    },
    Checkout(MovementArgs),
    Checkin(MovementArgs),
    Notifier {
        #[arg(value_enum)]
        action: NotifierAction,
    },
    Serve,
    Version,
}

#[derive(clap::Args)]
struct MovementArgs {
    #[arg(long)]
    item: i64,
    #[arg(long)]
    quantity: i64,
    #[arg(long)]
    actor: String,
}

#[derive(Clone, Copy, ValueEnum)]
enum NotifierAction {
    On,
    Off,
    Status,
}

fn main() -> ProcessExitCode {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(err) => {
            if matches!(err.kind(), ErrorKind::DisplayHelp | ErrorKind::DisplayVersion) {
                let _ = err.print();
                return ProcessExitCode::from(ExitCode::Success as u8);
            }
            emit_error(&CliError::usage(&err.to_string()));
            return ProcessExitCode::from(ExitCode::Usage as u8);
        }
    };
    init_logging(cli.verbose);
    match run(cli) {
        Ok(()) => ProcessExitCode::from(ExitCode::Success as u8),
        Err(err) => {
            emit_error(&err);
            ProcessExitCode::from(err.exit_code() as u8)
        }
    }
}

/// Logs go to stderr so stdout stays machine-readable.
fn init_logging(verbose: u8) {
    let default = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

fn run(cli: Cli) -> Result<(), CliError> {
    let mode = OutputMode { json: cli.json };
    let mut config = ServerConfig::from_env();
    if let Some(db) = cli.db {
        config.db_path = db;
    }
    match cli.command {
        Commands::Sync {
            file,
            full,
            sections,
        } => commands::sync(config, file, full, sections, mode),
        Commands::Items { low_stock } => commands::list_items(&config, low_stock, mode),
        Commands::Item { id } => commands::show_item(&config, id, mode),
        Commands::Search { query, limit } => commands::search(&config, &query, limit, mode),
        Commands::History { item, limit } => commands::history(&config, item, limit, mode),
        Commands::Usage { item } => commands::usage(&config, item, mode),
        Commands::Checkout(args) => commands::movement(
            &config,
            TransactionKind::CheckOut,
            args.item,
            args.quantity,
            &args.actor,
            mode,
        ),
        Commands::Checkin(args) => commands::movement(
            &config,
            TransactionKind::CheckIn,
            args.item,
            args.quantity,
            &args.actor,
            mode,
        ),
        Commands::Notifier { action } => {
            let enable = match action {
                NotifierAction::On => Some(true),
                NotifierAction::Off => Some(false),
                NotifierAction::Status => None,
            };
            commands::notifier(&config, enable, mode)
        }
        Commands::Serve => commands::serve(config),
        Commands::Version => output::emit_ok(
            mode,
            &serde_json::json!({
                "name": "stockroom",
                "version": env!("CARGO_PKG_VERSION"),
            }),
        ),
    }
}
