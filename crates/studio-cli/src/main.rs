use anyhow::anyhow;
use chrono_tz::Tz;
use clap::Parser;
use owo_colors::{OwoColorize, Style};
use studio_core::db::{self, DbPool};
use studio_core::error::CoreError;
use studio_core::models::{Booking, ItemKind, Task};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::item::CliItem;
use crate::util::Session;

mod cli;
mod commands;
mod config;
mod item;
mod parser;
mod util;
mod views;

#[tokio::main]
async fn main() {
    let cli = cli::Cli::parse();

    let config = match config::Config::new() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("{} Invalid configuration: {}", "Error:".red().bold(), e);
            std::process::exit(1);
        }
    };
    init_tracing(&config.log_level);

    if let Err(e) = run(cli, config).await {
        handle_error(e);
        std::process::exit(1);
    }
}

/// Logs go to stderr so table output stays clean. `RUST_LOG` wins over the
/// configured level.
fn init_tracing(level: &str) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level))
        .unwrap_or_else(|_| EnvFilter::new("warn"));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(true).with_writer(std::io::stderr))
        .init();
}

async fn run(cli: cli::Cli, config: config::Config) -> anyhow::Result<()> {
    let tz = config
        .tz()
        .map_err(|e| anyhow!(CoreError::InvalidInput(e)))?;
    let pool = db::establish_connection(&config.database_path.to_string_lossy()).await?;
    tracing::debug!(database = %config.database_path.display(), timezone = %tz, "starting");

    match cli.kind {
        ItemKind::Booking => dispatch::<Booking>(pool, tz, cli.command, &config).await,
        ItemKind::Task => dispatch::<Task>(pool, tz, cli.command, &config).await,
    }
}

async fn dispatch<T: CliItem>(
    pool: DbPool,
    tz: Tz,
    command: cli::Commands,
    config: &config::Config,
) -> anyhow::Result<()> {
    let session = Session::<T>::new(pool, tz, config.check_conflicts);

    match command {
        cli::Commands::Add(command) => commands::add::add_item(&session, command).await,
        cli::Commands::List(command) => {
            commands::list::list_items(&session, command, config).await
        }
        cli::Commands::Show(command) => commands::show::show_item(&session, command).await,
        cli::Commands::Edit(command) => commands::edit::edit_item(&session, command).await,
        cli::Commands::Delete(command) => commands::delete::delete_item(&session, command).await,
    }
}

fn handle_error(err: anyhow::Error) {
    let error_style = Style::new().red().bold();

    match err.downcast_ref::<CoreError>() {
        Some(CoreError::NotFound(id)) => {
            eprintln!("{} Nothing found with ID '{}'", "Error:".style(error_style), id);
        }
        Some(CoreError::Conflict(details)) => {
            eprintln!(
                "{} Scheduling conflict: {}",
                "Error:".style(error_style),
                details.yellow()
            );
            eprintln!("Pick another time or resource, or set check_conflicts = false.");
        }
        Some(CoreError::InvalidInput(s)) => {
            eprintln!("{} Invalid input: {}", "Error:".style(error_style), s);
        }
        Some(CoreError::InvalidRule { item_id, rule }) => {
            eprintln!(
                "{} Series {} has an unreadable rule '{}'",
                "Error:".style(error_style),
                item_id.yellow(),
                rule
            );
        }
        Some(core_error @ (CoreError::Database(_) | CoreError::Migration(_))) => {
            eprintln!(
                "{} {}: {}",
                "Error:".style(error_style),
                core_error,
                std::error::Error::source(core_error)
                    .map(|source| source.to_string())
                    .unwrap_or_default()
            );
        }
        _ => eprintln!("{} {:#}", "Error:".style(error_style), err),
    }
}
