//! Outfit Finder
//!
//! Serves the outfit extraction / recommendation API and runs the catalogue
//! maintenance jobs (embedding backfill, vector index bootstrap).

use clap::Parser;
use core_config::tracing::{init_tracing, install_color_eyre};
use tracing::info;

mod api;
mod cli;
mod commands;
mod config;
mod openapi;
mod server;
mod state;

use cli::{Cli, Commands};
use config::Config;
use state::AppState;

#[tokio::main]
async fn main() -> eyre::Result<()> {
    install_color_eyre();

    let cli = Cli::parse();

    // Fail on missing credentials before opening any connection
    let config = Config::from_env()?;
    init_tracing(&config.environment);

    info!("Connecting to MongoDB at {}", config.mongodb.redacted_url());
    let mongo_client =
        database::mongodb::connect_from_config_with_retry(&config.mongodb, None).await?;
    let db = mongo_client.database(config.mongodb.database());

    let state = AppState {
        config,
        mongo_client,
        db,
    };

    match cli.command {
        Commands::Serve => commands::serve(state).await,
        Commands::Backfill(args) => commands::backfill(&state, args).await,
        Commands::Index(args) => commands::index(&state, args).await,
        Commands::Extract(args) => commands::extract(&state, args).await,
        Commands::Recommend(args) => commands::recommend(&state, args).await,
    }
}
