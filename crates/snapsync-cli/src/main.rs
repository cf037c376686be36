//! snapsync CLI - keep an offline image catalog in step with the server

mod cli;
mod commands;
mod config_profiles;
mod error;

use clap::Parser;
use snapsync_core::config::ClientConfig;

use cli::{Cli, Commands};
use commands::common::{open_replica, resolve_client_config};
use commands::config::run_config;
use commands::edit::{run_forget, run_rename, run_touch};
use commands::list::run_list;
use commands::status::run_status;
use commands::sync::run_sync;
use config_profiles::CliProfileConfig;
use error::CliError;

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        eprintln!("Error: {error}");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), CliError> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("snapsync=info".parse().expect("valid directive")),
        )
        .init();

    let Cli {
        command,
        replica_path,
        server_url,
    } = Cli::parse();
    let client_config = move || -> Result<ClientConfig, CliError> {
        let profile = CliProfileConfig::load().map_err(CliError::Config)?;
        resolve_client_config(ClientConfig::from_env()?, &profile, server_url, replica_path)
    };

    match command {
        Commands::Sync { json } => run_sync(&client_config()?, json).await?,
        Commands::Status { json } => run_status(&client_config()?, json).await?,
        Commands::List { pending, json } => run_list(&client_config()?, pending, json).await?,
        Commands::Touch { id } => run_touch(&open_replica(&client_config()?).await?, id).await?,
        Commands::Rename { id, filename } => {
            let replica = open_replica(&client_config()?).await?;
            run_rename(&replica, id, &filename).await?;
        }
        Commands::Forget { id } => run_forget(&open_replica(&client_config()?).await?, id).await?,
        Commands::Config { command } => run_config(command)?,
    }

    Ok(())
}
