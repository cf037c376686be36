use serde::Serialize;
use snapsync_core::transport::normalize_base_url;

use crate::cli::ConfigCommands;
use crate::config_profiles::{default_config_path, CliProfileConfig};
use crate::error::CliError;

#[derive(Debug, Serialize)]
struct ConfigView {
    path: String,
    server_url: Option<String>,
}

pub fn run_config(command: ConfigCommands) -> Result<(), CliError> {
    match command {
        ConfigCommands::Show { json } => run_config_show(json),
        ConfigCommands::SetServer { url } => run_config_set_server(url),
    }
}

fn run_config_show(as_json: bool) -> Result<(), CliError> {
    let path = default_config_path().map_err(CliError::Config)?;
    let config = CliProfileConfig::load_from_path(&path).map_err(CliError::Config)?;
    let view = ConfigView {
        path: path.display().to_string(),
        server_url: config.server_url(),
    };

    if as_json {
        println!("{}", serde_json::to_string_pretty(&view)?);
    } else {
        println!("Config file: {}", view.path);
        println!(
            "Server URL:  {}",
            view.server_url.as_deref().unwrap_or("(not set)")
        );
    }
    Ok(())
}

fn run_config_set_server(url: String) -> Result<(), CliError> {
    let mut config = CliProfileConfig::load().map_err(CliError::Config)?;
    set_server_url(&mut config, url)?;
    let path = config.save().map_err(CliError::Config)?;
    println!("Saved server URL to {}", path.display());
    Ok(())
}

pub fn set_server_url(config: &mut CliProfileConfig, url: String) -> Result<(), CliError> {
    config.server_url = Some(normalize_base_url(url)?);
    Ok(())
}
