use std::path::PathBuf;

use clap::{Parser, Subcommand};
use snapsync_core::ImageId;

#[derive(Parser)]
#[command(name = "snapsync")]
#[command(about = "Keep an offline image catalog in step with the server")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Optional path to the local replica database
    #[arg(long, global = true, value_name = "PATH")]
    pub replica_path: Option<PathBuf>,

    /// Sync server base URL (overrides SNAPSYNC_SERVER_URL and the profile file)
    #[arg(long, global = true, value_name = "URL")]
    pub server_url: Option<String>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run one reconciliation round against the server
    Sync {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show pending/conflict counts and the last sync time
    Status {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// List images held in the local replica
    List {
        /// Only show records with unsynced local changes
        #[arg(long)]
        pending: bool,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Flag an image as locally modified
    Touch {
        /// Image ID
        id: ImageId,
    },
    /// Rename an image locally; committed as synced on the next sync
    Rename {
        /// Image ID
        id: ImageId,
        /// New file name
        filename: String,
    },
    /// Drop an image from the local replica
    Forget {
        /// Image ID
        id: ImageId,
    },
    /// Manage the CLI profile file
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
}

#[derive(Subcommand)]
pub enum ConfigCommands {
    /// Print the profile file location and its values
    Show {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Store the sync server base URL in the profile file
    SetServer {
        /// Server base URL, e.g. <https://images.example.com>
        url: String,
    },
}
