use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "taskworker")]
#[command(about = "Dispatcher-polling worker services", long_about = None)]
pub struct Cli {
    /// Configuration file (defaults to $TASKWORKER_CONFIG or config/taskworker.toml)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the torrent manager service
    Tr,
    /// Run the finance service
    Fin,
    /// Run the video download service
    Ytdl,
    /// Print the effective configuration as TOML and exit
    ShowConfig,
    /// Replace the stored positions with a CSV export and print the sync summary
    ImportPositions {
        /// CSV file with the positions columns
        file: PathBuf,
        /// Source recorded in the sync metadata
        #[arg(long, default_value = "manual")]
        source: String,
    },
}
