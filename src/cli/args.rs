//! CLI argument parsing for dlna-explorer
//!
//! This module contains the CLI argument definitions and parsing logic
//! using the clap crate.

use crate::{
    config::{Config, DEFAULT_DISCOVERY_TIMEOUT, ROOT_OBJECT_ID},
    settings::RepeatMode,
};
use clap::{Args, Parser};
use log::LevelFilter;

/// Explore UPnP/DLNA media servers and play their content on a render
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Time in seconds to search and discover media servers and renders
    #[arg(short, long, default_value_t = DEFAULT_DISCOVERY_TIMEOUT)]
    pub timeout: u64,

    /// Log level
    #[arg(long, value_name = "LEVEL", global = true, default_value_t = LevelFilter::Info)]
    pub log_level: LevelFilter,

    /// The command to execute
    #[command(subcommand)]
    pub command: super::Commands,
}

impl Cli {
    /// Build a Config from CLI arguments and Play command
    pub fn build_config(&self, play_cmd: Option<&Play>) -> Config {
        let mut config = Config::new()
            .with_discovery_timeout(self.timeout)
            .with_log_level(self.log_level);

        if let Some(play) = play_cmd {
            config = config.with_autoplay(!play.paused);
        }

        config
    }
}

/// List command arguments
#[derive(Args)]
pub struct List;

/// Browse command arguments
#[derive(Args)]
pub struct Browse {
    /// Specify the media server through a query on its description (first one found otherwise)
    #[arg(short = 's', long = "server")]
    pub server_query: Option<String>,

    /// Object id of the container to list
    #[arg(short, long = "object-id", default_value = ROOT_OBJECT_ID)]
    pub object_id: String,
}

/// Delete command arguments
#[derive(Args)]
pub struct Delete {
    /// Specify the media server through a query on its description (first one found otherwise)
    #[arg(short = 's', long = "server")]
    pub server_query: Option<String>,

    /// Object id of the item or container to delete
    #[arg(short, long = "object-id")]
    pub object_id: String,
}

/// Play command arguments
#[derive(Args)]
pub struct Play {
    /// Specify the media server through a query on its description (first one found otherwise)
    #[arg(short = 's', long = "server")]
    pub server_query: Option<String>,

    /// Object id of the container whose items make the playlist
    #[arg(short, long = "object-id", default_value = ROOT_OBJECT_ID)]
    pub object_id: String,

    /// Index of the first item to play among the playable items of the container
    #[arg(short, long, default_value_t = 0)]
    pub index: usize,

    /// Specify the render through a query (scan devices before playing)
    #[arg(short = 'q', long = "query-device")]
    pub device_query: Option<String>,

    /// Specify the render through its exact location (no scan, faster)
    #[arg(short, long = "device")]
    pub device_url: Option<String>,

    /// Repeat mode to use and remember for the category of the first item
    #[arg(short, long, value_enum)]
    pub repeat: Option<RepeatMode>,

    /// Load the first item without starting playback
    #[arg(long)]
    pub paused: bool,
}
