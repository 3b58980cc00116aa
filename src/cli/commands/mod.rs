//! CLI command implementations for dlna-explorer
//!
//! This module contains the implementation of CLI commands including
//! list, browse, delete and play functionality.

mod browse;
mod delete;
mod list;
mod play;

pub use browse::BrowseCommand;
pub use delete::DeleteCommand;
pub use list::ListCommand;
pub use play::PlayCommand;

use crate::{
    config::{Config, LOG_LEVEL_ENV_VAR},
    control::{ControlPoint, SsdpTransport},
    devices::MediaServerHandle,
    error::{Error, Result},
    net::LanMonitor,
    notify::LogNotifier,
};
use clap::Subcommand;
use log::{LevelFilter, debug, info};
use simple_logger::SimpleLogger;
use std::{env, sync::Arc, time::Duration};
use tokio::time::timeout;

/// Available CLI commands
#[derive(Subcommand)]
pub enum Commands {
    /// Scan and list media servers in the network
    List(super::List),

    /// List the content of a container of a media server
    Browse(super::Browse),

    /// Delete an item or container from a media server
    Delete(super::Delete),

    /// Play the items of a container on a render
    Play(super::Play),
}

impl Commands {
    /// Execute the command
    pub async fn run(&self, cli: &super::Cli) -> Result<()> {
        let config = match self {
            Self::Play(play) => cli.build_config(Some(play)),
            _ => cli.build_config(None),
        };
        self.setup_log(&config);
        match self {
            Self::List(list) => ListCommand::new(list).run(&config).await?,
            Self::Browse(browse) => BrowseCommand::new(browse).run(&config).await?,
            Self::Delete(delete) => DeleteCommand::new(delete).run(&config).await?,
            Self::Play(play) => PlayCommand::new(play).run(&config).await?,
        }
        Ok(())
    }

    /// Setup logging configuration
    fn setup_log(&self, config: &Config) {
        let log_level = env::var(LOG_LEVEL_ENV_VAR)
            .ok()
            .and_then(|level| level.parse::<LevelFilter>().ok())
            .unwrap_or(config.log_level);

        SimpleLogger::new()
            .with_level(log_level)
            .init()
            .unwrap_or_else(|_| eprintln!("Warning: Logger already initialized"));
    }
}

/// Starts a control point searching the network
async fn start_control_point(config: &Config) -> Result<ControlPoint<SsdpTransport>> {
    let monitor = LanMonitor::start(config.network_poll_interval)?;
    let control_point = ControlPoint::new(
        SsdpTransport::new(config),
        monitor,
        Arc::new(LogNotifier),
        config,
    );
    control_point.initialize().await?;
    control_point.start_search().await;
    Ok(control_point)
}

/// Discovers the media server matching `query`, or the first one found
///
/// The returned control point keeps the server tracked; terminate it when done.
async fn find_server(
    config: &Config,
    query: Option<&str>,
) -> Result<(ControlPoint<SsdpTransport>, MediaServerHandle)> {
    let control_point = start_control_point(config).await?;
    let matches = |device: &MediaServerHandle| {
        query.is_none_or(|query| device.to_string().contains(query))
    };

    let mut snapshots = control_point.snapshots();
    let found = match timeout(
        Duration::from_secs(config.discovery_timeout),
        snapshots.wait_for(|devices| devices.iter().any(|device| matches(device))),
    )
    .await
    {
        Ok(Ok(devices)) => devices.iter().find(|&device| matches(device)).cloned(),
        _ => None,
    };

    match found {
        Some(server) => {
            info!("Using media server {server}");
            control_point.stop_search().await;
            Ok((control_point, server))
        }
        None => {
            debug!("No media server matched within {}s", config.discovery_timeout);
            control_point.terminate().await;
            Err(Error::ServerNotFound {
                query: query.unwrap_or_default().to_string(),
                context: format!(
                    "Nothing found within {} seconds",
                    config.discovery_timeout
                ),
            })
        }
    }
}
