//! Browse command implementation for dlna-explorer
//!
//! This module implements the browse command which lists one container of a
//! media server.

use crate::{config::Config, error::Result};
use log::info;

use super::find_server;

/// Browse command implementation
pub struct BrowseCommand<'a> {
    args: &'a super::super::Browse,
}

impl<'a> BrowseCommand<'a> {
    /// Create a new browse command
    pub fn new(args: &'a super::super::Browse) -> Self {
        Self { args }
    }

    /// Execute the browse command
    pub async fn run(&self, config: &Config) -> Result<()> {
        let (control_point, server) =
            find_server(config, self.args.server_query.as_deref()).await?;

        let listing = match control_point.select(&server).await {
            Ok(()) => {
                info!("Browsing '{}' on {}", self.args.object_id, server.friendly_name());
                let listing = server.browse(&self.args.object_id).await;
                control_point.unselect().await;
                listing
            }
            Err(e) => Err(e),
        };
        control_point.terminate().await;

        for item in listing? {
            println!("{item}");
        }
        Ok(())
    }
}
