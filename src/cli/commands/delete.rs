//! Delete command implementation for dlna-explorer
//!
//! Removes one object from a media server's content directory.

use crate::{config::Config, error::Result};
use log::info;

use super::find_server;

/// Delete command implementation
pub struct DeleteCommand<'a> {
    args: &'a super::super::Delete,
}

impl<'a> DeleteCommand<'a> {
    /// Create a new delete command
    pub fn new(args: &'a super::super::Delete) -> Self {
        Self { args }
    }

    /// Execute the delete command
    pub async fn run(&self, config: &Config) -> Result<()> {
        let (control_point, server) =
            find_server(config, self.args.server_query.as_deref()).await?;

        let result = match control_point.select(&server).await {
            Ok(()) => {
                info!("Deleting '{}' from {}", self.args.object_id, server.friendly_name());
                control_point.delete(&self.args.object_id).await
            }
            Err(e) => Err(e),
        };
        control_point.terminate().await;
        result
    }
}
