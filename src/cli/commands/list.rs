//! List command implementation for dlna-explorer
//!
//! This module implements the list command which discovers and displays
//! the media servers available on the network.

use crate::{
    config::{Config, LOG_MSG_LIST_DEVICES, NO_DEVICES_DISCOVERED_MSG},
    error::Result,
};
use log::info;
use std::time::Duration;
use tokio::time::sleep;

use super::start_control_point;

/// List command implementation
pub struct ListCommand<'a> {
    _args: &'a super::super::List,
}

impl<'a> ListCommand<'a> {
    /// Create a new list command
    pub fn new(args: &'a super::super::List) -> Self {
        Self { _args: args }
    }

    /// Execute the list command
    pub async fn run(&self, config: &Config) -> Result<()> {
        info!("{LOG_MSG_LIST_DEVICES}");
        let control_point = start_control_point(config).await?;
        sleep(Duration::from_secs(config.discovery_timeout)).await;

        let devices = control_point.devices();
        if devices.is_empty() {
            info!("{NO_DEVICES_DISCOVERED_MSG}");
        }
        for device in devices.iter() {
            println!("{device}");
        }

        control_point.stop_search().await;
        control_point.terminate().await;
        Ok(())
    }
}
