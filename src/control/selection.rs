//! The currently selected media server
//!
//! Selection changes are serialised by one lock held across the whole
//! unsubscribe/subscribe pair, so at most one subscription is ever open.

use crate::{
    devices::{DeviceId, MediaServerHandle},
    error::Result,
};
use log::{debug, info, warn};
use tokio::sync::Mutex;

/// Holds at most one subscribed media server
#[derive(Debug, Default)]
pub struct SelectionSession {
    selected: Mutex<Option<MediaServerHandle>>,
}

impl SelectionSession {
    /// Creates a session with nothing selected
    pub fn new() -> Self {
        Self::default()
    }

    /// Selects a server, subscribing to it
    ///
    /// Selecting the server that is already selected does nothing. A
    /// previous selection is unsubscribed first; failures doing so are only
    /// logged. If subscribing fails the error is returned and nothing is
    /// selected afterwards.
    pub async fn select(&self, device: &MediaServerHandle) -> Result<()> {
        let mut selected = self.selected.lock().await;
        if selected.as_ref() == Some(device) {
            debug!("{} is already selected", device.friendly_name());
            return Ok(());
        }
        if let Some(previous) = selected.take() {
            if let Err(e) = previous.unsubscribe().await {
                warn!("Failed to unsubscribe from {}: {e}", previous.friendly_name());
            }
        }
        device.subscribe().await?;
        info!("Selected {}", device.friendly_name());
        *selected = Some(device.clone());
        Ok(())
    }

    /// Unsubscribes from the selected server and clears the selection
    pub async fn unselect(&self) {
        let mut selected = self.selected.lock().await;
        if let Some(previous) = selected.take() {
            if let Err(e) = previous.unsubscribe().await {
                warn!("Failed to unsubscribe from {}: {e}", previous.friendly_name());
            }
            info!("Unselected {}", previous.friendly_name());
        }
    }

    /// Whether the given server is the selected one
    pub async fn is_selected(&self, device: &MediaServerHandle) -> bool {
        self.selected.lock().await.as_ref() == Some(device)
    }

    /// The selected server, if any
    pub async fn selected(&self) -> Option<MediaServerHandle> {
        self.selected.lock().await.clone()
    }

    /// Drops the selection of a device that went away, without contacting it
    ///
    /// Returns whether the device was selected.
    pub async fn clear_lost(&self, id: &DeviceId) -> bool {
        let mut selected = self.selected.lock().await;
        if selected.as_ref().is_some_and(|device| device.id() == id) {
            selected.take();
            true
        } else {
            false
        }
    }
}
