//! The control point facade
//!
//! Wires the discovery controller, the device registry task and the
//! selection session together, the way a front end consumes them.

use crate::{
    config::{Config, DELETE_FAILED_MSG, DELETE_SUCCEEDED_MSG},
    devices::MediaServerHandle,
    error::{Error, Result},
    net::NetworkMonitor,
    notify::{Notifier, NotifyLevel},
};
use log::{debug, warn};
use std::sync::Arc;
use tokio::{
    sync::{broadcast, watch},
    task::JoinHandle,
};

use super::{
    controller::DiscoveryController,
    registry::{DeviceRegistry, RegistryEvent, RegistryHandle, RegistryInput},
    selection::SelectionSession,
    transport::{DiscoveryTransport, TransportListener},
};

/// Discovers media servers and tracks the selected one
pub struct ControlPoint<T: DiscoveryTransport> {
    controller: Arc<DiscoveryController<T>>,
    registry: RegistryHandle,
    registry_task: JoinHandle<()>,
    selection: Arc<SelectionSession>,
    notifier: Arc<dyn Notifier>,
}

impl<T: DiscoveryTransport> ControlPoint<T> {
    /// Builds the control point and starts its registry task
    pub fn new(
        transport: T,
        monitor: Arc<dyn NetworkMonitor>,
        notifier: Arc<dyn Notifier>,
        config: &Config,
    ) -> Self {
        let selection = Arc::new(SelectionSession::new());
        let (registry, registry_task) = DeviceRegistry::new(selection.clone()).spawn();

        let sink = registry.clone();
        let listener: TransportListener =
            Arc::new(move |event| sink.send(RegistryInput::Transport(event)));

        let controller = DiscoveryController::new(
            transport,
            monitor,
            notifier.clone(),
            selection.clone(),
            listener,
            config,
        );
        Self {
            controller,
            registry,
            registry_task,
            selection,
            notifier,
        }
    }

    /// Starts discovery if a network is usable
    pub async fn initialize(&self) -> Result<()> {
        self.controller.initialize().await
    }

    /// Starts searching and brings the registry in line with the transport
    pub async fn start_search(&self) {
        self.controller.start_search().await;
        let devices = self.controller.devices().await;
        self.registry.send(RegistryInput::Resync(devices));
    }

    /// Stops searching
    pub async fn stop_search(&self) {
        self.controller.stop_search().await;
    }

    /// Restarts discovery from scratch, emptying the registry on the way
    pub async fn restart(&self) -> Result<()> {
        let registry = self.registry.clone();
        self.controller
            .restart(Some(Box::new(move || {
                debug!("Clearing registry for restart");
                registry.send(RegistryInput::Clear);
            })))
            .await
    }

    /// Stops discovery for good
    pub async fn terminate(self) {
        self.controller.terminate().await;
        drop(self.registry);
        drop(self.controller);
        if let Err(e) = self.registry_task.await {
            debug!("Registry task ended abnormally: {e}");
        }
    }

    /// Selects a media server, subscribing to its events
    pub async fn select(&self, device: &MediaServerHandle) -> Result<()> {
        self.selection.select(device).await
    }

    /// Drops the current selection
    pub async fn unselect(&self) {
        self.selection.unselect().await;
    }

    /// The selected media server
    pub async fn selected(&self) -> Option<MediaServerHandle> {
        self.selection.selected().await
    }

    /// Whether a media server is the selected one
    pub async fn is_selected(&self, device: &MediaServerHandle) -> bool {
        self.selection.is_selected(device).await
    }

    /// Deletes an object from the selected media server
    ///
    /// The outcome is notified either way.
    pub async fn delete(&self, object_id: &str) -> Result<()> {
        let Some(server) = self.selection.selected().await else {
            return Err(Error::NoSelection {
                operation: "delete".to_string(),
            });
        };
        match server.destroy_object(object_id).await {
            Ok(()) => {
                self.notifier
                    .notify(NotifyLevel::Info, DELETE_SUCCEEDED_MSG);
                Ok(())
            }
            Err(e) => {
                warn!("Deleting '{object_id}' from {} failed: {e}", server.friendly_name());
                self.notifier.notify(NotifyLevel::Error, DELETE_FAILED_MSG);
                Err(e)
            }
        }
    }

    /// Current list of media servers
    pub fn devices(&self) -> Arc<[MediaServerHandle]> {
        self.registry.devices()
    }

    /// Position of a media server in the list
    pub fn find_position(&self, device: &MediaServerHandle) -> Option<usize> {
        self.registry.find_position(device)
    }

    /// Receives registry changes from now on
    pub fn subscribe(&self) -> broadcast::Receiver<RegistryEvent> {
        self.registry.subscribe()
    }

    /// Receives the media server list after every change
    pub fn snapshots(&self) -> watch::Receiver<Arc<[MediaServerHandle]>> {
        self.registry.snapshots()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        control::transport::testing::FakeTransport,
        content::ContentItem,
        devices::types::testing::{Call, Journal, fake_server, handle},
        net::testing::FakeMonitor,
        notify::{LogNotifier, testing::RecordingNotifier},
    };
    use std::{sync::atomic::Ordering, time::Duration};

    fn control_point(transport: &FakeTransport) -> ControlPoint<FakeTransport> {
        ControlPoint::new(
            transport.clone(),
            FakeMonitor::new(true),
            Arc::new(LogNotifier),
            &Config::default(),
        )
    }

    async fn wait_for_devices(
        control_point: &ControlPoint<FakeTransport>,
        expected: &[MediaServerHandle],
    ) {
        let mut snapshots = control_point.snapshots();
        tokio::time::timeout(
            Duration::from_secs(1),
            snapshots.wait_for(|devices| devices.as_ref() == expected),
        )
        .await
        .unwrap()
        .unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_discovered_devices_reach_registry() {
        let transport = FakeTransport::default();
        let control_point = control_point(&transport);
        control_point.initialize().await.unwrap();
        control_point.start_search().await;

        transport.state().announce(handle("nas"));
        transport.state().announce(handle("laptop"));
        wait_for_devices(&control_point, &[handle("nas"), handle("laptop")]).await;
        assert_eq!(control_point.find_position(&handle("laptop")), Some(1));

        control_point.stop_search().await;
        control_point.terminate().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_start_search_resyncs_with_transport() {
        let transport = FakeTransport::default();
        transport.state().devices = vec![handle("nas"), handle("laptop")];
        let control_point = control_point(&transport);
        let mut events = control_point.subscribe();

        control_point.start_search().await;
        assert_eq!(events.recv().await.unwrap(), RegistryEvent::Reset);
        assert_eq!(control_point.devices().len(), 2);
        control_point.stop_search().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_repeated_restart_keeps_only_last_cycle() {
        let transport = FakeTransport::default();
        let control_point = control_point(&transport);
        control_point.initialize().await.unwrap();
        control_point.start_search().await;

        transport.state().announce(handle("stale"));
        wait_for_devices(&control_point, &[handle("stale")]).await;

        for round in 0..3 {
            let fresh = handle(&format!("fresh-{round}"));
            transport.state().on_start = vec![fresh.clone()];
            control_point.restart().await.unwrap();
            wait_for_devices(&control_point, &[fresh.clone()]).await;
            assert_eq!(control_point.find_position(&fresh), Some(0));
        }
        control_point.stop_search().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_select_through_facade() {
        let transport = FakeTransport::default();
        let control_point = control_point(&transport);
        let nas = handle("nas");

        control_point.select(&nas).await.unwrap();
        assert!(control_point.is_selected(&nas).await);
        assert_eq!(control_point.selected().await, Some(nas));
        control_point.unselect().await;
        assert_eq!(control_point.selected().await, None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_delete_from_selected_server() {
        let notifier = Arc::new(RecordingNotifier::default());
        let control_point = ControlPoint::new(
            FakeTransport::default(),
            FakeMonitor::new(true),
            notifier.clone(),
            &Config::default(),
        );
        let journal = Arc::new(Journal::default());
        let (nas, server) = fake_server("nas", &journal);
        *server.listing.lock().unwrap() = vec![ContentItem {
            id: "64$3".to_string(),
            ..Default::default()
        }];

        assert!(matches!(
            control_point.delete("64$3").await,
            Err(Error::NoSelection { .. })
        ));

        control_point.select(&nas).await.unwrap();
        control_point.delete("64$3").await.unwrap();
        assert!(nas.browse("64").await.unwrap().is_empty());
        assert!(journal
            .calls()
            .contains(&Call::Destroy("nas".to_string(), "64$3".to_string())));

        server.fail_destroy.store(true, Ordering::SeqCst);
        assert!(control_point.delete("64$4").await.is_err());
        assert_eq!(
            notifier.texts(),
            vec![DELETE_SUCCEEDED_MSG, DELETE_FAILED_MSG]
        );
    }
}
