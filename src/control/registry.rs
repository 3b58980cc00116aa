//! Registry of discovered media servers
//!
//! The registry owns the device list and is its only writer. It runs as a
//! task fed through an mpsc channel; readers get immutable snapshots through
//! a watch channel and incremental changes through a broadcast channel.
//!
//! Every transport event carries the transport's own device list. When the
//! registry's count no longer matches it, the registry copies the transport
//! list wholesale and reports a [`RegistryEvent::Reset`] instead of an
//! incremental change.

use crate::{
    config::EVENT_CHANNEL_CAPACITY,
    devices::MediaServerHandle,
};
use log::{debug, info, warn};
use std::{collections::HashSet, sync::Arc};
use tokio::{
    sync::{broadcast, mpsc, watch},
    task::JoinHandle,
};

use super::{selection::SelectionSession, transport::TransportEvent};

/// Change notification for registry listeners
#[derive(Debug, Clone, PartialEq)]
pub enum RegistryEvent {
    /// A device was appended at `index`
    Added {
        /// Position of the device in the list
        index: usize,
        /// The device
        device: MediaServerHandle,
    },
    /// The device at `index` was removed
    Removed {
        /// Position the device had in the list
        index: usize,
        /// The device
        device: MediaServerHandle,
    },
    /// The list was rebuilt; listeners should re-read the snapshot
    Reset,
    /// The selected device disappeared and the selection was dropped
    SelectionLost {
        /// The device that was selected
        device: MediaServerHandle,
    },
}

/// Input processed by the registry task, in order
#[derive(Debug, Clone)]
pub enum RegistryInput {
    /// An event from the discovery transport
    Transport(TransportEvent),
    /// Replace the list with the transport's current list
    Resync(Vec<MediaServerHandle>),
    /// Drop every device
    Clear,
}

/// The ordered list of discovered media servers
pub struct DeviceRegistry {
    devices: Vec<MediaServerHandle>,
    selection: Arc<SelectionSession>,
    events: broadcast::Sender<RegistryEvent>,
    snapshot: watch::Sender<Arc<[MediaServerHandle]>>,
}

impl DeviceRegistry {
    /// Creates an empty registry
    pub fn new(selection: Arc<SelectionSession>) -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        let (snapshot, _) = watch::channel(Arc::from(Vec::new()));
        Self {
            devices: Vec::new(),
            selection,
            events,
            snapshot,
        }
    }

    /// Receives every change from now on
    pub fn subscribe(&self) -> broadcast::Receiver<RegistryEvent> {
        self.events.subscribe()
    }

    /// Receives the device list after every change
    pub fn snapshots(&self) -> watch::Receiver<Arc<[MediaServerHandle]>> {
        self.snapshot.subscribe()
    }

    /// Devices in discovery order
    pub fn devices(&self) -> &[MediaServerHandle] {
        &self.devices
    }

    /// Position of a device in the list
    pub fn find_position(&self, device: &MediaServerHandle) -> Option<usize> {
        self.devices.iter().position(|d| d == device)
    }

    /// Applies one input
    pub async fn handle(&mut self, input: RegistryInput) {
        match input {
            RegistryInput::Transport(TransportEvent::Discover { device, devices }) => {
                self.on_discover(device, &devices).await
            }
            RegistryInput::Transport(TransportEvent::Lost { device, devices }) => {
                self.on_lost(device, &devices).await
            }
            RegistryInput::Resync(devices) => self.resync(&devices).await,
            RegistryInput::Clear => self.clear().await,
        }
    }

    /// A device was discovered; `transport_devices` is the transport's list afterwards
    pub async fn on_discover(
        &mut self,
        device: MediaServerHandle,
        transport_devices: &[MediaServerHandle],
    ) {
        if self.find_position(&device).is_some() {
            if transport_devices.len() != self.devices.len() {
                warn!("Duplicate discovery of {device} with diverging counts, resyncing");
                self.resync(transport_devices).await;
            }
            return;
        }
        if transport_devices.len() != self.devices.len() + 1 {
            warn!(
                "Registry holds {} devices but transport reports {}, resyncing",
                self.devices.len(),
                transport_devices.len()
            );
            self.resync(transport_devices).await;
            return;
        }
        let index = self.devices.len();
        debug!("Adding {device} at {index}");
        self.devices.push(device.clone());
        self.publish();
        self.notify(RegistryEvent::Added { index, device });
    }

    /// A device was lost; `transport_devices` is the transport's list afterwards
    pub async fn on_lost(
        &mut self,
        device: MediaServerHandle,
        transport_devices: &[MediaServerHandle],
    ) {
        let Some(index) = self.find_position(&device) else {
            if transport_devices.len() != self.devices.len() {
                warn!("Lost unknown device {device} with diverging counts, resyncing");
                self.resync(transport_devices).await;
            }
            return;
        };
        if self.selection.clear_lost(device.id()).await {
            info!("Selected device {device} was lost");
            self.notify(RegistryEvent::SelectionLost {
                device: device.clone(),
            });
        }
        self.devices.remove(index);
        if transport_devices.len() != self.devices.len() {
            warn!(
                "Registry holds {} devices but transport reports {}, resyncing",
                self.devices.len(),
                transport_devices.len()
            );
            self.resync(transport_devices).await;
            return;
        }
        debug!("Removed {device} from {index}");
        self.publish();
        self.notify(RegistryEvent::Removed { index, device });
    }

    /// Replaces the list with the transport's list
    pub async fn resync(&mut self, transport_devices: &[MediaServerHandle]) {
        let mut seen = HashSet::new();
        let devices: Vec<_> = transport_devices
            .iter()
            .filter(|device| seen.insert(device.id().clone()))
            .cloned()
            .collect();
        self.drop_missing_selection(&devices).await;
        self.devices = devices;
        self.publish();
        self.notify(RegistryEvent::Reset);
    }

    /// Drops every device
    pub async fn clear(&mut self) {
        self.drop_missing_selection(&[]).await;
        self.devices.clear();
        self.publish();
        self.notify(RegistryEvent::Reset);
    }

    async fn drop_missing_selection(&self, remaining: &[MediaServerHandle]) {
        for device in &self.devices {
            if !remaining.contains(device) && self.selection.clear_lost(device.id()).await {
                info!("Selected device {device} was lost");
                self.notify(RegistryEvent::SelectionLost {
                    device: device.clone(),
                });
            }
        }
    }

    fn publish(&self) {
        self.snapshot.send_replace(Arc::from(self.devices.as_slice()));
    }

    fn notify(&self, event: RegistryEvent) {
        // No receivers is fine
        let _ = self.events.send(event);
    }

    /// Moves the registry onto its own task
    pub fn spawn(self) -> (RegistryHandle, JoinHandle<()>) {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let handle = RegistryHandle {
            tx,
            events: self.events.clone(),
            snapshot: self.snapshot.subscribe(),
        };
        let mut registry = self;
        let task = tokio::spawn(async move {
            while let Some(input) = rx.recv().await {
                registry.handle(input).await;
            }
            debug!("Registry task stopped");
        });
        (handle, task)
    }
}

/// Cloneable access to a running registry task
#[derive(Debug, Clone)]
pub struct RegistryHandle {
    tx: mpsc::UnboundedSender<RegistryInput>,
    events: broadcast::Sender<RegistryEvent>,
    snapshot: watch::Receiver<Arc<[MediaServerHandle]>>,
}

impl RegistryHandle {
    /// Queues an input; inputs are applied in the order they are sent
    pub fn send(&self, input: RegistryInput) {
        if self.tx.send(input).is_err() {
            warn!("Registry task is gone, dropping input");
        }
    }

    /// The current device list
    pub fn devices(&self) -> Arc<[MediaServerHandle]> {
        self.snapshot.borrow().clone()
    }

    /// Position of a device in the current list
    pub fn find_position(&self, device: &MediaServerHandle) -> Option<usize> {
        self.snapshot.borrow().iter().position(|d| d == device)
    }

    /// Receives every change from now on
    pub fn subscribe(&self) -> broadcast::Receiver<RegistryEvent> {
        self.events.subscribe()
    }

    /// Receives the device list after every change
    pub fn snapshots(&self) -> watch::Receiver<Arc<[MediaServerHandle]>> {
        self.snapshot.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::devices::types::testing::{Journal, fake_server, handle};

    fn registry() -> (DeviceRegistry, broadcast::Receiver<RegistryEvent>) {
        let registry = DeviceRegistry::new(Arc::new(SelectionSession::new()));
        let events = registry.subscribe();
        (registry, events)
    }

    fn drain(events: &mut broadcast::Receiver<RegistryEvent>) -> Vec<RegistryEvent> {
        let mut drained = Vec::new();
        while let Ok(event) = events.try_recv() {
            drained.push(event);
        }
        drained
    }

    #[tokio::test]
    async fn test_discover_appends_in_order() {
        let (mut registry, mut events) = registry();
        let (a, b) = (handle("a"), handle("b"));

        registry.on_discover(a.clone(), &[a.clone()]).await;
        registry.on_discover(b.clone(), &[a.clone(), b.clone()]).await;

        assert_eq!(registry.devices(), &[a.clone(), b.clone()]);
        assert_eq!(registry.find_position(&b), Some(1));
        assert_eq!(registry.find_position(&handle("c")), None);
        assert_eq!(
            drain(&mut events),
            vec![
                RegistryEvent::Added { index: 0, device: a },
                RegistryEvent::Added { index: 1, device: b },
            ]
        );
    }

    #[tokio::test]
    async fn test_discover_divergence_resyncs() {
        let (mut registry, mut events) = registry();
        let (a, b, c) = (handle("a"), handle("b"), handle("c"));
        registry.on_discover(a.clone(), &[a.clone()]).await;
        drain(&mut events);

        // The discovery of b was missed
        registry
            .on_discover(c.clone(), &[a.clone(), b.clone(), c.clone()])
            .await;

        assert_eq!(drain(&mut events), vec![RegistryEvent::Reset]);
        assert_eq!(registry.devices(), &[a, b, c]);
    }

    #[tokio::test]
    async fn test_duplicate_discover_is_ignored_when_counts_agree() {
        let (mut registry, mut events) = registry();
        let a = handle("a");
        registry.on_discover(a.clone(), &[a.clone()]).await;
        drain(&mut events);

        registry.on_discover(a.clone(), &[a.clone()]).await;
        assert!(drain(&mut events).is_empty());
        assert_eq!(registry.devices().len(), 1);
    }

    #[tokio::test]
    async fn test_lost_removes_by_identity() {
        let (mut registry, mut events) = registry();
        let (a, b) = (handle("a"), handle("b"));
        registry.resync(&[a.clone(), b.clone()]).await;
        drain(&mut events);

        registry.on_lost(handle("a"), &[b.clone()]).await;
        assert_eq!(
            drain(&mut events),
            vec![RegistryEvent::Removed { index: 0, device: a }]
        );
        assert_eq!(registry.devices(), &[b]);
    }

    #[tokio::test]
    async fn test_lost_divergence_resyncs() {
        let (mut registry, mut events) = registry();
        let (a, b, c) = (handle("a"), handle("b"), handle("c"));
        registry.resync(&[a.clone(), b.clone()]).await;
        drain(&mut events);

        registry.on_lost(a.clone(), &[b.clone(), c.clone()]).await;
        assert_eq!(drain(&mut events), vec![RegistryEvent::Reset]);
        assert_eq!(registry.devices(), &[b.clone(), c.clone()]);

        // Unknown device, counts diverge
        registry.on_lost(handle("x"), &[c.clone()]).await;
        assert_eq!(drain(&mut events), vec![RegistryEvent::Reset]);
        assert_eq!(registry.devices(), &[c]);
    }

    #[tokio::test]
    async fn test_lost_selected_device_reports_selection_lost_first() {
        let selection = Arc::new(SelectionSession::new());
        let mut registry = DeviceRegistry::new(selection.clone());
        let mut events = registry.subscribe();
        let journal = Arc::new(Journal::default());
        let (a, _) = fake_server("a", &journal);
        let (b, _) = fake_server("b", &journal);
        registry.resync(&[a.clone(), b.clone()]).await;
        selection.select(&a).await.unwrap();
        drain(&mut events);

        registry.on_lost(a.clone(), &[b.clone()]).await;

        assert_eq!(
            drain(&mut events),
            vec![
                RegistryEvent::SelectionLost { device: a.clone() },
                RegistryEvent::Removed { index: 0, device: a },
            ]
        );
        assert_eq!(selection.selected().await, None);
        assert_eq!(journal.outstanding(), 1);
    }

    #[tokio::test]
    async fn test_clear_drops_selection() {
        let selection = Arc::new(SelectionSession::new());
        let mut registry = DeviceRegistry::new(selection.clone());
        let mut events = registry.subscribe();
        let a = handle("a");
        registry.resync(&[a.clone()]).await;
        selection.select(&a).await.unwrap();
        drain(&mut events);

        registry.clear().await;
        assert_eq!(
            drain(&mut events),
            vec![RegistryEvent::SelectionLost { device: a }, RegistryEvent::Reset]
        );
        assert!(registry.devices().is_empty());
    }

    #[tokio::test]
    async fn test_resync_deduplicates() {
        let (mut registry, _events) = registry();
        let a = handle("a");
        registry.resync(&[a.clone(), handle("a")]).await;
        assert_eq!(registry.devices(), &[a]);
    }

    #[tokio::test]
    async fn test_spawned_registry_publishes_snapshots() {
        let (registry, task) = DeviceRegistry::new(Arc::new(SelectionSession::new())).spawn();
        let mut snapshots = registry.snapshots();
        let (a, b) = (handle("a"), handle("b"));

        registry.send(RegistryInput::Transport(TransportEvent::Discover {
            device: a.clone(),
            devices: vec![a.clone()],
        }));
        registry.send(RegistryInput::Transport(TransportEvent::Discover {
            device: b.clone(),
            devices: vec![a.clone(), b.clone()],
        }));

        let devices = snapshots
            .wait_for(|devices| devices.len() == 2)
            .await
            .unwrap()
            .clone();
        assert_eq!(&*devices, &[a, b.clone()]);
        assert_eq!(registry.find_position(&b), Some(1));

        drop(registry);
        drop(snapshots);
        task.await.unwrap();
    }
}
