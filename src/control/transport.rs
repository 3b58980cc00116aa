//! Discovery transport
//!
//! The transport issues multicast searches and reports media servers coming
//! and going. Every event carries a snapshot of the transport's own device
//! list so that consumers can detect when their view has drifted.
//!
//! The SSDP transport keeps the interface set it was initialized with. The
//! search socket itself listens on every interface; answers from devices
//! whose IPv4 location is on none of the bound networks are dropped.

use crate::{
    config::{Config, SSDP_SEARCH_TIMEOUT_SECS},
    devices::{
        DeviceId, MediaServer, MediaServerHandle,
        discovery::{CONTENT_DIRECTORY, upnp_discover_with_config},
    },
    error::{Error, Result},
    net::NetworkInterfaceSet,
};
use async_trait::async_trait;
use futures_util::StreamExt;
use http::Uri;
use log::{debug, info, warn};
use rupnp::ssdp::SearchTarget;
use std::{
    collections::HashSet,
    net::Ipv4Addr,
    sync::{Arc, Mutex},
    time::Duration,
};
use tokio::{sync::oneshot, task::JoinHandle};

/// Notification emitted by a [`DiscoveryTransport`]
#[derive(Debug, Clone)]
pub enum TransportEvent {
    /// A device answered a search
    Discover {
        /// The device
        device: MediaServerHandle,
        /// Devices known to the transport after the discovery
        devices: Vec<MediaServerHandle>,
    },
    /// A device stopped answering or the transport was torn down
    Lost {
        /// The device
        device: MediaServerHandle,
        /// Devices known to the transport after the loss
        devices: Vec<MediaServerHandle>,
    },
}

/// Callback receiving transport events, in emission order
pub type TransportListener = Arc<dyn Fn(TransportEvent) + Send + Sync>;

/// Searches the network for media servers
///
/// All methods are called under the controller's lock; implementations
/// need no synchronisation of their own for lifecycle state.
#[async_trait]
pub trait DiscoveryTransport: Send + 'static {
    /// Binds the transport to the given interfaces
    async fn initialize(&mut self, interfaces: &NetworkInterfaceSet) -> Result<()>;

    /// Starts accepting search results
    async fn start(&mut self) -> Result<()>;

    /// Stops accepting search results
    async fn stop(&mut self) -> Result<()>;

    /// Releases everything acquired by [`DiscoveryTransport::initialize`]
    async fn terminate(&mut self) -> Result<()>;

    /// Issues one multicast search request
    async fn search(&mut self) -> Result<()>;

    /// Whether [`DiscoveryTransport::initialize`] succeeded and was not torn down since
    fn is_initialized(&self) -> bool;

    /// Devices currently known to the transport, in discovery order
    fn devices(&self) -> Vec<MediaServerHandle>;

    /// Attaches or detaches the event listener
    fn set_listener(&mut self, listener: Option<TransportListener>);
}

#[derive(Debug)]
struct Tracked {
    handle: MediaServerHandle,
    missed: u32,
}

#[derive(Default)]
struct SsdpState {
    initialized: bool,
    running: bool,
    epoch: u64,
    interfaces: NetworkInterfaceSet,
    devices: Vec<Tracked>,
    listener: Option<TransportListener>,
}

impl SsdpState {
    fn snapshot(&self) -> Vec<MediaServerHandle> {
        self.devices.iter().map(|t| t.handle.clone()).collect()
    }

    fn emit(&self, event: TransportEvent) {
        if let Some(listener) = &self.listener {
            listener(event);
        }
    }

    fn found(&mut self, epoch: u64, handle: MediaServerHandle) {
        if epoch != self.epoch || !self.running {
            return;
        }
        if let Some(tracked) = self.devices.iter_mut().find(|t| t.handle == handle) {
            tracked.missed = 0;
            return;
        }
        info!("Media server appeared: {handle}");
        self.devices.push(Tracked {
            handle: handle.clone(),
            missed: 0,
        });
        self.emit(TransportEvent::Discover {
            device: handle,
            devices: self.snapshot(),
        });
    }

    fn expire(&mut self, epoch: u64, seen: &HashSet<DeviceId>, max_missed: u32) {
        if epoch != self.epoch || !self.running {
            return;
        }
        for tracked in &mut self.devices {
            if !seen.contains(tracked.handle.id()) {
                tracked.missed += 1;
            }
        }
        while let Some(position) = self.devices.iter().position(|t| t.missed >= max_missed) {
            let lost = self.devices.remove(position).handle;
            info!("Media server disappeared: {lost}");
            self.emit(TransportEvent::Lost {
                device: lost,
                devices: self.snapshot(),
            });
        }
    }

    fn drop_all(&mut self) {
        while let Some(tracked) = self.devices.pop() {
            self.emit(TransportEvent::Lost {
                device: tracked.handle,
                devices: self.snapshot(),
            });
        }
    }
}

/// Transport searching for ContentDirectory services over SSDP
pub struct SsdpTransport {
    state: Arc<Mutex<SsdpState>>,
    search_task: Option<JoinHandle<()>>,
    search_timeout: Duration,
    search_attempts: usize,
    ttl: Option<u32>,
    expiry_searches: u32,
    subnet_prefix: u8,
}

/// Whether a device answering at `location` is on a bound network
///
/// Locations naming a host instead of an IPv4 address are accepted.
fn on_bound_network(location: &Uri, interfaces: &NetworkInterfaceSet, prefix: u8) -> bool {
    match location.host().and_then(|host| host.parse::<Ipv4Addr>().ok()) {
        Some(address) => interfaces.reaches(address, prefix),
        None => true,
    }
}

impl SsdpTransport {
    /// Creates a transport using the SSDP settings of the configuration
    pub fn new(config: &Config) -> Self {
        Self {
            state: Arc::new(Mutex::new(SsdpState::default())),
            search_task: None,
            search_timeout: Duration::from_secs(SSDP_SEARCH_TIMEOUT_SECS),
            search_attempts: config.ssdp_search_attempts,
            ttl: config.ssdp_ttl,
            expiry_searches: config.device_expiry_searches.max(1),
            subnet_prefix: config.bound_subnet_prefix,
        }
    }

    fn with_state<R>(&self, f: impl FnOnce(&mut SsdpState) -> R) -> Result<R> {
        let mut state = self.state.lock().map_err(|_| Error::TransportFailed {
            operation: "lock".to_string(),
            reason: "transport state poisoned".to_string(),
        })?;
        Ok(f(&mut state))
    }

    fn abort_search(&mut self) {
        if let Some(task) = self.search_task.take() {
            task.abort();
        }
    }
}

#[async_trait]
impl DiscoveryTransport for SsdpTransport {
    async fn initialize(&mut self, interfaces: &NetworkInterfaceSet) -> Result<()> {
        debug!("Initializing SSDP transport on {interfaces}");
        if !interfaces.is_available() {
            return Err(Error::NoAvailableNetwork {
                context: "SSDP transport initialization".to_string(),
            });
        }
        self.with_state(|state| {
            state.initialized = true;
            state.epoch += 1;
            state.interfaces = interfaces.clone();
        })
    }

    async fn start(&mut self) -> Result<()> {
        self.with_state(|state| state.running = true)
    }

    async fn stop(&mut self) -> Result<()> {
        self.abort_search();
        self.with_state(|state| {
            state.running = false;
            state.epoch += 1;
        })
    }

    async fn terminate(&mut self) -> Result<()> {
        self.abort_search();
        self.with_state(|state| {
            state.initialized = false;
            state.running = false;
            state.epoch += 1;
            state.interfaces = NetworkInterfaceSet::default();
            state.drop_all();
        })
    }

    async fn search(&mut self) -> Result<()> {
        let bound = self.with_state(|state| {
            (state.initialized && state.running).then(|| (state.epoch, state.interfaces.clone()))
        })?;
        let Some((epoch, interfaces)) = bound else {
            return Err(Error::TransportFailed {
                operation: "search".to_string(),
                reason: "transport is not running".to_string(),
            });
        };
        if self.search_task.as_ref().is_some_and(|task| !task.is_finished()) {
            debug!("Previous search still in flight, skipping");
            return Ok(());
        }

        let state = self.state.clone();
        let (sent_tx, sent_rx) = oneshot::channel();
        let (timeout, attempts, ttl) = (self.search_timeout, self.search_attempts, self.ttl);
        let max_missed = self.expiry_searches;
        let prefix = self.subnet_prefix;

        self.search_task = Some(tokio::spawn(async move {
            let target = SearchTarget::URN(CONTENT_DIRECTORY);
            let responses = match upnp_discover_with_config(&target, timeout, attempts, ttl).await {
                Ok(responses) => {
                    let _ = sent_tx.send(Ok(()));
                    responses
                }
                Err(e) => {
                    let _ = sent_tx.send(Err(e));
                    return;
                }
            };
            let mut responses = std::pin::pin!(responses);
            let mut seen = HashSet::new();
            while let Some(result) = responses.next().await {
                match result {
                    Ok(device) => {
                        if !on_bound_network(device.url(), &interfaces, prefix) {
                            debug!("Ignoring {} outside {interfaces}", device.url());
                            continue;
                        }
                        let Some(server) = MediaServer::from_device(device) else {
                            continue;
                        };
                        let handle = server.into_handle();
                        if seen.insert(handle.id().clone()) {
                            if let Ok(mut state) = state.lock() {
                                state.found(epoch, handle);
                            }
                        }
                    }
                    Err(e) => debug!("A device returned error while discovering it: {e}"),
                }
            }
            if let Ok(mut state) = state.lock() {
                state.expire(epoch, &seen, max_missed);
            }
        }));

        match sent_rx.await {
            Ok(result) => result,
            Err(_) => {
                warn!("Search task ended before sending its request");
                Ok(())
            }
        }
    }

    fn is_initialized(&self) -> bool {
        self.state.lock().map(|state| state.initialized).unwrap_or(false)
    }

    fn devices(&self) -> Vec<MediaServerHandle> {
        self.state
            .lock()
            .map(|state| state.snapshot())
            .unwrap_or_default()
    }

    fn set_listener(&mut self, listener: Option<TransportListener>) {
        if let Ok(mut state) = self.state.lock() {
            state.listener = listener;
        }
    }
}

impl Drop for SsdpTransport {
    fn drop(&mut self) {
        self.abort_search();
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use crate::devices::types::testing::handle;

    fn recording_state() -> (SsdpState, Arc<Mutex<Vec<TransportEvent>>>) {
        let events = Arc::new(Mutex::new(Vec::new()));
        let sink = events.clone();
        let state = SsdpState {
            initialized: true,
            running: true,
            epoch: 1,
            listener: Some(Arc::new(move |event| sink.lock().unwrap().push(event))),
            ..Default::default()
        };
        (state, events)
    }

    #[test]
    fn test_found_emits_discover_once() {
        let (mut state, events) = recording_state();
        state.found(1, handle("nas"));
        state.found(1, handle("nas"));
        state.found(1, handle("laptop"));

        let events = events.lock().unwrap();
        assert_eq!(events.len(), 2);
        match &events[1] {
            TransportEvent::Discover { device, devices } => {
                assert_eq!(device, &handle("laptop"));
                assert_eq!(devices.len(), 2);
            }
            other => panic!("unexpected event {other:?}"),
        }
    }

    #[test]
    fn test_stale_epoch_is_ignored() {
        let (mut state, events) = recording_state();
        state.found(0, handle("nas"));
        assert!(state.devices.is_empty());
        assert!(events.lock().unwrap().is_empty());
    }

    #[test]
    fn test_expire_after_missed_searches() {
        let (mut state, events) = recording_state();
        state.found(1, handle("nas"));
        state.found(1, handle("laptop"));

        let seen: HashSet<_> = [handle("laptop").id().clone()].into_iter().collect();
        state.expire(1, &seen, 2);
        assert_eq!(state.devices.len(), 2);
        state.expire(1, &seen, 2);
        assert_eq!(state.snapshot(), vec![handle("laptop")]);

        let events = events.lock().unwrap();
        match events.last() {
            Some(TransportEvent::Lost { device, devices }) => {
                assert_eq!(device, &handle("nas"));
                assert_eq!(devices, &vec![handle("laptop")]);
            }
            other => panic!("unexpected event {other:?}"),
        }
    }

    #[test]
    fn test_drop_all_reports_every_device() {
        let (mut state, events) = recording_state();
        state.found(1, handle("nas"));
        state.found(1, handle("laptop"));
        state.drop_all();

        assert!(state.devices.is_empty());
        let events = events.lock().unwrap();
        assert_eq!(events.len(), 4);
        assert!(matches!(&events[3], TransportEvent::Lost { devices, .. } if devices.is_empty()));
    }

    #[test]
    fn test_on_bound_network() {
        let interfaces = crate::net::testing::interfaces(true);
        let address = interfaces.iter().next().unwrap().address.octets();
        let local: Uri = format!(
            "http://{}.{}.{}.200:8200/desc.xml",
            address[0], address[1], address[2]
        )
        .parse()
        .unwrap();
        let remote: Uri = "http://203.0.113.7:8200/desc.xml".parse().unwrap();
        let named: Uri = "http://nas.local:8200/desc.xml".parse().unwrap();

        assert!(on_bound_network(&local, &interfaces, 24));
        assert!(!on_bound_network(&remote, &interfaces, 24));
        assert!(on_bound_network(&remote, &interfaces, 0));
        assert!(on_bound_network(&named, &interfaces, 24));
        assert!(!on_bound_network(&local, &NetworkInterfaceSet::default(), 24));
    }

    #[tokio::test]
    async fn test_initialize_binds_interfaces() {
        let mut transport = SsdpTransport::new(&Config::default());
        let interfaces = crate::net::testing::interfaces(true);
        transport.initialize(&interfaces).await.unwrap();
        assert!(transport.is_initialized());
        assert_eq!(transport.state.lock().unwrap().interfaces, interfaces);

        transport.terminate().await.unwrap();
        assert!(transport.state.lock().unwrap().interfaces.is_empty());
        assert!(matches!(
            transport
                .initialize(&NetworkInterfaceSet::default())
                .await,
            Err(Error::NoAvailableNetwork { .. })
        ));
    }

    #[tokio::test]
    async fn test_search_requires_running_transport() {
        let mut transport = SsdpTransport::new(&Config::default());
        assert!(!transport.is_initialized());
        assert!(matches!(
            transport.search().await,
            Err(Error::TransportFailed { .. })
        ));
    }
}
