//! Network interface availability
//!
//! Discovery is bound to the non-loopback IPv4 interfaces of the host. The
//! [`LanMonitor`] re-reads them periodically and bumps a generation counter
//! whenever the set changes, which is what connectivity watchers observe.

use crate::error::{Error, Result};
use log::{debug, warn};
use std::{
    collections::BTreeSet,
    fmt,
    net::{IpAddr, Ipv4Addr},
    sync::{Arc, Mutex},
    time::Duration,
};
use tokio::{sync::watch, task::JoinHandle};

/// A usable network interface
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NetworkInterface {
    /// Interface name, e.g. `eth0`
    pub name: String,
    /// IPv4 address bound to the interface
    pub address: Ipv4Addr,
}

/// The interfaces discovery may currently bind to
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NetworkInterfaceSet {
    interfaces: BTreeSet<NetworkInterface>,
}

impl NetworkInterfaceSet {
    /// Builds a set from any interfaces, keeping only non-loopback IPv4 ones
    pub fn from_addresses<I>(addresses: I) -> Self
    where
        I: IntoIterator<Item = (String, IpAddr)>,
    {
        let interfaces = addresses
            .into_iter()
            .filter_map(|(name, ip)| match ip {
                IpAddr::V4(address) if !address.is_loopback() && !address.is_unspecified() => {
                    Some(NetworkInterface { name, address })
                }
                _ => None,
            })
            .collect();
        Self { interfaces }
    }

    /// Whether discovery is possible at all
    pub fn is_available(&self) -> bool {
        !self.interfaces.is_empty()
    }

    /// Number of interfaces in the set
    pub fn len(&self) -> usize {
        self.interfaces.len()
    }

    /// Whether the set is empty
    pub fn is_empty(&self) -> bool {
        self.interfaces.is_empty()
    }

    /// Iterates over the interfaces
    pub fn iter(&self) -> impl Iterator<Item = &NetworkInterface> {
        self.interfaces.iter()
    }

    /// Whether `address` is on the `/prefix` network of one of the interfaces
    pub fn reaches(&self, address: Ipv4Addr, prefix: u8) -> bool {
        let mask = u32::MAX
            .checked_shl(32 - u32::from(prefix.min(32)))
            .unwrap_or(0);
        let network = u32::from(address) & mask;
        self.interfaces
            .iter()
            .any(|iface| u32::from(iface.address) & mask == network)
    }
}

impl fmt::Display for NetworkInterfaceSet {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let names: Vec<String> = self
            .interfaces
            .iter()
            .map(|iface| format!("{}({})", iface.name, iface.address))
            .collect();
        write!(f, "[{}]", names.join(", "))
    }
}

/// Source of interface availability and connectivity changes
pub trait NetworkMonitor: Send + Sync {
    /// The interfaces usable right now
    fn available_interfaces(&self) -> NetworkInterfaceSet;

    /// A receiver whose value changes on every connectivity change
    fn watch(&self) -> watch::Receiver<u64>;
}

/// Monitor reading the host's interfaces with `local-ip-address`
pub struct LanMonitor {
    current: Arc<Mutex<NetworkInterfaceSet>>,
    changes: watch::Sender<u64>,
    poller: Mutex<Option<JoinHandle<()>>>,
}

impl fmt::Debug for LanMonitor {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("LanMonitor")
            .field("current", &self.current)
            .finish_non_exhaustive()
    }
}

impl LanMonitor {
    /// Reads the current interfaces and starts polling them
    pub fn start(poll_interval: Duration) -> Result<Arc<Self>> {
        let initial = read_interfaces()?;
        debug!("Initial network interfaces: {initial}");
        let (changes, _) = watch::channel(0);
        let monitor = Arc::new(Self {
            current: Arc::new(Mutex::new(initial)),
            changes,
            poller: Mutex::new(None),
        });

        let weak = Arc::downgrade(&monitor);
        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(poll_interval);
            ticker.tick().await;
            loop {
                ticker.tick().await;
                let Some(monitor) = weak.upgrade() else {
                    break;
                };
                match read_interfaces() {
                    Ok(interfaces) => monitor.update(interfaces),
                    Err(e) => warn!("Failed to read network interfaces: {e}"),
                }
            }
        });
        if let Ok(mut poller) = monitor.poller.lock() {
            *poller = Some(handle);
        }
        Ok(monitor)
    }

    fn update(&self, interfaces: NetworkInterfaceSet) {
        let Ok(mut current) = self.current.lock() else {
            return;
        };
        if *current != interfaces {
            debug!("Network interfaces changed: {current} -> {interfaces}");
            *current = interfaces;
            self.changes.send_modify(|generation| *generation += 1);
        }
    }
}

impl NetworkMonitor for LanMonitor {
    fn available_interfaces(&self) -> NetworkInterfaceSet {
        self.current
            .lock()
            .map(|current| current.clone())
            .unwrap_or_default()
    }

    fn watch(&self) -> watch::Receiver<u64> {
        self.changes.subscribe()
    }
}

impl Drop for LanMonitor {
    fn drop(&mut self) {
        if let Some(handle) = self.poller.get_mut().ok().and_then(Option::take) {
            handle.abort();
        }
    }
}

fn read_interfaces() -> Result<NetworkInterfaceSet> {
    let interfaces = local_ip_address::list_afinet_netifas().map_err(|err| {
        Error::LocalAddressResolutionFailed {
            source: err,
            context: "Failed to list network interfaces".to_string(),
        }
    })?;
    Ok(NetworkInterfaceSet::from_addresses(interfaces))
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;

    /// Monitor whose interfaces are set by the test
    #[derive(Debug)]
    pub struct FakeMonitor {
        current: Mutex<NetworkInterfaceSet>,
        changes: watch::Sender<u64>,
    }

    impl FakeMonitor {
        pub fn new(available: bool) -> Arc<Self> {
            let (changes, _) = watch::channel(0);
            Arc::new(Self {
                current: Mutex::new(interfaces(available)),
                changes,
            })
        }

        pub fn set_available(&self, available: bool) {
            *self.current.lock().unwrap() = interfaces(available);
            self.changes.send_modify(|generation| *generation += 1);
        }
    }

    pub fn interfaces(available: bool) -> NetworkInterfaceSet {
        if available {
            NetworkInterfaceSet::from_addresses([(
                "eth0".to_string(),
                IpAddr::V4(Ipv4Addr::new(192, 168, 1, 20)),
            )])
        } else {
            NetworkInterfaceSet::default()
        }
    }

    impl NetworkMonitor for FakeMonitor {
        fn available_interfaces(&self) -> NetworkInterfaceSet {
            self.current.lock().unwrap().clone()
        }

        fn watch(&self) -> watch::Receiver<u64> {
            self.changes.subscribe()
        }
    }
}
