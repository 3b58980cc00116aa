//! Discovery lifecycle and the periodic search loop
//!
//! The controller owns the discovery transport behind a single async mutex.
//! Lifecycle commands, restarts and the search loop all go through that
//! lock, so none of them can observe a half-initialized transport.

use crate::{
    config::{Config, NO_AVAILABLE_NETWORK_MSG},
    devices::MediaServerHandle,
    error::Result,
    net::{NetworkInterfaceSet, NetworkMonitor},
    notify::{Notifier, NotifyLevel},
};
use log::{debug, info, warn};
use std::{
    sync::{
        Arc, Mutex as StdMutex,
        atomic::{AtomicBool, Ordering},
    },
    time::Duration,
};
use tokio::{sync::Mutex, task::JoinHandle, time::sleep};
use tokio_util::sync::CancellationToken;

use super::{
    selection::SelectionSession,
    transport::{DiscoveryTransport, TransportListener},
};

/// Hook run by [`DiscoveryController::restart`] while the transport is down
pub type RestartHook = Box<dyn FnOnce() + Send>;

struct SearchLoop {
    token: CancellationToken,
    task: JoinHandle<()>,
}

/// Drives a [`DiscoveryTransport`] through network changes and periodic searches
pub struct DiscoveryController<T: DiscoveryTransport> {
    transport: Arc<Mutex<T>>,
    monitor: Arc<dyn NetworkMonitor>,
    notifier: Arc<dyn Notifier>,
    selection: Arc<SelectionSession>,
    listener: TransportListener,
    search_interval: Duration,
    network_available: AtomicBool,
    search: StdMutex<Option<SearchLoop>>,
    watcher: StdMutex<Option<JoinHandle<()>>>,
}

impl<T: DiscoveryTransport> DiscoveryController<T> {
    /// Creates a controller; nothing runs until [`DiscoveryController::initialize`]
    pub fn new(
        transport: T,
        monitor: Arc<dyn NetworkMonitor>,
        notifier: Arc<dyn Notifier>,
        selection: Arc<SelectionSession>,
        listener: TransportListener,
        config: &Config,
    ) -> Arc<Self> {
        Arc::new(Self {
            transport: Arc::new(Mutex::new(transport)),
            monitor,
            notifier,
            selection,
            listener,
            search_interval: config.search_interval,
            network_available: AtomicBool::new(false),
            search: StdMutex::new(None),
            watcher: StdMutex::new(None),
        })
    }

    /// Starts the transport if a network is usable and watches connectivity
    ///
    /// A transport that fails to come up is retried by the search loop.
    pub async fn initialize(self: &Arc<Self>) -> Result<()> {
        let interfaces = self.monitor.available_interfaces();
        let available = interfaces.is_available();
        self.network_available.store(available, Ordering::SeqCst);
        self.watch_connectivity();

        if available {
            let mut transport = self.transport.lock().await;
            if let Err(e) = bring_up(&mut *transport, &interfaces).await {
                warn!("Failed to start discovery: {e}");
                self.notifier.notify(NotifyLevel::Error, &e.to_string());
            }
        } else {
            info!("{NO_AVAILABLE_NETWORK_MSG}, discovery is idle");
        }
        Ok(())
    }

    fn watch_connectivity(self: &Arc<Self>) {
        let mut changes = self.monitor.watch();
        let controller = Arc::downgrade(self);
        let task = tokio::spawn(async move {
            while changes.changed().await.is_ok() {
                let Some(controller) = controller.upgrade() else {
                    break;
                };
                controller.on_connectivity_changed().await;
            }
        });
        if let Ok(mut watcher) = self.watcher.lock() {
            if let Some(previous) = watcher.replace(task) {
                previous.abort();
            }
        }
    }

    /// Reacts to a change of the interface set
    pub async fn on_connectivity_changed(&self) {
        let interfaces = self.monitor.available_interfaces();
        let available = interfaces.is_available();
        let was_available = self.network_available.swap(available, Ordering::SeqCst);
        if was_available == available {
            debug!("Connectivity changed, availability unchanged ({available})");
            return;
        }

        let mut transport = self.transport.lock().await;
        if available {
            if transport.is_initialized() {
                debug!("Discovery already running on {interfaces}");
                return;
            }
            info!("Network available on {interfaces}, starting discovery");
            if let Err(e) = bring_up(&mut *transport, &interfaces).await {
                warn!("Failed to start discovery: {e}");
                self.notifier.notify(NotifyLevel::Error, &e.to_string());
            }
        } else {
            info!("Network lost, stopping discovery");
            tear_down(&mut *transport).await;
            self.notifier
                .notify(NotifyLevel::Error, NO_AVAILABLE_NETWORK_MSG);
        }
    }

    /// Whether a usable network was seen last
    pub fn is_network_available(&self) -> bool {
        self.network_available.load(Ordering::SeqCst)
    }

    /// Whether the search loop is running
    pub fn is_searching(&self) -> bool {
        self.search
            .lock()
            .map(|search| search.is_some())
            .unwrap_or(false)
    }

    /// (Re)starts the search loop and attaches the discovery listener
    pub async fn start_search(&self) {
        if self.is_searching() {
            self.stop_search().await;
        }
        if !self.is_network_available() {
            self.notifier
                .notify(NotifyLevel::Error, NO_AVAILABLE_NETWORK_MSG);
        }
        self.transport
            .lock()
            .await
            .set_listener(Some(self.listener.clone()));

        let token = CancellationToken::new();
        let task = tokio::spawn(search_loop(
            self.transport.clone(),
            self.monitor.clone(),
            self.notifier.clone(),
            self.search_interval,
            token.clone(),
        ));
        if let Ok(mut search) = self.search.lock() {
            *search = Some(SearchLoop { token, task });
        }
        debug!("Search loop started");
    }

    /// Stops the search loop and detaches the discovery listener
    ///
    /// A search loop must be running.
    pub async fn stop_search(&self) {
        let search = self.search.lock().ok().and_then(|mut search| search.take());
        debug_assert!(search.is_some(), "stop_search called without a running search");
        if let Some(search) = search {
            search.token.cancel();
            drop(search.task);
        }
        self.transport.lock().await.set_listener(None);
        debug!("Search loop stopped");
    }

    /// Restarts the transport, running `hook` while it is down
    ///
    /// Does nothing when no network is usable.
    pub async fn restart(&self, hook: Option<RestartHook>) -> Result<()> {
        let interfaces = self.monitor.available_interfaces();
        if !interfaces.is_available() {
            debug!("Restart skipped, no network");
            return Ok(());
        }

        let mut transport = self.transport.lock().await;
        info!("Restarting discovery");
        transport.stop().await?;
        transport.terminate().await?;
        if let Some(hook) = hook {
            hook();
        }
        bring_up(&mut *transport, &interfaces).await
    }

    /// Devices known to the transport
    pub async fn devices(&self) -> Vec<MediaServerHandle> {
        self.transport.lock().await.devices()
    }

    /// Unselects, stops everything and stops watching connectivity
    pub async fn terminate(&self) {
        self.selection.unselect().await;

        let search = self.search.lock().ok().and_then(|mut search| search.take());
        if let Some(search) = search {
            search.token.cancel();
        }
        {
            let mut transport = self.transport.lock().await;
            transport.set_listener(None);
            tear_down(&mut *transport).await;
        }
        if let Some(watcher) = self.watcher.lock().ok().and_then(|mut watcher| watcher.take()) {
            watcher.abort();
        }
        info!("Discovery terminated");
    }
}

async fn bring_up<T: DiscoveryTransport + ?Sized>(
    transport: &mut T,
    interfaces: &NetworkInterfaceSet,
) -> Result<()> {
    transport.initialize(interfaces).await?;
    transport.start().await
}

async fn tear_down<T: DiscoveryTransport + ?Sized>(transport: &mut T) {
    if let Err(e) = transport.stop().await {
        warn!("Failed to stop discovery transport: {e}");
    }
    if let Err(e) = transport.terminate().await {
        warn!("Failed to terminate discovery transport: {e}");
    }
}

/// Searches every `interval`, bringing the transport back up when a network
/// is usable but an earlier start failed
async fn search_loop<T: DiscoveryTransport>(
    transport: Arc<Mutex<T>>,
    monitor: Arc<dyn NetworkMonitor>,
    notifier: Arc<dyn Notifier>,
    interval: Duration,
    token: CancellationToken,
) {
    while !token.is_cancelled() {
        {
            let mut transport = tokio::select! {
                _ = token.cancelled() => break,
                transport = transport.lock() => transport,
            };
            if !transport.is_initialized() {
                let interfaces = monitor.available_interfaces();
                if interfaces.is_available() {
                    debug!("Retrying discovery start on {interfaces}");
                    if let Err(e) = bring_up(&mut *transport, &interfaces).await {
                        warn!("Failed to start discovery: {e}");
                        notifier.notify(NotifyLevel::Error, &e.to_string());
                    }
                }
            }
            if transport.is_initialized() {
                debug!("Searching for media servers");
                if let Err(e) = transport.search().await {
                    warn!("Search failed: {e}");
                    notifier.notify(NotifyLevel::Error, &e.to_string());
                }
            }
        }
        tokio::select! {
            _ = token.cancelled() => break,
            _ = sleep(interval) => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        control::transport::{
            TransportEvent,
            testing::{FakeState, FakeTransport},
        },
        devices::types::testing::handle,
        net::testing::FakeMonitor,
        notify::testing::RecordingNotifier,
    };
    use tokio::sync::mpsc;

    struct Fixture {
        controller: Arc<DiscoveryController<FakeTransport>>,
        transport: FakeTransport,
        monitor: Arc<FakeMonitor>,
        notifier: Arc<RecordingNotifier>,
        events: mpsc::UnboundedReceiver<TransportEvent>,
    }

    impl Fixture {
        fn new(available: bool) -> Self {
            let transport = FakeTransport::default();
            let monitor = FakeMonitor::new(available);
            let notifier = Arc::new(RecordingNotifier::default());
            let (tx, events) = mpsc::unbounded_channel();
            let listener: TransportListener = Arc::new(move |event| {
                let _ = tx.send(event);
            });
            let controller = DiscoveryController::new(
                transport.clone(),
                monitor.clone(),
                notifier.clone(),
                Arc::new(SelectionSession::new()),
                listener,
                &Config::default().with_search_interval(Duration::from_secs(5)),
            );
            Self {
                controller,
                transport,
                monitor,
                notifier,
                events,
            }
        }

        fn state(&self) -> std::sync::MutexGuard<'_, FakeState> {
            self.transport.state()
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_initialize_with_network_starts_transport() {
        let fixture = Fixture::new(true);
        fixture.controller.initialize().await.unwrap();
        assert_eq!(fixture.state().calls, vec!["initialize", "start"]);
        assert!(fixture.controller.is_network_available());
    }

    #[tokio::test(start_paused = true)]
    async fn test_initialize_without_network_stays_idle() {
        let fixture = Fixture::new(false);
        fixture.controller.initialize().await.unwrap();
        assert!(fixture.state().calls.is_empty());

        fixture.controller.start_search().await;
        assert_eq!(fixture.notifier.texts(), vec![NO_AVAILABLE_NETWORK_MSG]);
        fixture.controller.stop_search().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_search_loop_runs_every_interval() {
        let fixture = Fixture::new(true);
        fixture.controller.initialize().await.unwrap();
        fixture.controller.start_search().await;

        tokio::time::sleep(Duration::from_millis(12_500)).await;
        assert_eq!(fixture.state().count("search"), 3);

        fixture.controller.stop_search().await;
        tokio::time::sleep(Duration::from_secs(20)).await;
        assert_eq!(fixture.state().count("search"), 3);
        assert_eq!(fixture.state().calls.last(), Some(&"detach"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_search_failures_do_not_stop_the_loop() {
        let fixture = Fixture::new(true);
        fixture.controller.initialize().await.unwrap();
        fixture.state().fail_search = true;
        fixture.controller.start_search().await;

        tokio::time::sleep(Duration::from_millis(5_500)).await;
        assert_eq!(fixture.state().count("search"), 2);
        assert_eq!(fixture.notifier.messages().len(), 2);
        assert!(fixture.controller.is_searching());
        fixture.controller.stop_search().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_search_skipped_when_transport_not_initialized() {
        let fixture = Fixture::new(false);
        fixture.controller.initialize().await.unwrap();
        fixture.controller.start_search().await;

        tokio::time::sleep(Duration::from_secs(11)).await;
        assert_eq!(fixture.state().count("search"), 0);
        fixture.controller.stop_search().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_start_search_restarts_running_loop() {
        let fixture = Fixture::new(true);
        fixture.controller.initialize().await.unwrap();
        fixture.controller.start_search().await;
        tokio::time::sleep(Duration::from_millis(100)).await;
        fixture.controller.start_search().await;
        tokio::time::sleep(Duration::from_millis(100)).await;

        let state = fixture.state();
        assert_eq!(state.count("attach"), 2);
        assert_eq!(state.count("detach"), 1);
        assert_eq!(state.count("search"), 2);
        drop(state);
        fixture.controller.stop_search().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_connectivity_transitions() {
        let fixture = Fixture::new(false);
        fixture.controller.initialize().await.unwrap();

        fixture.monitor.set_available(true);
        fixture.controller.on_connectivity_changed().await;
        assert_eq!(fixture.state().calls, vec!["initialize", "start"]);

        // Unchanged availability
        fixture.controller.on_connectivity_changed().await;
        assert_eq!(fixture.state().calls.len(), 2);

        fixture.monitor.set_available(false);
        fixture.controller.on_connectivity_changed().await;
        assert_eq!(
            fixture.state().calls,
            vec!["initialize", "start", "stop", "terminate"]
        );
        assert_eq!(fixture.notifier.texts(), vec![NO_AVAILABLE_NETWORK_MSG]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_start_is_retried_by_search_loop() {
        let fixture = Fixture::new(false);
        fixture.controller.initialize().await.unwrap();
        fixture.controller.start_search().await;

        fixture.state().fail_initialize = true;
        fixture.monitor.set_available(true);
        fixture.controller.on_connectivity_changed().await;
        assert!(!fixture.state().initialized);
        assert_eq!(fixture.notifier.messages().len(), 2);

        fixture.state().fail_initialize = false;
        tokio::time::sleep(Duration::from_secs(6)).await;
        let state = fixture.state();
        assert!(state.initialized);
        assert!(state.running);
        assert!(state.count("search") >= 1);
        drop(state);
        fixture.controller.stop_search().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_initialize_failure_is_not_fatal() {
        let fixture = Fixture::new(true);
        fixture.state().fail_initialize = true;
        fixture.controller.initialize().await.unwrap();
        assert!(!fixture.state().initialized);
        assert_eq!(fixture.notifier.messages().len(), 1);

        fixture.state().fail_initialize = false;
        fixture.controller.start_search().await;
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert!(fixture.state().initialized);
        assert_eq!(fixture.state().count("search"), 1);
        fixture.controller.stop_search().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_connectivity_watcher_reacts_to_monitor() {
        let fixture = Fixture::new(false);
        fixture.controller.initialize().await.unwrap();

        fixture.monitor.set_available(true);
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(fixture.state().calls, vec!["initialize", "start"]);

        fixture.controller.terminate().await;
        fixture.monitor.set_available(false);
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert!(fixture.notifier.texts().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_restart_runs_hook_while_transport_is_down() {
        let fixture = Fixture::new(true);
        fixture.controller.initialize().await.unwrap();

        let state = fixture.transport.state.clone();
        let observed = Arc::new(StdMutex::new(None));
        let seen = observed.clone();
        fixture
            .controller
            .restart(Some(Box::new(move || {
                let state = state.lock().unwrap();
                *seen.lock().unwrap() = Some((state.initialized, state.running));
            })))
            .await
            .unwrap();

        assert_eq!(*observed.lock().unwrap(), Some((false, false)));
        assert_eq!(
            fixture.state().calls,
            vec!["initialize", "start", "stop", "terminate", "initialize", "start"]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_restart_without_network_is_noop() {
        let fixture = Fixture::new(false);
        fixture.controller.initialize().await.unwrap();
        let ran = Arc::new(AtomicBool::new(false));
        let flag = ran.clone();
        fixture
            .controller
            .restart(Some(Box::new(move || flag.store(true, Ordering::SeqCst))))
            .await
            .unwrap();
        assert!(!ran.load(Ordering::SeqCst));
        assert!(fixture.state().calls.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_listener_receives_transport_events() {
        let mut fixture = Fixture::new(true);
        fixture.controller.initialize().await.unwrap();
        fixture.controller.start_search().await;

        fixture.state().announce(handle("nas"));
        match fixture.events.recv().await {
            Some(TransportEvent::Discover { device, devices }) => {
                assert_eq!(device, handle("nas"));
                assert_eq!(devices.len(), 1);
            }
            other => panic!("unexpected event {other:?}"),
        }
        assert_eq!(fixture.controller.devices().await, vec![handle("nas")]);

        fixture.controller.stop_search().await;
        fixture.state().announce(handle("laptop"));
        assert!(fixture.events.try_recv().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_terminate_tears_everything_down() {
        let fixture = Fixture::new(true);
        fixture.controller.initialize().await.unwrap();
        fixture.controller.start_search().await;
        fixture.controller.terminate().await;

        assert!(!fixture.controller.is_searching());
        let state = fixture.state();
        assert!(!state.initialized);
        assert!(state.listener.is_none());
        assert_eq!(&state.calls[state.calls.len() - 2..], ["stop", "terminate"]);
    }
}
