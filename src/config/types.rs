//! Configuration types for dlna-explorer
//!
//! This module contains configuration structures and related types
//! used throughout the application.

use log::LevelFilter;
use std::time::Duration;

use super::constants::*;

/// Configuration for the application
#[derive(Debug, Clone)]
pub struct Config {
    /// Interval between two searches of the discovery loop
    pub search_interval: Duration,
    /// Timeout for CLI device discovery, in seconds
    pub discovery_timeout: u64,
    /// Number of SSDP search attempts
    pub ssdp_search_attempts: usize,
    /// TTL for SSDP discovery packets
    pub ssdp_ttl: Option<u32>,
    /// Number of searches a device may miss before being reported lost
    pub device_expiry_searches: u32,
    /// Devices whose IPv4 location shares no network of this prefix length
    /// with a bound interface are ignored
    pub bound_subnet_prefix: u8,
    /// Interval at which network interfaces are re-read
    pub network_poll_interval: Duration,
    /// Delay between a playback error and the forced completion
    pub error_grace_delay: Duration,
    /// Audio sessions completing faster than this are treated as broken
    pub too_short_play_time: Duration,
    /// Interval at which a renderer is polled for its transport state
    pub position_poll_interval: Duration,
    /// Whether a prepared item starts playing right away
    pub autoplay: bool,
    /// Log level
    pub log_level: LevelFilter,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            search_interval: Duration::from_millis(DEFAULT_SEARCH_INTERVAL_MS),
            discovery_timeout: DEFAULT_DISCOVERY_TIMEOUT,
            ssdp_search_attempts: SSDP_SEARCH_ATTEMPTS,
            ssdp_ttl: SSDP_TTL,
            device_expiry_searches: DEFAULT_DEVICE_EXPIRY_SEARCHES,
            bound_subnet_prefix: DEFAULT_BOUND_SUBNET_PREFIX,
            network_poll_interval: Duration::from_millis(DEFAULT_NETWORK_POLL_INTERVAL_MS),
            error_grace_delay: Duration::from_millis(DEFAULT_ERROR_GRACE_DELAY_MS),
            too_short_play_time: Duration::from_millis(DEFAULT_TOO_SHORT_PLAY_TIME_MS),
            position_poll_interval: Duration::from_millis(DEFAULT_POSITION_POLL_INTERVAL_MS),
            autoplay: true,
            log_level: LevelFilter::Info,
        }
    }
}

impl Config {
    /// Creates a new configuration with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the interval of the discovery search loop
    pub fn with_search_interval(mut self, interval: Duration) -> Self {
        self.search_interval = interval;
        self
    }

    /// Sets the discovery timeout
    pub fn with_discovery_timeout(mut self, timeout: u64) -> Self {
        self.discovery_timeout = timeout;
        self
    }

    /// Sets the prefix length used to match devices against bound interfaces
    pub fn with_bound_subnet_prefix(mut self, prefix: u8) -> Self {
        self.bound_subnet_prefix = prefix;
        self
    }

    /// Sets the delay between a playback error and the forced completion
    pub fn with_error_grace_delay(mut self, delay: Duration) -> Self {
        self.error_grace_delay = delay;
        self
    }

    /// Sets the renderer polling interval
    pub fn with_position_poll_interval(mut self, interval: Duration) -> Self {
        self.position_poll_interval = interval;
        self
    }

    /// Sets whether prepared items start playing right away
    pub fn with_autoplay(mut self, autoplay: bool) -> Self {
        self.autoplay = autoplay;
        self
    }

    /// Sets the log level
    pub fn with_log_level(mut self, level: LevelFilter) -> Self {
        self.log_level = level;
        self
    }
}
