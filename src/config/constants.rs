//! Configuration constants for dlna-explorer
//!
//! This module contains all hardcoded constants used throughout the application,
//! organized by functionality and following Rust naming conventions.

// =============================================================================
// Discovery Constants
// =============================================================================

/// Interval between two multicast searches of the discovery loop, in milliseconds
pub const DEFAULT_SEARCH_INTERVAL_MS: u64 = 5_000;

/// Default time in seconds the CLI waits for devices to show up
pub const DEFAULT_DISCOVERY_TIMEOUT: u64 = 5;

/// Time in seconds an SSDP search waits for responses
pub const SSDP_SEARCH_TIMEOUT_SECS: u64 = 3;

/// SSDP search attempts per search request
pub const SSDP_SEARCH_ATTEMPTS: usize = 3;

/// TTL (Time To Live) for SSDP multicast packets
pub const SSDP_TTL: Option<u32> = Some(3);

/// Number of consecutive searches a device may miss before it is reported lost
pub const DEFAULT_DEVICE_EXPIRY_SEARCHES: u32 = 3;

/// Prefix length deciding whether an answering device shares a network with
/// a bound interface; 0 accepts every device
pub const DEFAULT_BOUND_SUBNET_PREFIX: u8 = 16;

/// Interval at which the LAN monitor re-reads the interface list, in milliseconds
pub const DEFAULT_NETWORK_POLL_INTERVAL_MS: u64 = 2_000;

/// Maximum number of retries for network operations
pub const MAX_NETWORK_RETRIES: u32 = 3;

/// GENA subscription timeout requested from media servers, in seconds
pub const SUBSCRIPTION_TIMEOUT_SECS: u32 = 300;

// =============================================================================
// Playback Constants
// =============================================================================

/// Delay between a playback error and the forced completion, in milliseconds
pub const DEFAULT_ERROR_GRACE_DELAY_MS: u64 = 1_000;

/// Audio sessions completing faster than this are treated as broken, in milliseconds
pub const DEFAULT_TOO_SHORT_PLAY_TIME_MS: u64 = 2_000;

/// Interval at which a renderer is polled for its transport state, in milliseconds
pub const DEFAULT_POSITION_POLL_INTERVAL_MS: u64 = 1_000;

/// Capacity of the broadcast channels fanning out status events
pub const EVENT_CHANNEL_CAPACITY: usize = 64;

// =============================================================================
// DLNA Protocol Constants
// =============================================================================

/// DLNA payload template for position info action
pub const DLNA_POSITION_INFO_PAYLOAD: &str = r#"<InstanceID>0</InstanceID>"#;

/// DLNA payload template for transport info action
pub const DLNA_TRANSPORT_INFO_PAYLOAD: &str = r#"<InstanceID>0</InstanceID>"#;

/// DLNA instance ID used in payloads
pub const DLNA_INSTANCE_ID: u32 = 0;

/// DLNA default playback speed
pub const DLNA_DEFAULT_SPEED: u32 = 1;

/// Object id of the root container of a ContentDirectory
pub const ROOT_OBJECT_ID: &str = "0";

/// Maximum number of entries requested by a single Browse call
pub const BROWSE_PAGE_SIZE: u32 = 200;

// =============================================================================
// Logging Constants
// =============================================================================

/// Environment variable name for custom log level
pub const LOG_LEVEL_ENV_VAR: &str = "DLNA_EXPLORER_LOG";

// =============================================================================
// Error and Status Messages
// =============================================================================

/// Error message when no devices are discovered
pub const NO_DEVICES_DISCOVERED_MSG: &str = "No devices discovered in the network";

/// Error message for render device not found
pub const RENDER_NOT_FOUND_MSG: &str = "No render specified, selecting first one";

/// Message shown when no interface is usable for discovery
pub const NO_AVAILABLE_NETWORK_MSG: &str = "No available network";

/// Message shown when a content object was deleted
pub const DELETE_SUCCEEDED_MSG: &str = "Deleted";

/// Message shown when deleting a content object failed
pub const DELETE_FAILED_MSG: &str = "Failed to delete";

/// Message shown when the player reports an error
pub const PLAYER_ERROR_MSG: &str = "An error occurred during playback";

// =============================================================================
// DLNA Action Names
// =============================================================================

/// DLNA action name for setting AV transport URI
pub const DLNA_ACTION_SET_AV_TRANSPORT_URI: &str = "SetAVTransportURI";

/// DLNA action name for play
pub const DLNA_ACTION_PLAY: &str = "Play";

/// DLNA action name for pause
pub const DLNA_ACTION_PAUSE: &str = "Pause";

/// DLNA action name for stop
pub const DLNA_ACTION_STOP: &str = "Stop";

/// DLNA action name for seek
pub const DLNA_ACTION_SEEK: &str = "Seek";

/// DLNA action name for getting position info
pub const DLNA_ACTION_GET_POSITION_INFO: &str = "GetPositionInfo";

/// DLNA action name for getting transport info
pub const DLNA_ACTION_GET_TRANSPORT_INFO: &str = "GetTransportInfo";

/// ContentDirectory action name for browsing
pub const DLNA_ACTION_BROWSE: &str = "Browse";

/// ContentDirectory action name for deleting an object
pub const DLNA_ACTION_DESTROY_OBJECT: &str = "DestroyObject";

// =============================================================================
// Logging Messages
// =============================================================================

/// Log message for list devices command
pub const LOG_MSG_LIST_DEVICES: &str = "List media servers";

/// Log message for setting the transport URI
pub const LOG_MSG_SETTING_URI: &str = "Setting transport URI";

// =============================================================================
// DLNA Metadata Constants
// =============================================================================

/// Default DLNA item title
pub const DEFAULT_DLNA_TITLE: &str = "dlna-explorer item";
