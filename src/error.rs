use crate::devices::RenderSpec;
use std::fmt;

/// Errors that can happen inside dlna-explorer
#[derive(Debug)]
pub enum Error {
    // Network and discovery errors
    /// No usable network interface is available
    NoAvailableNetwork {
        /// Additional context about the operation that needed the network
        context: String,
    },
    /// The discovery transport rejected a lifecycle or search operation
    TransportFailed {
        /// The transport operation that failed
        operation: String,
        /// The reason reported by the transport
        reason: String,
    },
    /// Failed to discover DLNA devices on the network
    DeviceDiscoveryFailed {
        /// The underlying UPnP error
        source: rupnp::Error,
        /// Additional context about the discovery attempt
        context: String,
    },
    /// Failed to enumerate the local network interfaces
    LocalAddressResolutionFailed {
        /// The underlying error from local IP detection
        source: local_ip_address::Error,
        /// Additional context about the resolution attempt
        context: String,
    },

    // Device management errors
    /// Failed to parse a device URL
    DeviceUrlParseError {
        /// The invalid URL that failed to parse
        url: String,
        /// Additional context about why parsing failed
        reason: String,
    },
    /// Failed to create a device from URL
    DeviceCreationError {
        /// The URL that failed to create a device
        url: String,
        /// The underlying UPnP error
        source: rupnp::Error,
    },
    /// The specified render device was not found
    RenderNotFound {
        /// The render specification that was searched for
        spec: RenderSpec,
        /// Additional context about the search
        context: String,
    },
    /// An operation needed a selected media server but none is selected
    NoSelection {
        /// The operation that needed the selection
        operation: String,
    },
    /// No media server matching the query was discovered
    ServerNotFound {
        /// The query used to match the server
        query: String,
        /// Additional context about the search
        context: String,
    },

    // Subscription errors
    /// Subscribing to a media server's events failed
    SubscribeFailed {
        /// Friendly name of the device
        device: String,
        /// The reason of the failure
        reason: String,
    },
    /// Cancelling a media server subscription failed
    UnsubscribeFailed {
        /// Friendly name of the device
        device: String,
        /// The reason of the failure
        reason: String,
    },

    // DLNA protocol errors
    /// Failed to set AV transport URI on the render
    DlnaSetTransportUriFailed {
        /// The underlying UPnP error
        source: rupnp::Error,
        /// The URI that failed to be set
        uri: String,
    },
    /// Failed to control playback on the render
    DlnaPlaybackFailed {
        /// The underlying UPnP error
        source: rupnp::Error,
        /// Additional context about the playback attempt
        context: String,
    },
    /// Failed to execute a DLNA action
    DlnaActionFailed {
        /// The action that failed
        action: String,
        /// The underlying UPnP error
        source: rupnp::Error,
    },
    /// Failed to parse response from DLNA device
    DlnaResponseParseError {
        /// The action that generated the response
        action: String,
        /// The parsing error message
        error: String,
    },

    // Playback errors
    /// The player could not be prepared for the given URI
    PlaybackPrepareFailed {
        /// The URI that failed to load
        uri: String,
        /// The reason of the failure
        reason: String,
    },
    /// A playback session was requested without any playable content
    NoContent {
        /// Additional context about the session
        context: String,
    },
    /// The playback session task is gone
    SessionClosed,

    // Settings errors
    /// Settings never became ready
    SettingsUnavailable {
        /// Additional context about the failure
        context: String,
    },
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::NoAvailableNetwork { context } => {
                write!(f, "No available network: {context}")
            }
            Error::TransportFailed { operation, reason } => {
                write!(f, "Discovery transport failed to {operation}: {reason}")
            }
            Error::DeviceDiscoveryFailed { source, context } => {
                write!(f, "Failed to discover devices: {source} ({context})")
            }
            Error::LocalAddressResolutionFailed { source, context } => {
                write!(f, "Failed to resolve local address: {source} ({context})")
            }
            Error::DeviceUrlParseError { url, reason } => {
                write!(f, "Failed to parse URL '{url}': {reason}")
            }
            Error::DeviceCreationError { url, source } => {
                write!(f, "Failed to create device from '{url}': {source}")
            }
            Error::RenderNotFound { spec, context } => match spec {
                RenderSpec::Location(device_url) => {
                    write!(f, "No render found at '{device_url}': {context}")
                }
                RenderSpec::Query(timeout, device_query) => write!(
                    f,
                    "No render found within {timeout} seconds with query '{device_query}': {context}"
                ),
                RenderSpec::First(timeout) => {
                    write!(f, "No render found within {timeout} seconds: {context}")
                }
            },
            Error::NoSelection { operation } => {
                write!(f, "Cannot {operation}: no media server is selected")
            }
            Error::ServerNotFound { query, context } => {
                write!(f, "No media server matching '{query}': {context}")
            }
            Error::SubscribeFailed { device, reason } => {
                write!(f, "Failed to subscribe to '{device}': {reason}")
            }
            Error::UnsubscribeFailed { device, reason } => {
                write!(f, "Failed to unsubscribe from '{device}': {reason}")
            }
            Error::DlnaSetTransportUriFailed { source, uri } => {
                write!(f, "Failed to set transport URI '{uri}': {source}")
            }
            Error::DlnaPlaybackFailed { source, context } => {
                write!(f, "Failed to control playback: {source} ({context})")
            }
            Error::DlnaActionFailed { action, source } => {
                write!(f, "Failed to execute DLNA action '{action}': {source}")
            }
            Error::DlnaResponseParseError { action, error } => {
                write!(
                    f,
                    "Failed to parse response from action '{action}': {error}"
                )
            }
            Error::PlaybackPrepareFailed { uri, reason } => {
                write!(f, "Failed to prepare '{uri}' for playback: {reason}")
            }
            Error::NoContent { context } => {
                write!(f, "Nothing to play: {context}")
            }
            Error::SessionClosed => write!(f, "Playback session is closed"),
            Error::SettingsUnavailable { context } => {
                write!(f, "Settings are unavailable: {context}")
            }
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::DeviceDiscoveryFailed { source, .. } => Some(source),
            Error::LocalAddressResolutionFailed { source, .. } => Some(source),
            Error::DeviceCreationError { source, .. } => Some(source),
            Error::DlnaSetTransportUriFailed { source, .. } => Some(source),
            Error::DlnaPlaybackFailed { source, .. } => Some(source),
            Error::DlnaActionFailed { source, .. } => Some(source),
            _ => None,
        }
    }
}

impl From<ssdp_client::Error> for Error {
    fn from(err: ssdp_client::Error) -> Self {
        Error::DeviceDiscoveryFailed {
            source: rupnp::Error::SSDPError(err),
            context: "SSDP discovery failed".to_string(),
        }
    }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
