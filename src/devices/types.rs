//! Device-related types for dlna-explorer
//!
//! This module contains type definitions for DLNA devices,
//! including media server handles, render specifications and
//! the transport information reported by renders.

use crate::{content::ContentItem, error::Result, utils::format_device_description};
use async_trait::async_trait;
use std::{
    fmt,
    hash::{Hash, Hasher},
    sync::Arc,
};

/// Stable identity of a UPnP device (its UDN)
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DeviceId(String);

impl DeviceId {
    /// Wraps a UDN such as `uuid:4d696e69-444c-164e-9d41-b827eb54e8f8`
    pub fn new(udn: impl Into<String>) -> Self {
        Self(udn.into())
    }

    /// The UDN as a string
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Operations a control point performs on a media server
#[async_trait]
pub trait ServerControl: Send + Sync {
    /// Opens an event subscription on the server
    async fn subscribe(&self) -> Result<()>;

    /// Cancels the event subscription opened by [`ServerControl::subscribe`]
    async fn unsubscribe(&self) -> Result<()>;

    /// Lists the direct children of a container, in server order
    async fn browse(&self, object_id: &str) -> Result<Vec<ContentItem>>;

    /// Deletes an object from the server's content
    async fn destroy_object(&self, object_id: &str) -> Result<()>;
}

/// A discovered media server
///
/// Handles compare and hash by device identity only; two handles created
/// from separate announcements of the same device are equal.
#[derive(Clone)]
pub struct MediaServerHandle {
    id: DeviceId,
    device_type: String,
    friendly_name: String,
    location: String,
    control: Arc<dyn ServerControl>,
}

impl MediaServerHandle {
    /// Creates a handle
    pub fn new(
        id: DeviceId,
        device_type: impl Into<String>,
        friendly_name: impl Into<String>,
        location: impl Into<String>,
        control: Arc<dyn ServerControl>,
    ) -> Self {
        Self {
            id,
            device_type: device_type.into(),
            friendly_name: friendly_name.into(),
            location: location.into(),
            control,
        }
    }

    /// Device identity
    pub fn id(&self) -> &DeviceId {
        &self.id
    }

    /// Display name announced by the device
    pub fn friendly_name(&self) -> &str {
        &self.friendly_name
    }

    /// URL of the device description
    pub fn location(&self) -> &str {
        &self.location
    }

    /// Subscribes to the server's events
    pub async fn subscribe(&self) -> Result<()> {
        self.control.subscribe().await
    }

    /// Cancels the server event subscription
    pub async fn unsubscribe(&self) -> Result<()> {
        self.control.unsubscribe().await
    }

    /// Lists the children of a container
    pub async fn browse(&self, object_id: &str) -> Result<Vec<ContentItem>> {
        self.control.browse(object_id).await
    }

    /// Deletes an object from the server
    pub async fn destroy_object(&self, object_id: &str) -> Result<()> {
        self.control.destroy_object(object_id).await
    }
}

impl PartialEq for MediaServerHandle {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for MediaServerHandle {}

impl Hash for MediaServerHandle {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl fmt::Debug for MediaServerHandle {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("MediaServerHandle")
            .field("id", &self.id)
            .field("friendly_name", &self.friendly_name)
            .field("location", &self.location)
            .finish_non_exhaustive()
    }
}

impl fmt::Display for MediaServerHandle {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "{}",
            format_device_description(&self.device_type, &self.friendly_name, &self.location)
        )
    }
}

/// An specification of a DLNA render device.
#[derive(Debug, Clone)]
pub enum RenderSpec {
    /// Render specified by a location URL
    Location(String),
    /// Render specified by a query string
    Query(u64, String),
    /// The first render found
    First(u64),
}

/// Playback position information
///
/// Contains all information returned by the GetPositionInfo operation
#[derive(Debug, Clone)]
pub struct PositionInfo {
    /// Current track number
    pub track: u32,
    /// Total duration of current track (format: HH:MM:SS)
    pub track_duration: String,
    /// Metadata of current track
    pub track_meta_data: String,
    /// URI of current track
    pub track_uri: String,
    /// Relative time position (format: HH:MM:SS)
    pub rel_time: String,
    /// Absolute time position
    pub abs_time: String,
    /// Relative count position
    pub rel_count: i32,
    /// Absolute count position
    pub abs_count: i32,
}

impl Default for PositionInfo {
    fn default() -> Self {
        Self {
            track: 0,
            track_duration: String::new(),
            track_meta_data: String::new(),
            track_uri: String::new(),
            rel_time: String::new(),
            abs_time: String::new(),
            rel_count: -1,
            abs_count: -1,
        }
    }
}

impl PositionInfo {
    /// Parses PositionInfo from HashMap response
    pub fn from_map(map: &std::collections::HashMap<String, String>) -> Result<Self, String> {
        Ok(PositionInfo {
            track: map
                .get("Track")
                .unwrap_or(&"0".to_string())
                .parse()
                .map_err(|e| format!("Failed to parse Track: {e}"))?,
            track_duration: map.get("TrackDuration").unwrap_or(&"".to_string()).clone(),
            track_meta_data: map.get("TrackMetaData").unwrap_or(&"".to_string()).clone(),
            track_uri: map.get("TrackURI").unwrap_or(&"".to_string()).clone(),
            rel_time: map.get("RelTime").unwrap_or(&"".to_string()).clone(),
            abs_time: map.get("AbsTime").unwrap_or(&"".to_string()).clone(),
            rel_count: map
                .get("RelCount")
                .unwrap_or(&"-1".to_string())
                .parse()
                .map_err(|e| format!("Failed to parse RelCount: {e}"))?,
            abs_count: map
                .get("AbsCount")
                .unwrap_or(&"-1".to_string())
                .parse()
                .map_err(|e| format!("Failed to parse AbsCount: {e}"))?,
        })
    }
}

/// Transport information
///
/// Contains information returned by the GetTransportInfo operation
#[derive(Debug, Clone)]
#[derive(Default)]
pub struct TransportInfo {
    /// Transport state (e.g., PLAYING, PAUSED_PLAYBACK, STOPPED)
    pub transport_state: String,
    /// Detailed transport status information
    pub transport_status: String,
    /// Playback speed
    pub speed: String,
}

impl TransportInfo {
    /// Parses TransportInfo from HashMap response
    pub fn from_map(map: &std::collections::HashMap<String, String>) -> Result<Self, String> {
        Ok(TransportInfo {
            transport_state: map
                .get("CurrentTransportState")
                .unwrap_or(&"".to_string())
                .clone(),
            transport_status: map
                .get("CurrentTransportStatus")
                .unwrap_or(&"".to_string())
                .clone(),
            speed: map.get("CurrentSpeed").unwrap_or(&"".to_string()).clone(),
        })
    }
}
