//! dlna-explorer
//!
//! A UPnP/DLNA control point: it discovers media servers on the local
//! network, browses their content and plays it on a render, walking a
//! playlist under a repeat mode.

pub mod cli;
pub mod config;
pub mod content;
pub mod control;
pub mod devices;
pub mod dlna;
pub mod error;
pub mod net;
pub mod notify;
pub mod playback;
pub mod settings;
pub mod utils;

pub use config::Config;
pub use content::{ContentCategory, ContentItem};
pub use control::{ControlPoint, DiscoveryController, DeviceRegistry, SelectionSession, SsdpTransport};
pub use devices::{MediaServer, MediaServerHandle, Render, RenderSpec};
pub use dlna::RendererPlayerFactory;
pub use error::{Error, Result};
pub use net::{LanMonitor, NetworkMonitor};
pub use notify::{LogNotifier, Notifier};
pub use playback::{PlaybackSequencer, PlaybackState, SequencerHandle};
pub use settings::{RepeatMode, Settings};
