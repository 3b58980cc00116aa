//! Device discovery and management for dlna-explorer
//!
//! This module provides functionality for discovering and interacting with DLNA devices
//! on the network: media servers to browse, renders to play on, and the handle
//! type the control point tracks servers with.

pub mod discovery;
pub mod render;
pub mod server;
pub mod types;

pub use render::Render;
pub use server::MediaServer;
pub use types::{DeviceId, MediaServerHandle, PositionInfo, RenderSpec, ServerControl, TransportInfo};
