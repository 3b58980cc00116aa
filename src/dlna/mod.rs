//! DLNA render control for dlna-explorer
//!
//! This module provides the AVTransport actions, the DIDL-Lite metadata handed
//! to renders and a [`crate::playback::Player`] that plays on a render.

pub mod actions;
pub mod metadata;
pub mod renderer_player;

pub use actions::{pause, resume, seek, set_av_transport_uri, stop};
pub use renderer_player::{RendererPlayer, RendererPlayerFactory};
