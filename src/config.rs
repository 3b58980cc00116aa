//! Configuration module for dlna-explorer
//!
//! This module provides configuration constants, default values, and configuration types
//! for the control point and the playback sequencer.

mod constants;
mod types;

// Re-export all constants and types
pub use constants::*;
pub use types::*;
