//! Utility functions and helpers for dlna-explorer
//!
//! This module provides various utility functions organized by functionality:
//! - Time parsing and formatting
//! - Network retries
//! - Device description formatting

pub mod formatting;
pub mod network;
pub mod time;

pub use formatting::{format_device_description, format_device_with_service_description};
pub use network::retry_with_backoff;
pub use time::{format_dlna_time, format_time_text, time_str_to_milliseconds};
