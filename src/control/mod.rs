//! Device discovery and session control point
//!
//! - [`DiscoveryController`] runs the search loop and follows network changes
//! - [`DeviceRegistry`] keeps the ordered list of media servers
//! - [`SelectionSession`] keeps at most one server subscribed
//! - [`ControlPoint`] wires the three together

pub mod control_point;
pub mod controller;
pub mod registry;
pub mod selection;
pub mod transport;

pub use control_point::ControlPoint;
pub use controller::{DiscoveryController, RestartHook};
pub use registry::{DeviceRegistry, RegistryEvent, RegistryHandle, RegistryInput};
pub use selection::SelectionSession;
pub use transport::{DiscoveryTransport, SsdpTransport, TransportEvent, TransportListener};
