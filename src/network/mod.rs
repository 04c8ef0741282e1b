//! Underlying network observation.

mod monitor;

pub use monitor::{MonitorScope, NetworkEvent, NetworkMonitor, NetworkUpdate};
