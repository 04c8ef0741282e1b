//! Session integration: the event queue and the keepalive controller.

mod controller;
mod event;

pub use controller::{ControllerConfig, InitialNetwork, KeepaliveController};
pub use event::{EventReceiver, EventSender, SessionEvent, event_channel};
