//! Events marshalled onto the session's serialized context.
//!
//! Alarm ticks, hardware offload callbacks and connectivity callbacks all
//! arrive on foreign tasks. They only ever enqueue a [`SessionEvent`]; the
//! session drains the queue and mutates keepalive and network state from a
//! single consumer.

use tokio::sync::mpsc;

use crate::core::{AlarmId, HardwareKeepaliveId};
use crate::keepalive::OffloadError;
use crate::network::NetworkEvent;

/// Event delivered to the session loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    /// The keepalive alarm of a session fired.
    KeepaliveAlarm {
        /// Session the alarm belongs to.
        session_id: u32,
        /// Timer that raised it.
        alarm: AlarmId,
    },

    /// A hardware keepalive confirmed it stopped.
    HardwareStopped {
        /// Instance that stopped.
        id: HardwareKeepaliveId,
    },

    /// A hardware keepalive reported an error.
    HardwareError {
        /// Instance that failed.
        id: HardwareKeepaliveId,
        /// Reported error.
        error: OffloadError,
    },

    /// Connectivity callback.
    Network(NetworkEvent),
}

impl From<NetworkEvent> for SessionEvent {
    fn from(event: NetworkEvent) -> Self {
        SessionEvent::Network(event)
    }
}

/// Producer side of the session queue.
pub type EventSender = mpsc::UnboundedSender<SessionEvent>;

/// Consumer side of the session queue.
pub type EventReceiver = mpsc::UnboundedReceiver<SessionEvent>;

/// Create a session event queue.
pub fn event_channel() -> (EventSender, EventReceiver) {
    mpsc::unbounded_channel()
}
