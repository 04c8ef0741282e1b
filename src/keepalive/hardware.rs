//! Hardware-offloaded NAT-T keepalive.
//!
//! Keepalive duty is handed to the platform's offload API, which reports
//! errors and stop confirmations on its own executor. [`HardwareCallback`]
//! turns those into [`SessionEvent`]s so they are handled on the session's
//! serialized context.

use tracing::{debug, error, warn};

use super::config::KeepaliveConfig;
use crate::core::constants::{
    ERROR_HARDWARE_ERROR, ERROR_INSUFFICIENT_RESOURCES, ERROR_INVALID_INTERVAL,
    ERROR_INVALID_IP_ADDRESS, ERROR_INVALID_LENGTH, ERROR_INVALID_NETWORK, ERROR_INVALID_PORT,
    ERROR_INVALID_SOCKET, ERROR_SOCKET_NOT_IDLE, ERROR_UNSUPPORTED,
};
use crate::core::{
    HardwareKeepaliveId, Keepalive, NetworkId, OffloadKeepalive, SessionOptions, StartFlags,
};
use crate::session::{EventSender, SessionEvent};

/// Error reported by the offload keepalive API.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OffloadError {
    /// Network not valid for offload.
    InvalidNetwork,
    /// IP address not valid. Reported behind 464XLAT / NAT64.
    InvalidIpAddress,
    /// Port not valid.
    InvalidPort,
    /// Packet length not valid.
    InvalidLength,
    /// Interval not valid.
    InvalidInterval,
    /// Socket not valid.
    InvalidSocket,
    /// Socket has pending data.
    SocketNotIdle,
    /// Offload unsupported on this device.
    Unsupported,
    /// Hardware failure.
    HardwareError,
    /// No free offload slot.
    InsufficientResources,
    /// Unrecognized code.
    Unknown(i32),
}

/// How the orchestrator should react to an [`OffloadError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HardwareFault {
    /// Network or configuration problem; keepalive stops.
    Network,
    /// Offload unusable here; fall back to software keepalive.
    OffloadUnavailable,
}

impl OffloadError {
    /// Decode a platform error code.
    pub fn from_code(code: i32) -> Self {
        match code {
            ERROR_INVALID_NETWORK => OffloadError::InvalidNetwork,
            ERROR_INVALID_IP_ADDRESS => OffloadError::InvalidIpAddress,
            ERROR_INVALID_PORT => OffloadError::InvalidPort,
            ERROR_INVALID_LENGTH => OffloadError::InvalidLength,
            ERROR_INVALID_INTERVAL => OffloadError::InvalidInterval,
            ERROR_INVALID_SOCKET => OffloadError::InvalidSocket,
            ERROR_SOCKET_NOT_IDLE => OffloadError::SocketNotIdle,
            ERROR_UNSUPPORTED => OffloadError::Unsupported,
            ERROR_HARDWARE_ERROR => OffloadError::HardwareError,
            ERROR_INSUFFICIENT_RESOURCES => OffloadError::InsufficientResources,
            other => OffloadError::Unknown(other),
        }
    }

    /// Platform error code.
    pub fn code(self) -> i32 {
        match self {
            OffloadError::InvalidNetwork => ERROR_INVALID_NETWORK,
            OffloadError::InvalidIpAddress => ERROR_INVALID_IP_ADDRESS,
            OffloadError::InvalidPort => ERROR_INVALID_PORT,
            OffloadError::InvalidLength => ERROR_INVALID_LENGTH,
            OffloadError::InvalidInterval => ERROR_INVALID_INTERVAL,
            OffloadError::InvalidSocket => ERROR_INVALID_SOCKET,
            OffloadError::SocketNotIdle => ERROR_SOCKET_NOT_IDLE,
            OffloadError::Unsupported => ERROR_UNSUPPORTED,
            OffloadError::HardwareError => ERROR_HARDWARE_ERROR,
            OffloadError::InsufficientResources => ERROR_INSUFFICIENT_RESOURCES,
            OffloadError::Unknown(code) => code,
        }
    }

    /// Classify the error.
    pub fn fault(self) -> HardwareFault {
        match self {
            // Offload rejects the translated addresses of an IPv4-in-IPv6
            // network, but software keepalive works there.
            OffloadError::InvalidIpAddress
            | OffloadError::Unsupported
            | OffloadError::HardwareError
            | OffloadError::InsufficientResources => HardwareFault::OffloadUnavailable,
            OffloadError::InvalidNetwork
            | OffloadError::InvalidPort
            | OffloadError::InvalidLength
            | OffloadError::InvalidInterval
            | OffloadError::InvalidSocket
            | OffloadError::SocketNotIdle
            | OffloadError::Unknown(_) => HardwareFault::Network,
        }
    }
}

/// Callback sink handed to the offload API.
///
/// May be invoked from any thread. Every call is forwarded to the session
/// queue tagged with the owning instance.
#[derive(Debug, Clone)]
pub struct HardwareCallback {
    id: HardwareKeepaliveId,
    events: EventSender,
}

impl HardwareCallback {
    /// Create a callback for instance `id`.
    pub fn new(id: HardwareKeepaliveId, events: EventSender) -> Self {
        Self { id, events }
    }

    /// Offload stopped.
    pub fn on_stopped(&self) {
        self.post(SessionEvent::HardwareStopped { id: self.id });
    }

    /// Offload failed with a platform error code.
    pub fn on_error(&self, code: i32) {
        let error = OffloadError::from_code(code);
        warn!(id = %self.id, code, ?error, "hardware keepalive error");
        self.post(SessionEvent::HardwareError { id: self.id, error });
    }

    fn post(&self, event: SessionEvent) {
        if self.events.send(event).is_err() {
            debug!(id = %self.id, "session queue closed; dropping hardware keepalive callback");
        }
    }
}

/// Keepalive performed by the offload API.
pub struct HardwareKeepalive {
    id: HardwareKeepaliveId,
    delay_secs: u32,
    flags: StartFlags,
    underpinned_network: Option<NetworkId>,
    offload: Box<dyn OffloadKeepalive>,
}

impl HardwareKeepalive {
    /// Create a hardware keepalive for `config` backed by `offload`.
    pub fn new(
        id: HardwareKeepaliveId,
        config: &KeepaliveConfig,
        offload: Box<dyn OffloadKeepalive>,
    ) -> Self {
        let flags = start_flags(config.params().options);
        Self {
            id,
            delay_secs: config.alarm().delay_secs(),
            flags,
            underpinned_network: config.underpinned_network(),
            offload,
        }
    }

    /// Instance identity.
    pub fn id(&self) -> HardwareKeepaliveId {
        self.id
    }

    /// Start options passed to the offload API.
    pub fn flags(&self) -> StartFlags {
        self.flags
    }
}

/// Offload start flags for a session's options.
pub fn start_flags(options: SessionOptions) -> StartFlags {
    if options.contains(SessionOptions::AUTOMATIC_NATT_KEEPALIVES) {
        StartFlags::AUTOMATIC_ON_OFF
    } else {
        StartFlags::NONE
    }
}

impl Keepalive for HardwareKeepalive {
    fn start(&mut self) {
        let underpinned = if self.flags.is_automatic_on_off() {
            self.underpinned_network
        } else {
            None
        };
        debug!(
            id = %self.id,
            delay_secs = self.delay_secs,
            flags = self.flags.bits(),
            ?underpinned,
            "starting hardware keepalive"
        );
        self.offload.start(self.delay_secs, self.flags, underpinned);
    }

    fn stop(&mut self) {
        debug!(id = %self.id, "stopping hardware keepalive");
        self.offload.stop();
    }

    fn on_alarm_fired(&mut self) {
        error!(id = %self.id, "alarm fired for hardware keepalive");
    }
}

impl std::fmt::Debug for HardwareKeepalive {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HardwareKeepalive")
            .field("id", &self.id)
            .field("delay_secs", &self.delay_secs)
            .field("flags", &self.flags)
            .field("underpinned_network", &self.underpinned_network)
            .finish_non_exhaustive()
    }
}

/// Offload API for hosts without keepalive offload.
///
/// Every start is answered with [`OffloadError::Unsupported`], which moves
/// the orchestrator to software keepalive. Stops are confirmed immediately.
#[derive(Debug)]
pub struct UnsupportedOffload {
    callback: HardwareCallback,
}

impl UnsupportedOffload {
    /// Create an offload handle reporting to `callback`.
    pub fn new(callback: HardwareCallback) -> Self {
        Self { callback }
    }
}

impl OffloadKeepalive for UnsupportedOffload {
    fn start(&mut self, _delay_secs: u32, _flags: StartFlags, _underpinned: Option<NetworkId>) {
        self.callback.on_error(ERROR_UNSUPPORTED);
    }

    fn stop(&mut self) {
        self.callback.on_stopped();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::event_channel;

    #[test]
    fn test_error_classification() {
        let network = [
            ERROR_INVALID_NETWORK,
            ERROR_INVALID_PORT,
            ERROR_INVALID_LENGTH,
            ERROR_INVALID_INTERVAL,
            ERROR_INVALID_SOCKET,
            ERROR_SOCKET_NOT_IDLE,
            -99,
        ];
        for code in network {
            assert_eq!(
                OffloadError::from_code(code).fault(),
                HardwareFault::Network,
                "code {code}"
            );
        }

        let offload = [
            ERROR_INVALID_IP_ADDRESS,
            ERROR_UNSUPPORTED,
            ERROR_HARDWARE_ERROR,
            ERROR_INSUFFICIENT_RESOURCES,
        ];
        for code in offload {
            assert_eq!(
                OffloadError::from_code(code).fault(),
                HardwareFault::OffloadUnavailable,
                "code {code}"
            );
        }
    }

    #[test]
    fn test_error_code_preserved() {
        assert_eq!(OffloadError::from_code(-99), OffloadError::Unknown(-99));
        assert_eq!(OffloadError::from_code(-99).code(), -99);
        assert_eq!(OffloadError::SocketNotIdle.code(), ERROR_SOCKET_NOT_IDLE);
    }

    #[test]
    fn test_start_flags() {
        assert_eq!(start_flags(SessionOptions::NONE), StartFlags::NONE);
        assert!(start_flags(SessionOptions::AUTOMATIC_NATT_KEEPALIVES).is_automatic_on_off());
    }

    #[test]
    fn test_callback_marshals_events() {
        let (tx, mut rx) = event_channel();
        let id = HardwareKeepaliveId(4);
        let callback = HardwareCallback::new(id, tx);

        let remote = callback.clone();
        std::thread::spawn(move || {
            remote.on_error(ERROR_HARDWARE_ERROR);
            remote.on_stopped();
        })
        .join()
        .unwrap();

        assert_eq!(
            rx.try_recv().unwrap(),
            SessionEvent::HardwareError {
                id,
                error: OffloadError::HardwareError
            }
        );
        assert_eq!(rx.try_recv().unwrap(), SessionEvent::HardwareStopped { id });
    }

    #[test]
    fn test_callback_survives_closed_queue() {
        let (tx, rx) = event_channel();
        drop(rx);
        HardwareCallback::new(HardwareKeepaliveId(1), tx).on_stopped();
    }

    #[test]
    fn test_unsupported_offload_reports_error() {
        let (tx, mut rx) = event_channel();
        let id = HardwareKeepaliveId(2);
        let mut offload = UnsupportedOffload::new(HardwareCallback::new(id, tx));

        offload.start(20, StartFlags::NONE, None);
        offload.stop();

        assert_eq!(
            rx.try_recv().unwrap(),
            SessionEvent::HardwareError {
                id,
                error: OffloadError::Unsupported
            }
        );
        assert_eq!(rx.try_recv().unwrap(), SessionEvent::HardwareStopped { id });
    }
}
