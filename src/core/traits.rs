//! Core traits of the keepalive subsystem.
//!
//! [`Keepalive`] is the capability set shared by the hardware and software
//! implementations. [`KeepaliveTimer`] and [`OffloadKeepalive`] are the seams
//! to the platform's alarm service and keepalive offload API.

use super::config::AlarmConfig;
use super::types::{AlarmId, NetworkId, StartFlags};

/// A NAT-T keepalive implementation.
///
/// Exactly one implementation is active per session at any time.
pub trait Keepalive {
    /// Begin sending keepalives.
    fn start(&mut self);

    /// Stop sending keepalives.
    ///
    /// MUST be safe to call more than once.
    fn stop(&mut self);

    /// Handle a keepalive alarm tick.
    fn on_alarm_fired(&mut self);
}

/// Exact-delay, wake-capable alarm.
///
/// Each `schedule` fires at most once; scheduling again replaces any
/// pending alarm. Ticks are tagged with [`id`](Self::id).
pub trait KeepaliveTimer: Send {
    /// Id carried by every tick of this alarm.
    fn id(&self) -> AlarmId;

    /// Schedule the alarm described by `config`, even while the device idles.
    fn schedule(&mut self, config: &AlarmConfig);

    /// Cancel the pending alarm, if any.
    fn cancel(&mut self);
}

/// Handle to a platform keepalive offload slot.
///
/// Errors and stop confirmations are reported asynchronously through the
/// [`HardwareCallback`](crate::keepalive::HardwareCallback) the handle was
/// created with.
pub trait OffloadKeepalive: Send {
    /// Start offloaded keepalive every `delay_secs` seconds.
    ///
    /// `underpinned` is only a hint for [`StartFlags::AUTOMATIC_ON_OFF`].
    fn start(&mut self, delay_secs: u32, flags: StartFlags, underpinned: Option<NetworkId>);

    /// Request the offload to stop. Confirmation arrives later.
    fn stop(&mut self);
}
