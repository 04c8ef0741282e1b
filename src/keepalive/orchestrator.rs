//! NAT-T keepalive orchestration.
//!
//! Owns the single active keepalive implementation of a session and swaps
//! between hardware offload and software keepalive:
//!
//! - offload unusable: swap to software in place
//! - network/config error: stop keepalive altogether; the session notices the
//!   resulting liveness loss through its own retransmission timeout
//! - restart with a new config: a running hardware keepalive is stopped and
//!   kept as *pending stop* while software keepalive covers the gap; once the
//!   platform confirms the stop a new hardware keepalive starts
//!
//! Each network has a small, shared pool of offload slots. Starting a second
//! hardware keepalive before the first released its slot can fail, hence
//! never more than one hardware instance is started or draining at a time.
//!
//! There is no timeout on the pending stop. If the confirmation never
//! arrives, the session stays on software keepalive.
//!
//! All methods MUST be called from the session's serialized context.

use std::sync::Arc;

use tracing::{debug, info};

use super::config::KeepaliveConfig;
use super::deps::KeepaliveDeps;
use super::hardware::{HardwareFault, HardwareKeepalive, OffloadError};
use super::software::SoftwareKeepalive;
use crate::core::{AlarmId, HardwareKeepaliveId, Keepalive};
use crate::session::SessionEvent;

/// The active keepalive implementation.
#[derive(Debug)]
pub enum KeepaliveImpl {
    /// Offloaded to hardware.
    Hardware(HardwareKeepalive),
    /// Sent by this process.
    Software(SoftwareKeepalive),
}

impl KeepaliveImpl {
    /// Check if this is a hardware keepalive.
    pub fn is_hardware(&self) -> bool {
        matches!(self, KeepaliveImpl::Hardware(_))
    }

    /// Hardware instance id, if this is a hardware keepalive.
    pub fn hardware_id(&self) -> Option<HardwareKeepaliveId> {
        match self {
            KeepaliveImpl::Hardware(hw) => Some(hw.id()),
            KeepaliveImpl::Software(_) => None,
        }
    }

    /// Alarm id, if this is a software keepalive.
    pub fn alarm_id(&self) -> Option<AlarmId> {
        match self {
            KeepaliveImpl::Hardware(_) => None,
            KeepaliveImpl::Software(sw) => Some(sw.alarm_id()),
        }
    }
}

impl Keepalive for KeepaliveImpl {
    fn start(&mut self) {
        match self {
            KeepaliveImpl::Hardware(hw) => hw.start(),
            KeepaliveImpl::Software(sw) => sw.start(),
        }
    }

    fn stop(&mut self) {
        match self {
            KeepaliveImpl::Hardware(hw) => hw.stop(),
            KeepaliveImpl::Software(sw) => sw.stop(),
        }
    }

    fn on_alarm_fired(&mut self) {
        match self {
            KeepaliveImpl::Hardware(hw) => hw.on_alarm_fired(),
            KeepaliveImpl::Software(sw) => sw.on_alarm_fired(),
        }
    }
}

/// Observable orchestrator state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeepaliveMode {
    /// Not started, or stopped.
    Idle,
    /// Hardware keepalive running.
    HardwareActive,
    /// Software keepalive running.
    SoftwareActive,
    /// Software keepalive running while a hardware stop is pending.
    Restarting,
}

/// Session NAT-T keepalive with hardware/software hot swap.
pub struct KeepaliveOrchestrator {
    config: KeepaliveConfig,
    deps: Arc<dyn KeepaliveDeps>,
    active: KeepaliveImpl,
    pending_stop: Option<HardwareKeepalive>,
    running: bool,
}

impl KeepaliveOrchestrator {
    /// Create an orchestrator preferring hardware keepalive. Nothing is sent
    /// until [`start`](Self::start).
    pub fn new(config: KeepaliveConfig, deps: Arc<dyn KeepaliveDeps>) -> Self {
        let id = HardwareKeepaliveId::next();
        let hardware = HardwareKeepalive::new(id, &config, deps.new_offload(id, &config));
        Self {
            active: KeepaliveImpl::Hardware(hardware),
            config,
            deps,
            pending_stop: None,
            running: false,
        }
    }

    /// Start the held implementation.
    pub fn start(&mut self) {
        self.running = true;
        self.active.start();
    }

    /// Stop the active implementation. Does not wait for a hardware stop
    /// confirmation.
    pub fn stop(&mut self) {
        self.running = false;
        self.active.stop();
    }

    /// Switch to a new configuration.
    pub fn restart(&mut self, config: KeepaliveConfig) {
        self.config = config;
        self.running = true;

        if self.pending_stop.is_some() {
            // A hardware slot is still draining; stay on software.
            debug!("restart while hardware stop pending; refreshing software keepalive");
            self.active.stop();
            self.active = KeepaliveImpl::Software(self.new_software());
            self.active.start();
            return;
        }

        let next = if self.active.is_hardware() {
            KeepaliveImpl::Software(self.new_software())
        } else {
            KeepaliveImpl::Hardware(self.new_hardware())
        };
        let previous = std::mem::replace(&mut self.active, next);

        match previous {
            KeepaliveImpl::Hardware(mut hw) => {
                info!(
                    id = %hw.id(),
                    "restarting hardware keepalive; software covers until stop confirmed"
                );
                hw.stop();
                self.pending_stop = Some(hw);
            }
            KeepaliveImpl::Software(mut sw) => sw.stop(),
        }
        self.active.start();
    }

    /// Check if a hardware stop is pending.
    pub fn is_restarting(&self) -> bool {
        self.pending_stop.is_some()
    }

    /// Current state.
    pub fn mode(&self) -> KeepaliveMode {
        if !self.running {
            KeepaliveMode::Idle
        } else if self.pending_stop.is_some() {
            KeepaliveMode::Restarting
        } else if self.active.is_hardware() {
            KeepaliveMode::HardwareActive
        } else {
            KeepaliveMode::SoftwareActive
        }
    }

    /// Current configuration.
    pub fn config(&self) -> &KeepaliveConfig {
        &self.config
    }

    /// Active implementation.
    pub fn active(&self) -> &KeepaliveImpl {
        &self.active
    }

    /// Forward a keepalive alarm tick to the active implementation.
    ///
    /// Ticks of an alarm other than the active software keepalive's were
    /// queued before a swap and are dropped.
    pub fn on_alarm_fired(&mut self, alarm: AlarmId) {
        if self.active.alarm_id() != Some(alarm) {
            debug!(%alarm, "stale keepalive alarm dropped");
            return;
        }
        self.active.on_alarm_fired();
    }

    /// Hardware keepalive `id` cannot be offloaded here; fall back to software.
    pub fn on_hardware_offload_error(&mut self, id: HardwareKeepaliveId) {
        if self.active.hardware_id() != Some(id) {
            debug!(%id, "offload error from inactive hardware keepalive ignored");
            return;
        }

        info!(%id, "hardware keepalive unavailable; switching to software");
        self.active.stop();
        self.active = KeepaliveImpl::Software(self.new_software());
        if self.running {
            self.active.start();
        }
    }

    /// Hardware keepalive `id` hit a network or configuration error.
    ///
    /// Keepalive stops. The session is not notified; it detects the
    /// liveness loss through its retransmission timeout.
    pub fn on_network_error(&mut self, id: HardwareKeepaliveId) {
        if self.active.hardware_id() != Some(id) {
            debug!(%id, "network error from inactive hardware keepalive ignored");
            return;
        }

        info!(%id, "hardware keepalive network error; stopping keepalive");
        self.stop();
    }

    /// Hardware keepalive `id` confirmed it stopped.
    pub fn on_stopped(&mut self, id: HardwareKeepaliveId) {
        if self.pending_stop.as_ref().map(HardwareKeepalive::id) != Some(id) {
            debug!(%id, "stop confirmation for untracked hardware keepalive ignored");
            return;
        }

        self.pending_stop = None;
        self.active.stop();
        self.active = KeepaliveImpl::Hardware(self.new_hardware());
        if self.running {
            info!("pending hardware stop confirmed; resuming hardware keepalive");
            self.active.start();
        }
    }

    /// Route a session event. Returns `false` for events not concerning
    /// keepalive.
    pub fn handle_event(&mut self, event: &SessionEvent) -> bool {
        match event {
            SessionEvent::KeepaliveAlarm { alarm, .. } => self.on_alarm_fired(*alarm),
            SessionEvent::HardwareStopped { id } => self.on_stopped(*id),
            SessionEvent::HardwareError { id, error } => self.on_hardware_error(*id, *error),
            SessionEvent::Network(_) => return false,
        }
        true
    }

    fn on_hardware_error(&mut self, id: HardwareKeepaliveId, error: OffloadError) {
        match error.fault() {
            HardwareFault::OffloadUnavailable => self.on_hardware_offload_error(id),
            HardwareFault::Network => self.on_network_error(id),
        }
    }

    fn new_software(&self) -> SoftwareKeepalive {
        SoftwareKeepalive::new(&self.config, self.deps.new_timer())
    }

    fn new_hardware(&self) -> HardwareKeepalive {
        let id = HardwareKeepaliveId::next();
        HardwareKeepalive::new(id, &self.config, self.deps.new_offload(id, &self.config))
    }
}

impl std::fmt::Debug for KeepaliveOrchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeepaliveOrchestrator")
            .field("mode", &self.mode())
            .field("active", &self.active)
            .field("pending_stop", &self.pending_stop)
            .finish_non_exhaustive()
    }
}
