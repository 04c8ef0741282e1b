//! Factories for keepalive collaborators.

use tokio::runtime::Handle;

use super::config::KeepaliveConfig;
use super::hardware::{HardwareCallback, UnsupportedOffload};
use super::timer::TokioTimer;
use crate::core::{
    HardwareKeepaliveId, KeepaliveError, KeepaliveResult, KeepaliveTimer, OffloadKeepalive,
};
use crate::session::EventSender;

/// Creates the timers and offload handles the orchestrator swaps between.
pub trait KeepaliveDeps: Send + Sync {
    /// New alarm for a software keepalive.
    fn new_timer(&self) -> Box<dyn KeepaliveTimer>;

    /// New offload handle for hardware keepalive `id`.
    fn new_offload(
        &self,
        id: HardwareKeepaliveId,
        config: &KeepaliveConfig,
    ) -> Box<dyn OffloadKeepalive>;
}

/// Collaborators backed by the tokio runtime, without keepalive offload.
#[derive(Debug, Clone)]
pub struct TokioDeps {
    runtime: Handle,
    events: EventSender,
}

impl TokioDeps {
    /// Create factories posting to `events` on the current runtime.
    pub fn new(events: EventSender) -> KeepaliveResult<Self> {
        let runtime = Handle::try_current().map_err(|_| KeepaliveError::NoRuntime)?;
        Ok(Self { runtime, events })
    }
}

impl KeepaliveDeps for TokioDeps {
    fn new_timer(&self) -> Box<dyn KeepaliveTimer> {
        Box::new(TokioTimer::with_handle(self.runtime.clone(), self.events.clone()))
    }

    fn new_offload(
        &self,
        id: HardwareKeepaliveId,
        _config: &KeepaliveConfig,
    ) -> Box<dyn OffloadKeepalive> {
        Box::new(UnsupportedOffload::new(HardwareCallback::new(
            id,
            self.events.clone(),
        )))
    }
}
