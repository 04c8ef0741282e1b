//! Tokio-backed keepalive alarm.

use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tracing::trace;

use crate::core::{AlarmConfig, AlarmId, KeepaliveError, KeepaliveResult, KeepaliveTimer};
use crate::session::{EventSender, SessionEvent};

/// [`KeepaliveTimer`] that sleeps on the tokio clock and posts
/// [`SessionEvent::KeepaliveAlarm`] to the session queue.
#[derive(Debug)]
pub struct TokioTimer {
    id: AlarmId,
    runtime: Handle,
    events: EventSender,
    pending: Option<JoinHandle<()>>,
}

impl TokioTimer {
    /// Create a timer on the current tokio runtime.
    pub fn new(events: EventSender) -> KeepaliveResult<Self> {
        let runtime = Handle::try_current().map_err(|_| KeepaliveError::NoRuntime)?;
        Ok(Self::with_handle(runtime, events))
    }

    /// Create a timer on the given runtime.
    pub fn with_handle(runtime: Handle, events: EventSender) -> Self {
        Self {
            id: AlarmId::next(),
            runtime,
            events,
            pending: None,
        }
    }

    /// Check if an alarm is scheduled and has not fired yet.
    pub fn is_pending(&self) -> bool {
        self.pending.as_ref().is_some_and(|task| !task.is_finished())
    }
}

impl KeepaliveTimer for TokioTimer {
    fn id(&self) -> AlarmId {
        self.id
    }

    fn schedule(&mut self, config: &AlarmConfig) {
        self.cancel();

        let delay = config.delay;
        let session_id = config.session_id;
        let alarm = self.id;
        let events = self.events.clone();
        trace!(session_id, %alarm, ?delay, "scheduling keepalive alarm");

        self.pending = Some(self.runtime.spawn(async move {
            tokio::time::sleep(delay).await;
            // Receiver gone means the session is closed
            let _ = events.send(SessionEvent::KeepaliveAlarm { session_id, alarm });
        }));
    }

    fn cancel(&mut self) {
        if let Some(task) = self.pending.take() {
            task.abort();
        }
    }
}

impl Drop for TokioTimer {
    fn drop(&mut self) {
        self.cancel();
    }
}
