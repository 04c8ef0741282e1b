//! NAT-T keepalive: software and hardware implementations and the
//! orchestrator that swaps between them.
//!
//! ```text
//! ┌──────────────────────────────────────────┐
//! │          KeepaliveOrchestrator           │
//! │  active impl + optional pending stop     │
//! ├────────────────────┬─────────────────────┤
//! │ HardwareKeepalive  │ SoftwareKeepalive   │
//! │ offload API        │ timer + UDP socket  │
//! └────────────────────┴─────────────────────┘
//! ```

mod config;
mod deps;
mod hardware;
mod orchestrator;
mod socket;
mod software;
mod timer;

pub use config::{KeepaliveConfig, KeepaliveConfigBuilder};
pub use deps::{KeepaliveDeps, TokioDeps};
pub use hardware::{
    HardwareCallback, HardwareFault, HardwareKeepalive, OffloadError, UnsupportedOffload,
    start_flags,
};
pub use orchestrator::{KeepaliveImpl, KeepaliveMode, KeepaliveOrchestrator};
pub use socket::UdpEncapSocket;
pub use software::SoftwareKeepalive;
pub use timer::TokioTimer;
