//! # ike-natt
//!
//! NAT-Traversal keepalive for IKEv2/IPsec sessions running over UDP
//! encapsulation (RFC 3948). It provides:
//!
//! - **Software keepalive**: the one-byte `0xFF` datagram on every alarm tick
//! - **Hardware keepalive**: delegation to a platform offload API, with its
//!   error codes classified into "fall back to software" and "stop"
//! - **Hot swap**: one active implementation per session, with software
//!   keepalive covering the gap while a hardware offload slot drains
//! - **Network tracking**: default-network and pinned-network monitors that
//!   turn partial connectivity callbacks into one re-homing decision
//!
//! ## Modules
//!
//! - [`core`]: Types, traits, constants and errors
//! - [`keepalive`]: Keepalive implementations and the orchestrator
//! - [`network`]: Network change tracking
//! - [`session`]: Event queue and the session-side controller
//!
//! ## Threading
//!
//! Everything runs on the session's serialized context. Timers and offload
//! callbacks only post [`SessionEvent`]s to the session queue, which the
//! session drains with [`KeepaliveController::handle_event`] or
//! [`KeepaliveController::run`].
//!
//! ## Example Usage
//!
//! ```ignore
//! use std::sync::Arc;
//! use ike_natt::prelude::*;
//!
//! let (events_tx, events_rx) = event_channel();
//! let (updates_tx, mut updates_rx) = tokio::sync::mpsc::unbounded_channel();
//!
//! let socket = UdpEncapSocket::bind("0.0.0.0:4500".parse()?).await?;
//! let deps = Arc::new(TokioDeps::new(events_tx)?);
//! let mut controller = KeepaliveController::new(
//!     ControllerConfig::new(1, server_addr),
//!     InitialNetwork { network, link_properties, capabilities },
//!     socket,
//!     deps,
//! )?;
//! // Once IKE_SA_INIT detected NAT
//! controller.handle_nat_detection_result(true)?;
//! tokio::spawn(controller.run(events_rx, updates_tx));
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![cfg_attr(docsrs, feature(doc_cfg))]

pub mod core;
pub mod keepalive;
pub mod network;
pub mod session;

/// Prelude module for convenient imports.
pub mod prelude {
    pub use crate::core::*;

    pub use crate::keepalive::{
        KeepaliveConfig, KeepaliveDeps, KeepaliveMode, KeepaliveOrchestrator, OffloadError,
        TokioDeps, UdpEncapSocket,
    };

    pub use crate::network::{MonitorScope, NetworkEvent, NetworkMonitor, NetworkUpdate};

    pub use crate::session::{
        ControllerConfig, InitialNetwork, KeepaliveController, SessionEvent, event_channel,
    };
}

// Re-export commonly used items at crate root
pub use self::core::{KeepaliveError, KeepaliveResult, NetworkId};
pub use keepalive::{KeepaliveConfig, KeepaliveOrchestrator};
pub use network::{NetworkEvent, NetworkMonitor, NetworkUpdate};
pub use session::{KeepaliveController, SessionEvent};
