//! Protocol and platform constants for NAT-T keepalive.
//!
//! Wire values are fixed by RFC 3948 and MUST NOT be changed.

use std::time::Duration;

// =============================================================================
// WIRE FORMAT (RFC 3948)
// =============================================================================

/// Payload byte of a NAT-keepalive packet.
pub const NATT_KEEPALIVE_BYTE: u8 = 0xFF;

/// Full NAT-keepalive datagram.
pub const NATT_KEEPALIVE_PAYLOAD: [u8; 1] = [NATT_KEEPALIVE_BYTE];

/// IKE NAT-T UDP encapsulation port.
pub const IKE_NATT_PORT: u16 = 4500;

// =============================================================================
// KEEPALIVE DELAYS
// =============================================================================

/// Smallest keepalive delay a session may configure.
pub const NATT_KEEPALIVE_DELAY_SEC_MIN: u32 = 10;

/// Largest keepalive delay a session may configure.
pub const NATT_KEEPALIVE_DELAY_SEC_MAX: u32 = 3600;

/// Keepalive delay used when the session does not configure one.
pub const NATT_KEEPALIVE_DELAY_SEC_DEFAULT: u32 = 10;

/// Automatic keepalive delay on Wi-Fi.
pub const AUTO_KEEPALIVE_DELAY_SEC_WIFI: u32 = 15;

/// Automatic keepalive delay on cellular, unless overridden by device config.
pub const AUTO_KEEPALIVE_DELAY_SEC_CELL: u32 = 150;

/// Alarm action tag for keepalive ticks.
pub const ACTION_KEEPALIVE: &str = "ike.natt.keepalive";

/// Default alarm delay.
pub const DEFAULT_KEEPALIVE_DELAY: Duration =
    Duration::from_secs(NATT_KEEPALIVE_DELAY_SEC_DEFAULT as u64);

// =============================================================================
// OFFLOAD ERROR CODES (socket keepalive API)
// =============================================================================

/// The network is not valid for keepalive offload.
pub const ERROR_INVALID_NETWORK: i32 = -20;

/// Source or destination IP address is not valid (seen behind 464XLAT / NAT64).
pub const ERROR_INVALID_IP_ADDRESS: i32 = -21;

/// Port is not valid.
pub const ERROR_INVALID_PORT: i32 = -22;

/// Packet length is not valid.
pub const ERROR_INVALID_LENGTH: i32 = -23;

/// Keepalive interval is not valid.
pub const ERROR_INVALID_INTERVAL: i32 = -24;

/// Socket is not valid.
pub const ERROR_INVALID_SOCKET: i32 = -25;

/// Socket still has pending data.
pub const ERROR_SOCKET_NOT_IDLE: i32 = -26;

/// The device does not support keepalive offload.
pub const ERROR_UNSUPPORTED: i32 = -30;

/// Hardware reported an error.
pub const ERROR_HARDWARE_ERROR: i32 = -31;

/// No free offload slot on this network.
pub const ERROR_INSUFFICIENT_RESOURCES: i32 = -32;
