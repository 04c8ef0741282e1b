//! Error types for the keepalive subsystem.
//!
//! Only construction paths are fallible. Runtime keepalive failures are never
//! returned to the session: they are logged, retried, or turned into a swap or
//! a stop by the orchestrator.

use std::io;
use std::net::IpAddr;

use thiserror::Error;

/// Errors raised while building keepalive components.
#[derive(Debug, Error)]
pub enum KeepaliveError {
    /// I/O error (socket operations).
    #[error("i/o error: {0}")]
    Io(#[from] io::Error),

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),

    /// NAT-T keepalive is only defined for IPv4 endpoints.
    #[error("NAT-T keepalive requires IPv4 endpoints, got {0}")]
    UnsupportedAddressFamily(IpAddr),

    /// A tokio-backed collaborator was created outside a runtime.
    #[error("no tokio runtime available")]
    NoRuntime,
}

impl KeepaliveError {
    /// Check if this error comes from a bad configuration rather than the OS.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            KeepaliveError::Config(_)
                | KeepaliveError::UnsupportedAddressFamily(_)
                | KeepaliveError::NoRuntime
        )
    }
}

/// Result type for keepalive construction.
pub type KeepaliveResult<T> = Result<T, KeepaliveError>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::Ipv6Addr;

    #[test]
    fn test_fatal_errors() {
        assert!(KeepaliveError::Config("missing socket".into()).is_fatal());
        let v6 = IpAddr::V6(Ipv6Addr::LOCALHOST);
        assert!(KeepaliveError::UnsupportedAddressFamily(v6).is_fatal());
        assert!(KeepaliveError::NoRuntime.is_fatal());

        assert!(!KeepaliveError::Io(io::Error::other("test")).is_fatal());
    }

    #[test]
    fn test_error_display() {
        let err = KeepaliveError::UnsupportedAddressFamily(IpAddr::V6(Ipv6Addr::LOCALHOST));
        assert_eq!(err.to_string(), "NAT-T keepalive requires IPv4 endpoints, got ::1");
    }
}
