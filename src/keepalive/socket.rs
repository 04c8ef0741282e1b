//! UDP encapsulation socket shared by IKE traffic and software keepalive.

use std::io;
use std::net::{SocketAddr, SocketAddrV4};
use std::sync::Arc;

use socket2::{SockAddr, SockRef};
use tokio::net::UdpSocket;

use crate::core::constants::NATT_KEEPALIVE_PAYLOAD;

/// Handle to the session's UDP-encapsulation socket.
///
/// Cloning shares the socket. The session's main I/O path and the software
/// keepalive write through the same handle.
#[derive(Debug, Clone)]
pub struct UdpEncapSocket {
    socket: Arc<UdpSocket>,
}

impl UdpEncapSocket {
    /// Bind a new encapsulation socket.
    pub async fn bind(addr: SocketAddr) -> io::Result<Self> {
        let socket = UdpSocket::bind(addr).await?;
        Ok(Self::from_socket(socket))
    }

    /// Wrap an existing tokio UDP socket.
    pub fn from_socket(socket: UdpSocket) -> Self {
        Self {
            socket: Arc::new(socket),
        }
    }

    /// Get the local address.
    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.socket.local_addr()
    }

    /// Send one NAT-keepalive datagram without blocking.
    ///
    /// Issues the `sendto` directly instead of waiting on the reactor's write
    /// readiness, so it works from synchronous code on a socket that was
    /// never polled. A full socket buffer surfaces as `WouldBlock`;
    /// keepalives are never queued.
    pub fn send_keepalive(&self, dst: SocketAddrV4) -> io::Result<usize> {
        SockRef::from(&*self.socket).send_to(&NATT_KEEPALIVE_PAYLOAD, &SockAddr::from(dst))
    }
}
