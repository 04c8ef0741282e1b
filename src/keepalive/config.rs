//! Immutable keepalive configuration.

use std::net::{IpAddr, Ipv4Addr, SocketAddrV4};

use super::socket::UdpEncapSocket;
use crate::core::constants::IKE_NATT_PORT;
use crate::core::{AlarmConfig, KeepaliveError, KeepaliveResult, NetworkId, SessionParams};

/// Everything a keepalive implementation needs to run.
///
/// Built by the session whenever network conditions change and handed to
/// [`KeepaliveOrchestrator::restart`](super::KeepaliveOrchestrator::restart).
/// Never mutated.
#[derive(Debug, Clone)]
pub struct KeepaliveConfig {
    src: Ipv4Addr,
    dst: Ipv4Addr,
    remote_port: u16,
    socket: UdpEncapSocket,
    network: NetworkId,
    underpinned_network: Option<NetworkId>,
    alarm: AlarmConfig,
    params: SessionParams,
}

impl KeepaliveConfig {
    /// Create a builder.
    pub fn builder() -> KeepaliveConfigBuilder {
        KeepaliveConfigBuilder::new()
    }

    /// Local address.
    pub fn src(&self) -> Ipv4Addr {
        self.src
    }

    /// Peer address.
    pub fn dst(&self) -> Ipv4Addr {
        self.dst
    }

    /// Peer address and encapsulation port keepalives are sent to.
    pub fn destination(&self) -> SocketAddrV4 {
        SocketAddrV4::new(self.dst, self.remote_port)
    }

    /// Encapsulation socket.
    pub fn socket(&self) -> &UdpEncapSocket {
        &self.socket
    }

    /// Network the session runs on.
    pub fn network(&self) -> NetworkId {
        self.network
    }

    /// Network gating automatic keepalive suspension, if any.
    pub fn underpinned_network(&self) -> Option<NetworkId> {
        self.underpinned_network
    }

    /// Keepalive alarm.
    pub fn alarm(&self) -> &AlarmConfig {
        &self.alarm
    }

    /// Session parameters.
    pub fn params(&self) -> &SessionParams {
        &self.params
    }
}

/// Builder for [`KeepaliveConfig`].
#[derive(Debug, Default)]
pub struct KeepaliveConfigBuilder {
    src: Option<Ipv4Addr>,
    dst: Option<Ipv4Addr>,
    remote_port: Option<u16>,
    socket: Option<UdpEncapSocket>,
    network: Option<NetworkId>,
    underpinned_network: Option<NetworkId>,
    alarm: Option<AlarmConfig>,
    params: SessionParams,
}

fn ipv4(addr: IpAddr) -> KeepaliveResult<Ipv4Addr> {
    match addr {
        IpAddr::V4(v4) => Ok(v4),
        IpAddr::V6(_) => Err(KeepaliveError::UnsupportedAddressFamily(addr)),
    }
}

impl KeepaliveConfigBuilder {
    /// Create a new builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set local and peer addresses. Both MUST be IPv4.
    pub fn addresses(mut self, src: IpAddr, dst: IpAddr) -> KeepaliveResult<Self> {
        self.src = Some(ipv4(src)?);
        self.dst = Some(ipv4(dst)?);
        Ok(self)
    }

    /// Override the peer encapsulation port (default 4500).
    pub fn remote_port(mut self, port: u16) -> Self {
        self.remote_port = Some(port);
        self
    }

    /// Set the encapsulation socket.
    pub fn socket(mut self, socket: UdpEncapSocket) -> Self {
        self.socket = Some(socket);
        self
    }

    /// Set the network.
    pub fn network(mut self, network: NetworkId) -> Self {
        self.network = Some(network);
        self
    }

    /// Set the underpinned network.
    pub fn underpinned_network(mut self, network: Option<NetworkId>) -> Self {
        self.underpinned_network = network;
        self
    }

    /// Set the keepalive alarm.
    pub fn alarm(mut self, alarm: AlarmConfig) -> Self {
        self.alarm = Some(alarm);
        self
    }

    /// Set the session parameters.
    pub fn params(mut self, params: SessionParams) -> Self {
        self.params = params;
        self
    }

    /// Build the configuration.
    pub fn build(self) -> KeepaliveResult<KeepaliveConfig> {
        fn missing(field: &str) -> KeepaliveError {
            KeepaliveError::Config(format!("missing {field}"))
        }

        Ok(KeepaliveConfig {
            src: self.src.ok_or_else(|| missing("source address"))?,
            dst: self.dst.ok_or_else(|| missing("destination address"))?,
            remote_port: self.remote_port.unwrap_or(IKE_NATT_PORT),
            socket: self.socket.ok_or_else(|| missing("encapsulation socket"))?,
            network: self.network.ok_or_else(|| missing("network"))?,
            underpinned_network: self.underpinned_network,
            alarm: self.alarm.ok_or_else(|| missing("alarm config"))?,
            params: self.params,
        })
    }
}
