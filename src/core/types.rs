//! Value types shared by the keepalive and network layers.

use std::fmt;
use std::net::IpAddr;
use std::sync::atomic::{AtomicU64, Ordering};

/// Opaque handle of a platform network.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NetworkId(u64);

impl NetworkId {
    /// Create a handle from the platform's raw network handle.
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    /// Get the raw handle.
    pub fn raw(self) -> u64 {
        self.0
    }
}

impl fmt::Display for NetworkId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "net{}", self.0)
    }
}

/// Link-layer transport of a network.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransportType {
    /// Wi-Fi.
    Wifi,
    /// Cellular data.
    Cellular,
    /// Wired Ethernet.
    Ethernet,
    /// VPN layered over another network.
    Vpn,
    /// Anything else.
    Other,
}

/// Capabilities of a network as reported by the connectivity feed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NetworkCapabilities {
    transports: Vec<TransportType>,
}

impl NetworkCapabilities {
    /// Create capabilities with the given transports.
    pub fn new(transports: impl IntoIterator<Item = TransportType>) -> Self {
        let mut caps = Self::default();
        for transport in transports {
            caps = caps.with_transport(transport);
        }
        caps
    }

    /// Add a transport.
    pub fn with_transport(mut self, transport: TransportType) -> Self {
        if !self.transports.contains(&transport) {
            self.transports.push(transport);
        }
        self
    }

    /// Check if the network uses the given transport.
    pub fn has_transport(&self, transport: TransportType) -> bool {
        self.transports.contains(&transport)
    }

    /// All transports of the network.
    pub fn transports(&self) -> &[TransportType] {
        &self.transports
    }
}

/// Link properties of a network: interface and assigned addresses.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LinkProperties {
    /// Interface name, if known.
    pub interface_name: Option<String>,
    /// Addresses assigned to the link.
    pub addresses: Vec<IpAddr>,
}

impl LinkProperties {
    /// Create link properties for an interface.
    pub fn new(interface_name: impl Into<String>) -> Self {
        Self {
            interface_name: Some(interface_name.into()),
            addresses: Vec::new(),
        }
    }

    /// Add a link address.
    pub fn with_address(mut self, addr: IpAddr) -> Self {
        self.addresses.push(addr);
        self
    }

    /// Check if an address is assigned to the link.
    pub fn has_address(&self, addr: &IpAddr) -> bool {
        self.addresses.contains(addr)
    }

    /// First IPv4 address on the link.
    pub fn ipv4_address(&self) -> Option<IpAddr> {
        self.addresses.iter().copied().find(IpAddr::is_ipv4)
    }
}

/// IKE session option flags relevant to keepalive.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SessionOptions(u32);

impl SessionOptions {
    /// No options set.
    pub const NONE: Self = Self(0);
    /// Let the platform pause and resume keepalive automatically, and pick
    /// the keepalive delay from the network transport.
    pub const AUTOMATIC_NATT_KEEPALIVES: Self = Self(0x01);

    /// Create options from raw bits.
    pub fn from_bits(bits: u32) -> Self {
        Self(bits)
    }

    /// Get the raw bits.
    pub fn bits(self) -> u32 {
        self.0
    }

    /// Check if all bits of `other` are set.
    pub fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    /// Set the bits of `other`.
    pub fn with(self, other: Self) -> Self {
        Self(self.0 | other.0)
    }
}

/// Start options passed to the offload keepalive API.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StartFlags(u32);

impl StartFlags {
    /// No flags set.
    pub const NONE: Self = Self(0);
    /// Suspend keepalive while the (underpinned) network is idle.
    pub const AUTOMATIC_ON_OFF: Self = Self(0x01);

    /// Get the raw bits.
    pub fn bits(self) -> u32 {
        self.0
    }

    /// Check if AUTOMATIC_ON_OFF is set.
    pub fn is_automatic_on_off(self) -> bool {
        self.0 & Self::AUTOMATIC_ON_OFF.0 != 0
    }
}

static NEXT_HARDWARE_ID: AtomicU64 = AtomicU64::new(0);
static NEXT_ALARM_ID: AtomicU64 = AtomicU64::new(0);

/// Identity of one hardware keepalive instance.
///
/// Used to tell apart callbacks of a draining instance from those of its
/// successor. Unique within the process, so a late callback can never match
/// an instance of a later orchestrator on the same session queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HardwareKeepaliveId(pub(crate) u64);

impl HardwareKeepaliveId {
    pub(crate) fn next() -> Self {
        Self(NEXT_HARDWARE_ID.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for HardwareKeepaliveId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "hw#{}", self.0)
    }
}

/// Identity of one keepalive alarm.
///
/// Alarm ticks carry the id of the timer that raised them; a tick queued
/// before its timer was replaced is dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AlarmId(u64);

impl AlarmId {
    /// Allocate a process-unique alarm id.
    pub fn next() -> Self {
        Self(NEXT_ALARM_ID.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for AlarmId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "alarm#{}", self.0)
    }
}

/// What the IKE exchange found out about NAT between the peers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum NatStatus {
    /// No NAT detection exchanged yet.
    #[default]
    SupportNotChecked,
    /// The server does not support NAT-T.
    Unsupported,
    /// No NAT on the path.
    NotDetected,
    /// NAT on the path; keepalive is required.
    Detected,
}
