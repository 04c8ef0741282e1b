//! Network change tracking.
//!
//! Consumes connectivity callbacks and decides when the session must re-home.
//! Capability and link-property callbacks for a new network arrive
//! separately; the monitor holds them back until both are known and then
//! reports a single [`NetworkUpdate::UnderlyingNetworkUpdated`].
//!
//! Detection of the "both known" transition relies on the platform
//! delivering `Available` before the capability and link-property callbacks
//! of that network.

use std::net::IpAddr;

use tracing::{debug, error, info};

use crate::core::{LinkProperties, NetworkCapabilities, NetworkId};

/// Connectivity callback.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NetworkEvent {
    /// A network became the one in scope (default network changed).
    Available(NetworkId),
    /// Capabilities of a network changed.
    CapabilitiesChanged(NetworkId, NetworkCapabilities),
    /// Link properties of a network changed.
    LinkPropertiesChanged(NetworkId, LinkProperties),
    /// A network disconnected.
    Lost(NetworkId),
}

/// What the session has to act on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NetworkUpdate {
    /// Network or local address changed; the session must re-home.
    UnderlyingNetworkUpdated {
        /// Network to run on.
        network: NetworkId,
        /// Its link properties.
        link_properties: LinkProperties,
        /// Its capabilities.
        capabilities: NetworkCapabilities,
    },
    /// Only the capabilities of the current network changed.
    CapabilitiesUpdated(NetworkCapabilities),
    /// The current network is gone.
    UnderlyingNetworkDied(NetworkId),
}

/// Which network a monitor follows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MonitorScope {
    /// Whatever network is the platform default; its identity may change.
    DefaultNetwork,
    /// One network pinned by the session. Callbacks for others are ignored.
    SpecificNetwork,
}

#[derive(Debug, Clone, Default)]
struct ObservationState {
    network: Option<NetworkId>,
    address: Option<IpAddr>,
    link_properties: Option<LinkProperties>,
    capabilities: Option<NetworkCapabilities>,
}

impl ObservationState {
    fn for_network(network: NetworkId) -> Self {
        Self {
            network: Some(network),
            ..Self::default()
        }
    }

    fn is_ready_for_update(&self) -> bool {
        self.network.is_some() && self.capabilities.is_some() && self.link_properties.is_some()
    }

    fn is_callback_for_new_network(&self) -> bool {
        self.network.is_some() && (self.capabilities.is_none() || self.link_properties.is_none())
    }

    fn is_current_address_lost(&self, lp: &LinkProperties) -> bool {
        self.address.is_some_and(|addr| !lp.has_address(&addr))
    }

    fn take_update(&self) -> Option<NetworkUpdate> {
        Some(NetworkUpdate::UnderlyingNetworkUpdated {
            network: self.network?,
            link_properties: self.link_properties.clone()?,
            capabilities: self.capabilities.clone()?,
        })
    }
}

/// Tracks the session's underlying network.
#[derive(Debug, Clone)]
pub struct NetworkMonitor {
    scope: MonitorScope,
    state: ObservationState,
}

impl NetworkMonitor {
    /// Monitor following the platform default network.
    ///
    /// Nothing is known until the first [`NetworkEvent::Available`].
    pub fn default_network() -> Self {
        Self {
            scope: MonitorScope::DefaultNetwork,
            state: ObservationState::default(),
        }
    }

    /// Monitor pinned to `network`, whose state is already known.
    pub fn specific_network(
        network: NetworkId,
        link_properties: LinkProperties,
        capabilities: NetworkCapabilities,
        address: Option<IpAddr>,
    ) -> Self {
        Self {
            scope: MonitorScope::SpecificNetwork,
            state: ObservationState {
                network: Some(network),
                address,
                link_properties: Some(link_properties),
                capabilities: Some(capabilities),
            },
        }
    }

    /// Scope of this monitor.
    pub fn scope(&self) -> MonitorScope {
        self.scope
    }

    /// Network currently tracked.
    pub fn network(&self) -> Option<NetworkId> {
        self.state.network
    }

    /// Local address the session is bound to.
    pub fn address(&self) -> Option<IpAddr> {
        self.state.address
    }

    /// Last known link properties.
    pub fn link_properties(&self) -> Option<&LinkProperties> {
        self.state.link_properties.as_ref()
    }

    /// Last known capabilities.
    pub fn capabilities(&self) -> Option<&NetworkCapabilities> {
        self.state.capabilities.as_ref()
    }

    /// Switch to a network chosen by the user. Never produces an update.
    pub fn set_network(
        &mut self,
        network: NetworkId,
        link_properties: LinkProperties,
        capabilities: NetworkCapabilities,
    ) {
        self.state.network = Some(network);
        self.state.link_properties = Some(link_properties);
        self.state.capabilities = Some(capabilities);
    }

    /// Record the local address the session re-homed to.
    pub fn set_address(&mut self, address: IpAddr) {
        self.state.address = Some(address);
    }

    /// Process a connectivity callback.
    pub fn on_event(&mut self, event: NetworkEvent) -> Option<NetworkUpdate> {
        match event {
            NetworkEvent::Available(network) => self.on_available(network),
            NetworkEvent::CapabilitiesChanged(network, caps) => {
                self.on_capabilities_changed(network, caps)
            }
            NetworkEvent::LinkPropertiesChanged(network, lp) => {
                self.on_link_properties_changed(network, lp)
            }
            NetworkEvent::Lost(network) => self.on_lost(network),
        }
    }

    fn on_available(&mut self, network: NetworkId) -> Option<NetworkUpdate> {
        if self.scope == MonitorScope::SpecificNetwork {
            return None;
        }
        if self.state.network == Some(network) {
            debug!(%network, "duplicate availability callback ignored");
            return None;
        }

        info!(%network, "default network changed");
        self.state = ObservationState::for_network(network);
        None
    }

    fn on_capabilities_changed(
        &mut self,
        network: NetworkId,
        caps: NetworkCapabilities,
    ) -> Option<NetworkUpdate> {
        if !self.accepts(network) {
            return None;
        }

        match self.scope {
            MonitorScope::SpecificNetwork => {
                self.state.capabilities = Some(caps.clone());
                Some(NetworkUpdate::CapabilitiesUpdated(caps))
            }
            MonitorScope::DefaultNetwork => {
                if self.state.is_callback_for_new_network() {
                    self.state.capabilities = Some(caps);
                    self.update_if_ready()
                } else {
                    self.state.capabilities = Some(caps.clone());
                    Some(NetworkUpdate::CapabilitiesUpdated(caps))
                }
            }
        }
    }

    fn on_link_properties_changed(
        &mut self,
        network: NetworkId,
        lp: LinkProperties,
    ) -> Option<NetworkUpdate> {
        if !self.accepts(network) {
            return None;
        }

        if self.scope == MonitorScope::DefaultNetwork && self.state.is_callback_for_new_network() {
            self.state.link_properties = Some(lp);
            return self.update_if_ready();
        }

        let lost = self.state.is_current_address_lost(&lp);
        self.state.link_properties = Some(lp);
        if lost {
            info!(%network, address = ?self.state.address, "local address lost");
            self.state.take_update()
        } else {
            None
        }
    }

    fn on_lost(&mut self, network: NetworkId) -> Option<NetworkUpdate> {
        if self.state.network != Some(network) {
            return None;
        }
        info!(%network, "underlying network lost");
        Some(NetworkUpdate::UnderlyingNetworkDied(network))
    }

    /// Check a capability/link-property callback against the tracked network.
    fn accepts(&mut self, network: NetworkId) -> bool {
        if self.state.network == Some(network) {
            return true;
        }

        match self.scope {
            MonitorScope::SpecificNetwork => false,
            MonitorScope::DefaultNetwork => {
                // Callback for a network never announced as default.
                error!(
                    wtf = true,
                    %network,
                    tracked = ?self.state.network,
                    "network callback for unexpected network; resetting"
                );
                self.state = ObservationState::default();
                false
            }
        }
    }

    fn update_if_ready(&self) -> Option<NetworkUpdate> {
        if self.state.is_ready_for_update() {
            self.state.take_update()
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::TransportType;
    use std::net::Ipv4Addr;

    const NET_A: NetworkId = NetworkId::new(100);
    const NET_B: NetworkId = NetworkId::new(101);

    fn addr(last: u8) -> IpAddr {
        IpAddr::V4(Ipv4Addr::new(192, 0, 2, last))
    }

    fn wifi() -> NetworkCapabilities {
        NetworkCapabilities::new([TransportType::Wifi])
    }

    fn cell() -> NetworkCapabilities {
        NetworkCapabilities::new([TransportType::Cellular])
    }

    fn props(a: IpAddr) -> LinkProperties {
        LinkProperties::new("wlan0").with_address(a)
    }

    #[test]
    fn test_default_waits_for_link_properties() {
        let mut monitor = NetworkMonitor::default_network();

        assert_eq!(monitor.on_event(NetworkEvent::Available(NET_A)), None);
        assert_eq!(monitor.on_event(NetworkEvent::CapabilitiesChanged(NET_A, wifi())), None);
    }

    #[test]
    fn test_default_reports_once_both_known() {
        let mut monitor = NetworkMonitor::default_network();
        monitor.on_event(NetworkEvent::Available(NET_A));
        monitor.on_event(NetworkEvent::CapabilitiesChanged(NET_A, wifi()));

        let update = monitor.on_event(NetworkEvent::LinkPropertiesChanged(NET_A, props(addr(1))));
        assert_eq!(
            update,
            Some(NetworkUpdate::UnderlyingNetworkUpdated {
                network: NET_A,
                link_properties: props(addr(1)),
                capabilities: wifi(),
            })
        );

        // Steady state: same properties again produce nothing
        monitor.set_address(addr(1));
        assert_eq!(
            monitor.on_event(NetworkEvent::LinkPropertiesChanged(NET_A, props(addr(1)))),
            None
        );
    }

    #[test]
    fn test_default_link_properties_first() {
        let mut monitor = NetworkMonitor::default_network();
        monitor.on_event(NetworkEvent::Available(NET_A));

        assert_eq!(
            monitor.on_event(NetworkEvent::LinkPropertiesChanged(NET_A, props(addr(1)))),
            None
        );
        assert!(matches!(
            monitor.on_event(NetworkEvent::CapabilitiesChanged(NET_A, wifi())),
            Some(NetworkUpdate::UnderlyingNetworkUpdated { network: NET_A, .. })
        ));
    }

    #[test]
    fn test_default_steady_state_capabilities() {
        let mut monitor = NetworkMonitor::default_network();
        monitor.on_event(NetworkEvent::Available(NET_A));
        monitor.on_event(NetworkEvent::CapabilitiesChanged(NET_A, wifi()));
        monitor.on_event(NetworkEvent::LinkPropertiesChanged(NET_A, props(addr(1))));

        assert_eq!(
            monitor.on_event(NetworkEvent::CapabilitiesChanged(NET_A, cell())),
            Some(NetworkUpdate::CapabilitiesUpdated(cell()))
        );
        assert_eq!(monitor.capabilities(), Some(&cell()));
    }

    #[test]
    fn test_default_address_loss() {
        let mut monitor = NetworkMonitor::default_network();
        monitor.on_event(NetworkEvent::Available(NET_A));
        monitor.on_event(NetworkEvent::CapabilitiesChanged(NET_A, wifi()));
        monitor.on_event(NetworkEvent::LinkPropertiesChanged(NET_A, props(addr(1))));
        monitor.set_address(addr(1));

        let update = monitor.on_event(NetworkEvent::LinkPropertiesChanged(NET_A, props(addr(2))));
        assert_eq!(
            update,
            Some(NetworkUpdate::UnderlyingNetworkUpdated {
                network: NET_A,
                link_properties: props(addr(2)),
                capabilities: wifi(),
            })
        );
    }

    #[test]
    fn test_default_new_network_resets_state() {
        let mut monitor = NetworkMonitor::default_network();
        monitor.on_event(NetworkEvent::Available(NET_A));
        monitor.on_event(NetworkEvent::CapabilitiesChanged(NET_A, wifi()));
        monitor.on_event(NetworkEvent::LinkPropertiesChanged(NET_A, props(addr(1))));
        monitor.set_address(addr(1));

        monitor.on_event(NetworkEvent::Available(NET_B));
        assert_eq!(monitor.network(), Some(NET_B));
        assert_eq!(monitor.address(), None);
        assert_eq!(monitor.capabilities(), None);
        assert_eq!(monitor.link_properties(), None);

        assert_eq!(monitor.on_event(NetworkEvent::CapabilitiesChanged(NET_B, cell())), None);
        assert!(matches!(
            monitor.on_event(NetworkEvent::LinkPropertiesChanged(NET_B, props(addr(9)))),
            Some(NetworkUpdate::UnderlyingNetworkUpdated { network: NET_B, .. })
        ));
    }

    #[test]
    fn test_default_duplicate_available_ignored() {
        let mut monitor = NetworkMonitor::default_network();
        monitor.on_event(NetworkEvent::Available(NET_A));
        monitor.on_event(NetworkEvent::CapabilitiesChanged(NET_A, wifi()));

        monitor.on_event(NetworkEvent::Available(NET_A));

        assert_eq!(monitor.capabilities(), Some(&wifi()));
    }

    #[test]
    fn test_default_stale_network_resets() {
        let mut monitor = NetworkMonitor::default_network();
        monitor.on_event(NetworkEvent::Available(NET_A));
        monitor.on_event(NetworkEvent::CapabilitiesChanged(NET_A, wifi()));

        assert_eq!(
            monitor.on_event(NetworkEvent::LinkPropertiesChanged(NET_B, props(addr(1)))),
            None
        );
        assert_eq!(monitor.network(), None);
        assert_eq!(monitor.capabilities(), None);

        // Recovers on the next default network
        monitor.on_event(NetworkEvent::Available(NET_B));
        monitor.on_event(NetworkEvent::CapabilitiesChanged(NET_B, wifi()));
        assert!(
            monitor
                .on_event(NetworkEvent::LinkPropertiesChanged(NET_B, props(addr(1))))
                .is_some()
        );
    }

    fn specific_on_a() -> NetworkMonitor {
        NetworkMonitor::specific_network(NET_A, props(addr(1)), wifi(), Some(addr(1)))
    }

    #[test]
    fn test_specific_ignores_other_networks() {
        let mut monitor = specific_on_a();

        assert_eq!(monitor.on_event(NetworkEvent::Available(NET_B)), None);
        assert_eq!(monitor.on_event(NetworkEvent::CapabilitiesChanged(NET_B, cell())), None);
        assert_eq!(
            monitor.on_event(NetworkEvent::LinkPropertiesChanged(NET_B, props(addr(2)))),
            None
        );
        assert_eq!(monitor.on_event(NetworkEvent::Lost(NET_B)), None);
        assert_eq!(monitor.network(), Some(NET_A));
        assert_eq!(monitor.capabilities(), Some(&wifi()));
    }

    #[test]
    fn test_specific_capabilities_always_reported() {
        let mut monitor = specific_on_a();

        assert_eq!(
            monitor.on_event(NetworkEvent::CapabilitiesChanged(NET_A, wifi())),
            Some(NetworkUpdate::CapabilitiesUpdated(wifi()))
        );
    }

    #[test]
    fn test_specific_address_loss() {
        let mut monitor = specific_on_a();

        let extra = props(addr(1)).with_address(addr(3));
        assert_eq!(monitor.on_event(NetworkEvent::LinkPropertiesChanged(NET_A, extra)), None);

        assert_eq!(
            monitor.on_event(NetworkEvent::LinkPropertiesChanged(NET_A, props(addr(2)))),
            Some(NetworkUpdate::UnderlyingNetworkUpdated {
                network: NET_A,
                link_properties: props(addr(2)),
                capabilities: wifi(),
            })
        );
    }

    #[test]
    fn test_no_address_means_no_loss() {
        let mut monitor = NetworkMonitor::specific_network(NET_A, props(addr(1)), wifi(), None);
        assert_eq!(
            monitor.on_event(NetworkEvent::LinkPropertiesChanged(NET_A, props(addr(2)))),
            None
        );
    }

    #[test]
    fn test_lost_current_network() {
        let mut monitor = NetworkMonitor::default_network();
        monitor.on_event(NetworkEvent::Available(NET_A));

        assert_eq!(
            monitor.on_event(NetworkEvent::Lost(NET_A)),
            Some(NetworkUpdate::UnderlyingNetworkDied(NET_A))
        );
    }

    #[test]
    fn test_set_network_is_silent() {
        let mut monitor = specific_on_a();

        monitor.set_network(NET_B, props(addr(5)), cell());

        assert_eq!(monitor.network(), Some(NET_B));
        assert_eq!(monitor.on_event(NetworkEvent::CapabilitiesChanged(NET_A, wifi())), None);
        assert_eq!(
            monitor.on_event(NetworkEvent::CapabilitiesChanged(NET_B, cell())),
            Some(NetworkUpdate::CapabilitiesUpdated(cell()))
        );
    }
}
