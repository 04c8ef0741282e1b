//! Session-side keepalive and network glue.
//!
//! [`KeepaliveController`] owns the keepalive orchestrator and the network
//! monitor of one IKE session. It rebuilds the [`KeepaliveConfig`] whenever
//! the network, an address, the keepalive delay or the underpinned network
//! changes, and drains the session queue.
//!
//! Keepalive only runs once the IKE exchange detected NAT between two IPv4
//! endpoints.

use std::net::IpAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use super::event::{EventReceiver, SessionEvent};
use crate::core::constants::IKE_NATT_PORT;
use crate::core::{
    AlarmConfig, AlarmId, KeepaliveError, KeepaliveResult, LinkProperties, NatStatus,
    NetworkCapabilities, NetworkId, SessionParams, keepalive_delay_secs,
};
use crate::keepalive::{KeepaliveConfig, KeepaliveDeps, KeepaliveOrchestrator, UdpEncapSocket};
use crate::network::{MonitorScope, NetworkEvent, NetworkMonitor, NetworkUpdate};

/// Controller configuration.
#[derive(Debug, Clone)]
pub struct ControllerConfig {
    /// IKE session identifier, tags keepalive alarms.
    pub session_id: u32,
    /// Session parameters.
    pub params: SessionParams,
    /// Peer address.
    pub remote_addr: IpAddr,
    /// Peer encapsulation port.
    pub remote_port: u16,
    /// Device override of the automatic cellular keepalive delay.
    pub cellular_delay_override: Option<u32>,
    /// Follow the default network, or stay on the initial one.
    pub scope: MonitorScope,
}

impl ControllerConfig {
    /// Configuration for a session with a peer, following the default network.
    pub fn new(session_id: u32, remote_addr: IpAddr) -> Self {
        Self {
            session_id,
            params: SessionParams::default(),
            remote_addr,
            remote_port: IKE_NATT_PORT,
            cellular_delay_override: None,
            scope: MonitorScope::DefaultNetwork,
        }
    }
}

/// Network state the session starts on.
#[derive(Debug, Clone)]
pub struct InitialNetwork {
    /// Network.
    pub network: NetworkId,
    /// Its link properties.
    pub link_properties: LinkProperties,
    /// Its capabilities.
    pub capabilities: NetworkCapabilities,
}

/// Keepalive and network state of one IKE session.
///
/// MUST be driven from a single task.
pub struct KeepaliveController {
    config: ControllerConfig,
    socket: UdpEncapSocket,
    deps: Arc<dyn KeepaliveDeps>,
    monitor: NetworkMonitor,
    network: NetworkId,
    link_properties: LinkProperties,
    capabilities: NetworkCapabilities,
    local_addr: IpAddr,
    underpinned_network: Option<NetworkId>,
    nat_status: NatStatus,
    alarm: AlarmConfig,
    keepalive: Option<KeepaliveOrchestrator>,
}

fn select_local_address(lp: &LinkProperties, remote: IpAddr) -> Option<IpAddr> {
    if remote.is_ipv4() {
        lp.ipv4_address()
    } else {
        lp.addresses.iter().copied().find(IpAddr::is_ipv6)
    }
}

impl KeepaliveController {
    /// Set up a controller on `initial`. Keepalive is not started.
    pub fn new(
        config: ControllerConfig,
        initial: InitialNetwork,
        socket: UdpEncapSocket,
        deps: Arc<dyn KeepaliveDeps>,
    ) -> KeepaliveResult<Self> {
        let local_addr = select_local_address(&initial.link_properties, config.remote_addr)
            .ok_or_else(|| {
                KeepaliveError::Config(format!("no local address on network {}", initial.network))
            })?;

        let monitor = match config.scope {
            MonitorScope::DefaultNetwork => {
                let mut monitor = NetworkMonitor::default_network();
                monitor.on_event(NetworkEvent::Available(initial.network));
                monitor.set_address(local_addr);
                monitor
            }
            MonitorScope::SpecificNetwork => NetworkMonitor::specific_network(
                initial.network,
                initial.link_properties.clone(),
                initial.capabilities.clone(),
                Some(local_addr),
            ),
        };

        let delay = keepalive_delay_secs(
            &config.params,
            &initial.capabilities,
            config.cellular_delay_override,
        );
        let alarm = AlarmConfig::keepalive(config.session_id, Duration::from_secs(delay.into()));

        Ok(Self {
            config,
            socket,
            deps,
            monitor,
            network: initial.network,
            link_properties: initial.link_properties,
            capabilities: initial.capabilities,
            local_addr,
            underpinned_network: None,
            nat_status: NatStatus::default(),
            alarm,
            keepalive: None,
        })
    }

    /// Current network.
    pub fn network(&self) -> NetworkId {
        self.network
    }

    /// Current local address.
    pub fn local_addr(&self) -> IpAddr {
        self.local_addr
    }

    /// Current peer address.
    pub fn remote_addr(&self) -> IpAddr {
        self.config.remote_addr
    }

    /// NAT status learned from the IKE exchange.
    pub fn nat_status(&self) -> NatStatus {
        self.nat_status
    }

    /// Current keepalive delay.
    pub fn keepalive_delay(&self) -> Duration {
        self.alarm.delay
    }

    /// Running keepalive, if any.
    pub fn keepalive(&self) -> Option<&KeepaliveOrchestrator> {
        self.keepalive.as_ref()
    }

    /// Network monitor.
    pub fn monitor(&self) -> &NetworkMonitor {
        &self.monitor
    }

    /// Record the NAT detection result of IKE_SA_INIT or a MOBIKE exchange.
    ///
    /// With NAT detected keepalive starts, or restarts on the current state.
    /// Without NAT any running keepalive stops. NAT between IPv6 endpoints
    /// is unsupported.
    pub fn handle_nat_detection_result(&mut self, nat_detected: bool) -> KeepaliveResult<()> {
        if !nat_detected {
            self.nat_status = NatStatus::NotDetected;
            self.stop_keepalive("no NAT detected");
            return Ok(());
        }

        self.nat_status = NatStatus::Detected;
        if !self.config.remote_addr.is_ipv4() {
            return Err(KeepaliveError::UnsupportedAddressFamily(self.config.remote_addr));
        }
        self.setup_or_update_keepalive()
    }

    /// Record that the server does not support NAT-T.
    pub fn mark_server_natt_unsupported(&mut self) {
        self.nat_status = NatStatus::Unsupported;
        self.stop_keepalive("server does not support NAT-T");
    }

    /// Switch to another peer address.
    ///
    /// The local address is reselected from the current network in the
    /// peer's family. Keepalive follows, and stops when the peer is IPv6.
    pub fn set_remote_address(&mut self, remote_addr: IpAddr) -> KeepaliveResult<()> {
        let local_addr = select_local_address(&self.link_properties, remote_addr)
            .ok_or(KeepaliveError::UnsupportedAddressFamily(remote_addr))?;

        info!(%remote_addr, %local_addr, "remote address updated");
        self.config.remote_addr = remote_addr;
        self.local_addr = local_addr;
        self.monitor.set_address(local_addr);
        self.restart_keepalive_if_running()
    }

    /// Start keepalive, or restart it with the current state.
    ///
    /// A no-op until NAT was detected. NAT-T keepalive only runs between
    /// IPv4 endpoints; otherwise any running keepalive is stopped.
    pub fn setup_or_update_keepalive(&mut self) -> KeepaliveResult<()> {
        if self.nat_status != NatStatus::Detected {
            debug!(nat_status = ?self.nat_status, "NAT not detected; no keepalive");
            self.stop_keepalive("NAT not detected");
            return Ok(());
        }
        if !self.config.remote_addr.is_ipv4() {
            self.stop_keepalive("NAT-T keepalive not needed on IPv6");
            return Ok(());
        }

        let config = KeepaliveConfig::builder()
            .addresses(self.local_addr, self.config.remote_addr)?
            .remote_port(self.config.remote_port)
            .socket(self.socket.clone())
            .network(self.network)
            .underpinned_network(self.underpinned_network)
            .alarm(self.alarm.clone())
            .params(self.config.params.clone())
            .build()?;

        match self.keepalive.as_mut() {
            Some(keepalive) => keepalive.restart(config),
            None => {
                let mut keepalive = KeepaliveOrchestrator::new(config, Arc::clone(&self.deps));
                keepalive.start();
                self.keepalive = Some(keepalive);
            }
        }
        Ok(())
    }

    /// Handle a keepalive alarm tick.
    ///
    /// Ignored when no keepalive runs, e.g. after moving to IPv6.
    pub fn fire_keepalive(&mut self, alarm: AlarmId) {
        if let Some(keepalive) = self.keepalive.as_mut() {
            keepalive.on_alarm_fired(alarm);
        }
    }

    /// Move to a network chosen by the user.
    ///
    /// `keepalive_delay_secs` of `None` selects the automatic delay.
    pub fn on_network_set_by_user(
        &mut self,
        network: NetworkId,
        link_properties: LinkProperties,
        capabilities: NetworkCapabilities,
        keepalive_delay: Option<u32>,
    ) -> KeepaliveResult<()> {
        info!(%network, ?keepalive_delay, "network set by user");

        let delay = keepalive_delay.unwrap_or_else(|| {
            keepalive_delay_secs(
                &self.config.params,
                &capabilities,
                self.config.cellular_delay_override,
            )
        });
        let delay = Duration::from_secs(delay.into());
        if delay != self.alarm.delay {
            self.alarm = self.alarm.with_delay(delay);
            self.restart_keepalive_if_running()?;
        }

        self.monitor
            .set_network(network, link_properties.clone(), capabilities.clone());
        self.handle_underlying_network_updated(network, &link_properties, capabilities, false)?;
        Ok(())
    }

    /// Set the network gating automatic keepalive suspension.
    pub fn on_underpinned_network_set_by_user(
        &mut self,
        network: Option<NetworkId>,
    ) -> KeepaliveResult<()> {
        self.underpinned_network = network;
        self.restart_keepalive_if_running()
    }

    /// Handle one event from the session queue.
    ///
    /// Returns the network update the IKE session has to see, if any.
    pub fn handle_event(&mut self, event: SessionEvent) -> Option<NetworkUpdate> {
        let event = match event {
            SessionEvent::Network(event) => event,
            SessionEvent::KeepaliveAlarm { alarm, .. } => {
                self.fire_keepalive(alarm);
                return None;
            }
            other => {
                if let Some(keepalive) = self.keepalive.as_mut() {
                    keepalive.handle_event(&other);
                }
                return None;
            }
        };

        match self.monitor.on_event(event)? {
            NetworkUpdate::UnderlyingNetworkUpdated {
                network,
                link_properties,
                capabilities,
            } => {
                match self.handle_underlying_network_updated(
                    network,
                    &link_properties,
                    capabilities.clone(),
                    true,
                ) {
                    Ok(true) => Some(NetworkUpdate::UnderlyingNetworkUpdated {
                        network,
                        link_properties,
                        capabilities,
                    }),
                    Ok(false) => None,
                    Err(e) => {
                        warn!(%network, error = %e, "failed to move to updated network");
                        Some(NetworkUpdate::UnderlyingNetworkDied(network))
                    }
                }
            }
            NetworkUpdate::CapabilitiesUpdated(capabilities) => {
                // No re-homing or keepalive change on capability updates
                self.capabilities = capabilities.clone();
                Some(NetworkUpdate::CapabilitiesUpdated(capabilities))
            }
            died @ NetworkUpdate::UnderlyingNetworkDied(_) => Some(died),
        }
    }

    /// Drain the session queue until the receiver of `updates` is dropped.
    ///
    /// Keepalive is stopped on exit.
    pub async fn run(
        mut self,
        mut events: EventReceiver,
        updates: mpsc::UnboundedSender<NetworkUpdate>,
    ) {
        loop {
            let event = tokio::select! {
                event = events.recv() => match event {
                    Some(event) => event,
                    None => break,
                },
                () = updates.closed() => break,
            };

            if let Some(update) = self.handle_event(event) {
                if updates.send(update).is_err() {
                    break;
                }
            }
        }
        self.tear_down();
    }

    /// Stop keepalive.
    pub fn tear_down(&mut self) {
        self.stop_keepalive("session torn down");
    }

    fn stop_keepalive(&mut self, reason: &str) {
        if let Some(mut keepalive) = self.keepalive.take() {
            debug!(reason, "stopping NAT-T keepalive");
            keepalive.stop();
        }
    }

    fn restart_keepalive_if_running(&mut self) -> KeepaliveResult<()> {
        if self.keepalive.is_some() {
            self.setup_or_update_keepalive()?;
        }
        Ok(())
    }

    /// Returns whether the session moved.
    fn handle_underlying_network_updated(
        &mut self,
        network: NetworkId,
        link_properties: &LinkProperties,
        capabilities: NetworkCapabilities,
        skip_if_same_network: bool,
    ) -> KeepaliveResult<bool> {
        let local_addr = select_local_address(link_properties, self.config.remote_addr)
            .ok_or_else(|| {
                KeepaliveError::Config(format!("no local address on network {network}"))
            })?;

        self.capabilities = capabilities;
        self.link_properties = link_properties.clone();
        if skip_if_same_network && network == self.network && local_addr == self.local_addr {
            debug!(%network, "network and local address unchanged");
            return Ok(false);
        }

        info!(from = %self.network, to = %network, %local_addr, "underlying network updated");
        self.network = network;
        self.local_addr = local_addr;
        self.monitor.set_address(local_addr);
        self.restart_keepalive_if_running()?;
        Ok(true)
    }
}

impl std::fmt::Debug for KeepaliveController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeepaliveController")
            .field("network", &self.network)
            .field("local_addr", &self.local_addr)
            .field("alarm", &self.alarm)
            .field("keepalive", &self.keepalive)
            .finish_non_exhaustive()
    }
}
