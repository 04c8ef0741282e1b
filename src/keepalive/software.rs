//! Software NAT-T keepalive.
//!
//! Sends the RFC 3948 one-byte packet from the session's encapsulation socket
//! on every alarm tick.

use std::net::SocketAddrV4;

use tracing::{debug, warn};

use super::config::KeepaliveConfig;
use super::socket::UdpEncapSocket;
use crate::core::{AlarmConfig, AlarmId, Keepalive, KeepaliveTimer};

/// Keepalive driven by the session's alarm.
///
/// Send failures are logged and otherwise ignored; the next tick is still
/// scheduled so delivery keeps being attempted.
pub struct SoftwareKeepalive {
    socket: UdpEncapSocket,
    destination: SocketAddrV4,
    alarm: AlarmConfig,
    timer: Box<dyn KeepaliveTimer>,
}

impl SoftwareKeepalive {
    /// Create a software keepalive for `config` ticking on `timer`.
    pub fn new(config: &KeepaliveConfig, timer: Box<dyn KeepaliveTimer>) -> Self {
        Self {
            socket: config.socket().clone(),
            destination: config.destination(),
            alarm: config.alarm().clone(),
            timer,
        }
    }

    /// Where keepalives are sent.
    pub fn destination(&self) -> SocketAddrV4 {
        self.destination
    }

    /// Id of the alarm ticking this keepalive.
    pub fn alarm_id(&self) -> AlarmId {
        self.timer.id()
    }

    fn send_and_reschedule(&mut self) {
        match self.socket.send_keepalive(self.destination) {
            Ok(_) => debug!(dst = %self.destination, "sent NAT-T keepalive"),
            Err(e) => {
                warn!(dst = %self.destination, error = %e, "failed to send NAT-T keepalive")
            }
        }
        self.timer.schedule(&self.alarm);
    }
}

impl Keepalive for SoftwareKeepalive {
    fn start(&mut self) {
        self.send_and_reschedule();
    }

    fn stop(&mut self) {
        self.timer.cancel();
    }

    fn on_alarm_fired(&mut self) {
        self.send_and_reschedule();
    }
}

impl std::fmt::Debug for SoftwareKeepalive {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SoftwareKeepalive")
            .field("destination", &self.destination)
            .field("alarm", &self.alarm)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::NetworkId;
    use std::net::{IpAddr, Ipv4Addr};
    use std::sync::{Arc, Mutex};
    use std::time::Duration;
    use tokio::net::UdpSocket;

    #[derive(Debug, Default)]
    struct TimerLog {
        scheduled: usize,
        cancelled: usize,
    }

    struct FakeTimer(Arc<Mutex<TimerLog>>, AlarmId);

    impl KeepaliveTimer for FakeTimer {
        fn id(&self) -> AlarmId {
            self.1
        }

        fn schedule(&mut self, _config: &AlarmConfig) {
            self.0.lock().unwrap().scheduled += 1;
        }

        fn cancel(&mut self) {
            self.0.lock().unwrap().cancelled += 1;
        }
    }

    fn fake_timer(log: &Arc<Mutex<TimerLog>>) -> Box<dyn KeepaliveTimer> {
        Box::new(FakeTimer(log.clone(), AlarmId::next()))
    }

    async fn config_to(dst: Ipv4Addr, port: u16) -> KeepaliveConfig {
        let socket = UdpEncapSocket::bind("127.0.0.1:0".parse().unwrap())
            .await
            .unwrap();
        KeepaliveConfig::builder()
            .addresses(IpAddr::V4(Ipv4Addr::LOCALHOST), IpAddr::V4(dst))
            .unwrap()
            .remote_port(port)
            .socket(socket)
            .network(NetworkId::new(1))
            .alarm(AlarmConfig::keepalive(1, Duration::from_secs(20)))
            .build()
            .unwrap()
    }

    #[tokio::test]
    async fn test_start_sends_and_schedules() {
        let peer = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let config = config_to(Ipv4Addr::LOCALHOST, peer.local_addr().unwrap().port()).await;
        let log = Arc::new(Mutex::new(TimerLog::default()));

        let mut keepalive = SoftwareKeepalive::new(&config, fake_timer(&log));
        keepalive.start();
        keepalive.on_alarm_fired();

        let mut buf = [0u8; 16];
        for _ in 0..2 {
            let (len, _) = peer.recv_from(&mut buf).await.unwrap();
            assert_eq!(&buf[..len], &[0xFF]);
        }
        assert_eq!(log.lock().unwrap().scheduled, 2);
    }

    #[tokio::test]
    async fn test_send_failure_still_reschedules() {
        // Broadcast without SO_BROADCAST is refused by the kernel
        let config = config_to(Ipv4Addr::BROADCAST, 4500).await;
        let log = Arc::new(Mutex::new(TimerLog::default()));

        let mut keepalive = SoftwareKeepalive::new(&config, fake_timer(&log));
        keepalive.start();

        assert_eq!(log.lock().unwrap().scheduled, 1);
    }

    #[tokio::test]
    async fn test_double_stop() {
        let config = config_to(Ipv4Addr::LOCALHOST, 4500).await;
        let log = Arc::new(Mutex::new(TimerLog::default()));

        let mut keepalive = SoftwareKeepalive::new(&config, fake_timer(&log));
        keepalive.start();
        keepalive.stop();
        keepalive.stop();

        let log = log.lock().unwrap();
        assert_eq!(log.scheduled, 1);
        assert_eq!(log.cancelled, 2);
    }
}
