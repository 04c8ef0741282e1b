//! Session-level keepalive configuration.

use std::time::Duration;

use super::constants::{
    ACTION_KEEPALIVE, AUTO_KEEPALIVE_DELAY_SEC_CELL, AUTO_KEEPALIVE_DELAY_SEC_WIFI,
    NATT_KEEPALIVE_DELAY_SEC_DEFAULT, NATT_KEEPALIVE_DELAY_SEC_MAX, NATT_KEEPALIVE_DELAY_SEC_MIN,
};
use super::error::{KeepaliveError, KeepaliveResult};
use super::types::{NetworkCapabilities, SessionOptions, TransportType};

/// Alarm schedule for keepalive ticks: a delay and the tag of the
/// alarm it raises.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AlarmConfig {
    /// Alarm action tag.
    pub action: String,
    /// Owning IKE session.
    pub session_id: u32,
    /// Delay until the alarm fires.
    pub delay: Duration,
}

impl AlarmConfig {
    /// Create a keepalive alarm config for a session.
    pub fn keepalive(session_id: u32, delay: Duration) -> Self {
        Self {
            action: ACTION_KEEPALIVE.to_string(),
            session_id,
            delay,
        }
    }

    /// Copy of this config with a different delay.
    pub fn with_delay(&self, delay: Duration) -> Self {
        Self {
            delay,
            ..self.clone()
        }
    }

    /// Delay in whole seconds, as the offload API expects it.
    pub fn delay_secs(&self) -> u32 {
        u32::try_from(self.delay.as_secs()).unwrap_or(u32::MAX)
    }
}

/// IKE session parameters consumed by the keepalive subsystem.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionParams {
    /// Option flags.
    pub options: SessionOptions,
    /// Configured NAT-T keepalive delay in seconds.
    pub natt_keepalive_delay_secs: u32,
}

impl Default for SessionParams {
    fn default() -> Self {
        Self {
            options: SessionOptions::NONE,
            natt_keepalive_delay_secs: NATT_KEEPALIVE_DELAY_SEC_DEFAULT,
        }
    }
}

impl SessionParams {
    /// Create a builder with default parameters.
    pub fn builder() -> SessionParamsBuilder {
        SessionParamsBuilder::new()
    }

    /// Check if an option is set.
    pub fn has_option(&self, option: SessionOptions) -> bool {
        self.options.contains(option)
    }
}

/// Builder for [`SessionParams`].
#[derive(Debug)]
pub struct SessionParamsBuilder {
    params: SessionParams,
}

impl SessionParamsBuilder {
    /// Create a new builder.
    pub fn new() -> Self {
        Self {
            params: SessionParams::default(),
        }
    }

    /// Add an option flag.
    pub fn option(mut self, option: SessionOptions) -> Self {
        self.params.options = self.params.options.with(option);
        self
    }

    /// Set the NAT-T keepalive delay in seconds.
    pub fn natt_keepalive_delay_secs(mut self, secs: u32) -> Self {
        self.params.natt_keepalive_delay_secs = secs;
        self
    }

    /// Validate and build the parameters.
    pub fn build(self) -> KeepaliveResult<SessionParams> {
        let secs = self.params.natt_keepalive_delay_secs;
        if !(NATT_KEEPALIVE_DELAY_SEC_MIN..=NATT_KEEPALIVE_DELAY_SEC_MAX).contains(&secs) {
            return Err(KeepaliveError::Config(format!(
                "keepalive delay {secs}s outside [{NATT_KEEPALIVE_DELAY_SEC_MIN}, {NATT_KEEPALIVE_DELAY_SEC_MAX}]"
            )));
        }
        Ok(self.params)
    }
}

impl Default for SessionParamsBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Pick the keepalive delay for a network.
///
/// Without [`SessionOptions::AUTOMATIC_NATT_KEEPALIVES`] the configured delay
/// is used as is. With it, Wi-Fi is capped at 15s and cellular at
/// `cell_override` (clamped to the legal range) or 150s. Wi-Fi wins when a
/// network reports both. The result never exceeds the configured delay.
pub fn keepalive_delay_secs(
    params: &SessionParams,
    caps: &NetworkCapabilities,
    cell_override: Option<u32>,
) -> u32 {
    let configured = params.natt_keepalive_delay_secs;
    if !params.has_option(SessionOptions::AUTOMATIC_NATT_KEEPALIVES) {
        return configured;
    }

    if caps.has_transport(TransportType::Wifi) {
        configured.min(AUTO_KEEPALIVE_DELAY_SEC_WIFI)
    } else if caps.has_transport(TransportType::Cellular) {
        let auto = match cell_override {
            Some(secs)
                if (NATT_KEEPALIVE_DELAY_SEC_MIN..=NATT_KEEPALIVE_DELAY_SEC_MAX)
                    .contains(&secs) =>
            {
                secs
            }
            _ => AUTO_KEEPALIVE_DELAY_SEC_CELL,
        };
        configured.min(auto)
    } else {
        configured
    }
}
