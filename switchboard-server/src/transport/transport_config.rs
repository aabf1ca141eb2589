use serde::Deserialize;
use std::time::Duration;
use switchboard_core::model::IceServerConfig;

/// Конфигурация для WebRTC
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TransportConfig {
    pub ice_servers: Vec<IceServerConfig>,
    /// Upper bound on local ICE gathering before the answer is returned.
    #[serde(rename = "gather_timeout_ms", deserialize_with = "crate::config::millis::deserialize")]
    pub gather_timeout: Duration,
    /// Hold the answer until local candidates are in the SDP.
    pub wait_for_gathering: bool,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            ice_servers: vec![IceServerConfig::new("stun:stun.l.google.com:19302")],
            gather_timeout: Duration::from_secs(5),
            wait_for_gathering: true,
        }
    }
}

impl TransportConfig {
    pub fn ice_servers(mut self, servers: Vec<IceServerConfig>) -> Self {
        self.ice_servers = servers;
        self
    }

    pub fn gather_timeout(mut self, timeout: Duration) -> Self {
        self.gather_timeout = timeout;
        self
    }

    pub fn wait_for_gathering(mut self, wait: bool) -> Self {
        self.wait_for_gathering = wait;
        self
    }
}
