use crate::transport::TransportConfig;
use anyhow::Context;
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

const DEFAULT_COMMAND_CAPACITY: usize = 100;
const DEFAULT_DELIVERY_TIMEOUT: Duration = Duration::from_secs(5);

/// Per-group broadcast settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct FanoutConfig {
    /// Depth of the fanout's command queue.
    pub command_capacity: usize,
    /// How long a broadcast waits for one subscriber to take a message.
    /// `None` waits forever.
    #[serde(rename = "delivery_timeout_ms", with = "millis::option")]
    pub delivery_timeout: Option<Duration>,
}

impl Default for FanoutConfig {
    fn default() -> Self {
        Self {
            command_capacity: DEFAULT_COMMAND_CAPACITY,
            delivery_timeout: Some(DEFAULT_DELIVERY_TIMEOUT),
        }
    }
}

impl FanoutConfig {
    pub fn command_capacity(mut self, capacity: usize) -> Self {
        self.command_capacity = capacity;
        self
    }

    pub fn delivery_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.delivery_timeout = timeout;
        self
    }
}

/// Top-level broker settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct BrokerConfig {
    pub transport: TransportConfig,
    pub fanout: FanoutConfig,
    /// Messages a session may hold before the fanout has to wait on it.
    pub outbound_capacity: usize,
    /// Pending trickle candidates per session.
    pub candidate_capacity: usize,
    /// Link events buffered between the peer connection and the session driver.
    pub event_capacity: usize,
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self {
            transport: TransportConfig::default(),
            fanout: FanoutConfig::default(),
            outbound_capacity: 1,
            candidate_capacity: 32,
            event_capacity: 256,
        }
    }
}

impl BrokerConfig {
    pub fn from_json_file(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        serde_json::from_str(&raw)
            .with_context(|| format!("Failed to parse config file {}", path.display()))
    }

    pub fn transport(mut self, transport: TransportConfig) -> Self {
        self.transport = transport;
        self
    }

    pub fn fanout(mut self, fanout: FanoutConfig) -> Self {
        self.fanout = fanout;
        self
    }

    pub fn outbound_capacity(mut self, capacity: usize) -> Self {
        self.outbound_capacity = capacity;
        self
    }

    pub fn candidate_capacity(mut self, capacity: usize) -> Self {
        self.candidate_capacity = capacity;
        self
    }

    pub fn event_capacity(mut self, capacity: usize) -> Self {
        self.event_capacity = capacity;
        self
    }
}

/// Durations written as integer milliseconds.
pub(crate) mod millis {
    use serde::{Deserialize, Deserializer};
    use std::time::Duration;

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }

    pub mod option {
        use serde::{Deserialize, Deserializer};
        use std::time::Duration;

        pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<Duration>, D::Error>
        where
            D: Deserializer<'de>,
        {
            Ok(Option::<u64>::deserialize(deserializer)?.map(Duration::from_millis))
        }
    }
}
