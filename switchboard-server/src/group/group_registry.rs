use crate::config::FanoutConfig;
use crate::fanout::Fanout;
use dashmap::DashMap;
use std::sync::Arc;
use switchboard_core::model::GroupKey;
use tracing::info;

/// Maps group keys to their fanouts. Groups are created on first use and
/// live as long as the registry.
#[derive(Clone)]
pub struct GroupRegistry {
    groups: Arc<DashMap<GroupKey, Fanout>>,
    config: FanoutConfig,
}

impl GroupRegistry {
    pub fn new(config: FanoutConfig) -> Self {
        Self {
            groups: Arc::new(DashMap::new()),
            config,
        }
    }

    /// Fanout for `key`, spawning it if this is the first reference.
    /// Concurrent first references all get the same fanout.
    pub fn resolve(&self, key: &GroupKey) -> Fanout {
        if let Some(fanout) = self.groups.get(key) {
            return fanout.value().clone();
        }

        self.groups
            .entry(key.clone())
            .or_insert_with(|| {
                info!(group = %key, "Creating new group");
                Fanout::spawn_for(key, self.config.clone())
            })
            .value()
            .clone()
    }

    pub fn get(&self, key: &GroupKey) -> Option<Fanout> {
        self.groups.get(key).map(|fanout| fanout.value().clone())
    }

    pub fn keys(&self) -> Vec<GroupKey> {
        self.groups.iter().map(|entry| entry.key().clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.groups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }
}

impl Default for GroupRegistry {
    fn default() -> Self {
        Self::new(FanoutConfig::default())
    }
}
