use serde::{Deserialize, Serialize};

use crate::config::Settings;
use crate::message::Priority;

/// What to do when an id that is already known arrives again.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SameIdPolicy {
    /// Accept the re-arrival once more if its priority is strictly higher.
    #[default]
    Escalate,
    /// Dedup on id alone.
    Drop,
}

/// Tunables of the flood relay.
#[derive(Debug, Clone, PartialEq)]
pub struct RelayPolicy {
    pub ttl_normal: u32,
    pub ttl_high: u32,
    pub ttl_critical: u32,
    pub seen_capacity: usize,
    pub same_id_policy: SameIdPolicy,
    /// Locally originated messages below this battery level go up one priority.
    pub critical_battery_percent: u8,
    /// Messages older than this are pruned by maintenance. Zero keeps everything.
    pub retention_ms: i64,
}

impl RelayPolicy {
    /// Hop budget a freshly originated message gets.
    pub fn ttl_for(&self, priority: Priority) -> u32 {
        match priority {
            Priority::Normal => self.ttl_normal,
            Priority::High => self.ttl_high,
            Priority::Critical => self.ttl_critical,
        }
    }

    /// Upper bound on `ttl + hops` for any message this node accepts.
    pub fn max_ttl(&self) -> u32 {
        self.ttl_normal.max(self.ttl_high).max(self.ttl_critical)
    }

    pub fn from_settings(settings: &Settings) -> Self {
        let relay = &settings.relay;
        Self {
            ttl_normal: relay.ttl_normal,
            ttl_high: relay.ttl_high,
            ttl_critical: relay.ttl_critical,
            seen_capacity: relay.seen_capacity,
            same_id_policy: relay.same_id_policy,
            critical_battery_percent: relay.critical_battery_percent,
            retention_ms: i64::try_from(settings.storage.retention_secs)
                .unwrap_or(i64::MAX / 1000)
                .saturating_mul(1000),
        }
    }
}

impl Default for RelayPolicy {
    fn default() -> Self {
        Self::from_settings(&Settings::default())
    }
}
