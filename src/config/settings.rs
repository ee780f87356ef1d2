use serde::Deserialize;

use crate::relay::SameIdPolicy;

/// Top-level configuration of a relay node.
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct Settings {
    pub node: NodeSettings,
    pub relay: RelaySettings,
    pub storage: StorageSettings,
    pub logging: LoggingSettings,
    pub keys: KeySettings,
}

/// Where the peer server listens and which peers to dial at startup.
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct NodeSettings {
    pub host: String,
    pub port: u16,
    pub node_id: String,
    /// WebSocket URLs, e.g. `ws://10.0.0.2:7878`.
    pub peers: Vec<String>,
}

/// Flood and triage tunables.
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct RelaySettings {
    pub seen_capacity: usize,
    pub ttl_normal: u32,
    pub ttl_high: u32,
    pub ttl_critical: u32,
    pub same_id_policy: SameIdPolicy,
    pub maintenance_interval_secs: u64,
    pub critical_battery_percent: u8,
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct StorageSettings {
    pub path: String,
    pub retention_secs: u64,
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct LoggingSettings {
    pub level: String,
}

/// Node identity and the origins it trusts.
#[derive(Debug, Deserialize, Clone, PartialEq, Default)]
pub struct KeySettings {
    /// Base64 Ed25519 seed. A random key is generated per run when absent.
    pub signing_key: Option<String>,
    /// Base64 Ed25519 public keys. The node's own key is always trusted.
    pub trusted_keys: Vec<String>,
}

/// Settings as read from files or the environment, every field optional.
#[derive(Debug, Deserialize, Default)]
pub struct PartialSettings {
    pub node: Option<PartialNodeSettings>,
    pub relay: Option<PartialRelaySettings>,
    pub storage: Option<PartialStorageSettings>,
    pub logging: Option<PartialLoggingSettings>,
    pub keys: Option<PartialKeySettings>,
}

#[derive(Debug, Deserialize, Default)]
pub struct PartialNodeSettings {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub node_id: Option<String>,
    pub peers: Option<Vec<String>>,
}

#[derive(Debug, Deserialize, Default)]
pub struct PartialRelaySettings {
    pub seen_capacity: Option<usize>,
    pub ttl_normal: Option<u32>,
    pub ttl_high: Option<u32>,
    pub ttl_critical: Option<u32>,
    pub same_id_policy: Option<SameIdPolicy>,
    pub maintenance_interval_secs: Option<u64>,
    pub critical_battery_percent: Option<u8>,
}

#[derive(Debug, Deserialize, Default)]
pub struct PartialStorageSettings {
    pub path: Option<String>,
    pub retention_secs: Option<u64>,
}

#[derive(Debug, Deserialize, Default)]
pub struct PartialLoggingSettings {
    pub level: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
pub struct PartialKeySettings {
    pub signing_key: Option<String>,
    pub trusted_keys: Option<Vec<String>>,
}

impl PartialSettings {
    /// Fill every missing value from `default`.
    pub fn merge(self, default: Settings) -> Settings {
        let node = self.node.unwrap_or_default();
        let relay = self.relay.unwrap_or_default();
        let storage = self.storage.unwrap_or_default();
        let logging = self.logging.unwrap_or_default();
        let keys = self.keys.unwrap_or_default();

        Settings {
            node: NodeSettings {
                host: node.host.unwrap_or(default.node.host),
                port: node.port.unwrap_or(default.node.port),
                node_id: node.node_id.unwrap_or(default.node.node_id),
                peers: node.peers.unwrap_or(default.node.peers),
            },
            relay: RelaySettings {
                seen_capacity: relay.seen_capacity.unwrap_or(default.relay.seen_capacity),
                ttl_normal: relay.ttl_normal.unwrap_or(default.relay.ttl_normal),
                ttl_high: relay.ttl_high.unwrap_or(default.relay.ttl_high),
                ttl_critical: relay.ttl_critical.unwrap_or(default.relay.ttl_critical),
                same_id_policy: relay.same_id_policy.unwrap_or(default.relay.same_id_policy),
                maintenance_interval_secs: relay
                    .maintenance_interval_secs
                    .unwrap_or(default.relay.maintenance_interval_secs),
                critical_battery_percent: relay
                    .critical_battery_percent
                    .unwrap_or(default.relay.critical_battery_percent),
            },
            storage: StorageSettings {
                path: storage.path.unwrap_or(default.storage.path),
                retention_secs: storage
                    .retention_secs
                    .unwrap_or(default.storage.retention_secs),
            },
            logging: LoggingSettings {
                level: logging.level.unwrap_or(default.logging.level),
            },
            keys: KeySettings {
                signing_key: keys
                    .signing_key
                    .filter(|k| !k.trim().is_empty())
                    .or(default.keys.signing_key),
                trusted_keys: keys.trusted_keys.unwrap_or(default.keys.trusted_keys),
            },
        }
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            node: NodeSettings {
                host: "127.0.0.1".to_string(),
                port: 7878,
                node_id: "sosrelay-node".to_string(),
                peers: Vec::new(),
            },
            relay: RelaySettings {
                seen_capacity: 5000,
                ttl_normal: 4,
                ttl_high: 6,
                ttl_critical: 10,
                same_id_policy: SameIdPolicy::Escalate,
                maintenance_interval_secs: 60,
                critical_battery_percent: 5,
            },
            storage: StorageSettings {
                path: "sosrelay_db".to_string(),
                retention_secs: 86_400,
            },
            logging: LoggingSettings {
                level: "info".to_string(),
            },
            keys: KeySettings::default(),
        }
    }
}

impl NodeSettings {
    pub fn listen_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
