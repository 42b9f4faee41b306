use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// The cloud DNS load-balancing profile (spec.md §3 "Cloud Profile
/// (external)" / §6). `location` is always `"global"` for Traffic Manager
/// profiles; `routing_method` is always `Weighted` in this system.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Profile {
    pub name: String,
    pub location: String,
    pub properties: ProfileProperties,
    #[serde(default)]
    pub tags: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ProfileProperties {
    pub dns_config: DnsConfig,
    pub monitor_config: MonitorConfig,
    pub profile_status: ProfileStatus,
    pub traffic_routing_method: String,
    /// Foreign/unmanaged field: server-computed endpoint list. Preserved
    /// verbatim across merges per spec.md §4.4 step 6.
    #[serde(default)]
    pub endpoints: Vec<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_return: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource_id: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DnsConfig {
    /// Immutable once created (spec.md §3 invariants).
    pub relative_name: String,
    pub ttl: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fqdn: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct MonitorConfig {
    pub interval_in_seconds: i64,
    pub path: String,
    pub port: i32,
    pub protocol: String,
    pub timeout_in_seconds: i64,
    pub tolerated_number_of_failures: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub custom_headers: Option<Vec<CustomHeader>>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct CustomHeader {
    pub name: String,
    pub value: String,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum ProfileStatus {
    Enabled,
    Disabled,
}

impl From<&crate::types::MonitorConfig> for MonitorConfig {
    fn from(src: &crate::types::MonitorConfig) -> Self {
        Self {
            interval_in_seconds: src.interval_seconds,
            path: src.path.clone(),
            port: src.port,
            protocol: src.protocol.clone(),
            timeout_in_seconds: src.timeout_seconds,
            tolerated_number_of_failures: src.tolerated_number_of_failures,
            custom_headers: src.custom_headers.as_ref().map(|headers| {
                headers
                    .iter()
                    .map(|h| CustomHeader {
                        name: h.name.clone(),
                        value: h.value.clone(),
                    })
                    .collect()
            }),
        }
    }
}
