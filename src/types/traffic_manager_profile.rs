use k8s_openapi::apimachinery::pkg::apis::meta::v1::Condition;
use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// User-created request to program a cloud traffic-manager profile. See
/// spec.md §3 "TrafficManagerProfile (hub store)" and §4.4. This is the
/// newer of the two API versions mentioned in spec.md §9 Open Questions
/// (`ResourceGroup` in spec, `ResourceID` in status, a metrics finalizer).
#[derive(CustomResource, Deserialize, Serialize, Clone, Debug, JsonSchema)]
#[kube(
    group = "networking.fleet.azure.com",
    version = "v1alpha1",
    kind = "TrafficManagerProfile",
    plural = "trafficmanagerprofiles",
    namespaced
)]
#[kube(status = "TrafficManagerProfileStatus")]
pub struct TrafficManagerProfileSpec {
    pub resource_group: String,
    pub monitor_config: MonitorConfig,
}

#[derive(Deserialize, Serialize, Clone, Debug, JsonSchema, PartialEq)]
pub struct MonitorConfig {
    #[serde(default = "default_interval_seconds")]
    pub interval_seconds: i64,
    pub path: String,
    pub port: i32,
    pub protocol: String,
    #[serde(default = "default_timeout_seconds")]
    pub timeout_seconds: i64,
    #[serde(default = "default_tolerated_failures")]
    pub tolerated_number_of_failures: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub custom_headers: Option<Vec<CustomHeader>>,
}

fn default_interval_seconds() -> i64 {
    30
}
fn default_timeout_seconds() -> i64 {
    10
}
fn default_tolerated_failures() -> i64 {
    3
}

#[derive(Deserialize, Serialize, Clone, Debug, JsonSchema, PartialEq, Eq)]
pub struct CustomHeader {
    pub name: String,
    pub value: String,
}

#[derive(Deserialize, Serialize, Clone, Debug, Default, JsonSchema, PartialEq)]
pub struct TrafficManagerProfileStatus {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dns_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource_id: Option<String>,
    #[serde(default)]
    pub conditions: Vec<Condition>,
}
