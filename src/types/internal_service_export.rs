use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Hub mirror of an exported `Service`. Named `"{member-namespace}-{name}"`
/// and placed in the hub namespace reserved for the exporting member. See
/// spec.md §3 "InternalServiceExport (hub store)" and §4.2.9.
#[derive(CustomResource, Deserialize, Serialize, Clone, Debug, JsonSchema, PartialEq)]
#[kube(
    group = "networking.fleet.azure.com",
    version = "v1alpha1",
    kind = "InternalServiceExport",
    plural = "internalserviceexports",
    namespaced
)]
pub struct InternalServiceExportSpec {
    /// UID of the source `Service` this record mirrors. A mismatch against
    /// the current source UID signals stale state (spec.md §3 invariants).
    pub service_uid: String,
    pub service_type: String,
    pub ports: Vec<InternalServicePort>,

    /// Populated only when the source `Service` is type `LoadBalancer`
    /// (spec.md §4.2.1).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_internal_load_balancer: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub public_ip_resource_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_dns_label_configured: Option<bool>,
}

#[derive(Deserialize, Serialize, Clone, Debug, JsonSchema, PartialEq, Eq)]
pub struct InternalServicePort {
    pub name: Option<String>,
    pub protocol: String,
    pub port: i32,
}
