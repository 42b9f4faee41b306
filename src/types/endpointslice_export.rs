use chrono::{DateTime, Utc};
use k8s_openapi::api::discovery::v1::{Endpoint, EndpointPort};
use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Hub copy of a member's `EndpointSlice`, owned by a `ServiceImport`. See
/// spec.md §3 "EndpointSliceExport (hub store)" and §4.3.
#[derive(CustomResource, Deserialize, Serialize, Clone, Debug, JsonSchema)]
#[kube(
    group = "networking.fleet.azure.com",
    version = "v1alpha1",
    kind = "EndpointSliceExport",
    plural = "endpointsliceexports",
    namespaced
)]
pub struct EndpointSliceExportSpec {
    pub address_type: String,
    #[serde(default)]
    pub endpoints: Vec<Endpoint>,
    #[serde(default)]
    pub ports: Vec<EndpointPort>,

    /// The `ServiceImport` this slice belongs to, in the hub store.
    pub owner_service_namespace: String,
    pub owner_service_name: String,

    /// When this slice was first exported; seeds metric collection on the
    /// hub (spec.md §4.2 step 8).
    pub exported_since: DateTime<Utc>,
}
