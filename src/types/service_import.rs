use std::collections::BTreeMap;

use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// User-created request to consume a fleet Service, and (as a hub
/// projection) the record `EndpointSliceExport` reconciles against. See
/// spec.md §3 "ServiceImport" and §4.3.
#[derive(CustomResource, Deserialize, Serialize, Clone, Debug, JsonSchema)]
#[kube(
    group = "networking.fleet.azure.com",
    version = "v1alpha1",
    kind = "ServiceImport",
    plural = "serviceimports",
    namespaced
)]
#[kube(status = "ServiceImportStatus")]
pub struct ServiceImportSpec {
    #[serde(default)]
    pub ports: Vec<super::InternalServicePort>,
}

#[derive(Deserialize, Serialize, Clone, Debug, Default, JsonSchema, PartialEq)]
pub struct ServiceImportStatus {
    /// Which clusters back this import. Empty means "unfulfilled" per
    /// spec.md §4.3 step 5.
    #[serde(default)]
    pub clusters: Vec<ClusterStatus>,
}

#[derive(Deserialize, Serialize, Clone, Debug, JsonSchema, PartialEq, Eq)]
pub struct ClusterStatus {
    pub cluster: String,
}

/// Decoded form of the `networking.fleet.azure.com/service-in-use-by`
/// annotation: consumer cluster namespace -> consumer cluster ID.
pub type ServiceInUseBy = BTreeMap<String, String>;
