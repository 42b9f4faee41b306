use k8s_openapi::apimachinery::pkg::apis::meta::v1::Condition;
use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// User-created marker declaring that a local `Service` should be exported
/// to the fleet. See spec.md §3 "ServiceExport (member store)" and §4.2.
#[derive(CustomResource, Deserialize, Serialize, Clone, Debug, JsonSchema)]
#[kube(
    group = "networking.fleet.azure.com",
    version = "v1alpha1",
    kind = "ServiceExport",
    plural = "serviceexports",
    namespaced
)]
#[kube(status = "ServiceExportStatus")]
pub struct ServiceExportSpec {}

/// Carries the `Valid` and `Conflict` condition pair from spec.md §3.
#[derive(Deserialize, Serialize, Clone, Debug, Default, JsonSchema, PartialEq)]
pub struct ServiceExportStatus {
    #[serde(default)]
    pub conditions: Vec<Condition>,
}
