use k8s_openapi::api::discovery::v1::{Endpoint, EndpointPort};
use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// One per (consuming member, exporting `EndpointSliceExport`), placed in
/// the consuming member's hub namespace, named identically to the source
/// export. Spec is a deep copy of the export spec. See spec.md §3 and §4.3.
#[derive(CustomResource, Deserialize, Serialize, Clone, Debug, JsonSchema, PartialEq)]
#[kube(
    group = "networking.fleet.azure.com",
    version = "v1alpha1",
    kind = "EndpointSliceImport",
    plural = "endpointsliceimports",
    namespaced
)]
pub struct EndpointSliceImportSpec {
    pub address_type: String,
    #[serde(default)]
    pub endpoints: Vec<Endpoint>,
    #[serde(default)]
    pub ports: Vec<EndpointPort>,

    pub owner_service_namespace: String,
    pub owner_service_name: String,
}

impl From<&super::EndpointSliceExportSpec> for EndpointSliceImportSpec {
    fn from(src: &super::EndpointSliceExportSpec) -> Self {
        Self {
            address_type: src.address_type.clone(),
            endpoints: src.endpoints.clone(),
            ports: src.ports.clone(),
            owner_service_namespace: src.owner_service_namespace.clone(),
            owner_service_name: src.owner_service_name.clone(),
        }
    }
}
