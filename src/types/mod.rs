//! CRD types shared by the hub and member reconcilers.
//!
//! Each submodule owns one resource kind from `spec.md` §3. Conditions use
//! the standard `k8s_openapi::apimachinery::pkg::apis::meta::v1::Condition`
//! rather than a hand-rolled struct, since its `(type_, status, reason,
//! observed_generation)` fields line up exactly with the equality rule in
//! §4.6.

mod endpointslice_export;
mod endpointslice_import;
mod internal_service_export;
mod service_export;
mod service_import;
mod traffic_manager_profile;

pub use endpointslice_export::{EndpointSliceExport, EndpointSliceExportSpec};
pub use endpointslice_import::{EndpointSliceImport, EndpointSliceImportSpec};
pub use internal_service_export::{
    InternalServiceExport, InternalServiceExportSpec, InternalServicePort,
};
pub use service_export::{ServiceExport, ServiceExportStatus};
pub use service_import::{
    ClusterStatus, ServiceImport, ServiceImportSpec, ServiceImportStatus, ServiceInUseBy,
};
pub use traffic_manager_profile::{
    MonitorConfig, TrafficManagerProfile, TrafficManagerProfileSpec, TrafficManagerProfileStatus,
};

/// Shared group for every fleet-networking CRD, matching the annotation
/// namespace used throughout spec.md §6.
pub const GROUP: &str = "networking.fleet.azure.com";
pub const VERSION: &str = "v1alpha1";

/// `networking.fleet.azure.com/service-in-use-by` — recognized on
/// `ServiceImport`.
pub const ANNOTATION_SERVICE_IN_USE_BY: &str = "networking.fleet.azure.com/service-in-use-by";
/// Metric-seeding annotations on `ServiceExport`.
pub const ANNOTATION_LAST_SEEN_RESOURCE_VERSION: &str = "last-seen-resource-version";
pub const ANNOTATION_LAST_SEEN_TIMESTAMP: &str = "last-seen-timestamp";
/// Weight annotation on `ServiceExport`, integer in `[0, 1000]`.
pub const ANNOTATION_WEIGHT: &str = "networking.fleet.azure.com/weight";

/// Vendor annotations recognized on the source `Service` (builtin type).
pub const ANNOTATION_AZURE_LB_INTERNAL: &str = "service.beta.kubernetes.io/azure-load-balancer-internal";
pub const ANNOTATION_AZURE_LB_RESOURCE_GROUP: &str =
    "service.beta.kubernetes.io/azure-load-balancer-resource-group";
pub const ANNOTATION_AZURE_DNS_LABEL_NAME: &str = "service.beta.kubernetes.io/azure-dns-label-name";

/// Computes the hub `InternalServiceExport`/`EndpointSliceImport` name from
/// a member namespace and a local resource name: `"{namespace}-{name}"`.
pub fn hub_name(namespace: &str, name: &str) -> String {
    format!("{namespace}-{name}")
}
