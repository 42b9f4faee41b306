//! Per-controller `Context`, threaded through `kube::runtime::Controller`
//! exactly as the teacher does (`Arc<Ctx>` passed to `.run(reconcile,
//! error_policy, ctx)`), generalized per reconciler for the collaborators
//! each one needs.

use std::sync::Arc;

use kube::{runtime::events::Recorder, Client};

use crate::metrics::Metrics;

/// Context for the member-side `ServiceExport` reconciler (C3): needs both
/// the member client (to read/patch `ServiceExport`/`Service`) and the hub
/// client (to mirror into `InternalServiceExport`), plus the member's hub
/// namespace and cluster-wide feature toggles.
#[derive(Clone)]
pub struct ServiceExportContext {
    pub member_client: Client,
    pub hub_client: Client,
    pub hub_namespace: String,
    pub recorder: Recorder,
    pub traffic_manager_enabled: bool,
    /// Public-IP lookup client used by spec.md §4.2.1's cloud-fields step.
    /// `None` when `traffic_manager_enabled` is false.
    pub public_ip_client: Option<Arc<dyn crate::cloud::PublicIpClient>>,
    /// Fallback resource group for public-IP discovery when the Service
    /// carries no `azure-load-balancer-resource-group` annotation override.
    pub default_resource_group: String,
}

/// Context for the hub-side `EndpointSliceExport` reconciler (C5).
#[derive(Clone)]
pub struct EndpointSliceExportContext {
    pub hub_client: Client,
    pub recorder: Recorder,
    /// Namespace holding the hub-local reference `EndpointSlice` copies
    /// (spec.md §4.3 step 4), e.g. `fleet-system`.
    pub fleet_system_namespace: String,
}

/// Context for the hub-side `TrafficManagerProfile` reconciler (C6).
#[derive(Clone)]
pub struct TrafficManagerProfileContext {
    pub hub_client: Client,
    pub recorder: Recorder,
    pub metrics: Arc<Metrics>,
    pub cloud: Arc<dyn crate::cloud::TrafficManagerClient>,
}

/// Context for the hub-side `InternalServiceImport` reconciler (C4).
#[derive(Clone)]
pub struct InternalServiceImportContext {
    pub hub_client: Client,
    pub member_client: Client,
    pub recorder: Recorder,
}
