//! Control plane for multi-cluster service networking across a Kubernetes
//! fleet: service export/import reconciliation, endpoint-slice fan-out,
//! and optional Azure Traffic Manager DNS programming. See `SPEC_FULL.md`
//! for the full component breakdown; each module below names the spec
//! section and component it implements.

pub mod cloud;
pub mod conditions;
pub mod context;
pub mod crd;
pub mod events;
pub mod finalizers;
pub mod metrics;
pub mod metrics_server;
pub mod reconcile;
pub mod retry;
pub mod store;
pub mod types;
