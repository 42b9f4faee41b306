//! The reconcilers proper (spec.md §4): one module per resource kind, each
//! wired to `kube::runtime::Controller` exactly as the teacher wires
//! `RustOperator` in its `controller.rs` — `Controller::new(..).owns(..)
//! .run(reconcile, error_policy, ctx)` — generalized to the kinds and
//! cross-cluster store split spec.md's Component Design calls for.
//!
//! Each module keeps its decision logic (eligibility checks, diffing,
//! annotation parsing, field-restricted equality) factored into plain
//! functions so it can be unit-tested without a live API server, per
//! SPEC_FULL.md §10.4.

pub mod endpointslice_export;
pub mod internal_service_import;
pub mod service_export;
pub mod traffic_manager_profile;
