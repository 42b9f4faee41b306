//! CRD manifest generation. Every resource kind in `spec.md` §3 that is a
//! custom resource (the built-in `Service` and `EndpointSlice` aren't)
//! derives `kube::CustomResource` and so implements `CustomResourceExt`,
//! the same mechanism the teacher's `print_crd_without_formats` used for
//! its single `RustOperator` kind; generalized here to print the whole
//! fleet-networking CRD set so either binary can be pointed at a
//! manifests directory during cluster setup.

use kube::CustomResourceExt;

use crate::types::{
    EndpointSliceExport, EndpointSliceImport, InternalServiceExport, ServiceExport, ServiceImport,
    TrafficManagerProfile,
};

/// Emits every fleet-networking CRD as a multi-document YAML stream with
/// schemars `format` annotations stripped (some validating webhooks and
/// OLM bundles choke on them — same rationale as the teacher's helper).
pub fn print_crds() -> anyhow::Result<()> {
    let crds = [
        serde_json::to_value(ServiceExport::crd())?,
        serde_json::to_value(ServiceImport::crd())?,
        serde_json::to_value(InternalServiceExport::crd())?,
        serde_json::to_value(EndpointSliceExport::crd())?,
        serde_json::to_value(EndpointSliceImport::crd())?,
        serde_json::to_value(TrafficManagerProfile::crd())?,
    ];
    for mut crd in crds {
        strip_format_keys(&mut crd);
        println!("---");
        println!("{}", serde_yaml::to_string(&crd)?);
    }
    Ok(())
}

fn strip_format_keys(v: &mut serde_json::Value) {
    use serde_json::Value::*;
    match v {
        Object(map) => {
            map.remove("format");
            for val in map.values_mut() {
                strip_format_keys(val);
            }
        }
        Array(arr) => {
            for val in arr {
                strip_format_keys(val);
            }
        }
        _ => {}
    }
}
