//! Finalizer constants and generic attach/remove helpers (spec.md §9
//! "Finalizer ordering as a commit protocol"). Each reconciler is
//! responsible for calling these in the right order relative to its
//! dependent-record writes; this module only provides the primitive, not
//! the ordering.

/// Attached to `ServiceExport` once an export attempt begins (spec.md §4.2
/// step 6); removed by `unexport` (spec.md §4.2.2) only after the hub
/// `InternalServiceExport` delete has succeeded.
pub const SERVICE_EXPORT_CLEANUP: &str = "networking.fleet.azure.com/service-export-cleanup";

/// Attached to `EndpointSliceExport` before the first `EndpointSliceImport`
/// fan-out write (spec.md §4.3 step 3).
pub const ENDPOINT_SLICE_EXPORT_CLEANUP: &str = "networking.fleet.azure.com/endpointslice-export-cleanup";

/// Always attached first, removed last on `TrafficManagerProfile`; its sole
/// role is guaranteeing the metric gauge series is cleaned up exactly once
/// (spec.md §4.4 "Dual-finalizer scheme").
pub const TRAFFIC_MANAGER_METRICS: &str = "networking.fleet.azure.com/traffic-manager-metrics-cleanup";

/// Attached only after a successful cloud create attempt is *about to be
/// made* (spec.md §4.4): this avoids a deletion deadlock when the cloud
/// call can itself fail with a permanent (403) error.
pub const TRAFFIC_MANAGER_PROFILE_CLEANUP: &str = "networking.fleet.azure.com/traffic-manager-profile-cleanup";

/// Returns true if `finalizers` contains `name`.
pub fn has(finalizers: &[String], name: &str) -> bool {
    finalizers.iter().any(|f| f == name)
}

/// Returns a finalizer list with `name` appended if absent; `None` if
/// already present (no write needed).
pub fn with_added(finalizers: &[String], name: &str) -> Option<Vec<String>> {
    if has(finalizers, name) {
        return None;
    }
    let mut next = finalizers.to_vec();
    next.push(name.to_string());
    Some(next)
}

/// Returns a finalizer list with `name` removed if present; `None` if
/// already absent (no write needed).
pub fn with_removed(finalizers: &[String], name: &str) -> Option<Vec<String>> {
    if !has(finalizers, name) {
        return None;
    }
    Some(finalizers.iter().filter(|f| *f != name).cloned().collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn with_added_is_noop_when_present() {
        let finalizers = vec![SERVICE_EXPORT_CLEANUP.to_string()];
        assert!(with_added(&finalizers, SERVICE_EXPORT_CLEANUP).is_none());
    }

    #[test]
    fn with_added_appends_when_absent() {
        let finalizers: Vec<String> = vec![];
        let next = with_added(&finalizers, SERVICE_EXPORT_CLEANUP).unwrap();
        assert_eq!(next, vec![SERVICE_EXPORT_CLEANUP.to_string()]);
    }

    #[test]
    fn with_removed_preserves_others() {
        let finalizers = vec![
            TRAFFIC_MANAGER_METRICS.to_string(),
            TRAFFIC_MANAGER_PROFILE_CLEANUP.to_string(),
        ];
        let next = with_removed(&finalizers, TRAFFIC_MANAGER_PROFILE_CLEANUP).unwrap();
        assert_eq!(next, vec![TRAFFIC_MANAGER_METRICS.to_string()]);
    }
}
