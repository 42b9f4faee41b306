//! Structured observability of reconciliation outcomes (C8, spec.md §6
//! "Metrics"). One gauge per profile-status timeseries, sample value = unix
//! seconds at last transition, labels `(namespace, name, generation,
//! condition, status, reason)`.

use std::{
    collections::{HashMap, HashSet},
    sync::Mutex,
};

use prometheus::{opts, register_gauge_vec, GaugeVec, Registry};

/// Reason strings a `Programmed` condition can carry (spec.md §4.4 step 7),
/// enumerated so [`Metrics::clear_profile_series`] can clear every
/// combination a deleted profile might have left behind — the `prometheus`
/// crate has no `DeletePartialMatch` primitive, unlike the client library
/// spec.md §5 assumes, so this crate tracks the label combinations it has
/// actually set and removes exactly those.
const PROGRAMMED_REASONS: &[&str] = &[
    crate::conditions::programmed::PROGRAMMED,
    crate::conditions::programmed::DNS_NAME_NOT_AVAILABLE,
    crate::conditions::programmed::INVALID,
    crate::conditions::programmed::PENDING,
];
const STATUSES: &[&str] = &["True", "False", "Unknown"];

pub struct Metrics {
    registry: Registry,
    profile_programmed: GaugeVec,
    /// (namespace, name) -> generations observed, so `clear_profile_series`
    /// can remove exactly the series this process set rather than guessing.
    observed_generations: Mutex<HashMap<(String, String), HashSet<i64>>>,
}

impl Metrics {
    pub fn new() -> Self {
        let registry = Registry::new();
        let profile_programmed = register_gauge_vec!(
            opts!(
                "fleet_traffic_manager_profile_condition_timestamp_seconds",
                "Unix seconds at the last observed transition of a TrafficManagerProfile condition"
            ),
            &["namespace", "name", "generation", "condition", "status", "reason"]
        )
        .expect("fleet_traffic_manager_profile_condition_timestamp_seconds registered once");
        registry
            .register(Box::new(profile_programmed.clone()))
            .expect("metric registered exactly once");
        Self {
            registry,
            profile_programmed,
            observed_generations: Mutex::new(HashMap::new()),
        }
    }

    /// Renders the registry in Prometheus text exposition format, served by
    /// each binary's `/metrics` endpoint.
    pub fn render(&self) -> String {
        use prometheus::Encoder;
        let encoder = prometheus::TextEncoder::new();
        let mut buffer = Vec::new();
        encoder.encode(&self.registry.gather(), &mut buffer).expect("encode never fails for valid metrics");
        String::from_utf8(buffer).expect("prometheus text encoding is always valid UTF-8")
    }

    /// Records a `Programmed` condition transition (spec.md §4.4 step 7:
    /// "Emit a metric sample ... timestamped with the current time").
    pub fn record_profile_condition(&self, namespace: &str, name: &str, generation: i64, status: &str, reason: &str) {
        let now = chrono::Utc::now().timestamp() as f64;
        self.profile_programmed
            .with_label_values(&[namespace, name, &generation.to_string(), "Programmed", status, reason])
            .set(now);
        self.observed_generations
            .lock()
            .unwrap()
            .entry((namespace.to_string(), name.to_string()))
            .or_default()
            .insert(generation);
    }

    /// Removes every label combination this process has recorded for
    /// `(namespace, name)`, across all observed generations. Called when
    /// the metrics finalizer is removed on delete (spec.md §4.4 "Delete
    /// path"), the closest `prometheus`-crate equivalent of
    /// `DeletePartialMatch`.
    pub fn clear_profile_series(&self, namespace: &str, name: &str) {
        let generations = self
            .observed_generations
            .lock()
            .unwrap()
            .remove(&(namespace.to_string(), name.to_string()))
            .unwrap_or_default();
        for generation in generations {
            let generation = generation.to_string();
            for status in STATUSES {
                for reason in PROGRAMMED_REASONS {
                    let _ = self
                        .profile_programmed
                        .remove_label_values(&[namespace, name, &generation, "Programmed", status, reason]);
                }
            }
        }
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_then_render_contains_labels() {
        let metrics = Metrics::new();
        metrics.record_profile_condition("ns", "prof-a", 1, "True", "Programmed");
        let rendered = metrics.render();
        assert!(rendered.contains("namespace=\"ns\""));
        assert!(rendered.contains("reason=\"Programmed\""));
    }

    #[test]
    fn clear_removes_observed_generation_series() {
        let metrics = Metrics::new();
        metrics.record_profile_condition("ns", "prof-a", 1, "True", "Programmed");
        metrics.clear_profile_series("ns", "prof-a");
        let rendered = metrics.render();
        assert!(!rendered.contains("prof-a"));
    }
}
