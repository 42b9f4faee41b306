//! `TrafficManagerProfile` reconciler (C6, spec.md §4.4). The hardest
//! component: couples an internal CRD lifecycle to an external cloud
//! resource with narrow mutable-field semantics, partial failures,
//! throttling, and a globally-unique DNS name.

use std::{collections::BTreeMap, sync::Arc, time::Duration};

use kube::{
    api::{Patch, PatchParams},
    runtime::controller::Action,
    Api, Resource, ResourceExt,
};
use thiserror::Error;
use tracing::info;

use crate::{
    cloud::{self, DnsConfig, Profile, ProfileProperties, ProfileStatus},
    conditions::{self, programmed, TYPE_PROGRAMMED},
    context::TrafficManagerProfileContext,
    finalizers::{self, TRAFFIC_MANAGER_METRICS, TRAFFIC_MANAGER_PROFILE_CLEANUP},
    types::TrafficManagerProfile,
};

/// spec.md §4.4 "Desired state": "DNS TTL defaulting to 60 s".
const DEFAULT_DNS_TTL_SECONDS: i64 = 60;
/// Cloud-side tag key under which the `"{namespace}/{name}"` managed-tag
/// value (spec.md §4.4) is stamped.
const MANAGED_TAG_KEY: &str = "networking.fleet.azure.com/managed-by";
const ROUTING_METHOD_WEIGHTED: &str = "Weighted";

#[derive(Debug, Error)]
pub enum Error {
    #[error("hub store request failed: {0}")]
    Hub(#[source] kube::Error),
    #[error("cloud traffic manager request failed: {0}")]
    Cloud(#[source] cloud::Error),
}

#[tracing::instrument(skip(obj, ctx), fields(namespace = %obj.namespace().unwrap_or_default(), name = %obj.name_any()), level = "debug")]
pub async fn reconcile(obj: Arc<TrafficManagerProfile>, ctx: Arc<TrafficManagerProfileContext>) -> Result<Action, Error> {
    let ns = obj.namespace().unwrap_or_default();
    let name = obj.name_any();
    let api: Api<TrafficManagerProfile> = Api::namespaced(ctx.hub_client.clone(), &ns);

    if obj.meta().deletion_timestamp.is_some() {
        return delete_path(&api, &obj, &ctx).await;
    }

    // Step 2: metrics finalizer attached first, before any cloud call.
    if let Some(next) = finalizers::with_added(obj.finalizers(), TRAFFIC_MANAGER_METRICS) {
        patch_finalizers(&api, &name, next).await?;
    }

    // Steps 3-4: desired state, defaults filled in.
    let desired = desired_cloud_profile(&ns, &name, &obj);
    let generation = obj.meta().generation;

    // Step 5: fetch current cloud state.
    let remote = match ctx.cloud.get(&obj.spec.resource_group, &name).await {
        Ok(remote) => remote,
        Err(err) if err.is_forbidden() => {
            write_status(&api, &ctx, &ns, &name, generation, "False", programmed::INVALID, "resource group forbidden").await?;
            return Ok(Action::await_change());
        }
        Err(err) if err.is_not_found() => None,
        Err(err) => return Err(Error::Cloud(err)),
    };

    if let Some(remote) = &remote {
        if profiles_match(remote, &desired) {
            if let Some(next) = finalizers::with_added(obj.finalizers(), TRAFFIC_MANAGER_PROFILE_CLEANUP) {
                patch_finalizers(&api, &name, next).await?;
            }
            write_programmed_success(&api, &ctx, &obj, &ns, &name, generation, remote).await?;
            return Ok(Action::requeue(Duration::from_secs(60)));
        }
    }

    // Step 6: merge (if a remote exists and diverges) and call create-or-update.
    let request = merge_profile(remote.as_ref(), &desired);
    match ctx.cloud.create_or_update(&obj.spec.resource_group, &name, &request).await {
        Ok(response) => {
            // Profile finalizer is attached only now that create/update has
            // actually succeeded (spec.md §9 "Dual finalizers").
            if let Some(next) = finalizers::with_added(obj.finalizers(), TRAFFIC_MANAGER_PROFILE_CLEANUP) {
                patch_finalizers(&api, &name, next).await?;
            }
            write_programmed_success(&api, &ctx, &obj, &ns, &name, generation, &response).await?;
            info!("traffic manager profile programmed");
            Ok(Action::requeue(Duration::from_secs(60)))
        }
        Err(err) if err.is_conflict() => {
            write_status(&api, &ctx, &ns, &name, generation, "False", programmed::DNS_NAME_NOT_AVAILABLE, "DNS relative name already in use").await?;
            Ok(Action::await_change())
        }
        Err(err) if err.is_forbidden() || err.is_client_error() => {
            write_status(&api, &ctx, &ns, &name, generation, "False", programmed::INVALID, "cloud rejected the profile request").await?;
            Ok(Action::await_change())
        }
        Err(err) if err.is_throttled_or_unavailable() => {
            write_status(&api, &ctx, &ns, &name, generation, "Unknown", programmed::PENDING, "cloud request throttled or unavailable").await?;
            Ok(Action::requeue(Duration::from_secs(30)))
        }
        Err(err) => Err(Error::Cloud(err)),
    }
}

pub fn error_policy(_obj: Arc<TrafficManagerProfile>, err: &Error, _ctx: Arc<TrafficManagerProfileContext>) -> Action {
    tracing::error!(error = %err, "TrafficManagerProfile reconcile failed");
    Action::requeue(Duration::from_secs(20))
}

/// spec.md §4.4 "Delete path".
async fn delete_path(
    api: &Api<TrafficManagerProfile>,
    obj: &TrafficManagerProfile,
    ctx: &TrafficManagerProfileContext,
) -> Result<Action, Error> {
    let ns = obj.namespace().unwrap_or_default();
    let name = obj.name_any();
    let mut next = obj.finalizers().to_vec();
    let mut changed = false;

    if finalizers::has(&next, TRAFFIC_MANAGER_METRICS) {
        ctx.metrics.clear_profile_series(&ns, &name);
        next.retain(|f| f != TRAFFIC_MANAGER_METRICS);
        changed = true;
    }

    if finalizers::has(&next, TRAFFIC_MANAGER_PROFILE_CLEANUP) {
        match ctx.cloud.delete(&obj.spec.resource_group, &name).await {
            Ok(()) => {}
            Err(err) if err.is_not_found() => {}
            Err(err) => return Err(Error::Cloud(err)),
        }
        next.retain(|f| f != TRAFFIC_MANAGER_PROFILE_CLEANUP);
        changed = true;
    }

    if changed {
        patch_finalizers(api, &name, next).await?;
    }
    Ok(Action::await_change())
}

async fn patch_finalizers(api: &Api<TrafficManagerProfile>, name: &str, finalizers: Vec<String>) -> Result<(), Error> {
    let patch = serde_json::json!({ "metadata": { "finalizers": finalizers } });
    api.patch(name, &PatchParams::default(), &Patch::Merge(&patch)).await.map(|_| ()).map_err(Error::Hub)
}

async fn write_programmed_success(
    api: &Api<TrafficManagerProfile>,
    ctx: &TrafficManagerProfileContext,
    obj: &TrafficManagerProfile,
    ns: &str,
    name: &str,
    generation: Option<i64>,
    response: &Profile,
) -> Result<(), Error> {
    let condition = conditions::make(TYPE_PROGRAMMED, true, programmed::PROGRAMMED, "profile programmed successfully".to_string(), generation);
    let existing = obj
        .status
        .as_ref()
        .and_then(|s| conditions::find(&s.conditions, TYPE_PROGRAMMED));
    // spec.md §8 idempotence: a steady-state reconcile that observes no
    // transition must not patch status or advance the metric's last-
    // transition sample (spec.md §6 "sample value = unix seconds at last
    // transition").
    if existing.is_some_and(|existing| conditions::core_eq(existing, &condition)) {
        return Ok(());
    }
    let patch = serde_json::json!({
        "status": {
            "dns_name": response.properties.dns_config.fqdn,
            "resource_id": response.properties.resource_id,
            "conditions": [condition],
        }
    });
    api.patch_status(name, &PatchParams::default(), &Patch::Merge(&patch)).await.map_err(Error::Hub)?;
    ctx.metrics.record_profile_condition(ns, name, generation.unwrap_or(0), "True", programmed::PROGRAMMED);
    Ok(())
}

async fn write_status(
    api: &Api<TrafficManagerProfile>,
    ctx: &TrafficManagerProfileContext,
    ns: &str,
    name: &str,
    generation: Option<i64>,
    status: &str,
    reason: &str,
    message: &str,
) -> Result<(), Error> {
    let condition = match status {
        "True" => conditions::make(TYPE_PROGRAMMED, true, reason, message.to_string(), generation),
        "False" => conditions::make(TYPE_PROGRAMMED, false, reason, message.to_string(), generation),
        _ => conditions::make_unknown(TYPE_PROGRAMMED, reason, message.to_string(), generation),
    };
    let patch = serde_json::json!({ "status": { "conditions": [condition] } });
    api.patch_status(name, &PatchParams::default(), &Patch::Merge(&patch)).await.map_err(Error::Hub)?;
    ctx.metrics.record_profile_condition(ns, name, generation.unwrap_or(0), status, reason);
    Ok(())
}

/// spec.md §4.4 "Desired state".
fn desired_cloud_profile(ns: &str, name: &str, profile: &TrafficManagerProfile) -> Profile {
    let mut tags = BTreeMap::new();
    tags.insert(MANAGED_TAG_KEY.to_string(), format!("{ns}/{name}"));
    Profile {
        name: name.to_string(),
        location: "global".to_string(),
        properties: ProfileProperties {
            dns_config: DnsConfig {
                relative_name: format!("{ns}-{name}"),
                ttl: DEFAULT_DNS_TTL_SECONDS,
                fqdn: None,
            },
            monitor_config: (&profile.spec.monitor_config).into(),
            profile_status: ProfileStatus::Enabled,
            traffic_routing_method: ROUTING_METHOD_WEIGHTED.to_string(),
            endpoints: vec![],
            max_return: None,
            resource_id: None,
        },
        tags,
    }
}

/// spec.md §4.4 step 4 "field-restricted semantic equality": only monitor
/// config, status, routing method, DNS TTL, and managed-tag
/// presence/value are compared. Everything else the cloud injects (ID,
/// endpoints, foreign tags, MaxReturn, FQDN) is ignored.
pub fn profiles_match(remote: &Profile, desired: &Profile) -> bool {
    remote.properties.monitor_config == desired.properties.monitor_config
        && remote.properties.profile_status == desired.properties.profile_status
        && remote.properties.traffic_routing_method == desired.properties.traffic_routing_method
        && remote.properties.dns_config.ttl == desired.properties.dns_config.ttl
        && remote.tags.get(MANAGED_TAG_KEY) == desired.tags.get(MANAGED_TAG_KEY)
}

/// spec.md §4.4 step 6 "Merge": take the remote object and overwrite only
/// the managed fields; foreign tags and endpoints are preserved verbatim.
pub fn merge_profile(remote: Option<&Profile>, desired: &Profile) -> Profile {
    let Some(remote) = remote else {
        return desired.clone();
    };
    let mut merged = remote.clone();
    merged.properties.monitor_config = desired.properties.monitor_config.clone();
    merged.properties.profile_status = desired.properties.profile_status;
    merged.properties.traffic_routing_method = desired.properties.traffic_routing_method.clone();
    merged.properties.dns_config.ttl = desired.properties.dns_config.ttl;
    if let Some(value) = desired.tags.get(MANAGED_TAG_KEY) {
        merged.tags.insert(MANAGED_TAG_KEY.to_string(), value.clone());
    }
    merged
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cloud::MonitorConfig as CloudMonitorConfig;

    fn sample(tags: &[(&str, &str)], endpoints: Vec<serde_json::Value>) -> Profile {
        Profile {
            name: "prof-a".to_string(),
            location: "global".to_string(),
            properties: ProfileProperties {
                dns_config: DnsConfig {
                    relative_name: "ns-prof-a".to_string(),
                    ttl: 60,
                    fqdn: Some("ns-prof-a.trafficmanager.net".to_string()),
                },
                monitor_config: CloudMonitorConfig {
                    interval_in_seconds: 30,
                    path: "/healthz".to_string(),
                    port: 80,
                    protocol: "HTTP".to_string(),
                    timeout_in_seconds: 10,
                    tolerated_number_of_failures: 3,
                    custom_headers: None,
                },
                profile_status: ProfileStatus::Enabled,
                traffic_routing_method: "Weighted".to_string(),
                endpoints,
                max_return: None,
                resource_id: Some("/subscriptions/x/.../prof-a".to_string()),
            },
            tags: tags.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect(),
        }
    }

    #[test]
    fn equal_profiles_match_ignoring_foreign_tags_and_endpoints() {
        let desired = sample(&[(MANAGED_TAG_KEY, "ns/prof-a")], vec![]);
        let remote = sample(
            &[(MANAGED_TAG_KEY, "ns/prof-a"), ("foreign", "x")],
            vec![serde_json::json!({"target": "member-a.example.com"})],
        );
        assert!(profiles_match(&remote, &desired));
    }

    #[test]
    fn differing_monitor_config_does_not_match() {
        let desired = sample(&[(MANAGED_TAG_KEY, "ns/prof-a")], vec![]);
        let mut remote = sample(&[(MANAGED_TAG_KEY, "ns/prof-a")], vec![]);
        remote.properties.monitor_config.port = 8080;
        assert!(!profiles_match(&remote, &desired));
    }

    #[test]
    fn merge_preserves_foreign_tags_and_endpoints() {
        let desired = sample(&[(MANAGED_TAG_KEY, "ns/prof-a")], vec![]);
        let remote = sample(
            &[(MANAGED_TAG_KEY, "stale"), ("foreign", "x")],
            vec![serde_json::json!({"target": "member-a.example.com"})],
        );
        let merged = merge_profile(Some(&remote), &desired);
        assert_eq!(merged.tags.get("foreign"), Some(&"x".to_string()));
        assert_eq!(merged.tags.get(MANAGED_TAG_KEY), Some(&"ns/prof-a".to_string()));
        assert_eq!(merged.properties.endpoints.len(), 1);
        assert_eq!(merged.properties.resource_id, remote.properties.resource_id);
    }

    #[test]
    fn merge_with_no_remote_returns_desired_verbatim() {
        let desired = sample(&[(MANAGED_TAG_KEY, "ns/prof-a")], vec![]);
        let merged = merge_profile(None, &desired);
        assert_eq!(merged, desired);
    }
}
