//! `ServiceExport` reconciler (C3, spec.md §4.2). Runs in the member
//! cluster; watches `ServiceExport` and the sibling built-in `Service`
//! (same key), and mirrors eligible, valid exports into the hub as
//! `InternalServiceExport`.

use std::{collections::BTreeMap, sync::Arc, time::Duration};

use chrono::{DateTime, Utc};
use k8s_openapi::api::core::v1::Service;
use kube::{
    api::{Patch, PatchParams},
    runtime::controller::Action,
    Api, Resource, ResourceExt,
};
use thiserror::Error;
use tracing::{info, warn};

use crate::{
    conditions::{self, conflict, valid, TYPE_CONFLICT, TYPE_VALID},
    context::ServiceExportContext,
    events,
    finalizers::{self, SERVICE_EXPORT_CLEANUP},
    types::{
        hub_name, InternalServiceExport, InternalServiceExportSpec, InternalServicePort,
        ServiceExport, ANNOTATION_AZURE_DNS_LABEL_NAME, ANNOTATION_AZURE_LB_INTERNAL,
        ANNOTATION_AZURE_LB_RESOURCE_GROUP, ANNOTATION_LAST_SEEN_RESOURCE_VERSION,
        ANNOTATION_LAST_SEEN_TIMESTAMP, ANNOTATION_WEIGHT,
    },
};

const FIELD_MANAGER: &str = "fleet-networking-service-export";
const WEIGHT_RANGE: std::ops::RangeInclusive<i32> = 0..=1000;

#[derive(Debug, Error)]
pub enum Error {
    #[error("member store request failed: {0}")]
    Member(#[source] kube::Error),
    #[error("hub store request failed: {0}")]
    Hub(#[source] kube::Error),
    #[error("cloud public IP lookup failed: {0}")]
    Cloud(#[from] crate::cloud::Error),
    /// A DNS label was requested but the cloud profile hasn't applied it
    /// yet (spec.md §4.2.1): surfaced as an error purely to force a
    /// requeue, not a true failure.
    #[error("dns label not yet configured on cloud public IP")]
    DnsLabelPending,
}

#[tracing::instrument(skip(obj, ctx), fields(namespace = %obj.namespace().unwrap_or_default(), name = %obj.name_any()), level = "debug")]
pub async fn reconcile(obj: Arc<ServiceExport>, ctx: Arc<ServiceExportContext>) -> Result<Action, Error> {
    let ns = obj.namespace().unwrap_or_default();
    let name = obj.name_any();

    let export_api: Api<ServiceExport> = Api::namespaced(ctx.member_client.clone(), &ns);
    let svc_api: Api<Service> = Api::namespaced(ctx.member_client.clone(), &ns);
    let hub_api: Api<InternalServiceExport> = Api::namespaced(ctx.hub_client.clone(), &ctx.hub_namespace);

    // Step 2: deletion path.
    if obj.meta().deletion_timestamp.is_some() {
        if finalizers::has(obj.finalizers(), SERVICE_EXPORT_CLEANUP) {
            unexport(&hub_api, &export_api, &ns, &name).await?;
        }
        return Ok(Action::await_change());
    }

    // Step 3: load sibling Service.
    let svc = svc_api.get_opt(&name).await.map_err(Error::Member)?;
    let svc = match svc {
        Some(svc) if svc.meta().deletion_timestamp.is_none() => svc,
        _ => {
            if finalizers::has(obj.finalizers(), SERVICE_EXPORT_CLEANUP) {
                unexport(&hub_api, &export_api, &ns, &name).await?;
            }
            set_valid_condition(
                &export_api,
                &obj,
                false,
                valid::SERVICE_NOT_FOUND,
                "backing Service not found".to_string(),
            )
            .await?;
            events::warning(&ctx.recorder, &*obj, valid::SERVICE_NOT_FOUND, "backing Service not found", "Export").await;
            return Ok(Action::await_change());
        }
    };

    // Step 4: eligibility.
    if !service_is_eligible(&svc) {
        if finalizers::has(obj.finalizers(), SERVICE_EXPORT_CLEANUP) {
            unexport(&hub_api, &export_api, &ns, &name).await?;
        }
        set_valid_condition(
            &export_api,
            &obj,
            false,
            valid::SERVICE_INELIGIBLE,
            "Service is headless or of type ExternalName".to_string(),
        )
        .await?;
        return Ok(Action::await_change());
    }

    // Step 5: weight annotation (traffic-manager feature only).
    if ctx.traffic_manager_enabled {
        match parse_weight(obj.annotations()) {
            Ok(Some(0)) => {
                if finalizers::has(obj.finalizers(), SERVICE_EXPORT_CLEANUP) {
                    unexport(&hub_api, &export_api, &ns, &name).await?;
                }
                set_valid_condition(&export_api, &obj, true, valid::SERVICE_IS_VALID, "exported with 0 weight".to_string()).await?;
                return Ok(Action::requeue(Duration::from_secs(60)));
            }
            Ok(_) => {}
            Err(raw) => {
                set_valid_condition(
                    &export_api,
                    &obj,
                    false,
                    valid::INVALID_WEIGHT,
                    format!("annotation {ANNOTATION_WEIGHT}={raw:?} is not an integer in [0, 1000]"),
                )
                .await?;
                events::warning(&ctx.recorder, &*obj, valid::INVALID_WEIGHT, "weight annotation could not be parsed", "Export").await;
                return Ok(Action::await_change());
            }
        }
    }

    // Step 6: attach cleanup finalizer before any hub write.
    if let Some(next) = finalizers::with_added(obj.finalizers(), SERVICE_EXPORT_CLEANUP) {
        patch_finalizers(&export_api, &name, next).await?;
    }

    // Step 7: Valid/Conflict condition bootstrap.
    let mut status = obj.status.clone().unwrap_or_default();
    let mut changed = conditions::upsert(
        &mut status.conditions,
        conditions::make(TYPE_VALID, true, valid::SERVICE_IS_VALID, "service is eligible for export".to_string(), obj.meta().generation),
    );
    if conditions::find(&status.conditions, TYPE_CONFLICT).is_none() {
        changed |= conditions::upsert(
            &mut status.conditions,
            conditions::make_unknown(TYPE_CONFLICT, conflict::PENDING_CONFLICT_RESOLUTION, "awaiting hub conflict resolution".to_string(), obj.meta().generation),
        );
        events::normal(&ctx.recorder, &*obj, valid::SERVICE_IS_VALID, "service export is valid", "Export").await;
    }
    if changed {
        export_api
            .patch_status(&name, &PatchParams::default(), &Patch::Merge(serde_json::json!({ "status": status })))
            .await
            .map_err(Error::Member)?;
    }

    // Step 8: last-seen bookkeeping; seeds EndpointSliceExport.exportedSince.
    let mut annotations = obj.annotations().clone();
    let current_version = obj.resource_version().unwrap_or_default();
    let exported_since = refresh_last_seen(&mut annotations, &current_version);
    if annotations != *obj.annotations() {
        let patch = serde_json::json!({ "metadata": { "annotations": annotations } });
        export_api
            .patch(&name, &PatchParams::default(), &Patch::Merge(&patch))
            .await
            .map_err(Error::Member)?;
    }
    let _ = exported_since; // consumed by the EndpointSliceExport side, not this reconciler.

    // Steps 4.2.1 + 9: cloud fields, then mirror to hub.
    let cloud_fields = if ctx.traffic_manager_enabled {
        load_balancer_cloud_fields(&ctx, &svc).await?
    } else {
        CloudFields::default()
    };

    let desired = desired_internal_service_export(&svc, &cloud_fields);
    let hub_record_name = hub_name(&ns, &name);

    if let Some(existing) = hub_api.get_opt(&hub_record_name).await.map_err(Error::Hub)? {
        if existing.spec.service_uid != desired.service_uid {
            // spec.md §4.2 step 9: UID mismatch — withdraw stale hub record
            // and requeue for a fresh create on the next pass.
            warn!(hub_name = %hub_record_name, "InternalServiceExport UID mismatch, withdrawing and requeuing");
            unexport(&hub_api, &export_api, &ns, &name).await?;
            return Ok(Action::requeue(Duration::from_secs(1)));
        }
    }

    let mut obj_to_apply = InternalServiceExport::new(&hub_record_name, desired);
    obj_to_apply.metadata.namespace = Some(ctx.hub_namespace.clone());
    hub_api
        .patch(&hub_record_name, &PatchParams::apply(FIELD_MANAGER).force(), &Patch::Apply(&obj_to_apply))
        .await
        .map_err(Error::Hub)?;

    info!(hub_name = %hub_record_name, "mirrored ServiceExport to hub");
    Ok(Action::requeue(Duration::from_secs(60)))
}

pub fn error_policy(_obj: Arc<ServiceExport>, err: &Error, _ctx: Arc<ServiceExportContext>) -> Action {
    tracing::error!(error = %err, "ServiceExport reconcile failed");
    Action::requeue(Duration::from_secs(15))
}

/// spec.md §4.2.2 "Unexport": hub delete must precede finalizer removal.
async fn unexport(
    hub_api: &Api<InternalServiceExport>,
    export_api: &Api<ServiceExport>,
    member_ns: &str,
    name: &str,
) -> Result<(), Error> {
    let hub_record_name = hub_name(member_ns, name);
    match hub_api.delete(&hub_record_name, &Default::default()).await {
        Ok(_) => {}
        Err(kube::Error::Api(e)) if e.code == 404 => {}
        Err(e) => return Err(Error::Hub(e)),
    }
    let current = export_api.get_opt(name).await.map_err(Error::Member)?;
    if let Some(current) = current {
        if let Some(next) = finalizers::with_removed(current.finalizers(), SERVICE_EXPORT_CLEANUP) {
            patch_finalizers(export_api, name, next).await?;
        }
    }
    Ok(())
}

async fn patch_finalizers(api: &Api<ServiceExport>, name: &str, finalizers: Vec<String>) -> Result<(), Error> {
    let patch = serde_json::json!({ "metadata": { "finalizers": finalizers } });
    api.patch(name, &PatchParams::default(), &Patch::Merge(&patch))
        .await
        .map(|_| ())
        .map_err(Error::Member)
}

async fn set_valid_condition(
    api: &Api<ServiceExport>,
    obj: &ServiceExport,
    ok: bool,
    reason: &str,
    message: String,
) -> Result<(), Error> {
    let mut status = obj.status.clone().unwrap_or_default();
    let changed = conditions::upsert(&mut status.conditions, conditions::make(TYPE_VALID, ok, reason, message, obj.meta().generation));
    if changed {
        api.patch_status(&obj.name_any(), &PatchParams::default(), &Patch::Merge(serde_json::json!({ "status": status })))
            .await
            .map_err(Error::Member)?;
    }
    Ok(())
}

/// spec.md §3 invariant: "eligible for export iff type is not
/// `ExternalName` and cluster IP is not the sentinel `None` (headless)".
pub fn service_is_eligible(svc: &Service) -> bool {
    let spec = match &svc.spec {
        Some(spec) => spec,
        None => return false,
    };
    if spec.type_.as_deref() == Some("ExternalName") {
        return false;
    }
    spec.cluster_ip.as_deref() != Some("None")
}

/// spec.md §4.2 step 5: integer weight in `[0, 1000]`. Returns the raw
/// string on parse/range failure so callers can report it verbatim.
pub fn parse_weight(annotations: &BTreeMap<String, String>) -> Result<Option<i32>, String> {
    match annotations.get(ANNOTATION_WEIGHT) {
        None => Ok(None),
        Some(raw) => match raw.parse::<i32>() {
            Ok(n) if WEIGHT_RANGE.contains(&n) => Ok(Some(n)),
            _ => Err(raw.clone()),
        },
    }
}

/// spec.md §4.2 step 8. Returns the `exportedSince` timestamp: either the
/// existing recorded one, or `now` if the recorded state is stale (version
/// mismatch, or a recorded timestamp that is somehow in the future).
pub fn refresh_last_seen(annotations: &mut BTreeMap<String, String>, current_version: &str) -> DateTime<Utc> {
    let recorded_version = annotations.get(ANNOTATION_LAST_SEEN_RESOURCE_VERSION).cloned();
    let recorded_time = annotations
        .get(ANNOTATION_LAST_SEEN_TIMESTAMP)
        .and_then(|t| DateTime::parse_from_rfc3339(t).ok())
        .map(|t| t.with_timezone(&Utc));

    let now = Utc::now();
    let stale = recorded_version.as_deref() != Some(current_version) || matches!(recorded_time, Some(t) if t > now) || recorded_time.is_none();

    if stale {
        annotations.insert(ANNOTATION_LAST_SEEN_RESOURCE_VERSION.to_string(), current_version.to_string());
        annotations.insert(ANNOTATION_LAST_SEEN_TIMESTAMP.to_string(), now.to_rfc3339());
        now
    } else {
        recorded_time.expect("non-stale branch implies recorded_time is Some")
    }
}

#[derive(Default, Clone)]
struct CloudFields {
    is_internal_load_balancer: Option<bool>,
    public_ip_resource_id: Option<String>,
    is_dns_label_configured: Option<bool>,
}

/// spec.md §4.2.1. Populated only for `LoadBalancer` services, and only
/// once an ingress IP is actually assigned — absent that, the fields are
/// left empty and the next Service status change re-triggers this run.
async fn load_balancer_cloud_fields(ctx: &ServiceExportContext, svc: &Service) -> Result<CloudFields, Error> {
    let spec = match &svc.spec {
        Some(spec) => spec,
        None => return Ok(CloudFields::default()),
    };
    if spec.type_.as_deref() != Some("LoadBalancer") {
        return Ok(CloudFields::default());
    }

    let is_internal = svc
        .annotations()
        .get(ANNOTATION_AZURE_LB_INTERNAL)
        .map(|v| v.as_str() == "true")
        .unwrap_or(false);

    if is_internal {
        return Ok(CloudFields {
            is_internal_load_balancer: Some(true),
            public_ip_resource_id: None,
            is_dns_label_configured: None,
        });
    }

    let ingress_ip = svc
        .status
        .as_ref()
        .and_then(|s| s.load_balancer.as_ref())
        .and_then(|lb| lb.ingress.as_ref())
        .and_then(|ingress| ingress.first())
        .and_then(|i| i.ip.clone());

    let Some(ingress_ip) = ingress_ip else {
        // No ingress assigned yet: leave fields empty, return silently.
        return Ok(CloudFields {
            is_internal_load_balancer: Some(false),
            public_ip_resource_id: None,
            is_dns_label_configured: None,
        });
    };

    let Some(client) = ctx.public_ip_client.as_ref() else {
        return Ok(CloudFields {
            is_internal_load_balancer: Some(false),
            public_ip_resource_id: None,
            is_dns_label_configured: None,
        });
    };

    let resource_group = svc
        .annotations()
        .get(ANNOTATION_AZURE_LB_RESOURCE_GROUP)
        .cloned()
        .unwrap_or_else(|| ctx.default_resource_group.clone());

    let addresses = client.list(&resource_group).await?;
    let matched = crate::cloud::find_by_ingress_ip(&addresses, &ingress_ip);

    let requested_label = svc.annotations().get(ANNOTATION_AZURE_DNS_LABEL_NAME);
    let dns_configured = matched.and_then(|addr| addr.properties.dns_settings.as_ref()).and_then(|d| d.domain_name_label.as_deref());

    if let Some(requested) = requested_label {
        if dns_configured != Some(requested.as_str()) {
            // spec.md §4.2.1: the label was requested but hasn't applied
            // yet on the cloud side — surface a transient error to force
            // a requeue rather than silently reporting unconfigured.
            return Err(Error::DnsLabelPending);
        }
    }

    Ok(CloudFields {
        is_internal_load_balancer: Some(false),
        public_ip_resource_id: matched.map(|addr| addr.id.clone()),
        is_dns_label_configured: Some(dns_configured.is_some()),
    })
}

fn desired_internal_service_export(svc: &Service, cloud: &CloudFields) -> InternalServiceExportSpec {
    let ports = svc
        .spec
        .as_ref()
        .and_then(|s| s.ports.as_ref())
        .map(|ports| {
            ports
                .iter()
                .map(|p| InternalServicePort {
                    name: p.name.clone(),
                    protocol: p.protocol.clone().unwrap_or_else(|| "TCP".to_string()),
                    port: p.port,
                })
                .collect()
        })
        .unwrap_or_default();

    InternalServiceExportSpec {
        service_uid: svc.uid().unwrap_or_default(),
        service_type: svc.spec.as_ref().and_then(|s| s.type_.clone()).unwrap_or_else(|| "ClusterIP".to_string()),
        ports,
        is_internal_load_balancer: cloud.is_internal_load_balancer,
        public_ip_resource_id: cloud.public_ip_resource_id.clone(),
        is_dns_label_configured: cloud.is_dns_label_configured,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use k8s_openapi::api::core::v1::ServiceSpec;

    fn svc(type_: &str, cluster_ip: Option<&str>) -> Service {
        Service {
            spec: Some(ServiceSpec {
                type_: Some(type_.to_string()),
                cluster_ip: cluster_ip.map(|s| s.to_string()),
                ..Default::default()
            }),
            ..Default::default()
        }
    }

    #[test]
    fn cluster_ip_service_is_eligible() {
        assert!(service_is_eligible(&svc("ClusterIP", Some("10.0.0.1"))));
    }

    #[test]
    fn headless_service_is_ineligible() {
        assert!(!service_is_eligible(&svc("ClusterIP", Some("None"))));
    }

    #[test]
    fn external_name_service_is_ineligible() {
        assert!(!service_is_eligible(&svc("ExternalName", None)));
    }

    #[test]
    fn load_balancer_service_is_eligible() {
        assert!(service_is_eligible(&svc("LoadBalancer", Some("10.0.0.2"))));
    }

    #[test]
    fn weight_absent_is_none() {
        assert_eq!(parse_weight(&BTreeMap::new()), Ok(None));
    }

    #[test]
    fn weight_in_range_parses() {
        let mut annotations = BTreeMap::new();
        annotations.insert(ANNOTATION_WEIGHT.to_string(), "250".to_string());
        assert_eq!(parse_weight(&annotations), Ok(Some(250)));
    }

    #[test]
    fn weight_out_of_range_is_rejected() {
        let mut annotations = BTreeMap::new();
        annotations.insert(ANNOTATION_WEIGHT.to_string(), "1001".to_string());
        assert!(parse_weight(&annotations).is_err());
    }

    #[test]
    fn weight_non_numeric_is_rejected() {
        let mut annotations = BTreeMap::new();
        annotations.insert(ANNOTATION_WEIGHT.to_string(), "heavy".to_string());
        assert!(parse_weight(&annotations).is_err());
    }

    #[test]
    fn last_seen_refreshes_on_version_change() {
        let mut annotations = BTreeMap::new();
        annotations.insert(ANNOTATION_LAST_SEEN_RESOURCE_VERSION.to_string(), "1".to_string());
        annotations.insert(ANNOTATION_LAST_SEEN_TIMESTAMP.to_string(), "2020-01-01T00:00:00Z".to_string());
        let exported_since = refresh_last_seen(&mut annotations, "2");
        assert_eq!(annotations.get(ANNOTATION_LAST_SEEN_RESOURCE_VERSION).unwrap(), "2");
        assert!(exported_since > DateTime::parse_from_rfc3339("2020-01-01T00:00:00Z").unwrap());
    }

    #[test]
    fn last_seen_is_stable_when_version_unchanged() {
        let mut annotations = BTreeMap::new();
        annotations.insert(ANNOTATION_LAST_SEEN_RESOURCE_VERSION.to_string(), "7".to_string());
        annotations.insert(ANNOTATION_LAST_SEEN_TIMESTAMP.to_string(), "2020-06-01T00:00:00Z".to_string());
        let exported_since = refresh_last_seen(&mut annotations, "7");
        assert_eq!(exported_since, DateTime::parse_from_rfc3339("2020-06-01T00:00:00Z").unwrap());
    }
}
