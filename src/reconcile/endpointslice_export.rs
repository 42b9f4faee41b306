//! `EndpointSliceExport` reconciler (C5, spec.md §4.3). Runs on the hub;
//! fans endpoint slices exported by one member out to `EndpointSliceImport`
//! records in every member currently consuming the owning Service, and
//! keeps a single hub-local reference copy of the slice.

use std::{collections::BTreeSet, sync::Arc, time::Duration};

use k8s_openapi::api::discovery::v1::EndpointSlice;
use kube::{
    api::{ListParams, ObjectMeta, Patch, PatchParams},
    runtime::controller::Action,
    Api, Client, Resource, ResourceExt,
};
use thiserror::Error;
use tracing::{info, warn};

use crate::{
    context::EndpointSliceExportContext,
    events,
    finalizers::{self, ENDPOINT_SLICE_EXPORT_CLEANUP},
    retry,
    types::{
        EndpointSliceExport, EndpointSliceImport, EndpointSliceImportSpec, ServiceImport,
        ServiceInUseBy, ANNOTATION_SERVICE_IN_USE_BY,
    },
};

const FIELD_MANAGER: &str = "fleet-networking-endpointslice-export";
const UNFULFILLED_REQUEUE: Duration = Duration::from_secs(5);

#[derive(Debug, Error)]
pub enum Error {
    #[error("hub store request failed: {0}")]
    Hub(#[source] kube::Error),
}

/// Retryable per spec.md §4.3 step 8 ("Each op is wrapped in a short retry
/// for transient store errors") and §7's store-transient classification.
fn is_retryable(err: &kube::Error) -> bool {
    matches!(err, kube::Error::Api(e) if e.code == 409 || e.code == 429 || e.code >= 500)
}

#[tracing::instrument(skip(obj, ctx), fields(namespace = %obj.namespace().unwrap_or_default(), name = %obj.name_any()), level = "debug")]
pub async fn reconcile(obj: Arc<EndpointSliceExport>, ctx: Arc<EndpointSliceExportContext>) -> Result<Action, Error> {
    let ns = obj.namespace().unwrap_or_default();
    let name = obj.name_any();

    let export_api: Api<EndpointSliceExport> = Api::namespaced(ctx.hub_client.clone(), &ns);
    let slice_api: Api<EndpointSlice> = Api::namespaced(ctx.hub_client.clone(), &ctx.fleet_system_namespace);

    // Step 2: deletion path.
    if obj.meta().deletion_timestamp.is_some() {
        if finalizers::has(obj.finalizers(), ENDPOINT_SLICE_EXPORT_CLEANUP) {
            withdraw_all(&ctx.hub_client, &name).await?;
            delete_if_present(&slice_api, &name).await?;
            if let Some(next) = finalizers::with_removed(obj.finalizers(), ENDPOINT_SLICE_EXPORT_CLEANUP) {
                patch_finalizers(&export_api, &name, next).await?;
            }
        }
        return Ok(Action::await_change());
    }

    // Step 3: attach cleanup finalizer.
    if let Some(next) = finalizers::with_added(obj.finalizers(), ENDPOINT_SLICE_EXPORT_CLEANUP) {
        patch_finalizers(&export_api, &name, next).await?;
    }

    // Step 4: hub-local reference copy.
    let reference = desired_reference_slice(&name, &obj);
    slice_api
        .patch(&name, &PatchParams::apply(FIELD_MANAGER).force(), &Patch::Apply(&reference))
        .await
        .map_err(Error::Hub)?;

    // Step 5: owning ServiceImport must be fulfilled.
    let owner_api: Api<ServiceImport> = Api::namespaced(ctx.hub_client.clone(), &obj.spec.owner_service_namespace);
    let owner = owner_api.get_opt(&obj.spec.owner_service_name).await.map_err(Error::Hub)?;
    let owner = match owner {
        Some(owner) if !owner.status.as_ref().map(|s| s.clusters.is_empty()).unwrap_or(true) => owner,
        _ => {
            info!("owning ServiceImport absent or unfulfilled, requeuing");
            return Ok(Action::requeue(UNFULFILLED_REQUEUE));
        }
    };

    // Step 6: ServiceInUseBy annotation.
    let raw = owner.annotations().get(ANNOTATION_SERVICE_IN_USE_BY);
    let desired_namespaces: BTreeSet<String> = match raw.map(|raw| serde_json::from_str::<ServiceInUseBy>(raw)) {
        Some(Ok(map)) => map.into_keys().collect(),
        Some(Err(_)) | None => {
            warn!("ServiceInUseBy annotation missing or unparseable, withdrawing all imports");
            events::warning(
                &ctx.recorder,
                &*owner,
                "ServiceInUseByUnparseable",
                "service-in-use-by annotation is missing or not valid JSON; withdrawing all endpoint slice imports",
                "EndpointSliceFanOut",
            )
            .await;
            withdraw_all(&ctx.hub_client, &name).await?;
            return Ok(Action::await_change());
        }
    };

    // Step 7: diff against current EndpointSliceImport namespaces.
    let current = list_imports_named(&ctx.hub_client, &name).await?;
    let current_namespaces: BTreeSet<String> = current.iter().filter_map(|item| item.namespace()).collect();
    let diff = diff_imports(&current_namespaces, &desired_namespaces);

    // Step 8: deletes first (skipping anything already terminating), then creates/updates.
    for namespace in &diff.deletes {
        if current
            .iter()
            .find(|item| item.namespace().as_deref() == Some(namespace))
            .map(|item| item.meta().deletion_timestamp.is_some())
            .unwrap_or(false)
        {
            continue;
        }
        let api: Api<EndpointSliceImport> = Api::namespaced(ctx.hub_client.clone(), namespace);
        let name = &name;
        retry::with_backoff(is_retryable, || async { api.delete(name, &Default::default()).await })
            .await
            .map_err(Error::Hub)?;
    }

    let desired_spec: EndpointSliceImportSpec = (&obj.spec).into();
    for namespace in diff.creates.iter().chain(diff.updates.iter()) {
        let api: Api<EndpointSliceImport> = Api::namespaced(ctx.hub_client.clone(), namespace);
        let mut object = EndpointSliceImport::new(&name, desired_spec.clone());
        object.metadata.namespace = Some(namespace.clone());
        retry::with_backoff(is_retryable, || async {
            api.patch(&name, &PatchParams::apply(FIELD_MANAGER).force(), &Patch::Apply(&object)).await
        })
        .await
        .map_err(Error::Hub)?;
    }

    Ok(Action::requeue(Duration::from_secs(60)))
}

pub fn error_policy(_obj: Arc<EndpointSliceExport>, err: &Error, _ctx: Arc<EndpointSliceExportContext>) -> Action {
    tracing::error!(error = %err, "EndpointSliceExport reconcile failed");
    Action::requeue(Duration::from_secs(15))
}

/// `EndpointSliceImport` is named identically to the source export across
/// every hub namespace it's fanned into; list-then-filter-by-name is the
/// closest the custom-resource API offers to an indexed lookup by name
/// alone (spec.md §4.3 steps 2 and 6-7).
async fn list_imports_named(hub_client: &Client, name: &str) -> Result<Vec<EndpointSliceImport>, Error> {
    let api: Api<EndpointSliceImport> = Api::all(hub_client.clone());
    Ok(api
        .list(&ListParams::default())
        .await
        .map_err(Error::Hub)?
        .items
        .into_iter()
        .filter(|item| item.name_any() == name)
        .collect())
}

async fn withdraw_all(hub_client: &Client, name: &str) -> Result<(), Error> {
    for item in list_imports_named(hub_client, name).await? {
        if item.meta().deletion_timestamp.is_some() {
            continue;
        }
        let Some(namespace) = item.namespace() else { continue };
        let api: Api<EndpointSliceImport> = Api::namespaced(hub_client.clone(), &namespace);
        match api.delete(name, &Default::default()).await {
            Ok(_) => {}
            Err(kube::Error::Api(e)) if e.code == 404 => {}
            Err(e) => return Err(Error::Hub(e)),
        }
    }
    Ok(())
}

async fn delete_if_present(api: &Api<EndpointSlice>, name: &str) -> Result<(), Error> {
    match api.delete(name, &Default::default()).await {
        Ok(_) => Ok(()),
        Err(kube::Error::Api(e)) if e.code == 404 => Ok(()),
        Err(e) => Err(Error::Hub(e)),
    }
}

async fn patch_finalizers(api: &Api<EndpointSliceExport>, name: &str, finalizers: Vec<String>) -> Result<(), Error> {
    let patch = serde_json::json!({ "metadata": { "finalizers": finalizers } });
    api.patch(name, &PatchParams::default(), &Patch::Merge(&patch)).await.map(|_| ()).map_err(Error::Hub)
}

fn desired_reference_slice(name: &str, export: &EndpointSliceExport) -> EndpointSlice {
    EndpointSlice {
        metadata: ObjectMeta {
            name: Some(name.to_string()),
            ..Default::default()
        },
        address_type: export.spec.address_type.clone(),
        endpoints: export.spec.endpoints.clone(),
        ports: Some(export.spec.ports.clone()),
    }
}

pub struct ImportDiff {
    pub creates: Vec<String>,
    pub updates: Vec<String>,
    pub deletes: Vec<String>,
}

/// spec.md §4.3 step 7: pure set diff between current and desired
/// consuming-member namespaces.
pub fn diff_imports(current: &BTreeSet<String>, desired: &BTreeSet<String>) -> ImportDiff {
    ImportDiff {
        creates: desired.difference(current).cloned().collect(),
        updates: desired.intersection(current).cloned().collect(),
        deletes: current.difference(desired).cloned().collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn set(items: &[&str]) -> BTreeSet<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn diff_identifies_creates_updates_and_deletes() {
        let current = set(&["nsB", "nsC"]);
        let desired = set(&["nsA", "nsC"]);
        let diff = diff_imports(&current, &desired);
        assert_eq!(diff.creates, vec!["nsA".to_string()]);
        assert_eq!(diff.updates, vec!["nsC".to_string()]);
        assert_eq!(diff.deletes, vec!["nsB".to_string()]);
    }

    #[test]
    fn diff_is_empty_when_sets_match() {
        let current = set(&["nsB", "nsC"]);
        let desired = set(&["nsB", "nsC"]);
        let diff = diff_imports(&current, &desired);
        assert!(diff.creates.is_empty());
        assert!(diff.deletes.is_empty());
        assert_eq!(diff.updates.len(), 2);
    }

    #[test]
    fn full_shrink_deletes_everything() {
        let current = set(&["nsA", "nsB"]);
        let desired: BTreeSet<String> = BTreeSet::new();
        let diff = diff_imports(&current, &desired);
        assert_eq!(diff.deletes.len(), 2);
        assert!(diff.creates.is_empty());
    }
}
