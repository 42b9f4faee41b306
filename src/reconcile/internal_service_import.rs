//! `InternalServiceImport` reconciler (C4, spec.md §4.5). Watches the hub
//! `ServiceImport` projection and keeps the member cluster's own
//! `ServiceImport` status mirrored from it, deleting the hub projection
//! once the member side is gone.

use std::{sync::Arc, time::Duration};

use kube::{
    api::{Patch, PatchParams},
    runtime::controller::Action,
    Api, Resource, ResourceExt,
};
use thiserror::Error;

use crate::{context::InternalServiceImportContext, types::ServiceImport};

#[derive(Debug, Error)]
pub enum Error {
    #[error("member store request failed: {0}")]
    Member(#[source] kube::Error),
    #[error("hub store request failed: {0}")]
    Hub(#[source] kube::Error),
}

#[tracing::instrument(skip(obj, ctx), fields(namespace = %obj.namespace().unwrap_or_default(), name = %obj.name_any()), level = "debug")]
pub async fn reconcile(obj: Arc<ServiceImport>, ctx: Arc<InternalServiceImportContext>) -> Result<Action, Error> {
    let ns = obj.namespace().unwrap_or_default();
    let name = obj.name_any();

    let hub_api: Api<ServiceImport> = Api::namespaced(ctx.hub_client.clone(), &ns);
    let member_api: Api<ServiceImport> = Api::namespaced(ctx.member_client.clone(), &ns);

    let member = member_api.get_opt(&name).await.map_err(Error::Member)?;
    let Some(member) = member else {
        match hub_api.delete(&name, &Default::default()).await {
            Ok(_) => {}
            Err(kube::Error::Api(e)) if e.code == 404 => {}
            Err(e) => return Err(Error::Hub(e)),
        }
        return Ok(Action::await_change());
    };

    if member.status != obj.status {
        let patch = serde_json::json!({ "status": obj.status });
        member_api
            .patch_status(&name, &PatchParams::default(), &Patch::Merge(&patch))
            .await
            .map_err(Error::Member)?;
    }

    Ok(Action::requeue(Duration::from_secs(60)))
}

pub fn error_policy(_obj: Arc<ServiceImport>, err: &Error, _ctx: Arc<InternalServiceImportContext>) -> Action {
    tracing::error!(error = %err, "InternalServiceImport reconcile failed");
    Action::requeue(Duration::from_secs(15))
}
