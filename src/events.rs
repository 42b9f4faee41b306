//! Event emission (C8, spec.md §4.2 step 7 "Emit event on first
//! transition", §4.2 step 5 "emit warning event"). Thin wrapper around
//! `kube::runtime::events::Recorder`, the pattern used throughout the
//! corpus (`molnett-neon-operator`, `artemlive-cloudflare-operator`).

use kube::runtime::events::{Event, EventType, Recorder};
use kube::{Resource, ResourceExt};

/// Publishes a `Normal` event against `obj`, logging (rather than
/// propagating) a failure to record it — event delivery is best-effort and
/// must never block or fail a reconcile.
pub async fn normal<K>(recorder: &Recorder, obj: &K, reason: &str, note: impl Into<String>, action: &str)
where
    K: Resource<DynamicType = ()> + ResourceExt,
{
    publish(recorder, obj, EventType::Normal, reason, note, action).await;
}

/// Publishes a `Warning` event, per spec.md §4.2 steps 3-5 ("Emit warning
/// event").
pub async fn warning<K>(recorder: &Recorder, obj: &K, reason: &str, note: impl Into<String>, action: &str)
where
    K: Resource<DynamicType = ()> + ResourceExt,
{
    publish(recorder, obj, EventType::Warning, reason, note, action).await;
}

async fn publish<K>(recorder: &Recorder, obj: &K, type_: EventType, reason: &str, note: impl Into<String>, action: &str)
where
    K: Resource<DynamicType = ()> + ResourceExt,
{
    let result = recorder
        .publish(
            &Event {
                type_,
                reason: reason.to_string(),
                note: Some(note.into()),
                action: action.to_string(),
                secondary: None,
            },
            &obj.object_ref(&()),
        )
        .await;
    if let Err(err) = result {
        tracing::warn!(error = %err, name = %obj.name_any(), "failed to publish event");
    }
}
