//! Typed status-condition primitives (spec.md §4.6 "Condition equality",
//! C7). Kept deliberately small: everything here is a pure function over
//! `k8s_openapi`'s standard `Condition` type, so it is exercised with plain
//! `#[test]`s and no cluster.

use chrono::Utc;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::{Condition, Time};

/// `Valid` condition reasons (spec.md §4.2).
pub mod valid {
    pub const SERVICE_IS_VALID: &str = "ServiceIsValid";
    pub const SERVICE_NOT_FOUND: &str = "ServiceNotFound";
    pub const SERVICE_INELIGIBLE: &str = "ServiceIneligible";
    pub const INVALID_WEIGHT: &str = "InvalidWeight";
}

/// `Conflict` condition reasons.
pub mod conflict {
    pub const PENDING_CONFLICT_RESOLUTION: &str = "PendingConflictResolution";
}

/// `Programmed` condition reasons (spec.md §4.4 step 7).
pub mod programmed {
    pub const PROGRAMMED: &str = "Programmed";
    pub const DNS_NAME_NOT_AVAILABLE: &str = "DNSNameNotAvailable";
    pub const INVALID: &str = "Invalid";
    pub const PENDING: &str = "Pending";
}

pub const TYPE_VALID: &str = "Valid";
pub const TYPE_CONFLICT: &str = "Conflict";
pub const TYPE_PROGRAMMED: &str = "Programmed";

/// Builds a condition, stamping `last_transition_time` to now. Callers that
/// need transition-time stability (i.e. "don't touch the timestamp if
/// nothing observable changed") should compare with [`core_eq`] first and
/// skip the write entirely rather than rely on this function to preserve an
/// old timestamp.
pub fn make(type_: &str, status: bool, reason: &str, message: String, observed_generation: Option<i64>) -> Condition {
    Condition {
        type_: type_.to_string(),
        status: if status { "True" } else { "False" }.to_string(),
        reason: reason.to_string(),
        message,
        observed_generation,
        last_transition_time: Time(Utc::now()),
    }
}

/// `Unknown`-status condition (used for `Conflict=Unknown` pending
/// resolution, and `Programmed=Unknown` while requeued).
pub fn make_unknown(type_: &str, reason: &str, message: String, observed_generation: Option<i64>) -> Condition {
    Condition {
        type_: type_.to_string(),
        status: "Unknown".to_string(),
        reason: reason.to_string(),
        message,
        observed_generation,
        last_transition_time: Time(Utc::now()),
    }
}

/// Core equality per spec.md §4.6: `(Type, Status, Reason,
/// ObservedGeneration)` match. Ignores `Message` and
/// `last_transition_time`.
pub fn core_eq(a: &Condition, b: &Condition) -> bool {
    a.type_ == b.type_
        && a.status == b.status
        && a.reason == b.reason
        && a.observed_generation == b.observed_generation
}

/// Variant that also requires `Message` to match, for the case (noted in
/// spec.md §4.6) where the generation does not advance but an
/// annotation-only change still needs to be reflected in the message.
pub fn full_eq(a: &Condition, b: &Condition) -> bool {
    core_eq(a, b) && a.message == b.message
}

/// Finds the condition of the given type in a list, if any.
pub fn find<'a>(conditions: &'a [Condition], type_: &str) -> Option<&'a Condition> {
    conditions.iter().find(|c| c.type_ == type_)
}

/// Inserts or replaces the condition with a matching `type_`, preserving
/// the position of an existing entry and appending otherwise. Returns
/// whether anything changed (per [`full_eq`]), so callers can skip a status
/// write when nothing observable changed (spec.md §4.1's "no observable
/// change on replay" idempotence property).
pub fn upsert(conditions: &mut Vec<Condition>, new: Condition) -> bool {
    if let Some(existing) = conditions.iter_mut().find(|c| c.type_ == new.type_) {
        if full_eq(existing, &new) {
            return false;
        }
        *existing = new;
        true
    } else {
        conditions.push(new);
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn core_eq_ignores_message_and_timestamp() {
        let a = make(TYPE_VALID, true, valid::SERVICE_IS_VALID, "a".into(), Some(1));
        let b = make(TYPE_VALID, true, valid::SERVICE_IS_VALID, "b".into(), Some(1));
        assert!(core_eq(&a, &b));
        assert!(!full_eq(&a, &b));
    }

    #[test]
    fn core_eq_differs_on_reason() {
        let a = make(TYPE_VALID, false, valid::SERVICE_NOT_FOUND, "x".into(), Some(1));
        let b = make(TYPE_VALID, false, valid::SERVICE_INELIGIBLE, "x".into(), Some(1));
        assert!(!core_eq(&a, &b));
    }

    #[test]
    fn upsert_replaces_existing_type_in_place() {
        let mut conditions = vec![
            make(TYPE_VALID, true, valid::SERVICE_IS_VALID, "ok".into(), Some(1)),
            make(TYPE_CONFLICT, false, "NoConflict", "ok".into(), Some(1)),
        ];
        let changed = upsert(
            &mut conditions,
            make(TYPE_VALID, false, valid::SERVICE_NOT_FOUND, "gone".into(), Some(2)),
        );
        assert!(changed);
        assert_eq!(conditions.len(), 2);
        assert_eq!(conditions[0].reason, valid::SERVICE_NOT_FOUND);
    }

    #[test]
    fn upsert_is_noop_when_nothing_observable_changed() {
        let mut conditions = vec![make(TYPE_VALID, true, valid::SERVICE_IS_VALID, "ok".into(), Some(1))];
        let changed = upsert(
            &mut conditions,
            make(TYPE_VALID, true, valid::SERVICE_IS_VALID, "ok".into(), Some(1)),
        );
        assert!(!changed);
    }
}
