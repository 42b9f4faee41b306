use thiserror::Error as ThisError;

/// Error model exposed by the cloud traffic-manager and public-IP clients
/// (spec.md §6): HTTP status code plus an error code string. Reconcilers
/// dispatch on the classification predicates below rather than on the raw
/// status code, per spec.md §4.6 "polymorphic error classification".
#[derive(Debug, ThisError)]
pub enum Error {
    #[error("cloud request failed ({status}): {code}: {message}")]
    Api {
        status: u16,
        code: String,
        message: String,
    },
    #[error("cloud request transport error: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("failed to decode cloud response: {0}")]
    Decode(#[from] serde_json::Error),
}

impl Error {
    /// Maps a non-2xx response into the structured API variant. Azure
    /// Resource Manager wraps its error body as `{"error": {"code",
    /// "message"}}`; callers that can't parse the body (throttling
    /// responses often have none) fall back to a generic code.
    pub fn from_response(status: u16, body: &str) -> Self {
        #[derive(serde::Deserialize)]
        struct Envelope {
            error: ErrorBody,
        }
        #[derive(serde::Deserialize)]
        struct ErrorBody {
            code: String,
            message: String,
        }

        match serde_json::from_str::<Envelope>(body) {
            Ok(env) => Error::Api {
                status,
                code: env.error.code,
                message: env.error.message,
            },
            Err(_) => Error::Api {
                status,
                code: "Unknown".to_string(),
                message: body.to_string(),
            },
        }
    }

    /// Per spec.md §7: "Cloud: not-found" on Get/Delete — treat as success.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::Api { status: 404, .. })
    }

    /// Per spec.md §7: "Cloud: 409 conflict" on CreateOrUpdate of a
    /// profile — DNS relative name is globally unique across tenants.
    pub fn is_conflict(&self) -> bool {
        matches!(self, Error::Api { status: 409, .. })
    }

    /// Per spec.md §7: "Cloud: 403 forbidden" — the profile finalizer must
    /// not be attached when this fires during create.
    pub fn is_forbidden(&self) -> bool {
        matches!(self, Error::Api { status: 403, .. })
    }

    /// Per spec.md §7: "Cloud: 429 / 5xx / unknown" — surface as `Pending`
    /// and requeue.
    pub fn is_throttled_or_unavailable(&self) -> bool {
        match self {
            Error::Api { status, .. } => *status == 429 || *status >= 500,
            Error::Transport(_) => true,
            Error::Decode(_) => false,
        }
    }

    /// Per spec.md §7: "Cloud: 4xx other, non-throttled" on CreateOrUpdate.
    pub fn is_client_error(&self) -> bool {
        matches!(self, Error::Api { status, .. } if (400..500).contains(status) && *status != 429)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_conflict() {
        let err = Error::from_response(409, r#"{"error":{"code":"DnsNameNotAvailable","message":"taken"}}"#);
        assert!(err.is_conflict());
        assert!(!err.is_forbidden());
    }

    #[test]
    fn classifies_throttling_with_empty_body() {
        let err = Error::from_response(429, "");
        assert!(err.is_throttled_or_unavailable());
        assert!(!err.is_client_error());
    }

    #[test]
    fn classifies_forbidden() {
        let err = Error::from_response(403, r#"{"error":{"code":"AuthorizationFailed","message":"denied"}}"#);
        assert!(err.is_forbidden());
        assert!(err.is_client_error());
        assert!(!err.is_throttled_or_unavailable());
    }
}
