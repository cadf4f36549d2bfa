//! Structured errors for the remote API.
//!
//! Every failure the sync layer can see is one of these variants; the
//! manager matches on them exhaustively to classify save failures.

use serde_json::Value;

/// Detail code the server returns when an items payload references
/// participant ids it does not know about yet.
const INVALID_CONSUMERS_CODE: &str = "Invalid consumerIds";

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ApiError {
    /// Rejected locally, before any network call was issued.
    #[error("not signed in")]
    Unauthenticated,
    /// The server answered with a non-2xx status.
    #[error("{message} (status {status})")]
    Remote {
        status: u16,
        message: String,
        /// Raw error payload from the server, if it sent one.
        details: Option<Value>,
        /// Request correlation id, for support diagnosis.
        correlation_id: Option<String>,
    },
    /// The request could not be completed at all, or the response
    /// body failed to decode.
    #[error("network error: {0}")]
    Network(String),
}

impl ApiError {
    /// True for a 400 whose details carry the invalid-consumer-ids code.
    ///
    /// This is the symptom of the participants-before-items ordering being
    /// violated server-side (e.g. a participant was deleted concurrently):
    /// the items payload referenced participant ids the server does not
    /// recognize yet.
    pub fn is_invalid_consumers(&self) -> bool {
        let ApiError::Remote {
            status: 400,
            details: Some(details),
            ..
        } = self
        else {
            return false;
        };
        details
            .get("error")
            .or_else(|| details.get("message"))
            .and_then(Value::as_str)
            .is_some_and(|code| code.contains(INVALID_CONSUMERS_CODE))
    }

    /// Correlation id of the failed request, when one was recorded.
    pub fn correlation_id(&self) -> Option<&str> {
        match self {
            ApiError::Remote { correlation_id, .. } => correlation_id.as_deref(),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn classifies_invalid_consumer_ids() {
        let err = ApiError::Remote {
            status: 400,
            message: "Bad Request".to_string(),
            details: Some(json!({"error": "Invalid consumerIds"})),
            correlation_id: None,
        };
        assert!(err.is_invalid_consumers());
    }

    #[test]
    fn other_400s_are_not_consumer_errors() {
        let err = ApiError::Remote {
            status: 400,
            message: "Bad Request".to_string(),
            details: Some(json!({"error": "name must not be empty"})),
            correlation_id: None,
        };
        assert!(!err.is_invalid_consumers());
    }

    #[test]
    fn status_must_be_400() {
        let err = ApiError::Remote {
            status: 500,
            message: "oops".to_string(),
            details: Some(json!({"error": "Invalid consumerIds"})),
            correlation_id: None,
        };
        assert!(!err.is_invalid_consumers());
        assert!(!ApiError::Unauthenticated.is_invalid_consumers());
        assert!(!ApiError::Network("timeout".to_string()).is_invalid_consumers());
    }

    #[test]
    fn correlation_id_only_on_remote_errors() {
        let err = ApiError::Remote {
            status: 503,
            message: "unavailable".to_string(),
            details: None,
            correlation_id: Some("req-123".to_string()),
        };
        assert_eq!(err.correlation_id(), Some("req-123"));
        assert_eq!(ApiError::Unauthenticated.correlation_id(), None);
    }
}
