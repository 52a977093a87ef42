//! Error taxonomy and remote-error-code mapping for payment calls.

use std::fmt;
use thiserror::Error;

/// Error kinds with a registered mapping from a remote MWS error code.
///
/// These are self-identifying: carrying the raw code or request id would be
/// redundant, so [`PaymentError::Action`] omits both.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionErrorKind {
    InvalidActionCode,
    InvalidOrderReference,
    InvalidPaymentMethod,
    TransactionAmountExceeded,
    OrderReferenceNotModifiable,
    DuplicateRequest,
}

impl ActionErrorKind {
    /// Resolves a remote error code to a registered kind, applying the alias
    /// table first. Returns `None` for codes without a specific kind; those
    /// fall through to [`PaymentError::Api`].
    pub fn for_code(code: &str) -> Option<Self> {
        match alias(code) {
            "InvalidActionCode" => Some(Self::InvalidActionCode),
            "InvalidOrderReference" => Some(Self::InvalidOrderReference),
            "InvalidPaymentMethod" => Some(Self::InvalidPaymentMethod),
            "TransactionAmountExceeded" => Some(Self::TransactionAmountExceeded),
            "OrderReferenceNotModifiable" => Some(Self::OrderReferenceNotModifiable),
            "DuplicateRequest" => Some(Self::DuplicateRequest),
            _ => None,
        }
    }
}

impl fmt::Display for ActionErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::InvalidActionCode => "InvalidActionCode",
            Self::InvalidOrderReference => "InvalidOrderReference",
            Self::InvalidPaymentMethod => "InvalidPaymentMethod",
            Self::TransactionAmountExceeded => "TransactionAmountExceeded",
            Self::OrderReferenceNotModifiable => "OrderReferenceNotModifiable",
            Self::DuplicateRequest => "DuplicateRequest",
        };
        f.write_str(name)
    }
}

/// Remote codes that map onto a differently-named canonical kind. Absence of
/// an entry means the code stands for itself.
fn alias(code: &str) -> &str {
    match code {
        "InvalidAddress" => "InvalidActionCode",
        other => other,
    }
}

/// Failure of a single payment API call.
#[derive(Debug, Error)]
pub enum PaymentError {
    /// Transport failed before any HTTP response was obtained (DNS,
    /// connection refused, TLS, timeout). Never retried.
    #[error("could not reach the payment service: {0}")]
    Connectivity(#[from] reqwest::Error),

    /// HTTP 500/503 still present after the retry budget was spent.
    #[error("internal server error (HTTP {status})")]
    Server { status: u16 },

    /// Remote error code with a registered kind.
    #[error("{kind}: {message} (HTTP {status})")]
    Action {
        kind: ActionErrorKind,
        message: String,
        status: u16,
    },

    /// Remote error code with no registered kind; carries the raw code.
    #[error("{code}: {message} (HTTP {status})")]
    Api {
        code: String,
        message: String,
        status: u16,
        request_id: Option<String>,
    },

    /// Response body was not well-formed XML.
    #[error("malformed response (HTTP {status}): {detail}")]
    ResponseFormat { status: u16, detail: String },

    /// Service URL could not be parsed at construction.
    #[error("invalid service URL: {0}")]
    InvalidEndpoint(#[from] url::ParseError),
}

/// Builds the classified error for a remote error code: a specific kind when
/// one is registered, otherwise the generic variant carrying the raw code.
pub fn classify_api_error(
    code: &str,
    message: &str,
    status: u16,
    request_id: Option<String>,
) -> PaymentError {
    match ActionErrorKind::for_code(code) {
        Some(kind) => PaymentError::Action {
            kind,
            message: message.to_string(),
            status,
        },
        None => PaymentError::Api {
            code: code.to_string(),
            message: message.to_string(),
            status,
            request_id,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_alias_invalid_address() {
        assert_eq!(
            ActionErrorKind::for_code("InvalidAddress"),
            Some(ActionErrorKind::InvalidActionCode)
        );
    }

    #[test]
    fn test_code_maps_to_itself() {
        assert_eq!(
            ActionErrorKind::for_code("InvalidOrderReference"),
            Some(ActionErrorKind::InvalidOrderReference)
        );
    }

    #[test]
    fn test_unregistered_code() {
        assert_eq!(ActionErrorKind::for_code("UnknownThing"), None);
    }

    #[test]
    fn test_classify_registered_kind() {
        let err = classify_api_error("InvalidAddress", "bad addr", 400, None);
        match err {
            PaymentError::Action {
                kind,
                message,
                status,
            } => {
                assert_eq!(kind, ActionErrorKind::InvalidActionCode);
                assert_eq!(message, "bad addr");
                assert_eq!(status, 400);
            }
            other => panic!("expected Action, got {:?}", other),
        }
    }

    #[test]
    fn test_classify_generic_keeps_code_and_request_id() {
        let err = classify_api_error("UnknownThing", "x", 400, Some("req-1".into()));
        match err {
            PaymentError::Api {
                code,
                message,
                status,
                request_id,
            } => {
                assert_eq!(code, "UnknownThing");
                assert_eq!(message, "x");
                assert_eq!(status, 400);
                assert_eq!(request_id.as_deref(), Some("req-1"));
            }
            other => panic!("expected Api, got {:?}", other),
        }
    }

    #[test]
    fn test_display_includes_kind_and_status() {
        let err = classify_api_error("InvalidAddress", "bad addr", 400, None);
        let text = err.to_string();
        assert!(text.contains("InvalidActionCode"));
        assert!(text.contains("400"));
    }
}
