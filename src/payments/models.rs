//! Data models for parsed payment API responses.

use serde::Serialize;
use serde_json::{Map, Value};

/// A successfully classified response. Transient: exists only for the
/// duration of one call.
#[derive(Debug, Clone, Serialize)]
pub struct ApiResponse {
    /// HTTP status code of the final attempt.
    pub status: u16,
    /// Parsed body: the XML root element's children keyed by tag name.
    pub data: Map<String, Value>,
}

/// Error details extracted from an error response body before mapping.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorInfo {
    /// Remote error code, e.g. `InvalidAddress`.
    pub code: String,
    /// Human-readable message reported by the service.
    pub message: String,
    /// Top-level `RequestId` when the service included one.
    pub request_id: Option<String>,
}
