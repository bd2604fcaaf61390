//! The request/response/error envelope shared by every transport.

use providerd_types::address::Address;
use providerd_types::error::{DomainError, ErrorCode};
use serde_json::Value;

/// The method a route is registered under. A transport maps its own
/// method/verb concept (HTTP verbs, a messaging-bus op code) onto this set.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub enum Method {
    /// Read-only query.
    Get,
    /// Create or invoke an action.
    Post,
    /// Partial update.
    Patch,
    /// Remove or tear down.
    Delete,
}

/// A transport-agnostic inbound request. `requester` is established by the
/// transport's own authentication (HTTP session verification, or signed-
/// messaging signature recovery) before a handler ever sees the request —
/// handlers trust it.
#[derive(Debug, Clone)]
pub struct PipeRequest {
    /// A request id, used to correlate logs across a request's lifetime.
    pub id: String,
    /// The authenticated caller's address.
    pub requester: Address,
    /// The request path, matched against the route table.
    pub path: String,
    /// Path parameters extracted by the transport (e.g. `:offer_id`).
    pub path_params: Value,
    /// Query parameters (HTTP) or equivalent out-of-band fields.
    pub params: Value,
    /// The request body, if any.
    pub body: Value,
}

impl PipeRequest {
    /// Reads `providerId` from the body, falling back to `params`. Per §4.5,
    /// a route registered through `register_provider_route` requires this;
    /// its absence is a `BAD_REQUEST`, never a `NOT_FOUND`.
    pub fn provider_id(&self) -> Result<u64, PipeError> {
        self.body
            .get("providerId")
            .or_else(|| self.params.get("providerId"))
            .and_then(Value::as_u64)
            .ok_or_else(|| PipeError::bad_request("providerId is required"))
    }
}

/// A transport-agnostic response: an HTTP-like status code plus a JSON body.
#[derive(Debug, Clone)]
pub struct PipeResponse {
    /// Response code, one of §6's `OK/BAD_REQUEST/NOT_AUTHORIZED/NOT_FOUND/
    /// INTERNAL_SERVER_ERROR` (200/400/401/404/500).
    pub code: u16,
    /// Response payload.
    pub body: Value,
}

impl PipeResponse {
    /// Builds a `200 OK` response with the given body.
    pub fn ok(body: Value) -> Self {
        PipeResponse { code: 200, body }
    }
}

/// A tagged error a handler returns; converted verbatim into a
/// [`PipeResponse`] by the transport. Any other error type (a panic caught
/// by the transport, an unexpected `Err` from plumbing) becomes a generic
/// `500` instead.
#[derive(Debug, Clone)]
pub struct PipeError {
    /// Response code to send.
    pub code: u16,
    /// Message shown to the caller.
    pub message: String,
}

impl PipeError {
    /// Builds a `400 BAD_REQUEST`.
    pub fn bad_request(message: impl Into<String>) -> Self {
        PipeError {
            code: 400,
            message: message.into(),
        }
    }

    /// Builds a `401 NOT_AUTHORIZED`.
    pub fn not_authorized(message: impl Into<String>) -> Self {
        PipeError {
            code: 401,
            message: message.into(),
        }
    }

    /// Builds a `404 NOT_FOUND`.
    pub fn not_found(message: impl Into<String>) -> Self {
        PipeError {
            code: 404,
            message: message.into(),
        }
    }

    /// Builds a `500 INTERNAL_SERVER_ERROR`.
    pub fn internal(message: impl Into<String>) -> Self {
        PipeError {
            code: 500,
            message: message.into(),
        }
    }

    /// Converts into the response body a transport actually sends.
    pub fn into_response(self) -> PipeResponse {
        PipeResponse {
            code: self.code,
            body: serde_json::json!({ "error": self.message }),
        }
    }
}

impl From<DomainError> for PipeError {
    fn from(err: DomainError) -> Self {
        let code = match err.code() {
            "BAD_REQUEST" => 400,
            "NOT_AUTHORIZED" => 401,
            "NOT_FOUND" => 404,
            _ => 500,
        };
        PipeError {
            code,
            message: err.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn provider_id_missing_is_bad_request_not_not_found() {
        let req = PipeRequest {
            id: "1".into(),
            requester: "0x1111111111111111111111111111111111111111".parse().unwrap(),
            path: "/foo".into(),
            path_params: json!({}),
            params: json!({}),
            body: json!({}),
        };
        let err = req.provider_id().unwrap_err();
        assert_eq!(err.code, 400);
    }

    #[test]
    fn provider_id_reads_from_body_then_params() {
        let req = PipeRequest {
            id: "1".into(),
            requester: "0x1111111111111111111111111111111111111111".parse().unwrap(),
            path: "/foo".into(),
            path_params: json!({}),
            params: json!({ "providerId": 7 }),
            body: json!({}),
        };
        assert_eq!(req.provider_id().unwrap(), 7);
    }
}
