//! The unified set of error types used across the provider daemon.
//!
//! One `thiserror`-derived enum per concern, each implementing [`ErrorCode`]
//! for a stable string code used by the request router to build responses.
//! Background loops match on the concrete variant they care about (chiefly
//! [`TransportError`] for indexer-health suppression); everything else
//! propagates with `?` through [`DomainError`].

use thiserror::Error;

/// Maps an error to a stable, transport-facing code.
pub trait ErrorCode {
    /// A short SCREAMING_SNAKE_CASE code, stable across releases.
    fn code(&self) -> &'static str;
}

/// Malformed input: request bodies, detail JSON, addresses.
#[derive(Error, Debug)]
pub enum ValidationError {
    /// An address string did not parse as 20 bytes of hex.
    #[error("malformed address: {input}")]
    MalformedAddress {
        /// The offending input.
        input: String,
    },
    /// A required field was missing from a request.
    #[error("missing required field: {field}")]
    MissingField {
        /// Name of the missing field.
        field: String,
    },
    /// A details blob failed schema validation.
    #[error("invalid details payload: {reason}")]
    InvalidDetails {
        /// Human-readable description of the failure.
        reason: String,
    },
    /// A request body failed to deserialize.
    #[error("malformed request body: {0}")]
    MalformedBody(String),
}

impl ErrorCode for ValidationError {
    fn code(&self) -> &'static str {
        "BAD_REQUEST"
    }
}

impl From<serde_json::Error> for ValidationError {
    fn from(err: serde_json::Error) -> Self {
        ValidationError::MalformedBody(err.to_string())
    }
}

/// The caller is not entitled to perform the requested action.
#[derive(Error, Debug)]
pub enum AuthorizationError {
    /// The requester does not own, or is not a recognized virtual child of, the target.
    #[error("requester {requester} is not authorized for this operation")]
    NotAuthorized {
        /// The address that attempted the action.
        requester: String,
    },
}

impl ErrorCode for AuthorizationError {
    fn code(&self) -> &'static str {
        "NOT_AUTHORIZED"
    }
}

/// The referenced entity does not exist, or is not visible to the caller.
#[derive(Error, Debug)]
pub enum NotFoundError {
    /// No resource matches the given id/protocol/owner combination.
    #[error("resource {id} not found")]
    Resource {
        /// The resource id that was looked up.
        id: u64,
    },
    /// No provider matches the given address or id.
    #[error("provider {address} not found")]
    Provider {
        /// The provider address that was looked up.
        address: String,
    },
    /// A submitted detail's CID does not match the on-chain record.
    #[error("details CID mismatch for {address}")]
    DetailsMismatch {
        /// The address whose on-chain CID did not match.
        address: String,
    },
    /// No detail blob exists for the given CID(s).
    #[error("no details found for requested cids")]
    Details,
}

impl ErrorCode for NotFoundError {
    fn code(&self) -> &'static str {
        "NOT_FOUND"
    }
}

/// Internal inconsistency: the request was well-formed but processing failed.
#[derive(Error, Debug)]
pub enum DomainError {
    /// Wraps a validation failure.
    #[error(transparent)]
    Validation(#[from] ValidationError),
    /// Wraps an authorization failure.
    #[error(transparent)]
    Authorization(#[from] AuthorizationError),
    /// Wraps a not-found failure.
    #[error(transparent)]
    NotFound(#[from] NotFoundError),
    /// Wraps a transport failure talking to the chain or indexer.
    #[error(transparent)]
    Transport(#[from] TransportError),
    /// Wraps a service backend failure.
    #[error(transparent)]
    Backend(#[from] BackendError),
    /// A store operation referenced an unknown protocol or otherwise
    /// inconsistent state; logged and swallowed by background loops.
    #[error("inconsistent state: {0}")]
    Inconsistent(String),
    /// The surrounding task was cancelled; loops should exit quietly.
    #[error("operation terminated")]
    Terminated,
}

impl ErrorCode for DomainError {
    fn code(&self) -> &'static str {
        match self {
            DomainError::Validation(e) => e.code(),
            DomainError::Authorization(e) => e.code(),
            DomainError::NotFound(e) => e.code(),
            DomainError::Transport(_) | DomainError::Backend(_) | DomainError::Inconsistent(_) => {
                "INTERNAL_SERVER_ERROR"
            }
            DomainError::Terminated => "INTERNAL_SERVER_ERROR",
        }
    }
}

impl DomainError {
    /// `true` if this failure (directly or via a wrapped cause) originates
    /// from a cancelled task, so a loop can exit without logging it as an
    /// error.
    pub fn is_terminated(&self) -> bool {
        matches!(self, DomainError::Terminated)
    }

    /// `true` if this is a transport-layer failure talking to the chain or
    /// indexer, used to drive indexer-health log suppression.
    pub fn is_transport(&self) -> bool {
        matches!(self, DomainError::Transport(_))
    }
}

/// Failure communicating with the chain client or indexer client.
///
/// Distinguished from [`DomainError`] variants so callers can probe
/// `IndexerClient::is_healthy` instead of treating every failure the same
/// way.
#[derive(Error, Debug)]
pub enum TransportError {
    /// The underlying HTTP call failed (connection refused, timeout, TLS).
    #[error("transport error calling {endpoint}: {message}")]
    Http {
        /// The endpoint that was being called.
        endpoint: String,
        /// The underlying error message.
        message: String,
    },
    /// The remote service returned a non-success status code.
    #[error("{endpoint} returned status {status}")]
    Status {
        /// The endpoint that was being called.
        endpoint: String,
        /// The HTTP status code returned.
        status: u16,
    },
    /// The response body could not be decoded as the expected shape.
    #[error("failed to decode response from {endpoint}: {message}")]
    Decode {
        /// The endpoint that was being called.
        endpoint: String,
        /// The underlying decode error message.
        message: String,
    },
}

impl ErrorCode for TransportError {
    fn code(&self) -> &'static str {
        "INTERNAL_SERVER_ERROR"
    }
}

/// Failure raised by a concrete `ServiceBackend` implementation.
#[derive(Error, Debug)]
pub enum BackendError {
    /// `create` failed; the resource is persisted as `Failed`.
    #[error("backend failed to create resource: {0}")]
    Create(String),
    /// `get_details` failed while polling a deploying resource.
    #[error("backend failed to fetch resource details: {0}")]
    GetDetails(String),
    /// `delete` failed; the resource is still closed locally.
    #[error("backend failed to delete resource: {0}")]
    Delete(String),
    /// A gateway-configuration call failed.
    #[error("backend configuration error: {0}")]
    Configuration(String),
}

impl ErrorCode for BackendError {
    fn code(&self) -> &'static str {
        "INTERNAL_SERVER_ERROR"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation_errors_map_to_bad_request() {
        let err = DomainError::Validation(ValidationError::MissingField {
            field: "providerId".into(),
        });
        assert_eq!(err.code(), "BAD_REQUEST");
    }

    #[test]
    fn not_found_errors_map_to_not_found() {
        let err = DomainError::NotFound(NotFoundError::Resource { id: 1 });
        assert_eq!(err.code(), "NOT_FOUND");
    }

    #[test]
    fn transport_errors_are_detected() {
        let err = DomainError::Transport(TransportError::Status {
            endpoint: "indexer".into(),
            status: 503,
        });
        assert!(err.is_transport());
        assert!(!DomainError::Terminated.is_transport());
    }
}
