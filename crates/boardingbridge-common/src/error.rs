//! Error types for the boardingbridge controller
//!
//! Errors are structured with fields to aid debugging in production.
//! Not-found on reads is never an error: store lookups return `Option`.
//! Everything else lands here and is classified by [`Error::is_retryable`].

use thiserror::Error;

/// Default context value when no specific context is available
pub const UNKNOWN_CONTEXT: &str = "unknown";

/// Main error type for boardingbridge operations
#[derive(Debug, Error)]
pub enum Error {
    /// Kubernetes API error (transient store failure)
    #[error("kubernetes error: {source}")]
    Kube {
        /// The underlying kube-rs error
        source: kube::Error,
    },

    /// A write lost an optimistic-concurrency race (HTTP 409)
    #[error("write conflict on {kind} {name}: {message}")]
    Conflict {
        /// Kind of the record being written
        kind: String,
        /// Name of the record being written
        name: String,
        /// Description of the conflict
        message: String,
    },

    /// The managed Service template could not be built from the spec
    #[error("cannot construct managed Service for {resource}: {message}")]
    Construction {
        /// Namespaced name of the BridgeService
        resource: String,
        /// Description of what's invalid
        message: String,
    },

    /// A same-named Service exists that this BridgeService does not own
    #[error("{kind} {namespace}/{name} is not owned by this BridgeService: {message}")]
    Ownership {
        /// Kind of the conflicting object
        kind: String,
        /// Namespace of the conflicting object
        namespace: String,
        /// Name of the conflicting object
        name: String,
        /// Who owns it instead, if known
        message: String,
    },

    /// Validation error for configuration or CRD specs
    #[error("validation error for {resource}: {message}")]
    Validation {
        /// Resource or setting with invalid configuration
        resource: String,
        /// Description of what's invalid
        message: String,
        /// The invalid field path (e.g., "spec.ports[0].port")
        field: Option<String>,
    },
}

impl From<kube::Error> for Error {
    fn from(source: kube::Error) -> Self {
        match &source {
            kube::Error::Api(ae) if ae.code == 409 => Self::Conflict {
                kind: UNKNOWN_CONTEXT.to_string(),
                name: UNKNOWN_CONTEXT.to_string(),
                message: ae.message.clone(),
            },
            _ => Self::Kube { source },
        }
    }
}

impl Error {
    /// Create a write conflict error for a named record
    pub fn conflict(
        kind: impl Into<String>,
        name: impl Into<String>,
        msg: impl Into<String>,
    ) -> Self {
        Self::Conflict {
            kind: kind.into(),
            name: name.into(),
            message: msg.into(),
        }
    }

    /// Create a construction error for the given BridgeService
    pub fn construction(resource: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::Construction {
            resource: resource.into(),
            message: msg.into(),
        }
    }

    /// Create an ownership error for a conflicting object
    pub fn ownership(
        kind: impl Into<String>,
        namespace: impl Into<String>,
        name: impl Into<String>,
        msg: impl Into<String>,
    ) -> Self {
        Self::Ownership {
            kind: kind.into(),
            namespace: namespace.into(),
            name: name.into(),
            message: msg.into(),
        }
    }

    /// Create a validation error with resource context and field path
    pub fn validation_for_field(
        resource: impl Into<String>,
        field: impl Into<String>,
        msg: impl Into<String>,
    ) -> Self {
        Self::Validation {
            resource: resource.into(),
            message: msg.into(),
            field: Some(field.into()),
        }
    }

    /// Attach the kind and name of the record to a conflict error.
    ///
    /// Other variants are returned unchanged.
    pub fn on_record(self, kind: &str, name: &str) -> Self {
        match self {
            Self::Conflict { message, .. } => Self::conflict(kind, name, message),
            other => other,
        }
    }

    /// Check if this error is retryable
    ///
    /// Construction and validation errors are not retryable:
    /// they need a spec or config change. Conflicts always are.
    /// Kubernetes errors are retryable unless the API rejected the request
    /// outright (4xx other than 429).
    pub fn is_retryable(&self) -> bool {
        match self {
            Error::Kube { source } => !matches!(
                source,
                kube::Error::Api(ae) if (400..500).contains(&ae.code) && ae.code != 429
            ),
            Error::Conflict { .. } => true,
            Error::Construction { .. } => false,
            Error::Ownership { .. } => true,
            Error::Validation { .. } => false,
        }
    }

    /// Short machine-readable reason, used for status conditions
    pub fn reason(&self) -> &'static str {
        match self {
            Error::Kube { .. } => "StoreError",
            Error::Conflict { .. } => "WriteConflict",
            Error::Construction { .. } => "ConstructionFailed",
            Error::Ownership { .. } => "OwnershipConflict",
            Error::Validation { .. } => "ValidationFailed",
        }
    }
}
