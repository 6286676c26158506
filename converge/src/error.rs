//! Error types for converge.

use thiserror::Error;

use crate::resource::ResourceKind;

/// Errors surfaced by the provider gateway.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProviderError {
    /// No live resource matches the request. Expected on first create.
    #[error("not found: {0}")]
    NotFound(String),

    /// The request was rejected before it reached the control plane.
    #[error("validation failed: {0}")]
    Validation(String),

    /// Request rate exceeded.
    #[error("throttled: {0}")]
    Throttled(String),

    /// Network or connection failure.
    #[error("transport error: {0}")]
    Transport(String),

    /// Credentials rejected or missing permissions.
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    /// Any other control plane failure.
    #[error("service error: {0}")]
    Service(String),
}

impl ProviderError {
    /// Whether the retry wrapper should try the call again.
    pub fn is_retryable(&self) -> bool {
        !matches!(self, ProviderError::NotFound(_) | ProviderError::Validation(_))
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, ProviderError::NotFound(_))
    }
}

/// Terminal failure of one reconciliation pass.
#[derive(Debug, Clone, Error)]
pub enum ReconcileError {
    /// Required desired-state field missing. Detected before any provider call.
    #[error("invalid {kind} spec: {message}")]
    Validation { kind: ResourceKind, message: String },

    /// A provider call failed after the retry budget (or was not retryable).
    #[error("{operation} failed: {source}")]
    Provider {
        operation: &'static str,
        #[source]
        source: ProviderError,
    },

    /// Fleet scale-up stopped part way. Instances already created stay live.
    #[error("fleet scale-up stopped after {created} of {requested} instances: {source}")]
    PartialFleet {
        created: usize,
        requested: usize,
        #[source]
        source: ProviderError,
    },

    /// The approval callback did not return a decision.
    #[error("approval prompt interrupted: {0}")]
    ApprovalInterrupted(String),

    /// The reconciliation task ended without reporting (panic).
    #[error("reconciliation task aborted: {0}")]
    TaskAborted(String),
}

impl ReconcileError {
    pub fn validation(kind: ResourceKind, message: impl Into<String>) -> Self {
        ReconcileError::Validation {
            kind,
            message: message.into(),
        }
    }

    pub fn provider(operation: &'static str, source: ProviderError) -> Self {
        ReconcileError::Provider { operation, source }
    }
}

/// Errors raised while loading and materializing a manifest.
#[derive(Debug, Error)]
pub enum ManifestError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("unsupported provider: {0}")]
    UnsupportedProvider(String),

    #[error("region is required")]
    MissingRegion,

    #[error("no machine image known for region {region} and os {os}")]
    UnknownImage { region: String, os: String },

    #[error("invalid manifest: {0}")]
    Invalid(String),
}

pub type Result<T> = std::result::Result<T, ReconcileError>;
