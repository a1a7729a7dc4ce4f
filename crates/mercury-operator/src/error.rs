//! Error types for the Mercury Kubernetes Operator

use thiserror::Error;

/// Errors that can occur during operator operations
#[derive(Error, Debug)]
pub enum OperatorError {
    /// Kubernetes API error
    #[error("Kubernetes API error: {0}")]
    KubeError(#[from] kube::Error),

    /// Referenced ServiceDomainCluster does not exist
    #[error("ServiceDomainCluster not found: {0}")]
    ClusterNotFound(String),

    /// Referenced ServiceDomainCluster has not published a broker address yet
    #[error("ServiceDomainCluster {0} has no kafka broker address")]
    BrokerNotReady(String),

    /// A configuration object required for HTTP exposure is absent or incomplete
    #[error("Missing route configuration: {0}")]
    MissingRouteConfig(String),

    /// The route definition document could not be turned into flows
    #[error("Invalid route definition: {0}")]
    InvalidRoutes(String),

    /// The object store rejected a write
    #[error("Failed to apply {kind}/{name}: {reason}")]
    ApplyFailed {
        kind: String,
        name: String,
        reason: String,
    },

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Validation error
    #[error("Validation error: {0}")]
    ValidationError(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    /// YAML parse error
    #[error("YAML parse error: {0}")]
    YamlError(#[from] serde_yaml::Error),

    /// Reconciliation failed
    #[error("Reconciliation failed: {0}")]
    ReconcileFailed(String),
}

/// Result type for operator operations
pub type Result<T> = std::result::Result<T, OperatorError>;

impl OperatorError {
    /// Check if this error is retryable
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            OperatorError::KubeError(_)
                | OperatorError::ApplyFailed { .. }
                | OperatorError::ReconcileFailed(_)
        )
    }

    /// Whether this error means a prerequisite object is missing or not ready.
    ///
    /// These clear up once the referenced object changes, which re-triggers
    /// the reconcile through the watch.
    pub fn is_prerequisite(&self) -> bool {
        matches!(
            self,
            OperatorError::ClusterNotFound(_)
                | OperatorError::BrokerNotReady(_)
                | OperatorError::MissingRouteConfig(_)
        )
    }
}
