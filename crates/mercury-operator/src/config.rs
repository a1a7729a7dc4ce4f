//! Operator configuration

use std::time::Duration;

/// Strimzi Kafka cluster name used when none is configured
pub const DEFAULT_KAFKA_CLUSTER: &str = "mercury-kafka";

/// Default interval between periodic reconciles of a healthy domain
pub const DEFAULT_RESYNC_SECONDS: u64 = 300;

/// Runtime settings shared by the controller and the reconciler
#[derive(Debug, Clone)]
pub struct OperatorConfig {
    /// Namespace to watch, `None` for cluster-wide
    pub watch_namespace: Option<String>,
    /// Namespace holding the route and OpenAPI ConfigMaps
    pub operator_namespace: String,
    /// Version pinned into integration Maven dependencies
    pub operator_version: String,
    /// Strimzi cluster topics and users are labelled for
    pub kafka_cluster: String,
    /// Also provision a KafkaUser per domain
    pub provision_credentials: bool,
    /// Requeue interval after a completed reconcile
    pub resync_interval: Duration,
}

impl Default for OperatorConfig {
    fn default() -> Self {
        Self {
            watch_namespace: None,
            operator_namespace: "default".to_string(),
            operator_version: env!("CARGO_PKG_VERSION").to_string(),
            kafka_cluster: DEFAULT_KAFKA_CLUSTER.to_string(),
            provision_credentials: false,
            resync_interval: Duration::from_secs(DEFAULT_RESYNC_SECONDS),
        }
    }
}
