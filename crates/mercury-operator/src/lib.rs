//! # Mercury Kubernetes Operator
//!
//! Reconciles `ServiceDomain` resources into the workloads that run a BIAN
//! service domain on Kubernetes.
//!
//! ## Custom Resources
//!
//! ### ServiceDomain
//!
//! ```yaml
//! apiVersion: mercury.redhat.io/v1alpha1
//! kind: ServiceDomain
//! metadata:
//!   name: payment
//!   namespace: bank
//! spec:
//!   clusterRef: mercury
//!   type: PaymentInitiation
//!   businessImage: quay.io/mercury/payment-initiation:1.0
//!   expose:
//!     - http
//! ```
//!
//! For each domain the operator maintains:
//!
//! - a `Deployment` named after the domain running `businessImage`, with
//!   `KAFKA_BOOTSTRAP_SERVERS` taken from the referenced cluster
//! - a `Service` exposing gRPC on port 9000
//! - a Strimzi `KafkaTopic` named `<domain>-topic`
//! - a Camel K `Integration` named `<domain>-camelk-rest` while `http` is
//!   listed in `expose`, built from the `integration-<type>-http` and
//!   `<type>-openapi` ConfigMaps in the operator namespace
//! - optionally a Strimzi `KafkaUser` named `<domain>-user`
//!
//! ### ServiceDomainCluster
//!
//! Read-only for this operator. Domains are held back until its
//! `status.kafkaBroker` is set.
//!
//! ## Status
//!
//! Every reconcile rewrites `status` entirely: `topicName` on success,
//! `error` otherwise.
//!
//! ## Metrics
//!
//! - `mercury_operator_reconciliations_total` - Total reconciliation attempts
//! - `mercury_operator_reconciliation_errors_total` - Reconciliation errors
//! - `mercury_operator_reconciliation_duration_seconds` - Reconciliation latency
//! - `mercury_operator_resource_writes_total` - Creates and replaces by kind

pub mod apply;
pub mod client;
pub mod config;
pub mod controller;
pub mod crd;
pub mod error;
pub mod naming;
pub mod reconciler;
pub mod resources;
pub mod routes;
pub mod strimzi;

#[cfg(test)]
mod testing;

pub mod prelude {
    //! Re-exports for convenient usage
    pub use crate::apply::{apply, remove, ApplyOutcome};
    pub use crate::client::{DomainClient, KubeDomainClient, ManagedKind, ObjectKey};
    pub use crate::config::OperatorConfig;
    pub use crate::controller::{run_controller, ControllerContext, ControllerMetrics};
    pub use crate::crd::{
        ExposeType, ServiceDomain, ServiceDomainCluster, ServiceDomainClusterSpec,
        ServiceDomainClusterStatus, ServiceDomainSpec, ServiceDomainStatus, ServiceDomainType,
    };
    pub use crate::error::{OperatorError, Result};
    pub use crate::reconciler::{DomainReconciler, ReconcileReport, ResolvedCluster};
    pub use crate::resources::ResourceBuilder;
}
