//! Custom Resource Definitions for the Mercury Kubernetes Operator
//!
//! This module defines the `ServiceDomain` CRD, which describes one BIAN
//! service domain deployment, and the `ServiceDomainCluster` CRD whose
//! status publishes the Kafka bootstrap address domains connect to.

use kube::CustomResource;
use regex::Regex;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::LazyLock;
use validator::{Validate, ValidationError};

/// API group shared by both Mercury CRDs
pub const API_GROUP: &str = "mercury.redhat.io";

/// API version shared by both Mercury CRDs
pub const API_VERSION: &str = "v1alpha1";

/// Regex for validating Kubernetes object names (RFC 1123 subdomain)
static NAME_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[a-z0-9]([-a-z0-9]*[a-z0-9])?(\.[a-z0-9]([-a-z0-9]*[a-z0-9])?)*$")
        .expect("name pattern is a valid regex")
});

/// Validate a Kubernetes object name (RFC 1123 subdomain)
fn validate_k8s_name(value: &str) -> Result<(), ValidationError> {
    if !NAME_REGEX.is_match(value) {
        return Err(ValidationError::new("invalid_name").with_message(
            format!("'{}' is not a valid Kubernetes name (RFC 1123)", value).into(),
        ));
    }
    Ok(())
}

/// Validate a container image reference
fn validate_image(value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        return Err(ValidationError::new("empty_image")
            .with_message("businessImage must not be empty".into()));
    }
    if value.len() > 255 {
        return Err(ValidationError::new("image_too_long")
            .with_message("image reference exceeds 255 characters".into()));
    }
    if value.contains("..") || value.starts_with('/') || value.starts_with('-') {
        return Err(ValidationError::new("invalid_image")
            .with_message(format!("'{}' is not a valid container image", value).into()));
    }
    if value.chars().any(char::is_whitespace) {
        return Err(ValidationError::new("invalid_image")
            .with_message(format!("'{}' contains whitespace", value).into()));
    }
    Ok(())
}

/// ServiceDomain custom resource definition
///
/// One BIAN service domain: a business-logic workload reachable over gRPC,
/// a Kafka topic for its events and, when requested, a Camel K integration
/// exposing it over HTTP.
#[derive(CustomResource, Debug, Clone, Deserialize, Serialize, JsonSchema, Validate)]
#[kube(
    group = "mercury.redhat.io",
    version = "v1alpha1",
    kind = "ServiceDomain",
    plural = "servicedomains",
    shortname = "sd",
    namespaced,
    status = "ServiceDomainStatus",
    printcolumn = r#"{"name":"Type", "type":"string", "jsonPath":".spec.type"}"#,
    printcolumn = r#"{"name":"Topic", "type":"string", "jsonPath":".status.topicName"}"#,
    printcolumn = r#"{"name":"Error", "type":"string", "jsonPath":".status.error"}"#,
    printcolumn = r#"{"name":"Age", "type":"date", "jsonPath":".metadata.creationTimestamp"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct ServiceDomainSpec {
    /// Name of the ServiceDomainCluster in the same namespace
    #[serde(alias = "serviceDomainCluster")]
    #[validate(length(min = 1, max = 253, message = "clusterRef must be 1-253 characters"))]
    #[validate(custom(function = "validate_k8s_name"))]
    pub cluster_ref: String,

    /// BIAN service domain type
    #[serde(rename = "type")]
    pub domain_type: ServiceDomainType,

    /// Container image implementing the business logic
    #[validate(custom(function = "validate_image"))]
    pub business_image: String,

    /// Additional ways to expose the domain
    #[serde(default)]
    pub expose: Vec<ExposeType>,
}

impl ServiceDomainSpec {
    /// Whether HTTP exposure is requested
    pub fn exposes_http(&self) -> bool {
        self.expose.contains(&ExposeType::Http)
    }
}

/// Observed state of a ServiceDomain
///
/// Both fields are serialized even when unset so that a merge patch of the
/// whole struct clears whatever the previous reconcile wrote.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ServiceDomainStatus {
    /// Name of the provisioned Kafka topic
    #[serde(default)]
    pub topic_name: Option<String>,

    /// Last reconcile failure
    #[serde(default)]
    pub error: Option<String>,
}

impl ServiceDomainStatus {
    /// Status of a successful reconcile
    pub fn ready(topic_name: impl Into<String>) -> Self {
        Self {
            topic_name: Some(topic_name.into()),
            error: None,
        }
    }

    /// Status of a failed reconcile
    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            topic_name: None,
            error: Some(error.into()),
        }
    }
}

/// Ways a service domain can be exposed beyond its internal gRPC service
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum ExposeType {
    /// REST endpoint served by a Camel K integration
    Http,
}

/// BIAN service domain types known to the operator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize, JsonSchema)]
pub enum ServiceDomainType {
    CurrentAccount,
    CustomerCreditRating,
    CustomerOffer,
    CustomerProductAndServiceEligibility,
    PartyLifecycleManagement,
    PartyReferenceDataDirectory,
    PaymentExecution,
    PaymentInitiation,
    PaymentOrder,
    SavingsAccount,
}

impl ServiceDomainType {
    /// Identifier as declared on the wire
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::CurrentAccount => "CurrentAccount",
            Self::CustomerCreditRating => "CustomerCreditRating",
            Self::CustomerOffer => "CustomerOffer",
            Self::CustomerProductAndServiceEligibility => "CustomerProductAndServiceEligibility",
            Self::PartyLifecycleManagement => "PartyLifecycleManagement",
            Self::PartyReferenceDataDirectory => "PartyReferenceDataDirectory",
            Self::PaymentExecution => "PaymentExecution",
            Self::PaymentInitiation => "PaymentInitiation",
            Self::PaymentOrder => "PaymentOrder",
            Self::SavingsAccount => "SavingsAccount",
        }
    }
}

impl fmt::Display for ServiceDomainType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// ServiceDomainCluster custom resource definition
///
/// Owned by the cluster-level tooling that provisions Kafka. This operator
/// only reads `status.kafkaBroker`.
#[derive(CustomResource, Debug, Clone, Default, Deserialize, Serialize, JsonSchema)]
#[kube(
    group = "mercury.redhat.io",
    version = "v1alpha1",
    kind = "ServiceDomainCluster",
    plural = "servicedomainclusters",
    shortname = "sdc",
    namespaced,
    status = "ServiceDomainClusterStatus",
    printcolumn = r#"{"name":"Broker", "type":"string", "jsonPath":".status.kafkaBroker"}"#,
    printcolumn = r#"{"name":"Age", "type":"date", "jsonPath":".metadata.creationTimestamp"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct ServiceDomainClusterSpec {}

/// Observed state of a ServiceDomainCluster
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ServiceDomainClusterStatus {
    /// Kafka bootstrap address, set once the bus is ready
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kafka_broker: Option<String>,
}
