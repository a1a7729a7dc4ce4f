//! Strimzi resource types
//!
//! Typed views of the `kafka.strimzi.io/v1beta2` kinds the operator writes.
//! The CRDs themselves are installed by Strimzi, never by this operator.

use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Label Strimzi uses to pick the Kafka cluster a topic or user belongs to
pub const STRIMZI_CLUSTER_LABEL: &str = "strimzi.io/cluster";

/// Desired state of a Strimzi topic
#[derive(CustomResource, Debug, Clone, PartialEq, Deserialize, Serialize, JsonSchema)]
#[kube(
    group = "kafka.strimzi.io",
    version = "v1beta2",
    kind = "KafkaTopic",
    plural = "kafkatopics",
    namespaced
)]
#[serde(rename_all = "camelCase")]
pub struct KafkaTopicSpec {
    pub partitions: i32,
    pub replicas: i32,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub config: BTreeMap<String, String>,
}

/// Desired state of a Strimzi user
#[derive(CustomResource, Debug, Clone, PartialEq, Deserialize, Serialize, JsonSchema)]
#[kube(
    group = "kafka.strimzi.io",
    version = "v1beta2",
    kind = "KafkaUser",
    plural = "kafkausers",
    namespaced
)]
#[serde(rename_all = "camelCase")]
pub struct KafkaUserSpec {
    pub authentication: KafkaUserAuthentication,
    pub authorization: KafkaUserAuthorization,
}

/// Client authentication mode
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize, JsonSchema)]
#[serde(tag = "type")]
pub enum KafkaUserAuthentication {
    #[serde(rename = "tls")]
    Tls,
}

/// Authorization block; only the `simple` ACL authorizer is used
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize, JsonSchema)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum KafkaUserAuthorization {
    Simple { acls: Vec<AclRule> },
}

/// One access control entry
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct AclRule {
    pub resource: AclResource,
    pub operation: AclOperation,
    pub host: String,
}

/// Resource an ACL entry applies to
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize, JsonSchema)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum AclResource {
    Topic {
        name: String,
        #[serde(rename = "patternType")]
        pattern_type: AclPatternType,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum AclPatternType {
    Literal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
pub enum AclOperation {
    Read,
    Describe,
}
