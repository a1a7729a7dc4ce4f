//! Kubernetes Resource Builders
//!
//! This module computes the desired Deployment, Service, KafkaTopic and
//! KafkaUser for a ServiceDomain. Every builder is a pure function of the
//! domain and the inputs passed in; nothing here talks to the API server.

use crate::crd::ServiceDomain;
use crate::error::{OperatorError, Result};
use crate::naming;
use crate::strimzi::{
    AclOperation, AclPatternType, AclResource, AclRule, KafkaTopic, KafkaTopicSpec, KafkaUser,
    KafkaUserAuthentication, KafkaUserAuthorization, KafkaUserSpec, STRIMZI_CLUSTER_LABEL,
};
use k8s_openapi::api::apps::v1::{Deployment, DeploymentSpec};
use k8s_openapi::api::core::v1::{
    Container, ContainerPort, EnvVar, PodSpec, PodTemplateSpec, Service, ServicePort, ServiceSpec,
};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::{LabelSelector, ObjectMeta, OwnerReference};
use k8s_openapi::apimachinery::pkg::util::intstr::IntOrString;
use kube::ResourceExt;
use std::collections::BTreeMap;

/// Name of the single business container
pub const CONTAINER_NAME: &str = "business-service";

/// Port the business container serves gRPC on
pub const GRPC_PORT: i32 = 9000;

/// Logical name of the gRPC port
pub const GRPC_PORT_NAME: &str = "grpc";

/// Environment variable carrying the Kafka bootstrap address
pub const BOOTSTRAP_SERVERS_ENV: &str = "KAFKA_BOOTSTRAP_SERVERS";

const TOPIC_PARTITIONS: i32 = 1;
const TOPIC_REPLICAS: i32 = 1;

/// Builder for generating Kubernetes resources from a ServiceDomain
pub struct ResourceBuilder<'a> {
    domain: &'a ServiceDomain,
    name: String,
    namespace: String,
}

impl<'a> ResourceBuilder<'a> {
    /// Create a new resource builder
    pub fn new(domain: &'a ServiceDomain) -> Result<Self> {
        let name =
            domain.metadata.name.clone().ok_or_else(|| {
                OperatorError::InvalidConfig("service domain name is required".to_string())
            })?;

        let namespace = domain.namespace().unwrap_or_else(|| "default".to_string());

        Ok(Self {
            domain,
            name,
            namespace,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn domain(&self) -> &ServiceDomain {
        self.domain
    }

    pub fn owner_reference(&self) -> OwnerReference {
        naming::owner_reference(self.domain)
    }

    /// Build the Deployment running the business image
    pub fn build_deployment(&self, kafka_broker: &str) -> Deployment {
        let container = Container {
            name: CONTAINER_NAME.to_string(),
            image: Some(self.domain.spec.business_image.clone()),
            image_pull_policy: Some("Always".to_string()),
            ports: Some(vec![ContainerPort {
                name: Some(GRPC_PORT_NAME.to_string()),
                container_port: GRPC_PORT,
                protocol: Some("TCP".to_string()),
                ..Default::default()
            }]),
            env: Some(vec![EnvVar {
                name: BOOTSTRAP_SERVERS_ENV.to_string(),
                value: Some(kafka_broker.to_string()),
                ..Default::default()
            }]),
            ..Default::default()
        };

        Deployment {
            metadata: ObjectMeta {
                name: Some(self.name.clone()),
                namespace: Some(self.namespace.clone()),
                labels: Some(naming::managed_labels(&self.name)),
                owner_references: Some(vec![self.owner_reference()]),
                ..Default::default()
            },
            spec: Some(DeploymentSpec {
                selector: LabelSelector {
                    match_labels: Some(naming::selector_labels(&self.name)),
                    ..Default::default()
                },
                template: PodTemplateSpec {
                    metadata: Some(ObjectMeta {
                        labels: Some(naming::pod_labels(&self.name)),
                        ..Default::default()
                    }),
                    spec: Some(PodSpec {
                        containers: vec![container],
                        ..Default::default()
                    }),
                },
                ..Default::default()
            }),
            ..Default::default()
        }
    }

    /// Build the cluster-internal gRPC Service in front of the Deployment
    pub fn build_service(&self) -> Service {
        Service {
            metadata: ObjectMeta {
                name: Some(self.name.clone()),
                namespace: Some(self.namespace.clone()),
                labels: Some(naming::service_labels(&self.name)),
                owner_references: Some(vec![self.owner_reference()]),
                ..Default::default()
            },
            spec: Some(ServiceSpec {
                selector: Some(naming::selector_labels(&self.name)),
                ports: Some(vec![ServicePort {
                    name: Some(GRPC_PORT_NAME.to_string()),
                    port: GRPC_PORT,
                    protocol: Some("TCP".to_string()),
                    target_port: Some(IntOrString::Int(GRPC_PORT)),
                    ..Default::default()
                }]),
                ..Default::default()
            }),
            ..Default::default()
        }
    }

    /// Build the domain's topic, placed next to the Kafka cluster
    pub fn build_topic(&self, cluster_namespace: &str, kafka_cluster: &str) -> KafkaTopic {
        let mut topic = KafkaTopic::new(
            &naming::topic_name(&self.name),
            KafkaTopicSpec {
                partitions: TOPIC_PARTITIONS,
                replicas: TOPIC_REPLICAS,
                config: BTreeMap::new(),
            },
        );
        topic.metadata.namespace = Some(cluster_namespace.to_string());
        topic.metadata.labels = Some(self.strimzi_labels(kafka_cluster));
        topic.metadata.owner_references = Some(vec![self.owner_reference()]);
        topic
    }

    /// Build the mutual-TLS user allowed to consume the domain's topic
    pub fn build_kafka_user(
        &self,
        topic_name: &str,
        cluster_namespace: &str,
        kafka_cluster: &str,
    ) -> KafkaUser {
        let rule = |operation| AclRule {
            resource: AclResource::Topic {
                name: topic_name.to_string(),
                pattern_type: AclPatternType::Literal,
            },
            operation,
            host: "*".to_string(),
        };

        let mut user = KafkaUser::new(
            &naming::user_name(&self.name),
            KafkaUserSpec {
                authentication: KafkaUserAuthentication::Tls,
                authorization: KafkaUserAuthorization::Simple {
                    acls: vec![
                        rule(AclOperation::Read),
                        rule(AclOperation::Describe),
                        rule(AclOperation::Read),
                    ],
                },
            },
        );
        user.metadata.namespace = Some(cluster_namespace.to_string());
        user.metadata.labels = Some(self.strimzi_labels(kafka_cluster));
        user.metadata.owner_references = Some(vec![self.owner_reference()]);
        user
    }

    fn strimzi_labels(&self, kafka_cluster: &str) -> BTreeMap<String, String> {
        let mut labels = naming::managed_by_labels();
        labels.insert(STRIMZI_CLUSTER_LABEL.to_string(), kafka_cluster.to_string());
        labels
    }
}
