//! Cluster object store access
//!
//! The reconciler reads and writes cluster objects through [`DomainClient`],
//! keyed by (kind, namespace, name). [`KubeDomainClient`] is the API server
//! backed implementation; tests substitute an in-memory store or a mock.

use crate::crd::{ServiceDomain, ServiceDomainCluster, ServiceDomainStatus};
use crate::error::{OperatorError, Result};
use crate::naming::OPERATOR_NAME;
use crate::routes::{INTEGRATION_API_VERSION, INTEGRATION_KIND};
use crate::strimzi::{KafkaTopic, KafkaUser};
use async_trait::async_trait;
use k8s_openapi::api::apps::v1::Deployment;
use k8s_openapi::api::core::v1::{ConfigMap, Service};
use kube::api::{Api, DeleteParams, DynamicObject, Patch, PatchParams, PostParams};
use kube::core::{ApiResource, GroupVersionKind};
use kube::Client;
use serde_json::Value;
use std::fmt;
use tracing::debug;

#[cfg(test)]
use mockall::automock;

/// Which part of an object decides whether it must be replaced
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiffScope {
    /// Only the `spec` field
    Spec,
    /// Every top-level field except `apiVersion`, `kind`, `metadata` and `status`
    NonMetadata,
}

/// Resource kinds the operator manages
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ManagedKind {
    Deployment,
    Service,
    KafkaTopic,
    KafkaUser,
    Integration,
}

impl ManagedKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Deployment => "Deployment",
            Self::Service => "Service",
            Self::KafkaTopic => "KafkaTopic",
            Self::KafkaUser => "KafkaUser",
            Self::Integration => "Integration",
        }
    }

    /// API coordinates used to address this kind dynamically
    pub fn api_resource(&self) -> ApiResource {
        match self {
            Self::Deployment => ApiResource::erase::<Deployment>(&()),
            Self::Service => ApiResource::erase::<Service>(&()),
            Self::KafkaTopic => ApiResource::erase::<KafkaTopic>(&()),
            Self::KafkaUser => ApiResource::erase::<KafkaUser>(&()),
            Self::Integration => integration_api_resource(),
        }
    }

    pub fn diff_scope(&self) -> DiffScope {
        match self {
            Self::Integration => DiffScope::NonMetadata,
            _ => DiffScope::Spec,
        }
    }

    /// Spec keys the API server fills in when the desired object leaves them unset
    pub fn server_defaulted_fields(&self) -> &'static [&'static str] {
        match self {
            Self::Deployment => &[
                "replicas",
                "revisionHistoryLimit",
                "progressDeadlineSeconds",
                "strategy",
                "creationTimestamp",
                "terminationMessagePath",
                "terminationMessagePolicy",
                "resources",
                "restartPolicy",
                "dnsPolicy",
                "schedulerName",
                "securityContext",
                "terminationGracePeriodSeconds",
            ],
            Self::Service => &[
                "clusterIP",
                "clusterIPs",
                "type",
                "sessionAffinity",
                "ipFamilies",
                "ipFamilyPolicy",
                "internalTrafficPolicy",
            ],
            Self::KafkaTopic | Self::KafkaUser | Self::Integration => &[],
        }
    }
}

impl fmt::Display for ManagedKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// API coordinates of the Camel K Integration kind
pub fn integration_api_resource() -> ApiResource {
    let (group, version) = INTEGRATION_API_VERSION
        .split_once('/')
        .unwrap_or(("camel.apache.org", "v1"));
    ApiResource::from_gvk_with_plural(
        &GroupVersionKind::gvk(group, version, INTEGRATION_KIND),
        "integrations",
    )
}

/// Identity of a managed object
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectKey {
    pub kind: ManagedKind,
    pub namespace: String,
    pub name: String,
}

impl ObjectKey {
    pub fn new(kind: ManagedKind, namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            kind,
            namespace: namespace.into(),
            name: name.into(),
        }
    }
}

impl fmt::Display for ObjectKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.kind, self.namespace, self.name)
    }
}

/// Read/write access to the cluster objects a reconcile touches
#[cfg_attr(test, automock)]
#[async_trait]
pub trait DomainClient: Send + Sync {
    /// Look up a ServiceDomainCluster; `None` when it does not exist
    async fn get_cluster(&self, namespace: &str, name: &str)
        -> Result<Option<ServiceDomainCluster>>;

    /// Look up a ConfigMap; `None` when it does not exist
    async fn get_config_map(&self, namespace: &str, name: &str) -> Result<Option<ConfigMap>>;

    /// Fetch the live form of a managed object
    async fn get_object(&self, key: &ObjectKey) -> Result<Option<Value>>;

    async fn create_object(&self, key: &ObjectKey, object: Value) -> Result<()>;

    /// Replace a live object wholesale. The object carries the live
    /// `metadata.resourceVersion`.
    async fn replace_object(&self, key: &ObjectKey, object: Value) -> Result<()>;

    /// Delete a managed object; returns whether it existed
    async fn delete_object(&self, key: &ObjectKey) -> Result<bool>;

    /// Overwrite the status subresource of a ServiceDomain
    async fn patch_domain_status(
        &self,
        namespace: &str,
        name: &str,
        status: &ServiceDomainStatus,
    ) -> Result<()>;
}

/// [`DomainClient`] backed by the Kubernetes API server
#[derive(Clone)]
pub struct KubeDomainClient {
    client: Client,
}

impl KubeDomainClient {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    fn dynamic_api(&self, key: &ObjectKey) -> Api<DynamicObject> {
        Api::namespaced_with(self.client.clone(), &key.namespace, &key.kind.api_resource())
    }

    fn post_params() -> PostParams {
        PostParams {
            field_manager: Some(OPERATOR_NAME.to_string()),
            ..Default::default()
        }
    }
}

/// Map an API error on a write to an apply failure naming the object
fn apply_error(key: &ObjectKey, err: kube::Error) -> OperatorError {
    OperatorError::ApplyFailed {
        kind: key.kind.to_string(),
        name: key.name.clone(),
        reason: err.to_string(),
    }
}

#[async_trait]
impl DomainClient for KubeDomainClient {
    async fn get_cluster(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<Option<ServiceDomainCluster>> {
        let api: Api<ServiceDomainCluster> = Api::namespaced(self.client.clone(), namespace);
        Ok(api.get_opt(name).await?)
    }

    async fn get_config_map(&self, namespace: &str, name: &str) -> Result<Option<ConfigMap>> {
        let api: Api<ConfigMap> = Api::namespaced(self.client.clone(), namespace);
        Ok(api.get_opt(name).await?)
    }

    async fn get_object(&self, key: &ObjectKey) -> Result<Option<Value>> {
        match self.dynamic_api(key).get_opt(&key.name).await? {
            Some(object) => Ok(Some(serde_json::to_value(object)?)),
            None => Ok(None),
        }
    }

    async fn create_object(&self, key: &ObjectKey, object: Value) -> Result<()> {
        debug!(object = %key, "Creating object");
        let object: DynamicObject = serde_json::from_value(object)?;
        self.dynamic_api(key)
            .create(&Self::post_params(), &object)
            .await
            .map_err(|e| apply_error(key, e))?;
        Ok(())
    }

    async fn replace_object(&self, key: &ObjectKey, object: Value) -> Result<()> {
        debug!(object = %key, "Replacing object");
        let object: DynamicObject = serde_json::from_value(object)?;
        self.dynamic_api(key)
            .replace(&key.name, &Self::post_params(), &object)
            .await
            .map_err(|e| apply_error(key, e))?;
        Ok(())
    }

    async fn delete_object(&self, key: &ObjectKey) -> Result<bool> {
        debug!(object = %key, "Deleting object");
        match self
            .dynamic_api(key)
            .delete(&key.name, &DeleteParams::background())
            .await
        {
            Ok(_) => Ok(true),
            Err(kube::Error::Api(ae)) if ae.code == 404 => Ok(false),
            Err(e) => Err(apply_error(key, e)),
        }
    }

    async fn patch_domain_status(
        &self,
        namespace: &str,
        name: &str,
        status: &ServiceDomainStatus,
    ) -> Result<()> {
        let api: Api<ServiceDomain> = Api::namespaced(self.client.clone(), namespace);

        debug!(name = %name, error = ?status.error, "Updating service domain status");

        let patch = serde_json::json!({
            "status": status
        });

        api.patch_status(name, &PatchParams::default(), &Patch::Merge(&patch))
            .await
            .map_err(OperatorError::from)?;

        Ok(())
    }
}
