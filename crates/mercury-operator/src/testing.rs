//! In-memory cluster used by reconciler tests

use crate::client::{DomainClient, ManagedKind, ObjectKey};
use crate::crd::{
    ExposeType, ServiceDomain, ServiceDomainCluster, ServiceDomainClusterSpec,
    ServiceDomainClusterStatus, ServiceDomainSpec, ServiceDomainStatus, ServiceDomainType,
};
use crate::error::{OperatorError, Result};
use async_trait::async_trait;
use k8s_openapi::api::core::v1::ConfigMap;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::sync::Mutex;

#[derive(Default)]
pub struct MemoryState {
    pub objects: BTreeMap<ObjectKey, Value>,
    pub clusters: BTreeMap<(String, String), ServiceDomainCluster>,
    pub config_maps: BTreeMap<(String, String), ConfigMap>,
    pub statuses: Vec<ServiceDomainStatus>,
    pub writes: usize,
    pub fail_writes_for: Option<ManagedKind>,
    next_version: u64,
}

/// Object store that behaves like a small API server: it assigns resource
/// versions, fills a few server-side defaults and rejects stale replaces.
#[derive(Default)]
pub struct MemoryClient {
    pub state: Mutex<MemoryState>,
}

impl MemoryClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_cluster(self, cluster: ServiceDomainCluster) -> Self {
        {
            let mut state = self.state.lock().unwrap();
            let key = (
                cluster.metadata.namespace.clone().unwrap(),
                cluster.metadata.name.clone().unwrap(),
            );
            state.clusters.insert(key, cluster);
        }
        self
    }

    pub fn with_config_map(self, namespace: &str, name: &str, data: &[(&str, &str)]) -> Self {
        self.set_config_map(namespace, name, data);
        self
    }

    /// Create or overwrite a ConfigMap in place
    pub fn set_config_map(&self, namespace: &str, name: &str, data: &[(&str, &str)]) {
        let cm = ConfigMap {
            metadata: ObjectMeta {
                name: Some(name.to_string()),
                namespace: Some(namespace.to_string()),
                ..Default::default()
            },
            data: Some(
                data.iter()
                    .map(|(k, v)| (k.to_string(), v.to_string()))
                    .collect(),
            ),
            ..Default::default()
        };
        self.state
            .lock()
            .unwrap()
            .config_maps
            .insert((namespace.to_string(), name.to_string()), cm);
    }

    pub fn remove_config_map(&self, namespace: &str, name: &str) {
        self.state
            .lock()
            .unwrap()
            .config_maps
            .remove(&(namespace.to_string(), name.to_string()));
    }

    pub fn writes(&self) -> usize {
        self.state.lock().unwrap().writes
    }

    pub fn object(&self, kind: ManagedKind, namespace: &str, name: &str) -> Option<Value> {
        let key = ObjectKey::new(kind, namespace, name);
        self.state.lock().unwrap().objects.get(&key).cloned()
    }

    pub fn count(&self, kind: ManagedKind) -> usize {
        self.state
            .lock()
            .unwrap()
            .objects
            .keys()
            .filter(|k| k.kind == kind)
            .count()
    }

    pub fn last_status(&self) -> Option<ServiceDomainStatus> {
        self.state.lock().unwrap().statuses.last().cloned()
    }

    pub fn fail_writes_for(&self, kind: ManagedKind) {
        self.state.lock().unwrap().fail_writes_for = Some(kind);
    }

    fn check_writable(state: &MemoryState, key: &ObjectKey) -> Result<()> {
        if state.fail_writes_for == Some(key.kind) {
            return Err(OperatorError::ApplyFailed {
                kind: key.kind.to_string(),
                name: key.name.clone(),
                reason: "admission webhook denied the request".to_string(),
            });
        }
        Ok(())
    }

    fn stamp(state: &mut MemoryState, key: &ObjectKey, mut object: Value) -> Value {
        state.next_version += 1;
        object["metadata"]["resourceVersion"] = json!(state.next_version.to_string());
        match key.kind {
            ManagedKind::Deployment => {
                object["spec"]["replicas"] = json!(1);
                object["spec"]["progressDeadlineSeconds"] = json!(600);
                object["status"] = json!({"observedGeneration": 1});
            }
            ManagedKind::Service => {
                object["spec"]["clusterIP"] = json!("10.0.0.12");
                object["spec"]["type"] = json!("ClusterIP");
            }
            _ => {}
        }
        object
    }
}

#[async_trait]
impl DomainClient for MemoryClient {
    async fn get_cluster(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<Option<ServiceDomainCluster>> {
        let state = self.state.lock().unwrap();
        Ok(state
            .clusters
            .get(&(namespace.to_string(), name.to_string()))
            .cloned())
    }

    async fn get_config_map(&self, namespace: &str, name: &str) -> Result<Option<ConfigMap>> {
        let state = self.state.lock().unwrap();
        Ok(state
            .config_maps
            .get(&(namespace.to_string(), name.to_string()))
            .cloned())
    }

    async fn get_object(&self, key: &ObjectKey) -> Result<Option<Value>> {
        Ok(self.state.lock().unwrap().objects.get(key).cloned())
    }

    async fn create_object(&self, key: &ObjectKey, object: Value) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        Self::check_writable(&state, key)?;
        if state.objects.contains_key(key) {
            return Err(OperatorError::ApplyFailed {
                kind: key.kind.to_string(),
                name: key.name.clone(),
                reason: "already exists".to_string(),
            });
        }
        let object = Self::stamp(&mut state, key, object);
        state.objects.insert(key.clone(), object);
        state.writes += 1;
        Ok(())
    }

    async fn replace_object(&self, key: &ObjectKey, object: Value) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        Self::check_writable(&state, key)?;
        let live_version = state
            .objects
            .get(key)
            .and_then(|o| o.pointer("/metadata/resourceVersion").cloned());
        if live_version.is_none() || live_version.as_ref() != object.pointer("/metadata/resourceVersion") {
            return Err(OperatorError::ApplyFailed {
                kind: key.kind.to_string(),
                name: key.name.clone(),
                reason: "conflict".to_string(),
            });
        }
        let object = Self::stamp(&mut state, key, object);
        state.objects.insert(key.clone(), object);
        state.writes += 1;
        Ok(())
    }

    async fn delete_object(&self, key: &ObjectKey) -> Result<bool> {
        let mut state = self.state.lock().unwrap();
        let existed = state.objects.remove(key).is_some();
        if existed {
            state.writes += 1;
        }
        Ok(existed)
    }

    async fn patch_domain_status(
        &self,
        _namespace: &str,
        _name: &str,
        status: &ServiceDomainStatus,
    ) -> Result<()> {
        self.state.lock().unwrap().statuses.push(status.clone());
        Ok(())
    }
}

pub fn test_domain(name: &str, domain_type: ServiceDomainType, http: bool) -> ServiceDomain {
    ServiceDomain {
        metadata: ObjectMeta {
            name: Some(name.to_string()),
            namespace: Some("bank".to_string()),
            uid: Some(format!("{name}-uid")),
            ..Default::default()
        },
        spec: ServiceDomainSpec {
            cluster_ref: "mercury".to_string(),
            domain_type,
            business_image: "img:1".to_string(),
            expose: if http { vec![ExposeType::Http] } else { vec![] },
        },
        status: None,
    }
}

pub fn test_cluster(broker: Option<&str>) -> ServiceDomainCluster {
    ServiceDomainCluster {
        metadata: ObjectMeta {
            name: Some("mercury".to_string()),
            namespace: Some("bank".to_string()),
            ..Default::default()
        },
        spec: ServiceDomainClusterSpec {},
        status: Some(ServiceDomainClusterStatus {
            kafka_broker: broker.map(str::to_string),
        }),
    }
}

/// A cluster that has not reported any status yet
pub fn test_cluster_without_status() -> ServiceDomainCluster {
    ServiceDomainCluster {
        status: None,
        ..test_cluster(None)
    }
}
