//! ServiceDomain reconciliation
//!
//! One reconcile resolves the referenced ServiceDomainCluster, applies the
//! Deployment and Service, adds or removes the HTTP integration, provisions
//! the topic (and optionally a KafkaUser) and always finishes by writing the
//! domain status. Any failure along the way ends up in `status.error`; only
//! a failure to write the status itself is returned to the caller.

use crate::apply::{self, ApplyOutcome};
use crate::client::{DomainClient, ManagedKind, ObjectKey};
use crate::config::OperatorConfig;
use crate::crd::{ServiceDomain, ServiceDomainStatus, ServiceDomainType};
use crate::error::{OperatorError, Result};
use crate::naming;
use crate::resources::ResourceBuilder;
use crate::routes;
use kube::ResourceExt;
use serde::Serialize;
use tracing::{info, instrument, warn};
use validator::Validate;

/// Outcome of a reconcile that managed to write status
#[derive(Debug, Clone, PartialEq)]
pub struct ReconcileReport {
    /// Status written to the domain
    pub status: ServiceDomainStatus,
    /// Every apply performed, in order
    pub changes: Vec<(ObjectKey, ApplyOutcome)>,
}

impl ReconcileReport {
    /// Number of objects created or replaced
    pub fn writes(&self) -> usize {
        self.changes.iter().filter(|(_, o)| o.is_write()).count()
    }
}

/// Address of the Kafka bus a domain's cluster publishes
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedCluster {
    pub namespace: String,
    pub kafka_broker: String,
}

/// Reconciles ServiceDomains against a [`DomainClient`]
pub struct DomainReconciler<C> {
    client: C,
    config: OperatorConfig,
}

impl<C: DomainClient> DomainReconciler<C> {
    pub fn new(client: C, config: OperatorConfig) -> Self {
        Self { client, config }
    }

    pub fn client(&self) -> &C {
        &self.client
    }

    pub fn config(&self) -> &OperatorConfig {
        &self.config
    }

    /// Reconcile one domain and write its status
    #[instrument(skip(self, domain), fields(name = %domain.name_any(), namespace = domain.namespace()))]
    pub async fn reconcile(&self, domain: &ServiceDomain) -> Result<ReconcileReport> {
        let builder = ResourceBuilder::new(domain)?;
        let mut changes = Vec::new();

        let status = match self.converge(&builder, &mut changes).await {
            Ok(topic_name) => {
                info!(topic = %topic_name, "Service domain reconciled");
                ServiceDomainStatus::ready(topic_name)
            }
            Err(e) => {
                warn!(error = %e, "Service domain reconcile failed");
                ServiceDomainStatus::failed(e.to_string())
            }
        };

        self.client
            .patch_domain_status(builder.namespace(), builder.name(), &status)
            .await?;

        Ok(ReconcileReport { status, changes })
    }

    async fn converge(
        &self,
        builder: &ResourceBuilder<'_>,
        changes: &mut Vec<(ObjectKey, ApplyOutcome)>,
    ) -> Result<String> {
        validate_domain(builder.domain())?;

        let cluster = self.resolve_cluster(builder).await?;

        let deployment = builder.build_deployment(&cluster.kafka_broker);
        self.apply_typed(
            ObjectKey::new(ManagedKind::Deployment, builder.namespace(), builder.name()),
            &deployment,
            changes,
        )
        .await?;

        let service = builder.build_service();
        self.apply_typed(
            ObjectKey::new(ManagedKind::Service, builder.namespace(), builder.name()),
            &service,
            changes,
        )
        .await?;

        self.reconcile_exposure(builder, changes).await?;

        let topic = builder.build_topic(&cluster.namespace, &self.config.kafka_cluster);
        let topic_name = topic.name_any();
        self.apply_typed(
            ObjectKey::new(ManagedKind::KafkaTopic, &cluster.namespace, &topic_name),
            &topic,
            changes,
        )
        .await?;

        if self.config.provision_credentials {
            self.provision_credentials(builder, &topic_name, &cluster.namespace, changes)
                .await?;
        }

        Ok(topic_name)
    }

    /// Find the referenced cluster and its Kafka bootstrap address
    pub async fn resolve_cluster(&self, builder: &ResourceBuilder<'_>) -> Result<ResolvedCluster> {
        let cluster_ref = &builder.domain().spec.cluster_ref;
        let cluster = self
            .client
            .get_cluster(builder.namespace(), cluster_ref)
            .await?
            .ok_or_else(|| {
                OperatorError::ClusterNotFound(format!("{}/{}", builder.namespace(), cluster_ref))
            })?;

        let kafka_broker = cluster
            .status
            .as_ref()
            .and_then(|s| s.kafka_broker.clone())
            .filter(|b| !b.trim().is_empty())
            .ok_or_else(|| {
                OperatorError::BrokerNotReady(format!("{}/{}", builder.namespace(), cluster_ref))
            })?;

        Ok(ResolvedCluster {
            namespace: cluster
                .namespace()
                .unwrap_or_else(|| builder.namespace().to_string()),
            kafka_broker,
        })
    }

    /// Create or remove the Camel K integration to match `spec.expose`
    async fn reconcile_exposure(
        &self,
        builder: &ResourceBuilder<'_>,
        changes: &mut Vec<(ObjectKey, ApplyOutcome)>,
    ) -> Result<()> {
        let key = ObjectKey::new(
            ManagedKind::Integration,
            builder.namespace(),
            naming::integration_name(builder.name()),
        );

        if !builder.domain().spec.exposes_http() {
            if apply::remove(&self.client, &key).await? {
                info!(integration = %key.name, "HTTP exposure withdrawn");
            }
            return Ok(());
        }

        let document = match self.load_route_document(builder.domain().spec.domain_type).await {
            Ok(document) => document,
            Err(e) if e.is_prerequisite() => {
                warn!(error = %e, "Skipping HTTP exposure");
                return Ok(());
            }
            Err(e) => return Err(e),
        };

        let flows = routes::parse_flows(&document)?;
        let integration =
            routes::build_integration(builder, &self.config.operator_version, flows)?;
        let outcome = apply::apply(&self.client, &key, integration).await?;
        changes.push((key, outcome));
        Ok(())
    }

    /// Fetch the route document, checking both exposure ConfigMaps exist
    async fn load_route_document(&self, domain_type: ServiceDomainType) -> Result<String> {
        let namespace = &self.config.operator_namespace;
        let routes_name = naming::routes_config_map_name(domain_type);

        let routes_cm = self
            .client
            .get_config_map(namespace, &routes_name)
            .await?
            .ok_or_else(|| {
                OperatorError::MissingRouteConfig(format!(
                    "ConfigMap {namespace}/{routes_name} not found"
                ))
            })?;

        let document = routes_cm
            .data
            .and_then(|mut data| data.remove(naming::ROUTES_KEY))
            .ok_or_else(|| {
                OperatorError::MissingRouteConfig(format!(
                    "ConfigMap {namespace}/{routes_name} has no {} key",
                    naming::ROUTES_KEY
                ))
            })?;

        let openapi_name = naming::openapi_config_map_name(domain_type);
        if self
            .client
            .get_config_map(namespace, &openapi_name)
            .await?
            .is_none()
        {
            return Err(OperatorError::MissingRouteConfig(format!(
                "ConfigMap {namespace}/{openapi_name} not found"
            )));
        }

        Ok(document)
    }

    /// Provision the mutual-TLS KafkaUser for a domain's topic
    async fn provision_credentials(
        &self,
        builder: &ResourceBuilder<'_>,
        topic_name: &str,
        cluster_namespace: &str,
        changes: &mut Vec<(ObjectKey, ApplyOutcome)>,
    ) -> Result<()> {
        let user =
            builder.build_kafka_user(topic_name, cluster_namespace, &self.config.kafka_cluster);
        let key = ObjectKey::new(ManagedKind::KafkaUser, cluster_namespace, user.name_any());
        self.apply_typed(key, &user, changes).await
    }

    async fn apply_typed<T: Serialize>(
        &self,
        key: ObjectKey,
        object: &T,
        changes: &mut Vec<(ObjectKey, ApplyOutcome)>,
    ) -> Result<()> {
        let desired = serde_json::to_value(object)?;
        let outcome = apply::apply(&self.client, &key, desired).await?;
        changes.push((key, outcome));
        Ok(())
    }
}

/// Reject domains whose spec fails field validation
fn validate_domain(domain: &ServiceDomain) -> Result<()> {
    if let Err(errors) = domain.spec.validate() {
        let error_messages: Vec<String> = errors
            .field_errors()
            .iter()
            .flat_map(|(field, errs)| {
                errs.iter().map(move |e| match &e.message {
                    Some(message) => format!("{}: {}", field, message),
                    None => format!("{}: {}", field, e.code),
                })
            })
            .collect();
        return Err(OperatorError::ValidationError(error_messages.join("; ")));
    }
    Ok(())
}
