//! ServiceDomain Controller
//!
//! This module wires the reconciler into the Kubernetes controller runtime.
//! It watches ServiceDomains and the objects they own, and re-triggers every
//! domain referencing a ServiceDomainCluster when that cluster changes.

use crate::apply::ApplyOutcome;
use crate::client::{integration_api_resource, KubeDomainClient, ObjectKey};
use crate::config::OperatorConfig;
use crate::crd::{ServiceDomain, ServiceDomainCluster};
use crate::error::{OperatorError, Result};
use crate::reconciler::{DomainReconciler, ReconcileReport};
use crate::strimzi::KafkaTopic;
use futures::StreamExt;
use k8s_openapi::api::apps::v1::Deployment;
use k8s_openapi::api::core::v1::Service;
use kube::api::{Api, DynamicObject};
use kube::runtime::controller::{Action, Controller};
use kube::runtime::reflector::ObjectRef;
use kube::runtime::watcher::Config;
use kube::{Client, ResourceExt};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, instrument, warn};

/// Requeue interval for error cases (base for exponential backoff)
const ERROR_REQUEUE_SECONDS: u64 = 30;

/// Maximum requeue delay for error backoff
const MAX_ERROR_REQUEUE_SECONDS: u64 = 600;

/// Context passed to the controller
pub struct ControllerContext {
    /// Reconciler bound to the live API server
    pub reconciler: DomainReconciler<KubeDomainClient>,
    /// Metrics recorder (optional)
    pub metrics: Option<ControllerMetrics>,
    /// Per-domain error retry counts for exponential backoff
    pub error_counts: dashmap::DashMap<String, u32>,
}

/// Metrics for the controller
#[derive(Clone)]
pub struct ControllerMetrics {
    /// Counter for reconciliation attempts
    pub reconciliations: metrics::Counter,
    /// Counter for reconciliation errors, including ones written to status
    pub errors: metrics::Counter,
    /// Histogram for reconciliation duration
    pub duration: metrics::Histogram,
}

impl ControllerMetrics {
    /// Create new controller metrics
    pub fn new() -> Self {
        Self {
            reconciliations: metrics::counter!("mercury_operator_reconciliations_total"),
            errors: metrics::counter!("mercury_operator_reconciliation_errors_total"),
            duration: metrics::histogram!("mercury_operator_reconciliation_duration_seconds"),
        }
    }

    /// Count one create or replace of a managed object
    pub fn record_write(&self, key: &ObjectKey, outcome: ApplyOutcome) {
        metrics::counter!(
            "mercury_operator_resource_writes_total",
            "kind" => key.kind.as_str(),
            "outcome" => outcome.as_str()
        )
        .increment(1);
    }

    fn record_report(&self, report: &ReconcileReport) {
        for (key, outcome) in report.changes.iter().filter(|(_, o)| o.is_write()) {
            self.record_write(key, *outcome);
        }
        if report.status.error.is_some() {
            self.errors.increment(1);
        }
    }
}

impl Default for ControllerMetrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Scoped API handle: one namespace, or all of them
fn scoped_api<K>(client: &Client, namespace: Option<&str>) -> Api<K>
where
    K: kube::Resource<Scope = kube::core::NamespaceResourceScope>,
    <K as kube::Resource>::DynamicType: Default,
{
    match namespace {
        Some(ns) => Api::namespaced(client.clone(), ns),
        None => Api::all(client.clone()),
    }
}

/// Start the ServiceDomain controller
pub async fn run_controller(client: Client, config: OperatorConfig) -> Result<()> {
    let namespace = config.watch_namespace.clone();
    let ns = namespace.as_deref();

    let domains: Api<ServiceDomain> = scoped_api(&client, ns);
    let clusters: Api<ServiceDomainCluster> = scoped_api(&client, ns);
    let deployments: Api<Deployment> = scoped_api(&client, ns);
    let services: Api<Service> = scoped_api(&client, ns);
    let topics: Api<KafkaTopic> = scoped_api(&client, ns);

    let integration_resource = integration_api_resource();
    let integrations: Api<DynamicObject> = match ns {
        Some(ns) => Api::namespaced_with(client.clone(), ns, &integration_resource),
        None => Api::all_with(client.clone(), &integration_resource),
    };

    info!(
        namespace = ns.unwrap_or("all"),
        operator_namespace = %config.operator_namespace,
        "Starting ServiceDomain controller"
    );

    let ctx = Arc::new(ControllerContext {
        reconciler: DomainReconciler::new(KubeDomainClient::new(client.clone()), config),
        metrics: Some(ControllerMetrics::new()),
        error_counts: dashmap::DashMap::new(),
    });

    let controller = Controller::new(domains, Config::default());
    let store = controller.store();

    controller
        .owns(deployments, Config::default())
        .owns(services, Config::default())
        .owns(topics, Config::default())
        .owns_with(integrations, integration_resource, Config::default())
        .watches(clusters, Config::default(), move |cluster| {
            domains_for_cluster(&store.state(), &cluster)
        })
        .shutdown_on_signal()
        .run(reconcile, error_policy, ctx)
        .for_each(|result| async move {
            match result {
                Ok((obj, action)) => {
                    debug!(
                        name = obj.name,
                        namespace = obj.namespace,
                        ?action,
                        "Reconciliation completed"
                    );
                }
                Err(e) => {
                    error!(error = %e, "Reconciliation failed");
                }
            }
        })
        .await;

    info!("ServiceDomain controller stopped");
    Ok(())
}

/// Domains in the cluster's namespace whose `clusterRef` names it
fn domains_for_cluster(
    domains: &[Arc<ServiceDomain>],
    cluster: &ServiceDomainCluster,
) -> Vec<ObjectRef<ServiceDomain>> {
    let cluster_name = cluster.name_any();
    let cluster_ns = cluster.namespace();
    domains
        .iter()
        .filter(|d| d.spec.cluster_ref == cluster_name && d.namespace() == cluster_ns)
        .map(|d| ObjectRef::from_obj(d.as_ref()))
        .collect()
}

/// Main reconciliation function
#[instrument(skip(domain, ctx), fields(name = %domain.name_any(), namespace = domain.namespace()))]
async fn reconcile(domain: Arc<ServiceDomain>, ctx: Arc<ControllerContext>) -> Result<Action> {
    let start = std::time::Instant::now();

    if let Some(ref metrics) = ctx.metrics {
        metrics.reconciliations.increment(1);
    }

    let result = ctx.reconciler.reconcile(&domain).await;

    if let Some(ref metrics) = ctx.metrics {
        metrics.duration.record(start.elapsed().as_secs_f64());
    }

    match result {
        Ok(report) => {
            ctx.error_counts.remove(&error_key(&domain));
            if let Some(ref metrics) = ctx.metrics {
                metrics.record_report(&report);
            }
            Ok(Action::requeue(ctx.reconciler.config().resync_interval))
        }
        Err(e) => {
            if let Some(ref metrics) = ctx.metrics {
                metrics.errors.increment(1);
            }
            Err(OperatorError::ReconcileFailed(e.to_string()))
        }
    }
}

fn error_key(domain: &ServiceDomain) -> String {
    format!(
        "{}/{}",
        domain.namespace().unwrap_or_default(),
        domain.name_any()
    )
}

/// Exponential backoff: 30s, 60s, 120s, 240s, 480s, then capped at 600s
fn backoff_delay(retries: u32) -> Duration {
    let base = Duration::from_secs(ERROR_REQUEUE_SECONDS);
    let backoff = base * 2u32.saturating_pow(retries.saturating_sub(1).min(5));
    backoff.min(Duration::from_secs(MAX_ERROR_REQUEUE_SECONDS))
}

/// Error policy for the controller
fn error_policy(
    domain: Arc<ServiceDomain>,
    error: &OperatorError,
    ctx: Arc<ControllerContext>,
) -> Action {
    let key = error_key(&domain);
    let retries = {
        let mut entry = ctx.error_counts.entry(key.clone()).or_insert(0);
        *entry += 1;
        *entry
    };

    let delay = backoff_delay(retries);

    warn!(
        error = %error,
        retry = retries,
        retryable = error.is_retryable(),
        delay_secs = delay.as_secs(),
        "Reconciliation error for '{}', will retry",
        key
    );

    Action::requeue(delay)
}
