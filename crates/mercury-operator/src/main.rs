//! Mercury Kubernetes Operator
//!
//! This operator manages ServiceDomain custom resources, deploying each BIAN
//! service domain together with its Kafka topic and optional HTTP integration.

use anyhow::{Context, Result};
use clap::Parser;
use kube::Client;
use mercury_operator::config::{OperatorConfig, DEFAULT_KAFKA_CLUSTER};
use mercury_operator::controller;
use mercury_operator::crd::{ServiceDomain, ServiceDomainCluster};
use std::net::SocketAddr;
use std::time::Duration;
use tracing::{info, Level};
use tracing_subscriber::fmt::format::FmtSpan;

/// Mercury Kubernetes Operator
#[derive(Parser, Debug)]
#[command(name = "mercury-operator")]
#[command(about = "Kubernetes operator for Mercury BIAN service domains")]
#[command(version)]
struct Args {
    /// Metrics server address
    #[arg(long, env = "METRICS_ADDR", default_value = "0.0.0.0:8080")]
    metrics_addr: SocketAddr,

    /// Health probe address
    #[arg(long, env = "HEALTH_ADDR", default_value = "0.0.0.0:8081")]
    health_addr: SocketAddr,

    /// Namespace to watch (empty for cluster-wide)
    #[arg(long, env = "WATCH_NAMESPACE", default_value = "")]
    namespace: String,

    /// Namespace holding the integration ConfigMaps (empty for the client default)
    #[arg(long, env = "POD_NAMESPACE", default_value = "")]
    operator_namespace: String,

    /// Version pinned into integration dependencies
    #[arg(long, env = "OPERATOR_VERSION", default_value = env!("CARGO_PKG_VERSION"))]
    operator_version: String,

    /// Strimzi Kafka cluster topics and users belong to
    #[arg(long, env = "KAFKA_CLUSTER", default_value = DEFAULT_KAFKA_CLUSTER)]
    kafka_cluster: String,

    /// Provision a mutual-TLS KafkaUser for every domain
    #[arg(long, env = "PROVISION_CREDENTIALS", default_value = "false")]
    provision_credentials: bool,

    /// Seconds between periodic reconciles of a domain
    #[arg(long, env = "RESYNC_SECS", default_value = "300")]
    resync_secs: u64,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    log_level: Level,

    /// Enable JSON log format
    #[arg(long, env = "LOG_JSON", default_value = "false")]
    log_json: bool,

    /// Print CRD YAML and exit
    #[arg(long)]
    print_crd: bool,
}

impl Args {
    /// Resolve into library configuration, filling blanks from the client
    fn into_config(self, client: &Client) -> OperatorConfig {
        let operator_namespace = if self.operator_namespace.is_empty() {
            client.default_namespace().to_string()
        } else {
            self.operator_namespace
        };

        OperatorConfig {
            watch_namespace: (!self.namespace.is_empty()).then_some(self.namespace),
            operator_namespace,
            operator_version: self.operator_version,
            kafka_cluster: self.kafka_cluster,
            provision_credentials: self.provision_credentials,
            resync_interval: Duration::from_secs(self.resync_secs),
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    if args.print_crd {
        print_crd()?;
        return Ok(());
    }

    init_logging(&args);

    // Initialize metrics
    let metrics_addr = args.metrics_addr;
    tokio::spawn(async move {
        if let Err(e) = start_metrics_server(metrics_addr).await {
            tracing::error!(error = %e, "Metrics server failed");
        }
    });

    // Start health server
    let health_addr = args.health_addr;
    tokio::spawn(async move {
        if let Err(e) = start_health_server(health_addr).await {
            tracing::error!(error = %e, "Health server failed");
        }
    });

    let client = Client::try_default()
        .await
        .context("Failed to create Kubernetes client")?;

    let config = args.into_config(&client);

    info!(
        version = env!("CARGO_PKG_VERSION"),
        namespace = config.watch_namespace.as_deref().unwrap_or("all"),
        operator_namespace = %config.operator_namespace,
        provision_credentials = config.provision_credentials,
        "Starting Mercury Kubernetes Operator"
    );

    controller::run_controller(client, config)
        .await
        .context("Controller failed")?;

    Ok(())
}

/// Initialize logging subsystem
fn init_logging(args: &Args) {
    let subscriber = tracing_subscriber::fmt()
        .with_max_level(args.log_level)
        .with_span_events(FmtSpan::CLOSE)
        .with_target(true)
        .with_thread_ids(false)
        .with_line_number(false);

    if args.log_json {
        subscriber.json().init();
    } else {
        subscriber.init();
    }
}

/// Start the Prometheus metrics server
async fn start_metrics_server(addr: SocketAddr) -> Result<()> {
    use metrics_exporter_prometheus::PrometheusBuilder;

    info!(address = %addr, "Starting metrics server");

    PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .context("Failed to install Prometheus exporter")?;

    std::future::pending::<()>().await;

    Ok(())
}

/// Start the health probe server
async fn start_health_server(addr: SocketAddr) -> Result<()> {
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    info!(address = %addr, "Starting health server");

    let listener = TcpListener::bind(addr)
        .await
        .context("Failed to bind health server")?;

    loop {
        let (mut socket, _) = listener.accept().await?;

        tokio::spawn(async move {
            let mut buf = [0; 1024];
            if socket.read(&mut buf).await.is_ok() {
                let response = "HTTP/1.1 200 OK\r\nContent-Length: 2\r\n\r\nOK";
                let _ = socket.write_all(response.as_bytes()).await;
            }
        });
    }
}

/// Print both owned CRDs as a multi-document YAML stream
fn print_crd() -> Result<()> {
    use kube::CustomResourceExt;

    let domain = serde_yaml::to_string(&ServiceDomain::crd())?;
    let cluster = serde_yaml::to_string(&ServiceDomainCluster::crd())?;
    println!("{}---\n{}", domain, cluster);

    Ok(())
}
