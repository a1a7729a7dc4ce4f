//! Camel K integration document
//!
//! The HTTP exposure of a service domain is a Camel K `Integration` whose
//! flows come from a route document supplied by the platform team in a
//! ConfigMap. This module turns that text into flows and merges them into
//! the fixed integration scaffold.

use crate::error::{OperatorError, Result};
use crate::naming;
use crate::resources::{ResourceBuilder, GRPC_PORT};
use regex::Regex;
use serde_json::{json, Value};
use std::sync::LazyLock;

pub const INTEGRATION_API_VERSION: &str = "camel.apache.org/v1";
pub const INTEGRATION_KIND: &str = "Integration";

/// Full-line comments in the route document
static COMMENT_LINE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^#.*$").expect("comment pattern is a valid regex"));

/// Transport codec every integration needs to talk to the gRPC service
const PROTOBUF_DEPENDENCY: &str = "camel:protobuf";

/// Remove full-line `#` comments and surrounding whitespace
pub fn strip_comments(text: &str) -> String {
    COMMENT_LINE.replace_all(text, "").trim().to_string()
}

/// Parse a route document into the integration's flow list
pub fn parse_flows(text: &str) -> Result<Value> {
    let cleaned = strip_comments(text);
    if cleaned.is_empty() {
        return Err(OperatorError::InvalidRoutes(
            "route document is empty".to_string(),
        ));
    }

    let flows: Value = serde_yaml::from_str(&cleaned)?;
    if !flows.is_array() {
        return Err(OperatorError::InvalidRoutes(
            "route document must be a list of flows".to_string(),
        ));
    }
    Ok(flows)
}

/// Maven coordinate of the shared module for a domain type
fn common_dependency(type_key: &str, operator_version: &str) -> String {
    format!("mvn:com.redhat.mercury:{type_key}-common:{operator_version}")
}

/// Merge parsed flows into the integration scaffold for a domain
pub fn build_integration(
    builder: &ResourceBuilder<'_>,
    operator_version: &str,
    flows: Value,
) -> Result<Value> {
    let domain_type = builder.domain().spec.domain_type;
    let type_key = naming::type_key(domain_type);
    let owner = serde_json::to_value(builder.owner_reference())?;

    Ok(json!({
        "apiVersion": INTEGRATION_API_VERSION,
        "kind": INTEGRATION_KIND,
        "metadata": {
            "name": naming::integration_name(builder.name()),
            "namespace": builder.namespace(),
            "labels": naming::managed_by_labels(),
            "ownerReferences": [owner],
        },
        "spec": {
            "traits": {
                "environment": {
                    "configuration": {
                        "vars": [
                            format!("MERCURY_BINDING_SERVICE_HOST={}", builder.name()),
                            format!("MERCURY_BINDING_SERVICE_PORT={GRPC_PORT}"),
                        ]
                    }
                },
                "openapi": {
                    "configuration": {
                        "configmaps": [naming::openapi_config_map_name(domain_type)]
                    }
                }
            },
            "dependencies": [
                common_dependency(&type_key, operator_version),
                PROTOBUF_DEPENDENCY,
            ],
            "flows": flows,
        }
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crd::{ServiceDomain, ServiceDomainSpec, ServiceDomainType};
    use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;

    const ROUTES: &str = "# Generated routes\n\
- from:\n    uri: direct:initiate\n    steps:\n      - to: grpc://payment:9000\n\
# trailing comment\n";

    fn create_test_domain() -> ServiceDomain {
        ServiceDomain {
            metadata: ObjectMeta {
                name: Some("payment".to_string()),
                namespace: Some("bank".to_string()),
                uid: Some("uid-1".to_string()),
                ..Default::default()
            },
            spec: ServiceDomainSpec {
                cluster_ref: "mercury".to_string(),
                domain_type: ServiceDomainType::PaymentInitiation,
                business_image: "img:1".to_string(),
                expose: vec![crate::crd::ExposeType::Http],
            },
            status: None,
        }
    }

    #[test]
    fn test_strip_comments() {
        let stripped = strip_comments("# header\nkey: value\n  # indented stays\n#end");
        assert_eq!(stripped, "key: value\n  # indented stays");
    }

    #[test]
    fn test_parse_flows() {
        let flows = parse_flows(ROUTES).unwrap();
        assert_eq!(
            flows,
            json!([{
                "from": {
                    "uri": "direct:initiate",
                    "steps": [{"to": "grpc://payment:9000"}]
                }
            }])
        );
    }

    #[test]
    fn test_parse_flows_rejects_bad_documents() {
        assert!(matches!(
            parse_flows("# only comments\n"),
            Err(OperatorError::InvalidRoutes(_))
        ));
        assert!(matches!(
            parse_flows("from: {uri: x}"),
            Err(OperatorError::InvalidRoutes(_))
        ));
        assert!(matches!(
            parse_flows("- from: [unclosed"),
            Err(OperatorError::YamlError(_))
        ));
    }

    #[test]
    fn test_build_integration() {
        let domain = create_test_domain();
        let builder = ResourceBuilder::new(&domain).unwrap();
        let flows = parse_flows(ROUTES).unwrap();
        let integration = build_integration(&builder, "1.2.3", flows.clone()).unwrap();

        assert_eq!(integration["apiVersion"], "camel.apache.org/v1");
        assert_eq!(integration["kind"], "Integration");
        assert_eq!(integration["metadata"]["name"], "payment-camelk-rest");
        assert_eq!(integration["metadata"]["namespace"], "bank");
        assert_eq!(
            integration["metadata"]["labels"]["app.kubernetes.io/managed-by"],
            "mercury-operator"
        );
        assert_eq!(
            integration["metadata"]["ownerReferences"][0]["uid"],
            "uid-1"
        );

        let spec = &integration["spec"];
        assert_eq!(
            spec["traits"]["environment"]["configuration"]["vars"],
            json!([
                "MERCURY_BINDING_SERVICE_HOST=payment",
                "MERCURY_BINDING_SERVICE_PORT=9000"
            ])
        );
        assert_eq!(
            spec["traits"]["openapi"]["configuration"]["configmaps"],
            json!(["payment-initiation-openapi"])
        );
        assert_eq!(
            spec["dependencies"],
            json!([
                "mvn:com.redhat.mercury:payment-initiation-common:1.2.3",
                "camel:protobuf"
            ])
        );
        assert_eq!(spec["flows"], flows);
    }
}
