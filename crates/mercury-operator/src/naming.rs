//! Canonical names and labels derived from a ServiceDomain's identity

use crate::crd::{ServiceDomain, ServiceDomainType};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::OwnerReference;
use kube::{Resource, ResourceExt};
use std::collections::BTreeMap;

/// Name recorded in managed-by labels and as the field manager
pub const OPERATOR_NAME: &str = "mercury-operator";

pub const MANAGED_BY_LABEL: &str = "app.kubernetes.io/managed-by";
pub const APP_LABEL: &str = "app";
pub const SERVICE_DOMAIN_LABEL: &str = "service-domain";
pub const MERCURY_BINDING_LABEL: &str = "mercury-binding";
pub const INTERNAL_BINDING: &str = "internal";

const APP_PREFIX: &str = "bian-";
const TOPIC_SUFFIX: &str = "-topic";
const USER_SUFFIX: &str = "-user";
const INTEGRATION_SUFFIX: &str = "-camelk-rest";
const OPENAPI_SUFFIX: &str = "-openapi";

/// Key holding the route definitions inside the routes ConfigMap
pub const ROUTES_KEY: &str = "directs.yaml";

/// Convert an UpperCamel identifier to lower-hyphen form.
///
/// `PartyReferenceDataDirectory` becomes `party-reference-data-directory`.
pub fn lower_hyphen(identifier: &str) -> String {
    let mut out = String::with_capacity(identifier.len() + 8);
    for (i, c) in identifier.chars().enumerate() {
        if c.is_uppercase() {
            if i > 0 {
                out.push('-');
            }
            out.extend(c.to_lowercase());
        } else {
            out.push(c);
        }
    }
    out
}

/// Lower-hyphen form of a domain type, used to key its configuration objects
pub fn type_key(domain_type: ServiceDomainType) -> String {
    lower_hyphen(domain_type.as_str())
}

pub fn topic_name(domain: &str) -> String {
    format!("{domain}{TOPIC_SUFFIX}")
}

pub fn user_name(domain: &str) -> String {
    format!("{domain}{USER_SUFFIX}")
}

pub fn integration_name(domain: &str) -> String {
    format!("{domain}{INTEGRATION_SUFFIX}")
}

/// ConfigMap carrying the OpenAPI description for a domain type
pub fn openapi_config_map_name(domain_type: ServiceDomainType) -> String {
    format!("{}{OPENAPI_SUFFIX}", type_key(domain_type))
}

/// ConfigMap carrying the HTTP route definitions for a domain type
pub fn routes_config_map_name(domain_type: ServiceDomainType) -> String {
    format!("integration-{}-http", type_key(domain_type))
}

/// Value of the `app` label for a domain's pods
pub fn app_label_value(domain: &str) -> String {
    format!("{APP_PREFIX}{domain}")
}

/// Labels selecting a domain's pods
pub fn selector_labels(domain: &str) -> BTreeMap<String, String> {
    BTreeMap::from([(APP_LABEL.to_string(), app_label_value(domain))])
}

/// Labels stamped on a domain's pods
pub fn pod_labels(domain: &str) -> BTreeMap<String, String> {
    let mut labels = selector_labels(domain);
    labels.insert(SERVICE_DOMAIN_LABEL.to_string(), domain.to_string());
    labels
}

/// Labels for managed workload objects
pub fn managed_labels(domain: &str) -> BTreeMap<String, String> {
    let mut labels = pod_labels(domain);
    labels.insert(MANAGED_BY_LABEL.to_string(), OPERATOR_NAME.to_string());
    labels
}

/// Labels for the internal gRPC service
pub fn service_labels(domain: &str) -> BTreeMap<String, String> {
    let mut labels = managed_labels(domain);
    labels.insert(
        MERCURY_BINDING_LABEL.to_string(),
        INTERNAL_BINDING.to_string(),
    );
    labels
}

/// Label set carrying only the managed-by marker
pub fn managed_by_labels() -> BTreeMap<String, String> {
    BTreeMap::from([(MANAGED_BY_LABEL.to_string(), OPERATOR_NAME.to_string())])
}

/// Owner reference pointing at the domain, for garbage collection
pub fn owner_reference(domain: &ServiceDomain) -> OwnerReference {
    OwnerReference {
        api_version: ServiceDomain::api_version(&()).to_string(),
        kind: ServiceDomain::kind(&()).to_string(),
        name: domain.name_any(),
        uid: domain.metadata.uid.clone().unwrap_or_default(),
        controller: Some(true),
        block_owner_deletion: Some(true),
    }
}
