//! Create-or-replace with structural diffing
//!
//! Desired objects are compared against the live object on the fields that
//! matter for their kind ([`DiffScope`]). Only a real difference produces a
//! write, so re-applying an unchanged desired value is free.

use crate::client::{DiffScope, DomainClient, ManagedKind, ObjectKey};
use crate::error::Result;
use serde_json::{Map, Value};
use tracing::{debug, info};

/// What an apply did to the cluster
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplyOutcome {
    Unchanged,
    Created,
    Replaced,
}

impl ApplyOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Unchanged => "unchanged",
            Self::Created => "created",
            Self::Replaced => "replaced",
        }
    }

    pub fn is_write(&self) -> bool {
        !matches!(self, Self::Unchanged)
    }
}

/// Symmetric structural equality; `null` and a missing key are equal.
pub fn structurally_equal(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Object(a), Value::Object(b)) => {
            let all_keys = a.keys().chain(b.keys());
            all_keys
                .into_iter()
                .all(|k| structurally_equal(field(a, k), field(b, k)))
        }
        (Value::Array(a), Value::Array(b)) => {
            a.len() == b.len() && a.iter().zip(b).all(|(x, y)| structurally_equal(x, y))
        }
        (Value::Number(a), Value::Number(b)) => numbers_equal(a, b),
        _ => a == b,
    }
}

/// Whether `live` matches `desired`, tolerating server-filled fields.
///
/// Every field `desired` sets must match. A field only `live` carries is
/// accepted when its key is one of `defaulted`; any other extra field means
/// `desired` dropped it and the object has drifted.
pub fn matches_live(desired: &Value, live: &Value, defaulted: &[&str]) -> bool {
    match (desired, live) {
        (Value::Object(d), Value::Object(l)) => {
            let desired_fields_match = d
                .iter()
                .filter(|(_, v)| !v.is_null())
                .all(|(k, v)| matches_live(v, field(l, k), defaulted));
            let extra_fields_defaulted = l
                .iter()
                .filter(|(k, v)| !v.is_null() && field(d, k).is_null())
                .all(|(k, _)| defaulted.contains(&k.as_str()));
            desired_fields_match && extra_fields_defaulted
        }
        (Value::Object(d), Value::Null) => d.values().all(Value::is_null),
        (Value::Null, l) => l.is_null(),
        (Value::Array(d), Value::Array(l)) => {
            d.len() == l.len()
                && d.iter()
                    .zip(l)
                    .all(|(x, y)| matches_live(x, y, defaulted))
        }
        (Value::Number(d), Value::Number(l)) => numbers_equal(d, l),
        _ => desired == live,
    }
}

/// Whether the live object must be replaced to reach the desired one
pub fn needs_replace(kind: ManagedKind, desired: &Value, live: &Value) -> bool {
    let scope = kind.diff_scope();
    let desired = comparable(scope, desired);
    let live = comparable(scope, live);
    match scope {
        DiffScope::Spec => !matches_live(&desired, &live, kind.server_defaulted_fields()),
        DiffScope::NonMetadata => !structurally_equal(&desired, &live),
    }
}

fn comparable(scope: DiffScope, object: &Value) -> Value {
    match scope {
        DiffScope::Spec => object.get("spec").cloned().unwrap_or(Value::Null),
        DiffScope::NonMetadata => match object {
            Value::Object(fields) => Value::Object(
                fields
                    .iter()
                    .filter(|(k, _)| {
                        !matches!(k.as_str(), "apiVersion" | "kind" | "metadata" | "status")
                    })
                    .map(|(k, v)| (k.clone(), v.clone()))
                    .collect(),
            ),
            other => other.clone(),
        },
    }
}

fn field<'v>(map: &'v Map<String, Value>, key: &str) -> &'v Value {
    map.get(key).unwrap_or(&Value::Null)
}

fn numbers_equal(a: &serde_json::Number, b: &serde_json::Number) -> bool {
    match (a.as_i64(), b.as_i64()) {
        (Some(a), Some(b)) => a == b,
        _ => a.as_f64() == b.as_f64(),
    }
}

/// Carry the live resource version over so the replace is conditional
fn with_resource_version(mut desired: Value, live: &Value) -> Value {
    let version = live
        .pointer("/metadata/resourceVersion")
        .cloned()
        .unwrap_or(Value::Null);
    if let Some(metadata) = desired
        .as_object_mut()
        .and_then(|o| o.get_mut("metadata"))
        .and_then(Value::as_object_mut)
    {
        metadata.insert("resourceVersion".to_string(), version);
    }
    desired
}

/// Create the object if absent, replace it wholesale if it differs
pub async fn apply<C>(client: &C, key: &ObjectKey, desired: Value) -> Result<ApplyOutcome>
where
    C: DomainClient + ?Sized,
{
    match client.get_object(key).await? {
        None => {
            client.create_object(key, desired).await?;
            info!(object = %key, "Created");
            Ok(ApplyOutcome::Created)
        }
        Some(live) if needs_replace(key.kind, &desired, &live) => {
            client
                .replace_object(key, with_resource_version(desired, &live))
                .await?;
            info!(object = %key, "Replaced");
            Ok(ApplyOutcome::Replaced)
        }
        Some(_) => {
            debug!(object = %key, "Up to date");
            Ok(ApplyOutcome::Unchanged)
        }
    }
}

/// Delete the object if it exists
pub async fn remove<C>(client: &C, key: &ObjectKey) -> Result<bool>
where
    C: DomainClient + ?Sized,
{
    if client.get_object(key).await?.is_none() {
        return Ok(false);
    }
    let deleted = client.delete_object(key).await?;
    if deleted {
        info!(object = %key, "Deleted");
    }
    Ok(deleted)
}
