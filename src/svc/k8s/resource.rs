//! # Resource module
//!
//! This module provide helpers on kubernetes [`Resource`]

use k8s_openapi::apimachinery::pkg::apis::meta::v1::OwnerReference;
use kube::{CustomResourceExt, Resource, ResourceExt};
use serde::Serialize;
use serde_json::Value;

// -----------------------------------------------------------------------------
// Helpers functions

/// returns the namespace and name of the kubernetes resource, an absent
/// namespace is returned as an empty string.
pub fn namespaced_name<T>(obj: &T) -> (String, String)
where
    T: ResourceExt,
{
    (obj.namespace().unwrap_or_default(), obj.name_any())
}

/// returns differnce between the two given object serialize as json patch
pub fn diff<T>(origin: &T, modified: &T) -> Result<json_patch::Patch, serde_json::Error>
where
    T: Serialize,
{
    Ok(json_patch::diff(
        &serde_json::to_value(origin)?,
        &serde_json::to_value(modified)?,
    ))
}

/// returns the json patch turning the live object into the desired one,
/// restricted to the fields the desired object sets. Fields filled by the
/// api server such as `status` or `metadata.resourceVersion` are ignored.
pub fn managed_diff<T>(live: &T, desired: &T) -> Result<json_patch::Patch, serde_json::Error>
where
    T: Serialize,
{
    let desired = serde_json::to_value(desired)?;
    let mut live = serde_json::to_value(live)?;

    retain_managed(&mut live, &desired);
    diff(&live, &desired)
}

/// drops from `live` the object keys that `desired` does not set, array items
/// are pruned pairwise and extra live items are kept
fn retain_managed(live: &mut Value, desired: &Value) {
    match (live, desired) {
        (Value::Object(live), Value::Object(desired)) => {
            live.retain(|key, _| desired.contains_key(key));
            for (key, value) in live.iter_mut() {
                if let Some(managed) = desired.get(key) {
                    retain_managed(value, managed);
                }
            }
        }
        (Value::Array(live), Value::Array(desired)) => {
            for (value, managed) in live.iter_mut().zip(desired) {
                retain_managed(value, managed);
            }
        }
        _ => {}
    }
}

/// returns a owner references object pointing to the given resource and
/// marking it as the controller of the owned object
pub fn owner_reference<T>(obj: &T) -> OwnerReference
where
    T: Resource + ResourceExt + CustomResourceExt,
{
    let api_resource = T::api_resource();

    OwnerReference {
        api_version: api_resource.api_version,
        block_owner_deletion: Some(true),
        controller: Some(true),
        kind: api_resource.kind,
        name: obj.name_any(),
        uid: obj.uid().unwrap_or_default(),
    }
}
