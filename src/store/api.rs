//! # Kubernetes-backed Object Store

use super::{ObjectKey, ObjectStore, StoreError};
use async_trait::async_trait;
use k8s_openapi::NamespaceResourceScope;
use kube::api::{Patch, PatchParams, PostParams};
use kube::{Api, Client, Resource};
use serde::{de::DeserializeOwned, Serialize};
use std::marker::PhantomData;
use tracing::debug;

/// Object store talking to the Kubernetes API server
///
/// Spec and metadata are written with a full replace, status with a merge patch
/// carrying the object's resource version, so both writes are rejected with a
/// conflict when the object changed since it was read.
pub struct KubeStore<K> {
    client: Client,
    _kind: PhantomData<fn() -> K>,
}

impl<K> std::fmt::Debug for KubeStore<K> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KubeStore").finish_non_exhaustive()
    }
}

impl<K> KubeStore<K>
where
    K: Resource<DynamicType = (), Scope = NamespaceResourceScope>
        + Clone
        + std::fmt::Debug
        + Serialize
        + DeserializeOwned
        + Send
        + Sync
        + 'static,
{
    #[must_use]
    pub fn new(client: Client) -> Self {
        Self {
            client,
            _kind: PhantomData,
        }
    }

    fn api(&self, key: &ObjectKey) -> Api<K> {
        Api::namespaced(
            self.client.clone(),
            key.namespace.as_deref().unwrap_or("default"),
        )
    }
}

fn map_api_error(key: &ObjectKey, err: kube::Error) -> StoreError {
    match err {
        kube::Error::Api(api_err) if api_err.code == 404 => StoreError::NotFound(key.clone()),
        kube::Error::Api(api_err) if api_err.code == 409 => StoreError::Conflict {
            key: key.clone(),
            message: api_err.message.clone(),
        },
        other => StoreError::Api(other),
    }
}

#[async_trait]
impl<K> ObjectStore<K> for KubeStore<K>
where
    K: Resource<DynamicType = (), Scope = NamespaceResourceScope>
        + Clone
        + std::fmt::Debug
        + Serialize
        + DeserializeOwned
        + Send
        + Sync
        + 'static,
{
    async fn get(&self, key: &ObjectKey) -> Result<K, StoreError> {
        self.api(key)
            .get(&key.name)
            .await
            .map_err(|e| map_api_error(key, e))
    }

    async fn update(&self, obj: &mut K) -> Result<(), StoreError> {
        let key = ObjectKey::from_resource(obj);
        let updated = self
            .api(&key)
            .replace(&key.name, &PostParams::default(), obj)
            .await
            .map_err(|e| map_api_error(&key, e))?;
        debug!(
            resource = %key,
            resource_version = ?updated.meta().resource_version,
            "Updated managed resource"
        );
        *obj = updated;
        Ok(())
    }

    async fn update_status(&self, obj: &mut K) -> Result<(), StoreError> {
        let key = ObjectKey::from_resource(obj);
        let mut value = serde_json::to_value(&*obj)?;
        let status = value
            .get_mut("status")
            .map(serde_json::Value::take)
            .unwrap_or_default();
        let patch = serde_json::json!({
            "metadata": { "resourceVersion": obj.meta().resource_version },
            "status": status,
        });
        let updated = self
            .api(&key)
            .patch_status(&key.name, &PatchParams::default(), &Patch::Merge(&patch))
            .await
            .map_err(|e| map_api_error(&key, e))?;
        debug!(
            resource = %key,
            resource_version = ?updated.meta().resource_version,
            "Updated managed resource status"
        );
        *obj = updated;
        Ok(())
    }
}
