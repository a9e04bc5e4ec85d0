//! # In-memory Object Store
//!
//! Mirrors the API server rules the reconciler relies on: resource versions
//! guard every write, spec writes never touch status and vice versa, and an
//! object marked for deletion disappears once its last finalizer is removed.

use super::{ObjectKey, ObjectStore, StoreError};
use async_trait::async_trait;
use kube::Resource;
use serde::{de::DeserializeOwned, Serialize};
use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

/// Hook consulted before every write; returning an error fails the write
pub type StoreHook<K> = Box<dyn Fn(&K) -> Option<StoreError> + Send + Sync>;

struct Inner<K> {
    objects: BTreeMap<ObjectKey, K>,
    version: u64,
    update_hook: Option<StoreHook<K>>,
    status_hook: Option<StoreHook<K>>,
    updates: usize,
    status_updates: usize,
}

/// Object store holding objects in process memory
pub struct MemoryStore<K> {
    inner: Mutex<Inner<K>>,
}

impl<K> std::fmt::Debug for MemoryStore<K> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryStore").finish_non_exhaustive()
    }
}

impl<K> Default for MemoryStore<K> {
    fn default() -> Self {
        Self {
            inner: Mutex::new(Inner {
                objects: BTreeMap::new(),
                version: 0,
                update_hook: None,
                status_hook: None,
                updates: 0,
                status_updates: 0,
            }),
        }
    }
}

impl<K> MemoryStore<K>
where
    K: Resource + Clone + Serialize + DeserializeOwned + Send + Sync,
{
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Inner<K>> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Store an object as if it had just been created, returning the stored copy
    pub fn insert(&self, mut obj: K) -> K {
        let mut inner = self.lock();
        inner.version += 1;
        let meta = obj.meta_mut();
        meta.resource_version = Some(inner.version.to_string());
        meta.generation = Some(meta.generation.unwrap_or(1));
        inner
            .objects
            .insert(ObjectKey::from_resource(&obj), obj.clone());
        obj
    }

    /// Current stored copy of an object
    #[must_use]
    pub fn stored(&self, key: &ObjectKey) -> Option<K> {
        self.lock().objects.get(key).cloned()
    }

    /// Request deletion of an object the way the API server does
    ///
    /// Objects with finalizers are only marked with a deletion timestamp.
    pub fn mark_deleted(&self, key: &ObjectKey) -> Result<(), StoreError> {
        let mut inner = self.lock();
        let stored = inner
            .objects
            .get(key)
            .ok_or_else(|| StoreError::NotFound(key.clone()))?;
        if stored.meta().finalizers.as_ref().is_none_or(Vec::is_empty) {
            inner.objects.remove(key);
            return Ok(());
        }

        let mut value = serde_json::to_value(stored)?;
        value["metadata"]["deletionTimestamp"] =
            serde_json::Value::String(chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Secs, true));
        let mut deleted: K = serde_json::from_value(value)?;
        inner.version += 1;
        deleted.meta_mut().resource_version = Some(inner.version.to_string());
        inner.objects.insert(key.clone(), deleted);
        Ok(())
    }

    /// Fail spec and metadata writes for which the hook returns an error
    pub fn set_update_hook(&self, hook: impl Fn(&K) -> Option<StoreError> + Send + Sync + 'static) {
        self.lock().update_hook = Some(Box::new(hook));
    }

    /// Fail status writes for which the hook returns an error
    pub fn set_status_hook(&self, hook: impl Fn(&K) -> Option<StoreError> + Send + Sync + 'static) {
        self.lock().status_hook = Some(Box::new(hook));
    }

    pub fn clear_hooks(&self) {
        let mut inner = self.lock();
        inner.update_hook = None;
        inner.status_hook = None;
    }

    /// Number of successful spec and metadata writes
    #[must_use]
    pub fn update_count(&self) -> usize {
        self.lock().updates
    }

    /// Number of successful status writes
    #[must_use]
    pub fn status_update_count(&self) -> usize {
        self.lock().status_updates
    }
}

/// Copy of `target` carrying the status of `source`
fn with_status_of<K: Serialize + DeserializeOwned>(target: &K, source: &K) -> Result<K, StoreError> {
    let mut value = serde_json::to_value(target)?;
    let status = serde_json::to_value(source)?.get("status").cloned();
    if let Some(fields) = value.as_object_mut() {
        match status {
            Some(status) => fields.insert("status".to_string(), status),
            None => fields.remove("status"),
        };
    }
    Ok(serde_json::from_value(value)?)
}

fn check_version<K: Resource>(key: &ObjectKey, stored: &K, incoming: &K) -> Result<(), StoreError> {
    let stored_version = stored.meta().resource_version.as_deref();
    let incoming_version = incoming.meta().resource_version.as_deref();
    if stored_version == incoming_version {
        Ok(())
    } else {
        Err(StoreError::Conflict {
            key: key.clone(),
            message: format!(
                "the object has been modified; resource version {} is stale, current is {}",
                incoming_version.unwrap_or("<none>"),
                stored_version.unwrap_or("<none>")
            ),
        })
    }
}

#[async_trait]
impl<K> ObjectStore<K> for MemoryStore<K>
where
    K: Resource + Clone + Serialize + DeserializeOwned + Send + Sync,
{
    async fn get(&self, key: &ObjectKey) -> Result<K, StoreError> {
        self.stored(key).ok_or_else(|| StoreError::NotFound(key.clone()))
    }

    async fn update(&self, obj: &mut K) -> Result<(), StoreError> {
        let mut inner = self.lock();
        if let Some(err) = inner.update_hook.as_ref().and_then(|hook| hook(obj)) {
            return Err(err);
        }
        let key = ObjectKey::from_resource(obj);
        let stored = inner
            .objects
            .get(&key)
            .ok_or_else(|| StoreError::NotFound(key.clone()))?;
        check_version(&key, stored, obj)?;

        let mut updated = with_status_of(obj, stored)?;
        let spec_changed = serde_json::to_value(&*obj)?.get("spec")
            != serde_json::to_value(stored)?.get("spec");
        let deletion_timestamp = stored.meta().deletion_timestamp.clone();
        let generation = stored.meta().generation.unwrap_or(1);

        inner.version += 1;
        let version = inner.version.to_string();
        let meta = updated.meta_mut();
        meta.resource_version = Some(version);
        meta.deletion_timestamp = deletion_timestamp;
        meta.generation = Some(if spec_changed { generation + 1 } else { generation });

        let finalized = meta.deletion_timestamp.is_some()
            && meta.finalizers.as_ref().is_none_or(Vec::is_empty);
        if finalized {
            inner.objects.remove(&key);
        } else {
            inner.objects.insert(key, updated.clone());
        }
        inner.updates += 1;
        *obj = updated;
        Ok(())
    }

    async fn update_status(&self, obj: &mut K) -> Result<(), StoreError> {
        let mut inner = self.lock();
        if let Some(err) = inner.status_hook.as_ref().and_then(|hook| hook(obj)) {
            return Err(err);
        }
        let key = ObjectKey::from_resource(obj);
        let stored = inner
            .objects
            .get(&key)
            .ok_or_else(|| StoreError::NotFound(key.clone()))?;
        check_version(&key, stored, obj)?;

        let mut updated = with_status_of(stored, obj)?;
        inner.version += 1;
        updated.meta_mut().resource_version = Some(inner.version.to_string());
        inner.objects.insert(key, updated.clone());
        inner.status_updates += 1;
        *obj = updated;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use k8s_openapi::api::core::v1::ConfigMap;
    use kube::api::ObjectMeta;

    fn config_map(name: &str) -> ConfigMap {
        ConfigMap {
            metadata: ObjectMeta {
                name: Some(name.to_string()),
                namespace: Some("default".to_string()),
                ..Default::default()
            },
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_stale_update_conflicts() {
        let store = MemoryStore::new();
        let mut first = store.insert(config_map("a"));
        let mut second = first.clone();

        store.update(&mut first).await.unwrap();
        let err = store.update(&mut second).await.unwrap_err();
        assert!(err.is_conflict());
    }

    #[tokio::test]
    async fn test_update_refreshes_resource_version() {
        let store = MemoryStore::new();
        let mut obj = store.insert(config_map("a"));
        store.update(&mut obj).await.unwrap();
        store.update(&mut obj).await.unwrap();
        assert_eq!(store.update_count(), 2);
    }

    #[tokio::test]
    async fn test_removing_last_finalizer_of_deleted_object_removes_it() {
        let store = MemoryStore::new();
        let mut obj = config_map("a");
        obj.metadata.finalizers = Some(vec!["example.com/finalizer".to_string()]);
        let key = ObjectKey::from_resource(&obj);
        store.insert(obj);
        store.mark_deleted(&key).unwrap();

        let mut deleted = store.get(&key).await.unwrap();
        assert!(deleted.metadata.deletion_timestamp.is_some());
        deleted.metadata.finalizers = Some(vec![]);
        store.update(&mut deleted).await.unwrap();

        assert!(store.get(&key).await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn test_hook_fails_write() {
        let store = MemoryStore::new();
        let mut obj = store.insert(config_map("a"));
        store.set_update_hook(|_| Some(StoreError::Unavailable("down".to_string())));
        assert!(matches!(
            store.update(&mut obj).await,
            Err(StoreError::Unavailable(_))
        ));
        store.clear_hooks();
        store.update(&mut obj).await.unwrap();
    }
}
