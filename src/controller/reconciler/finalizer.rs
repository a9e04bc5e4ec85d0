//! # Finalizer
//!
//! Keeps a managed resource from disappearing before its external resource
//! has been dealt with.

use crate::store::ObjectStore;
use anyhow::Context;
use async_trait::async_trait;
use kube::Resource;
use std::sync::Arc;
use tracing::debug;

/// Adds and removes the finalizer on a managed resource
#[async_trait]
pub trait Finalizer<K>: Send + Sync {
    /// Add the finalizer; a no-op when already present
    async fn add_finalizer(&self, obj: &mut K) -> anyhow::Result<()>;

    /// Remove the finalizer; a no-op when absent
    async fn remove_finalizer(&self, obj: &mut K) -> anyhow::Result<()>;
}

/// Finalizer persisted through an [`ObjectStore`]
pub struct ApiFinalizer<K> {
    store: Arc<dyn ObjectStore<K>>,
    finalizer: String,
}

impl<K> std::fmt::Debug for ApiFinalizer<K> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiFinalizer")
            .field("finalizer", &self.finalizer)
            .finish_non_exhaustive()
    }
}

impl<K> ApiFinalizer<K> {
    #[must_use]
    pub fn new(store: Arc<dyn ObjectStore<K>>, finalizer: &str) -> Self {
        Self {
            store,
            finalizer: finalizer.to_string(),
        }
    }
}

#[async_trait]
impl<K> Finalizer<K> for ApiFinalizer<K>
where
    K: Resource + Send + Sync,
{
    async fn add_finalizer(&self, obj: &mut K) -> anyhow::Result<()> {
        let finalizers = obj.meta_mut().finalizers.get_or_insert_with(Vec::new);
        if finalizers.contains(&self.finalizer) {
            return Ok(());
        }
        finalizers.push(self.finalizer.clone());
        self.store
            .update(obj)
            .await
            .context("cannot add finalizer")?;
        debug!(finalizer = %self.finalizer, "Added finalizer");
        Ok(())
    }

    async fn remove_finalizer(&self, obj: &mut K) -> anyhow::Result<()> {
        let Some(finalizers) = obj.meta_mut().finalizers.as_mut() else {
            return Ok(());
        };
        let before = finalizers.len();
        finalizers.retain(|f| f != &self.finalizer);
        if finalizers.len() == before {
            return Ok(());
        }
        self.store
            .update(obj)
            .await
            .context("cannot remove finalizer")?;
        debug!(finalizer = %self.finalizer, "Removed finalizer");
        Ok(())
    }
}

/// Finalizer that does nothing
#[derive(Debug, Default, Clone, Copy)]
pub struct NopFinalizer;

#[async_trait]
impl<K: Send + Sync> Finalizer<K> for NopFinalizer {
    async fn add_finalizer(&self, _obj: &mut K) -> anyhow::Result<()> {
        Ok(())
    }

    async fn remove_finalizer(&self, _obj: &mut K) -> anyhow::Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{MemoryStore, ObjectKey};
    use k8s_openapi::api::core::v1::ConfigMap;
    use kube::api::ObjectMeta;

    const FINALIZER: &str = "example.com/finalizer";

    fn setup() -> (Arc<MemoryStore<ConfigMap>>, ConfigMap) {
        let store = Arc::new(MemoryStore::new());
        let obj = store.insert(ConfigMap {
            metadata: ObjectMeta {
                name: Some("a".to_string()),
                namespace: Some("default".to_string()),
                ..Default::default()
            },
            ..Default::default()
        });
        (store, obj)
    }

    #[tokio::test]
    async fn test_add_finalizer_is_idempotent() {
        let (store, mut obj) = setup();
        let finalizer = ApiFinalizer::new(Arc::clone(&store) as Arc<dyn ObjectStore<ConfigMap>>, FINALIZER);

        finalizer.add_finalizer(&mut obj).await.unwrap();
        finalizer.add_finalizer(&mut obj).await.unwrap();

        let stored = store.stored(&ObjectKey::from_resource(&obj)).unwrap();
        assert_eq!(stored.metadata.finalizers, Some(vec![FINALIZER.to_string()]));
        assert_eq!(store.update_count(), 1);
    }

    #[tokio::test]
    async fn test_remove_missing_finalizer_does_not_write() {
        let (store, mut obj) = setup();
        let finalizer = ApiFinalizer::new(Arc::clone(&store) as Arc<dyn ObjectStore<ConfigMap>>, FINALIZER);

        finalizer.remove_finalizer(&mut obj).await.unwrap();
        assert_eq!(store.update_count(), 0);
    }

    #[tokio::test]
    async fn test_remove_finalizer_keeps_others() {
        let (store, mut obj) = setup();
        obj.metadata.finalizers = Some(vec!["other".to_string(), FINALIZER.to_string()]);
        store.update(&mut obj).await.unwrap();
        let finalizer = ApiFinalizer::new(Arc::clone(&store) as Arc<dyn ObjectStore<ConfigMap>>, FINALIZER);

        finalizer.remove_finalizer(&mut obj).await.unwrap();
        assert_eq!(obj.metadata.finalizers, Some(vec!["other".to_string()]));
    }
}
