//! # Initializers
//!
//! One-time defaulting of a managed resource before it is reconciled.

use crate::controller::reconciler::meta;
use crate::store::ObjectStore;
use anyhow::Context;
use async_trait::async_trait;
use kube::{Resource, ResourceExt};
use std::sync::Arc;

/// Prepares a managed resource before its external resource is observed
#[async_trait]
pub trait Initializer<K>: Send + Sync {
    async fn initialize(&self, obj: &mut K) -> anyhow::Result<()>;
}

/// Runs initializers in order, stopping at the first error
pub struct InitializerChain<K> {
    initializers: Vec<Arc<dyn Initializer<K>>>,
}

impl<K> std::fmt::Debug for InitializerChain<K> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InitializerChain")
            .field("len", &self.initializers.len())
            .finish()
    }
}

impl<K> InitializerChain<K> {
    #[must_use]
    pub fn new(initializers: Vec<Arc<dyn Initializer<K>>>) -> Self {
        Self { initializers }
    }
}

#[async_trait]
impl<K: Send + Sync> Initializer<K> for InitializerChain<K> {
    async fn initialize(&self, obj: &mut K) -> anyhow::Result<()> {
        for initializer in &self.initializers {
            initializer.initialize(obj).await?;
        }
        Ok(())
    }
}

/// Uses the resource's own name as its external name when none is set
pub struct NameAsExternalName<K> {
    store: Arc<dyn ObjectStore<K>>,
}

impl<K> std::fmt::Debug for NameAsExternalName<K> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NameAsExternalName").finish_non_exhaustive()
    }
}

impl<K> NameAsExternalName<K> {
    #[must_use]
    pub fn new(store: Arc<dyn ObjectStore<K>>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl<K> Initializer<K> for NameAsExternalName<K>
where
    K: Resource + Send + Sync,
{
    async fn initialize(&self, obj: &mut K) -> anyhow::Result<()> {
        if meta::external_name(obj).is_some_and(|name| !name.is_empty()) {
            return Ok(());
        }
        let name = obj.name_any();
        meta::set_external_name(obj, &name);
        self.store
            .update(obj)
            .await
            .context("cannot update managed resource external name")?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use k8s_openapi::api::core::v1::ConfigMap;
    use kube::api::ObjectMeta;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Initializer that counts its calls and optionally fails
    struct CountingInitializer {
        calls: AtomicUsize,
        fail: bool,
    }

    impl CountingInitializer {
        fn new(fail: bool) -> Arc<Self> {
            Arc::new(Self {
                calls: AtomicUsize::new(0),
                fail,
            })
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl Initializer<ConfigMap> for CountingInitializer {
        async fn initialize(&self, _obj: &mut ConfigMap) -> anyhow::Result<()> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                anyhow::bail!("initialize failed");
            }
            Ok(())
        }
    }

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
    async fn test_name_as_external_name_sets_missing_name() {
        let store = Arc::new(MemoryStore::new());
        let mut obj = store.insert(config_map("bucket"));
        let initializer = NameAsExternalName::new(Arc::clone(&store) as Arc<dyn ObjectStore<ConfigMap>>);

        initializer.initialize(&mut obj).await.unwrap();
        assert_eq!(meta::external_name(&obj).as_deref(), Some("bucket"));
        assert_eq!(store.update_count(), 1);
    }

    #[tokio::test]
    async fn test_name_as_external_name_keeps_existing_name() {
        let store = Arc::new(MemoryStore::new());
        let mut obj = config_map("bucket");
        meta::set_external_name(&mut obj, "imported-bucket");
        let mut obj = store.insert(obj);
        let initializer = NameAsExternalName::new(Arc::clone(&store) as Arc<dyn ObjectStore<ConfigMap>>);

        initializer.initialize(&mut obj).await.unwrap();
        assert_eq!(meta::external_name(&obj).as_deref(), Some("imported-bucket"));
        assert_eq!(store.update_count(), 0);
    }

    #[tokio::test]
    async fn test_chain_runs_initializers_in_order_until_first_error() {
        let first = CountingInitializer::new(false);
        let failing = CountingInitializer::new(true);
        let last = CountingInitializer::new(false);
        let chain = InitializerChain::new(vec![
            Arc::clone(&first) as Arc<dyn Initializer<ConfigMap>>,
            Arc::clone(&failing) as Arc<dyn Initializer<ConfigMap>>,
            Arc::clone(&last) as Arc<dyn Initializer<ConfigMap>>,
        ]);
        let mut obj = config_map("bucket");

        let err = chain.initialize(&mut obj).await.unwrap_err();
        assert_eq!(err.to_string(), "initialize failed");
        assert_eq!((first.calls(), failing.calls(), last.calls()), (1, 1, 0));
    }
}
