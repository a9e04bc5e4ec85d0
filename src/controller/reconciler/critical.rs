//! # Critical Annotations
//!
//! Persisting the create-succeeded/failed annotations is what prevents a second
//! create of the same external resource, so those writes are retried.

use crate::constants::{CRITICAL_ANNOTATION_RETRY_DELAY_MS, CRITICAL_ANNOTATION_RETRY_STEPS};
use crate::controller::reconciler::meta;
use crate::store::{ObjectKey, ObjectStore, StoreError};
use async_trait::async_trait;
use kube::{Resource, ResourceExt};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// Persists annotations that must not be lost
#[async_trait]
pub trait CriticalAnnotationUpdater<K>: Send + Sync {
    async fn update_critical_annotations(&self, obj: &mut K) -> anyhow::Result<()>;
}

/// Retries annotation writes, re-applying the annotations onto a fresh copy
/// of the resource after each conflict
pub struct RetryingCriticalAnnotationUpdater<K> {
    store: Arc<dyn ObjectStore<K>>,
    steps: u32,
    delay: Duration,
}

impl<K> std::fmt::Debug for RetryingCriticalAnnotationUpdater<K> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RetryingCriticalAnnotationUpdater")
            .field("steps", &self.steps)
            .field("delay", &self.delay)
            .finish_non_exhaustive()
    }
}

impl<K> RetryingCriticalAnnotationUpdater<K> {
    #[must_use]
    pub fn new(store: Arc<dyn ObjectStore<K>>) -> Self {
        Self {
            store,
            steps: CRITICAL_ANNOTATION_RETRY_STEPS,
            delay: Duration::from_millis(CRITICAL_ANNOTATION_RETRY_DELAY_MS),
        }
    }

    #[must_use]
    pub fn with_retry(mut self, steps: u32, delay: Duration) -> Self {
        self.steps = steps.max(1);
        self.delay = delay;
        self
    }
}

#[async_trait]
impl<K> CriticalAnnotationUpdater<K> for RetryingCriticalAnnotationUpdater<K>
where
    K: Resource + Send + Sync,
{
    async fn update_critical_annotations(&self, obj: &mut K) -> anyhow::Result<()> {
        let annotations = obj.annotations().clone();
        let key = ObjectKey::from_resource(obj);
        let mut last_error: Option<StoreError> = None;

        for attempt in 1..=self.steps {
            let err = match self.store.update(obj).await {
                Ok(()) => return Ok(()),
                Err(e) if e.is_not_found() => return Err(e.into()),
                Err(e) => e,
            };
            debug!(
                resource = %key,
                attempt,
                error = %err,
                "Cannot update critical annotations, retrying"
            );
            if err.is_conflict() {
                match self.store.get(&key).await {
                    Ok(fresh) => {
                        *obj = fresh;
                        meta::add_annotations(obj, &annotations);
                    }
                    Err(get_err) if get_err.is_not_found() => return Err(get_err.into()),
                    Err(get_err) => debug!(error = %get_err, "Cannot refresh managed resource"),
                }
            }
            last_error = Some(err);
            if attempt < self.steps {
                tokio::time::sleep(self.delay).await;
            }
        }

        match last_error {
            Some(err) => Err(anyhow::Error::from(err)
                .context(format!("cannot update critical annotations after {} attempts", self.steps))),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use k8s_openapi::api::core::v1::ConfigMap;
    use kube::api::ObjectMeta;
    use std::sync::atomic::{AtomicUsize, Ordering};

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
    async fn test_conflict_is_retried_on_fresh_copy() {
        let (store, mut obj) = setup();
        // Another writer bumps the resource version
        let mut other = obj.clone();
        store.update(&mut other).await.unwrap();

        obj.annotations_mut()
            .insert("example.com/critical".to_string(), "yes".to_string());
        let updater = RetryingCriticalAnnotationUpdater::new(
            Arc::clone(&store) as Arc<dyn ObjectStore<ConfigMap>>
        );
        updater.update_critical_annotations(&mut obj).await.unwrap();

        let stored = store.stored(&ObjectKey::from_resource(&obj)).unwrap();
        assert_eq!(
            stored.annotations().get("example.com/critical").map(String::as_str),
            Some("yes")
        );
    }

    #[tokio::test]
    async fn test_gives_up_after_configured_attempts() {
        let (store, mut obj) = setup();
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        store.set_update_hook(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
            Some(StoreError::Unavailable("down".to_string()))
        });

        let updater = RetryingCriticalAnnotationUpdater::new(
            Arc::clone(&store) as Arc<dyn ObjectStore<ConfigMap>>
        )
        .with_retry(3, Duration::from_millis(1));
        assert!(updater.update_critical_annotations(&mut obj).await.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }
}
