//! # In-memory Secret Store

use super::{changed_keys, SecretData, SecretStore};
use async_trait::async_trait;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::OwnerReference;
use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

/// A stored secret and its owner
#[derive(Debug, Clone, Default)]
pub struct StoredSecret {
    pub data: SecretData,
    pub owner: Option<OwnerReference>,
}

/// Secret store holding secrets in process memory
#[derive(Debug, Default)]
pub struct MemorySecretStore {
    secrets: Mutex<BTreeMap<(String, String), StoredSecret>>,
}

impl MemorySecretStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, BTreeMap<(String, String), StoredSecret>> {
        self.secrets.lock().unwrap_or_else(PoisonError::into_inner)
    }

    #[must_use]
    pub fn get(&self, namespace: &str, name: &str) -> Option<StoredSecret> {
        self.lock()
            .get(&(namespace.to_string(), name.to_string()))
            .cloned()
    }
}

#[async_trait]
impl SecretStore for MemorySecretStore {
    async fn read(&self, namespace: &str, name: &str) -> anyhow::Result<Option<SecretData>> {
        Ok(self.get(namespace, name).map(|s| s.data))
    }

    async fn apply(
        &self,
        namespace: &str,
        name: &str,
        data: &SecretData,
        owner: Option<OwnerReference>,
    ) -> anyhow::Result<bool> {
        let mut secrets = self.lock();
        let key = (namespace.to_string(), name.to_string());
        let Some(existing) = secrets.get_mut(&key) else {
            secrets.insert(
                key,
                StoredSecret {
                    data: data.clone(),
                    owner,
                },
            );
            return Ok(true);
        };
        if changed_keys(&existing.data, data).is_empty() {
            return Ok(false);
        }
        existing
            .data
            .extend(data.iter().map(|(k, v)| (k.clone(), v.clone())));
        Ok(true)
    }

    async fn delete(&self, namespace: &str, name: &str) -> anyhow::Result<()> {
        self.lock().remove(&(namespace.to_string(), name.to_string()));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn data(pairs: &[(&str, &str)]) -> SecretData {
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), v.as_bytes().to_vec()))
            .collect()
    }

    #[tokio::test]
    async fn test_apply_is_additive() {
        let store = MemorySecretStore::new();
        assert!(store.apply("ns", "conn", &data(&[("a", "1")]), None).await.unwrap());
        assert!(store.apply("ns", "conn", &data(&[("b", "2")]), None).await.unwrap());

        let stored = store.read("ns", "conn").await.unwrap().unwrap();
        assert_eq!(stored, data(&[("a", "1"), ("b", "2")]));
    }

    #[tokio::test]
    async fn test_apply_reports_no_change() {
        let store = MemorySecretStore::new();
        store.apply("ns", "conn", &data(&[("a", "1")]), None).await.unwrap();
        assert!(!store.apply("ns", "conn", &data(&[("a", "1")]), None).await.unwrap());
    }

    #[tokio::test]
    async fn test_delete_missing_secret_succeeds() {
        let store = MemorySecretStore::new();
        store.delete("ns", "missing").await.unwrap();
        assert!(store.read("ns", "missing").await.unwrap().is_none());
    }
}
