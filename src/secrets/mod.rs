//! # Connection Secret Storage
//!
//! Where connection details end up. The Kubernetes implementation writes
//! `Secret` objects; the in-memory one backs tests.

mod api;
mod memory;

pub use api::KubeSecretStore;
pub use memory::{MemorySecretStore, StoredSecret};

use async_trait::async_trait;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::OwnerReference;
use std::collections::BTreeMap;

/// Raw secret data keyed by field name
pub type SecretData = BTreeMap<String, Vec<u8>>;

/// Storage for connection secrets
#[async_trait]
pub trait SecretStore: Send + Sync {
    /// Data of a secret, or `None` when it does not exist
    async fn read(&self, namespace: &str, name: &str) -> anyhow::Result<Option<SecretData>>;

    /// Write keys into a secret, creating it when missing
    ///
    /// Keys absent from `data` are left untouched. Returns whether anything changed.
    async fn apply(
        &self,
        namespace: &str,
        name: &str,
        data: &SecretData,
        owner: Option<OwnerReference>,
    ) -> anyhow::Result<bool>;

    /// Delete a secret; deleting a missing secret succeeds
    async fn delete(&self, namespace: &str, name: &str) -> anyhow::Result<()>;
}

/// Keys of `data` whose value differs from `existing`
fn changed_keys<'a>(existing: &SecretData, data: &'a SecretData) -> Vec<&'a String> {
    data.iter()
        .filter(|(key, value)| existing.get(*key) != Some(*value))
        .map(|(key, _)| key)
        .collect()
}
