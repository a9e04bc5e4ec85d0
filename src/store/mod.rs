//! # Object Store
//!
//! Read and write access to managed resources with optimistic concurrency.
//!
//! - `api.rs` - Backed by the Kubernetes API server
//! - `memory.rs` - In-process store with the same concurrency rules, used in tests

mod api;
mod memory;

pub use api::KubeStore;
pub use memory::{MemoryStore, StoreHook};

use async_trait::async_trait;
use thiserror::Error;

/// Namespace and name identifying one object
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectKey {
    pub namespace: Option<String>,
    pub name: String,
}

impl ObjectKey {
    #[must_use]
    pub fn new(namespace: Option<&str>, name: &str) -> Self {
        Self {
            namespace: namespace.map(ToString::to_string),
            name: name.to_string(),
        }
    }

    /// Key of an existing object
    #[must_use]
    pub fn from_resource<K: ::kube::Resource>(obj: &K) -> Self {
        Self {
            namespace: obj.meta().namespace.clone(),
            name: obj.meta().name.clone().unwrap_or_default(),
        }
    }
}

impl std::fmt::Display for ObjectKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.namespace {
            Some(ns) => write!(f, "{ns}/{}", self.name),
            None => write!(f, "{}", self.name),
        }
    }
}

/// Errors returned by an [`ObjectStore`]
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("{0} not found")]
    NotFound(ObjectKey),
    /// Another writer changed the object since it was read
    #[error("conflict writing {key}: {message}")]
    Conflict { key: ObjectKey, message: String },
    #[error("Kubernetes API error: {0}")]
    Api(#[source] ::kube::Error),
    #[error("cannot serialize object: {0}")]
    Serialization(#[from] serde_json::Error),
    /// Any other failure of the backing store
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

impl StoreError {
    #[must_use]
    pub fn is_conflict(&self) -> bool {
        match self {
            Self::Conflict { .. } => true,
            Self::Api(::kube::Error::Api(api_err)) => api_err.code == 409,
            _ => false,
        }
    }

    #[must_use]
    pub fn is_not_found(&self) -> bool {
        match self {
            Self::NotFound(_) => true,
            Self::Api(::kube::Error::Api(api_err)) => api_err.code == 404,
            _ => false,
        }
    }
}

/// Whether any error in the chain is a write conflict
#[must_use]
pub fn is_conflict(err: &anyhow::Error) -> bool {
    err.chain().any(|cause| {
        if let Some(store_err) = cause.downcast_ref::<StoreError>() {
            return store_err.is_conflict();
        }
        matches!(
            cause.downcast_ref::<::kube::Error>(),
            Some(::kube::Error::Api(api_err)) if api_err.code == 409
        )
    })
}

/// Persistent storage for objects of kind `K`
///
/// `update` writes metadata and spec and leaves status untouched; `update_status`
/// writes status only. Both fail with a conflict when the object's resource
/// version is stale, and both refresh `obj` from the stored copy on success.
#[async_trait]
pub trait ObjectStore<K>: Send + Sync {
    async fn get(&self, key: &ObjectKey) -> Result<K, StoreError>;

    async fn update(&self, obj: &mut K) -> Result<(), StoreError>;

    async fn update_status(&self, obj: &mut K) -> Result<(), StoreError>;
}
