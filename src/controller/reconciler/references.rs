//! # Reference Resolution
//!
//! Fills spec fields declared as references to other Kubernetes resources.

use crate::crd::{Managed, Reference};
use crate::store::ObjectStore;
use anyhow::{bail, Context};
use async_trait::async_trait;
use kube::api::{ApiResource, DynamicObject, GroupVersionKind};
use kube::{Api, Client};
use std::sync::Arc;
use tracing::debug;

/// Reads arbitrary Kubernetes objects as JSON
#[async_trait]
pub trait ReferenceReader: Send + Sync {
    /// The referenced object, or `None` when it does not exist
    ///
    /// `namespace` is used when the reference does not name one.
    async fn read(
        &self,
        reference: &Reference,
        namespace: Option<&str>,
    ) -> anyhow::Result<Option<serde_json::Value>>;
}

/// Reads referenced objects through the Kubernetes API
#[derive(Clone)]
pub struct KubeReferenceReader {
    client: Client,
}

impl std::fmt::Debug for KubeReferenceReader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KubeReferenceReader").finish_non_exhaustive()
    }
}

impl KubeReferenceReader {
    #[must_use]
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

fn group_version_kind(reference: &Reference) -> GroupVersionKind {
    match reference.api_version.split_once('/') {
        Some((group, version)) => GroupVersionKind::gvk(group, version, &reference.kind),
        None => GroupVersionKind::gvk("", &reference.api_version, &reference.kind),
    }
}

#[async_trait]
impl ReferenceReader for KubeReferenceReader {
    async fn read(
        &self,
        reference: &Reference,
        namespace: Option<&str>,
    ) -> anyhow::Result<Option<serde_json::Value>> {
        let resource = ApiResource::from_gvk(&group_version_kind(reference));
        let api: Api<DynamicObject> = match reference.namespace.as_deref().or(namespace) {
            Some(ns) => Api::namespaced_with(self.client.clone(), ns, &resource),
            None => Api::all_with(self.client.clone(), &resource),
        };
        let obj = api.get_opt(&reference.name).await.with_context(|| {
            format!(
                "Failed to get referenced {} {}",
                reference.kind, reference.name
            )
        })?;
        obj.map(serde_json::to_value)
            .transpose()
            .context("Failed to serialize referenced object")
    }
}

/// Read a string field of a referenced object
///
/// `pointer` is a JSON pointer into the referenced object, e.g.
/// `/status/atProvider/id`.
///
/// # Errors
///
/// Fails when the referenced object does not exist or the field is empty.
pub async fn resolve_reference(
    reader: &dyn ReferenceReader,
    reference: &Reference,
    namespace: Option<&str>,
    pointer: &str,
) -> anyhow::Result<String> {
    let Some(obj) = reader.read(reference, namespace).await? else {
        bail!(
            "referenced {} {} does not exist",
            reference.kind,
            reference.name
        );
    };
    match obj.pointer(pointer).and_then(serde_json::Value::as_str) {
        Some(value) if !value.is_empty() => Ok(value.to_string()),
        _ => bail!(
            "referenced {} {} has no value at {pointer}; it may not be ready yet",
            reference.kind,
            reference.name
        ),
    }
}

/// Resolves a managed resource's references
#[async_trait]
pub trait ReferenceResolver<K>: Send + Sync {
    async fn resolve_references(&self, obj: &mut K) -> anyhow::Result<()>;
}

/// Resolves references with [`Managed::resolve_references`] and persists the
/// resource when resolution changed it
pub struct ApiReferenceResolver<K> {
    reader: Arc<dyn ReferenceReader>,
    store: Arc<dyn ObjectStore<K>>,
}

impl<K> std::fmt::Debug for ApiReferenceResolver<K> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiReferenceResolver").finish_non_exhaustive()
    }
}

impl<K> ApiReferenceResolver<K> {
    #[must_use]
    pub fn new(reader: Arc<dyn ReferenceReader>, store: Arc<dyn ObjectStore<K>>) -> Self {
        Self { reader, store }
    }
}

#[async_trait]
impl<K: Managed> ReferenceResolver<K> for ApiReferenceResolver<K> {
    async fn resolve_references(&self, obj: &mut K) -> anyhow::Result<()> {
        let before = serde_json::to_value(&*obj)?;
        obj.resolve_references(self.reader.as_ref())
            .await
            .context("cannot resolve references")?;
        if serde_json::to_value(&*obj)? == before {
            return Ok(());
        }
        self.store
            .update(obj)
            .await
            .context("cannot update managed resource with resolved references")?;
        debug!("Persisted resolved references");
        Ok(())
    }
}

/// Resolver for kinds without references
#[derive(Debug, Default, Clone, Copy)]
pub struct NopReferenceResolver;

#[async_trait]
impl<K: Send + Sync> ReferenceResolver<K> for NopReferenceResolver {
    async fn resolve_references(&self, _obj: &mut K) -> anyhow::Result<()> {
        Ok(())
    }
}
