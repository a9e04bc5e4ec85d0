//! # Connection Details
//!
//! Publishing the credentials and endpoints an external resource reports, so
//! that workloads can consume them.

use crate::crd::Managed;
use crate::secrets::SecretStore;
use anyhow::Context;
use async_trait::async_trait;
use kube::ResourceExt;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::debug;

/// Connection details keyed by field name
pub type ConnectionDetails = BTreeMap<String, Vec<u8>>;

/// Publishes a managed resource's connection details
#[async_trait]
pub trait ConnectionPublisher<K>: Send + Sync {
    /// Publish details additively; keys already published but absent from
    /// `details` are kept. Returns whether anything changed.
    async fn publish_connection(&self, obj: &K, details: &ConnectionDetails)
        -> anyhow::Result<bool>;

    /// Remove everything published for the managed resource
    async fn unpublish_connection(&self, obj: &K, details: &ConnectionDetails)
        -> anyhow::Result<()>;
}

/// Reads back connection details that were published for a managed resource
#[async_trait]
pub trait ConnectionDetailsFetcher<K>: Send + Sync {
    async fn fetch_connection(&self, obj: &K) -> anyhow::Result<ConnectionDetails>;
}

/// Runs publishers in order, stopping at the first error
pub struct PublisherChain<K> {
    publishers: Vec<Arc<dyn ConnectionPublisher<K>>>,
}

impl<K> std::fmt::Debug for PublisherChain<K> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PublisherChain")
            .field("len", &self.publishers.len())
            .finish()
    }
}

impl<K> PublisherChain<K> {
    #[must_use]
    pub fn new(publishers: Vec<Arc<dyn ConnectionPublisher<K>>>) -> Self {
        Self { publishers }
    }
}

#[async_trait]
impl<K: Send + Sync> ConnectionPublisher<K> for PublisherChain<K> {
    async fn publish_connection(
        &self,
        obj: &K,
        details: &ConnectionDetails,
    ) -> anyhow::Result<bool> {
        let mut published = false;
        for publisher in &self.publishers {
            published |= publisher.publish_connection(obj, details).await?;
        }
        Ok(published)
    }

    async fn unpublish_connection(
        &self,
        obj: &K,
        details: &ConnectionDetails,
    ) -> anyhow::Result<()> {
        for publisher in &self.publishers {
            publisher.unpublish_connection(obj, details).await?;
        }
        Ok(())
    }
}

/// Writes connection details to the secret named by
/// `spec.writeConnectionSecretToRef`
///
/// The secret is owned by the managed resource when both live in the same
/// namespace, so Kubernetes garbage collects it along with the resource.
pub struct SecretConnectionPublisher {
    secrets: Arc<dyn SecretStore>,
}

impl std::fmt::Debug for SecretConnectionPublisher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SecretConnectionPublisher")
            .finish_non_exhaustive()
    }
}

impl SecretConnectionPublisher {
    #[must_use]
    pub fn new(secrets: Arc<dyn SecretStore>) -> Self {
        Self { secrets }
    }

    /// Namespace and name of the connection secret, if the resource asks for one
    fn secret_location<K: Managed>(obj: &K) -> Option<(String, String)> {
        let secret_ref = obj.resource_spec().write_connection_secret_to_ref.as_ref()?;
        let namespace = secret_ref
            .namespace
            .clone()
            .or_else(|| obj.namespace())
            .unwrap_or_else(|| "default".to_string());
        Some((namespace, secret_ref.name.clone()))
    }
}

#[async_trait]
impl<K: Managed> ConnectionPublisher<K> for SecretConnectionPublisher {
    async fn publish_connection(
        &self,
        obj: &K,
        details: &ConnectionDetails,
    ) -> anyhow::Result<bool> {
        let Some((namespace, name)) = Self::secret_location(obj) else {
            return Ok(false);
        };
        let owner = if obj.namespace().as_deref() == Some(namespace.as_str()) {
            obj.controller_owner_ref(&())
        } else {
            None
        };
        let changed = self
            .secrets
            .apply(&namespace, &name, details, owner)
            .await
            .context("cannot publish connection details")?;
        if changed {
            debug!(secret = %format!("{namespace}/{name}"), "Published connection details");
        }
        Ok(changed)
    }

    async fn unpublish_connection(
        &self,
        obj: &K,
        _details: &ConnectionDetails,
    ) -> anyhow::Result<()> {
        let Some((namespace, name)) = Self::secret_location(obj) else {
            return Ok(());
        };
        self.secrets
            .delete(&namespace, &name)
            .await
            .context("cannot unpublish connection details")
    }
}

#[async_trait]
impl<K: Managed> ConnectionDetailsFetcher<K> for SecretConnectionPublisher {
    async fn fetch_connection(&self, obj: &K) -> anyhow::Result<ConnectionDetails> {
        let Some((namespace, name)) = Self::secret_location(obj) else {
            return Ok(ConnectionDetails::new());
        };
        let data = self
            .secrets
            .read(&namespace, &name)
            .await
            .context("cannot fetch connection details")?;
        Ok(data.unwrap_or_default())
    }
}

/// Publisher that publishes nothing
#[derive(Debug, Default, Clone, Copy)]
pub struct NopConnectionPublisher;

#[async_trait]
impl<K: Send + Sync> ConnectionPublisher<K> for NopConnectionPublisher {
    async fn publish_connection(
        &self,
        _obj: &K,
        _details: &ConnectionDetails,
    ) -> anyhow::Result<bool> {
        Ok(false)
    }

    async fn unpublish_connection(
        &self,
        _obj: &K,
        _details: &ConnectionDetails,
    ) -> anyhow::Result<()> {
        Ok(())
    }
}
