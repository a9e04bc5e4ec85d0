//! # Kubernetes Secret Store

use super::{changed_keys, SecretData, SecretStore};
use anyhow::Context;
use async_trait::async_trait;
use k8s_openapi::api::core::v1::Secret;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::OwnerReference;
use k8s_openapi::ByteString;
use kube::api::{DeleteParams, ObjectMeta, Patch, PatchParams, PostParams};
use kube::{Api, Client};
use std::collections::BTreeMap;
use tracing::{debug, info};

/// Secret store writing `Secret` objects through the Kubernetes API
#[derive(Clone)]
pub struct KubeSecretStore {
    client: Client,
}

impl std::fmt::Debug for KubeSecretStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KubeSecretStore").finish_non_exhaustive()
    }
}

impl KubeSecretStore {
    #[must_use]
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    fn api(&self, namespace: &str) -> Api<Secret> {
        Api::namespaced(self.client.clone(), namespace)
    }
}

fn decode(secret: Secret) -> SecretData {
    secret
        .data
        .unwrap_or_default()
        .into_iter()
        .map(|(key, value)| (key, value.0))
        .collect()
}

#[async_trait]
impl SecretStore for KubeSecretStore {
    async fn read(&self, namespace: &str, name: &str) -> anyhow::Result<Option<SecretData>> {
        let secret = self
            .api(namespace)
            .get_opt(name)
            .await
            .with_context(|| format!("Failed to get secret {namespace}/{name}"))?;
        Ok(secret.map(decode))
    }

    async fn apply(
        &self,
        namespace: &str,
        name: &str,
        data: &SecretData,
        owner: Option<OwnerReference>,
    ) -> anyhow::Result<bool> {
        let encoded: BTreeMap<String, ByteString> = data
            .iter()
            .map(|(key, value)| (key.clone(), ByteString(value.clone())))
            .collect();
        let api = self.api(namespace);

        let Some(existing) = self.read(namespace, name).await? else {
            let secret = Secret {
                metadata: ObjectMeta {
                    name: Some(name.to_string()),
                    namespace: Some(namespace.to_string()),
                    owner_references: owner.map(|o| vec![o]),
                    ..Default::default()
                },
                data: Some(encoded),
                type_: Some("connection.controlplane.io/v1alpha1".to_string()),
                ..Default::default()
            };
            api.create(&PostParams::default(), &secret)
                .await
                .with_context(|| format!("Failed to create secret {namespace}/{name}"))?;
            info!(secret = %format!("{namespace}/{name}"), "Created connection secret");
            return Ok(true);
        };

        let changed = changed_keys(&existing, data);
        if changed.is_empty() {
            debug!(secret = %format!("{namespace}/{name}"), "Connection secret already up to date");
            return Ok(false);
        }

        let patch = serde_json::json!({ "data": encoded });
        api.patch(name, &PatchParams::default(), &Patch::Merge(&patch))
            .await
            .with_context(|| format!("Failed to patch secret {namespace}/{name}"))?;
        debug!(
            secret = %format!("{namespace}/{name}"),
            keys = ?changed,
            "Updated connection secret"
        );
        Ok(true)
    }

    async fn delete(&self, namespace: &str, name: &str) -> anyhow::Result<()> {
        match self.api(namespace).delete(name, &DeleteParams::default()).await {
            Ok(_) => {
                info!(secret = %format!("{namespace}/{name}"), "Deleted connection secret");
                Ok(())
            }
            Err(kube::Error::Api(api_err)) if api_err.code == 404 => Ok(()),
            Err(e) => Err(e).with_context(|| format!("Failed to delete secret {namespace}/{name}")),
        }
    }
}
