//! # NopResource
//!
//! A managed resource kind whose external resource lives nowhere. Useful for
//! exercising the reconciler end to end without a real external system.

use crate::constants::ANNOTATION_EXTERNAL_NAME;
use crate::controller::reconciler::{resolve_reference, ReferenceReader};
use crate::crd::{Managed, Reference, ResourceSpec, ResourceStatus};
use async_trait::async_trait;
use kube::ResourceExt;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// NopResource Custom Resource Definition
///
/// # Example
///
/// ```yaml
/// apiVersion: nop.controlplane.io/v1alpha1
/// kind: NopResource
/// metadata:
///   name: example
///   namespace: default
/// spec:
///   deletionPolicy: Delete
///   writeConnectionSecretToRef:
///     name: example-conn
///   forProvider:
///     connectionDetails:
///       endpoint: nop.example.com
/// ```
#[derive(kube::CustomResource, Debug, Clone, Deserialize, Serialize, schemars::JsonSchema)]
#[kube(
    kind = "NopResource",
    group = "nop.controlplane.io",
    version = "v1alpha1",
    namespaced,
    status = "NopResourceStatus",
    shortname = "nop",
    printcolumn = r#"{"name":"Ready", "type":"string", "jsonPath":".status.conditions[?(@.type==\"Ready\")].status"}, {"name":"Synced", "type":"string", "jsonPath":".status.conditions[?(@.type==\"Synced\")].status"}, {"name":"External-Name", "type":"string", "jsonPath":".metadata.annotations.controlplane\\.io/external-name"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct NopResourceSpec {
    #[serde(flatten)]
    pub resource_spec: ResourceSpec,
    /// Desired state of the external resource
    #[serde(default)]
    pub for_provider: NopParameters,
}

/// Desired state of a nop external resource
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct NopParameters {
    /// Free-form description, late-initialized when unset
    #[serde(default)]
    pub description: Option<String>,
    /// Connection details the external resource reports
    #[serde(default)]
    pub connection_details: BTreeMap<String, String>,
    /// External name of a peer resource
    #[serde(default)]
    pub peer: Option<String>,
    /// Reference used to fill `peer` from another resource's external name
    #[serde(default)]
    pub peer_ref: Option<Reference>,
}

/// Observed state of a nop external resource
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct NopObservation {
    /// Last time the external resource was observed (RFC3339)
    #[serde(default)]
    pub observed_at: Option<String>,
}

/// Status of the NopResource resource
#[derive(Debug, Clone, Default, Deserialize, Serialize, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct NopResourceStatus {
    #[serde(flatten)]
    pub resource_status: ResourceStatus,
    #[serde(default)]
    pub at_provider: NopObservation,
}

#[async_trait]
impl Managed for NopResource {
    fn resource_spec(&self) -> &ResourceSpec {
        &self.spec.resource_spec
    }

    fn resource_status(&self) -> Option<&ResourceStatus> {
        self.status.as_ref().map(|s| &s.resource_status)
    }

    fn resource_status_mut(&mut self) -> &mut ResourceStatus {
        &mut self.status.get_or_insert_with(Default::default).resource_status
    }

    fn copy_spec_from(&mut self, other: &Self) {
        self.spec = other.spec.clone();
    }

    async fn resolve_references(&mut self, reader: &dyn ReferenceReader) -> anyhow::Result<()> {
        let Some(peer_ref) = self.spec.for_provider.peer_ref.clone() else {
            return Ok(());
        };
        let pointer = format!(
            "/metadata/annotations/{}",
            ANNOTATION_EXTERNAL_NAME.replace('~', "~0").replace('/', "~1")
        );
        let namespace = self.namespace();
        let peer = resolve_reference(reader, &peer_ref, namespace.as_deref(), &pointer)
            .await
            .map_err(|e| anyhow::anyhow!("spec.forProvider.peer: {e}"))?;
        self.spec.for_provider.peer = Some(peer);
        Ok(())
    }
}
