//! # Managed Trait
//!
//! Accessors the reconciler needs on any managed resource kind.

use crate::controller::reconciler::ReferenceReader;
use crate::crd::{Condition, ResourceSpec, ResourceStatus};
use async_trait::async_trait;
use kube::Resource;
use serde::{de::DeserializeOwned, Serialize};

/// A Kubernetes resource that declares the desired state of one external resource
///
/// Implemented by every CRD the reconciler drives. The reconciler only ever
/// touches the common spec fields, the common status block and the metadata;
/// everything else belongs to the driver.
#[async_trait]
pub trait Managed:
    Resource<DynamicType = ()>
    + Clone
    + std::fmt::Debug
    + Serialize
    + DeserializeOwned
    + Send
    + Sync
    + 'static
{
    fn resource_spec(&self) -> &ResourceSpec;

    fn resource_status(&self) -> Option<&ResourceStatus>;

    /// Status block, created on first access
    fn resource_status_mut(&mut self) -> &mut ResourceStatus;

    /// Replace the whole spec with the one `other` carries
    fn copy_spec_from(&mut self, other: &Self);

    /// Fill spec fields that are declared as references to other resources
    ///
    /// Kinds without references keep the default, which does nothing.
    async fn resolve_references(&mut self, _reader: &dyn ReferenceReader) -> anyhow::Result<()> {
        Ok(())
    }

    fn set_conditions(&mut self, conditions: &[Condition]) {
        self.resource_status_mut().set_conditions(conditions);
    }

    fn condition(&self, r#type: &str) -> Option<&Condition> {
        self.resource_status().and_then(|status| status.condition(r#type))
    }
}
