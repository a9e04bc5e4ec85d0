//! # External Resource Driver
//!
//! The contract between the reconciler and the code that talks to an external
//! system. A driver supplies an [`ExternalConnecter`] that yields an
//! [`ExternalClient`] for one managed resource.

use crate::controller::reconciler::ConnectionDetails;
use async_trait::async_trait;

/// What the driver found when it looked at the external resource
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExternalObservation {
    /// The external resource exists
    pub resource_exists: bool,
    /// The external resource matches the desired state
    pub resource_up_to_date: bool,
    /// The driver filled unset spec fields from the external resource
    pub resource_late_initialized: bool,
    /// Connection details to publish
    pub connection_details: ConnectionDetails,
    /// Human readable difference between desired and observed state
    pub diff: String,
}

/// Result of creating an external resource
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExternalCreation {
    pub connection_details: ConnectionDetails,
}

/// Result of updating an external resource
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExternalUpdate {
    pub connection_details: ConnectionDetails,
}

/// Produces a client for the external system a managed resource lives in
#[async_trait]
pub trait ExternalConnecter<K>: Send + Sync {
    async fn connect(&self, obj: &K) -> anyhow::Result<Box<dyn ExternalClient<K>>>;
}

/// Operations on one external resource
///
/// `observe` and `create` may modify the managed resource, for example to
/// late-initialize spec fields, record observed state in status, or set the
/// external name chosen by the external system.
#[async_trait]
pub trait ExternalClient<K>: Send + Sync {
    async fn observe(&self, obj: &mut K) -> anyhow::Result<ExternalObservation>;

    async fn create(&self, obj: &mut K) -> anyhow::Result<ExternalCreation>;

    async fn update(&self, obj: &K) -> anyhow::Result<ExternalUpdate>;

    async fn delete(&self, obj: &K) -> anyhow::Result<()>;

    /// Release whatever `connect` acquired
    async fn disconnect(&self) -> anyhow::Result<()> {
        Ok(())
    }
}
