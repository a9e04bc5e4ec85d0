//! # Reconciler
//!
//! Core reconciliation logic for managed resources.
//!
//! The reconciler is generic over the managed resource kind and talks to the
//! outside world only through its collaborators:
//! - An [`ObjectStore`](crate::store::ObjectStore) for the managed resource itself
//! - An [`ExternalConnecter`] supplied by the driver for the external system
//! - A [`Finalizer`], [`Initializer`]s, a [`ReferenceResolver`], [`ConnectionPublisher`]s
//!   and a [`CriticalAnnotationUpdater`], all replaceable
//!
//! ## Reconciliation Flow
//!
//! 1. Check the pause annotation and validate management policies
//! 2. Initialize the resource and resolve its references
//! 3. Connect to the external system and observe the external resource
//! 4. Delete, create, late-initialize or update it
//! 5. Publish connection details and update status

pub mod connection;
pub mod critical;
pub mod external;
pub mod finalizer;
pub mod initializer;
pub mod meta;
pub mod policy;
pub mod reconcile;
pub mod references;
pub mod types;

// Re-export public API
pub use connection::{
    ConnectionDetails, ConnectionDetailsFetcher, ConnectionPublisher, NopConnectionPublisher,
    PublisherChain, SecretConnectionPublisher,
};
pub use critical::{CriticalAnnotationUpdater, RetryingCriticalAnnotationUpdater};
pub use external::{
    ExternalClient, ExternalConnecter, ExternalCreation, ExternalObservation, ExternalUpdate,
};
pub use finalizer::{ApiFinalizer, Finalizer, NopFinalizer};
pub use initializer::{Initializer, InitializerChain, NameAsExternalName};
pub use policy::{
    default_supported_management_policies, ManagementPoliciesResolver, PolicyError, PolicySet,
};
pub use reconcile::{reason, Reconciler};
pub use references::{
    resolve_reference, ApiReferenceResolver, KubeReferenceReader, NopReferenceResolver,
    ReferenceReader, ReferenceResolver,
};
pub use types::{PollIntervalHook, ReconcilerError, ReconcilerOptions, Requeue};
