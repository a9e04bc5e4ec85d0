//! # Prelude
//!
//! Re-exports commonly used types and traits for convenience.
//!
//! ## Usage
//!
//! ```rust
//! use managed_resource_controller::prelude::*;
//! ```
//!
//! This brings into scope:
//! - All CRD types (`NopResource`, `ResourceSpec`, `Condition`, etc.)
//! - The `Managed` trait and the reconciler with its collaborator traits
//! - Store types (`ObjectStore`, `ObjectKey`, `StoreError`)
//! - Config types (`ControllerConfig`)

pub use crate::crd::*;

pub use crate::controller::reconciler::{
    ConnectionDetails, ConnectionPublisher, ExternalClient, ExternalConnecter, ExternalCreation,
    ExternalObservation, ExternalUpdate, Finalizer, Initializer, ReconcilerError,
    ReconcilerOptions, Reconciler, ReferenceResolver, Requeue,
};

pub use crate::store::{ObjectKey, ObjectStore, StoreError};

pub use crate::config::{ControllerConfig, SharedControllerConfig};

pub use crate::observability::{Event, EventRecorder};
