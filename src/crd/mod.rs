//! # Custom Resource Definitions
//!
//! Types shared by every managed resource, plus the `NopResource` kind.
//!
//! ## Module Structure
//!
//! - `common.rs` - Spec fields every managed resource carries
//! - `status.rs` - Conditions and the common status block
//! - `managed.rs` - The `Managed` trait the reconciler is generic over
//! - `nop.rs` - `NopResource`, a managed resource with no external system

mod common;
mod managed;
mod nop;
mod status;

pub use common::{
    DeletionPolicy, ManagementAction, ProviderConfigReference, Reference, ResourceSpec,
    SecretReference,
};
pub use managed::Managed;
pub use nop::{NopObservation, NopParameters, NopResource, NopResourceSpec, NopResourceStatus};
pub use status::{
    Condition, ResourceStatus, REASON_AVAILABLE, REASON_CREATING, REASON_DELETING,
    REASON_RECONCILE_ERROR, REASON_RECONCILE_PAUSED, REASON_RECONCILE_SUCCESS,
    REASON_UNAVAILABLE, TYPE_READY, TYPE_SYNCED,
};
