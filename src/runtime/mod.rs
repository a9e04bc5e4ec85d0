//! # Runtime
//!
//! Drives the reconciler from a Kubernetes watch.
//!
//! - `initialization`: Process setup and reconciler wiring
//! - `watch_loop`: Controller setup, per-resource backoff and restart logic
//! - `error_policy`: Reconciliation and watch stream error handling

pub mod error_policy;
pub mod initialization;
pub mod watch_loop;

pub use initialization::{initialize, InitializationResult};
pub use watch_loop::{reconcile_managed, run_watch_loop, Context};
