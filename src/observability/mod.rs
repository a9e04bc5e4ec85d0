//! # Observability
//!
//! - `metrics`: Prometheus metrics collection
//! - `events`: Kubernetes events about managed resources

pub mod events;
pub mod metrics;

pub use events::{
    Event, EventKind, EventRecorder, KubeEventRecorder, MemoryEventRecorder, NopEventRecorder,
};
