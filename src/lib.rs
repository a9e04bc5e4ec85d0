//! Managed Resource Controller Library
//!
//! This library provides a generic reconciliation engine for managed
//! resources: Kubernetes objects that each represent one resource in an
//! external system. Tests are included in the module files and under `tests/`.
//!
//! ## Quick Start
//!
//! ```rust
//! use managed_resource_controller::prelude::*;
//! ```
//!
//! This brings commonly used types and traits into scope. For more specific imports,
//! use the individual modules.

pub mod config;
pub mod constants;
pub mod controller;
pub mod crd;
pub mod observability;
pub mod prelude;
pub mod runtime;
pub mod secrets;
pub mod server;
pub mod store;
