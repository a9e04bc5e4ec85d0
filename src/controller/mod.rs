//! # Controller
//!
//! Core controller modules for the managed resource controller.
//!
//! - `backoff`: Fibonacci backoff for immediate requeues and errors
//! - `nop`: Driver for `NopResource`
//! - `reconciler`: Core reconciliation logic

pub mod backoff;
pub mod nop;
pub mod reconciler;
