//! # Managed Resource Controller
//!
//! A Kubernetes controller that drives external resources toward the state
//! declared by managed custom resources.
//!
//! ## Overview
//!
//! For every `NopResource` the controller:
//!
//! 1. **Observes** the external resource it represents
//! 2. **Creates, updates or deletes** it as the spec and management policies require
//! 3. **Publishes** connection details to a Kubernetes secret
//! 4. **Reports** `Ready` and `Synced` conditions on the resource status
//!
//! Resources are re-observed on a poll interval, since nothing notifies the
//! controller when an external resource drifts.

use anyhow::Result;
use managed_resource_controller::runtime::{initialize, run_watch_loop};

#[tokio::main]
async fn main() -> Result<()> {
    let init = initialize().await?;
    let config = init.controller_config.read().await.clone();

    run_watch_loop(init.resources, init.context, init.server_state, config).await
}
