//! # Watch Loop
//!
//! Controller watch loop that monitors managed resources and triggers
//! reconciliation when changes are detected.

use crate::config::ControllerConfig;
use crate::controller::backoff::FibonacciBackoff;
use crate::controller::reconciler::{Reconciler, ReconcilerError, Requeue};
use crate::crd::Managed;
use crate::runtime::error_policy::{handle_reconciliation_error, handle_watch_stream_error};
use crate::server::ServerState;
use crate::store::ObjectKey;
use futures::StreamExt;
use kube::api::Api;
use kube_runtime::{controller, controller::Action, watcher, Controller};
use std::collections::HashMap;
use std::sync::atomic::Ordering;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tracing::{debug, info, warn};

/// State shared by every reconciliation of one managed resource kind
pub struct Context<K: Managed> {
    pub reconciler: Reconciler<K>,
    backoff_states: Mutex<HashMap<ObjectKey, FibonacciBackoff>>,
    backoff_start: Duration,
    backoff_max: Duration,
}

impl<K: Managed> std::fmt::Debug for Context<K> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Context")
            .field("reconciler", &self.reconciler)
            .field("backoff_start", &self.backoff_start)
            .field("backoff_max", &self.backoff_max)
            .finish_non_exhaustive()
    }
}

impl<K: Managed> Context<K> {
    #[must_use]
    pub fn new(reconciler: Reconciler<K>, config: &ControllerConfig) -> Self {
        Self {
            reconciler,
            backoff_states: Mutex::new(HashMap::new()),
            backoff_start: config.backoff_start_duration(),
            backoff_max: config.backoff_max_duration(),
        }
    }

    /// Next delay for a resource that must be retried, advancing its backoff
    pub fn next_backoff(&self, key: &ObjectKey) -> Duration {
        let mut states = self
            .backoff_states
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        states
            .entry(key.clone())
            .or_insert_with(|| FibonacciBackoff::new(self.backoff_start, self.backoff_max))
            .next_backoff()
    }

    /// Forget the backoff of a resource that reconciled cleanly
    pub fn reset_backoff(&self, key: &ObjectKey) {
        self.backoff_states
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(key);
    }

    /// Translate a reconcile outcome into a controller action
    pub fn action_for(&self, key: &ObjectKey, requeue: Requeue) -> Action {
        match requeue {
            Requeue::None => {
                self.reset_backoff(key);
                Action::await_change()
            }
            Requeue::Immediate => Action::requeue(self.next_backoff(key)),
            Requeue::After(delay) => {
                self.reset_backoff(key);
                Action::requeue(delay)
            }
        }
    }
}

/// Reconcile one managed resource on behalf of the controller
pub async fn reconcile_managed<K: Managed>(
    obj: Arc<K>,
    ctx: Arc<Context<K>>,
) -> Result<Action, ReconcilerError> {
    let key = ObjectKey::from_resource(obj.as_ref());
    debug!(
        resource = %key,
        generation = ?obj.meta().generation,
        resource_version = ?obj.meta().resource_version,
        "watch.event.received"
    );
    let requeue = ctx.reconciler.reconcile(&key).await?;
    let action = ctx.action_for(&key, requeue);
    debug!(resource = %key, action = ?action, "watch.event.reconciled");
    Ok(action)
}

/// Run the controller watch loop
///
/// Watches the resources `api` can see and reconciles each one on change.
/// The watch is restarted after the stream ends, until a shutdown signal
/// marks the server as not ready.
pub async fn run_watch_loop<K: Managed>(
    api: Api<K>,
    ctx: Arc<Context<K>>,
    server_state: Arc<ServerState>,
    config: ControllerConfig,
) -> anyhow::Result<()> {
    let shutdown_state = Arc::clone(&server_state);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Received shutdown signal, initiating graceful shutdown...");
        }
        shutdown_state.is_ready.store(false, Ordering::Relaxed);
    });

    loop {
        if !server_state.is_ready.load(Ordering::Relaxed) {
            info!("Shutdown requested, exiting watch loop");
            break;
        }

        info!(
            concurrency = config.max_concurrent_reconciliations,
            "Starting controller watch loop..."
        );
        let restart_delay = config.watch_restart_delay_duration();
        Controller::new(api.clone(), watcher::Config::default().any_semantic())
            .with_config(
                controller::Config::default().concurrency(config.max_concurrent_reconciliations),
            )
            .shutdown_on_signal()
            .run(
                reconcile_managed::<K>,
                handle_reconciliation_error::<K>,
                Arc::clone(&ctx),
            )
            .for_each(|result| async move {
                match result {
                    Ok((obj_ref, _action)) => debug!(resource = %obj_ref, "watch.event.success"),
                    // Already logged and backed off by the error policy
                    Err(controller::Error::ReconcilerFailed(_, obj_ref)) => {
                        debug!(resource = %obj_ref, "watch.event.reconciliation_failed");
                    }
                    Err(e) => handle_watch_stream_error(&format!("{e:?}"), restart_delay).await,
                }
            })
            .await;

        if !server_state.is_ready.load(Ordering::Relaxed) {
            info!("Shutdown requested, exiting watch loop");
            break;
        }
        warn!(
            "Controller watch stream ended, restarting in {} seconds...",
            restart_delay.as_secs()
        );
        tokio::time::sleep(restart_delay).await;
    }

    info!("Controller stopped gracefully");
    Ok(())
}
