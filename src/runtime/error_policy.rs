//! # Error Policy
//!
//! Error handling and backoff logic for the controller watch loop.
//! This module handles reconciliation errors and watch stream errors.

use crate::crd::Managed;
use crate::observability::metrics;
use crate::runtime::Context;
use crate::store::ObjectKey;
use kube_runtime::controller::Action;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, warn};

use crate::controller::reconciler::ReconcilerError;

/// Handle reconciliation errors with Fibonacci backoff
///
/// Backoff state is tracked per resource, so one failing resource does not
/// slow down the others.
pub fn handle_reconciliation_error<K: Managed>(
    obj: Arc<K>,
    error: &ReconcilerError,
    ctx: Arc<Context<K>>,
) -> Action {
    let key = ObjectKey::from_resource(obj.as_ref());
    let backoff = ctx.next_backoff(&key);

    error!(
        resource = %key,
        error = %error,
        retry_in = ?backoff,
        "Reconciliation failed"
    );
    metrics::increment_requeues("error");
    Action::requeue(backoff)
}

/// Classification of a watch stream error
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchErrorKind {
    /// RBAC revoked or token expired
    Unauthorized,
    /// Resource version too old; the watcher re-lists on its own
    Expired,
    /// API server throttling or still starting
    Throttled,
    /// CRD not installed or removed
    NotFound,
    Other,
}

/// Classify a watch stream error by its message
#[must_use]
pub fn classify_watch_error(error_string: &str) -> WatchErrorKind {
    // 404 first: a plain-text 404 body surfaces as a decode error that also mentions the watch
    let is_not_found = error_string.contains("ObjectNotFound")
        || error_string.contains("404")
        || error_string.contains("not found");
    if is_not_found {
        WatchErrorKind::NotFound
    } else if error_string.contains("401") || error_string.contains("Unauthorized") {
        WatchErrorKind::Unauthorized
    } else if error_string.contains("410")
        || error_string.contains("too old resource version")
        || error_string.contains("Expired")
        || error_string.contains("Gone")
    {
        WatchErrorKind::Expired
    } else if error_string.contains("429")
        || error_string.contains("storage is (re)initializing")
        || error_string.contains("TooManyRequests")
    {
        WatchErrorKind::Throttled
    } else {
        WatchErrorKind::Other
    }
}

/// Handle a watch stream error, sleeping where retrying at once would not help
pub async fn handle_watch_stream_error(error_string: &str, restart_delay: Duration) {
    match classify_watch_error(error_string) {
        WatchErrorKind::Unauthorized => {
            error!(
                error = %error_string,
                "Watch authentication failed (401 Unauthorized); RBAC may have been revoked or the token expired"
            );
            tokio::time::sleep(restart_delay).await;
        }
        WatchErrorKind::NotFound => {
            error!(
                error = %error_string,
                "Watched resource kind not found; is the CRD installed?"
            );
            tokio::time::sleep(restart_delay).await;
        }
        WatchErrorKind::Throttled => {
            warn!(error = %error_string, "Watch throttled by the API server, backing off");
            tokio::time::sleep(restart_delay).await;
        }
        WatchErrorKind::Expired => {
            debug!(error = %error_string, "Watch resource version expired, re-listing");
        }
        WatchErrorKind::Other => {
            warn!(error = %error_string, "Watch stream error");
        }
    }
}
