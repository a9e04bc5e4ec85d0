//! # Constants
//!
//! Shared constants used throughout the controller.
//!
//! These values represent reasonable defaults and can be overridden via
//! configuration or environment variables where applicable.

/// Default HTTP server port for metrics and health probes
pub const DEFAULT_METRICS_PORT: u16 = 5000;

/// Default interval between steady-state observations of an external resource (seconds)
/// Nothing notifies the controller when an external resource drifts, so it must poll
pub const DEFAULT_POLL_INTERVAL_SECS: u64 = 60;

/// Default budget for one reconcile invocation (seconds)
/// External calls share this deadline; status persistence gets `RECONCILE_GRACE_PERIOD_SECS` on top
pub const DEFAULT_RECONCILE_TIMEOUT_SECS: u64 = 60;

/// Extra time granted after the external deadline so a final status update can still land
pub const RECONCILE_GRACE_PERIOD_SECS: u64 = 5;

/// Default window after a successful create during which "not found" is treated as lag (seconds)
pub const DEFAULT_CREATION_GRACE_PERIOD_SECS: u64 = 30;

/// Default exponential backoff starting value (milliseconds)
pub const DEFAULT_BACKOFF_START_MS: u64 = 1000;

/// Default exponential backoff maximum value (milliseconds)
pub const DEFAULT_BACKOFF_MAX_MS: u64 = 60_000;

/// Default delay before restarting watch stream after unknown errors (seconds)
pub const DEFAULT_WATCH_RESTART_DELAY_SECS: u64 = 5;

/// Default maximum number of concurrent reconciliations
pub const DEFAULT_MAX_CONCURRENT_RECONCILIATIONS: u16 = 10;

/// Number of attempts made when persisting critical annotations
pub const CRITICAL_ANNOTATION_RETRY_STEPS: u32 = 5;

/// Delay between critical annotation update attempts (milliseconds)
pub const CRITICAL_ANNOTATION_RETRY_DELAY_MS: u64 = 10;

/// Finalizer placed on every managed resource before its external resource is created
pub const FINALIZER_NAME: &str = "finalizer.managedresource.controlplane.io";

/// Field manager and event reporter name
pub const CONTROLLER_NAME: &str = "managed-resource-controller";

/// Annotation holding the identifier of the external resource
pub const ANNOTATION_EXTERNAL_NAME: &str = "controlplane.io/external-name";

/// Annotation recording when creation of the external resource was started
pub const ANNOTATION_EXTERNAL_CREATE_PENDING: &str = "controlplane.io/external-create-pending";

/// Annotation recording when creation of the external resource succeeded
pub const ANNOTATION_EXTERNAL_CREATE_SUCCEEDED: &str =
    "controlplane.io/external-create-succeeded";

/// Annotation recording when creation of the external resource failed
pub const ANNOTATION_EXTERNAL_CREATE_FAILED: &str = "controlplane.io/external-create-failed";

/// Annotation that pauses reconciliation when set to "true"
pub const ANNOTATION_PAUSED: &str = "controlplane.io/paused";

/// Maximum time to wait for the HTTP server to bind at startup (seconds)
pub const SERVER_STARTUP_TIMEOUT_SECS: u64 = 10;

/// Interval between HTTP server readiness checks at startup (milliseconds)
pub const SERVER_STARTUP_POLL_INTERVAL_MS: u64 = 50;
