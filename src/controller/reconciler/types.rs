//! # Reconciler Types
//!
//! Outcome, error and option types shared by the reconciler.

use crate::constants::{
    DEFAULT_CREATION_GRACE_PERIOD_SECS, DEFAULT_POLL_INTERVAL_SECS,
    DEFAULT_RECONCILE_TIMEOUT_SECS,
};
use crate::controller::reconciler::policy::{default_supported_management_policies, PolicySet};
use crate::store::StoreError;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// When the resource should be reconciled again
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Requeue {
    /// Wait for the next change to the resource
    None,
    /// As soon as possible, subject to per-resource rate limiting
    Immediate,
    /// After a fixed delay
    After(Duration),
}

/// Errors returned from a reconcile
///
/// Most failures are reported through the resource's `Synced` condition and
/// a requeue instead; only failures that prevent even that are returned.
#[derive(Debug, Error)]
pub enum ReconcilerError {
    #[error("cannot get managed resource: {0}")]
    Get(#[source] StoreError),
    #[error("cannot update managed resource status: {0}")]
    Status(#[source] StoreError),
    #[error("reconcile did not finish within {0:?}")]
    Timeout(Duration),
}

impl ReconcilerError {
    #[must_use]
    pub fn is_conflict(&self) -> bool {
        match self {
            Self::Get(e) | Self::Status(e) => e.is_conflict(),
            Self::Timeout(_) => false,
        }
    }
}

/// Computes the steady-state requeue delay for a resource from the configured
/// poll interval
pub type PollIntervalHook<K> = Arc<dyn Fn(&K, Duration) -> Duration + Send + Sync>;

/// Tunables of a [`Reconciler`](crate::controller::reconciler::Reconciler)
pub struct ReconcilerOptions<K> {
    /// Delay before re-observing an up-to-date external resource
    pub poll_interval: Duration,
    /// Deadline shared by all external calls in one reconcile
    pub timeout: Duration,
    /// How long "not found" is tolerated after a successful create
    pub creation_grace_period: Duration,
    /// Honor `spec.managementPolicies`
    pub management_policies_enabled: bool,
    /// Accepted policy combinations when management policies are enabled
    pub supported_management_policies: Vec<PolicySet>,
    pub poll_interval_hook: Option<PollIntervalHook<K>>,
}

impl<K> Default for ReconcilerOptions<K> {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(DEFAULT_POLL_INTERVAL_SECS),
            timeout: Duration::from_secs(DEFAULT_RECONCILE_TIMEOUT_SECS),
            creation_grace_period: Duration::from_secs(DEFAULT_CREATION_GRACE_PERIOD_SECS),
            management_policies_enabled: false,
            supported_management_policies: default_supported_management_policies(),
            poll_interval_hook: None,
        }
    }
}

impl<K> Clone for ReconcilerOptions<K> {
    fn clone(&self) -> Self {
        Self {
            poll_interval: self.poll_interval,
            timeout: self.timeout,
            creation_grace_period: self.creation_grace_period,
            management_policies_enabled: self.management_policies_enabled,
            supported_management_policies: self.supported_management_policies.clone(),
            poll_interval_hook: self.poll_interval_hook.as_ref().map(Arc::clone),
        }
    }
}

impl<K> std::fmt::Debug for ReconcilerOptions<K> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReconcilerOptions")
            .field("poll_interval", &self.poll_interval)
            .field("timeout", &self.timeout)
            .field("creation_grace_period", &self.creation_grace_period)
            .field(
                "management_policies_enabled",
                &self.management_policies_enabled,
            )
            .field(
                "poll_interval_hook",
                &self.poll_interval_hook.as_ref().map(|_| "<fn>"),
            )
            .finish_non_exhaustive()
    }
}

impl<K> ReconcilerOptions<K> {
    #[must_use]
    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    #[must_use]
    pub fn with_creation_grace_period(mut self, period: Duration) -> Self {
        self.creation_grace_period = period;
        self
    }

    #[must_use]
    pub fn with_management_policies(mut self, enabled: bool) -> Self {
        self.management_policies_enabled = enabled;
        self
    }

    #[must_use]
    pub fn with_supported_management_policies(mut self, supported: Vec<PolicySet>) -> Self {
        self.supported_management_policies = supported;
        self
    }

    #[must_use]
    pub fn with_poll_interval_hook(
        mut self,
        hook: impl Fn(&K, Duration) -> Duration + Send + Sync + 'static,
    ) -> Self {
        self.poll_interval_hook = Some(Arc::new(hook));
        self
    }

    /// Steady-state requeue delay for `obj`
    #[must_use]
    pub fn poll_interval_for(&self, obj: &K) -> Duration {
        match &self.poll_interval_hook {
            Some(hook) => hook(obj, self.poll_interval),
            None => self.poll_interval,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_poll_interval_hook_overrides_interval() {
        let options: ReconcilerOptions<u32> = ReconcilerOptions::default()
            .with_poll_interval(Duration::from_secs(10))
            .with_poll_interval_hook(|obj: &u32, interval| interval * *obj);
        assert_eq!(options.poll_interval_for(&3), Duration::from_secs(30));
    }

    #[test]
    fn test_conflicts_are_recognised() {
        let err = ReconcilerError::Status(StoreError::Conflict {
            key: crate::store::ObjectKey::new(None, "a"),
            message: "stale".to_string(),
        });
        assert!(err.is_conflict());
        assert!(!ReconcilerError::Timeout(Duration::from_secs(1)).is_conflict());
    }
}
