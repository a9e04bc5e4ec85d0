//! # Controller Configuration
//!
//! Controller-level settings loaded from environment variables.

use crate::controller::reconciler::ReconcilerOptions;
use std::time::Duration;

/// Controller-level configuration
///
/// All settings have sensible defaults and can be overridden via environment variables.
/// Environment variables are populated from a ConfigMap using `envFrom` in the deployment.
#[derive(Debug, Clone)]
pub struct ControllerConfig {
    /// Steady-state poll interval (seconds)
    /// How long to wait before re-observing an up-to-date external resource
    pub poll_interval_secs: u64,
    /// Reconcile timeout (seconds)
    /// Deadline shared by all external calls made in one reconcile
    pub reconcile_timeout_secs: u64,
    /// Creation grace period (seconds)
    /// "Not found" right after a successful create is tolerated for this long
    pub creation_grace_period_secs: u64,
    /// Enable management policies
    /// When false, `spec.managementPolicies` must be left at its default
    pub management_policies_enabled: bool,
    /// Exponential backoff starting value (milliseconds)
    /// Initial delay before retrying after an error or an immediate requeue
    pub backoff_start_ms: u64,
    /// Exponential backoff maximum value (milliseconds)
    /// Maximum delay between retries
    pub backoff_max_ms: u64,
    /// Watch stream restart delay after unknown errors (seconds)
    pub watch_restart_delay_secs: u64,
    /// Maximum concurrent reconciliations
    /// Limits how many resources can be reconciled simultaneously
    pub max_concurrent_reconciliations: u16,
    /// HTTP port for `/metrics`, `/healthz` and `/readyz`
    pub metrics_port: u16,
    /// Namespace to watch (all namespaces when unset)
    pub watch_namespace: Option<String>,
    /// Event reporter instance, usually the pod name
    pub reporter_instance: Option<String>,
    /// Global log level (ERROR, WARN, INFO, DEBUG, TRACE)
    pub log_level: String,
    /// Log format (json, text)
    pub log_format: String,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        use crate::constants::*;
        Self {
            poll_interval_secs: DEFAULT_POLL_INTERVAL_SECS,
            reconcile_timeout_secs: DEFAULT_RECONCILE_TIMEOUT_SECS,
            creation_grace_period_secs: DEFAULT_CREATION_GRACE_PERIOD_SECS,
            management_policies_enabled: false,
            backoff_start_ms: DEFAULT_BACKOFF_START_MS,
            backoff_max_ms: DEFAULT_BACKOFF_MAX_MS,
            watch_restart_delay_secs: DEFAULT_WATCH_RESTART_DELAY_SECS,
            max_concurrent_reconciliations: DEFAULT_MAX_CONCURRENT_RECONCILIATIONS,
            metrics_port: DEFAULT_METRICS_PORT,
            watch_namespace: None,
            reporter_instance: None,
            log_level: "INFO".to_string(),
            log_format: "json".to_string(),
        }
    }
}

impl ControllerConfig {
    /// Load configuration from environment variables with defaults
    #[must_use]
    pub fn from_env() -> Self {
        use crate::constants::*;
        Self {
            poll_interval_secs: env_var_or_default("POLL_INTERVAL_SECS", DEFAULT_POLL_INTERVAL_SECS),
            reconcile_timeout_secs: env_var_or_default(
                "RECONCILE_TIMEOUT_SECS",
                DEFAULT_RECONCILE_TIMEOUT_SECS,
            ),
            creation_grace_period_secs: env_var_or_default(
                "CREATION_GRACE_PERIOD_SECS",
                DEFAULT_CREATION_GRACE_PERIOD_SECS,
            ),
            management_policies_enabled: env_var_or_default_bool(
                "MANAGEMENT_POLICIES_ENABLED",
                false,
            ),
            backoff_start_ms: env_var_or_default("BACKOFF_START_MS", DEFAULT_BACKOFF_START_MS),
            backoff_max_ms: env_var_or_default("BACKOFF_MAX_MS", DEFAULT_BACKOFF_MAX_MS),
            watch_restart_delay_secs: env_var_or_default(
                "WATCH_RESTART_DELAY_SECS",
                DEFAULT_WATCH_RESTART_DELAY_SECS,
            ),
            max_concurrent_reconciliations: env_var_or_default(
                "MAX_CONCURRENT_RECONCILIATIONS",
                DEFAULT_MAX_CONCURRENT_RECONCILIATIONS,
            ),
            metrics_port: env_var_or_default("METRICS_PORT", DEFAULT_METRICS_PORT),
            watch_namespace: std::env::var("WATCH_NAMESPACE")
                .ok()
                .filter(|ns| !ns.is_empty()),
            reporter_instance: std::env::var("POD_NAME").ok(),
            log_level: env_var_or_default_str("LOG_LEVEL", "INFO"),
            log_format: env_var_or_default_str("LOG_FORMAT", "json"),
        }
    }

    /// Get poll interval duration
    #[must_use]
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    /// Get reconcile timeout duration
    #[must_use]
    pub fn reconcile_timeout(&self) -> Duration {
        Duration::from_secs(self.reconcile_timeout_secs)
    }

    /// Get creation grace period duration
    #[must_use]
    pub fn creation_grace_period(&self) -> Duration {
        Duration::from_secs(self.creation_grace_period_secs)
    }

    /// Get backoff start duration
    #[must_use]
    pub fn backoff_start_duration(&self) -> Duration {
        Duration::from_millis(self.backoff_start_ms)
    }

    /// Get backoff max duration
    #[must_use]
    pub fn backoff_max_duration(&self) -> Duration {
        Duration::from_millis(self.backoff_max_ms)
    }

    /// Get watch restart delay duration
    #[must_use]
    pub fn watch_restart_delay_duration(&self) -> Duration {
        Duration::from_secs(self.watch_restart_delay_secs)
    }

    /// Reconciler options derived from this configuration
    #[must_use]
    pub fn reconciler_options<K>(&self) -> ReconcilerOptions<K> {
        ReconcilerOptions::default()
            .with_poll_interval(self.poll_interval())
            .with_timeout(self.reconcile_timeout())
            .with_creation_grace_period(self.creation_grace_period())
            .with_management_policies(self.management_policies_enabled)
    }
}

/// Read environment variable or return default value
fn env_var_or_default<T: std::str::FromStr>(key: &str, default: T) -> T
where
    <T as std::str::FromStr>::Err: std::fmt::Debug,
{
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

/// Read environment variable as boolean or return default
fn env_var_or_default_bool(key: &str, default: bool) -> bool {
    std::env::var(key)
        .ok()
        .map(|v| {
            let v_lower = v.to_lowercase();
            v_lower == "true" || v_lower == "1" || v_lower == "yes" || v_lower == "on"
        })
        .unwrap_or(default)
}

/// Read environment variable as string or return default
fn env_var_or_default_str(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_uses_constants() {
        let config = ControllerConfig::default();
        assert_eq!(config.poll_interval(), Duration::from_secs(60));
        assert_eq!(config.creation_grace_period(), Duration::from_secs(30));
        assert!(!config.management_policies_enabled);
        assert_eq!(config.backoff_max_duration(), Duration::from_secs(60));
    }

    #[test]
    fn test_env_var_or_default_falls_back_on_garbage() {
        std::env::set_var("MRC_TEST_GARBAGE_U64", "not-a-number");
        assert_eq!(env_var_or_default("MRC_TEST_GARBAGE_U64", 7_u64), 7);
        std::env::remove_var("MRC_TEST_GARBAGE_U64");
    }

    #[test]
    fn test_env_var_or_default_bool_accepts_common_spellings() {
        for value in ["true", "1", "YES", "On"] {
            std::env::set_var("MRC_TEST_BOOL", value);
            assert!(env_var_or_default_bool("MRC_TEST_BOOL", false), "{value}");
        }
        std::env::set_var("MRC_TEST_BOOL", "nope");
        assert!(!env_var_or_default_bool("MRC_TEST_BOOL", true));
        std::env::remove_var("MRC_TEST_BOOL");
    }
}
