//! # Managed Resource Status
//!
//! Conditions and the status block every managed resource carries.

use serde::{Deserialize, Serialize};

/// Condition type reporting whether the external resource is ready for use
pub const TYPE_READY: &str = "Ready";
/// Condition type reporting the outcome of the most recent reconcile
pub const TYPE_SYNCED: &str = "Synced";

pub const REASON_AVAILABLE: &str = "Available";
pub const REASON_UNAVAILABLE: &str = "Unavailable";
pub const REASON_CREATING: &str = "Creating";
pub const REASON_DELETING: &str = "Deleting";
pub const REASON_RECONCILE_SUCCESS: &str = "ReconcileSuccess";
pub const REASON_RECONCILE_ERROR: &str = "ReconcileError";
pub const REASON_RECONCILE_PAUSED: &str = "ReconcilePaused";

/// Status condition
#[derive(Debug, Clone, Deserialize, Serialize, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Condition {
    /// Type of condition
    pub r#type: String,
    /// Status of the condition (True, False, Unknown)
    pub status: String,
    /// Last transition time
    #[serde(default)]
    pub last_transition_time: Option<String>,
    /// Reason for the condition
    #[serde(default)]
    pub reason: Option<String>,
    /// Message describing the condition
    #[serde(default)]
    pub message: Option<String>,
}

impl Condition {
    fn new(r#type: &str, status: bool, reason: &str) -> Self {
        Self {
            r#type: r#type.to_string(),
            status: if status { "True" } else { "False" }.to_string(),
            last_transition_time: Some(chrono::Utc::now().to_rfc3339()),
            reason: Some(reason.to_string()),
            message: None,
        }
    }

    /// Attach a human readable message
    #[must_use]
    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    /// The external resource is being created
    #[must_use]
    pub fn creating() -> Self {
        Self::new(TYPE_READY, false, REASON_CREATING)
    }

    /// The external resource is being deleted
    #[must_use]
    pub fn deleting() -> Self {
        Self::new(TYPE_READY, false, REASON_DELETING)
    }

    /// The external resource is ready for use
    #[must_use]
    pub fn available() -> Self {
        Self::new(TYPE_READY, true, REASON_AVAILABLE)
    }

    /// The external resource exists but is not ready for use
    #[must_use]
    pub fn unavailable() -> Self {
        Self::new(TYPE_READY, false, REASON_UNAVAILABLE)
    }

    /// The most recent reconcile succeeded
    #[must_use]
    pub fn reconcile_success() -> Self {
        Self::new(TYPE_SYNCED, true, REASON_RECONCILE_SUCCESS)
    }

    /// The most recent reconcile failed
    #[must_use]
    pub fn reconcile_error(err: impl std::fmt::Display) -> Self {
        Self::new(TYPE_SYNCED, false, REASON_RECONCILE_ERROR).with_message(err.to_string())
    }

    /// Reconciliation is paused
    #[must_use]
    pub fn reconcile_paused() -> Self {
        Self::new(TYPE_SYNCED, false, REASON_RECONCILE_PAUSED)
    }

    /// Whether two conditions are equal ignoring the transition time
    #[must_use]
    pub fn equal(&self, other: &Condition) -> bool {
        self.r#type == other.r#type
            && self.status == other.status
            && self.reason == other.reason
            && self.message == other.message
    }

    #[must_use]
    pub fn is_true(&self) -> bool {
        self.status == "True"
    }
}

/// Status block shared by every managed resource
///
/// Flatten this into a CRD status with `#[serde(flatten)]`.
#[derive(Debug, Clone, Default, Deserialize, Serialize, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ResourceStatus {
    /// Conditions represent the latest available observations
    #[serde(default)]
    pub conditions: Vec<Condition>,
    /// Generation of the spec the conditions were computed from
    #[serde(default)]
    pub observed_generation: Option<i64>,
}

impl ResourceStatus {
    /// Set conditions, replacing any existing condition of the same type
    ///
    /// A condition equal to the existing one (ignoring transition time) keeps
    /// the existing transition time.
    pub fn set_conditions(&mut self, conditions: &[Condition]) {
        for new in conditions {
            match self.conditions.iter_mut().find(|c| c.r#type == new.r#type) {
                Some(existing) if existing.equal(new) => {}
                Some(existing) => *existing = new.clone(),
                None => self.conditions.push(new.clone()),
            }
        }
    }

    /// Look up a condition by type
    #[must_use]
    pub fn condition(&self, r#type: &str) -> Option<&Condition> {
        self.conditions.iter().find(|c| c.r#type == r#type)
    }
}
