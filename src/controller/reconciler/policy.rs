//! # Management Policies
//!
//! Decides which actions the reconciler may take on an external resource,
//! given the resource's `managementPolicies`, its `deletionPolicy` and whether
//! the management policies feature is enabled.

use crate::crd::{DeletionPolicy, ManagementAction};
use std::collections::BTreeSet;
use thiserror::Error;

/// A set of management actions
pub type PolicySet = BTreeSet<ManagementAction>;

/// Reasons a resource's management policies are rejected
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PolicyError {
    #[error(
        "spec.managementPolicies is set to a non-default value {0:?} but the management policies feature is not enabled"
    )]
    FeatureDisabled(Vec<ManagementAction>),
    #[error("spec.managementPolicies must be set when the management policies feature is enabled")]
    Undeclared,
    #[error("spec.managementPolicies must contain at least one action")]
    Empty,
    #[error("spec.managementPolicies is set to an unsupported combination {0:?}")]
    Unsupported(Vec<ManagementAction>),
}

fn set(actions: &[ManagementAction]) -> PolicySet {
    actions.iter().copied().collect()
}

/// Policy combinations accepted unless a reconciler is configured otherwise
#[must_use]
pub fn default_supported_management_policies() -> Vec<PolicySet> {
    use ManagementAction::{All, Create, Delete, LateInitialize, Observe, Update};
    vec![
        set(&[All]),
        set(&[Observe]),
        set(&[Observe, Update, LateInitialize]),
        set(&[Observe, Update]),
        set(&[Observe, LateInitialize]),
        set(&[Observe, Create, Update, LateInitialize]),
        set(&[Observe, Create, Update]),
        set(&[Observe, Create, LateInitialize]),
        set(&[Observe, Create]),
        set(&[Observe, Create, Update, Delete]),
        set(&[Observe, Create, Delete]),
        set(&[Observe, Update, Delete]),
        set(&[Observe, Delete]),
        set(&[Observe, LateInitialize, Delete]),
        set(&[Observe, Create, LateInitialize, Delete]),
        set(&[Observe, Update, LateInitialize, Delete]),
    ]
}

/// Answers what the reconciler may do to one resource's external resource
#[derive(Debug, Clone)]
pub struct ManagementPoliciesResolver {
    enabled: bool,
    policies: Option<PolicySet>,
    deletion_policy: DeletionPolicy,
    supported: Vec<PolicySet>,
}

impl ManagementPoliciesResolver {
    #[must_use]
    pub fn new(
        enabled: bool,
        policies: Option<&[ManagementAction]>,
        deletion_policy: DeletionPolicy,
    ) -> Self {
        Self {
            enabled,
            policies: policies.map(set),
            deletion_policy,
            supported: default_supported_management_policies(),
        }
    }

    /// Replace the accepted policy combinations
    #[must_use]
    pub fn with_supported_policies(mut self, supported: Vec<PolicySet>) -> Self {
        self.supported = supported;
        self
    }

    /// Unset or exactly `*`
    fn is_default(&self) -> bool {
        self.policies
            .as_ref()
            .is_none_or(|policies| *policies == set(&[ManagementAction::All]))
    }

    fn has_any(&self, actions: &[ManagementAction]) -> bool {
        self.policies
            .as_ref()
            .is_some_and(|policies| actions.iter().any(|a| policies.contains(a)))
    }

    fn sorted(policies: &PolicySet) -> Vec<ManagementAction> {
        policies.iter().copied().collect()
    }

    /// Check the declared policies are usable
    ///
    /// # Errors
    ///
    /// Returns the first rule the declared policies break.
    pub fn validate(&self) -> Result<(), PolicyError> {
        if !self.enabled {
            return match &self.policies {
                Some(policies) if !self.is_default() => {
                    Err(PolicyError::FeatureDisabled(Self::sorted(policies)))
                }
                _ => Ok(()),
            };
        }

        let Some(policies) = &self.policies else {
            return Err(PolicyError::Undeclared);
        };
        if policies.is_empty() {
            return Err(PolicyError::Empty);
        }
        if self.supported.iter().any(|s| s == policies) {
            Ok(())
        } else {
            Err(PolicyError::Unsupported(Self::sorted(policies)))
        }
    }

    /// An explicitly empty policy set pauses the resource while the feature is enabled
    #[must_use]
    pub fn is_paused(&self) -> bool {
        self.enabled && self.policies.as_ref().is_some_and(BTreeSet::is_empty)
    }

    /// Only observation is allowed
    #[must_use]
    pub fn should_only_observe(&self) -> bool {
        self.enabled && self.policies == Some(set(&[ManagementAction::Observe]))
    }

    #[must_use]
    pub fn should_create(&self) -> bool {
        !self.enabled || self.has_any(&[ManagementAction::Create, ManagementAction::All])
    }

    #[must_use]
    pub fn should_update(&self) -> bool {
        !self.enabled || self.has_any(&[ManagementAction::Update, ManagementAction::All])
    }

    #[must_use]
    pub fn should_late_initialize(&self) -> bool {
        !self.enabled || self.has_any(&[ManagementAction::LateInitialize, ManagementAction::All])
    }

    /// Whether the external resource is deleted with the managed resource
    ///
    /// With the feature enabled an explicit `Delete` action wins over an
    /// `Orphan` deletion policy; `*` defers to the deletion policy.
    #[must_use]
    pub fn should_delete(&self) -> bool {
        if !self.enabled {
            return self.deletion_policy != DeletionPolicy::Orphan;
        }
        if self.deletion_policy == DeletionPolicy::Delete
            && self.has_any(&[ManagementAction::Delete, ManagementAction::All])
        {
            return true;
        }
        self.policies != Some(set(&[ManagementAction::All]))
            && self.has_any(&[ManagementAction::Delete])
    }
}
