//! # Managed Resource Spec Fields
//!
//! Fields every managed resource carries in its spec, flattened into the
//! resource-specific spec by each CRD.

use serde::{Deserialize, Serialize};

/// What happens to the external resource when the managed resource is deleted
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Deserialize, Serialize, schemars::JsonSchema,
)]
pub enum DeletionPolicy {
    /// The external resource is left in place and merely forgotten
    Orphan,
    /// The external resource is deleted along with the managed resource
    #[default]
    Delete,
}

/// One action the controller may take on the external resource
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Deserialize,
    Serialize,
    schemars::JsonSchema,
)]
pub enum ManagementAction {
    Observe,
    Create,
    Update,
    Delete,
    LateInitialize,
    /// Every action above
    #[serde(rename = "*")]
    All,
}

/// Reference to the provider configuration a driver uses to connect
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize, schemars::JsonSchema)]
pub struct ProviderConfigReference {
    pub name: String,
}

/// Location of the secret connection details are written to
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct SecretReference {
    /// Secret name
    pub name: String,
    /// Secret namespace, defaults to the namespace of the managed resource
    #[serde(default)]
    pub namespace: Option<String>,
}

/// Reference from one resource to another, resolved into a spec field
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Reference {
    /// API version of the referenced resource, e.g. `nop.controlplane.io/v1alpha1` or `v1`
    pub api_version: String,
    /// Kind of the referenced resource
    pub kind: String,
    /// Name of the referenced resource
    pub name: String,
    /// Namespace of the referenced resource, defaults to the referencing resource's namespace
    #[serde(default)]
    pub namespace: Option<String>,
}

/// Common managed resource spec fields
///
/// Flatten this into a CRD spec with `#[serde(flatten)]`.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ResourceSpec {
    /// Provider configuration used to connect to the external system
    #[serde(default)]
    pub provider_config_ref: Option<ProviderConfigReference>,
    /// Secret the connection details of the external resource are written to
    #[serde(default)]
    pub write_connection_secret_to_ref: Option<SecretReference>,
    /// What happens to the external resource when this resource is deleted
    #[serde(default)]
    pub deletion_policy: DeletionPolicy,
    /// Actions the controller may take on the external resource
    /// Leaving this unset means every action is allowed
    #[serde(default)]
    pub management_policies: Option<Vec<ManagementAction>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_management_action_all_serializes_as_star() {
        let json = serde_json::to_string(&vec![ManagementAction::All, ManagementAction::Observe])
            .unwrap();
        assert_eq!(json, r#"["*","Observe"]"#);
    }

    #[test]
    fn test_resource_spec_defaults_when_fields_missing() {
        let spec: ResourceSpec = serde_json::from_str("{}").unwrap();
        assert_eq!(spec.deletion_policy, DeletionPolicy::Delete);
        assert!(spec.management_policies.is_none());
        assert!(spec.write_connection_secret_to_ref.is_none());
    }

    #[test]
    fn test_resource_spec_reads_camel_case() {
        let spec: ResourceSpec = serde_json::from_str(
            r#"{"deletionPolicy":"Orphan","managementPolicies":["Observe"],
                "writeConnectionSecretToRef":{"name":"conn"}}"#,
        )
        .unwrap();
        assert_eq!(spec.deletion_policy, DeletionPolicy::Orphan);
        assert_eq!(spec.management_policies, Some(vec![ManagementAction::Observe]));
        assert_eq!(spec.write_connection_secret_to_ref.unwrap().name, "conn");
    }
}
