//! # Nop Driver
//!
//! Driver for [`NopResource`]. External resources live in an in-process map
//! keyed by external name, so the whole create/observe/update/delete cycle can
//! run without any real external system. Everything is forgotten on restart.

use crate::controller::reconciler::{
    meta, ConnectionDetails, ExternalClient, ExternalConnecter, ExternalCreation,
    ExternalObservation, ExternalUpdate,
};
use crate::crd::{Condition, Managed, NopParameters, NopResource};
use anyhow::bail;
use async_trait::async_trait;
use kube::ResourceExt;
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::debug;

/// Description given to external resources created without one
pub const DEFAULT_DESCRIPTION: &str = "managed by managed-resource-controller";

/// State of one nop external resource
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NopExternal {
    pub description: String,
    pub connection_details: BTreeMap<String, String>,
    pub peer: Option<String>,
}

impl NopExternal {
    fn from_parameters(params: &NopParameters) -> Self {
        Self {
            description: params
                .description
                .clone()
                .unwrap_or_else(|| DEFAULT_DESCRIPTION.to_string()),
            connection_details: params.connection_details.clone(),
            peer: params.peer.clone(),
        }
    }

    fn connection_details(&self) -> ConnectionDetails {
        self.connection_details
            .iter()
            .map(|(k, v)| (k.clone(), v.as_bytes().to_vec()))
            .collect()
    }
}

type Externals = Arc<Mutex<BTreeMap<String, NopExternal>>>;

fn lock(externals: &Externals) -> MutexGuard<'_, BTreeMap<String, NopExternal>> {
    externals.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Connecter for the in-process nop external system
#[derive(Debug, Clone, Default)]
pub struct NopConnecter {
    externals: Externals,
}

impl NopConnecter {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Current state of an external resource
    #[must_use]
    pub fn external(&self, external_name: &str) -> Option<NopExternal> {
        lock(&self.externals).get(external_name).cloned()
    }
}

#[async_trait]
impl ExternalConnecter<NopResource> for NopConnecter {
    async fn connect(&self, obj: &NopResource) -> anyhow::Result<Box<dyn ExternalClient<NopResource>>> {
        debug!(
            provider_config = ?obj.spec.resource_spec.provider_config_ref.as_ref().map(|r| &r.name),
            "Connected to nop provider"
        );
        Ok(Box::new(NopClient {
            externals: Arc::clone(&self.externals),
        }))
    }
}

/// Client for the in-process nop external system
#[derive(Debug)]
pub struct NopClient {
    externals: Externals,
}

fn external_name(obj: &NopResource) -> anyhow::Result<String> {
    match meta::external_name(obj) {
        Some(name) if !name.is_empty() => Ok(name),
        _ => bail!("{} has no external name", obj.name_any()),
    }
}

#[async_trait]
impl ExternalClient<NopResource> for NopClient {
    async fn observe(&self, obj: &mut NopResource) -> anyhow::Result<ExternalObservation> {
        let name = external_name(obj)?;
        let Some(external) = lock(&self.externals).get(&name).cloned() else {
            return Ok(ExternalObservation::default());
        };

        let params = &mut obj.spec.for_provider;
        let late_initialized = params.description.is_none();
        if late_initialized {
            params.description = Some(external.description.clone());
        }
        let desired = NopExternal::from_parameters(params);
        let diff = if desired == external {
            String::new()
        } else {
            format!("desired {desired:?}, observed {external:?}")
        };

        let status = obj.status.get_or_insert_with(Default::default);
        status.at_provider.observed_at = Some(chrono::Utc::now().to_rfc3339());
        obj.set_conditions(&[Condition::available()]);

        Ok(ExternalObservation {
            resource_exists: true,
            resource_up_to_date: diff.is_empty(),
            resource_late_initialized: late_initialized,
            connection_details: external.connection_details(),
            diff,
        })
    }

    async fn create(&self, obj: &mut NopResource) -> anyhow::Result<ExternalCreation> {
        let name = external_name(obj)?;
        let external = NopExternal::from_parameters(&obj.spec.for_provider);
        let connection_details = external.connection_details();
        lock(&self.externals).insert(name, external);
        Ok(ExternalCreation { connection_details })
    }

    async fn update(&self, obj: &NopResource) -> anyhow::Result<ExternalUpdate> {
        let name = external_name(obj)?;
        let external = NopExternal::from_parameters(&obj.spec.for_provider);
        let connection_details = external.connection_details();
        let mut externals = lock(&self.externals);
        let Some(existing) = externals.get_mut(&name) else {
            bail!("nop external resource {name} does not exist");
        };
        *existing = external;
        Ok(ExternalUpdate { connection_details })
    }

    async fn delete(&self, obj: &NopResource) -> anyhow::Result<()> {
        let name = external_name(obj)?;
        lock(&self.externals).remove(&name);
        Ok(())
    }
}
