//! Common test utilities for reconciler integration tests
//!
//! Provides a scriptable external system and a harness that wires a
//! reconciler to in-memory stores.

#![allow(dead_code, reason = "not every test binary uses every helper")]

use async_trait::async_trait;
use managed_resource_controller::controller::reconciler::{
    ConnectionDetails, ExternalClient, ExternalConnecter, ExternalCreation, ExternalObservation,
    ExternalUpdate, Reconciler, ReconcilerOptions, RetryingCriticalAnnotationUpdater,
};
use managed_resource_controller::crd::{NopParameters, NopResource, NopResourceSpec, ResourceSpec};
use managed_resource_controller::observability::MemoryEventRecorder;
use managed_resource_controller::store::{MemoryStore, ObjectKey};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

pub const NAMESPACE: &str = "default";

/// Scripted behaviour and call log of a fake external system
#[derive(Debug)]
pub struct FakeState {
    pub exists: bool,
    pub up_to_date: bool,
    /// Description filled into the spec by observe when the spec leaves it unset
    pub late_init_description: Option<String>,
    pub connection_details: ConnectionDetails,
    pub connect_error: Option<String>,
    pub observe_error: Option<String>,
    pub create_error: Option<String>,
    pub update_error: Option<String>,
    pub delete_error: Option<String>,
    /// How long observe takes
    pub observe_delay: Option<Duration>,
    /// Delete removes the external resource at once
    pub delete_removes: bool,
    pub calls: Vec<&'static str>,
}

impl Default for FakeState {
    fn default() -> Self {
        Self {
            exists: false,
            up_to_date: true,
            late_init_description: None,
            connection_details: ConnectionDetails::new(),
            connect_error: None,
            observe_error: None,
            create_error: None,
            update_error: None,
            delete_error: None,
            observe_delay: None,
            delete_removes: true,
            calls: Vec::new(),
        }
    }
}

/// External system whose answers are scripted by the test
#[derive(Debug, Clone, Default)]
pub struct FakeExternal {
    state: Arc<Mutex<FakeState>>,
}

impl FakeExternal {
    pub fn new() -> Self {
        Self::default()
    }

    /// An external resource that already exists and is up to date
    pub fn existing() -> Self {
        let external = Self::new();
        external.state().exists = true;
        external
    }

    pub fn state(&self) -> MutexGuard<'_, FakeState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn calls(&self) -> Vec<&'static str> {
        self.state().calls.clone()
    }

    pub fn count(&self, operation: &str) -> usize {
        self.state().calls.iter().filter(|c| **c == operation).count()
    }

    fn record(&self, operation: &'static str) -> Option<String> {
        let mut state = self.state();
        state.calls.push(operation);
        match operation {
            "connect" => state.connect_error.clone(),
            "observe" => state.observe_error.clone(),
            "create" => state.create_error.clone(),
            "update" => state.update_error.clone(),
            "delete" => state.delete_error.clone(),
            _ => None,
        }
    }
}

#[async_trait]
impl ExternalConnecter<NopResource> for FakeExternal {
    async fn connect(
        &self,
        _obj: &NopResource,
    ) -> anyhow::Result<Box<dyn ExternalClient<NopResource>>> {
        if let Some(err) = self.record("connect") {
            anyhow::bail!(err);
        }
        Ok(Box::new(self.clone()))
    }
}

#[async_trait]
impl ExternalClient<NopResource> for FakeExternal {
    async fn observe(&self, obj: &mut NopResource) -> anyhow::Result<ExternalObservation> {
        if let Some(err) = self.record("observe") {
            anyhow::bail!(err);
        }
        let delay = self.state().observe_delay;
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let state = self.state();
        if !state.exists {
            return Ok(ExternalObservation::default());
        }
        let mut late_initialized = false;
        if let Some(description) = &state.late_init_description {
            if obj.spec.for_provider.description.is_none() {
                obj.spec.for_provider.description = Some(description.clone());
                late_initialized = true;
            }
        }
        Ok(ExternalObservation {
            resource_exists: true,
            resource_up_to_date: state.up_to_date,
            resource_late_initialized: late_initialized,
            connection_details: state.connection_details.clone(),
            diff: if state.up_to_date {
                String::new()
            } else {
                "description differs".to_string()
            },
        })
    }

    async fn create(&self, _obj: &mut NopResource) -> anyhow::Result<ExternalCreation> {
        if let Some(err) = self.record("create") {
            anyhow::bail!(err);
        }
        let mut state = self.state();
        state.exists = true;
        Ok(ExternalCreation {
            connection_details: state.connection_details.clone(),
        })
    }

    async fn update(&self, _obj: &NopResource) -> anyhow::Result<ExternalUpdate> {
        if let Some(err) = self.record("update") {
            anyhow::bail!(err);
        }
        let mut state = self.state();
        state.up_to_date = true;
        Ok(ExternalUpdate {
            connection_details: state.connection_details.clone(),
        })
    }

    async fn delete(&self, _obj: &NopResource) -> anyhow::Result<()> {
        if let Some(err) = self.record("delete") {
            anyhow::bail!(err);
        }
        let mut state = self.state();
        if state.delete_removes {
            state.exists = false;
        }
        Ok(())
    }

    async fn disconnect(&self) -> anyhow::Result<()> {
        self.record("disconnect");
        Ok(())
    }
}

/// A `NopResource` with an explicit description and nothing else set
pub fn nop_resource(name: &str) -> NopResource {
    let mut obj = NopResource::new(
        name,
        NopResourceSpec {
            resource_spec: ResourceSpec::default(),
            for_provider: NopParameters {
                description: Some("test".to_string()),
                ..Default::default()
            },
        },
    );
    obj.metadata.namespace = Some(NAMESPACE.to_string());
    obj
}

pub fn key(name: &str) -> ObjectKey {
    ObjectKey::new(Some(NAMESPACE), name)
}

/// Reconciler wired to in-memory collaborators
pub struct Harness {
    pub store: Arc<MemoryStore<NopResource>>,
    pub events: Arc<MemoryEventRecorder>,
    pub reconciler: Reconciler<NopResource>,
}

/// Build a harness around `connecter`, letting the caller adjust the reconciler
pub fn harness_with(
    connecter: Arc<dyn ExternalConnecter<NopResource>>,
    configure: impl FnOnce(Reconciler<NopResource>) -> Reconciler<NopResource>,
) -> Harness {
    let store = Arc::new(MemoryStore::new());
    let events = Arc::new(MemoryEventRecorder::new());
    let reconciler = Reconciler::new(Arc::clone(&store) as _, connecter)
        .with_event_recorder(Arc::clone(&events) as _)
        .with_critical_annotation_updater(Arc::new(
            RetryingCriticalAnnotationUpdater::new(Arc::clone(&store) as _)
                .with_retry(2, Duration::ZERO),
        ));
    Harness {
        store,
        events,
        reconciler: configure(reconciler),
    }
}

pub fn harness(external: &FakeExternal) -> Harness {
    harness_with(Arc::new(external.clone()), |r| r)
}

/// Harness whose reconciler uses `options`
pub fn harness_with_options(
    external: &FakeExternal,
    options: ReconcilerOptions<NopResource>,
) -> Harness {
    harness_with(Arc::new(external.clone()), |r| r.with_options(options))
}
