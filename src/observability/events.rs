//! # Events
//!
//! Kubernetes events emitted against managed resources.

use async_trait::async_trait;
use k8s_openapi::api::core::v1::ObjectReference;
use kube::runtime::events::{Event as KubeEvent, EventType, Recorder, Reporter};
use kube::Client;
use std::sync::{Mutex, PoisonError};
use tracing::warn;

/// Severity of an event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    Normal,
    Warning,
}

/// An event about a managed resource
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Event {
    pub kind: EventKind,
    /// Machine readable reason, e.g. `CannotObserveExternalResource`
    pub reason: String,
    pub message: String,
}

impl Event {
    #[must_use]
    pub fn normal(reason: &str, message: impl Into<String>) -> Self {
        Self {
            kind: EventKind::Normal,
            reason: reason.to_string(),
            message: message.into(),
        }
    }

    #[must_use]
    pub fn warning(reason: &str, err: impl std::fmt::Display) -> Self {
        Self {
            kind: EventKind::Warning,
            reason: reason.to_string(),
            message: err.to_string(),
        }
    }
}

/// Sink for events about managed resources
///
/// Recording is best effort: failures are logged and never fail a reconcile.
#[async_trait]
pub trait EventRecorder: Send + Sync {
    async fn record(&self, reference: &ObjectReference, event: Event);
}

/// Publishes events to the Kubernetes API
pub struct KubeEventRecorder {
    recorder: Recorder,
}

impl std::fmt::Debug for KubeEventRecorder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KubeEventRecorder").finish_non_exhaustive()
    }
}

impl KubeEventRecorder {
    #[must_use]
    pub fn new(client: Client, controller: &str, instance: Option<String>) -> Self {
        let reporter = Reporter {
            controller: controller.to_string(),
            instance,
        };
        Self {
            recorder: Recorder::new(client, reporter),
        }
    }
}

#[async_trait]
impl EventRecorder for KubeEventRecorder {
    async fn record(&self, reference: &ObjectReference, event: Event) {
        let kube_event = KubeEvent {
            type_: match event.kind {
                EventKind::Normal => EventType::Normal,
                EventKind::Warning => EventType::Warning,
            },
            reason: event.reason.clone(),
            note: Some(event.message.clone()),
            action: "Reconcile".to_string(),
            secondary: None,
        };
        if let Err(e) = self.recorder.publish(&kube_event, reference).await {
            warn!(
                reason = %event.reason,
                error = %e,
                "Failed to publish event"
            );
        }
    }
}

/// Drops every event
#[derive(Debug, Default, Clone, Copy)]
pub struct NopEventRecorder;

#[async_trait]
impl EventRecorder for NopEventRecorder {
    async fn record(&self, _reference: &ObjectReference, _event: Event) {}
}

/// Keeps events in memory so they can be inspected
#[derive(Debug, Default)]
pub struct MemoryEventRecorder {
    events: Mutex<Vec<Event>>,
}

impl MemoryEventRecorder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Events recorded so far, oldest first
    #[must_use]
    pub fn events(&self) -> Vec<Event> {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Reasons of the recorded events, oldest first
    #[must_use]
    pub fn reasons(&self) -> Vec<String> {
        self.events().into_iter().map(|e| e.reason).collect()
    }
}

#[async_trait]
impl EventRecorder for MemoryEventRecorder {
    async fn record(&self, _reference: &ObjectReference, event: Event) {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(event);
    }
}
