//! # Managed Resource Reconciliation
//!
//! One pass of driving an external resource toward the state its managed
//! resource declares:
//!
//! 1. Stop when paused, or when the management policies are invalid
//! 2. Release an orphaned resource without touching the external system
//! 3. Initialize, refuse to continue after an unrecorded create, resolve references
//! 4. Connect to the external system and observe the external resource
//! 5. Delete, create, late-initialize or update as observed state requires
//!
//! Most exits write the status: `Synced` always, `Ready` where the outcome
//! says something about the external resource. Nothing is written when the
//! resource is gone, when its finalizer was just removed, while a fresh
//! create is still invisible to observe, or after a write conflict, which is
//! absorbed into an immediate requeue.

use crate::constants::{
    ANNOTATION_EXTERNAL_CREATE_PENDING, FINALIZER_NAME, RECONCILE_GRACE_PERIOD_SECS,
};
use crate::controller::reconciler::connection::{
    ConnectionDetails, ConnectionPublisher, NopConnectionPublisher, PublisherChain,
};
use crate::controller::reconciler::critical::{
    CriticalAnnotationUpdater, RetryingCriticalAnnotationUpdater,
};
use crate::controller::reconciler::external::{ExternalClient, ExternalConnecter};
use crate::controller::reconciler::finalizer::{ApiFinalizer, Finalizer};
use crate::controller::reconciler::initializer::{
    Initializer, InitializerChain, NameAsExternalName,
};
use crate::controller::reconciler::meta;
use crate::controller::reconciler::policy::ManagementPoliciesResolver;
use crate::controller::reconciler::references::{NopReferenceResolver, ReferenceResolver};
use crate::controller::reconciler::types::{ReconcilerError, ReconcilerOptions, Requeue};
use crate::crd::{Condition, Managed};
use crate::observability::{metrics, Event, EventRecorder, NopEventRecorder};
use crate::store::{self, ObjectKey, ObjectStore};
use chrono::Utc;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info, info_span, warn, Instrument};

/// Event reasons recorded against managed resources
pub mod reason {
    pub const RECONCILIATION_PAUSED: &str = "ReconciliationPaused";
    pub const CANNOT_VALIDATE_POLICIES: &str = "CannotValidateManagementPolicies";
    pub const CANNOT_INITIALIZE: &str = "CannotInitializeManagedResource";
    pub const CANNOT_RESOLVE_REFERENCES: &str = "CannotResolveResourceReferences";
    pub const CANNOT_CONNECT: &str = "CannotConnectToProvider";
    pub const CANNOT_DISCONNECT: &str = "CannotDisconnectFromProvider";
    pub const CANNOT_OBSERVE: &str = "CannotObserveExternalResource";
    pub const CANNOT_CREATE: &str = "CannotCreateExternalResource";
    pub const CANNOT_UPDATE: &str = "CannotUpdateExternalResource";
    pub const CANNOT_DELETE: &str = "CannotDeleteExternalResource";
    pub const CANNOT_PUBLISH: &str = "CannotPublishConnectionDetails";
    pub const CANNOT_UNPUBLISH: &str = "CannotUnpublishConnectionDetails";
    pub const CANNOT_ADD_FINALIZER: &str = "CannotAddFinalizer";
    pub const CANNOT_REMOVE_FINALIZER: &str = "CannotRemoveFinalizer";
    pub const CANNOT_UPDATE_MANAGED: &str = "CannotUpdateManagedResource";
    pub const CREATED: &str = "CreatedExternalResource";
    pub const UPDATED: &str = "UpdatedExternalResource";
    pub const DELETED: &str = "DeletedExternalResource";
}

fn describe(err: &anyhow::Error) -> String {
    format!("{err:#}")
}

/// Whether the error is a write conflict; conflicts mean our copy of the
/// resource is stale, so the pass ends with an immediate requeue
fn absorb_conflict(err: &anyhow::Error) -> bool {
    if !store::is_conflict(err) {
        return false;
    }
    metrics::increment_conflicts();
    debug!(error = %describe(err), "Conflict writing managed resource, requeueing");
    true
}

/// Reconciles managed resources of kind `K`
pub struct Reconciler<K: Managed> {
    store: Arc<dyn ObjectStore<K>>,
    external: Arc<dyn ExternalConnecter<K>>,
    finalizer: Arc<dyn Finalizer<K>>,
    initializer: Arc<dyn Initializer<K>>,
    resolver: Arc<dyn ReferenceResolver<K>>,
    publisher: Arc<dyn ConnectionPublisher<K>>,
    critical: Arc<dyn CriticalAnnotationUpdater<K>>,
    recorder: Arc<dyn EventRecorder>,
    options: ReconcilerOptions<K>,
}

impl<K: Managed> std::fmt::Debug for Reconciler<K> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Reconciler")
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

impl<K: Managed> Reconciler<K> {
    /// Create a reconciler with default collaborators
    ///
    /// Defaults: the controller finalizer, the resource name as external name,
    /// no reference resolution, no connection publishing, retried critical
    /// annotation writes and no events.
    #[must_use]
    pub fn new(store: Arc<dyn ObjectStore<K>>, external: Arc<dyn ExternalConnecter<K>>) -> Self {
        let name_as_external_name: Arc<dyn Initializer<K>> =
            Arc::new(NameAsExternalName::new(Arc::clone(&store)));
        Self {
            finalizer: Arc::new(ApiFinalizer::new(Arc::clone(&store), FINALIZER_NAME)),
            initializer: Arc::new(InitializerChain::new(vec![name_as_external_name])),
            resolver: Arc::new(NopReferenceResolver),
            publisher: Arc::new(NopConnectionPublisher),
            critical: Arc::new(RetryingCriticalAnnotationUpdater::new(Arc::clone(&store))),
            recorder: Arc::new(NopEventRecorder),
            options: ReconcilerOptions::default(),
            store,
            external,
        }
    }

    #[must_use]
    pub fn with_finalizer(mut self, finalizer: Arc<dyn Finalizer<K>>) -> Self {
        self.finalizer = finalizer;
        self
    }

    /// Replace the initializers; they run in order
    #[must_use]
    pub fn with_initializers(mut self, initializers: Vec<Arc<dyn Initializer<K>>>) -> Self {
        self.initializer = Arc::new(InitializerChain::new(initializers));
        self
    }

    #[must_use]
    pub fn with_reference_resolver(mut self, resolver: Arc<dyn ReferenceResolver<K>>) -> Self {
        self.resolver = resolver;
        self
    }

    /// Replace the connection publishers; they run in order
    #[must_use]
    pub fn with_connection_publishers(
        mut self,
        publishers: Vec<Arc<dyn ConnectionPublisher<K>>>,
    ) -> Self {
        self.publisher = Arc::new(PublisherChain::new(publishers));
        self
    }

    #[must_use]
    pub fn with_critical_annotation_updater(
        mut self,
        critical: Arc<dyn CriticalAnnotationUpdater<K>>,
    ) -> Self {
        self.critical = critical;
        self
    }

    #[must_use]
    pub fn with_event_recorder(mut self, recorder: Arc<dyn EventRecorder>) -> Self {
        self.recorder = recorder;
        self
    }

    #[must_use]
    pub fn with_options(mut self, options: ReconcilerOptions<K>) -> Self {
        self.options = options;
        self
    }

    #[must_use]
    pub fn options(&self) -> &ReconcilerOptions<K> {
        &self.options
    }

    /// Reconcile the managed resource identified by `key`
    ///
    /// External calls share a deadline of `options.timeout`; the pass as a
    /// whole gets a short grace period on top so the final status write can
    /// still land after an external call timed out.
    ///
    /// # Errors
    ///
    /// Returns an error when the resource cannot be read, when its status
    /// cannot be written, or when the pass overruns its deadline. Write
    /// conflicts are never returned; they become [`Requeue::Immediate`].
    pub async fn reconcile(&self, key: &ObjectKey) -> Result<Requeue, ReconcilerError> {
        let start = std::time::Instant::now();
        metrics::increment_reconciliations();

        let deadline = Instant::now() + self.options.timeout;
        let grace = Duration::from_secs(RECONCILE_GRACE_PERIOD_SECS);
        let span = info_span!(
            "reconcile",
            resource = %key,
            external_name = tracing::field::Empty
        );
        let outcome = tokio::time::timeout_at(deadline + grace, self.reconcile_resource(key, deadline))
            .instrument(span)
            .await;
        metrics::observe_reconcile_duration(start.elapsed().as_secs_f64());

        let result = outcome.unwrap_or(Err(ReconcilerError::Timeout(self.options.timeout + grace)));
        match result {
            Ok(requeue) => {
                match requeue {
                    Requeue::Immediate => metrics::increment_requeues("immediate"),
                    Requeue::After(_) => metrics::increment_requeues("poll"),
                    Requeue::None => {}
                }
                Ok(requeue)
            }
            Err(e) if e.is_conflict() => {
                metrics::increment_conflicts();
                metrics::increment_requeues("immediate");
                debug!(resource = %key, error = %e, "Conflict writing managed resource, requeueing");
                Ok(Requeue::Immediate)
            }
            Err(e) => {
                metrics::increment_reconciliation_errors();
                Err(e)
            }
        }
    }

    async fn record(&self, managed: &K, event: Event) {
        self.recorder.record(&managed.object_ref(&()), event).await;
    }

    /// Set conditions and write the status, returning `requeue` on success
    async fn persist(
        &self,
        managed: &mut K,
        conditions: &[Condition],
        requeue: Requeue,
    ) -> Result<Requeue, ReconcilerError> {
        managed.set_conditions(conditions);
        let generation = managed.meta().generation;
        managed.resource_status_mut().observed_generation = generation;
        self.store
            .update_status(managed)
            .await
            .map_err(ReconcilerError::Status)?;
        Ok(requeue)
    }

    /// Run one external call against the pass deadline
    async fn call_external<T>(
        &self,
        operation: &'static str,
        deadline: Instant,
        call: impl Future<Output = anyhow::Result<T>> + Send,
    ) -> anyhow::Result<T> {
        let result = match tokio::time::timeout_at(deadline, call).await {
            Ok(result) => result,
            Err(_) => Err(anyhow::anyhow!(
                "{operation} did not finish within the reconcile timeout of {:?}",
                self.options.timeout
            )),
        };
        metrics::record_external_operation(operation, result.is_ok());
        result
    }

    async fn reconcile_resource(
        &self,
        key: &ObjectKey,
        deadline: Instant,
    ) -> Result<Requeue, ReconcilerError> {
        let mut managed = match self.store.get(key).await {
            Ok(managed) => managed,
            Err(e) if e.is_not_found() => {
                debug!("Managed resource no longer exists");
                return Ok(Requeue::None);
            }
            Err(e) => return Err(ReconcilerError::Get(e)),
        };

        let spec = managed.resource_spec();
        let policy = ManagementPoliciesResolver::new(
            self.options.management_policies_enabled,
            spec.management_policies.as_deref(),
            spec.deletion_policy,
        )
        .with_supported_policies(self.options.supported_management_policies.clone());

        if meta::is_paused(&managed) || policy.is_paused() {
            debug!("Reconciliation is paused");
            self.record(
                &managed,
                Event::normal(
                    reason::RECONCILIATION_PAUSED,
                    "Reconciliation is paused by the pause annotation or an empty management policy",
                ),
            )
            .await;
            return self
                .persist(&mut managed, &[Condition::reconcile_paused()], Requeue::None)
                .await;
        }

        if let Err(err) = policy.validate() {
            warn!(error = %err, "Invalid management policies");
            self.record(&managed, Event::warning(reason::CANNOT_VALIDATE_POLICIES, &err))
                .await;
            return self
                .persist(&mut managed, &[Condition::reconcile_error(&err)], Requeue::None)
                .await;
        }

        if meta::was_deleted(&managed) && !policy.should_delete() {
            return self.release_orphaned(&mut managed).await;
        }

        if let Err(err) = self.initializer.initialize(&mut managed).await {
            if absorb_conflict(&err) {
                return Ok(Requeue::Immediate);
            }
            self.record(&managed, Event::warning(reason::CANNOT_INITIALIZE, describe(&err)))
                .await;
            return self
                .persist(
                    &mut managed,
                    &[Condition::reconcile_error(describe(&err))],
                    Requeue::Immediate,
                )
                .await;
        }

        if let Some(external_name) = meta::external_name(&managed) {
            tracing::Span::current().record("external_name", external_name.as_str());
        }

        if meta::external_create_incomplete(&managed) {
            let message = format!(
                "cannot determine creation result; remove the {ANNOTATION_EXTERNAL_CREATE_PENDING} annotation if it is safe to proceed"
            );
            warn!("{message}");
            self.record(&managed, Event::warning(reason::CANNOT_INITIALIZE, &message))
                .await;
            return self
                .persist(
                    &mut managed,
                    &[Condition::creating(), Condition::reconcile_error(message)],
                    Requeue::None,
                )
                .await;
        }

        if !meta::was_deleted(&managed) {
            if let Err(err) = self.resolver.resolve_references(&mut managed).await {
                if absorb_conflict(&err) {
                    return Ok(Requeue::Immediate);
                }
                self.record(
                    &managed,
                    Event::warning(reason::CANNOT_RESOLVE_REFERENCES, describe(&err)),
                )
                .await;
                return self
                    .persist(
                        &mut managed,
                        &[Condition::reconcile_error(describe(&err))],
                        Requeue::Immediate,
                    )
                    .await;
            }
        }

        let client = match self
            .call_external("connect", deadline, self.external.connect(&managed))
            .await
        {
            Ok(client) => client,
            Err(err) => {
                if absorb_conflict(&err) {
                    return Ok(Requeue::Immediate);
                }
                let message = format!("connect failed: {}", describe(&err));
                self.record(&managed, Event::warning(reason::CANNOT_CONNECT, &message))
                    .await;
                return self
                    .persist(
                        &mut managed,
                        &[Condition::reconcile_error(message)],
                        Requeue::Immediate,
                    )
                    .await;
            }
        };

        let result = self
            .reconcile_external(&mut managed, client.as_ref(), &policy, deadline)
            .await;

        if let Err(err) = client.disconnect().await {
            debug!(error = %describe(&err), "Cannot disconnect from provider");
            self.record(&managed, Event::warning(reason::CANNOT_DISCONNECT, describe(&err)))
                .await;
        }
        result
    }

    /// Let go of a deleted resource whose external resource must be kept
    async fn release_orphaned(&self, managed: &mut K) -> Result<Requeue, ReconcilerError> {
        debug!("Managed resource deleted, orphaning its external resource");
        if let Err(err) = self
            .publisher
            .unpublish_connection(managed, &ConnectionDetails::new())
            .await
        {
            if absorb_conflict(&err) {
                return Ok(Requeue::Immediate);
            }
            self.record(managed, Event::warning(reason::CANNOT_UNPUBLISH, describe(&err)))
                .await;
            return self
                .persist(
                    managed,
                    &[Condition::deleting(), Condition::reconcile_error(describe(&err))],
                    Requeue::Immediate,
                )
                .await;
        }
        if let Err(err) = self.finalizer.remove_finalizer(managed).await {
            if absorb_conflict(&err) {
                return Ok(Requeue::Immediate);
            }
            self.record(
                managed,
                Event::warning(reason::CANNOT_REMOVE_FINALIZER, describe(&err)),
            )
            .await;
            return self
                .persist(
                    managed,
                    &[Condition::deleting(), Condition::reconcile_error(describe(&err))],
                    Requeue::Immediate,
                )
                .await;
        }
        info!("Released managed resource, external resource orphaned");
        Ok(Requeue::None)
    }

    async fn reconcile_external(
        &self,
        managed: &mut K,
        client: &dyn ExternalClient<K>,
        policy: &ManagementPoliciesResolver,
        deadline: Instant,
    ) -> Result<Requeue, ReconcilerError> {
        let before_observe = managed.clone();
        let observation = match self
            .call_external("observe", deadline, client.observe(managed))
            .await
        {
            Ok(observation) => {
                // Every later write sends the whole object, so a spec the
                // policies forbid late-initializing must be put back first
                if !policy.should_late_initialize() {
                    managed.copy_spec_from(&before_observe);
                }
                observation
            }
            Err(err) => {
                let message = format!("cannot observe external resource: {}", describe(&err));
                self.record(managed, Event::warning(reason::CANNOT_OBSERVE, &message))
                    .await;
                return self
                    .persist(
                        managed,
                        &[Condition::reconcile_error(message)],
                        Requeue::Immediate,
                    )
                    .await;
            }
        };

        if !observation.resource_exists && policy.should_only_observe() {
            let message = "external resource does not exist";
            self.record(managed, Event::warning(reason::CANNOT_OBSERVE, message))
                .await;
            return self
                .persist(
                    managed,
                    &[Condition::reconcile_error(message)],
                    Requeue::Immediate,
                )
                .await;
        }

        if !observation.resource_exists
            && meta::external_create_succeeded_during(managed, self.options.creation_grace_period)
        {
            debug!("External resource was created recently and cannot be observed yet");
            return Ok(Requeue::Immediate);
        }

        if meta::was_deleted(managed) {
            return self
                .delete_external(
                    managed,
                    client,
                    policy,
                    &observation.connection_details,
                    observation.resource_exists,
                    deadline,
                )
                .await;
        }

        if let Err(err) = self
            .publisher
            .publish_connection(managed, &observation.connection_details)
            .await
        {
            if absorb_conflict(&err) {
                return Ok(Requeue::Immediate);
            }
            self.record(managed, Event::warning(reason::CANNOT_PUBLISH, describe(&err)))
                .await;
            return self
                .persist(
                    managed,
                    &[Condition::reconcile_error(describe(&err))],
                    Requeue::Immediate,
                )
                .await;
        }

        if let Err(err) = self.finalizer.add_finalizer(managed).await {
            if absorb_conflict(&err) {
                return Ok(Requeue::Immediate);
            }
            self.record(
                managed,
                Event::warning(reason::CANNOT_ADD_FINALIZER, describe(&err)),
            )
            .await;
            return self
                .persist(
                    managed,
                    &[Condition::reconcile_error(describe(&err))],
                    Requeue::Immediate,
                )
                .await;
        }

        if !observation.resource_exists && policy.should_create() {
            return self.create_external(managed, client, deadline).await;
        }

        if observation.resource_late_initialized && policy.should_late_initialize() {
            // Writing spec replaces our copy with the stored one, dropping
            // status changes made during observe
            if let Err(err) = self.store.update(managed).await {
                let err = anyhow::Error::from(err).context("cannot update managed resource");
                if absorb_conflict(&err) {
                    return Ok(Requeue::Immediate);
                }
                self.record(
                    managed,
                    Event::warning(reason::CANNOT_UPDATE_MANAGED, describe(&err)),
                )
                .await;
                return self
                    .persist(
                        managed,
                        &[Condition::reconcile_error(describe(&err))],
                        Requeue::Immediate,
                    )
                    .await;
            }
        }

        let poll = Requeue::After(self.options.poll_interval_for(managed));

        if observation.resource_up_to_date {
            debug!("External resource is up to date");
            return self
                .persist(managed, &[Condition::reconcile_success()], poll)
                .await;
        }

        if !observation.diff.is_empty() {
            debug!(diff = %observation.diff, "External resource differs from desired state");
        }

        if !policy.should_update() {
            debug!("Skipping update, not allowed by management policies");
            return self
                .persist(managed, &[Condition::reconcile_success()], poll)
                .await;
        }

        let update = match self
            .call_external("update", deadline, client.update(managed))
            .await
        {
            Ok(update) => update,
            Err(err) => {
                let message = format!("cannot update external resource: {}", describe(&err));
                self.record(managed, Event::warning(reason::CANNOT_UPDATE, &message))
                    .await;
                return self
                    .persist(
                        managed,
                        &[Condition::reconcile_error(message)],
                        Requeue::Immediate,
                    )
                    .await;
            }
        };

        if let Err(err) = self
            .publisher
            .publish_connection(managed, &update.connection_details)
            .await
        {
            if absorb_conflict(&err) {
                return Ok(Requeue::Immediate);
            }
            self.record(managed, Event::warning(reason::CANNOT_PUBLISH, describe(&err)))
                .await;
            return self
                .persist(
                    managed,
                    &[Condition::reconcile_error(describe(&err))],
                    Requeue::Immediate,
                )
                .await;
        }

        info!("Updated external resource");
        self.record(
            managed,
            Event::normal(reason::UPDATED, "Successfully requested update of external resource"),
        )
        .await;
        self.persist(managed, &[Condition::reconcile_success()], poll)
            .await
    }

    async fn delete_external(
        &self,
        managed: &mut K,
        client: &dyn ExternalClient<K>,
        policy: &ManagementPoliciesResolver,
        details: &ConnectionDetails,
        exists: bool,
        deadline: Instant,
    ) -> Result<Requeue, ReconcilerError> {
        if exists && policy.should_delete() {
            if let Err(err) = self
                .call_external("delete", deadline, client.delete(managed))
                .await
            {
                let message = format!("cannot delete external resource: {}", describe(&err));
                self.record(managed, Event::warning(reason::CANNOT_DELETE, &message))
                    .await;
                return self
                    .persist(
                        managed,
                        &[Condition::deleting(), Condition::reconcile_error(message)],
                        Requeue::Immediate,
                    )
                    .await;
            }
            // The external resource is released once a later observe
            // confirms it is gone
            info!("Requested deletion of external resource");
            self.record(
                managed,
                Event::normal(reason::DELETED, "Successfully requested deletion of external resource"),
            )
            .await;
            return self
                .persist(
                    managed,
                    &[Condition::deleting(), Condition::reconcile_success()],
                    Requeue::Immediate,
                )
                .await;
        }

        if let Err(err) = self.publisher.unpublish_connection(managed, details).await {
            if absorb_conflict(&err) {
                return Ok(Requeue::Immediate);
            }
            self.record(managed, Event::warning(reason::CANNOT_UNPUBLISH, describe(&err)))
                .await;
            return self
                .persist(
                    managed,
                    &[Condition::deleting(), Condition::reconcile_error(describe(&err))],
                    Requeue::Immediate,
                )
                .await;
        }
        if let Err(err) = self.finalizer.remove_finalizer(managed).await {
            if absorb_conflict(&err) {
                return Ok(Requeue::Immediate);
            }
            self.record(
                managed,
                Event::warning(reason::CANNOT_REMOVE_FINALIZER, describe(&err)),
            )
            .await;
            return self
                .persist(
                    managed,
                    &[Condition::deleting(), Condition::reconcile_error(describe(&err))],
                    Requeue::Immediate,
                )
                .await;
        }
        info!("Deleted managed resource");
        Ok(Requeue::None)
    }

    /// Create the external resource, bracketing the call with annotations so
    /// an interrupted create is never repeated blindly
    async fn create_external(
        &self,
        managed: &mut K,
        client: &dyn ExternalClient<K>,
        deadline: Instant,
    ) -> Result<Requeue, ReconcilerError> {
        meta::set_external_create_pending(managed, Utc::now());
        if let Err(err) = self.store.update(managed).await {
            let err = anyhow::Error::from(err).context("cannot update managed resource");
            if absorb_conflict(&err) {
                return Ok(Requeue::Immediate);
            }
            self.record(
                managed,
                Event::warning(reason::CANNOT_UPDATE_MANAGED, describe(&err)),
            )
            .await;
            return self
                .persist(
                    managed,
                    &[Condition::creating(), Condition::reconcile_error(describe(&err))],
                    Requeue::Immediate,
                )
                .await;
        }

        let creation = match self
            .call_external("create", deadline, client.create(managed))
            .await
        {
            Ok(creation) => creation,
            Err(err) => {
                let message = format!("cannot create external resource: {}", describe(&err));
                warn!(error = %describe(&err), "Cannot create external resource");
                self.record(managed, Event::warning(reason::CANNOT_CREATE, &message))
                    .await;
                meta::set_external_create_failed(managed, Utc::now());
                if let Err(update_err) = self.critical.update_critical_annotations(managed).await {
                    let update_message = format!(
                        "cannot update managed resource annotations: {}",
                        describe(&update_err)
                    );
                    debug!(error = %update_message, "Cannot record failed creation");
                    self.record(
                        managed,
                        Event::warning(reason::CANNOT_UPDATE_MANAGED, &update_message),
                    )
                    .await;
                    return self
                        .persist(
                            managed,
                            &[Condition::creating(), Condition::reconcile_error(update_message)],
                            Requeue::Immediate,
                        )
                        .await;
                }
                return self
                    .persist(
                        managed,
                        &[Condition::creating(), Condition::reconcile_error(message)],
                        Requeue::Immediate,
                    )
                    .await;
            }
        };

        meta::set_external_create_succeeded(managed, Utc::now());
        if let Err(err) = self.critical.update_critical_annotations(managed).await {
            // The next pass sees an incomplete create and stops there
            warn!(error = %describe(&err), "Cannot record successful creation");
            self.record(
                managed,
                Event::warning(
                    reason::CANNOT_UPDATE_MANAGED,
                    format!("cannot update managed resource annotations: {}", describe(&err)),
                ),
            )
            .await;
        }

        if let Err(err) = self
            .publisher
            .publish_connection(managed, &creation.connection_details)
            .await
        {
            if absorb_conflict(&err) {
                return Ok(Requeue::Immediate);
            }
            self.record(managed, Event::warning(reason::CANNOT_PUBLISH, describe(&err)))
                .await;
            return self
                .persist(
                    managed,
                    &[Condition::creating(), Condition::reconcile_error(describe(&err))],
                    Requeue::Immediate,
                )
                .await;
        }

        info!("Created external resource");
        self.record(
            managed,
            Event::normal(reason::CREATED, "Successfully requested creation of external resource"),
        )
        .await;
        self.persist(
            managed,
            &[Condition::creating(), Condition::reconcile_success()],
            Requeue::Immediate,
        )
        .await
    }
}
