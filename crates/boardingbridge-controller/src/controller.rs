//! BridgeService controller implementation
//!
//! Each pass re-reads the BridgeService by key and drives it one step through
//! its lifecycle:
//!
//! - Active: register our finalizer, then make sure the managed Service exists
//!   with the right shape, publish its address, and mark the BridgeService Ready.
//! - Terminating: delete the managed Service (only if we own it), then remove
//!   our finalizer so the store can finish the deletion.
//!
//! The finalizer is always written before the Service is created, and always
//! removed after the Service is confirmed gone.

use std::sync::Arc;

use async_trait::async_trait;
use k8s_openapi::api::core::v1::{Service, ServiceStatus};
use kube::api::{
    Api, DeleteParams, Patch, PatchParams, PostParams, Preconditions, PropagationPolicy,
};
use kube::runtime::controller::Action;
use kube::runtime::events::EventType;
use kube::{Client, Resource, ResourceExt};
use tracing::{debug, error, info, instrument, warn};

#[cfg(test)]
use mockall::automock;

use boardingbridge_common::crd::{
    BridgeService, BridgeServicePhase, BridgeServiceStatus, Condition, ConditionStatus,
};
use boardingbridge_common::events::{actions, reasons, EventPublisher};
use boardingbridge_common::metrics::{record_service_write, ReconcileTimer, ServiceWrite};
use boardingbridge_common::retry::{RetryConfig, RetryTracker};
use boardingbridge_common::{Error, Finalizers, KubeEventPublisher, BRIDGE_FINALIZER};
#[cfg(test)]
use boardingbridge_common::NoopEventPublisher;

use crate::construct::{
    build_managed_service, corrected_service, is_owned_by, load_balancer_status, owner_description,
    plan_address, published_address, spec_drifted, AddressPlan,
};
use crate::lifecycle::{Lifecycle, ObjectKey};

/// Condition type reported on the BridgeService
pub const READY_CONDITION: &str = "Ready";

// =============================================================================
// Traits for dependency injection and testability
// =============================================================================

/// Result of creating the managed Service
#[derive(Clone, Debug, PartialEq)]
pub enum CreateOutcome {
    /// The Service was created; this is the stored copy
    Created(Box<Service>),
    /// A Service with that name already exists
    AlreadyExists,
}

/// Result of deleting the managed Service
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DeleteOutcome {
    /// The delete was accepted
    Deleted,
    /// Nothing to delete
    NotFound,
}

/// Store operations the reconciler needs
///
/// Reads return `Ok(None)` for a missing record. Writes that lose an
/// optimistic-concurrency race return [`Error::Conflict`].
#[cfg_attr(test, automock)]
#[async_trait]
pub trait BridgeKubeClient: Send + Sync {
    /// Get a BridgeService by name and namespace
    async fn get_bridge_service(
        &self,
        name: &str,
        namespace: &str,
    ) -> Result<Option<BridgeService>, Error>;

    /// Replace the finalizer list of a BridgeService.
    ///
    /// `resource_version` is the version the list was read at; the write fails
    /// with a conflict if the object changed since.
    async fn set_bridge_service_finalizers(
        &self,
        name: &str,
        namespace: &str,
        resource_version: Option<String>,
        finalizers: Vec<String>,
    ) -> Result<(), Error>;

    /// Patch the status of a BridgeService
    async fn patch_bridge_service_status(
        &self,
        name: &str,
        namespace: &str,
        status: &BridgeServiceStatus,
    ) -> Result<(), Error>;

    /// Get the Service with the given name and namespace
    async fn get_managed_service(
        &self,
        name: &str,
        namespace: &str,
    ) -> Result<Option<Service>, Error>;

    /// Create a Service, reporting a name collision instead of failing
    async fn create_managed_service(
        &self,
        namespace: &str,
        service: &Service,
    ) -> Result<CreateOutcome, Error>;

    /// Overwrite a stored Service with `service`, returning the stored copy.
    ///
    /// `service` carries the resourceVersion it was read at; the write fails
    /// with a conflict if the Service changed since.
    async fn replace_managed_service(
        &self,
        namespace: &str,
        service: &Service,
    ) -> Result<Service, Error>;

    /// Patch the status of a Service
    async fn patch_managed_service_status(
        &self,
        name: &str,
        namespace: &str,
        status: &ServiceStatus,
    ) -> Result<(), Error>;

    /// Delete a Service, only if it still has the given UID
    async fn delete_managed_service(
        &self,
        name: &str,
        namespace: &str,
        uid: Option<String>,
    ) -> Result<DeleteOutcome, Error>;
}

/// Real Kubernetes client implementation
pub struct BridgeKubeClientImpl {
    client: Client,
    field_manager: String,
}

impl BridgeKubeClientImpl {
    /// Create a new BridgeKubeClientImpl wrapping the given client
    pub fn new(client: Client, field_manager: impl Into<String>) -> Self {
        Self {
            client,
            field_manager: field_manager.into(),
        }
    }

    fn bridge_api(&self, namespace: &str) -> Api<BridgeService> {
        Api::namespaced(self.client.clone(), namespace)
    }

    fn service_api(&self, namespace: &str) -> Api<Service> {
        Api::namespaced(self.client.clone(), namespace)
    }

    fn post_params(&self) -> PostParams {
        PostParams {
            field_manager: Some(self.field_manager.clone()),
            ..Default::default()
        }
    }

    fn patch_params(&self) -> PatchParams {
        PatchParams {
            field_manager: Some(self.field_manager.clone()),
            ..Default::default()
        }
    }
}

#[async_trait]
impl BridgeKubeClient for BridgeKubeClientImpl {
    async fn get_bridge_service(
        &self,
        name: &str,
        namespace: &str,
    ) -> Result<Option<BridgeService>, Error> {
        Ok(self.bridge_api(namespace).get_opt(name).await?)
    }

    async fn set_bridge_service_finalizers(
        &self,
        name: &str,
        namespace: &str,
        resource_version: Option<String>,
        finalizers: Vec<String>,
    ) -> Result<(), Error> {
        // resourceVersion in a merge patch makes the API server reject stale writes
        let patch = serde_json::json!({
            "metadata": {
                "finalizers": finalizers,
                "resourceVersion": resource_version,
            }
        });
        self.bridge_api(namespace)
            .patch(name, &self.patch_params(), &Patch::Merge(&patch))
            .await
            .map_err(|e| Error::from(e).on_record("BridgeService", name))?;
        Ok(())
    }

    async fn patch_bridge_service_status(
        &self,
        name: &str,
        namespace: &str,
        status: &BridgeServiceStatus,
    ) -> Result<(), Error> {
        let patch = serde_json::json!({ "status": status });
        self.bridge_api(namespace)
            .patch_status(name, &self.patch_params(), &Patch::Merge(&patch))
            .await
            .map_err(|e| Error::from(e).on_record("BridgeService", name))?;
        Ok(())
    }

    async fn get_managed_service(
        &self,
        name: &str,
        namespace: &str,
    ) -> Result<Option<Service>, Error> {
        Ok(self.service_api(namespace).get_opt(name).await?)
    }

    async fn create_managed_service(
        &self,
        namespace: &str,
        service: &Service,
    ) -> Result<CreateOutcome, Error> {
        match self.service_api(namespace).create(&self.post_params(), service).await {
            Ok(created) => Ok(CreateOutcome::Created(Box::new(created))),
            Err(kube::Error::Api(ae)) if ae.code == 409 && ae.reason == "AlreadyExists" => {
                Ok(CreateOutcome::AlreadyExists)
            }
            Err(e) => Err(Error::from(e).on_record("Service", &service.name_any())),
        }
    }

    async fn replace_managed_service(
        &self,
        namespace: &str,
        service: &Service,
    ) -> Result<Service, Error> {
        let name = service.name_any();
        self.service_api(namespace)
            .replace(&name, &self.post_params(), service)
            .await
            .map_err(|e| Error::from(e).on_record("Service", &name))
    }

    async fn patch_managed_service_status(
        &self,
        name: &str,
        namespace: &str,
        status: &ServiceStatus,
    ) -> Result<(), Error> {
        let patch = serde_json::json!({ "status": status });
        self.service_api(namespace)
            .patch_status(name, &self.patch_params(), &Patch::Merge(&patch))
            .await
            .map_err(|e| Error::from(e).on_record("Service", name))?;
        Ok(())
    }

    async fn delete_managed_service(
        &self,
        name: &str,
        namespace: &str,
        uid: Option<String>,
    ) -> Result<DeleteOutcome, Error> {
        let params = DeleteParams {
            propagation_policy: Some(PropagationPolicy::Background),
            preconditions: uid.map(|uid| Preconditions {
                uid: Some(uid),
                resource_version: None,
            }),
            ..Default::default()
        };
        match self.service_api(namespace).delete(name, &params).await {
            Ok(_) => Ok(DeleteOutcome::Deleted),
            Err(kube::Error::Api(ae)) if ae.code == 404 => Ok(DeleteOutcome::NotFound),
            Err(e) => Err(Error::from(e).on_record("Service", name)),
        }
    }
}

// =============================================================================
// Controller context
// =============================================================================

/// Controller context containing shared state and clients
pub struct BridgeContext {
    /// Store access
    pub kube: Arc<dyn BridgeKubeClient>,
    /// Event publisher for emitting Kubernetes Events
    pub events: Arc<dyn EventPublisher>,
    /// Address to publish on every managed Service; falls back to its cluster IP
    pub ingress_address: Option<String>,
    /// Consecutive failure counts driving requeue backoff
    pub retries: RetryTracker,
}

impl BridgeContext {
    /// Create a new BridgeContext with the given dependencies
    pub fn new(
        kube: Arc<dyn BridgeKubeClient>,
        events: Arc<dyn EventPublisher>,
        ingress_address: Option<String>,
        retry: RetryConfig,
    ) -> Self {
        Self {
            kube,
            events,
            ingress_address,
            retries: RetryTracker::new(retry),
        }
    }

    /// Create a new BridgeContext backed by a Kubernetes client
    pub fn from_client(
        client: Client,
        field_manager: &str,
        ingress_address: Option<String>,
        retry: RetryConfig,
    ) -> Self {
        let events = Arc::new(KubeEventPublisher::new(client.clone(), field_manager));
        Self::new(
            Arc::new(BridgeKubeClientImpl::new(client, field_manager)),
            events,
            ingress_address,
            retry,
        )
    }

    /// Create a context for testing with mock clients
    #[cfg(test)]
    pub fn for_testing(kube: Arc<dyn BridgeKubeClient>) -> Self {
        Self::new(
            kube,
            Arc::new(NoopEventPublisher),
            None,
            RetryConfig::default(),
        )
    }
}

// =============================================================================
// Reconciliation
// =============================================================================

/// Reconcile a BridgeService delivered by the controller runtime.
///
/// The delivered object is only used for its key; the latest copy is re-read
/// from the store. A successful pass clears the key's backoff.
pub async fn reconcile(bridge: Arc<BridgeService>, ctx: Arc<BridgeContext>) -> Result<Action, Error> {
    let key = ObjectKey::for_resource(&bridge)?;
    let timer = ReconcileTimer::start(key.to_string());

    let result = reconcile_key(&key, &ctx).await;
    timer.finish(&result);
    if result.is_ok() {
        ctx.retries.reset(&key.to_string());
    }
    result
}

/// Run one reconcile pass for the BridgeService at `key`
#[instrument(skip_all, fields(bridge_service = %key))]
pub async fn reconcile_key(key: &ObjectKey, ctx: &BridgeContext) -> Result<Action, Error> {
    let Some(bridge) = ctx
        .kube
        .get_bridge_service(&key.name, &key.namespace)
        .await?
    else {
        debug!("BridgeService not found, nothing to do");
        return Ok(Action::await_change());
    };

    let lifecycle = Lifecycle::of(&bridge);
    debug!(?lifecycle, "reconciling BridgeService");

    match lifecycle {
        Lifecycle::Active {
            finalizer_registered,
        } => {
            if !finalizer_registered {
                register_finalizer(&bridge, key, ctx).await?;
            }
            reconcile_active(&bridge, key, ctx).await
        }
        Lifecycle::Terminating {
            finalizer_present: true,
        } => finalize(&bridge, key, ctx).await,
        Lifecycle::Terminating {
            finalizer_present: false,
        } => {
            debug!("BridgeService is terminating without our finalizer, nothing to do");
            Ok(Action::await_change())
        }
    }
}

/// Error policy for the BridgeService controller
///
/// Retryable errors requeue with per-key exponential backoff. Permanent
/// errors wait for the BridgeService to change.
pub fn error_policy(bridge: Arc<BridgeService>, error: &Error, ctx: Arc<BridgeContext>) -> Action {
    let key = ObjectKey::for_resource(&bridge)
        .map(|k| k.to_string())
        .unwrap_or_else(|_| bridge.name_any());

    if error.is_retryable() {
        let delay = ctx.retries.record_failure(&key);
        warn!(
            %error,
            bridge_service = %key,
            failures = ctx.retries.failures(&key),
            delay_secs = delay.as_secs(),
            "reconciliation failed, will retry"
        );
        Action::requeue(delay)
    } else {
        error!(
            %error,
            bridge_service = %key,
            "reconciliation failed permanently, waiting for a spec change"
        );
        Action::await_change()
    }
}

async fn register_finalizer(
    bridge: &BridgeService,
    key: &ObjectKey,
    ctx: &BridgeContext,
) -> Result<(), Error> {
    let mut finalizers = Finalizers::from_meta(&bridge.metadata);
    finalizers.insert(BRIDGE_FINALIZER);

    ctx.kube
        .set_bridge_service_finalizers(
            &key.name,
            &key.namespace,
            bridge.resource_version(),
            finalizers.into_vec(),
        )
        .await?;

    info!("registered finalizer");
    ctx.events
        .publish(
            &bridge.object_ref(&()),
            EventType::Normal,
            reasons::FINALIZER_REGISTERED,
            actions::RECONCILE,
            None,
        )
        .await;
    Ok(())
}

async fn reconcile_active(
    bridge: &BridgeService,
    key: &ObjectKey,
    ctx: &BridgeContext,
) -> Result<Action, Error> {
    let desired = match build_managed_service(bridge) {
        Ok(service) => service,
        Err(e) => {
            warn!(error = %e, "cannot construct managed Service");
            ctx.events
                .publish(
                    &bridge.object_ref(&()),
                    EventType::Warning,
                    reasons::CONSTRUCTION_FAILED,
                    actions::RECONCILE,
                    Some(e.to_string()),
                )
                .await;
            record_failure(bridge, key, ctx, &e).await;
            return Err(e);
        }
    };

    let stored = match ensure_managed_service(bridge, key, &desired, ctx).await {
        Ok(stored) => stored,
        Err(e) => {
            record_failure(bridge, key, ctx, &e).await;
            return Err(e);
        }
    };

    let address = match publish_address(&stored, key, ctx).await {
        Ok(address) => address,
        Err(e) => {
            record_failure(bridge, key, ctx, &e).await;
            return Err(e);
        }
    };

    update_status(bridge, key, ctx, active_status(bridge, key, address)).await?;
    Ok(Action::await_change())
}

/// Make sure a correctly shaped Service owned by `bridge` exists, returning the stored copy
async fn ensure_managed_service(
    bridge: &BridgeService,
    key: &ObjectKey,
    desired: &Service,
    ctx: &BridgeContext,
) -> Result<Service, Error> {
    if let Some(existing) = ctx
        .kube
        .get_managed_service(&key.name, &key.namespace)
        .await?
    {
        return converge_existing(bridge, key, existing, desired, ctx).await;
    }

    match ctx
        .kube
        .create_managed_service(&key.namespace, desired)
        .await?
    {
        CreateOutcome::Created(created) => {
            record_service_write(ServiceWrite::Create);
            info!(service = %key, "created managed Service");
            ctx.events
                .publish(
                    &bridge.object_ref(&()),
                    EventType::Normal,
                    reasons::SERVICE_CREATED,
                    actions::CREATE,
                    Some(format!("Created Service {}", key)),
                )
                .await;
            Ok(*created)
        }
        CreateOutcome::AlreadyExists => {
            debug!("managed Service appeared concurrently, re-reading");
            let existing = ctx
                .kube
                .get_managed_service(&key.name, &key.namespace)
                .await?
                .ok_or_else(|| {
                    Error::conflict(
                        "Service",
                        &key.name,
                        "Service was reported as existing but could not be read",
                    )
                })?;
            converge_existing(bridge, key, existing, desired, ctx).await
        }
    }
}

async fn converge_existing(
    bridge: &BridgeService,
    key: &ObjectKey,
    existing: Service,
    desired: &Service,
    ctx: &BridgeContext,
) -> Result<Service, Error> {
    if !is_owned_by(&existing, bridge) {
        let message = owner_description(&existing);
        warn!(service = %key, owner = %message, "managed Service name is taken");
        ctx.events
            .publish(
                &bridge.object_ref(&()),
                EventType::Warning,
                reasons::OWNERSHIP_CONFLICT,
                actions::RECONCILE,
                Some(format!("Service {} exists: {}", key, message)),
            )
            .await;
        return Err(Error::ownership(
            "Service",
            &key.namespace,
            &key.name,
            message,
        ));
    }

    if !spec_drifted(&existing, desired) {
        return Ok(existing);
    }

    info!(service = %key, "managed Service drifted, correcting");
    let updated = ctx
        .kube
        .replace_managed_service(&key.namespace, &corrected_service(&existing, desired))
        .await?;
    record_service_write(ServiceWrite::Replace);
    ctx.events
        .publish(
            &bridge.object_ref(&()),
            EventType::Normal,
            reasons::SERVICE_UPDATED,
            actions::RECONCILE,
            Some(format!("Corrected Service {}", key)),
        )
        .await;
    Ok(updated)
}

/// Publish the address on the managed Service, skipping the write if it's already there
async fn publish_address(
    stored: &Service,
    key: &ObjectKey,
    ctx: &BridgeContext,
) -> Result<Option<String>, Error> {
    let address = match plan_address(ctx.ingress_address.as_deref(), stored) {
        AddressPlan::Adopt(address) => {
            debug!(%address, "load balancer address already assigned");
            return Ok(Some(address));
        }
        AddressPlan::Pending => {
            debug!("managed Service has no address yet");
            return Ok(None);
        }
        AddressPlan::Publish(address) => address,
    };

    if published_address(stored).as_deref() == Some(address.as_str()) {
        return Ok(Some(address));
    }

    ctx.kube
        .patch_managed_service_status(&key.name, &key.namespace, &load_balancer_status(&address))
        .await?;
    record_service_write(ServiceWrite::Publish);
    info!(%address, "published managed Service address");
    Ok(Some(address))
}

async fn finalize(
    bridge: &BridgeService,
    key: &ObjectKey,
    ctx: &BridgeContext,
) -> Result<Action, Error> {
    match ctx
        .kube
        .get_managed_service(&key.name, &key.namespace)
        .await?
    {
        None => debug!("managed Service already gone"),
        Some(existing) if !is_owned_by(&existing, bridge) => {
            warn!(
                service = %key,
                owner = %owner_description(&existing),
                "Service is not ours, leaving it in place"
            );
        }
        Some(existing) => {
            let outcome = ctx
                .kube
                .delete_managed_service(&key.name, &key.namespace, existing.metadata.uid.clone())
                .await?;
            match outcome {
                DeleteOutcome::Deleted => {
                    record_service_write(ServiceWrite::Delete);
                    info!(service = %key, "deleted managed Service");
                    ctx.events
                        .publish(
                            &bridge.object_ref(&()),
                            EventType::Normal,
                            reasons::SERVICE_DELETED,
                            actions::DELETE,
                            Some(format!("Deleted Service {}", key)),
                        )
                        .await;
                }
                DeleteOutcome::NotFound => debug!("managed Service vanished before delete"),
            }
        }
    }

    let mut finalizers = Finalizers::from_meta(&bridge.metadata);
    finalizers.remove(BRIDGE_FINALIZER);
    ctx.kube
        .set_bridge_service_finalizers(
            &key.name,
            &key.namespace,
            bridge.resource_version(),
            finalizers.into_vec(),
        )
        .await?;

    info!("removed finalizer");
    Ok(Action::await_change())
}

// =============================================================================
// Status helpers
// =============================================================================

fn active_status(
    bridge: &BridgeService,
    key: &ObjectKey,
    address: Option<String>,
) -> BridgeServiceStatus {
    let (phase, condition) = match &address {
        Some(address) => (
            BridgeServicePhase::Ready,
            Condition::new(
                READY_CONDITION,
                ConditionStatus::True,
                "ServiceReady",
                format!("Service {} is reachable at {}", key, address),
            ),
        ),
        None => (
            BridgeServicePhase::Pending,
            Condition::new(
                READY_CONDITION,
                ConditionStatus::False,
                "AddressPending",
                format!("Service {} has no address yet", key),
            ),
        ),
    };
    let message = condition.message.clone();

    BridgeServiceStatus::with_phase(phase)
        .message(message)
        .managed_service(&key.name)
        .address(address)
        .observed_generation(bridge.metadata.generation)
        .condition(condition)
}

/// Record the most recent failure on the BridgeService status.
///
/// Best effort: a failed status write is logged and the original error wins.
/// Write conflicts are skipped since the immediate retry re-reads anyway.
async fn record_failure(bridge: &BridgeService, key: &ObjectKey, ctx: &BridgeContext, err: &Error) {
    if matches!(err, Error::Conflict { .. }) {
        return;
    }

    let status = BridgeServiceStatus::with_phase(BridgeServicePhase::Failed)
        .message(err.to_string())
        .managed_service(&key.name)
        .observed_generation(bridge.metadata.generation)
        .condition(Condition::new(
            READY_CONDITION,
            ConditionStatus::False,
            err.reason(),
            err.to_string(),
        ));

    if let Err(e) = update_status(bridge, key, ctx, status).await {
        warn!(error = %e, "failed to record failure on BridgeService status");
    }
}

/// Patch the BridgeService status unless nothing but timestamps changed
async fn update_status(
    bridge: &BridgeService,
    key: &ObjectKey,
    ctx: &BridgeContext,
    status: BridgeServiceStatus,
) -> Result<(), Error> {
    if bridge
        .status
        .as_ref()
        .is_some_and(|current| current.same_summary(&status))
    {
        debug!("status unchanged, skipping update");
        return Ok(());
    }

    ctx.kube
        .patch_bridge_service_status(&key.name, &key.namespace, &status)
        .await
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;
    use std::time::Duration;

    use super::*;
    use boardingbridge_common::crd::{BridgeServiceSpec, BridgeServiceType};
    use k8s_openapi::api::core::v1::{ServicePort, ServiceSpec};
    use k8s_openapi::apimachinery::pkg::apis::meta::v1::{OwnerReference, Time};
    use mockall::Sequence;

    // =========================================================================
    // Fixtures
    // =========================================================================

    fn sample_bridge(finalizers: &[&str]) -> BridgeService {
        let mut bridge = BridgeService::new("foo", BridgeServiceSpec::default());
        bridge.metadata.namespace = Some("ns".to_string());
        bridge.metadata.uid = Some("bridge-uid".to_string());
        bridge.metadata.resource_version = Some("7".to_string());
        bridge.metadata.generation = Some(1);
        bridge.metadata.finalizers = Some(finalizers.iter().map(|f| f.to_string()).collect());
        bridge
    }

    fn terminating_bridge(finalizers: &[&str]) -> BridgeService {
        let mut bridge = sample_bridge(finalizers);
        bridge.metadata.deletion_timestamp = Some(Time(chrono::Utc::now()));
        bridge
    }

    /// What the API server hands back after creating the desired Service
    fn stored_service(bridge: &BridgeService) -> Service {
        let mut svc = build_managed_service(bridge).unwrap();
        svc.metadata.uid = Some("svc-uid".to_string());
        svc.spec.as_mut().unwrap().cluster_ip = Some("10.96.0.10".to_string());
        svc
    }

    fn foreign_service() -> Service {
        Service {
            metadata: k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta {
                name: Some("foo".to_string()),
                namespace: Some("ns".to_string()),
                uid: Some("foreign-uid".to_string()),
                owner_references: Some(vec![OwnerReference {
                    api_version: "apps/v1".to_string(),
                    kind: "Deployment".to_string(),
                    name: "web".to_string(),
                    uid: "deploy-uid".to_string(),
                    controller: Some(true),
                    ..Default::default()
                }]),
                ..Default::default()
            },
            spec: Some(ServiceSpec::default()),
            status: None,
        }
    }

    fn key() -> ObjectKey {
        ObjectKey::new("ns", "foo")
    }

    fn ctx(mock: MockBridgeKubeClient) -> Arc<BridgeContext> {
        Arc::new(BridgeContext::for_testing(Arc::new(mock)))
    }

    fn api_error(code: u16, reason: &str) -> Error {
        Error::from(kube::Error::Api(kube::error::ErrorResponse {
            status: "Failure".to_string(),
            message: format!("{} error", reason),
            reason: reason.to_string(),
            code,
        }))
    }

    // =========================================================================
    // Active lifecycle stories
    // =========================================================================

    /// Story: a new BridgeService gets our finalizer before its Service exists
    #[tokio::test]
    async fn story_new_bridge_service_registers_finalizer_before_create() {
        let bridge = sample_bridge(&["other.io/keep"]);
        let created = stored_service(&bridge);
        let mut mock = MockBridgeKubeClient::new();
        let mut seq = Sequence::new();

        mock.expect_get_bridge_service()
            .times(1)
            .in_sequence(&mut seq)
            .returning(move |_, _| Ok(Some(bridge.clone())));
        mock.expect_set_bridge_service_finalizers()
            .withf(|name, ns, rv, finalizers| {
                name == "foo"
                    && ns == "ns"
                    && rv.as_deref() == Some("7")
                    && finalizers == &vec!["other.io/keep".to_string(), BRIDGE_FINALIZER.to_string()]
            })
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _, _, _| Ok(()));
        mock.expect_get_managed_service()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _| Ok(None));
        mock.expect_create_managed_service()
            .withf(|ns, svc| ns == "ns" && svc.metadata.name.as_deref() == Some("foo"))
            .times(1)
            .in_sequence(&mut seq)
            .returning(move |_, _| Ok(CreateOutcome::Created(Box::new(created.clone()))));
        mock.expect_patch_managed_service_status()
            .withf(|_, _, status| {
                published_address(&Service {
                    status: Some(status.clone()),
                    ..Default::default()
                })
                .as_deref()
                    == Some("10.96.0.10")
            })
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _, _| Ok(()));
        mock.expect_patch_bridge_service_status()
            .withf(|_, _, status| {
                status.phase == BridgeServicePhase::Ready
                    && status.address.as_deref() == Some("10.96.0.10")
                    && status.managed_service.as_deref() == Some("foo")
            })
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _, _| Ok(()));

        let action = reconcile_key(&key(), &ctx(mock)).await.unwrap();
        assert_eq!(action, Action::await_change());
    }

    /// Story: a fully reconciled BridgeService causes no writes at all
    #[tokio::test]
    async fn story_settled_bridge_service_is_idempotent() {
        let mut bridge = sample_bridge(&[BRIDGE_FINALIZER]);
        let mut stored = stored_service(&bridge);
        stored.status = Some(load_balancer_status("10.96.0.10"));
        bridge.status = Some(active_status(&bridge, &key(), Some("10.96.0.10".to_string())));

        let mut mock = MockBridgeKubeClient::new();
        mock.expect_get_bridge_service()
            .returning(move |_, _| Ok(Some(bridge.clone())));
        mock.expect_get_managed_service()
            .returning(move |_, _| Ok(Some(stored.clone())));
        mock.expect_set_bridge_service_finalizers().never();
        mock.expect_create_managed_service().never();
        mock.expect_replace_managed_service().never();
        mock.expect_patch_managed_service_status().never();
        mock.expect_patch_bridge_service_status().never();
        mock.expect_delete_managed_service().never();

        let ctx = ctx(mock);
        for _ in 0..3 {
            let action = reconcile_key(&key(), &ctx).await.unwrap();
            assert_eq!(action, Action::await_change());
        }
    }

    /// Story: the configured ingress address is published instead of the cluster IP
    #[tokio::test]
    async fn story_configured_ingress_address_is_published() {
        let bridge = sample_bridge(&[BRIDGE_FINALIZER]);
        let stored = stored_service(&bridge);

        let mut mock = MockBridgeKubeClient::new();
        mock.expect_get_bridge_service()
            .returning(move |_, _| Ok(Some(bridge.clone())));
        mock.expect_get_managed_service()
            .returning(move |_, _| Ok(Some(stored.clone())));
        mock.expect_patch_managed_service_status()
            .withf(|name, _, status| {
                let ingress = status
                    .load_balancer
                    .as_ref()
                    .and_then(|lb| lb.ingress.as_ref())
                    .unwrap();
                name == "foo" && ingress[0].ip.as_deref() == Some("1.2.3.4")
            })
            .times(1)
            .returning(|_, _, _| Ok(()));
        mock.expect_patch_bridge_service_status()
            .withf(|_, _, status| status.address.as_deref() == Some("1.2.3.4"))
            .times(1)
            .returning(|_, _, _| Ok(()));

        let mut ctx = BridgeContext::for_testing(Arc::new(mock));
        ctx.ingress_address = Some("1.2.3.4".to_string());
        reconcile_key(&key(), &ctx).await.unwrap();
    }

    /// Story: losing a create race to ourselves is treated as success
    #[tokio::test]
    async fn story_already_exists_is_reread_and_accepted() {
        let bridge = sample_bridge(&[BRIDGE_FINALIZER]);
        let stored = stored_service(&bridge);
        let mut mock = MockBridgeKubeClient::new();
        let mut seq = Sequence::new();

        mock.expect_get_bridge_service()
            .returning(move |_, _| Ok(Some(bridge.clone())));
        mock.expect_get_managed_service()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _| Ok(None));
        mock.expect_create_managed_service()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _| Ok(CreateOutcome::AlreadyExists));
        mock.expect_get_managed_service()
            .times(1)
            .in_sequence(&mut seq)
            .returning(move |_, _| Ok(Some(stored.clone())));
        mock.expect_patch_managed_service_status()
            .returning(|_, _, _| Ok(()));
        mock.expect_patch_bridge_service_status()
            .withf(|_, _, status| status.phase == BridgeServicePhase::Ready)
            .times(1)
            .returning(|_, _, _| Ok(()));

        let action = reconcile_key(&key(), &ctx(mock)).await.unwrap();
        assert_eq!(action, Action::await_change());
    }

    /// Story: a same-named Service owned by someone else is never adopted
    #[tokio::test]
    async fn story_foreign_service_is_an_ownership_conflict() {
        let bridge = sample_bridge(&[BRIDGE_FINALIZER]);
        let mut mock = MockBridgeKubeClient::new();

        mock.expect_get_bridge_service()
            .returning(move |_, _| Ok(Some(bridge.clone())));
        mock.expect_get_managed_service()
            .returning(|_, _| Ok(Some(foreign_service())));
        mock.expect_create_managed_service().never();
        mock.expect_replace_managed_service().never();
        mock.expect_patch_managed_service_status().never();
        mock.expect_patch_bridge_service_status()
            .withf(|_, _, status| {
                status.phase == BridgeServicePhase::Failed
                    && status.conditions[0].reason == "OwnershipConflict"
            })
            .times(1)
            .returning(|_, _, _| Ok(()));

        let err = reconcile_key(&key(), &ctx(mock)).await.unwrap_err();
        assert!(matches!(err, Error::Ownership { .. }));
        assert!(err.is_retryable());
    }

    /// Story: a drifted Service is overwritten from its stored copy, and the
    /// copy the store hands back is the one the rest of the pass uses
    #[tokio::test]
    async fn story_drifted_service_is_corrected() {
        let bridge = sample_bridge(&[BRIDGE_FINALIZER]);
        let mut drifted = stored_service(&bridge);
        drifted.metadata.resource_version = Some("41".to_string());
        let spec = drifted.spec.as_mut().unwrap();
        spec.selector = Some(BTreeMap::from([("app".to_string(), "stale".to_string())]));
        spec.ports.as_mut().unwrap().push(ServicePort {
            name: Some("debug".to_string()),
            port: 9999,
            ..Default::default()
        });

        let mut corrected = stored_service(&bridge);
        corrected.metadata.resource_version = Some("42".to_string());
        corrected.status = Some(load_balancer_status("10.96.0.10"));

        let mut mock = MockBridgeKubeClient::new();
        mock.expect_get_bridge_service()
            .returning(move |_, _| Ok(Some(bridge.clone())));
        mock.expect_get_managed_service()
            .returning(move |_, _| Ok(Some(drifted.clone())));
        mock.expect_replace_managed_service()
            .withf(|ns, svc| {
                let spec = svc.spec.as_ref().unwrap();
                ns == "ns"
                    && svc.metadata.resource_version.as_deref() == Some("41")
                    && spec.cluster_ip.as_deref() == Some("10.96.0.10")
                    && spec.selector.is_none()
                    && spec.ports.as_ref().unwrap().len() == 1
            })
            .times(1)
            .returning(move |_, _| Ok(corrected.clone()));
        mock.expect_create_managed_service().never();
        mock.expect_patch_managed_service_status().never();
        mock.expect_patch_bridge_service_status()
            .withf(|_, _, status| {
                status.phase == BridgeServicePhase::Ready
                    && status.address.as_deref() == Some("10.96.0.10")
            })
            .times(1)
            .returning(|_, _, _| Ok(()));

        reconcile_key(&key(), &ctx(mock)).await.unwrap();
    }

    /// Story: a lost race on the drift correction is retried, not reported
    #[tokio::test]
    async fn story_stale_drift_correction_is_a_conflict() {
        let bridge = sample_bridge(&[BRIDGE_FINALIZER]);
        let mut drifted = stored_service(&bridge);
        drifted.spec.as_mut().unwrap().type_ = Some("NodePort".to_string());

        let mut mock = MockBridgeKubeClient::new();
        mock.expect_get_bridge_service()
            .returning(move |_, _| Ok(Some(bridge.clone())));
        mock.expect_get_managed_service()
            .returning(move |_, _| Ok(Some(drifted.clone())));
        mock.expect_replace_managed_service()
            .times(1)
            .returning(|_, svc| Err(api_error(409, "Conflict").on_record("Service", &svc.name_any())));
        mock.expect_patch_managed_service_status().never();
        mock.expect_patch_bridge_service_status().never();

        let err = reconcile_key(&key(), &ctx(mock)).await.unwrap_err();
        assert!(matches!(err, Error::Conflict { .. }));
        assert!(err.is_retryable());
    }

    /// Story: an address assigned by the load balancer's controller is adopted, never overwritten
    #[tokio::test]
    async fn story_load_balancer_ingress_is_adopted() {
        let mut bridge = sample_bridge(&[BRIDGE_FINALIZER]);
        bridge.spec.type_ = BridgeServiceType::LoadBalancer;
        let mut stored = stored_service(&bridge);
        stored.status = Some(load_balancer_status("34.1.2.3"));

        let mut mock = MockBridgeKubeClient::new();
        mock.expect_get_bridge_service()
            .returning(move |_, _| Ok(Some(bridge.clone())));
        mock.expect_get_managed_service()
            .returning(move |_, _| Ok(Some(stored.clone())));
        mock.expect_create_managed_service().never();
        mock.expect_replace_managed_service().never();
        mock.expect_patch_managed_service_status().never();
        mock.expect_patch_bridge_service_status()
            .withf(|_, _, status| {
                status.phase == BridgeServicePhase::Ready
                    && status.address.as_deref() == Some("34.1.2.3")
            })
            .times(1)
            .returning(|_, _, _| Ok(()));

        reconcile_key(&key(), &ctx(mock)).await.unwrap();
    }

    /// Story: a LoadBalancer without an assigned address stays Pending instead
    /// of advertising its cluster IP
    #[tokio::test]
    async fn story_load_balancer_waits_for_its_address() {
        let mut bridge = sample_bridge(&[BRIDGE_FINALIZER]);
        bridge.spec.type_ = BridgeServiceType::LoadBalancer;
        let stored = stored_service(&bridge);

        let mut mock = MockBridgeKubeClient::new();
        mock.expect_get_bridge_service()
            .returning(move |_, _| Ok(Some(bridge.clone())));
        mock.expect_get_managed_service()
            .returning(move |_, _| Ok(Some(stored.clone())));
        mock.expect_patch_managed_service_status().never();
        mock.expect_patch_bridge_service_status()
            .withf(|_, _, status| {
                status.phase == BridgeServicePhase::Pending && status.address.is_none()
            })
            .times(1)
            .returning(|_, _, _| Ok(()));

        reconcile_key(&key(), &ctx(mock)).await.unwrap();
    }

    /// Story: an unbuildable spec fails permanently without touching Services
    #[tokio::test]
    async fn story_invalid_spec_fails_without_creating() {
        let mut bridge = sample_bridge(&[BRIDGE_FINALIZER]);
        bridge.spec.ports.clear();

        let mut mock = MockBridgeKubeClient::new();
        mock.expect_get_bridge_service()
            .returning(move |_, _| Ok(Some(bridge.clone())));
        mock.expect_get_managed_service().never();
        mock.expect_create_managed_service().never();
        mock.expect_patch_bridge_service_status()
            .withf(|_, _, status| {
                status.phase == BridgeServicePhase::Failed
                    && status.message.as_deref().unwrap_or_default().contains("spec.ports")
            })
            .times(1)
            .returning(|_, _, _| Ok(()));

        let ctx = ctx(mock);
        let err = reconcile_key(&key(), &ctx).await.unwrap_err();
        assert!(matches!(err, Error::Construction { .. }));

        let action = error_policy(Arc::new(sample_bridge(&[])), &err, ctx);
        assert_eq!(action, Action::await_change());
    }

    /// Story: the finalizer write happens even when construction later fails
    #[tokio::test]
    async fn story_finalizer_registered_before_construction_failure() {
        let mut bridge = sample_bridge(&[]);
        bridge.spec.ports.clear();

        let mut mock = MockBridgeKubeClient::new();
        mock.expect_get_bridge_service()
            .returning(move |_, _| Ok(Some(bridge.clone())));
        mock.expect_set_bridge_service_finalizers()
            .times(1)
            .returning(|_, _, _, _| Ok(()));
        mock.expect_create_managed_service().never();
        mock.expect_patch_bridge_service_status()
            .returning(|_, _, _| Ok(()));

        assert!(reconcile_key(&key(), &ctx(mock)).await.is_err());
    }

    /// Story: a lost finalizer race is retried with growing backoff
    #[tokio::test]
    async fn story_finalizer_conflict_backs_off() {
        let bridge = sample_bridge(&[]);
        let mut mock = MockBridgeKubeClient::new();
        mock.expect_get_bridge_service()
            .returning(move |_, _| Ok(Some(bridge.clone())));
        mock.expect_set_bridge_service_finalizers()
            .returning(|_, _, _, _| Err(api_error(409, "Conflict").on_record("BridgeService", "foo")));
        mock.expect_create_managed_service().never();
        mock.expect_patch_bridge_service_status().never();

        let ctx = ctx(mock);
        let delivered = Arc::new(sample_bridge(&[]));

        let err = reconcile(delivered.clone(), ctx.clone()).await.unwrap_err();
        assert!(matches!(err, Error::Conflict { .. }));
        assert_eq!(
            error_policy(delivered.clone(), &err, ctx.clone()),
            Action::requeue(Duration::from_secs(5))
        );
        assert_eq!(
            error_policy(delivered.clone(), &err, ctx.clone()),
            Action::requeue(Duration::from_secs(10))
        );
        assert_eq!(ctx.retries.failures("ns/foo"), 2);
    }

    /// Story: a success clears accumulated backoff
    #[tokio::test]
    async fn story_success_resets_backoff() {
        let mut mock = MockBridgeKubeClient::new();
        mock.expect_get_bridge_service().returning(|_, _| Ok(None));

        let ctx = ctx(mock);
        ctx.retries.record_failure("ns/foo");
        ctx.retries.record_failure("ns/foo");

        reconcile(Arc::new(sample_bridge(&[])), ctx.clone())
            .await
            .unwrap();
        assert_eq!(ctx.retries.failures("ns/foo"), 0);
    }

    /// Story: a failed read of the BridgeService is retried and writes nothing
    #[tokio::test]
    async fn story_store_read_failure_is_retried_without_writes() {
        let mut mock = MockBridgeKubeClient::new();
        mock.expect_get_bridge_service()
            .times(1)
            .returning(|_, _| Err(api_error(503, "ServiceUnavailable")));
        mock.expect_get_managed_service().never();
        mock.expect_set_bridge_service_finalizers().never();
        mock.expect_create_managed_service().never();
        mock.expect_patch_managed_service_status().never();
        mock.expect_patch_bridge_service_status().never();

        let ctx = ctx(mock);
        let delivered = Arc::new(sample_bridge(&[BRIDGE_FINALIZER]));
        let err = reconcile(delivered.clone(), ctx.clone()).await.unwrap_err();

        assert!(matches!(err, Error::Kube { .. }));
        assert!(err.is_retryable());
        assert_eq!(
            error_policy(delivered, &err, ctx),
            Action::requeue(Duration::from_secs(5))
        );
    }

    /// Story: when publishing the address fails, the next pass only retries the publish
    #[tokio::test]
    async fn story_status_publish_failure_retries_only_the_status() {
        let bridge = sample_bridge(&[BRIDGE_FINALIZER]);
        let created = stored_service(&bridge);
        let stored = created.clone();
        let mut mock = MockBridgeKubeClient::new();
        let mut seq = Sequence::new();

        mock.expect_get_bridge_service()
            .returning(move |_, _| Ok(Some(bridge.clone())));

        // first pass
        mock.expect_get_managed_service()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _| Ok(None));
        mock.expect_create_managed_service()
            .times(1)
            .in_sequence(&mut seq)
            .returning(move |_, _| Ok(CreateOutcome::Created(Box::new(created.clone()))));
        mock.expect_patch_managed_service_status()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _, _| Err(api_error(503, "ServiceUnavailable")));
        mock.expect_patch_bridge_service_status()
            .withf(|_, _, status| status.phase == BridgeServicePhase::Failed)
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _, _| Ok(()));

        // second pass
        mock.expect_get_managed_service()
            .times(1)
            .in_sequence(&mut seq)
            .returning(move |_, _| Ok(Some(stored.clone())));
        mock.expect_patch_managed_service_status()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _, _| Ok(()));
        mock.expect_patch_bridge_service_status()
            .withf(|_, _, status| status.phase == BridgeServicePhase::Ready)
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _, _| Ok(()));

        mock.expect_replace_managed_service().never();
        mock.expect_delete_managed_service().never();

        let ctx = ctx(mock);
        let err = reconcile_key(&key(), &ctx).await.unwrap_err();
        assert!(err.is_retryable());
        reconcile_key(&key(), &ctx).await.unwrap();
    }

    /// Story: if the failure can't be written to status, the original error still surfaces
    #[tokio::test]
    async fn story_unrecordable_failure_returns_original_error() {
        let bridge = sample_bridge(&[BRIDGE_FINALIZER]);
        let mut mock = MockBridgeKubeClient::new();

        mock.expect_get_bridge_service()
            .returning(move |_, _| Ok(Some(bridge.clone())));
        mock.expect_get_managed_service()
            .returning(|_, _| Ok(Some(foreign_service())));
        mock.expect_patch_bridge_service_status()
            .times(1)
            .returning(|_, _, _| Err(api_error(503, "ServiceUnavailable")));

        let err = reconcile_key(&key(), &ctx(mock)).await.unwrap_err();
        assert!(matches!(err, Error::Ownership { .. }), "{:?}", err);
    }

    /// Story: a BridgeService that no longer exists is a no-op
    #[tokio::test]
    async fn story_missing_bridge_service_is_a_noop() {
        let mut mock = MockBridgeKubeClient::new();
        mock.expect_get_bridge_service().returning(|_, _| Ok(None));
        mock.expect_get_managed_service().never();
        mock.expect_set_bridge_service_finalizers().never();

        let action = reconcile_key(&key(), &ctx(mock)).await.unwrap();
        assert_eq!(action, Action::await_change());
    }

    // =========================================================================
    // Terminating lifecycle stories
    // =========================================================================

    /// Story: deletion removes our Service before releasing the finalizer
    #[tokio::test]
    async fn story_deletion_removes_service_then_finalizer() {
        let bridge = terminating_bridge(&["other.io/a", BRIDGE_FINALIZER, "other.io/b"]);
        let stored = stored_service(&bridge);
        let mut mock = MockBridgeKubeClient::new();
        let mut seq = Sequence::new();

        mock.expect_get_bridge_service()
            .returning(move |_, _| Ok(Some(bridge.clone())));
        mock.expect_get_managed_service()
            .returning(move |_, _| Ok(Some(stored.clone())));
        mock.expect_delete_managed_service()
            .withf(|name, ns, uid| name == "foo" && ns == "ns" && uid.as_deref() == Some("svc-uid"))
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _, _| Ok(DeleteOutcome::Deleted));
        mock.expect_set_bridge_service_finalizers()
            .withf(|_, _, _, finalizers| {
                finalizers == &vec!["other.io/a".to_string(), "other.io/b".to_string()]
            })
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _, _, _| Ok(()));
        mock.expect_create_managed_service().never();

        let action = reconcile_key(&key(), &ctx(mock)).await.unwrap();
        assert_eq!(action, Action::await_change());
    }

    /// Story: a Service that is already gone still lets the finalizer go
    #[tokio::test]
    async fn story_deletion_with_service_already_gone() {
        let bridge = terminating_bridge(&[BRIDGE_FINALIZER]);
        let mut mock = MockBridgeKubeClient::new();

        mock.expect_get_bridge_service()
            .returning(move |_, _| Ok(Some(bridge.clone())));
        mock.expect_get_managed_service().returning(|_, _| Ok(None));
        mock.expect_delete_managed_service().never();
        mock.expect_set_bridge_service_finalizers()
            .withf(|_, _, _, finalizers| finalizers.is_empty())
            .times(1)
            .returning(|_, _, _, _| Ok(()));

        reconcile_key(&key(), &ctx(mock)).await.unwrap();
    }

    /// Story: a delete that races another deleter is still a success
    #[tokio::test]
    async fn story_delete_not_found_is_success() {
        let bridge = terminating_bridge(&[BRIDGE_FINALIZER]);
        let stored = stored_service(&bridge);
        let mut mock = MockBridgeKubeClient::new();

        mock.expect_get_bridge_service()
            .returning(move |_, _| Ok(Some(bridge.clone())));
        mock.expect_get_managed_service()
            .returning(move |_, _| Ok(Some(stored.clone())));
        mock.expect_delete_managed_service()
            .returning(|_, _, _| Ok(DeleteOutcome::NotFound));
        mock.expect_set_bridge_service_finalizers()
            .times(1)
            .returning(|_, _, _, _| Ok(()));

        reconcile_key(&key(), &ctx(mock)).await.unwrap();
    }

    /// Story: a failed delete keeps the finalizer so the Service is never orphaned
    #[tokio::test]
    async fn story_delete_failure_keeps_finalizer() {
        let bridge = terminating_bridge(&[BRIDGE_FINALIZER]);
        let stored = stored_service(&bridge);
        let mut mock = MockBridgeKubeClient::new();

        mock.expect_get_bridge_service()
            .returning(move |_, _| Ok(Some(bridge.clone())));
        mock.expect_get_managed_service()
            .returning(move |_, _| Ok(Some(stored.clone())));
        mock.expect_delete_managed_service()
            .returning(|_, _, _| Err(api_error(503, "ServiceUnavailable")));
        mock.expect_set_bridge_service_finalizers().never();

        let err = reconcile_key(&key(), &ctx(mock)).await.unwrap_err();
        assert!(err.is_retryable());
    }

    /// Story: teardown never deletes a Service it doesn't own
    #[tokio::test]
    async fn story_deletion_leaves_foreign_service() {
        let bridge = terminating_bridge(&[BRIDGE_FINALIZER]);
        let mut mock = MockBridgeKubeClient::new();

        mock.expect_get_bridge_service()
            .returning(move |_, _| Ok(Some(bridge.clone())));
        mock.expect_get_managed_service()
            .returning(|_, _| Ok(Some(foreign_service())));
        mock.expect_delete_managed_service().never();
        mock.expect_set_bridge_service_finalizers()
            .times(1)
            .returning(|_, _, _, _| Ok(()));

        reconcile_key(&key(), &ctx(mock)).await.unwrap();
    }

    /// Story: a terminating BridgeService without our finalizer is left alone
    #[tokio::test]
    async fn story_terminating_without_finalizer_is_a_noop() {
        let bridge = terminating_bridge(&["other.io/a"]);
        let mut mock = MockBridgeKubeClient::new();

        mock.expect_get_bridge_service()
            .returning(move |_, _| Ok(Some(bridge.clone())));
        mock.expect_get_managed_service().never();
        mock.expect_delete_managed_service().never();
        mock.expect_set_bridge_service_finalizers().never();
        mock.expect_create_managed_service().never();

        let action = reconcile_key(&key(), &ctx(mock)).await.unwrap();
        assert_eq!(action, Action::await_change());
    }

    // =========================================================================
    // Status helpers
    // =========================================================================

    #[test]
    fn pending_status_without_address() {
        let bridge = sample_bridge(&[]);
        let status = active_status(&bridge, &key(), None);
        assert_eq!(status.phase, BridgeServicePhase::Pending);
        assert_eq!(status.conditions[0].status, ConditionStatus::False);
        assert_eq!(status.observed_generation, Some(1));
    }

    #[tokio::test]
    async fn unchanged_status_is_not_written() {
        let mut bridge = sample_bridge(&[]);
        let status = active_status(&bridge, &key(), Some("1.2.3.4".to_string()));
        bridge.status = Some(status.clone());

        let mut mock = MockBridgeKubeClient::new();
        mock.expect_patch_bridge_service_status().never();

        let ctx = ctx(mock);
        update_status(&bridge, &key(), &ctx, status).await.unwrap();
    }
}
