//! Cluster state store
//!
//! [`ClusterStore`] is the controller's only view of the cluster. Reads are
//! never cached by the controller; writes use optimistic concurrency on the
//! object's resource version.
//!
//! [`InMemoryClusterStore`] keeps every object in memory, publishes a
//! [`WatchEvent`] for each write and can be told to fail selected calls.

use crate::error::{StoreError, StoreResult};
use crate::filter::WatchEvent;
use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tokio::sync::{broadcast, RwLock};
use tracing::debug;
use trellis_types::labels::ANNOTATION_LAST_RECONCILE;
use trellis_types::{
    ClusterObject, ConfigMap, Deployment, DeploymentStatus, ObjectKey, ObjectKind, Secret, Service,
};

/// Read and write access to cluster objects
#[async_trait]
pub trait ClusterStore: Send + Sync {
    /// Get a deployment by key
    async fn get_deployment(&self, key: &ObjectKey) -> StoreResult<Option<Deployment>>;

    /// List the deployments of a namespace
    async fn list_deployments(&self, namespace: &str) -> StoreResult<Vec<Deployment>>;

    async fn get_config_map(&self, key: &ObjectKey) -> StoreResult<Option<ConfigMap>>;

    async fn get_secret(&self, key: &ObjectKey) -> StoreResult<Option<Secret>>;

    async fn get_service(&self, key: &ObjectKey) -> StoreResult<Option<Service>>;

    /// Replace the status of a deployment.
    ///
    /// Fails with [`StoreError::Conflict`] when the deployment's resource
    /// version is no longer `expected_resource_version`, and with
    /// [`StoreError::NotFound`] when it was deleted. When the status carries
    /// a last-reconcile time, the deployment's last-reconcile annotation is
    /// stamped with it as part of the same write.
    async fn update_deployment_status(
        &self,
        key: &ObjectKey,
        expected_resource_version: u64,
        status: DeploymentStatus,
    ) -> StoreResult<Deployment>;
}

/// Store calls that can be made to fail
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum FailurePoint {
    GetDeployment(ObjectKey),
    ListDeployments(String),
    GetConfigMap(ObjectKey),
    GetSecret(ObjectKey),
    GetService(ObjectKey),
    UpdateStatus(ObjectKey),
}

/// Channel capacity for watch events
const WATCH_CHANNEL_CAPACITY: usize = 1024;

type Objects = BTreeMap<(ObjectKind, ObjectKey), ClusterObject>;

/// In-memory cluster store for local runs and tests
#[derive(Debug)]
pub struct InMemoryClusterStore {
    objects: Arc<RwLock<Objects>>,
    failures: Arc<RwLock<HashMap<FailurePoint, u32>>>,
    watch_tx: broadcast::Sender<WatchEvent>,
}

impl Default for InMemoryClusterStore {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryClusterStore {
    pub fn new() -> Self {
        let (watch_tx, _) = broadcast::channel(WATCH_CHANNEL_CAPACITY);
        Self {
            objects: Arc::new(RwLock::new(BTreeMap::new())),
            failures: Arc::new(RwLock::new(HashMap::new())),
            watch_tx,
        }
    }

    /// Subscribe to watch events for every write
    pub fn watch(&self) -> broadcast::Receiver<WatchEvent> {
        self.watch_tx.subscribe()
    }

    /// Make the next `times` calls at `point` fail with [`StoreError::Unavailable`].
    pub async fn fail_next(&self, point: FailurePoint, times: u32) {
        self.failures.write().await.insert(point, times);
    }

    /// Create or replace an object, bumping its resource version.
    ///
    /// Replacing a deployment keeps its status and last-reconcile stamp;
    /// those only change through [`ClusterStore::update_deployment_status`].
    /// Returns the event that was published.
    pub async fn apply(&self, object: impl Into<ClusterObject>) -> WatchEvent {
        let mut object = object.into();
        let id = (object.kind(), object.meta().key());

        let mut objects = self.objects.write().await;
        let old = objects.get(&id).cloned();
        object.meta_mut().resource_version =
            old.as_ref().map_or(0, |o| o.meta().resource_version) + 1;
        if let (Some(ClusterObject::Deployment(old)), ClusterObject::Deployment(new)) =
            (&old, &mut object)
        {
            new.status = old.status.clone();
            match old.meta.annotation(ANNOTATION_LAST_RECONCILE) {
                Some(stamp) => {
                    new.meta
                        .annotations
                        .insert(ANNOTATION_LAST_RECONCILE.to_string(), stamp.to_string());
                }
                None => {
                    new.meta.annotations.remove(ANNOTATION_LAST_RECONCILE);
                }
            }
        }
        objects.insert(id, object.clone());
        drop(objects);

        let event = match old {
            Some(old) => WatchEvent::Update { old, new: object },
            None => WatchEvent::Create(object),
        };
        self.publish(event.clone());
        event
    }

    /// Remove an object. Returns whether it existed.
    pub async fn delete(&self, kind: ObjectKind, key: &ObjectKey) -> bool {
        let removed = self.objects.write().await.remove(&(kind, key.clone()));
        match removed {
            Some(object) => {
                self.publish(WatchEvent::Delete(object));
                true
            }
            None => false,
        }
    }

    /// Every stored object, ordered by kind and key
    pub async fn objects(&self) -> Vec<ClusterObject> {
        self.objects.read().await.values().cloned().collect()
    }

    fn publish(&self, event: WatchEvent) {
        debug!(
            event = event.name(),
            kind = %event.object().kind(),
            object = %event.object().meta().key(),
            "Watch event"
        );
        // No watchers is fine
        let _ = self.watch_tx.send(event);
    }

    async fn check(&self, point: FailurePoint) -> StoreResult<()> {
        let mut failures = self.failures.write().await;
        match failures.get_mut(&point) {
            Some(remaining) if *remaining > 0 => {
                *remaining -= 1;
                Err(StoreError::Unavailable(format!("injected failure at {point:?}")))
            }
            _ => Ok(()),
        }
    }

    async fn get(&self, kind: ObjectKind, key: &ObjectKey) -> Option<ClusterObject> {
        self.objects.read().await.get(&(kind, key.clone())).cloned()
    }
}

#[async_trait]
impl ClusterStore for InMemoryClusterStore {
    async fn get_deployment(&self, key: &ObjectKey) -> StoreResult<Option<Deployment>> {
        self.check(FailurePoint::GetDeployment(key.clone())).await?;
        Ok(match self.get(ObjectKind::Deployment, key).await {
            Some(ClusterObject::Deployment(d)) => Some(d),
            _ => None,
        })
    }

    async fn list_deployments(&self, namespace: &str) -> StoreResult<Vec<Deployment>> {
        self.check(FailurePoint::ListDeployments(namespace.to_string()))
            .await?;
        let objects = self.objects.read().await;
        Ok(objects
            .values()
            .filter_map(|o| match o {
                ClusterObject::Deployment(d) if d.meta.namespace == namespace => Some(d.clone()),
                _ => None,
            })
            .collect())
    }

    async fn get_config_map(&self, key: &ObjectKey) -> StoreResult<Option<ConfigMap>> {
        self.check(FailurePoint::GetConfigMap(key.clone())).await?;
        Ok(match self.get(ObjectKind::ConfigMap, key).await {
            Some(ClusterObject::ConfigMap(c)) => Some(c),
            _ => None,
        })
    }

    async fn get_secret(&self, key: &ObjectKey) -> StoreResult<Option<Secret>> {
        self.check(FailurePoint::GetSecret(key.clone())).await?;
        Ok(match self.get(ObjectKind::Secret, key).await {
            Some(ClusterObject::Secret(s)) => Some(s),
            _ => None,
        })
    }

    async fn get_service(&self, key: &ObjectKey) -> StoreResult<Option<Service>> {
        self.check(FailurePoint::GetService(key.clone())).await?;
        Ok(match self.get(ObjectKind::Service, key).await {
            Some(ClusterObject::Service(s)) => Some(s),
            _ => None,
        })
    }

    async fn update_deployment_status(
        &self,
        key: &ObjectKey,
        expected_resource_version: u64,
        status: DeploymentStatus,
    ) -> StoreResult<Deployment> {
        self.check(FailurePoint::UpdateStatus(key.clone())).await?;

        let id = (ObjectKind::Deployment, key.clone());
        let mut objects = self.objects.write().await;
        let Some(ClusterObject::Deployment(current)) = objects.get(&id).cloned() else {
            return Err(StoreError::NotFound {
                kind: ObjectKind::Deployment,
                key: key.clone(),
            });
        };
        if current.meta.resource_version != expected_resource_version {
            return Err(StoreError::Conflict {
                key: key.clone(),
                expected: expected_resource_version,
                found: current.meta.resource_version,
            });
        }

        let mut updated = current.clone();
        if let Some(at) = status.last_reconcile {
            updated.meta.stamp_last_reconcile(at);
        }
        updated.status = status;
        updated.meta.resource_version += 1;
        objects.insert(id, ClusterObject::Deployment(updated.clone()));
        drop(objects);

        self.publish(WatchEvent::Update {
            old: current.into(),
            new: updated.clone().into(),
        });
        Ok(updated)
    }
}
