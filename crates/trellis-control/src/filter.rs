//! Watch event filtering
//!
//! Decides whether a watch event is worth a reconcile. Creations pass when
//! the object carries the marker of the watch relationship; updates pass
//! when the part of the object the controller reads actually changed.
//! Deletions and generic events never pass.
//!
//! On top of that, objects stamped with a recent last-reconcile annotation
//! are cooling down ("meltdown") and are held back until the window has
//! passed.

use chrono::{DateTime, Utc};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::{trace, warn};
use trellis_types::labels::{ANNOTATION_LAST_RECONCILE, SECRET_TYPE_BPM};
use trellis_types::{
    ClusterObject, ConfigMap, Deployment, Endpoints, ObjectKind, ObjectMeta, Secret, Service,
};

/// Source of the current time
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Wall clock
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Clock that only moves when told to
#[derive(Debug, Clone)]
pub struct ManualClock {
    now: Arc<Mutex<DateTime<Utc>>>,
}

impl ManualClock {
    pub fn new(now: DateTime<Utc>) -> Self {
        Self {
            now: Arc::new(Mutex::new(now)),
        }
    }

    pub fn set(&self, now: DateTime<Utc>) {
        if let Ok(mut guard) = self.now.lock() {
            *guard = now;
        }
    }

    pub fn advance(&self, by: Duration) {
        if let Ok(mut guard) = self.now.lock() {
            *guard += chrono::Duration::from_std(by).unwrap_or(chrono::Duration::zero());
        }
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        match self.now.lock() {
            Ok(guard) => *guard,
            Err(poisoned) => *poisoned.into_inner(),
        }
    }
}

/// A change observed on a watched object
#[derive(Debug, Clone, PartialEq)]
pub enum WatchEvent {
    Create(ClusterObject),
    Update {
        old: ClusterObject,
        new: ClusterObject,
    },
    Delete(ClusterObject),
    Generic(ClusterObject),
}

impl WatchEvent {
    /// The current state of the object the event is about
    pub fn object(&self) -> &ClusterObject {
        match self {
            WatchEvent::Create(o) | WatchEvent::Delete(o) | WatchEvent::Generic(o) => o,
            WatchEvent::Update { new, .. } => new,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            WatchEvent::Create(_) => "create",
            WatchEvent::Update { .. } => "update",
            WatchEvent::Delete(_) => "delete",
            WatchEvent::Generic(_) => "generic",
        }
    }
}

/// Relationship between a watched kind and the deployments it triggers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Watch {
    /// Deployments themselves
    Deployments,
    /// ConfigMaps and Secrets read while rendering
    Inputs,
    /// Versioned secrets carrying rendered process information.
    ///
    /// Only their creation counts, and only before they were ever stamped.
    ProcessInfo,
    /// Services and endpoints of link providers
    LinkProviders,
}

impl Watch {
    /// Relationships an object kind is watched through.
    pub fn for_kind(kind: ObjectKind) -> &'static [Watch] {
        match kind {
            ObjectKind::Deployment => &[Watch::Deployments],
            ObjectKind::ConfigMap => &[Watch::Inputs],
            ObjectKind::Secret => &[Watch::Inputs, Watch::ProcessInfo],
            ObjectKind::Service | ObjectKind::Endpoints => &[Watch::LinkProviders],
        }
    }

    fn is_create_only(self) -> bool {
        self == Watch::ProcessInfo
    }
}

/// Versioned secret of the process-information type
fn is_process_info(secret: &Secret) -> bool {
    secret.is_versioned() && secret.secret_type() == Some(SECRET_TYPE_BPM)
}

/// Per-kind behaviour needed by the filter
pub trait Watched {
    fn meta(&self) -> &ObjectMeta;

    /// Whether this object is relevant to the given relationship.
    fn has_marker(&self, watch: Watch) -> bool;

    /// Structural equality of the part of the object the controller reads.
    fn payload_eq(&self, other: &Self) -> bool;
}

impl Watched for Deployment {
    fn meta(&self) -> &ObjectMeta {
        &self.meta
    }

    fn has_marker(&self, watch: Watch) -> bool {
        watch == Watch::Deployments
    }

    fn payload_eq(&self, other: &Self) -> bool {
        self.spec == other.spec
    }
}

impl Watched for ConfigMap {
    fn meta(&self) -> &ObjectMeta {
        &self.meta
    }

    fn has_marker(&self, watch: Watch) -> bool {
        watch == Watch::Inputs
    }

    fn payload_eq(&self, other: &Self) -> bool {
        self.data == other.data
    }
}

impl Watched for Secret {
    fn meta(&self) -> &ObjectMeta {
        &self.meta
    }

    fn has_marker(&self, watch: Watch) -> bool {
        match watch {
            Watch::Inputs => !is_process_info(self),
            Watch::ProcessInfo => is_process_info(self),
            _ => false,
        }
    }

    fn payload_eq(&self, other: &Self) -> bool {
        self.data == other.data
    }
}

impl Watched for Service {
    fn meta(&self) -> &ObjectMeta {
        &self.meta
    }

    fn has_marker(&self, watch: Watch) -> bool {
        watch == Watch::LinkProviders && self.is_link_provider()
    }

    fn payload_eq(&self, other: &Self) -> bool {
        self.selector == other.selector && self.is_link_provider() == other.is_link_provider()
    }
}

impl Watched for Endpoints {
    fn meta(&self) -> &ObjectMeta {
        &self.meta
    }

    // The backing service decides; the tracker resolves it.
    fn has_marker(&self, watch: Watch) -> bool {
        watch == Watch::LinkProviders
    }

    fn payload_eq(&self, other: &Self) -> bool {
        self.addresses == other.addresses
    }
}

impl Watched for ClusterObject {
    fn meta(&self) -> &ObjectMeta {
        ClusterObject::meta(self)
    }

    fn has_marker(&self, watch: Watch) -> bool {
        match self {
            ClusterObject::Deployment(o) => o.has_marker(watch),
            ClusterObject::ConfigMap(o) => o.has_marker(watch),
            ClusterObject::Secret(o) => o.has_marker(watch),
            ClusterObject::Service(o) => o.has_marker(watch),
            ClusterObject::Endpoints(o) => o.has_marker(watch),
        }
    }

    fn payload_eq(&self, other: &Self) -> bool {
        match (self, other) {
            (ClusterObject::Deployment(a), ClusterObject::Deployment(b)) => a.payload_eq(b),
            (ClusterObject::ConfigMap(a), ClusterObject::ConfigMap(b)) => a.payload_eq(b),
            (ClusterObject::Secret(a), ClusterObject::Secret(b)) => a.payload_eq(b),
            (ClusterObject::Service(a), ClusterObject::Service(b)) => a.payload_eq(b),
            (ClusterObject::Endpoints(a), ClusterObject::Endpoints(b)) => a.payload_eq(b),
            _ => false,
        }
    }
}

/// What to do with a watch event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    /// Map the event to reconcile requests now
    Process,
    /// Drop the event
    Ignore,
    /// Significant, but the object is cooling down for `remaining`
    CoolingDown { remaining: Duration },
}

/// Filter for one watch relationship
#[derive(Clone)]
pub struct EventFilter {
    watch: Watch,
    window: Duration,
    clock: Arc<dyn Clock>,
}

impl std::fmt::Debug for EventFilter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventFilter")
            .field("watch", &self.watch)
            .field("window", &self.window)
            .finish()
    }
}

impl EventFilter {
    pub fn new(watch: Watch, window: Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            watch,
            window,
            clock,
        }
    }

    pub fn watch(&self) -> Watch {
        self.watch
    }

    /// Whether the event should be mapped to reconcile requests right now.
    pub fn should_process(&self, event: &WatchEvent) -> bool {
        self.decide(event) == Decision::Process
    }

    pub fn decide(&self, event: &WatchEvent) -> Decision {
        let significant = match event {
            WatchEvent::Create(object) if self.watch.is_create_only() => {
                object.has_marker(self.watch)
                    && object.meta().annotation(ANNOTATION_LAST_RECONCILE).is_none()
            }
            WatchEvent::Create(object) => object.has_marker(self.watch),
            WatchEvent::Update { .. } if self.watch.is_create_only() => false,
            WatchEvent::Update { old, new } => {
                (new.has_marker(self.watch) || old.has_marker(self.watch))
                    && !old.payload_eq(new)
            }
            WatchEvent::Delete(_) | WatchEvent::Generic(_) => false,
        };

        let object = event.object();
        if !significant {
            trace!(
                watch = ?self.watch,
                event = event.name(),
                object = %object.meta().key(),
                "Event not significant"
            );
            return Decision::Ignore;
        }

        match self.cooldown_remaining(object.meta()) {
            Some(remaining) => Decision::CoolingDown { remaining },
            None => Decision::Process,
        }
    }

    /// Time left in the meltdown window of `meta`, if it is cooling down.
    pub fn cooldown_remaining(&self, meta: &ObjectMeta) -> Option<Duration> {
        let stamp = match meta.last_reconcile()? {
            Ok(stamp) => stamp,
            Err(e) => {
                warn!(object = %meta.key(), error = %e, "Ignoring unparseable last-reconcile stamp");
                return None;
            }
        };
        let window = chrono::Duration::from_std(self.window).ok()?;
        let elapsed = self.clock.now() - stamp;
        if elapsed >= window {
            return None;
        }
        // A stamp from the future counts as just stamped.
        let elapsed = elapsed.max(chrono::Duration::zero());
        (window - elapsed).to_std().ok()
    }
}
