//! # Trellis Control
//!
//! Keeps rendered deployments current as the cluster changes.
//!
//! ## Overview
//!
//! Watch events flow through four stages:
//!
//! 1. [`EventFilter`] drops events that cannot change a render and holds back
//!    objects that were reconciled within the cool-down window
//! 2. [`ReferenceTracker`] maps the changed object to the deployments using it
//! 3. [`ReconcileScheduler`] queues one request per deployment, runs them on a
//!    bounded worker pool and retries transient failures with backoff
//! 4. [`DeploymentReconciler`] renders the deployment and hands the result to
//!    a [`RenderSink`]
//!
//! [`DeploymentController`] wires the stages together. The cluster itself is
//! reached through the [`ClusterStore`] trait; [`InMemoryClusterStore`] backs
//! tests and local runs.
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use trellis_control::{
//!     BackoffConfig, ControllerConfig, DeploymentController, InMemoryClusterStore,
//!     MemoryRenderSink, SystemClock,
//! };
//!
//! # async fn example() {
//! let store = Arc::new(InMemoryClusterStore::new());
//! let controller = DeploymentController::new(
//!     ControllerConfig::default(),
//!     BackoffConfig::default(),
//!     store.clone(),
//!     Arc::new(MemoryRenderSink::new()),
//!     Arc::new(SystemClock),
//! );
//!
//! controller.start().await;
//! controller.run(store.watch()).await;
//! controller.shutdown().await;
//! # }
//! ```

#![deny(unsafe_code)]
#![cfg_attr(feature = "strict-docs", warn(missing_docs))]
#![cfg_attr(not(feature = "strict-docs"), allow(missing_docs))]

pub mod controller;
pub mod error;
pub mod events;
pub mod filter;
pub mod reconciler;
pub mod reference;
pub mod scheduler;
pub mod sink;
pub mod store;

pub use controller::{ControllerConfig, DeploymentController, CONTROLLER_NAME};
pub use error::{ReconcileError, ReconcileResult, SinkError, StoreError, StoreResult};
pub use events::EventBus;
pub use filter::{
    Clock, Decision, EventFilter, ManualClock, SystemClock, Watch, WatchEvent, Watched,
};
pub use reconciler::DeploymentReconciler;
pub use reference::ReferenceTracker;
pub use scheduler::{
    Admission, BackoffConfig, Outcome, ReconcileScheduler, Reconciler, SchedulerStats,
};
pub use sink::{MemoryRenderSink, RenderSink, RenderedDeployment, RenderedInstanceGroup, RenderedJob};
pub use store::{ClusterStore, FailurePoint, InMemoryClusterStore};
