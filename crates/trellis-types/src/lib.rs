//! Trellis Types - Cluster object model for the deployment controller
//!
//! Trellis renders declarative deployment manifests into concrete instance
//! layouts and re-renders them whenever one of their inputs changes in the
//! cluster. This crate holds the vocabulary shared by every other crate.
//!
//! ## Architectural Boundaries
//!
//! - **trellis-types** owns: object shapes, identifiers, metadata markers
//! - **trellis-manifest** owns: patching, interpolation, instance expansion
//! - **trellis-control** owns: event filtering, reference tracking, scheduling
//!
//! ## Key Concepts
//!
//! - **Deployment**: the top-level object; names a manifest, ops and variables
//! - **ConfigMap / Secret**: data-carrying inputs a deployment depends on
//! - **Service / Endpoints**: link-provider objects that re-trigger rendering
//! - **ObjectKey**: `namespace/name` identity used for reconcile requests
//! - **Markers**: labels and annotations that scope objects to deployments

#![deny(unsafe_code)]
#![cfg_attr(feature = "strict-docs", warn(missing_docs))]
#![cfg_attr(not(feature = "strict-docs"), allow(missing_docs))]

pub mod deployment;
pub mod events;
pub mod ids;
pub mod labels;
pub mod meta;
pub mod objects;

// Re-export main types
pub use deployment::{
    Deployment, DeploymentPhase, DeploymentSpec, DeploymentStatus, ReferenceKind,
    ResourceReference, VariableReference,
};
pub use events::{ControllerEvent, ControllerEventEnvelope, EventSeverity};
pub use ids::{InvalidObjectKey, ObjectKey};
pub use meta::ObjectMeta;
pub use objects::{ClusterObject, ConfigMap, EndpointAddress, Endpoints, ObjectKind, Secret, Service};
