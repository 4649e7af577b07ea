//! Trellis Manifest - Manifest rendering and instance expansion
//!
//! Everything in this crate is synchronous and performs no I/O. Rendering a
//! deployment is a pure function of its manifest, its ops documents and its
//! variables.
//!
//! ## Pipeline
//!
//! 1. [`OpsBuilder`] collects ops documents and freezes them into [`CompiledOps`]
//! 2. [`CompiledOps::interpolate`] resolves `((variables))` and applies the patches
//! 3. [`expand`] turns each instance group into concrete [`JobInstance`]s
//!
//! ## Example
//!
//! ```
//! use trellis_manifest::{expand, Manifest, NoVariables, OpsBuilder};
//!
//! let mut builder = OpsBuilder::new();
//! builder
//!     .build_ops(b"- { type: replace, path: /instance_groups/name=api/instances, value: 2 }")
//!     .unwrap();
//!
//! let rendered = builder
//!     .finish()
//!     .interpolate(b"{ name: cf, instance_groups: [ { name: api, instances: 1 } ] }", &NoVariables)
//!     .unwrap();
//!
//! let manifest = Manifest::from_yaml(&rendered).unwrap();
//! let api = manifest.instance_groups.by_name("api").unwrap();
//! assert_eq!(expand(api, "cloud_controller", true).len(), 2);
//! ```

#![deny(unsafe_code)]
#![cfg_attr(feature = "strict-docs", warn(missing_docs))]
#![cfg_attr(not(feature = "strict-docs"), allow(missing_docs))]

pub mod error;
pub mod instance_group;
pub mod interpolator;
pub mod manifest;
pub mod names;
pub mod patch;
pub mod path;
pub mod variables;

pub use error::{RenderError, RenderResult};
pub use instance_group::{expand, JobInstance};
pub use interpolator::{parse_ops, render_document, CompiledOps, Interpolator, OpsBuilder, YamlInterpolator};
pub use manifest::{
    AgentSettings, InstanceGroup, InstanceGroups, Job, Lifecycle, Manifest, Port, ServicePort,
};
pub use patch::{apply, OpsPatch, OpsPatches, PatchError, PatchErrorKind, PatchKind, PreRenderOps};
pub use path::{OpsPath, PathError, PathToken};
pub use variables::{NoVariables, VariableError, VariableSource};
