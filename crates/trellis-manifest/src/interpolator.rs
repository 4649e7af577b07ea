//! Interpolator
//!
//! Rendering happens in two phases. An [`OpsBuilder`] accumulates ops
//! documents; [`OpsBuilder::finish`] freezes them into [`CompiledOps`], an
//! immutable value that renders any number of manifests against any variable
//! source without further state. [`YamlInterpolator`] packs both phases
//! behind the two-call [`Interpolator`] interface.

use crate::error::{RenderError, RenderResult};
use crate::patch::{self, OpsPatch, OpsPatches, PreRenderOps};
use crate::variables::{self, VariableError, VariableSource};
use serde_yaml::Value;
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::{debug, trace};

/// The two-call interpolation interface
pub trait Interpolator: Send + Sync {
    /// Parse one ops document and queue its patches.
    fn build_ops(&mut self, ops: &[u8]) -> RenderResult<()>;

    /// Render `manifest` with every queued patch and variable applied.
    fn interpolate(&self, manifest: &[u8]) -> RenderResult<Vec<u8>>;
}

/// Accumulation phase
#[derive(Debug, Clone, Default)]
pub struct OpsBuilder {
    patches: OpsPatches,
    documents: usize,
}

impl OpsBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse one ops document and append its patches to the queue.
    ///
    /// A malformed document leaves the queue untouched.
    pub fn build_ops(&mut self, ops: &[u8]) -> RenderResult<()> {
        let parsed = parse_ops(ops)?;
        debug!(
            document = self.documents,
            patches = parsed.len(),
            "Queued ops document"
        );
        self.documents += 1;
        self.patches.extend(parsed);
        Ok(())
    }

    /// Append already parsed patches.
    pub fn extend(&mut self, patches: impl IntoIterator<Item = OpsPatch>) {
        self.documents += 1;
        self.patches.extend(patches);
    }

    pub fn len(&self) -> usize {
        self.patches.len()
    }

    pub fn is_empty(&self) -> bool {
        self.patches.is_empty()
    }

    pub fn finish(self) -> CompiledOps {
        CompiledOps {
            patches: self.patches.into(),
        }
    }
}

/// Parse an ops document. Empty or whitespace-only input holds no patches.
pub fn parse_ops(ops: &[u8]) -> RenderResult<OpsPatches> {
    if ops.iter().all(u8::is_ascii_whitespace) {
        return Ok(Vec::new());
    }
    let patches: Option<OpsPatches> =
        serde_yaml::from_slice(ops).map_err(|e| RenderError::parse("ops document", e))?;
    let patches = patches.unwrap_or_default();
    for (index, patch) in patches.iter().enumerate() {
        patch
            .validate()
            .map_err(|e| RenderError::parse("ops document", format!("patch #{index}: {e}")))?;
    }
    Ok(patches)
}

/// Rendering phase: an immutable, cheaply cloneable patch queue
#[derive(Debug, Clone, Default)]
pub struct CompiledOps {
    patches: Arc<[OpsPatch]>,
}

impl CompiledOps {
    pub fn patches(&self) -> &[OpsPatch] {
        &self.patches
    }

    /// Render a parsed document.
    pub fn render(&self, document: &Value, vars: &dyn VariableSource) -> RenderResult<Value> {
        render_document(document, &self.patches, vars)
    }

    /// Parse, render and serialize a manifest.
    pub fn interpolate(&self, manifest: &[u8], vars: &dyn VariableSource) -> RenderResult<Vec<u8>> {
        let document: Value =
            serde_yaml::from_slice(manifest).map_err(|e| RenderError::parse("manifest", e))?;
        let rendered = self.render(&document, vars)?;
        to_bytes(&rendered)
    }
}

/// Resolve placeholders in the document and in patch values, then apply the patches.
///
/// Names missing from the document and from patch values are reported together.
pub fn render_document(
    document: &Value,
    patches: &[OpsPatch],
    vars: &dyn VariableSource,
) -> RenderResult<Value> {
    let mut missing = BTreeSet::new();

    let mut resolved_patches = Vec::with_capacity(patches.len());
    for patch in patches {
        let value = match &patch.value {
            Some(value) => Some(resolve_collecting(value, vars, &mut missing)?),
            None => None,
        };
        resolved_patches.push(OpsPatch {
            kind: patch.kind,
            path: patch.path.clone(),
            value,
        });
    }
    let resolved = resolve_collecting(document, vars, &mut missing)?;

    if !missing.is_empty() {
        return Err(VariableError::Unresolved {
            names: missing.into_iter().collect(),
        }
        .into());
    }

    let rendered = patch::apply(&resolved, &resolved_patches)?;
    trace!(patches = patches.len(), "Rendered document");
    Ok(rendered)
}

fn resolve_collecting(
    value: &Value,
    vars: &dyn VariableSource,
    missing: &mut BTreeSet<String>,
) -> RenderResult<Value> {
    match variables::resolve(value, vars) {
        Ok(resolved) => Ok(resolved),
        Err(VariableError::Unresolved { names }) => {
            missing.extend(names);
            Ok(value.clone())
        }
        Err(e) => Err(e.into()),
    }
}

fn to_bytes(document: &Value) -> RenderResult<Vec<u8>> {
    serde_yaml::to_string(document)
        .map(String::into_bytes)
        .map_err(|e| RenderError::Serialize(e.to_string()))
}

impl PreRenderOps {
    /// Ops for the instance group declaration, compiled.
    pub fn instance_group_ops(&self) -> CompiledOps {
        CompiledOps {
            patches: self.instance_group.clone().into(),
        }
    }

    /// Ops for process configuration documents, compiled.
    pub fn bpm_ops(&self) -> CompiledOps {
        CompiledOps {
            patches: self.bpm.clone().into(),
        }
    }
}

/// Builder and variable source in one object
#[derive(Debug, Clone)]
pub struct YamlInterpolator<V> {
    builder: OpsBuilder,
    vars: V,
}

impl<V: VariableSource> YamlInterpolator<V> {
    pub fn new(vars: V) -> Self {
        Self {
            builder: OpsBuilder::new(),
            vars,
        }
    }

    /// Freeze a copy of the queued ops.
    pub fn compile(&self) -> CompiledOps {
        self.builder.clone().finish()
    }
}

impl<V: VariableSource + Send + Sync> Interpolator for YamlInterpolator<V> {
    fn build_ops(&mut self, ops: &[u8]) -> RenderResult<()> {
        self.builder.build_ops(ops)
    }

    fn interpolate(&self, manifest: &[u8]) -> RenderResult<Vec<u8>> {
        let document: Value =
            serde_yaml::from_slice(manifest).map_err(|e| RenderError::parse("manifest", e))?;
        let rendered = render_document(&document, &self.builder.patches, &self.vars)?;
        to_bytes(&rendered)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::variables::NoVariables;
    use std::collections::BTreeMap;

    const MANIFEST: &str = r#"
name: cf
instance_groups:
- name: api
  instances: 1
  azs: [z1]
  jobs:
  - name: cloud_controller
    properties:
      domain: ((system_domain))
"#;

    const SCALE: &str = r#"
- type: replace
  path: /instance_groups/name=api/instances
  value: 3
"#;

    const ROUTER: &str = r#"
- type: add
  path: /instance_groups/-
  value:
    name: router
    instances: ((router_instances))
"#;

    fn vars() -> BTreeMap<String, Value> {
        let mut vars = BTreeMap::new();
        vars.insert("system_domain".into(), Value::from("sys.example.com"));
        vars.insert("router_instances".into(), Value::from(2));
        vars
    }

    fn rendered(bytes: &[u8]) -> Value {
        serde_yaml::from_slice(bytes).unwrap()
    }

    #[test]
    fn test_render_applies_ops_in_document_order() {
        let mut builder = OpsBuilder::new();
        builder.build_ops(SCALE.as_bytes()).unwrap();
        builder.build_ops(ROUTER.as_bytes()).unwrap();
        let ops = builder.finish();

        let out = rendered(&ops.interpolate(MANIFEST.as_bytes(), &vars()).unwrap());
        assert_eq!(out["instance_groups"][0]["instances"], Value::from(3));
        assert_eq!(out["instance_groups"][1]["name"], Value::from("router"));
        assert_eq!(out["instance_groups"][1]["instances"], Value::from(2));
        assert_eq!(
            out["instance_groups"][0]["jobs"][0]["properties"]["domain"],
            Value::from("sys.example.com")
        );
    }

    #[test]
    fn test_interpolate_is_idempotent() {
        let mut builder = OpsBuilder::new();
        builder.build_ops(SCALE.as_bytes()).unwrap();
        let ops = builder.finish();

        let first = ops.interpolate(MANIFEST.as_bytes(), &vars()).unwrap();
        let second = ops.interpolate(MANIFEST.as_bytes(), &vars()).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_malformed_ops_leave_queue_untouched() {
        let mut builder = OpsBuilder::new();
        builder.build_ops(SCALE.as_bytes()).unwrap();

        let err = builder.build_ops(b"- { type: explode, path: /a }").unwrap_err();
        assert!(matches!(err, RenderError::Parse { what: "ops document", .. }));

        let err = builder.build_ops(b"- { type: add, path: relative, value: 1 }").unwrap_err();
        assert!(matches!(err, RenderError::Parse { .. }));

        let err = builder.build_ops(b"- { type: replace, path: /a }").unwrap_err();
        assert!(matches!(err, RenderError::Parse { .. }));

        assert_eq!(builder.len(), 1);
    }

    #[test]
    fn test_empty_ops_document() {
        let mut builder = OpsBuilder::new();
        builder.build_ops(b"").unwrap();
        builder.build_ops(b"  \n").unwrap();
        builder.build_ops(b"~").unwrap();
        assert!(builder.is_empty());
    }

    #[test]
    fn test_unresolved_variables_from_manifest_and_ops() {
        let mut builder = OpsBuilder::new();
        builder.build_ops(ROUTER.as_bytes()).unwrap();
        let ops = builder.finish();

        let err = ops.interpolate(MANIFEST.as_bytes(), &NoVariables).unwrap_err();
        assert_eq!(
            err,
            RenderError::Variables(VariableError::Unresolved {
                names: vec!["router_instances".into(), "system_domain".into()]
            })
        );
    }

    #[test]
    fn test_patch_failure_surfaces() {
        let mut builder = OpsBuilder::new();
        builder
            .build_ops(b"- { type: remove, path: /instance_groups/name=nats }")
            .unwrap();
        let err = builder
            .finish()
            .interpolate(MANIFEST.as_bytes(), &vars())
            .unwrap_err();
        assert!(matches!(err, RenderError::Patch(ref e) if e.index == 0));
    }

    #[test]
    fn test_malformed_manifest() {
        let err = OpsBuilder::new()
            .finish()
            .interpolate(b"name: [unclosed", &NoVariables)
            .unwrap_err();
        assert!(matches!(err, RenderError::Parse { what: "manifest", .. }));
    }

    #[test]
    fn test_compiled_ops_replay_against_different_documents() {
        let pre_render: PreRenderOps = serde_yaml::from_str(
            r#"
instanceGroup:
- { type: replace, path: /instances, value: 5 }
bpm:
- { type: add, path: /processes/-, value: { name: sidecar } }
"#,
        )
        .unwrap();

        let group: Value = serde_yaml::from_str("{ name: api, instances: 1 }").unwrap();
        let bpm: Value = serde_yaml::from_str("{ processes: [ { name: api } ] }").unwrap();

        let group_ops = pre_render.instance_group_ops();
        let bpm_ops = pre_render.bpm_ops();
        assert_eq!(
            group_ops.render(&group, &NoVariables).unwrap()["instances"],
            Value::from(5)
        );
        let out = bpm_ops.render(&bpm, &NoVariables).unwrap();
        assert_eq!(out["processes"][1]["name"], Value::from("sidecar"));

        // Never mixed: the bpm ops do not apply to the group document.
        assert!(bpm_ops.render(&group, &NoVariables).is_err());
    }

    #[test]
    fn test_yaml_interpolator_two_call_shape() {
        let mut interpolator = YamlInterpolator::new(vars());
        interpolator.build_ops(SCALE.as_bytes()).unwrap();
        let out = rendered(&interpolator.interpolate(MANIFEST.as_bytes()).unwrap());
        assert_eq!(out["instance_groups"][0]["instances"], Value::from(3));

        let compiled = interpolator.compile();
        assert_eq!(compiled.patches().len(), 1);
    }
}
