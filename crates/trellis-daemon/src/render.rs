//! Offline rendering
//!
//! Renders a manifest from local files, without a cluster. Optionally expands
//! one instance group into its job instances.

use crate::error::{read, read_yaml, DaemonError, DaemonResult};
use serde_yaml::Value;
use std::collections::BTreeMap;
use std::path::PathBuf;
use tracing::debug;
use trellis_control::RenderedInstanceGroup;
use trellis_manifest::{Interpolator, Manifest, YamlInterpolator};

/// Inputs of an offline render
#[derive(Debug, Clone, Default)]
pub struct RenderRequest {
    pub manifest: PathBuf,

    /// Ops files, applied in order
    pub ops: Vec<PathBuf>,

    /// YAML mapping of variable name to value
    pub vars: Option<PathBuf>,

    /// Expand this instance group instead of printing the manifest
    pub instance_group: Option<String>,

    /// Restrict expansion to one job
    pub job: Option<String>,

    pub initial_rollout: bool,
}

/// Render and return YAML output.
pub fn render(request: &RenderRequest) -> DaemonResult<String> {
    let vars: BTreeMap<String, Value> = match &request.vars {
        Some(path) => read_yaml(path)?,
        None => BTreeMap::new(),
    };

    let mut interpolator = YamlInterpolator::new(&vars);
    for path in &request.ops {
        interpolator.build_ops(&read(path)?)?;
    }
    let rendered = interpolator.interpolate(&read(&request.manifest)?)?;
    debug!(
        manifest = %request.manifest.display(),
        ops = request.ops.len(),
        vars = vars.len(),
        "Manifest rendered"
    );

    let Some(group_name) = &request.instance_group else {
        return String::from_utf8(rendered).map_err(|e| DaemonError::Serialize(e.to_string()));
    };

    let manifest = Manifest::from_yaml(&rendered)?;
    let group = manifest
        .instance_groups
        .by_name(group_name)
        .ok_or_else(|| DaemonError::UnknownInstanceGroup(group_name.clone()))?
        .apply_pre_render_ops(&vars)?;

    let mut expanded = RenderedInstanceGroup::from_group(&group, request.initial_rollout);
    if let Some(job) = &request.job {
        expanded.jobs.retain(|j| &j.name == job);
        if expanded.jobs.is_empty() {
            return Err(DaemonError::UnknownJob {
                group: group.name.clone(),
                job: job.clone(),
            });
        }
    }

    serde_yaml::to_string(&expanded).map_err(|e| DaemonError::Serialize(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::TempDir;

    fn write(dir: &TempDir, name: &str, contents: &str) -> PathBuf {
        let path = dir.path().join(name);
        let mut file = std::fs::File::create(&path).unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        path
    }

    fn request(dir: &TempDir) -> RenderRequest {
        RenderRequest {
            manifest: write(
                dir,
                "manifest.yml",
                "name: cf\ninstance_groups:\n- name: api\n  instances: 1\n  azs: [z1]\n  jobs:\n  - { name: cloud_controller, release: capi }\n  properties:\n    domain: ((system_domain))\n",
            ),
            ops: vec![write(
                dir,
                "scale.yml",
                "- { type: replace, path: /instance_groups/name=api/instances, value: 3 }\n",
            )],
            vars: Some(write(dir, "vars.yml", "system_domain: example.com\n")),
            ..Default::default()
        }
    }

    #[test]
    fn test_render_manifest() {
        let dir = TempDir::new().unwrap();
        let output = render(&request(&dir)).unwrap();
        assert!(output.contains("instances: 3"));
        assert!(output.contains("domain: example.com"));
    }

    #[test]
    fn test_render_instance_group() {
        let dir = TempDir::new().unwrap();
        let request = RenderRequest {
            instance_group: Some("api".into()),
            job: Some("cloud_controller".into()),
            ..request(&dir)
        };
        let output = render(&request).unwrap();
        let group: RenderedInstanceGroup = serde_yaml::from_str(&output).unwrap();
        let instances = &group.jobs[0].instances;
        assert_eq!(instances.len(), 3);
        assert!(instances[2].bootstrap);
    }

    #[test]
    fn test_unknown_group_and_job() {
        let dir = TempDir::new().unwrap();
        let missing_group = RenderRequest {
            instance_group: Some("router".into()),
            ..request(&dir)
        };
        assert!(matches!(
            render(&missing_group),
            Err(DaemonError::UnknownInstanceGroup(_))
        ));

        let missing_job = RenderRequest {
            instance_group: Some("api".into()),
            job: Some("gorouter".into()),
            ..request(&dir)
        };
        assert!(matches!(render(&missing_job), Err(DaemonError::UnknownJob { .. })));
    }

    #[test]
    fn test_missing_variable_fails() {
        let dir = TempDir::new().unwrap();
        let request = RenderRequest {
            vars: None,
            ..request(&dir)
        };
        let err = render(&request).unwrap_err();
        assert!(err.to_string().contains("system_domain"));
    }
}
