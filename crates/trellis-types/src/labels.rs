//! Metadata markers shared between the controller and the objects it renders.

/// Names the deployment an object belongs to.
pub const LABEL_DEPLOYMENT_NAME: &str = "trellis.dev/deployment-name";

/// Names the rendered version of a deployment an object was produced for.
pub const LABEL_DEPLOYMENT_VERSION: &str = "trellis.dev/deployment-version";

/// Names the instance group an object was produced for.
pub const LABEL_INSTANCE_GROUP_NAME: &str = "trellis.dev/instance-group-name";

/// Marks secrets written through the versioned secret store.
pub const LABEL_SECRET_KIND: &str = "trellis.dev/secret-kind";

/// Value of [`LABEL_SECRET_KIND`] for versioned secrets.
pub const SECRET_KIND_VERSIONED: &str = "versioned";

/// Describes what a versioned secret carries.
pub const LABEL_SECRET_TYPE: &str = "trellis.dev/secret-type";

/// Value of [`LABEL_SECRET_TYPE`] for rendered process (BPM) information.
pub const SECRET_TYPE_BPM: &str = "bpm";

/// Value of [`LABEL_SECRET_TYPE`] for the desired manifest.
pub const SECRET_TYPE_DESIRED_MANIFEST: &str = "desired-manifest";

/// Marks services that front an external link provider.
pub const LABEL_LINK_PROVIDER_NAME: &str = "trellis.dev/link-provider-name";

/// Comma separated list of deployments consuming an object.
pub const ANNOTATION_CONSUMED_BY: &str = "trellis.dev/consumed-by";

/// RFC 3339 timestamp of the last reconcile that touched an object.
pub const ANNOTATION_LAST_RECONCILE: &str = "trellis.dev/last-reconcile";
