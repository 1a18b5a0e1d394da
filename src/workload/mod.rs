//! Workload model for credential spec admission.
//!
//! A [`Workload`] is the slice of a pod that the admission policies care
//! about: the pod-level credential spec assignment plus one assignment per
//! container, in the order the containers appear in the pod spec.

use std::fmt;

use jsonptr::PointerBuf;
use k8s_openapi::api::core::v1::{Pod, SecurityContext, WindowsSecurityContextOptions};

/// Service account Kubernetes assigns to pods that do not name one
pub const DEFAULT_SERVICE_ACCOUNT: &str = "default";

/// Field holding the inlined credential spec contents in `windowsOptions`
const CONTENTS_FIELD: &str = "gmsaCredentialSpec";

/// Credential spec assignment carried by a pod or a container.
///
/// Mirrors the `gmsaCredentialSpecName` / `gmsaCredentialSpec` pair of
/// `securityContext.windowsOptions`. Setting `contents` without `name` is
/// invalid and rejected at admission.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CredentialAssignment {
    /// Name of the referenced credential spec resource
    pub name: Option<String>,
    /// Inlined credential spec contents (opaque JSON string)
    pub contents: Option<String>,
}

impl CredentialAssignment {
    /// Assignment referencing a credential spec by name only
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            contents: None,
        }
    }

    /// Assignment with both a name and inlined contents
    pub fn with_contents(name: impl Into<String>, contents: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            contents: Some(contents.into()),
        }
    }

    /// True when neither the name nor the contents are set
    pub fn is_empty(&self) -> bool {
        self.name.is_none() && self.contents.is_none()
    }
}

impl From<&WindowsSecurityContextOptions> for CredentialAssignment {
    fn from(options: &WindowsSecurityContextOptions) -> Self {
        Self {
            name: options.gmsa_credential_spec_name.clone(),
            contents: options.gmsa_credential_spec.clone(),
        }
    }
}

/// The resource within a workload that owns a credential assignment.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ResourceKind {
    /// The pod itself
    Workload { name: String },
    /// One of the pod's containers, with its index in the original sequence
    Container { name: String, index: usize },
}

impl ResourceKind {
    /// Kind label used in admission messages
    pub fn kind(&self) -> &'static str {
        match self {
            ResourceKind::Workload { .. } => "workload",
            ResourceKind::Container { .. } => "container",
        }
    }

    /// Name of the workload or container
    pub fn name(&self) -> &str {
        match self {
            ResourceKind::Workload { name } | ResourceKind::Container { name, .. } => name,
        }
    }

    /// JSON pointer to this resource's inlined credential spec contents.
    ///
    /// Only valid as a patch target when the resource already has a
    /// `windowsOptions` object, which holds whenever it names a credential spec.
    pub fn contents_path(&self) -> PointerBuf {
        match self {
            ResourceKind::Workload { .. } => PointerBuf::from_tokens([
                "spec",
                "securityContext",
                "windowsOptions",
                CONTENTS_FIELD,
            ]),
            ResourceKind::Container { index, .. } => {
                let index = index.to_string();
                PointerBuf::from_tokens([
                    "spec",
                    "containers",
                    index.as_str(),
                    "securityContext",
                    "windowsOptions",
                    CONTENTS_FIELD,
                ])
            }
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {:?}", self.kind(), self.name())
    }
}

/// A container and its credential assignment
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Container {
    pub name: String,
    pub assignment: CredentialAssignment,
}

/// Pod-like object evaluated by the admission policies.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Workload {
    /// Pod name (or generate-name prefix when the name is not set yet)
    pub name: String,
    /// Namespace from the pod metadata, if set
    pub namespace: Option<String>,
    /// Service account the pod runs as
    pub service_account: String,
    /// Whether the pod shares the host network namespace
    pub host_network: bool,
    /// Explicit hostname requested by the pod
    pub hostname: Option<String>,
    /// Pod-level credential assignment
    pub assignment: CredentialAssignment,
    /// Containers in pod spec order
    pub containers: Vec<Container>,
}

impl Workload {
    /// Iterate over every resource, the workload first and then each
    /// container in its original order.
    pub fn resources(&self) -> impl Iterator<Item = (ResourceKind, &CredentialAssignment)> + '_ {
        let workload = std::iter::once((
            ResourceKind::Workload {
                name: self.name.clone(),
            },
            &self.assignment,
        ));
        let containers = self
            .containers
            .iter()
            .enumerate()
            .map(|(index, container)| {
                (
                    ResourceKind::Container {
                        name: container.name.clone(),
                        index,
                    },
                    &container.assignment,
                )
            });
        workload.chain(containers)
    }

    /// Assignment of the container with the given name, if present
    pub fn container_assignment(&self, name: &str) -> Option<&CredentialAssignment> {
        self.containers
            .iter()
            .find(|c| c.name == name)
            .map(|c| &c.assignment)
    }

    /// True if any resource references a credential spec by name
    pub fn references_credential_spec(&self) -> bool {
        self.resources().any(|(_, a)| a.name.is_some())
    }
}

fn windows_options(context: Option<&SecurityContext>) -> CredentialAssignment {
    context
        .and_then(|c| c.windows_options.as_ref())
        .map(CredentialAssignment::from)
        .unwrap_or_default()
}

impl From<&Pod> for Workload {
    fn from(pod: &Pod) -> Self {
        let spec = pod.spec.as_ref();

        let assignment = spec
            .and_then(|s| s.security_context.as_ref())
            .and_then(|c| c.windows_options.as_ref())
            .map(CredentialAssignment::from)
            .unwrap_or_default();

        let containers = spec
            .map(|s| {
                s.containers
                    .iter()
                    .map(|c| Container {
                        name: c.name.clone(),
                        assignment: windows_options(c.security_context.as_ref()),
                    })
                    .collect()
            })
            .unwrap_or_default();

        let service_account = spec
            .and_then(|s| s.service_account_name.clone())
            .filter(|sa| !sa.is_empty())
            .unwrap_or_else(|| DEFAULT_SERVICE_ACCOUNT.to_string());

        Self {
            name: pod
                .metadata
                .name
                .clone()
                .or_else(|| pod.metadata.generate_name.clone())
                .unwrap_or_default(),
            namespace: pod.metadata.namespace.clone(),
            service_account,
            host_network: spec.and_then(|s| s.host_network).unwrap_or(false),
            hostname: spec
                .and_then(|s| s.hostname.clone())
                .filter(|h| !h.is_empty()),
            assignment,
            containers,
        }
    }
}
