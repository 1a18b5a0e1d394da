//! Test fixtures and builder patterns for pods and admission reviews.

#![allow(dead_code)]

use k8s_openapi::api::core::v1::{
    Container, Pod, PodSecurityContext, PodSpec, SecurityContext, WindowsSecurityContextOptions,
};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use serde_json::{Value, json};

/// Canonical contents registered for `webapp-spec` in tests
pub const WEBAPP_CONTENTS: &str = r#"{"CmsPlugins":["ActiveDirectory"],"DomainJoinConfig":{"DnsName":"contoso.com","Sid":"S-1-5-21"}}"#;

/// Canonical contents registered for `db-spec` in tests
pub const DB_CONTENTS: &str = r#"{"ActiveDirectoryConfig":{"GroupManagedServiceAccounts":[{"Name":"db"}]}}"#;

fn windows_options(
    name: Option<&str>,
    contents: Option<&str>,
) -> Option<WindowsSecurityContextOptions> {
    if name.is_none() && contents.is_none() {
        return None;
    }
    Some(WindowsSecurityContextOptions {
        gmsa_credential_spec_name: name.map(str::to_string),
        gmsa_credential_spec: contents.map(str::to_string),
        ..Default::default()
    })
}

/// Builder for creating Pod test fixtures.
///
/// # Example
/// ```
/// let pod = PodBuilder::new("web")
///     .namespace("apps")
///     .credential_spec("webapp-spec")
///     .container("app")
///     .build();
/// ```
#[derive(Clone, Debug, Default)]
pub struct PodBuilder {
    name: String,
    namespace: Option<String>,
    service_account: Option<String>,
    host_network: bool,
    hostname: Option<String>,
    credspec_name: Option<String>,
    credspec_contents: Option<String>,
    containers: Vec<Container>,
}

impl PodBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = Some(namespace.into());
        self
    }

    pub fn service_account(mut self, service_account: impl Into<String>) -> Self {
        self.service_account = Some(service_account.into());
        self
    }

    pub fn host_network(mut self) -> Self {
        self.host_network = true;
        self
    }

    pub fn hostname(mut self, hostname: impl Into<String>) -> Self {
        self.hostname = Some(hostname.into());
        self
    }

    /// Name a credential spec at pod level
    pub fn credential_spec(mut self, name: impl Into<String>) -> Self {
        self.credspec_name = Some(name.into());
        self
    }

    /// Inline credential spec contents at pod level
    pub fn credential_spec_contents(mut self, contents: impl Into<String>) -> Self {
        self.credspec_contents = Some(contents.into());
        self
    }

    /// Add a container without credential spec settings
    pub fn container(self, name: impl Into<String>) -> Self {
        self.container_with(name, None, None)
    }

    /// Add a container with the given credential spec name and contents
    pub fn container_with(
        mut self,
        name: impl Into<String>,
        credspec_name: Option<&str>,
        credspec_contents: Option<&str>,
    ) -> Self {
        let windows_options = windows_options(credspec_name, credspec_contents);
        self.containers.push(Container {
            name: name.into(),
            image: Some("mcr.microsoft.com/windows/servercore:ltsc2022".to_string()),
            security_context: windows_options.map(|windows_options| SecurityContext {
                windows_options: Some(windows_options),
                ..Default::default()
            }),
            ..Default::default()
        });
        self
    }

    pub fn build(self) -> Pod {
        let windows_options =
            windows_options(self.credspec_name.as_deref(), self.credspec_contents.as_deref());

        Pod {
            metadata: ObjectMeta {
                name: Some(self.name),
                namespace: self.namespace,
                ..Default::default()
            },
            spec: Some(PodSpec {
                service_account_name: self.service_account,
                host_network: self.host_network.then_some(true),
                hostname: self.hostname,
                security_context: windows_options.map(|windows_options| PodSecurityContext {
                    windows_options: Some(windows_options),
                    ..Default::default()
                }),
                containers: self.containers,
                ..Default::default()
            }),
            status: None,
        }
    }

    /// Build the pod as a JSON value, with `apiVersion` and `kind` set
    pub fn build_json(self) -> Value {
        let mut value = serde_json::to_value(self.build()).unwrap_or(Value::Null);
        if let Value::Object(map) = &mut value {
            map.insert("apiVersion".to_string(), json!("v1"));
            map.insert("kind".to_string(), json!("Pod"));
        }
        value
    }
}

/// Builder for AdmissionReview request bodies.
#[derive(Clone, Debug)]
pub struct ReviewBuilder {
    uid: String,
    kind: String,
    operation: String,
    namespace: Option<String>,
    object: Option<Value>,
    old_object: Option<Value>,
}

impl ReviewBuilder {
    pub fn create(object: Value) -> Self {
        Self {
            uid: "705ab4f5-6393-11e8-b7cc-42010a800002".to_string(),
            kind: "Pod".to_string(),
            operation: "CREATE".to_string(),
            namespace: Some("apps".to_string()),
            object: Some(object),
            old_object: None,
        }
    }

    pub fn update(object: Value, old_object: Value) -> Self {
        Self {
            operation: "UPDATE".to_string(),
            old_object: Some(old_object),
            ..Self::create(object)
        }
    }

    pub fn uid(mut self, uid: impl Into<String>) -> Self {
        self.uid = uid.into();
        self
    }

    pub fn kind(mut self, kind: impl Into<String>) -> Self {
        self.kind = kind.into();
        self
    }

    pub fn operation(mut self, operation: impl Into<String>) -> Self {
        self.operation = operation.into();
        self
    }

    pub fn namespace(mut self, namespace: Option<&str>) -> Self {
        self.namespace = namespace.map(str::to_string);
        self
    }

    pub fn without_object(mut self) -> Self {
        self.object = None;
        self
    }

    /// The `request` part of the review
    pub fn request_json(&self) -> Value {
        let mut request = json!({
            "uid": self.uid,
            "kind": {"group": "", "version": "v1", "kind": self.kind},
            "resource": {"group": "", "version": "v1", "resource": "pods"},
            "operation": self.operation,
            "userInfo": {"username": "system:serviceaccount:kube-system:replicaset-controller"},
            "dryRun": false
        });
        if let Value::Object(map) = &mut request {
            if let Some(namespace) = &self.namespace {
                map.insert("namespace".to_string(), json!(namespace));
            }
            if let Some(object) = &self.object {
                map.insert("object".to_string(), object.clone());
            }
            if let Some(old_object) = &self.old_object {
                map.insert("oldObject".to_string(), old_object.clone());
            }
        }
        request
    }

    /// The full AdmissionReview envelope
    pub fn review_json(&self) -> Value {
        json!({
            "apiVersion": "admission.k8s.io/v1",
            "kind": "AdmissionReview",
            "request": self.request_json()
        })
    }
}
