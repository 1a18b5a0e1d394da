//! Credential spec store backed by the Kubernetes API server.

use k8s_openapi::api::authorization::v1::{
    LocalSubjectAccessReview, ResourceAttributes, SubjectAccessReviewSpec,
};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use kube::Client;
use kube::api::{Api, ApiResource, DynamicObject, PostParams};
use kube::core::GroupVersionKind;
use serde_json::Value;
use tracing::debug;

use super::{Authorization, CredentialSpecError, CredentialSpecStore};

/// API group of the GMSACredentialSpec custom resource
pub const CREDSPEC_GROUP: &str = "windows.k8s.io";
/// API version of the GMSACredentialSpec custom resource
pub const CREDSPEC_VERSION: &str = "v1";
/// Kind of the GMSACredentialSpec custom resource
pub const CREDSPEC_KIND: &str = "GMSACredentialSpec";
/// Plural resource name of the GMSACredentialSpec custom resource
pub const CREDSPEC_PLURAL: &str = "gmsacredentialspecs";
/// Top-level field holding the credential spec contents
pub const CREDSPEC_CONTENTS_FIELD: &str = "credspec";

/// Verb a service account needs on a credential spec to run with it
const USE_VERB: &str = "use";

/// Store that checks authorization with `LocalSubjectAccessReview` and
/// reads cluster-scoped `GMSACredentialSpec` objects through the dynamic API.
#[derive(Clone)]
pub struct KubeCredentialSpecStore {
    client: Client,
    resource: ApiResource,
}

impl KubeCredentialSpecStore {
    pub fn new(client: Client) -> Self {
        let gvk = GroupVersionKind::gvk(CREDSPEC_GROUP, CREDSPEC_VERSION, CREDSPEC_KIND);
        Self {
            client,
            resource: ApiResource::from_gvk_with_plural(&gvk, CREDSPEC_PLURAL),
        }
    }
}

/// Build the access review asking whether a service account may `use` a credential spec
fn access_review(service_account: &str, namespace: &str, name: &str) -> LocalSubjectAccessReview {
    LocalSubjectAccessReview {
        metadata: ObjectMeta {
            namespace: Some(namespace.to_string()),
            ..Default::default()
        },
        spec: SubjectAccessReviewSpec {
            resource_attributes: Some(ResourceAttributes {
                namespace: Some(namespace.to_string()),
                verb: Some(USE_VERB.to_string()),
                group: Some(CREDSPEC_GROUP.to_string()),
                version: Some(CREDSPEC_VERSION.to_string()),
                resource: Some(CREDSPEC_PLURAL.to_string()),
                name: Some(name.to_string()),
                ..Default::default()
            }),
            user: Some(format!(
                "system:serviceaccount:{}:{}",
                namespace, service_account
            )),
            groups: Some(vec![
                "system:serviceaccounts".to_string(),
                format!("system:serviceaccounts:{}", namespace),
            ]),
            ..Default::default()
        },
        status: None,
    }
}

/// Extract the contents field of a credential spec object as compact JSON
fn contents_from_object(name: &str, data: &Value) -> Result<String, CredentialSpecError> {
    match data.get(CREDSPEC_CONTENTS_FIELD) {
        None | Some(Value::Null) => Err(CredentialSpecError::MissingContents {
            name: name.to_string(),
        }),
        Some(Value::String(s)) if s.is_empty() => Err(CredentialSpecError::MissingContents {
            name: name.to_string(),
        }),
        Some(contents) => {
            serde_json::to_string(contents).map_err(|e| CredentialSpecError::Unavailable {
                name: name.to_string(),
                reason: format!("unable to marshal contents into JSON: {}", e),
            })
        }
    }
}

impl CredentialSpecStore for KubeCredentialSpecStore {
    async fn is_authorized(
        &self,
        service_account: &str,
        namespace: &str,
        name: &str,
    ) -> Authorization {
        let api: Api<LocalSubjectAccessReview> = Api::namespaced(self.client.clone(), namespace);
        let review = access_review(service_account, namespace, name);

        match api.create(&PostParams::default(), &review).await {
            Ok(response) => {
                let status = response.status.unwrap_or_default();
                let allowed = status.allowed && !status.denied.unwrap_or(false);
                debug!(
                    service_account = %service_account,
                    namespace = %namespace,
                    credspec = %name,
                    allowed,
                    "Checked credential spec authorization"
                );
                Authorization {
                    allowed,
                    reason: status.reason.unwrap_or_default(),
                }
            }
            Err(e) => Authorization::denied(format!("error when checking authz access: {}", e)),
        }
    }

    async fn fetch_contents(&self, name: &str) -> Result<String, CredentialSpecError> {
        let api: Api<DynamicObject> = Api::all_with(self.client.clone(), &self.resource);

        let object = match api.get(name).await {
            Ok(object) => object,
            Err(kube::Error::Api(e)) if e.code == 404 => {
                return Err(CredentialSpecError::NotFound {
                    name: name.to_string(),
                });
            }
            Err(e) => {
                return Err(CredentialSpecError::Unavailable {
                    name: name.to_string(),
                    reason: e.to_string(),
                });
            }
        };

        contents_from_object(name, &object.data)
    }
}
