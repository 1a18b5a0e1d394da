// Test code is allowed to panic on failure
#![allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::indexing_slicing,
    clippy::panic
)]

//! Property-based tests for gmsa-webhook.
//!
//! Uses proptest to generate random inputs and verify invariants.

#[path = "../common/mod.rs"]
mod common;

use proptest::prelude::*;
use serde_json::{Map, Value};

use common::fixtures::PodBuilder;
use gmsa_webhook::FakeCredentialSpecStore;
use gmsa_webhook::webhooks::policies::create::{RANDOM_HOSTNAME_LENGTH, contents_match, random_hostname};
use gmsa_webhook::webhooks::policies::immutability::evaluate_update;
use gmsa_webhook::webhooks::{AdmissionEngine, WebhookOperation};
use gmsa_webhook::workload::Workload;
use k8s_openapi::api::core::v1::Pod;

/// Strategy for generating flat JSON objects with scalar values.
fn json_object() -> impl Strategy<Value = Vec<(String, i64)>> {
    prop::collection::btree_map("[A-Za-z]{1,8}", any::<i64>(), 1..8)
        .prop_map(|map| map.into_iter().collect())
}

/// Render entries as a JSON object, preserving the given key order.
fn render(entries: &[(String, i64)]) -> String {
    let fields: Vec<String> = entries
        .iter()
        .map(|(k, v)| format!("{}:{}", Value::String(k.clone()), v))
        .collect();
    format!("{{{}}}", fields.join(","))
}

/// Strategy for generating optional credential spec names.
fn maybe_name() -> impl Strategy<Value = Option<String>> {
    prop::option::of("[a-z][a-z0-9-]{0,12}")
}

/// Strategy for generating pods with random credential spec names on
/// the pod and its containers.
fn any_pod() -> impl Strategy<Value = Pod> {
    (
        maybe_name(),
        prop::collection::vec(("[a-z]{1,6}", maybe_name()), 0..5),
    )
        .prop_map(|(pod_spec, containers)| {
            let mut builder = PodBuilder::new("generated");
            if let Some(name) = pod_spec {
                builder = builder.credential_spec(name);
            }
            for (i, (name, spec)) in containers.into_iter().enumerate() {
                builder = builder.container_with(format!("{name}-{i}"), spec.as_deref(), None);
            }
            builder.build()
        })
}

fn runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_current_thread()
        .build()
        .unwrap()
}

proptest! {
    /// Property: Key order never affects contents comparison.
    #[test]
    fn test_key_order_is_irrelevant(entries in json_object()) {
        let forward = render(&entries);
        let mut reversed = entries.clone();
        reversed.reverse();
        let backward = render(&reversed);

        prop_assert_eq!(contents_match(&forward, &backward), Ok(true));
    }

    /// Property: Changing any value breaks the match.
    #[test]
    fn test_changed_value_never_matches(entries in json_object(), index in any::<prop::sample::Index>()) {
        let mut changed = entries.clone();
        let slot = index.index(changed.len());
        changed[slot].1 = changed[slot].1.wrapping_add(1);

        prop_assert_eq!(contents_match(&render(&entries), &render(&changed)), Ok(false));
    }

    /// Property: Canonical contents read back from a parsed object still match.
    #[test]
    fn test_reserialized_contents_match(entries in json_object()) {
        let original = render(&entries);
        let parsed: Map<String, Value> = serde_json::from_str(&original).unwrap();
        let reserialized = serde_json::to_string(&parsed).unwrap();

        prop_assert_eq!(contents_match(&original, &reserialized), Ok(true));
    }

    /// Property: Generated hostnames are always 15 lowercase alphanumerics.
    #[test]
    fn test_random_hostname_shape(_seed in any::<u8>()) {
        let hostname = random_hostname();
        prop_assert_eq!(hostname.len(), RANDOM_HOSTNAME_LENGTH);
        prop_assert!(hostname.chars().all(|c| c.is_ascii_lowercase() || c.is_ascii_digit()));
    }

    /// Property: An unchanged pod always passes the update check.
    #[test]
    fn test_identical_update_allowed(pod in any_pod()) {
        let workload = Workload::from(&pod);
        prop_assert!(evaluate_update(&workload, &workload).is_ok());
    }

    /// Property: Mutation emits exactly one patch per named resource, in
    /// resource order, when every credential spec exists.
    #[test]
    fn test_mutation_patches_every_named_resource(pod in any_pod()) {
        let workload = Workload::from(&pod);
        let named: Vec<String> = workload
            .resources()
            .filter(|(_, assignment)| assignment.name.is_some())
            .map(|(resource, _)| resource.contents_path().to_string())
            .collect();

        let mut store = FakeCredentialSpecStore::new();
        for (_, assignment) in workload.resources() {
            if let Some(name) = &assignment.name {
                store = store.with_spec(name.clone(), "{}");
            }
        }
        let engine = AdmissionEngine::new(store);

        let decision = runtime()
            .block_on(engine.evaluate_create(&workload, "default", WebhookOperation::Mutate))
            .unwrap();
        let paths: Vec<String> = decision.patches.iter().map(|p| p.path.to_string()).collect();
        prop_assert_eq!(paths, named);
    }

    /// Property: Validation never emits patches.
    #[test]
    fn test_validation_never_patches(pod in any_pod()) {
        let workload = Workload::from(&pod);
        let engine = AdmissionEngine::new(FakeCredentialSpecStore::new());

        let decision = runtime()
            .block_on(engine.evaluate_create(&workload, "default", WebhookOperation::Validate))
            .unwrap();
        prop_assert!(decision.patches.is_empty());
    }
}
