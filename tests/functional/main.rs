// Test code is allowed to panic on failure
#![allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::indexing_slicing,
    clippy::panic
)]

//! Functional tests for the credential spec admission webhook.
//!
//! These tests drive the admission engine and the HTTP router end to end
//! WITHOUT requiring a live Kubernetes cluster. Credential specs and
//! authorization decisions come from the in-memory fake store.
//!
//! ```bash
//! # Run all functional tests
//! cargo test --test functional
//!
//! # Run specific test
//! cargo test --test functional test_mutate_then_validate_round_trip
//! ```
//!
//! ## Test Categories
//!
//! - **Admission tests**: engine decisions for create and update requests
//! - **HTTP tests**: routing, transport errors and review encoding

#[path = "../common/mod.rs"]
mod common;

mod http_tests;

pub use common::fixtures::*;
