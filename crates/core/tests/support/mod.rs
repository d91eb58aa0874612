//! Shared test helpers for `koppeling-core` integration tests.
//!
//! In-memory fakes for the Recras and Exact Online ports so that the
//! synchronization tests can focus on behaviour instead of HTTP.

#![allow(dead_code)]

pub mod exact;
pub mod fixtures;
pub mod recras;
