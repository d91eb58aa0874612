//! Exact Online, the target administration

pub mod client;

pub use client::ExactClient;
