//! HTTP transport with retry and per-request timeout

pub mod client;

pub use client::{HttpClient, HttpClientBuilder};
