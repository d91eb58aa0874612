//! Read-only diagnosis of the Exact Online side of a tenant

pub mod service;

pub use service::{check_status, AdministrationStatus};
