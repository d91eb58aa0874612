//! Tenant credential management

pub mod ports;

pub use ports::CredentialStore;
