//! Tenant synchronization runs
//!
//! Wires the infrastructure clients into `koppeling-core`'s `SyncService`
//! for every tenant in the credential store.

pub mod runner;

pub use runner::{TenantOutcome, TenantRun, TenantSyncRunner};
