//! # Koppeling Infrastructure
//!
//! Infrastructure implementations of core domain ports.
//!
//! This crate contains:
//! - The retrying HTTP transport and the Exact Online token provider
//! - The Exact Online and Recras API clients
//! - The SQLCipher credential store
//! - Configuration loading
//! - The tenant runner and the daily scheduler
//!
//! ## Architecture
//! - Implements traits defined in `koppeling-core`
//! - Depends on `koppeling-domain` and `koppeling-core`
//! - Contains all "impure" code (network, database, clock)

pub mod api;
pub mod config;
pub mod database;
pub mod errors;
pub mod http;
pub mod integrations;
pub mod scheduling;
pub mod sync;

// Re-export commonly used items
pub use database::{DbManager, SqlCipherCredentialStore};
pub use errors::InfraError;
pub use http::HttpClient;
pub use integrations::exact::ExactClient;
pub use integrations::recras::RecrasClient;
pub use scheduling::{DailyScheduler, DailySchedulerConfig, SchedulerError};
pub use sync::{TenantOutcome, TenantRun, TenantSyncRunner};
