//! # Koppeling Core
//!
//! Pure business logic layer - no infrastructure dependencies.
//!
//! This crate contains:
//! - Port/adapter interfaces for Recras, Exact Online and credential storage
//! - The entity mapper and the synchronization service
//! - The read-only status check
//!
//! ## Architecture Principles
//! - Only depends on `koppeling-domain`
//! - No database, HTTP, or platform code
//! - All external dependencies via traits
//! - Pure, testable business logic

pub mod credentials;
pub mod status;
pub mod sync;

// Re-export specific items to avoid ambiguity
pub use credentials::ports::CredentialStore;
pub use status::{check_status, AdministrationStatus};
pub use sync::ports::{ExactApi, ItemResolver, RecrasApi};
pub use sync::{MappingError, SyncError, SyncOptions, SyncReport, SyncService};
