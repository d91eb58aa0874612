//! # Koppeling Domain
//!
//! Business domain types for the Recras to Exact Online synchronization.
//!
//! This crate contains:
//! - Recras and Exact Online entities (Invoice, SalesEntry, etc.)
//! - Domain error types and Result definitions
//! - Configuration structures
//! - Business-key constants and OData serde helpers
//!
//! ## Architecture
//! - No dependencies on other Koppeling crates
//! - Only external dependencies allowed
//! - Pure domain models and data structures

pub mod config;
pub mod constants;
pub mod errors;
pub mod macros;
pub mod types;
pub mod utils;

// Re-export commonly used items
pub use config::*;
pub use errors::*;
pub use types::*;
