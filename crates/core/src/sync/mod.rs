//! Recras to Exact Online synchronization

pub mod division;
pub mod errors;
pub mod mapper;
pub mod ports;
pub mod report;
pub mod resolver;
pub mod service;

pub use errors::{MappingError, SyncError, SyncResult};
pub use report::{SyncCounters, SyncReport};
pub use service::{SyncOptions, SyncService};
