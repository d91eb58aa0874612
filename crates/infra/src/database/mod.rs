//! Database implementations

pub mod credential_repository;
pub mod manager;
pub mod sqlcipher_pool;

pub use credential_repository::SqlCipherCredentialStore;
pub use manager::DbManager;
pub use sqlcipher_pool::{create_sqlcipher_pool, SqlCipherConnection, SqlCipherPool, SqlCipherPoolConfig};
