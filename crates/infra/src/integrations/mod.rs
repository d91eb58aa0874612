//! External service integrations

pub mod exact;
pub mod recras;
