//! Recras, the source of invoices

pub mod client;

pub use client::{base_url_for, RecrasClient};
