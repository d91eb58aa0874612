//! Wire-format helpers shared by the domain types

pub mod odata;
