//! Macro for implementing Display and FromStr for wire-keyword enums
//!
//! Recras and Exact Online use fixed lowercase keywords for statuses and
//! states. This macro maps enum variants to those keywords in both
//! directions.
//!
//! # Example
//!
//! ```rust
//! use koppeling_domain::impl_domain_status_conversions;
//!
//! #[derive(Debug, Clone, Copy, PartialEq, Eq)]
//! pub enum LinkState {
//!     Pending,
//!     Linked,
//! }
//!
//! impl_domain_status_conversions!(LinkState {
//!     Pending => "pending",
//!     Linked => "linked",
//! });
//! ```

/// Implements Display and FromStr traits for keyword enums
///
/// This macro generates:
/// - Display trait: converts enum variants to their keyword
/// - FromStr trait: parses case-insensitive keywords to enum variants
#[macro_export]
macro_rules! impl_domain_status_conversions {
    ($enum_name:ident { $($variant:ident => $str:expr),+ $(,)? }) => {
        impl std::fmt::Display for $enum_name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                match self {
                    $(Self::$variant => write!(f, $str),)+
                }
            }
        }

        impl std::str::FromStr for $enum_name {
            type Err = String;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s.to_lowercase().as_str() {
                    $($str => Ok(Self::$variant),)+
                    _ => Err(format!("Invalid {}: {}", stringify!($enum_name), s)),
                }
            }
        }
    };
}
