//! Authentication and response handling shared by the API clients
//!
//! - [`auth`]: the [`AccessTokenProvider`] port and the Exact Online
//!   refresh-token provider
//! - [`errors`]: status checks and body decoding into `ApiError`

pub mod auth;
pub mod errors;

pub use auth::{AccessTokenProvider, ExactTokenProvider};
