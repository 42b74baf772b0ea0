//! REST client module for the violation tracker's authentication service.
//!
//! This module provides the `AuthClient` for the three JWT auth endpoints
//! (status, login, logout). The server keeps the JWT in an HTTP-only cookie,
//! so the client carries a cookie store rather than a bearer token.

pub mod client;
pub mod error;

pub use client::AuthClient;
pub use error::ApiError;
