//! REST API client module for the Studyhall platform.
//!
//! This module provides the `ApiClient` for authentication, profile, and
//! passcode endpoints, plus the `ApiError` taxonomy shared by everything
//! that talks to the server.
//!
//! Access tokens are passed per call as bearer headers; the refresh
//! credential is a server-set cookie held by the client's cookie store.

pub mod client;
pub mod error;

pub use client::{ApiClient, TokenGrant};
pub use error::ApiError;
