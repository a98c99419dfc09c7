//! REST API client module for the clinic backend.
//!
//! This module provides the `ApiClient` for communicating with the clinic
//! API to authenticate and to manage patient and appointment records.
//!
//! Tokens are obtained from `POST /token` with HTTP Basic credentials and
//! sent as bearer tokens on every other request.

pub mod client;
pub mod error;

pub use client::ApiClient;
pub use error::{ApiError, AuthFailure};
