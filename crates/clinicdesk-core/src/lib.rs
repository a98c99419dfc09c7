//! Core library for clinicdesk.
//!
//! Provides the pieces a clinic admin client needs that are independent of
//! any particular front-end:
//!
//! - `api`: REST client for the clinic API (`/token`, `/validate-token`,
//!   `/patient`, `/appointment`) and its error classification
//! - `auth`: credential storage, token validation, the session state
//!   machine, route guarding and the login flow
//! - `models`: patients, appointments and paged list responses
//! - `config`: on-disk configuration with environment overrides

pub mod api;
pub mod auth;
pub mod config;
pub mod models;
pub mod utils;

pub use api::{ApiClient, ApiError, AuthFailure};
pub use config::Config;
