//! Authentication module: the session guard.
//!
//! This module provides:
//! - `CredentialStore`: durable storage for the bearer token and the route a
//!   user was bounced away from (file, OS keychain, or in-memory)
//! - `TokenValidator`: asks the server whether a token is still accepted
//! - `Session`: the state machine deciding Checking / Authenticated /
//!   Unauthenticated / DegradedError from the stored token
//! - `RouteGuard`: turns session status into render/redirect decisions
//! - `LoginFlow`: exchanges credentials for a token and commits it
//!
//! A validation that fails for lack of a server response never clears the
//! stored token; only an explicit rejection does.

pub mod guard;
pub mod login;
pub mod session;
pub mod store;
pub mod validator;

pub use guard::{GuardDecision, Route, RouteGuard};
pub use login::{LoginFlow, LoginForm, LoginOutcome, TokenIssuer};
pub use session::{Session, SessionStatus, ValidationReport};
pub use store::{
    open_store, CredentialStore, FileCredentialStore, KeyringCredentialStore,
    MemoryCredentialStore, StoredCredentials,
};
pub use validator::{TokenValidator, Validation};
