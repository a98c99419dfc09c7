use async_trait::async_trait;
use tracing::{debug, warn};

use crate::api::{ApiClient, AuthFailure};

/// Server verdict on a stored token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Validation {
    Valid,
    /// The server answered and refused the token.
    Invalid,
    /// No verdict: the server could not be reached or could not answer.
    NetworkError,
}

impl From<AuthFailure> for Validation {
    fn from(failure: AuthFailure) -> Self {
        match failure {
            AuthFailure::CredentialRejected => Validation::Invalid,
            // A garbled reply to a status-only endpoint is still not a rejection
            AuthFailure::NetworkUnavailable | AuthFailure::MalformedResponse(_) => {
                Validation::NetworkError
            }
        }
    }
}

/// Asks the server whether a token is still accepted. Read-only.
#[async_trait]
pub trait TokenValidator: Send + Sync {
    async fn validate(&self, token: &str) -> Validation;
}

#[async_trait]
impl TokenValidator for ApiClient {
    async fn validate(&self, token: &str) -> Validation {
        match self.check_token(token).await {
            Ok(()) => {
                debug!("Token accepted");
                Validation::Valid
            }
            Err(e) => {
                let validation = Validation::from(e.classify());
                warn!(error = %e, ?validation, "Token validation failed");
                validation
            }
        }
    }
}
