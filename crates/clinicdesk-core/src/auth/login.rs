//! Login flow: credentials in, committed token and landing route out.

use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use tracing::{error, info};

use crate::api::{ApiClient, AuthFailure};

use super::guard::{Route, RouteGuard};
use super::session::Session;

/// Maximum length for username input.
pub const MAX_USERNAME_LENGTH: usize = 64;

/// Maximum length for password input.
/// 128 chars accommodates password managers and passphrases.
pub const MAX_PASSWORD_LENGTH: usize = 128;

/// Exchanges username/password for a bearer token.
#[async_trait]
pub trait TokenIssuer: Send + Sync {
    async fn issue_token(&self, username: &str, password: &str) -> Result<String, AuthFailure>;
}

#[async_trait]
impl TokenIssuer for ApiClient {
    async fn issue_token(&self, username: &str, password: &str) -> Result<String, AuthFailure> {
        self.request_token(username, password).await.map_err(|e| {
            error!(error = %e, "Login failed");
            e.classify_login()
        })
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoginForm {
    pub username: String,
    pub password: String,
}

impl LoginForm {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }

    /// Both fields required before anything is sent.
    pub fn is_complete(&self) -> bool {
        !self.username.trim().is_empty() && !self.password.is_empty()
    }

    pub fn clear_password(&mut self) {
        self.password.clear();
    }
}

/// Printable, non-control characters only
fn is_valid_input_char(c: char) -> bool {
    !c.is_control()
}

pub fn can_add_username_char(current_len: usize, c: char) -> bool {
    current_len < MAX_USERNAME_LENGTH && is_valid_input_char(c)
}

pub fn can_add_password_char(current_len: usize, c: char) -> bool {
    current_len < MAX_PASSWORD_LENGTH && is_valid_input_char(c)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoginOutcome {
    LoggedIn { landing: Route },
    MissingFields,
    InvalidCredentials,
    NetworkError,
    Malformed(String),
}

impl LoginOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, LoginOutcome::LoggedIn { .. })
    }

    /// Message for the login screen; `None` on success.
    pub fn message(&self) -> Option<String> {
        match self {
            LoginOutcome::LoggedIn { .. } => None,
            LoginOutcome::MissingFields => Some("Username and password required".to_string()),
            LoginOutcome::InvalidCredentials => Some("Invalid username or password".to_string()),
            LoginOutcome::NetworkError => {
                Some("Unable to connect to server. Check your connection.".to_string())
            }
            LoginOutcome::Malformed(detail) => {
                Some(format!("Login failed: unexpected server response ({})", detail))
            }
        }
    }
}

pub struct LoginFlow {
    issuer: Arc<dyn TokenIssuer>,
}

impl LoginFlow {
    pub fn new(issuer: Arc<dyn TokenIssuer>) -> Self {
        Self { issuer }
    }

    /// Submit the form. Only a successful exchange touches the credential
    /// store; every failure leaves the current session as it was.
    pub async fn submit(
        &self,
        form: &LoginForm,
        session: &mut Session,
        guard: &RouteGuard,
    ) -> Result<LoginOutcome> {
        if !form.is_complete() {
            return Ok(LoginOutcome::MissingFields);
        }

        let username = form.username.trim();
        let outcome = match self.issuer.issue_token(username, &form.password).await {
            Ok(token) => {
                session.login(token)?;
                let landing = guard.landing()?;
                info!(username = username, landing = landing.path(), "Login successful");
                LoginOutcome::LoggedIn { landing }
            }
            Err(AuthFailure::CredentialRejected) => LoginOutcome::InvalidCredentials,
            Err(AuthFailure::NetworkUnavailable) => LoginOutcome::NetworkError,
            Err(AuthFailure::MalformedResponse(detail)) => LoginOutcome::Malformed(detail),
        };
        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::store::{CredentialStore, MemoryCredentialStore};
    use crate::auth::validator::{TokenValidator, Validation};
    use crate::auth::SessionStatus;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Scripted {
        reply: Result<String, AuthFailure>,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl TokenIssuer for Scripted {
        async fn issue_token(&self, _u: &str, _p: &str) -> Result<String, AuthFailure> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.reply.clone()
        }
    }

    struct AlwaysValid;

    #[async_trait]
    impl TokenValidator for AlwaysValid {
        async fn validate(&self, _token: &str) -> Validation {
            Validation::Valid
        }
    }

    fn setup(
        reply: Result<String, AuthFailure>,
    ) -> (Arc<Scripted>, Arc<MemoryCredentialStore>, Session, RouteGuard) {
        let issuer = Arc::new(Scripted {
            reply,
            calls: AtomicUsize::new(0),
        });
        let store = Arc::new(MemoryCredentialStore::new());
        let session = Session::new(store.clone(), Arc::new(AlwaysValid));
        let guard = RouteGuard::new(store.clone());
        (issuer, store, session, guard)
    }

    #[tokio::test]
    async fn test_missing_fields_never_submits() {
        let (issuer, store, mut session, guard) = setup(Ok("t".into()));
        let flow = LoginFlow::new(issuer.clone());

        for form in [
            LoginForm::new("", "secret"),
            LoginForm::new("  ", "secret"),
            LoginForm::new("nurse", ""),
        ] {
            let outcome = flow.submit(&form, &mut session, &guard).await.unwrap();
            assert_eq!(outcome, LoginOutcome::MissingFields);
        }
        assert_eq!(issuer.calls.load(Ordering::SeqCst), 0);
        assert_eq!(store.read_token().unwrap(), None);
    }

    #[tokio::test]
    async fn test_success_commits_token_and_lands() {
        let (issuer, store, mut session, guard) = setup(Ok("fresh".into()));
        store.write_route("/appointment").unwrap();
        let flow = LoginFlow::new(issuer);

        let outcome = flow
            .submit(&LoginForm::new("nurse", "secret"), &mut session, &guard)
            .await
            .unwrap();
        assert_eq!(
            outcome,
            LoginOutcome::LoggedIn {
                landing: Route::Appointments
            }
        );
        assert_eq!(store.read_token().unwrap().as_deref(), Some("fresh"));
        assert_eq!(session.status(), SessionStatus::Checking);
        assert_eq!(session.settle().await.unwrap(), SessionStatus::Authenticated);
    }

    #[tokio::test]
    async fn test_failures_leave_store_untouched() {
        for (reply, expected) in [
            (
                Err(AuthFailure::CredentialRejected),
                LoginOutcome::InvalidCredentials,
            ),
            (
                Err(AuthFailure::NetworkUnavailable),
                LoginOutcome::NetworkError,
            ),
            (
                Err(AuthFailure::MalformedResponse("no token".into())),
                LoginOutcome::Malformed("no token".into()),
            ),
        ] {
            let (issuer, store, mut session, guard) = setup(reply);
            store.write_token("previous").unwrap();
            let flow = LoginFlow::new(issuer);
            let outcome = flow
                .submit(&LoginForm::new("nurse", "secret"), &mut session, &guard)
                .await
                .unwrap();
            assert_eq!(outcome, expected);
            assert!(outcome.message().is_some());
            assert_eq!(store.read_token().unwrap().as_deref(), Some("previous"));
        }
    }

    #[test]
    fn test_messages_are_distinct() {
        let invalid = LoginOutcome::InvalidCredentials.message().unwrap();
        let network = LoginOutcome::NetworkError.message().unwrap();
        assert_ne!(invalid, network);
        assert!(LoginOutcome::LoggedIn {
            landing: Route::Patients
        }
        .message()
        .is_none());
    }

    #[test]
    fn test_can_add_chars() {
        assert!(can_add_username_char(0, 'a'));
        assert!(!can_add_username_char(MAX_USERNAME_LENGTH, 'a'));
        assert!(!can_add_username_char(0, '\n'));
        assert!(can_add_password_char(MAX_PASSWORD_LENGTH - 1, '!'));
        assert!(!can_add_password_char(MAX_PASSWORD_LENGTH, '!'));
    }
}
