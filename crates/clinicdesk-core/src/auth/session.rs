//! Session state machine.
//!
//! `Booting → Checking → {Authenticated, Unauthenticated, DegradedError}`,
//! re-entering `Checking` whenever the credential changes. Validations run
//! as spawned tasks that report back over a channel; each carries the
//! generation it was started under, and reports from an older generation
//! are dropped on arrival.

use std::sync::Arc;

use anyhow::Result;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::store::CredentialStore;
use super::validator::{TokenValidator, Validation};

/// Buffer size for validation reports. Superseded tasks are aborted, so at
/// most a couple of reports are ever queued.
const CHANNEL_BUFFER_SIZE: usize = 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionStatus {
    Booting,
    Checking,
    Authenticated,
    Unauthenticated,
    /// Token kept, but the server could not confirm it.
    DegradedError,
}

impl SessionStatus {
    /// No verdict yet; show a loading placeholder.
    pub fn is_pending(&self) -> bool {
        matches!(self, SessionStatus::Booting | SessionStatus::Checking)
    }

    pub fn label(&self) -> &'static str {
        match self {
            SessionStatus::Booting => "starting",
            SessionStatus::Checking => "checking session",
            SessionStatus::Authenticated => "signed in",
            SessionStatus::Unauthenticated => "signed out",
            SessionStatus::DegradedError => "server unreachable",
        }
    }
}

/// Result of one validation task, tagged with the generation it belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ValidationReport {
    pub generation: u64,
    pub validation: Validation,
}

pub struct Session {
    store: Arc<dyn CredentialStore>,
    validator: Arc<dyn TokenValidator>,
    status: SessionStatus,
    token: Option<String>,
    generation: u64,
    in_flight: Option<JoinHandle<()>>,
    report_tx: mpsc::Sender<ValidationReport>,
    report_rx: mpsc::Receiver<ValidationReport>,
    /// Consecutive validations that ended in `NetworkError`
    network_failures: u32,
}

impl Session {
    pub fn new(store: Arc<dyn CredentialStore>, validator: Arc<dyn TokenValidator>) -> Self {
        let (report_tx, report_rx) = mpsc::channel(CHANNEL_BUFFER_SIZE);
        Self {
            store,
            validator,
            status: SessionStatus::Booting,
            token: None,
            generation: 0,
            in_flight: None,
            report_tx,
            report_rx,
            network_failures: 0,
        }
    }

    pub fn status(&self) -> SessionStatus {
        self.status
    }

    /// Copy of the current credential for this cycle.
    pub fn token(&self) -> Option<&str> {
        self.token.as_deref()
    }

    pub fn is_checking(&self) -> bool {
        self.status == SessionStatus::Checking
    }

    pub fn is_valid(&self) -> bool {
        self.status == SessionStatus::Authenticated
    }

    pub fn has_network_error(&self) -> bool {
        self.status == SessionStatus::DegradedError
    }

    pub fn network_failures(&self) -> u32 {
        self.network_failures
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn store(&self) -> &Arc<dyn CredentialStore> {
        &self.store
    }

    // =========================================================================
    // Transitions
    // =========================================================================

    /// Read the stored token; validate it if present. No token means no
    /// network call at all.
    pub fn boot(&mut self) -> Result<SessionStatus> {
        match self.store.read_token()? {
            Some(token) => {
                debug!("Stored token found, validating");
                self.start_check(token);
            }
            None => {
                debug!("No stored token");
                self.token = None;
                self.set_status(SessionStatus::Unauthenticated);
            }
        }
        Ok(self.status)
    }

    /// Commit a freshly issued token and validate it, superseding any
    /// validation still running for an older token.
    pub fn login(&mut self, token: String) -> Result<()> {
        self.store.write_token(&token)?;
        self.network_failures = 0;
        info!("New token stored");
        self.start_check(token);
        Ok(())
    }

    /// Drop the credential and remembered route. Safe to call repeatedly.
    pub fn logout(&mut self) -> Result<()> {
        self.supersede();
        self.store.clear()?;
        self.token = None;
        self.network_failures = 0;
        if self.status != SessionStatus::Unauthenticated {
            info!("Logged out");
        }
        self.set_status(SessionStatus::Unauthenticated);
        Ok(())
    }

    /// A resource call was answered with 401/403: same effect as the
    /// validator rejecting the token.
    pub fn expire(&mut self) -> Result<()> {
        if self.token.is_none() {
            return Ok(());
        }
        warn!("Server rejected the session token");
        self.supersede();
        self.reject()
    }

    /// `expire` for a resource call issued under `generation`. A rejection
    /// aimed at a token that has since been replaced changes nothing.
    pub fn expire_from(&mut self, generation: u64) -> Result<bool> {
        if generation != self.generation {
            debug!(
                call_generation = generation,
                current_generation = self.generation,
                "Ignoring rejection of a superseded token"
            );
            return Ok(false);
        }
        self.expire()?;
        Ok(true)
    }

    /// Re-validate the kept token after a network failure.
    pub fn retry(&mut self) -> bool {
        if self.status != SessionStatus::DegradedError {
            return false;
        }
        match self.token.clone() {
            Some(token) => {
                debug!(failures = self.network_failures, "Retrying validation");
                self.start_check(token);
                true
            }
            None => false,
        }
    }

    /// Apply a validation report. Returns false when the report belongs to
    /// a superseded generation and was ignored.
    pub fn apply(&mut self, report: ValidationReport) -> Result<bool> {
        if report.generation != self.generation || self.status != SessionStatus::Checking {
            debug!(
                report_generation = report.generation,
                current_generation = self.generation,
                "Discarding stale validation result"
            );
            return Ok(false);
        }

        self.in_flight = None;
        match report.validation {
            Validation::Valid => {
                self.network_failures = 0;
                self.set_status(SessionStatus::Authenticated);
            }
            Validation::Invalid => {
                self.reject()?;
            }
            Validation::NetworkError => {
                // Keep the token: the server never said it was bad
                self.network_failures += 1;
                self.set_status(SessionStatus::DegradedError);
            }
        }
        Ok(true)
    }

    /// Apply every finished validation without blocking.
    /// Returns true if the status changed.
    pub fn poll(&mut self) -> Result<bool> {
        let mut changed = false;
        while let Ok(report) = self.report_rx.try_recv() {
            changed |= self.apply(report)?;
        }
        Ok(changed)
    }

    /// Wait for the next report from any validation task.
    pub async fn next_report(&mut self) -> Option<ValidationReport> {
        self.report_rx.recv().await
    }

    /// Wait until the current validation has a verdict.
    pub async fn settle(&mut self) -> Result<SessionStatus> {
        while self.status == SessionStatus::Checking {
            match self.report_rx.recv().await {
                Some(report) => {
                    self.apply(report)?;
                }
                None => break,
            }
        }
        Ok(self.status)
    }

    /// Teardown: abort the running validation and make sure its result, if
    /// already queued, is never applied.
    pub fn shutdown(&mut self) {
        self.supersede();
    }

    // =========================================================================
    // Internals
    // =========================================================================

    fn reject(&mut self) -> Result<()> {
        self.store.clear()?;
        self.token = None;
        self.network_failures = 0;
        self.set_status(SessionStatus::Unauthenticated);
        Ok(())
    }

    fn supersede(&mut self) {
        self.generation += 1;
        if let Some(handle) = self.in_flight.take() {
            handle.abort();
        }
    }

    fn start_check(&mut self, token: String) {
        self.supersede();
        let generation = self.generation;
        self.token = Some(token.clone());
        self.set_status(SessionStatus::Checking);

        let validator = Arc::clone(&self.validator);
        let tx = self.report_tx.clone();
        self.in_flight = Some(tokio::spawn(async move {
            let validation = validator.validate(&token).await;
            let _ = tx.send(ValidationReport { generation, validation }).await;
        }));
    }

    fn set_status(&mut self, status: SessionStatus) {
        if self.status != status {
            debug!(from = ?self.status, to = ?status, generation = self.generation, "Session transition");
        }
        self.status = status;
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        if let Some(handle) = self.in_flight.take() {
            handle.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::store::{MemoryCredentialStore, StoredCredentials};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Fixed {
        validation: Validation,
        calls: AtomicUsize,
    }

    impl Fixed {
        fn new(validation: Validation) -> Arc<Self> {
            Arc::new(Self {
                validation,
                calls: AtomicUsize::new(0),
            })
        }
    }

    #[async_trait]
    impl TokenValidator for Fixed {
        async fn validate(&self, _token: &str) -> Validation {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.validation
        }
    }

    fn session(store: &Arc<MemoryCredentialStore>, v: &Arc<Fixed>) -> Session {
        Session::new(store.clone(), v.clone())
    }

    #[tokio::test]
    async fn test_boot_without_token_skips_network() {
        let store = Arc::new(MemoryCredentialStore::new());
        let v = Fixed::new(Validation::Valid);
        let mut s = session(&store, &v);
        assert_eq!(s.status(), SessionStatus::Booting);

        assert_eq!(s.boot().unwrap(), SessionStatus::Unauthenticated);
        assert_eq!(s.settle().await.unwrap(), SessionStatus::Unauthenticated);
        assert_eq!(v.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_boot_valid_token() {
        let store = Arc::new(MemoryCredentialStore::with_token("t1"));
        let v = Fixed::new(Validation::Valid);
        let mut s = session(&store, &v);

        assert_eq!(s.boot().unwrap(), SessionStatus::Checking);
        assert_eq!(s.token(), Some("t1"));
        assert_eq!(s.settle().await.unwrap(), SessionStatus::Authenticated);
        assert!(s.is_valid());
        assert_eq!(v.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_invalid_token_clears_store() {
        let store = Arc::new(MemoryCredentialStore::with_token("t1"));
        store.write_route("/appointment").unwrap();
        let v = Fixed::new(Validation::Invalid);
        let mut s = session(&store, &v);

        s.boot().unwrap();
        assert_eq!(s.settle().await.unwrap(), SessionStatus::Unauthenticated);
        assert_eq!(s.token(), None);
        assert_eq!(store.snapshot(), StoredCredentials::default());
    }

    #[tokio::test]
    async fn test_network_error_keeps_token_and_counts() {
        let store = Arc::new(MemoryCredentialStore::with_token("t1"));
        let v = Fixed::new(Validation::NetworkError);
        let mut s = session(&store, &v);

        s.boot().unwrap();
        assert_eq!(s.settle().await.unwrap(), SessionStatus::DegradedError);
        assert!(s.has_network_error());
        assert_eq!(s.network_failures(), 1);
        assert_eq!(store.read_token().unwrap().as_deref(), Some("t1"));

        // Repeated failures never log the user out
        for expected in 2..=4 {
            assert!(s.retry());
            assert_eq!(s.settle().await.unwrap(), SessionStatus::DegradedError);
            assert_eq!(s.network_failures(), expected);
        }
        assert_eq!(store.read_token().unwrap().as_deref(), Some("t1"));
    }

    #[tokio::test]
    async fn test_retry_only_from_degraded() {
        let store = Arc::new(MemoryCredentialStore::with_token("t1"));
        let v = Fixed::new(Validation::Valid);
        let mut s = session(&store, &v);
        s.boot().unwrap();
        s.settle().await.unwrap();
        assert!(!s.retry());
        assert_eq!(v.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_stale_report_is_ignored() {
        let store = Arc::new(MemoryCredentialStore::new());
        let v = Fixed::new(Validation::Valid);
        let mut s = session(&store, &v);
        s.boot().unwrap();

        s.login("t1".into()).unwrap();
        let stale = s.generation();
        s.login("t2".into()).unwrap();

        let applied = s
            .apply(ValidationReport {
                generation: stale,
                validation: Validation::Invalid,
            })
            .unwrap();
        assert!(!applied);
        assert!(s.is_checking());
        assert_eq!(store.read_token().unwrap().as_deref(), Some("t2"));
    }

    #[tokio::test]
    async fn test_logout_is_idempotent() {
        let store = Arc::new(MemoryCredentialStore::with_token("t1"));
        store.write_route("/patient").unwrap();
        let v = Fixed::new(Validation::Valid);
        let mut s = session(&store, &v);
        s.boot().unwrap();
        s.settle().await.unwrap();

        s.logout().unwrap();
        let once = (s.status(), s.token().map(str::to_string), store.snapshot());
        s.logout().unwrap();
        let twice = (s.status(), s.token().map(str::to_string), store.snapshot());

        assert_eq!(once, twice);
        assert_eq!(once.0, SessionStatus::Unauthenticated);
        assert_eq!(once.2, StoredCredentials::default());
    }

    #[tokio::test]
    async fn test_expire_clears_like_invalid() {
        let store = Arc::new(MemoryCredentialStore::with_token("t1"));
        let v = Fixed::new(Validation::Valid);
        let mut s = session(&store, &v);
        s.boot().unwrap();
        s.settle().await.unwrap();

        s.expire().unwrap();
        assert_eq!(s.status(), SessionStatus::Unauthenticated);
        assert_eq!(store.read_token().unwrap(), None);
    }

    #[tokio::test]
    async fn test_rejection_under_old_token_is_ignored() {
        let store = Arc::new(MemoryCredentialStore::with_token("old"));
        let v = Fixed::new(Validation::Valid);
        let mut s = session(&store, &v);
        s.boot().unwrap();
        s.settle().await.unwrap();
        let old_generation = s.generation();

        s.login("new".into()).unwrap();
        s.settle().await.unwrap();
        assert_eq!(s.status(), SessionStatus::Authenticated);

        assert!(!s.expire_from(old_generation).unwrap());
        assert_eq!(s.status(), SessionStatus::Authenticated);
        assert_eq!(store.read_token().unwrap().as_deref(), Some("new"));

        let current = s.generation();
        assert!(s.expire_from(current).unwrap());
        assert_eq!(s.status(), SessionStatus::Unauthenticated);
        assert_eq!(store.read_token().unwrap(), None);
    }

    #[tokio::test]
    async fn test_shutdown_suppresses_late_result() {
        let store = Arc::new(MemoryCredentialStore::with_token("t1"));
        let v = Fixed::new(Validation::Invalid);
        let mut s = session(&store, &v);
        s.boot().unwrap();
        let generation = s.generation();
        s.shutdown();

        let applied = s
            .apply(ValidationReport {
                generation,
                validation: Validation::Invalid,
            })
            .unwrap();
        assert!(!applied);
        assert_eq!(store.read_token().unwrap().as_deref(), Some("t1"));
    }

    #[test]
    fn test_status_helpers() {
        assert!(SessionStatus::Booting.is_pending());
        assert!(SessionStatus::Checking.is_pending());
        assert!(!SessionStatus::DegradedError.is_pending());
        assert_eq!(SessionStatus::DegradedError.label(), "server unreachable");
    }
}
