//! Route guarding: what a protected screen shows for a given session status.

use std::sync::Arc;

use anyhow::Result;
use tracing::debug;

use super::session::SessionStatus;
use super::store::CredentialStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Route {
    Login,
    Patients,
    Appointments,
}

impl Route {
    /// Where a user lands after login when nothing was remembered
    pub const DEFAULT_LANDING: Route = Route::Patients;

    pub fn path(&self) -> &'static str {
        match self {
            Route::Login => "/login",
            Route::Patients => "/patient",
            Route::Appointments => "/appointment",
        }
    }

    pub fn from_path(path: &str) -> Option<Self> {
        match path.trim_end_matches('/') {
            "/login" => Some(Route::Login),
            "/patient" => Some(Route::Patients),
            "/appointment" => Some(Route::Appointments),
            _ => None,
        }
    }

    /// Catch-all: unknown paths go to the landing page when signed in,
    /// to login otherwise.
    pub fn resolve(path: &str, authenticated: bool) -> Self {
        match Self::from_path(path) {
            Some(route) => route,
            None if authenticated => Self::DEFAULT_LANDING,
            None => Route::Login,
        }
    }

    pub fn is_protected(&self) -> bool {
        !matches!(self, Route::Login)
    }

    pub fn title(&self) -> &'static str {
        match self {
            Route::Login => "Login",
            Route::Patients => "Patients",
            Route::Appointments => "Appointments",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GuardDecision {
    /// Neutral placeholder; no redirect yet.
    Loading,
    /// Show the protected content.
    Render,
    /// Go to login; `remembered` is where to return afterwards.
    RedirectToLogin { remembered: Route },
    /// Server unreachable: error placeholder, credential kept.
    Degraded,
}

pub struct RouteGuard {
    store: Arc<dyn CredentialStore>,
}

impl RouteGuard {
    pub fn new(store: Arc<dyn CredentialStore>) -> Self {
        Self { store }
    }

    /// Decide what `intended` shows under `status`. A redirect persists the
    /// intended route so login can return there.
    pub fn check(&self, status: SessionStatus, intended: Route) -> Result<GuardDecision> {
        if !intended.is_protected() {
            return Ok(GuardDecision::Render);
        }

        let decision = match status {
            SessionStatus::Booting | SessionStatus::Checking => GuardDecision::Loading,
            SessionStatus::Authenticated => GuardDecision::Render,
            SessionStatus::DegradedError => GuardDecision::Degraded,
            SessionStatus::Unauthenticated => {
                self.store.write_route(intended.path())?;
                debug!(route = intended.path(), "Redirecting to login");
                GuardDecision::RedirectToLogin {
                    remembered: intended,
                }
            }
        };
        Ok(decision)
    }

    pub fn remembered(&self) -> Result<Option<Route>> {
        Ok(self
            .store
            .read_route()?
            .as_deref()
            .and_then(Route::from_path)
            .filter(Route::is_protected))
    }

    /// Where to go after a successful login. Consumes the remembered route.
    pub fn landing(&self) -> Result<Route> {
        let route = self.remembered()?.unwrap_or(Route::DEFAULT_LANDING);
        self.store.clear_route()?;
        Ok(route)
    }

    /// An authenticated user sitting on the login screen is sent on.
    pub fn at_login(&self, status: SessionStatus) -> Result<Option<Route>> {
        if status == SessionStatus::Authenticated {
            Ok(Some(self.landing()?))
        } else {
            Ok(None)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::store::MemoryCredentialStore;

    fn guard() -> (Arc<MemoryCredentialStore>, RouteGuard) {
        let store = Arc::new(MemoryCredentialStore::new());
        (store.clone(), RouteGuard::new(store))
    }

    #[test]
    fn test_route_paths() {
        for route in [Route::Login, Route::Patients, Route::Appointments] {
            assert_eq!(Route::from_path(route.path()), Some(route));
        }
        assert_eq!(Route::from_path("/patient/"), Some(Route::Patients));
        assert_eq!(Route::from_path("/billing"), None);
    }

    #[test]
    fn test_resolve_catch_all() {
        assert_eq!(Route::resolve("/nowhere", true), Route::Patients);
        assert_eq!(Route::resolve("/nowhere", false), Route::Login);
        assert_eq!(Route::resolve("/appointment", false), Route::Appointments);
    }

    #[test]
    fn test_decisions_per_status() {
        let (store, guard) = guard();
        let intended = Route::Appointments;

        assert_eq!(guard.check(SessionStatus::Booting, intended).unwrap(), GuardDecision::Loading);
        assert_eq!(guard.check(SessionStatus::Checking, intended).unwrap(), GuardDecision::Loading);
        assert_eq!(guard.check(SessionStatus::Authenticated, intended).unwrap(), GuardDecision::Render);
        assert_eq!(guard.check(SessionStatus::DegradedError, intended).unwrap(), GuardDecision::Degraded);
        // None of the above remember anything
        assert_eq!(store.read_route().unwrap(), None);

        assert_eq!(
            guard.check(SessionStatus::Unauthenticated, intended).unwrap(),
            GuardDecision::RedirectToLogin {
                remembered: Route::Appointments
            }
        );
        assert_eq!(store.read_route().unwrap().as_deref(), Some("/appointment"));
    }

    #[test]
    fn test_login_route_is_public() {
        let (store, guard) = guard();
        assert_eq!(
            guard.check(SessionStatus::Unauthenticated, Route::Login).unwrap(),
            GuardDecision::Render
        );
        assert_eq!(store.read_route().unwrap(), None);
    }

    #[test]
    fn test_degraded_keeps_remembered_route() {
        let (store, guard) = guard();
        store.write_route("/appointment").unwrap();
        guard.check(SessionStatus::DegradedError, Route::Patients).unwrap();
        assert_eq!(guard.remembered().unwrap(), Some(Route::Appointments));
    }

    #[test]
    fn test_landing_consumes_remembered_route() {
        let (store, guard) = guard();
        store.write_route("/appointment").unwrap();
        assert_eq!(guard.landing().unwrap(), Route::Appointments);
        assert_eq!(store.read_route().unwrap(), None);
        assert_eq!(guard.landing().unwrap(), Route::DEFAULT_LANDING);
    }

    #[test]
    fn test_landing_ignores_garbage_and_login() {
        let (store, guard) = guard();
        store.write_route("/login").unwrap();
        assert_eq!(guard.landing().unwrap(), Route::Patients);
        store.write_route("???").unwrap();
        assert_eq!(guard.landing().unwrap(), Route::Patients);
    }

    #[test]
    fn test_at_login_only_when_authenticated() {
        let (store, guard) = guard();
        store.write_route("/appointment").unwrap();
        assert_eq!(guard.at_login(SessionStatus::Checking).unwrap(), None);
        assert_eq!(
            guard.at_login(SessionStatus::Authenticated).unwrap(),
            Some(Route::Appointments)
        );
    }
}
