//! Navigation guard. Runs on every request and only looks at whether the
//! session cookie is present; signature and expiry are checked later by the
//! [`SessionContext`](crate::session::SessionContext) extractor.

use axum::{
    extract::{Request, State},
    http::{header::LOCATION, HeaderValue, Method, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};
use std::sync::Arc;
use tracing::debug;

use crate::session::{get_cookie_value, SESSION_COOKIE};
use crate::AppState;

#[derive(Debug, Clone)]
pub struct GuardConfig {
    pub login_path: String,
    pub dashboard_path: String,
    /// Exact paths an authenticated user is sent away from. Only page loads
    /// (`GET`/`HEAD`) are redirected, so a login form post always reaches its
    /// handler even when a stale cookie is still around.
    pub public_only: Vec<String>,
    /// Path prefixes that need a session cookie.
    pub protected: Vec<String>,
}

impl Default for GuardConfig {
    fn default() -> Self {
        Self {
            login_path: "/auth/login".to_string(),
            dashboard_path: "/dashboard".to_string(),
            public_only: vec!["/".to_string(), "/auth/login".to_string()],
            protected: vec!["/dashboard".to_string()],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GuardDecision {
    Pass,
    Redirect(String),
}

impl GuardConfig {
    fn is_protected(&self, path: &str) -> bool {
        self.protected.iter().any(|prefix| {
            path == prefix
                || path
                    .strip_prefix(prefix.as_str())
                    .is_some_and(|rest| rest.starts_with('/'))
        })
    }

    pub fn decide(&self, method: &Method, path: &str, has_session_cookie: bool) -> GuardDecision {
        let navigation = *method == Method::GET || *method == Method::HEAD;
        if has_session_cookie && navigation && self.public_only.iter().any(|p| p == path) {
            return GuardDecision::Redirect(self.dashboard_path.clone());
        }
        if !has_session_cookie && self.is_protected(path) {
            return GuardDecision::Redirect(self.login_path.clone());
        }
        GuardDecision::Pass
    }
}

pub async fn route_guard(
    State(state): State<Arc<AppState>>,
    request: Request,
    next: Next,
) -> Response {
    let path = request.uri().path().to_string();
    let has_cookie = get_cookie_value(request.headers(), SESSION_COOKIE).is_some();

    match state.guard.decide(request.method(), &path, has_cookie) {
        GuardDecision::Pass => next.run(request).await,
        GuardDecision::Redirect(target) => {
            debug!("Guard redirect {} -> {}", path, target);
            match HeaderValue::from_str(&target) {
                Ok(location) => (StatusCode::SEE_OTHER, [(LOCATION, location)]).into_response(),
                Err(_) => StatusCode::INTERNAL_SERVER_ERROR.into_response(),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn to(target: &str) -> GuardDecision {
        GuardDecision::Redirect(target.to_string())
    }

    #[test]
    fn signed_in_users_leave_public_only_pages() {
        let guard = GuardConfig::default();
        assert_eq!(guard.decide(&Method::GET, "/", true), to("/dashboard"));
        assert_eq!(guard.decide(&Method::GET, "/auth/login", true), to("/dashboard"));
    }

    #[test]
    fn anonymous_users_leave_protected_pages() {
        let guard = GuardConfig::default();
        assert_eq!(guard.decide(&Method::GET, "/dashboard", false), to("/auth/login"));
        assert_eq!(
            guard.decide(&Method::GET, "/dashboard/products/3", false),
            to("/auth/login")
        );
    }

    #[test]
    fn everything_else_passes() {
        let guard = GuardConfig::default();
        let get = Method::GET;
        assert_eq!(guard.decide(&get, "/", false), GuardDecision::Pass);
        assert_eq!(guard.decide(&get, "/auth/login", false), GuardDecision::Pass);
        assert_eq!(guard.decide(&get, "/dashboard", true), GuardDecision::Pass);
        assert_eq!(guard.decide(&get, "/readyz", false), GuardDecision::Pass);
        assert_eq!(guard.decide(&get, "/dashboards", false), GuardDecision::Pass);
        assert_eq!(guard.decide(&get, "/auth/logout", true), GuardDecision::Pass);
    }

    #[test]
    fn form_posts_are_never_bounced_off_public_pages() {
        let guard = GuardConfig::default();
        assert_eq!(guard.decide(&Method::POST, "/auth/login", true), GuardDecision::Pass);
        assert_eq!(guard.decide(&Method::HEAD, "/auth/login", true), to("/dashboard"));
        assert_eq!(
            guard.decide(&Method::DELETE, "/dashboard/products/1", false),
            to("/auth/login")
        );
    }
}
