use axum::{
    extract::State,
    http::{header::LOCATION, HeaderMap, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use shelf_client_sdk::Notification;
use std::sync::Arc;
use tracing::{info, warn};

use crate::form::{LoginForm, MAX_PASSWORD_LEN, MIN_PASSWORD_LEN};
use crate::models::{FormPhase, LoginPage, LoginResponse};
use crate::session::{
    authenticate, cleared_cookies, generate_csrf_token, get_cookie_value, session_cookies, Session,
    SessionContext, INVALID_CREDENTIALS, SESSION_COOKIE,
};
use crate::AppState;

fn with_location(mut headers: HeaderMap, target: &str) -> HeaderMap {
    if let Ok(v) = HeaderValue::from_str(target) {
        headers.insert(LOCATION, v);
    }
    headers
}

/// Encodes `session` and builds the cookie headers, or a 500 when the
/// session cannot be sealed.
fn issue_cookies(
    state: &AppState,
    session: &Session,
    csrf_token: &str,
) -> Result<HeaderMap, Response> {
    let encoded = state.sessions.encode(session).map_err(|e| {
        warn!("Could not encode session for {}: {}", session.subject_id, e);
        let body = Json(serde_json::json!({ "error": "Session error" }));
        (StatusCode::INTERNAL_SERVER_ERROR, body).into_response()
    })?;
    Ok(session_cookies(
        &encoded,
        csrf_token,
        state.sessions.ttl_secs(),
        state.config.cookie_secure,
    ))
}

pub async fn landing(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(serde_json::json!({
        "service": "shelf-gateway",
        "login": state.guard.login_path,
    }))
}

pub async fn login_page(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(LoginPage {
        phase: FormPhase::Idle,
        action: state.guard.login_path.clone(),
        fields: ["email", "password"],
        min_password_len: MIN_PASSWORD_LEN,
        max_password_len: MAX_PASSWORD_LEN,
    })
}

pub async fn login(
    State(state): State<Arc<AppState>>,
    Json(form): Json<LoginForm>,
) -> Response {
    let credentials = match form.validate() {
        Ok(credentials) => credentials,
        Err(errors) => {
            let body = Json(LoginResponse::invalid(errors));
            return (StatusCode::UNPROCESSABLE_ENTITY, body).into_response();
        }
    };

    info!("Login attempt for {}", credentials.email);

    let session = match authenticate(state.api.as_ref(), &state.sessions, &credentials).await {
        Ok(session) => session,
        Err(_) => {
            return (
                StatusCode::UNAUTHORIZED,
                Json(LoginResponse::failed(Notification::error(INVALID_CREDENTIALS))),
            )
                .into_response();
        }
    };

    let csrf_token = generate_csrf_token();
    let headers = match issue_cookies(&state, &session, &csrf_token) {
        Ok(headers) => headers,
        Err(response) => return response,
    };
    let dashboard = state.guard.dashboard_path.clone();
    let body = LoginResponse::succeeded(session.subject_id, dashboard.clone(), csrf_token);

    (StatusCode::SEE_OTHER, with_location(headers, &dashboard), Json(body)).into_response()
}

/// Exchanges the session's refresh token for a new pair and re-issues the
/// cookie under the same session id.
pub async fn refresh(State(state): State<Arc<AppState>>, ctx: SessionContext) -> Response {
    if !ctx.csrf_ok() {
        let body = Json(serde_json::json!({ "error": "CSRF token missing or invalid" }));
        return (StatusCode::FORBIDDEN, body).into_response();
    }

    let tokens = match state.api.refresh(&ctx.session.tokens.refresh_token).await {
        Ok(tokens) => tokens,
        Err(e) => {
            warn!("Token refresh for {} failed: {}", ctx.session.subject_id, e);
            let toast = Notification::error("Session could not be refreshed");
            let body = Json(serde_json::json!({ "toasts": [toast] }));
            return (StatusCode::UNAUTHORIZED, body).into_response();
        }
    };

    let session = state.sessions.reissue(&ctx.session, tokens);
    let csrf_token = generate_csrf_token();
    let headers = match issue_cookies(&state, &session, &csrf_token) {
        Ok(headers) => headers,
        Err(response) => return response,
    };

    info!("Refreshed session for {}", session.subject_id);
    (
        StatusCode::OK,
        headers,
        Json(serde_json::json!({
            "refreshed": true,
            "expires_at": session.expiry.to_rfc3339(),
            "csrf_token": csrf_token,
        })),
    )
        .into_response()
}

/// Clears both cookies and drops the session's table. A cookie that no
/// longer decodes is still cleared.
pub async fn logout(State(state): State<Arc<AppState>>, headers: HeaderMap) -> Response {
    if let Some(raw) = get_cookie_value(&headers, SESSION_COOKIE) {
        if let Ok(session) = state.sessions.decode(&raw) {
            state.tables.discard(&session.session_id).await;
            info!("Logged out {}", session.subject_id);
        }
    }

    let cleared = cleared_cookies(state.config.cookie_secure);
    let headers = with_location(cleared, &state.guard.login_path);
    (StatusCode::SEE_OTHER, headers).into_response()
}
