//! Session issuing and reading.
//!
//! A session lives entirely in a signed, HttpOnly cookie: an HS256 JWT whose
//! claims carry the subject, a random session id, and the upstream token
//! pair sealed with [`TokenSealer`]. There is no server-side session store.

use axum::{
    extract::FromRequestParts,
    http::{
        header::{LOCATION, SET_COOKIE},
        request::Parts,
        HeaderMap, HeaderValue, StatusCode,
    },
    response::{IntoResponse, Response},
};
use chrono::{DateTime, Duration, TimeZone, Utc};
use jsonwebtoken::{decode, encode, errors::ErrorKind, DecodingKey, EncodingKey, Header, Validation};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use shelf_client_sdk::ProductApi;
use shelf_protocol::{Credentials, TokenPair};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, warn};

use crate::crypto::{SealError, TokenSealer};
use crate::AppState;

pub const SESSION_COOKIE: &str = "shelf_session";
pub const CSRF_COOKIE: &str = "shelf_csrf";
pub const CSRF_HEADER: &str = "x-csrf-token";

pub const INVALID_CREDENTIALS: &str = "Invalid credentials, please try again!";

/// Upper bound for a session lifetime: one year.
pub const MAX_SESSION_TTL_SECS: i64 = 366 * 24 * 60 * 60;

// ── COOKIES ─────────────────────────────────────────────────────

pub fn get_cookie_value(headers: &HeaderMap, name: &str) -> Option<String> {
    for header in headers.get_all("cookie") {
        let Ok(raw) = header.to_str() else {
            continue;
        };
        for pair in raw.split(';') {
            let mut parts = pair.trim().splitn(2, '=');
            let key = parts.next().unwrap_or_default().trim();
            let value = parts.next().unwrap_or_default().trim();
            if key == name && !value.is_empty() {
                return Some(value.to_string());
            }
        }
    }
    None
}

pub fn build_cookie(
    name: &str,
    value: &str,
    max_age_secs: i64,
    secure: bool,
    http_only: bool,
) -> String {
    let mut cookie = format!("{name}={value}; Path=/; Max-Age={max_age_secs}; SameSite=Strict");
    if secure {
        cookie.push_str("; Secure");
    }
    if http_only {
        cookie.push_str("; HttpOnly");
    }
    cookie
}

pub fn clear_cookie(name: &str, secure: bool, http_only: bool) -> String {
    build_cookie(name, "", 0, secure, http_only)
}

pub fn generate_csrf_token() -> String {
    let mut bytes = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut bytes);
    hex::encode(bytes)
}

fn generate_session_id() -> String {
    let mut bytes = [0u8; 16];
    rand::thread_rng().fill_bytes(&mut bytes);
    hex::encode(bytes)
}

/// `Set-Cookie` headers for a freshly issued session plus its CSRF token.
pub fn session_cookies(
    encoded: &str,
    csrf_token: &str,
    max_age_secs: i64,
    secure: bool,
) -> HeaderMap {
    let mut headers = HeaderMap::new();
    let auth_cookie = build_cookie(SESSION_COOKIE, encoded, max_age_secs, secure, true);
    let csrf_cookie = build_cookie(CSRF_COOKIE, csrf_token, max_age_secs, secure, false);
    if let Ok(v) = HeaderValue::from_str(&auth_cookie) {
        headers.append(SET_COOKIE, v);
    }
    if let Ok(v) = HeaderValue::from_str(&csrf_cookie) {
        headers.append(SET_COOKIE, v);
    }
    headers
}

pub fn cleared_cookies(secure: bool) -> HeaderMap {
    let mut headers = HeaderMap::new();
    if let Ok(v) = HeaderValue::from_str(&clear_cookie(SESSION_COOKIE, secure, true)) {
        headers.append(SET_COOKIE, v);
    }
    if let Ok(v) = HeaderValue::from_str(&clear_cookie(CSRF_COOKIE, secure, false)) {
        headers.append(SET_COOKIE, v);
    }
    headers
}

// ── SESSION ─────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct Session {
    pub session_id: String,
    pub subject_id: String,
    pub tokens: TokenPair,
    pub expiry: DateTime<Utc>,
}

impl Session {
    pub fn access_token(&self) -> &str {
        &self.tokens.access_token
    }

    /// A session counts as authenticated only with a non-empty access token
    /// and an expiry in the future.
    pub fn is_authenticated(&self, now: DateTime<Utc>) -> bool {
        self.tokens.has_access_token() && self.expiry > now
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct SessionClaims {
    sub: String,
    sid: String,
    at: String,
    rt: String,
    iat: i64,
    exp: usize,
}

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("session expired")]
    Expired,
    #[error("session signature or format invalid: {0}")]
    Invalid(String),
    #[error("session tokens could not be unsealed: {0}")]
    Seal(#[from] SealError),
    #[error("session carries no access token")]
    MissingAccessToken,
}

pub struct SessionCodec {
    encoding: EncodingKey,
    decoding: DecodingKey,
    validation: Validation,
    sealer: TokenSealer,
    ttl: Duration,
}

impl SessionCodec {
    /// `ttl_secs` is clamped to `1..=MAX_SESSION_TTL_SECS`.
    pub fn new(secret: &str, ttl_secs: i64) -> Self {
        let mut validation = Validation::default();
        validation.leeway = 0;
        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            validation,
            sealer: TokenSealer::new(secret),
            ttl: Duration::seconds(ttl_secs.clamp(1, MAX_SESSION_TTL_SECS)),
        }
    }

    pub fn ttl_secs(&self) -> i64 {
        self.ttl.num_seconds()
    }

    pub fn issue(&self, subject_id: &str, tokens: TokenPair) -> Session {
        self.issue_at(subject_id, tokens, generate_session_id(), Utc::now())
    }

    /// Issues a session for an existing session id, e.g. after a token refresh.
    pub fn reissue(&self, previous: &Session, tokens: TokenPair) -> Session {
        self.issue_at(&previous.subject_id, tokens, previous.session_id.clone(), Utc::now())
    }

    fn issue_at(
        &self,
        subject_id: &str,
        tokens: TokenPair,
        session_id: String,
        now: DateTime<Utc>,
    ) -> Session {
        Session {
            session_id,
            subject_id: subject_id.to_string(),
            tokens,
            expiry: now + self.ttl,
        }
    }

    pub fn encode(&self, session: &Session) -> Result<String, SessionError> {
        let claims = SessionClaims {
            sub: session.subject_id.clone(),
            sid: session.session_id.clone(),
            at: self.sealer.seal(&session.tokens.access_token)?,
            rt: self.sealer.seal(&session.tokens.refresh_token)?,
            iat: Utc::now().timestamp(),
            exp: session.expiry.timestamp().max(0) as usize,
        };
        encode(&Header::default(), &claims, &self.encoding)
            .map_err(|e| SessionError::Invalid(e.to_string()))
    }

    pub fn decode(&self, token: &str) -> Result<Session, SessionError> {
        let data = decode::<SessionClaims>(token, &self.decoding, &self.validation).map_err(
            |e| match e.kind() {
                ErrorKind::ExpiredSignature => SessionError::Expired,
                _ => SessionError::Invalid(e.to_string()),
            },
        )?;
        let claims = data.claims;

        let tokens = TokenPair {
            access_token: self.sealer.unseal(&claims.at)?,
            refresh_token: self.sealer.unseal(&claims.rt)?,
        };
        if !tokens.has_access_token() {
            return Err(SessionError::MissingAccessToken);
        }

        let expiry = Utc
            .timestamp_opt(claims.exp as i64, 0)
            .single()
            .ok_or_else(|| SessionError::Invalid("exp out of range".to_string()))?;

        Ok(Session {
            session_id: claims.sid,
            subject_id: claims.sub,
            tokens,
            expiry,
        })
    }
}

// ── ISSUER ──────────────────────────────────────────────────────

/// The only failure a login caller ever sees. The actual cause is logged.
#[derive(Debug, Error, PartialEq, Eq)]
#[error("Invalid credentials, please try again!")]
pub struct AuthFailure;

/// Exchanges credentials for a token pair and wraps it into a session whose
/// subject is the email. Network errors, non-2xx answers and a missing access
/// token all collapse into [`AuthFailure`].
pub async fn authenticate(
    api: &dyn ProductApi,
    codec: &SessionCodec,
    credentials: &Credentials,
) -> Result<Session, AuthFailure> {
    match api.login(credentials).await {
        Ok(tokens) if tokens.has_access_token() => {
            debug!("Upstream login accepted for {}", credentials.email);
            Ok(codec.issue(&credentials.email, tokens))
        }
        Ok(_) => {
            warn!("Upstream login for {} returned no access token", credentials.email);
            Err(AuthFailure)
        }
        Err(e) => {
            warn!("Upstream login for {} failed: {}", credentials.email, e);
            Err(AuthFailure)
        }
    }
}

// ── REQUEST CONTEXT ─────────────────────────────────────────────

/// Validated session for the current request. Every dashboard handler takes
/// this instead of reading the cookie itself.
#[derive(Debug, Clone)]
pub struct SessionContext {
    pub session: Session,
    csrf_cookie: Option<String>,
    csrf_header: Option<String>,
}

impl SessionContext {
    /// True when the request echoes the CSRF cookie in the `x-csrf-token` header.
    pub fn csrf_ok(&self) -> bool {
        match (&self.csrf_cookie, &self.csrf_header) {
            (Some(cookie), Some(header)) => !cookie.is_empty() && cookie == header,
            _ => false,
        }
    }
}

/// Rejection for a missing, tampered or expired session: back to the login
/// page with the stale cookies cleared.
pub struct SessionRejection {
    login_path: String,
    secure: bool,
}

impl IntoResponse for SessionRejection {
    fn into_response(self) -> Response {
        let mut headers = cleared_cookies(self.secure);
        if let Ok(v) = HeaderValue::from_str(&self.login_path) {
            headers.insert(LOCATION, v);
        }
        (StatusCode::SEE_OTHER, headers).into_response()
    }
}

#[axum::async_trait]
impl FromRequestParts<Arc<AppState>> for SessionContext {
    type Rejection = SessionRejection;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let reject = || SessionRejection {
            login_path: state.guard.login_path.clone(),
            secure: state.config.cookie_secure,
        };

        let raw = get_cookie_value(&parts.headers, SESSION_COOKIE).ok_or_else(reject)?;
        let session = state.sessions.decode(&raw).map_err(|e| {
            warn!("Rejected session cookie: {}", e);
            reject()
        })?;
        if !session.is_authenticated(Utc::now()) {
            return Err(reject());
        }

        let csrf_header = parts
            .headers
            .get(CSRF_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);

        Ok(SessionContext {
            session,
            csrf_cookie: get_cookie_value(&parts.headers, CSRF_COOKIE),
            csrf_header,
        })
    }
}
