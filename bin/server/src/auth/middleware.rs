//! The access gate middleware and extractors for Axum.
//!
//! [`AccessGate`] verifies the caller's session token, puts the resulting
//! [`Identity`] in the request extensions, and hands unauthenticated
//! requests to a pluggable [`RejectionStrategy`].

use axum::{
    extract::{FromRequestParts, Request, State},
    http::{HeaderMap, Method, header::AUTHORIZATION, request::Parts},
    middleware::Next,
    response::{IntoResponse, Redirect, Response},
};
use axum_extra::extract::CookieJar;
use skygate_platform_access::{Identity, TokenIssuer};
use std::sync::Arc;
use subtle::ConstantTimeEq;

use super::{CSRF_HEADER, SESSION_COOKIE};
use crate::error::AuthError;

/// Why the gate turned a request away.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateRejection {
    /// No session token, or one that failed verification.
    Unauthenticated,
    /// A cookie-authenticated unsafe request without the session's CSRF token.
    CsrfMismatch,
}

/// Decides what an unauthenticated caller receives.
pub trait RejectionStrategy: Clone + Send + Sync + 'static {
    fn reject(&self, rejection: GateRejection) -> Response;
}

/// Answers with a status code: 401, or 400 for a CSRF mismatch.
#[derive(Debug, Clone, Copy, Default)]
pub struct UnauthorizedRejector;

impl RejectionStrategy for UnauthorizedRejector {
    fn reject(&self, rejection: GateRejection) -> Response {
        match rejection {
            GateRejection::Unauthenticated => AuthError::Unauthenticated.into_response(),
            GateRejection::CsrfMismatch => AuthError::CsrfMismatch.into_response(),
        }
    }
}

/// Sends unauthenticated browsers to the login page.
#[derive(Debug, Clone)]
pub struct RedirectRejector {
    login_path: String,
}

impl RedirectRejector {
    #[must_use]
    pub fn new(login_path: impl Into<String>) -> Self {
        Self {
            login_path: login_path.into(),
        }
    }
}

impl RejectionStrategy for RedirectRejector {
    fn reject(&self, rejection: GateRejection) -> Response {
        match rejection {
            GateRejection::Unauthenticated => Redirect::to(&self.login_path).into_response(),
            GateRejection::CsrfMismatch => AuthError::CsrfMismatch.into_response(),
        }
    }
}

/// Whether the gate rejects unauthenticated callers or lets them through.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateMode {
    /// Unauthenticated requests are rejected.
    Required,
    /// Unauthenticated requests continue with an anonymous identity.
    Optional,
}

/// Where the session token came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TokenSource {
    Bearer,
    Cookie,
}

/// Verifies session tokens in front of protected routes.
///
/// Install with `axum::middleware::from_fn_with_state(gate, access_gate::<R>)`.
#[derive(Clone)]
pub struct AccessGate<R> {
    issuer: Arc<TokenIssuer>,
    rejector: R,
    mode: GateMode,
}

impl<R: RejectionStrategy> AccessGate<R> {
    /// A gate that rejects unauthenticated requests.
    pub fn required(issuer: Arc<TokenIssuer>, rejector: R) -> Self {
        Self {
            issuer,
            rejector,
            mode: GateMode::Required,
        }
    }

    /// A gate that lets unauthenticated requests through as anonymous.
    pub fn optional(issuer: Arc<TokenIssuer>, rejector: R) -> Self {
        Self {
            issuer,
            rejector,
            mode: GateMode::Optional,
        }
    }

    #[must_use]
    pub fn mode(&self) -> GateMode {
        self.mode
    }

    /// Determines the caller's identity from the request headers.
    fn authenticate(&self, method: &Method, headers: &HeaderMap) -> Result<Identity, GateRejection> {
        let Some((token, source)) = session_token(headers) else {
            return self.unauthenticated();
        };

        let identity = match self.issuer.verify_session(&token) {
            Ok(identity) => identity,
            Err(e) => {
                tracing::debug!(error = %e, "session token rejected");
                return self.unauthenticated();
            }
        };

        if source == TokenSource::Cookie && !is_safe_method(method) {
            let presented = headers
                .get(CSRF_HEADER)
                .and_then(|v| v.to_str().ok())
                .unwrap_or_default();
            let expected = identity.csrf_token();
            if expected.is_empty() || !bool::from(presented.as_bytes().ct_eq(expected.as_bytes())) {
                tracing::warn!(user = identity.user_name(), "csrf token mismatch");
                return Err(GateRejection::CsrfMismatch);
            }
        }

        Ok(identity)
    }

    fn unauthenticated(&self) -> Result<Identity, GateRejection> {
        match self.mode {
            GateMode::Required => Err(GateRejection::Unauthenticated),
            GateMode::Optional => Ok(Identity::anonymous()),
        }
    }
}

/// Reads the session token: the bearer header first, then the session cookie.
fn session_token(headers: &HeaderMap) -> Option<(String, TokenSource)> {
    let bearer = headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| {
            let (scheme, token) = v.split_once(' ')?;
            scheme.eq_ignore_ascii_case("bearer").then(|| token.trim())
        })
        .filter(|token| !token.is_empty());
    if let Some(token) = bearer {
        return Some((token.to_string(), TokenSource::Bearer));
    }

    CookieJar::from_headers(headers)
        .get(SESSION_COOKIE)
        .map(|c| c.value().to_string())
        .filter(|token| !token.is_empty())
        .map(|token| (token, TokenSource::Cookie))
}

fn is_safe_method(method: &Method) -> bool {
    matches!(
        *method,
        Method::GET | Method::HEAD | Method::OPTIONS | Method::TRACE
    )
}

/// Middleware function backing [`AccessGate`].
pub async fn access_gate<R: RejectionStrategy>(
    State(gate): State<AccessGate<R>>,
    mut request: Request,
    next: Next,
) -> Response {
    match gate.authenticate(request.method(), request.headers()) {
        Ok(identity) => {
            request.extensions_mut().insert(identity);
            next.run(request).await
        }
        Err(rejection) => gate.rejector.reject(rejection),
    }
}

/// Extractor for the identity the access gate attached.
#[derive(Debug, Clone)]
pub struct CurrentIdentity(pub Identity);

impl<S> FromRequestParts<S> for CurrentIdentity
where
    S: Send + Sync,
{
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<Identity>()
            .cloned()
            .map(CurrentIdentity)
            .ok_or_else(|| AuthError::internal("route is not behind an access gate"))
    }
}
