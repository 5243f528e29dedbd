//! Authentication routes for login, callback, and logout.
//!
//! The V2 routes live under `/auth`, the V1 routes under `/oauth/v1`. Both
//! run the same flow; they differ in the state format they mint and accept.

use axum::{
    Router,
    extract::{Path, Query, State, rejection::QueryRejection},
    response::{IntoResponse, Redirect, Response},
    routing::get,
};
use axum_extra::extract::cookie::CookieJar;
use serde::Deserialize;
use skygate_platform_access::{
    Identity, ResolvedProvider, StateCodec, StateError, StatePayload, StateRequest, StateVersion,
};
use std::sync::Arc;
use subtle::ConstantTimeEq;
use tracing::{info, warn};

use super::{AppState, CSRF_HEADER, SESSION_COOKIE, STATE_COOKIE};
use crate::error::AuthError;

/// Path parameters naming the team and provider of a login.
#[derive(Debug, Deserialize)]
pub struct LoginPath {
    team: String,
    provider: String,
}

/// Query parameters for starting a login.
#[derive(Debug, Deserialize)]
pub struct BeginQuery {
    redirect: Option<String>,
}

/// Query parameters for the OAuth callback.
#[derive(Debug, Deserialize)]
pub struct CallbackQuery {
    code: Option<String>,
    state: Option<String>,
    /// Set by the provider when the user declined or the request failed.
    error: Option<String>,
}

/// Builds the router for the login flow routes.
pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/auth/logout", get(logout))
        .route("/auth/{team}/{provider}", get(begin_v2))
        .route("/auth/{team}/{provider}/callback", get(callback_v2))
        .route("/oauth/v1/logout", get(logout))
        .route("/oauth/v1/{team}/{provider}", get(begin_v1))
        .route("/oauth/v1/{team}/{provider}/callback", get(callback_v1))
}

/// Starts a V2 login, honoring the requested redirect.
pub async fn begin_v2(
    State(state): State<Arc<AppState>>,
    Path(path): Path<LoginPath>,
    Query(query): Query<BeginQuery>,
    jar: CookieJar,
) -> Result<impl IntoResponse, AuthError> {
    begin(&state, StateVersion::V2, path, query.redirect, jar).await
}

/// Starts a V1 login. V1 state cannot carry a redirect.
pub async fn begin_v1(
    State(state): State<Arc<AppState>>,
    Path(path): Path<LoginPath>,
    jar: CookieJar,
) -> Result<impl IntoResponse, AuthError> {
    begin(&state, StateVersion::V1, path, None, jar).await
}

pub async fn callback_v2(
    State(state): State<Arc<AppState>>,
    Path(path): Path<LoginPath>,
    jar: CookieJar,
    query: Result<Query<CallbackQuery>, QueryRejection>,
) -> Response {
    callback(&state, StateVersion::V2, path, query, jar).await
}

pub async fn callback_v1(
    State(state): State<Arc<AppState>>,
    Path(path): Path<LoginPath>,
    jar: CookieJar,
    query: Result<Query<CallbackQuery>, QueryRejection>,
) -> Response {
    callback(&state, StateVersion::V1, path, query, jar).await
}

/// Logs out the user by clearing the session cookie.
pub async fn logout(State(state): State<Arc<AppState>>, jar: CookieJar) -> impl IntoResponse {
    let jar = jar.add(state.settings.removal_cookie(SESSION_COOKIE));
    (jar, Redirect::to(&state.settings.default_redirect))
}

async fn begin(
    state: &AppState,
    version: StateVersion,
    path: LoginPath,
    redirect: Option<String>,
    jar: CookieJar,
) -> Result<(CookieJar, Redirect), AuthError> {
    let resolved = resolve(state, &path).await?;

    let request = StateRequest {
        team: path.team.clone(),
        provider: path.provider.clone(),
        redirect: redirect.filter(|r| is_safe_redirect(r)),
    };
    let token = state
        .issuer
        .issue_state(version, &request)
        .map_err(AuthError::internal)?;

    let redirect_uri = callback_url(&state.settings.external_url, version, &path)?;
    let authorize_url = resolved
        .client
        .authorization_url(&token, &redirect_uri)
        .map_err(AuthError::internal)?;

    info!(team = %path.team, provider = %path.provider, %version, "login started");
    let jar = jar.add(state.settings.cookie(STATE_COOKIE, token));
    Ok((jar, Redirect::to(&authorize_url)))
}

/// A login that completed.
struct Login {
    session_token: String,
    csrf_token: String,
    redirect: String,
}

/// Why a callback did not produce a session.
enum CallbackFailure {
    /// Answered with an error status.
    Rejected(AuthError),
    /// Sent to the login error page with the given `error` code.
    LoginFailed(&'static str),
}

impl From<AuthError> for CallbackFailure {
    fn from(e: AuthError) -> Self {
        Self::Rejected(e)
    }
}

async fn callback(
    state: &AppState,
    version: StateVersion,
    path: LoginPath,
    query: Result<Query<CallbackQuery>, QueryRejection>,
    jar: CookieJar,
) -> Response {
    let bound_state = jar.get(STATE_COOKIE).map(|c| c.value().to_string());
    let jar = jar.add(state.settings.removal_cookie(STATE_COOKIE));

    let Query(query) = match query {
        Ok(query) => query,
        Err(e) => {
            let e = AuthError::BadRequest {
                details: e.body_text(),
            };
            return (jar, e).into_response();
        }
    };

    match complete_login(state, version, &path, query, bound_state).await {
        Ok(login) => {
            let jar = jar.add(state.settings.cookie(SESSION_COOKIE, login.session_token));
            (
                jar,
                [(CSRF_HEADER, login.csrf_token)],
                Redirect::to(&login.redirect),
            )
                .into_response()
        }
        Err(CallbackFailure::Rejected(e)) => (jar, e).into_response(),
        Err(CallbackFailure::LoginFailed(code)) => {
            let target = login_error_url(&state.settings.login_error_redirect, code);
            (jar, Redirect::to(&target)).into_response()
        }
    }
}

async fn complete_login(
    state: &AppState,
    version: StateVersion,
    path: &LoginPath,
    query: CallbackQuery,
    bound_state: Option<String>,
) -> Result<Login, CallbackFailure> {
    let payload = check_state(state, version, path, query.state.as_deref(), bound_state.as_deref())
        .map_err(AuthError::InvalidState)?;

    let resolved = resolve(state, path).await?;

    let Some(code) = query.code.filter(|c| !c.is_empty()) else {
        warn!(
            team = %path.team,
            provider = %path.provider,
            provider_error = query.error.as_deref().unwrap_or_default(),
            "callback without authorization code"
        );
        return Err(CallbackFailure::LoginFailed("missing_code"));
    };

    let redirect_uri = callback_url(&state.settings.external_url, version, path)?;
    let upstream = match tokio::time::timeout(
        state.settings.provider_timeout,
        resolved.client.exchange_code(&code, &redirect_uri),
    )
    .await
    {
        Ok(Ok(upstream)) => upstream,
        Ok(Err(e)) => {
            warn!(team = %path.team, provider = %path.provider, error = %e, "code exchange failed");
            return Err(CallbackFailure::LoginFailed("exchange_failed"));
        }
        Err(_) => {
            warn!(team = %path.team, provider = %path.provider, "code exchange timed out");
            return Err(CallbackFailure::LoginFailed("exchange_failed"));
        }
    };

    if !resolved.allow_list.authorizes(&upstream) {
        warn!(
            team = %path.team,
            provider = %path.provider,
            user = %upstream.user_name,
            "user is not on the team allow-list"
        );
        return Err(CallbackFailure::LoginFailed("not_authorized"));
    }

    let csrf_token = state
        .issuer
        .generate_csrf_token()
        .map_err(AuthError::internal)?;
    let identity = Identity::authenticated(&resolved.team, upstream.user_name, csrf_token.clone());
    let session_token = state
        .issuer
        .issue_session(&identity)
        .map_err(AuthError::internal)?;

    let redirect = payload
        .redirect()
        .filter(|r| is_safe_redirect(r))
        .unwrap_or(&state.settings.default_redirect)
        .to_string();

    info!(team = %path.team, provider = %path.provider, user = identity.user_name(), "login completed");
    Ok(Login {
        session_token,
        csrf_token,
        redirect,
    })
}

/// Checks the callback state against the browser binding, the route, the
/// clock, and the team/provider binding. Nothing here calls the provider.
fn check_state(
    state: &AppState,
    version: StateVersion,
    path: &LoginPath,
    returned: Option<&str>,
    bound: Option<&str>,
) -> Result<StatePayload, StateError> {
    let (Some(returned), Some(bound)) = (returned, bound) else {
        return Err(StateError::Missing);
    };
    if !bool::from(returned.as_bytes().ct_eq(bound.as_bytes())) {
        return Err(StateError::CookieMismatch);
    }

    let payload = state.issuer.state_codec().decode_for_route(
        returned,
        version,
        state.settings.allow_legacy_state,
    )?;

    if StateCodec::is_expired(&payload, chrono::Utc::now(), state.settings.expiry) {
        return Err(StateError::Expired);
    }
    if !payload.is_bound_to(&path.team, &path.provider) {
        return Err(StateError::BindingMismatch);
    }
    Ok(payload)
}

async fn resolve(state: &AppState, path: &LoginPath) -> Result<ResolvedProvider, AuthError> {
    state
        .resolver
        .resolve(&path.team, &path.provider)
        .await
        .map_err(AuthError::internal)?
        .ok_or_else(|| AuthError::ProviderNotConfigured {
            team: path.team.clone(),
            provider: path.provider.clone(),
        })
}

/// Returns true for same-origin absolute paths.
///
/// Browsers drop tabs and newlines while parsing a `Location`, so `/\t/host`
/// would become `//host`; any control character or whitespace is refused.
fn is_safe_redirect(target: &str) -> bool {
    target.starts_with('/')
        && !target.starts_with("//")
        && !target.contains('\\')
        && !target.chars().any(|c| c.is_control() || c.is_whitespace())
}

/// Builds the callback URL the provider sends the browser back to.
fn callback_url(
    external_url: &str,
    version: StateVersion,
    path: &LoginPath,
) -> Result<String, AuthError> {
    let mut url = url::Url::parse(external_url).map_err(AuthError::internal)?;
    {
        let mut segments = url
            .path_segments_mut()
            .map_err(|()| AuthError::internal("external url cannot be a base"))?;
        segments.pop_if_empty();
        match version {
            StateVersion::V1 => segments.extend(["oauth", "v1"]),
            StateVersion::V2 => segments.push("auth"),
        };
        segments.extend([path.team.as_str(), path.provider.as_str(), "callback"]);
    }
    Ok(url.to_string())
}

fn login_error_url(base: &str, code: &str) -> String {
    let separator = if base.contains('?') { '&' } else { '?' };
    format!("{base}{separator}error={code}")
}
