//! Authentication module for the skygate server.
//!
//! This module provides:
//! - The OAuth login flow in its V1 and V2 route shapes
//! - Session cookies carrying RS256 session tokens
//! - The `AccessGate` middleware and its rejection strategies
//! - The `BuildWriteAccessGate` middleware for build ownership
//!
//! # Statelessness
//!
//! The server stores nothing per login or per session. The OAuth state is
//! authenticated by an HMAC and bound to the browser through a short-lived
//! cookie that every callback clears. Sessions are self-contained signed
//! tokens.

pub mod build_access;
pub mod keys;
pub mod middleware;
pub mod oauth;
pub mod routes;

use axum_extra::extract::cookie::{Cookie, SameSite};
use skygate_authz::BuildWritePolicy;
use skygate_platform_access::{AuthConfig, ProviderResolver, TokenIssuer};
use std::sync::Arc;
use time::Duration as TimeDuration;

pub use build_access::build_write_access_gate;
pub use keys::load_token_issuer;
pub use middleware::{
    AccessGate, CurrentIdentity, GateMode, GateRejection, RedirectRejector, RejectionStrategy,
    UnauthorizedRejector,
};
pub use oauth::GenericOAuthProvider;

/// Session cookie name.
pub const SESSION_COOKIE: &str = "skygate-auth";

/// Cookie binding an in-flight login's state to the browser.
pub const STATE_COOKIE: &str = "skygate-oauth-state";

/// Header carrying the session's CSRF token.
pub const CSRF_HEADER: &str = "x-csrf-token";

/// Login flow settings derived from configuration.
#[derive(Debug, Clone)]
pub struct FlowSettings {
    /// Whether to set the Secure flag on cookies (requires HTTPS).
    pub secure_cookies: bool,
    /// Whether V2 callbacks accept V1 state tokens.
    pub allow_legacy_state: bool,
    /// Public base URL used to build callback URLs.
    pub external_url: String,
    pub default_redirect: String,
    pub login_error_redirect: String,
    /// Lifetime of state tokens and sessions.
    pub expiry: chrono::Duration,
    /// Upper bound on provider calls during the callback.
    pub provider_timeout: std::time::Duration,
}

impl FlowSettings {
    #[must_use]
    pub fn from_config(config: &AuthConfig, external_url: String) -> Self {
        Self {
            secure_cookies: config.secure_cookies,
            allow_legacy_state: config.allow_legacy_state,
            external_url,
            default_redirect: config.default_redirect.clone(),
            login_error_redirect: config.login_error_redirect.clone(),
            expiry: config.expiry(),
            provider_timeout: config.provider_timeout(),
        }
    }

    fn cookie_max_age(&self) -> TimeDuration {
        TimeDuration::seconds(self.expiry.num_seconds())
    }

    /// Builds an auth cookie with the shared attributes.
    pub(crate) fn cookie(&self, name: &'static str, value: String) -> Cookie<'static> {
        Cookie::build((name, value))
            .path("/")
            .http_only(true)
            .secure(self.secure_cookies)
            .same_site(SameSite::Lax)
            .max_age(self.cookie_max_age())
            .build()
    }

    /// Builds a cookie that makes the browser drop `name`.
    pub(crate) fn removal_cookie(&self, name: &'static str) -> Cookie<'static> {
        Cookie::build((name, ""))
            .path("/")
            .http_only(true)
            .secure(self.secure_cookies)
            .same_site(SameSite::Lax)
            .max_age(TimeDuration::ZERO)
            .build()
    }
}

/// Shared application state.
#[derive(Debug)]
pub struct AppState {
    pub issuer: Arc<TokenIssuer>,
    pub resolver: ProviderResolver,
    pub build_policy: BuildWritePolicy,
    pub settings: FlowSettings,
}

impl AppState {
    /// Creates a new application state.
    pub fn new(
        issuer: Arc<TokenIssuer>,
        resolver: ProviderResolver,
        build_policy: BuildWritePolicy,
        settings: FlowSettings,
    ) -> Self {
        Self {
            issuer,
            resolver,
            build_policy,
            settings,
        }
    }
}
