//! Error types for the platform-access crate.
//!
//! Errors are designed for layered context using rootcause:
//! - `StateError`: OAuth state parameter failures (all map to "invalid state")
//! - `SessionTokenError`: session token minting and verification failures
//! - `ProviderError`: identity provider capability failures
//! - `TeamLookupError`: failures reported by the team persistence collaborator
//! - `ResolveError`: provider resolution failures that are not "not configured"

use crate::state::StateVersion;
use std::fmt;

/// Errors from encoding, decoding, or checking an OAuth state parameter.
///
/// Callers treat every variant as the same `invalid_state` outcome; the
/// variants exist so logs can say why.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StateError {
    /// The state was structurally or cryptographically invalid.
    Invalid { reason: &'static str },
    /// The state was issued longer ago than the configured maximum age.
    Expired,
    /// The state was issued for a different protocol version than the route.
    VersionMismatch {
        route: StateVersion,
        found: StateVersion,
    },
    /// The state was issued for a different team or provider than the route.
    BindingMismatch,
    /// The callback had no state, or the browser no longer holds it.
    Missing,
    /// The callback state differs from the one bound to the browser.
    CookieMismatch,
    /// The configured state secret cannot be used.
    InvalidSecret { reason: String },
    /// The system random number generator failed.
    Entropy { reason: String },
}

impl fmt::Display for StateError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Invalid { reason } => write!(f, "invalid state: {reason}"),
            Self::Expired => write!(f, "state has expired"),
            Self::VersionMismatch { route, found } => {
                write!(f, "state version {found} not accepted on {route} route")
            }
            Self::BindingMismatch => write!(f, "state was issued for another team or provider"),
            Self::Missing => write!(f, "state is missing or already consumed"),
            Self::CookieMismatch => write!(f, "state does not match the browser's login attempt"),
            Self::InvalidSecret { reason } => write!(f, "invalid state secret: {reason}"),
            Self::Entropy { reason } => write!(f, "failed to generate nonce: {reason}"),
        }
    }
}

impl std::error::Error for StateError {}

/// Errors from minting or verifying session tokens.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionTokenError {
    /// The token's embedded expiry has passed.
    Expired,
    /// The signature does not verify against the configured key.
    BadSignature,
    /// The token header names an algorithm other than the designated one.
    WrongAlgorithm { found: String },
    /// The token could not be parsed.
    Malformed { reason: String },
    /// Sessions are only issued for authenticated identities.
    AnonymousIdentity,
    /// Key material could not be loaded.
    InvalidKey { reason: String },
    /// Signing failed.
    Signing { reason: String },
    /// The system random number generator failed.
    Entropy { reason: String },
}

impl fmt::Display for SessionTokenError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Expired => write!(f, "session token has expired"),
            Self::BadSignature => write!(f, "session token signature is invalid"),
            Self::WrongAlgorithm { found } => {
                write!(f, "session token uses disallowed algorithm {found}")
            }
            Self::Malformed { reason } => write!(f, "malformed session token: {reason}"),
            Self::AnonymousIdentity => write!(f, "cannot issue a session for an anonymous identity"),
            Self::InvalidKey { reason } => write!(f, "invalid session key: {reason}"),
            Self::Signing { reason } => write!(f, "failed to sign session token: {reason}"),
            Self::Entropy { reason } => write!(f, "failed to generate csrf token: {reason}"),
        }
    }
}

impl std::error::Error for SessionTokenError {}

impl SessionTokenError {
    /// Returns true for failures that mean "the caller is not authenticated"
    /// rather than a server-side fault.
    #[must_use]
    pub fn is_unauthenticated(&self) -> bool {
        matches!(
            self,
            Self::Expired | Self::BadSignature | Self::WrongAlgorithm { .. } | Self::Malformed { .. }
        )
    }
}

/// Errors from an identity provider capability.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProviderError {
    /// The provider client is misconfigured (bad URLs, etc.).
    Configuration { provider: String, reason: String },
    /// Exchanging the authorization code failed.
    Exchange { provider: String, reason: String },
    /// Fetching or parsing the upstream user profile failed.
    UserInfo { provider: String, reason: String },
}

impl fmt::Display for ProviderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Configuration { provider, reason } => {
                write!(f, "provider '{provider}' configuration error: {reason}")
            }
            Self::Exchange { provider, reason } => {
                write!(f, "provider '{provider}' code exchange failed: {reason}")
            }
            Self::UserInfo { provider, reason } => {
                write!(f, "provider '{provider}' user info failed: {reason}")
            }
        }
    }
}

impl std::error::Error for ProviderError {}

/// Errors reported by a `TeamFactory` implementation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TeamLookupError {
    /// The backing store could not be queried.
    Unavailable { details: String },
    /// A stored team record could not be decoded.
    Corrupt { team: String, details: String },
}

impl fmt::Display for TeamLookupError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unavailable { details } => write!(f, "team store unavailable: {details}"),
            Self::Corrupt { team, details } => {
                write!(f, "team '{team}' has an unreadable record: {details}")
            }
        }
    }
}

impl std::error::Error for TeamLookupError {}

/// Errors from resolving a team's identity provider.
///
/// "Not configured" is not an error; see `ProviderResolver::resolve`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolveError {
    /// The team lookup failed.
    LookupFailed { team: String, details: String },
    /// The team lookup did not finish within the configured bound.
    Timeout { team: String },
}

impl fmt::Display for ResolveError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::LookupFailed { team, details } => {
                write!(f, "failed to look up team '{team}': {details}")
            }
            Self::Timeout { team } => write!(f, "timed out looking up team '{team}'"),
        }
    }
}

impl std::error::Error for ResolveError {}
