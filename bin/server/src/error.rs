//! Domain error types for server operations.
//!
//! Every failure the login flow and the gates can produce is an [`AuthError`].
//! Its `IntoResponse` impl picks the status code, logs server-side detail,
//! and sends a generic body.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use skygate_authz::BuildAccessError;
use skygate_platform_access::StateError;
use std::fmt;

/// Authentication and authorization errors.
#[derive(Debug)]
pub enum AuthError {
    /// No valid session accompanied the request.
    Unauthenticated,
    /// A cookie-authenticated unsafe request lacked the session's CSRF token.
    CsrfMismatch,
    /// The caller may not act on the resource.
    Forbidden { details: String },
    /// The resource does not exist.
    NotFound { details: String },
    /// The OAuth state parameter was missing, tampered, expired, or replayed.
    InvalidState(StateError),
    /// The team does not exist or cannot log in through the provider.
    ProviderNotConfigured { team: String, provider: String },
    /// The request was malformed.
    BadRequest { details: String },
    /// A collaborator or the server itself failed.
    Internal { details: String },
}

impl fmt::Display for AuthError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unauthenticated => write!(f, "not authenticated"),
            Self::CsrfMismatch => write!(f, "csrf token mismatch"),
            Self::Forbidden { details } => write!(f, "forbidden: {details}"),
            Self::NotFound { details } => write!(f, "not found: {details}"),
            Self::InvalidState(e) => write!(f, "{e}"),
            Self::ProviderNotConfigured { team, provider } => {
                write!(f, "team '{team}' has not configured provider '{provider}'")
            }
            Self::BadRequest { details } => write!(f, "bad request: {details}"),
            Self::Internal { details } => write!(f, "internal error: {details}"),
        }
    }
}

impl std::error::Error for AuthError {}

impl AuthError {
    /// Wraps any displayable failure as an internal error.
    pub fn internal(e: impl fmt::Display) -> Self {
        Self::Internal {
            details: e.to_string(),
        }
    }

    #[must_use]
    pub fn status(&self) -> StatusCode {
        match self {
            Self::Unauthenticated => StatusCode::UNAUTHORIZED,
            Self::Forbidden { .. } => StatusCode::FORBIDDEN,
            Self::NotFound { .. } => StatusCode::NOT_FOUND,
            Self::CsrfMismatch
            | Self::InvalidState(_)
            | Self::ProviderNotConfigured { .. }
            | Self::BadRequest { .. } => StatusCode::BAD_REQUEST,
            Self::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn public_message(&self) -> &'static str {
        match self {
            Self::Unauthenticated => "Not authenticated",
            Self::CsrfMismatch => "CSRF token mismatch",
            Self::Forbidden { .. } => "Forbidden",
            Self::NotFound { .. } => "Not found",
            Self::InvalidState(_) => "Invalid state",
            Self::ProviderNotConfigured { .. } => "Provider not configured for team",
            Self::BadRequest { .. } => "Bad request",
            Self::Internal { .. } => "Internal server error",
        }
    }
}

impl From<BuildAccessError> for AuthError {
    fn from(e: BuildAccessError) -> Self {
        match e {
            BuildAccessError::NotAuthenticated => Self::Unauthenticated,
            BuildAccessError::NotFound { .. } => Self::NotFound {
                details: e.to_string(),
            },
            BuildAccessError::Forbidden { .. } => Self::Forbidden {
                details: e.to_string(),
            },
            BuildAccessError::LookupFailed { .. } => Self::Internal {
                details: e.to_string(),
            },
        }
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        match &self {
            Self::Internal { details } => tracing::error!(error = %details, "request failed"),
            Self::InvalidState(e) => tracing::warn!(error = %e, "rejected oauth state"),
            Self::CsrfMismatch | Self::Forbidden { .. } => {
                tracing::warn!(error = %self, "request denied");
            }
            _ => tracing::debug!(error = %self, "request rejected"),
        }

        (self.status(), self.public_message()).into_response()
    }
}
