//! Build access error types.

use skygate_core::BuildId;
use std::fmt;

/// Errors reported by a `BuildsDb` implementation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BuildLookupError {
    /// The backing store could not be queried.
    Unavailable {
        /// Error details.
        details: String,
    },
}

impl fmt::Display for BuildLookupError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unavailable { details } => write!(f, "build store unavailable: {details}"),
        }
    }
}

impl std::error::Error for BuildLookupError {}

/// Why a caller may not write to a build.
///
/// The order of checks is fixed: authentication, then existence, then
/// ownership.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BuildAccessError {
    /// The caller has no authenticated identity.
    NotAuthenticated,
    /// No build has the requested id.
    NotFound {
        /// The requested build.
        build_id: BuildId,
    },
    /// The build lookup failed or timed out.
    LookupFailed {
        /// The requested build.
        build_id: BuildId,
        /// Error details.
        details: String,
    },
    /// The build belongs to another team.
    Forbidden {
        /// The requested build.
        build_id: BuildId,
    },
}

impl fmt::Display for BuildAccessError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotAuthenticated => write!(f, "not authenticated"),
            Self::NotFound { build_id } => write!(f, "build {build_id} not found"),
            Self::LookupFailed { build_id, details } => {
                write!(f, "failed to look up build {build_id}: {details}")
            }
            Self::Forbidden { build_id } => {
                write!(f, "build {build_id} belongs to another team")
            }
        }
    }
}

impl std::error::Error for BuildAccessError {}
