//! The caller identity attached to each request.

use serde::Serialize;
use skygate_core::TeamId;

use crate::team::Team;

/// Who is making a request.
///
/// An `Identity` is produced per request from a verified session token and
/// lives only for that request. It is never persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Identity {
    team_name: String,
    team_id: TeamId,
    is_admin: bool,
    is_authenticated: bool,
    user_name: String,
    #[serde(skip)]
    csrf_token: String,
}

impl Identity {
    /// An unauthenticated caller.
    #[must_use]
    pub fn anonymous() -> Self {
        Self {
            team_name: String::new(),
            team_id: TeamId::new(0),
            is_admin: false,
            is_authenticated: false,
            user_name: String::new(),
            csrf_token: String::new(),
        }
    }

    /// A caller logged in as a member of `team`.
    #[must_use]
    pub fn authenticated(team: &Team, user_name: String, csrf_token: String) -> Self {
        Self {
            team_name: team.name().to_string(),
            team_id: team.id(),
            is_admin: team.is_admin(),
            is_authenticated: true,
            user_name,
            csrf_token,
        }
    }

    /// Rebuilds an authenticated identity from verified session claims.
    #[must_use]
    pub(crate) fn from_parts(
        team_name: String,
        team_id: TeamId,
        is_admin: bool,
        user_name: String,
        csrf_token: String,
    ) -> Self {
        Self {
            team_name,
            team_id,
            is_admin,
            is_authenticated: true,
            user_name,
            csrf_token,
        }
    }

    #[must_use]
    pub fn team_name(&self) -> &str {
        &self.team_name
    }

    #[must_use]
    pub fn team_id(&self) -> TeamId {
        self.team_id
    }

    /// Returns true if the caller belongs to an admin team.
    #[must_use]
    pub fn is_admin(&self) -> bool {
        self.is_admin
    }

    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        self.is_authenticated
    }

    /// Returns the upstream login name the session was issued for.
    #[must_use]
    pub fn user_name(&self) -> &str {
        &self.user_name
    }

    /// Returns the CSRF token bound to the session.
    #[must_use]
    pub fn csrf_token(&self) -> &str {
        &self.csrf_token
    }
}

impl Default for Identity {
    fn default() -> Self {
        Self::anonymous()
    }
}
