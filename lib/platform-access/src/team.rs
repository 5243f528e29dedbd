//! Teams, their login allow-lists, and the team lookup collaborator.
//!
//! Teams are owned by the persistence layer. Each team lists, per identity
//! provider, which upstream users and groups may log in as a member.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use skygate_core::TeamId;
use std::collections::HashMap;

use crate::error::TeamLookupError;

/// Users and groups allowed to log in to a team through one provider.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TeamAuthConfig {
    /// Upstream user names.
    #[serde(default)]
    pub users: Vec<String>,
    /// Upstream group names, e.g. `org:team` for providers with nested groups.
    #[serde(default)]
    pub groups: Vec<String>,
}

impl TeamAuthConfig {
    /// Returns true if the allow-list names at least one user or group.
    ///
    /// An empty allow-list would admit nobody, so it is treated as
    /// "provider not configured" rather than as a configuration that
    /// rejects every login.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        !self.users.is_empty() || !self.groups.is_empty()
    }

    /// Returns true if the upstream identity is on the allow-list.
    ///
    /// Names compare case-insensitively, since most providers treat logins
    /// and group slugs that way.
    #[must_use]
    pub fn authorizes(&self, upstream: &UpstreamIdentity) -> bool {
        let user_allowed = self
            .users
            .iter()
            .any(|u| u.eq_ignore_ascii_case(&upstream.user_name));
        let group_allowed = self.groups.iter().any(|allowed| {
            upstream
                .groups
                .iter()
                .any(|g| g.eq_ignore_ascii_case(allowed))
        });
        user_allowed || group_allowed
    }
}

/// A team as seen by the login flow.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Team {
    id: TeamId,
    name: String,
    admin: bool,
    /// Allow-lists keyed by provider name.
    #[serde(default)]
    auth: HashMap<String, TeamAuthConfig>,
}

impl Team {
    #[must_use]
    pub fn new(
        id: TeamId,
        name: String,
        admin: bool,
        auth: HashMap<String, TeamAuthConfig>,
    ) -> Self {
        Self {
            id,
            name,
            admin,
            auth,
        }
    }

    #[must_use]
    pub fn id(&self) -> TeamId {
        self.id
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns true if members of this team are administrators.
    #[must_use]
    pub fn is_admin(&self) -> bool {
        self.admin
    }

    /// Returns the allow-list for the named provider, if the team has one.
    #[must_use]
    pub fn auth_for(&self, provider: &str) -> Option<&TeamAuthConfig> {
        self.auth.get(provider)
    }
}

/// Identity asserted by a provider after a successful code exchange.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpstreamIdentity {
    /// Stable provider-side user identifier.
    pub user_id: String,
    /// Login name.
    pub user_name: String,
    /// Group memberships.
    pub groups: Vec<String>,
}

impl UpstreamIdentity {
    #[must_use]
    pub fn new(user_id: String, user_name: String) -> Self {
        Self {
            user_id,
            user_name,
            groups: Vec::new(),
        }
    }

    /// Sets the groups.
    #[must_use]
    pub fn with_groups(mut self, groups: Vec<String>) -> Self {
        self.groups = groups;
        self
    }
}

/// Looks up teams in the persistence layer.
#[async_trait]
pub trait TeamFactory: Send + Sync {
    /// Finds a team by name. `Ok(None)` means the team does not exist.
    async fn find_team(&self, name: &str) -> skygate_core::Result<Option<Team>, TeamLookupError>;
}
