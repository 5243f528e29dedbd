//! Identity providers and per-team provider resolution.
//!
//! An [`IdentityProvider`] is the external OAuth capability: it builds an
//! authorization URL and exchanges a returned code for an upstream identity.
//! The [`ProviderResolver`] combines the configured providers with a team's
//! allow-list to decide whether a login through that provider is possible.

use async_trait::async_trait;
use rootcause::Report;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, instrument, warn};

use crate::error::{ProviderError, ResolveError};
use crate::team::{Team, TeamAuthConfig, TeamFactory, UpstreamIdentity};

/// An external OAuth identity provider.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Returns the URL the browser should be sent to, carrying `state`.
    ///
    /// # Errors
    ///
    /// Returns `ProviderError::Configuration` if the URL cannot be built.
    fn authorization_url(
        &self,
        state: &str,
        redirect_uri: &str,
    ) -> Result<String, Report<ProviderError>>;

    /// Exchanges an authorization code for the upstream identity.
    ///
    /// # Errors
    ///
    /// Returns `ProviderError::Exchange` or `ProviderError::UserInfo` when
    /// the provider rejects the code or its profile cannot be read.
    async fn exchange_code(
        &self,
        code: &str,
        redirect_uri: &str,
    ) -> Result<UpstreamIdentity, Report<ProviderError>>;
}

/// Provider clients configured on this deployment, keyed by name.
#[derive(Clone, Default)]
pub struct ProviderRegistry {
    providers: HashMap<String, Arc<dyn IdentityProvider>>,
}

impl fmt::Debug for ProviderRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<&String> = self.providers.keys().collect();
        names.sort();
        f.debug_struct("ProviderRegistry")
            .field("providers", &names)
            .finish()
    }
}

impl ProviderRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a provider under `name`, replacing any previous one.
    pub fn register(&mut self, name: impl Into<String>, provider: Arc<dyn IdentityProvider>) {
        self.providers.insert(name.into(), provider);
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<Arc<dyn IdentityProvider>> {
        self.providers.get(name).cloned()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }
}

/// A provider that a specific team can log in through.
#[derive(Clone)]
pub struct ResolvedProvider {
    pub name: String,
    pub team: Team,
    pub allow_list: TeamAuthConfig,
    pub client: Arc<dyn IdentityProvider>,
}

impl fmt::Debug for ResolvedProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResolvedProvider")
            .field("name", &self.name)
            .field("team", &self.team.name())
            .field("allow_list", &self.allow_list)
            .finish_non_exhaustive()
    }
}

/// Resolves the provider a team logs in through.
#[derive(Clone)]
pub struct ProviderResolver {
    teams: Arc<dyn TeamFactory>,
    registry: ProviderRegistry,
    lookup_timeout: Duration,
}

impl fmt::Debug for ProviderResolver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProviderResolver")
            .field("registry", &self.registry)
            .field("lookup_timeout", &self.lookup_timeout)
            .finish_non_exhaustive()
    }
}

impl ProviderResolver {
    #[must_use]
    pub fn new(
        teams: Arc<dyn TeamFactory>,
        registry: ProviderRegistry,
        lookup_timeout: Duration,
    ) -> Self {
        Self {
            teams,
            registry,
            lookup_timeout,
        }
    }

    /// Resolves `provider` for `team`.
    ///
    /// Returns `Ok(None)` when the team does not exist, has no allow-list
    /// for the provider, has an empty allow-list, or the provider has no
    /// client configured on this deployment.
    ///
    /// # Errors
    ///
    /// Returns `ResolveError::LookupFailed` if the team lookup fails, or
    /// `ResolveError::Timeout` if it exceeds the lookup bound.
    #[instrument(skip(self))]
    pub async fn resolve(
        &self,
        team: &str,
        provider: &str,
    ) -> Result<Option<ResolvedProvider>, Report<ResolveError>> {
        let found = tokio::time::timeout(self.lookup_timeout, self.teams.find_team(team))
            .await
            .map_err(|_| ResolveError::Timeout {
                team: team.to_string(),
            })?
            .map_err(|e| ResolveError::LookupFailed {
                team: team.to_string(),
                details: e.to_string(),
            })?;

        let Some(found) = found else {
            debug!(team, "team not found");
            return Ok(None);
        };

        let Some(allow_list) = found.auth_for(provider) else {
            debug!(team, provider, "team has no allow-list for provider");
            return Ok(None);
        };

        if !allow_list.is_valid() {
            warn!(team, provider, "team allow-list is empty");
            return Ok(None);
        }

        let Some(client) = self.registry.get(provider) else {
            debug!(provider, "provider has no configured client");
            return Ok(None);
        };

        Ok(Some(ResolvedProvider {
            name: provider.to_string(),
            allow_list: allow_list.clone(),
            team: found,
            client,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::TeamLookupError;
    use skygate_core::TeamId;

    #[derive(Default)]
    struct FakeTeams {
        teams: HashMap<String, Team>,
        fail: bool,
        delay: Option<Duration>,
    }

    #[async_trait]
    impl TeamFactory for FakeTeams {
        async fn find_team(&self, name: &str) -> Result<Option<Team>, Report<TeamLookupError>> {
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            if self.fail {
                return Err(TeamLookupError::Unavailable {
                    details: "connection refused".to_string(),
                }
                .into());
            }
            Ok(self.teams.get(name).cloned())
        }
    }

    struct FakeProvider {
        upstream: UpstreamIdentity,
    }

    impl FakeProvider {
        fn new(user_name: &str) -> Self {
            Self {
                upstream: UpstreamIdentity::new("1".to_string(), user_name.to_string()),
            }
        }
    }

    #[async_trait]
    impl IdentityProvider for FakeProvider {
        fn authorization_url(
            &self,
            state: &str,
            redirect_uri: &str,
        ) -> Result<String, Report<ProviderError>> {
            Ok(format!(
                "https://provider.example/authorize?state={state}&redirect_uri={redirect_uri}"
            ))
        }

        async fn exchange_code(
            &self,
            _code: &str,
            _redirect_uri: &str,
        ) -> Result<UpstreamIdentity, Report<ProviderError>> {
            Ok(self.upstream.clone())
        }
    }

    fn team_with(provider: &str, allow_list: TeamAuthConfig) -> Team {
        let mut auth = HashMap::new();
        auth.insert(provider.to_string(), allow_list);
        Team::new(TeamId::new(7), "main".to_string(), true, auth)
    }

    fn alice_only() -> TeamAuthConfig {
        TeamAuthConfig {
            users: vec!["alice".to_string()],
            groups: Vec::new(),
        }
    }

    fn resolver(teams: FakeTeams) -> ProviderResolver {
        let mut registry = ProviderRegistry::new();
        registry.register("github", Arc::new(FakeProvider::new("alice")));
        ProviderResolver::new(Arc::new(teams), registry, Duration::from_millis(200))
    }

    fn teams_of(team: Team) -> FakeTeams {
        let mut teams = HashMap::new();
        teams.insert(team.name().to_string(), team);
        FakeTeams {
            teams,
            ..FakeTeams::default()
        }
    }

    #[tokio::test]
    async fn resolves_configured_provider() {
        let resolver = resolver(teams_of(team_with("github", alice_only())));
        let resolved = resolver
            .resolve("main", "github")
            .await
            .expect("lookup")
            .expect("configured");

        assert_eq!(resolved.name, "github");
        assert_eq!(resolved.team.name(), "main");
        assert_eq!(resolved.allow_list, alice_only());
    }

    #[tokio::test]
    async fn unknown_team_is_not_configured() {
        let resolver = resolver(FakeTeams::default());
        assert!(resolver.resolve("ghost", "github").await.expect("lookup").is_none());
    }

    #[tokio::test]
    async fn team_without_provider_entry_is_not_configured() {
        let resolver = resolver(teams_of(team_with("gitlab", alice_only())));
        assert!(resolver.resolve("main", "github").await.expect("lookup").is_none());
    }

    #[tokio::test]
    async fn empty_allow_list_is_not_configured() {
        let resolver = resolver(teams_of(team_with("github", TeamAuthConfig::default())));
        assert!(resolver.resolve("main", "github").await.expect("lookup").is_none());
    }

    #[tokio::test]
    async fn provider_without_client_is_not_configured() {
        let resolver = resolver(teams_of(team_with("bitbucket", alice_only())));
        assert!(
            resolver
                .resolve("main", "bitbucket")
                .await
                .expect("lookup")
                .is_none()
        );
    }

    #[tokio::test]
    async fn failing_lookup_is_an_error() {
        let resolver = resolver(FakeTeams {
            fail: true,
            ..FakeTeams::default()
        });
        assert!(resolver.resolve("main", "github").await.is_err());
    }

    #[tokio::test]
    async fn slow_lookup_times_out() {
        let resolver = resolver(FakeTeams {
            delay: Some(Duration::from_secs(5)),
            ..teams_of(team_with("github", alice_only()))
        });
        let err = resolver.resolve("main", "github").await.map(|_| ()).unwrap_err();
        assert!(err.to_string().contains("timed out"));
    }

    #[test]
    fn registry_debug_lists_names_only() {
        let mut registry = ProviderRegistry::new();
        assert!(registry.is_empty());
        registry.register("github", Arc::new(FakeProvider::new("alice")));
        assert!(format!("{registry:?}").contains("github"));
        assert!(registry.get("github").is_some());
        assert!(registry.get("gitlab").is_none());
    }
}
