//! Fakes and fixtures shared by the server's tests.

use async_trait::async_trait;
use axum::response::Response;
use http_body_util::BodyExt;
use rootcause::prelude::Report;
use skygate_authz::{Build, BuildLookupError, BuildWritePolicy, BuildsDb};
use skygate_core::{BuildId, TeamId};
use skygate_platform_access::{
    AuthConfig, Identity, IdentityProvider, ProviderError, ProviderRegistry, ProviderResolver,
    StateCodec, Team, TeamAuthConfig, TeamFactory, TeamLookupError, TokenIssuer,
    UpstreamIdentity,
};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::auth::{AppState, FlowSettings};

pub const PRIVATE_KEY: &str = include_str!("../../../lib/platform-access/testdata/session_key.pem");
pub const PUBLIC_KEY: &str =
    include_str!("../../../lib/platform-access/testdata/session_key.pub.pem");
pub const STATE_SECRET: &[u8] = b"test-state-secret-0123456789";

pub fn issuer() -> Arc<TokenIssuer> {
    let codec = StateCodec::new(STATE_SECRET).expect("codec");
    Arc::new(
        TokenIssuer::from_rsa_pem(
            PRIVATE_KEY.as_bytes(),
            PUBLIC_KEY.as_bytes(),
            codec,
            chrono::Duration::days(1),
        )
        .expect("issuer"),
    )
}

/// An authenticated member of `team` with a fresh CSRF token.
pub fn member_identity(issuer: &TokenIssuer, team: &str, user: &str) -> Identity {
    let team = Team::new(TeamId::new(1), team.to_string(), false, HashMap::new());
    let csrf = issuer.generate_csrf_token().expect("csrf");
    Identity::authenticated(&team, user.to_string(), csrf)
}

/// A team whose `provider` allow-list names `users`.
pub fn team(name: &str, provider: &str, users: &[&str]) -> Team {
    allow(name, provider, TeamAuthConfig {
        users: users.iter().map(|u| (*u).to_string()).collect(),
        groups: Vec::new(),
    })
}

/// A team whose `provider` allow-list names `groups`.
pub fn team_with_groups(name: &str, provider: &str, groups: &[&str]) -> Team {
    allow(name, provider, TeamAuthConfig {
        users: Vec::new(),
        groups: groups.iter().map(|g| (*g).to_string()).collect(),
    })
}

fn allow(name: &str, provider: &str, allow_list: TeamAuthConfig) -> Team {
    let mut auth = HashMap::new();
    auth.insert(provider.to_string(), allow_list);
    Team::new(TeamId::new(1), name.to_string(), false, auth)
}

#[derive(Default)]
pub struct FakeTeams {
    teams: HashMap<String, Team>,
    fail: bool,
}

impl FakeTeams {
    pub fn with(teams: Vec<Team>) -> Self {
        Self {
            teams: teams
                .into_iter()
                .map(|t| (t.name().to_string(), t))
                .collect(),
            fail: false,
        }
    }

    pub fn failing() -> Self {
        Self {
            teams: HashMap::new(),
            fail: true,
        }
    }
}

#[async_trait]
impl TeamFactory for FakeTeams {
    async fn find_team(&self, name: &str) -> Result<Option<Team>, Report<TeamLookupError>> {
        if self.fail {
            return Err(TeamLookupError::Unavailable {
                details: "connection refused".to_string(),
            }
            .into());
        }
        Ok(self.teams.get(name).cloned())
    }
}

/// Provider that records exchanged codes and returns a fixed identity.
pub struct FakeProvider {
    upstream: UpstreamIdentity,
    fail: bool,
    exchanged: Mutex<Vec<String>>,
}

impl FakeProvider {
    pub fn new(user_name: &str) -> Self {
        Self {
            upstream: UpstreamIdentity::new("42".to_string(), user_name.to_string()),
            fail: false,
            exchanged: Mutex::new(Vec::new()),
        }
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::new("alice")
        }
    }

    pub fn with_groups(mut self, groups: &[&str]) -> Self {
        self.upstream = self
            .upstream
            .with_groups(groups.iter().map(|g| (*g).to_string()).collect());
        self
    }

    /// Codes this provider was asked to exchange, in order.
    pub fn exchanged(&self) -> Vec<String> {
        self.exchanged.lock().expect("lock").clone()
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
        code: &str,
        _redirect_uri: &str,
    ) -> Result<UpstreamIdentity, Report<ProviderError>> {
        self.exchanged.lock().expect("lock").push(code.to_string());
        if self.fail {
            return Err(ProviderError::Exchange {
                provider: "github".to_string(),
                reason: "bad_verification_code".to_string(),
            }
            .into());
        }
        Ok(self.upstream.clone())
    }
}

#[derive(Default)]
pub struct FakeBuilds {
    builds: HashMap<BuildId, Build>,
    fail: bool,
}

impl FakeBuilds {
    pub fn with(builds: Vec<Build>) -> Self {
        Self {
            builds: builds.into_iter().map(|b| (b.id, b)).collect(),
            fail: false,
        }
    }

    pub fn failing() -> Self {
        Self {
            builds: HashMap::new(),
            fail: true,
        }
    }
}

#[async_trait]
impl BuildsDb for FakeBuilds {
    async fn build_by_id(&self, id: BuildId) -> Result<Option<Build>, Report<BuildLookupError>> {
        if self.fail {
            return Err(BuildLookupError::Unavailable {
                details: "connection reset".to_string(),
            }
            .into());
        }
        Ok(self.builds.get(&id).cloned())
    }
}

pub fn app_state(
    teams: FakeTeams,
    provider: Arc<FakeProvider>,
    builds: FakeBuilds,
) -> Arc<AppState> {
    app_state_with(teams, provider, builds, |_| {})
}

/// Like [`app_state`], with a hook to adjust the flow settings.
pub fn app_state_with(
    teams: FakeTeams,
    provider: Arc<FakeProvider>,
    builds: FakeBuilds,
    adjust: impl FnOnce(&mut FlowSettings),
) -> Arc<AppState> {
    let mut registry = ProviderRegistry::new();
    registry.register("github", provider as Arc<dyn IdentityProvider>);
    let timeout = Duration::from_secs(2);
    let resolver = ProviderResolver::new(Arc::new(teams), registry, timeout);
    let build_policy = BuildWritePolicy::new(Arc::new(builds), timeout);

    let mut config = AuthConfig::new(String::new(), String::new(), String::new());
    config.secure_cookies = false;
    let mut settings = FlowSettings::from_config(&config, "https://ci.example.com".to_string());
    adjust(&mut settings);

    Arc::new(AppState::new(issuer(), resolver, build_policy, settings))
}

pub async fn body_string(response: Response) -> String {
    let bytes = response
        .into_body()
        .collect()
        .await
        .expect("body")
        .to_bytes();
    String::from_utf8(bytes.to_vec()).expect("utf-8")
}
