//! Generic OAuth2 identity provider.
//!
//! Speaks the authorization code grant through the `oauth2` crate, then
//! reads the user profile from a JSON userinfo endpoint whose field names
//! come from configuration.

use async_trait::async_trait;
use oauth2::{
    AuthUrl, AuthorizationCode, ClientId, ClientSecret, CsrfToken, RedirectUrl, Scope,
    TokenResponse, TokenUrl, basic::BasicClient,
};
use rootcause::prelude::Report;
use serde_json::Value;
use skygate_platform_access::{IdentityProvider, ProviderConfig, ProviderError, UpstreamIdentity};

/// An OAuth2 provider configured entirely from [`ProviderConfig`].
#[derive(Clone)]
pub struct GenericOAuthProvider {
    name: String,
    config: ProviderConfig,
    http_client: reqwest::Client,
}

impl std::fmt::Debug for GenericOAuthProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GenericOAuthProvider")
            .field("name", &self.name)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl GenericOAuthProvider {
    /// Creates a provider from validated configuration.
    ///
    /// # Errors
    ///
    /// Returns `ProviderError::Configuration` listing every missing field,
    /// or if an endpoint URL does not parse.
    pub fn new(name: impl Into<String>, config: ProviderConfig) -> Result<Self, Report<ProviderError>> {
        let name = name.into();
        let configuration_error = |reason: String| ProviderError::Configuration {
            provider: name.clone(),
            reason,
        };

        config
            .validate()
            .map_err(|missing| configuration_error(format!("missing {}", missing.join(", "))))?;
        AuthUrl::new(config.auth_url.clone())
            .map_err(|e| configuration_error(format!("invalid auth_url: {e}")))?;
        TokenUrl::new(config.token_url.clone())
            .map_err(|e| configuration_error(format!("invalid token_url: {e}")))?;
        url::Url::parse(&config.userinfo_url)
            .map_err(|e| configuration_error(format!("invalid userinfo_url: {e}")))?;

        let http_client = reqwest::Client::builder()
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .map_err(|e| configuration_error(format!("failed to create HTTP client: {e}")))?;

        Ok(Self {
            name,
            config,
            http_client,
        })
    }

    fn error(&self, kind: fn(String, String) -> ProviderError, reason: String) -> ProviderError {
        kind(self.name.clone(), reason)
    }

    /// Extracts the upstream identity from a userinfo document.
    fn parse_profile(&self, profile: &Value) -> Result<UpstreamIdentity, ProviderError> {
        let field = |name: &str| match profile.get(name) {
            Some(Value::String(s)) => Some(s.clone()),
            Some(Value::Number(n)) => Some(n.to_string()),
            _ => None,
        };

        let user_id = field(&self.config.user_id_field).ok_or_else(|| {
            self.error(user_info, format!("profile has no '{}'", self.config.user_id_field))
        })?;
        let user_name = field(&self.config.user_name_field).ok_or_else(|| {
            self.error(user_info, format!("profile has no '{}'", self.config.user_name_field))
        })?;
        let groups = profile
            .get(&self.config.groups_field)
            .and_then(Value::as_array)
            .map(|groups| {
                groups
                    .iter()
                    .filter_map(Value::as_str)
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default();

        Ok(UpstreamIdentity::new(user_id, user_name).with_groups(groups))
    }
}

fn exchange(provider: String, reason: String) -> ProviderError {
    ProviderError::Exchange { provider, reason }
}

fn user_info(provider: String, reason: String) -> ProviderError {
    ProviderError::UserInfo { provider, reason }
}

fn configuration(provider: String, reason: String) -> ProviderError {
    ProviderError::Configuration { provider, reason }
}

#[async_trait]
impl IdentityProvider for GenericOAuthProvider {
    fn authorization_url(
        &self,
        state: &str,
        redirect_uri: &str,
    ) -> Result<String, Report<ProviderError>> {
        let auth_url = AuthUrl::new(self.config.auth_url.clone())
            .map_err(|e| self.error(configuration, e.to_string()))?;
        let redirect_url = RedirectUrl::new(redirect_uri.to_string())
            .map_err(|e| self.error(configuration, e.to_string()))?;

        let client = BasicClient::new(ClientId::new(self.config.client_id.clone()))
            .set_client_secret(ClientSecret::new(self.config.client_secret.clone()))
            .set_auth_uri(auth_url)
            .set_redirect_uri(redirect_url);

        let state = state.to_string();
        let mut auth_request = client.authorize_url(move || CsrfToken::new(state));
        for scope in self.config.scopes() {
            auth_request = auth_request.add_scope(Scope::new(scope.to_string()));
        }

        let (url, _) = auth_request.url();
        Ok(url.to_string())
    }

    async fn exchange_code(
        &self,
        code: &str,
        redirect_uri: &str,
    ) -> Result<UpstreamIdentity, Report<ProviderError>> {
        let token_url = TokenUrl::new(self.config.token_url.clone())
            .map_err(|e| self.error(configuration, e.to_string()))?;
        let redirect_url = RedirectUrl::new(redirect_uri.to_string())
            .map_err(|e| self.error(configuration, e.to_string()))?;

        let client = BasicClient::new(ClientId::new(self.config.client_id.clone()))
            .set_client_secret(ClientSecret::new(self.config.client_secret.clone()))
            .set_token_uri(token_url)
            .set_redirect_uri(redirect_url);

        let token = client
            .exchange_code(AuthorizationCode::new(code.to_string()))
            .request_async(&self.http_client)
            .await
            .map_err(|e| self.error(exchange, e.to_string()))?;

        let profile: Value = self
            .http_client
            .get(&self.config.userinfo_url)
            .bearer_auth(token.access_token().secret())
            .header(reqwest::header::ACCEPT, "application/json")
            .header(reqwest::header::USER_AGENT, "skygate")
            .send()
            .await
            .and_then(reqwest::Response::error_for_status)
            .map_err(|e| self.error(user_info, e.to_string()))?
            .json()
            .await
            .map_err(|e| self.error(user_info, e.to_string()))?;

        Ok(self.parse_profile(&profile)?)
    }
}
