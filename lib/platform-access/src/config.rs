//! Login flow and identity provider configuration.
//!
//! Both types are deserialized from environment variables by the server;
//! fields with defaults can be omitted.

use serde::Deserialize;
use std::fmt;

/// Longest accepted token lifetime: 30 days.
pub const MAX_EXPIRE_MINUTES: i64 = 30 * 24 * 60;

/// Configuration for state tokens, session tokens, and the login flow.
#[derive(Clone, Deserialize)]
pub struct AuthConfig {
    /// Path to the PEM-encoded RSA private key that signs session tokens.
    pub signing_key_path: String,
    /// Path to the PEM-encoded RSA public key that verifies session tokens.
    pub verification_key_path: String,
    /// HMAC secret for state tokens. At least 16 bytes.
    pub state_secret: String,
    /// Lifetime of session tokens and state tokens, in minutes.
    #[serde(default = "default_expire_minutes")]
    pub expire_minutes: i64,
    /// Whether to set the Secure flag on cookies (requires HTTPS).
    #[serde(default = "default_secure_cookies")]
    pub secure_cookies: bool,
    /// Whether V2 callbacks accept V1 state tokens.
    #[serde(default)]
    pub allow_legacy_state: bool,
    /// Upper bound on team and build lookups, in seconds.
    #[serde(default = "default_lookup_timeout_seconds")]
    pub lookup_timeout_seconds: u64,
    /// Upper bound on the provider code exchange and userinfo call, in seconds.
    #[serde(default = "default_provider_timeout_seconds")]
    pub provider_timeout_seconds: u64,
    /// Where a login lands when no redirect was requested.
    #[serde(default = "default_redirect")]
    pub default_redirect: String,
    /// Where a failed login is sent, with an `error` query parameter.
    #[serde(default = "default_login_error_redirect")]
    pub login_error_redirect: String,
}

impl fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthConfig")
            .field("signing_key_path", &self.signing_key_path)
            .field("verification_key_path", &self.verification_key_path)
            .field("state_secret", &"[redacted]")
            .field("expire_minutes", &self.expire_minutes)
            .field("secure_cookies", &self.secure_cookies)
            .field("allow_legacy_state", &self.allow_legacy_state)
            .field("lookup_timeout_seconds", &self.lookup_timeout_seconds)
            .field("provider_timeout_seconds", &self.provider_timeout_seconds)
            .field("default_redirect", &self.default_redirect)
            .field("login_error_redirect", &self.login_error_redirect)
            .finish()
    }
}

fn default_expire_minutes() -> i64 {
    24 * 60
}

fn default_secure_cookies() -> bool {
    true
}

fn default_lookup_timeout_seconds() -> u64 {
    10
}

fn default_provider_timeout_seconds() -> u64 {
    30
}

fn default_redirect() -> String {
    "/".to_string()
}

fn default_login_error_redirect() -> String {
    "/login".to_string()
}

impl AuthConfig {
    /// Creates a configuration with defaults for optional fields.
    #[must_use]
    pub fn new(
        signing_key_path: String,
        verification_key_path: String,
        state_secret: String,
    ) -> Self {
        Self {
            signing_key_path,
            verification_key_path,
            state_secret,
            expire_minutes: default_expire_minutes(),
            secure_cookies: default_secure_cookies(),
            allow_legacy_state: false,
            lookup_timeout_seconds: default_lookup_timeout_seconds(),
            provider_timeout_seconds: default_provider_timeout_seconds(),
            default_redirect: default_redirect(),
            login_error_redirect: default_login_error_redirect(),
        }
    }

    /// Token lifetime, clamped to `0..=MAX_EXPIRE_MINUTES`. Call
    /// [`AuthConfig::validate`] to reject out-of-range values instead.
    #[must_use]
    pub fn expiry(&self) -> chrono::Duration {
        chrono::Duration::minutes(self.expire_minutes.clamp(0, MAX_EXPIRE_MINUTES))
    }

    #[must_use]
    pub fn lookup_timeout(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.lookup_timeout_seconds)
    }

    #[must_use]
    pub fn provider_timeout(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.provider_timeout_seconds)
    }

    /// Checks that lifetimes and timeouts are in range.
    ///
    /// # Errors
    ///
    /// Returns a description of every out-of-range field.
    pub fn validate(&self) -> Result<(), Vec<String>> {
        let mut problems = Vec::new();
        if !(1..=MAX_EXPIRE_MINUTES).contains(&self.expire_minutes) {
            problems.push(format!(
                "expire_minutes must be between 1 and {MAX_EXPIRE_MINUTES}, got {}",
                self.expire_minutes
            ));
        }
        if self.lookup_timeout_seconds == 0 {
            problems.push("lookup_timeout_seconds must be positive".to_string());
        }
        if self.provider_timeout_seconds == 0 {
            problems.push("provider_timeout_seconds must be positive".to_string());
        }
        if problems.is_empty() {
            Ok(())
        } else {
            Err(problems)
        }
    }
}

/// Configuration for one OAuth2 identity provider client.
#[derive(Clone, Deserialize)]
pub struct ProviderConfig {
    #[serde(default)]
    pub client_id: String,
    #[serde(default)]
    pub client_secret: String,
    /// Authorization endpoint.
    #[serde(default)]
    pub auth_url: String,
    /// Token endpoint.
    #[serde(default)]
    pub token_url: String,
    /// Endpoint returning the user profile as JSON.
    #[serde(default)]
    pub userinfo_url: String,
    /// Comma-separated scopes.
    #[serde(default)]
    pub scopes: String,
    /// Profile field holding the stable user id.
    #[serde(default = "default_user_id_field")]
    pub user_id_field: String,
    /// Profile field holding the login name.
    #[serde(default = "default_user_name_field")]
    pub user_name_field: String,
    /// Profile field holding the group list, if the provider returns one.
    #[serde(default = "default_groups_field")]
    pub groups_field: String,
}

impl fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProviderConfig")
            .field("client_id", &self.client_id)
            .field("auth_url", &self.auth_url)
            .field("token_url", &self.token_url)
            .field("userinfo_url", &self.userinfo_url)
            .field("scopes", &self.scopes)
            .finish_non_exhaustive()
    }
}

fn default_user_id_field() -> String {
    "id".to_string()
}

fn default_user_name_field() -> String {
    "login".to_string()
}

fn default_groups_field() -> String {
    "groups".to_string()
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            client_id: String::new(),
            client_secret: String::new(),
            auth_url: String::new(),
            token_url: String::new(),
            userinfo_url: String::new(),
            scopes: String::new(),
            user_id_field: default_user_id_field(),
            user_name_field: default_user_name_field(),
            groups_field: default_groups_field(),
        }
    }
}

impl ProviderConfig {
    /// Returns the scopes to request, parsed from the comma-separated string.
    #[must_use]
    pub fn scopes(&self) -> Vec<&str> {
        self.scopes
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .collect()
    }

    /// Checks that every required field is set.
    ///
    /// # Errors
    ///
    /// Returns the names of all missing fields.
    pub fn validate(&self) -> Result<(), Vec<&'static str>> {
        let required = [
            ("client_id", &self.client_id),
            ("client_secret", &self.client_secret),
            ("auth_url", &self.auth_url),
            ("token_url", &self.token_url),
            ("userinfo_url", &self.userinfo_url),
        ];
        let missing: Vec<&'static str> = required
            .iter()
            .filter(|(_, value)| value.trim().is_empty())
            .map(|(name, _)| *name)
            .collect();
        if missing.is_empty() {
            Ok(())
        } else {
            Err(missing)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn auth_config_has_correct_defaults() {
        let config: AuthConfig = serde_json::from_str(
            r#"{"signing_key_path":"a","verification_key_path":"b","state_secret":"c"}"#,
        )
        .expect("deserialize");

        assert_eq!(config.expire_minutes, 1440);
        assert!(config.secure_cookies);
        assert!(!config.allow_legacy_state);
        assert_eq!(config.lookup_timeout(), std::time::Duration::from_secs(10));
        assert_eq!(config.provider_timeout(), std::time::Duration::from_secs(30));
        assert_eq!(config.default_redirect, "/");
        assert_eq!(config.login_error_redirect, "/login");
        assert_eq!(config.expiry(), chrono::Duration::hours(24));
    }

    #[test]
    fn default_auth_config_is_valid() {
        let config = AuthConfig::new("a".to_string(), "b".to_string(), "c".to_string());
        assert_eq!(config.validate(), Ok(()));
    }

    #[test]
    fn out_of_range_lifetimes_are_rejected() {
        for minutes in [0, -5, MAX_EXPIRE_MINUTES + 1, 200_000_000_000] {
            let config = AuthConfig {
                expire_minutes: minutes,
                ..AuthConfig::new("a".to_string(), "b".to_string(), "c".to_string())
            };
            let problems = config.validate().unwrap_err();
            assert_eq!(problems.len(), 1, "{minutes}");
            assert!(problems[0].contains("expire_minutes"));
        }
    }

    #[test]
    fn zero_timeouts_are_rejected() {
        let config = AuthConfig {
            lookup_timeout_seconds: 0,
            provider_timeout_seconds: 0,
            ..AuthConfig::new("a".to_string(), "b".to_string(), "c".to_string())
        };
        assert_eq!(config.validate().map_err(|p| p.len()), Err(2));
    }

    #[test]
    fn auth_config_debug_redacts_secret() {
        let config = AuthConfig::new("a".to_string(), "b".to_string(), "hunter2hunter2".to_string());
        assert!(!format!("{config:?}").contains("hunter2"));
    }

    #[test]
    fn provider_validation_reports_every_missing_field() {
        let config = ProviderConfig {
            client_id: "id".to_string(),
            auth_url: "https://github.com/login/oauth/authorize".to_string(),
            ..ProviderConfig::default()
        };
        assert_eq!(
            config.validate(),
            Err(vec!["client_secret", "token_url", "userinfo_url"])
        );
    }

    #[test]
    fn complete_provider_config_is_valid() {
        let config = ProviderConfig {
            client_id: "id".to_string(),
            client_secret: "secret".to_string(),
            auth_url: "https://github.com/login/oauth/authorize".to_string(),
            token_url: "https://github.com/login/oauth/access_token".to_string(),
            userinfo_url: "https://api.github.com/user".to_string(),
            scopes: "read:user, read:org".to_string(),
            ..ProviderConfig::default()
        };
        assert_eq!(config.validate(), Ok(()));
        assert_eq!(config.scopes(), vec!["read:user", "read:org"]);
    }
}
