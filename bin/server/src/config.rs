//! Centralized server configuration.
//!
//! This module provides strongly-typed configuration for the server,
//! loaded via the `config` crate from environment variables.
//!
//! See [`AuthConfig`] for login flow configuration and [`ProviderConfig`]
//! for identity provider clients.

use serde::Deserialize;
use skygate_platform_access::{AuthConfig, ProviderConfig};
use std::collections::HashMap;

/// Server configuration composed from library configs.
#[derive(Debug, Deserialize)]
pub struct ServerConfig {
    /// PostgreSQL database connection URL.
    pub database_url: String,

    /// Address the HTTP listener binds to.
    #[serde(default = "default_listen_addr")]
    pub listen_addr: String,

    /// Public base URL of this server, used to build OAuth callback URLs.
    pub external_url: String,

    /// Login flow configuration.
    pub auth: AuthConfig,

    /// Identity provider clients, keyed by provider name.
    #[serde(default)]
    pub providers: HashMap<String, ProviderConfig>,
}

fn default_listen_addr() -> String {
    "0.0.0.0:8080".to_string()
}

impl ServerConfig {
    /// Loads configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if required configuration is missing or invalid.
    pub fn from_env() -> Result<Self, config::ConfigError> {
        Self::from_source(config::Environment::default())
    }

    fn from_source(env: config::Environment) -> Result<Self, config::ConfigError> {
        config::Config::builder()
            .add_source(env.separator("__").try_parsing(true))
            .build()?
            .try_deserialize()
    }
}
