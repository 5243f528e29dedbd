use skygate_authz::BuildWritePolicy;
use skygate_platform_access::{ProviderRegistry, ProviderResolver};
use skygate_server::{
    app,
    auth::{self, AppState, FlowSettings, GenericOAuthProvider},
    config::ServerConfig,
    db::{PgBuildsDb, PgTeamFactory},
};
use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration from environment
    let config = ServerConfig::from_env().expect("failed to load configuration");
    tracing::info!("Loaded configuration");

    let issuer = Arc::new(auth::load_token_issuer(&config.auth).expect("failed to load signing keys"));

    let db_pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&config.database_url)
        .await
        .expect("failed to connect to database");

    let mut registry = ProviderRegistry::new();
    for (name, provider_config) in config.providers {
        match GenericOAuthProvider::new(name.clone(), provider_config) {
            Ok(provider) => {
                tracing::info!(provider = %name, "Registered identity provider");
                registry.register(name, Arc::new(provider));
            }
            // A half-configured provider is skipped so the others still work.
            Err(e) => tracing::error!(provider = %name, error = %e, "Skipping identity provider"),
        }
    }
    if registry.is_empty() {
        tracing::warn!("No identity providers configured; logins will fail");
    }

    let lookup_timeout = config.auth.lookup_timeout();
    let resolver = ProviderResolver::new(
        Arc::new(PgTeamFactory::new(db_pool.clone())),
        registry,
        lookup_timeout,
    );
    let build_policy = BuildWritePolicy::new(Arc::new(PgBuildsDb::new(db_pool)), lookup_timeout);
    let settings = FlowSettings::from_config(&config.auth, config.external_url);

    let app_state = Arc::new(AppState::new(issuer, resolver, build_policy, settings));
    let app = app::router(app_state);

    let listener = tokio::net::TcpListener::bind(&config.listen_addr)
        .await
        .expect("failed to bind to address");

    tracing::info!("listening on http://{}", config.listen_addr);

    axum::serve(listener, app.into_make_service())
        .await
        .expect("server error");
}
