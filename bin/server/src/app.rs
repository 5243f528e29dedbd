//! Top-level application router.

use axum::{Router, routing::get};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use crate::{api, auth::{AppState, routes}};

/// Assembles the login routes and the API into one router.
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(|| async { "ok" }))
        .merge(routes::router())
        .merge(api::router(state.clone()))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{FakeBuilds, FakeProvider, FakeTeams, app_state, team};
    use axum::{
        body::Body,
        http::{Request, StatusCode},
    };
    use tower::ServiceExt;

    fn app() -> Router {
        router(app_state(
            FakeTeams::with(vec![team("main", "github", &["alice"])]),
            Arc::new(FakeProvider::new("alice")),
            FakeBuilds::default(),
        ))
    }

    async fn status(uri: &str) -> StatusCode {
        app()
            .oneshot(Request::builder().uri(uri).body(Body::empty()).expect("request"))
            .await
            .expect("response")
            .status()
    }

    #[tokio::test]
    async fn serves_login_and_api_routes() {
        assert_eq!(status("/health").await, StatusCode::OK);
        assert_eq!(status("/auth/main/github").await, StatusCode::SEE_OTHER);
        assert_eq!(status("/oauth/v1/main/github").await, StatusCode::SEE_OTHER);
        assert_eq!(status("/api/v1/user").await, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn unknown_route_is_not_found() {
        assert_eq!(status("/nope").await, StatusCode::NOT_FOUND);
    }
}
