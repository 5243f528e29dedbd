//! JSON API routes behind the access gates.

use axum::{
    Extension, Json, Router,
    middleware::from_fn_with_state,
    routing::get,
};
use skygate_authz::Build;
use skygate_platform_access::Identity;
use std::sync::Arc;

use crate::auth::{
    AccessGate, AppState, CurrentIdentity, UnauthorizedRejector, build_write_access_gate,
    middleware::access_gate,
};

/// Builds the API router.
///
/// `/user` requires a session. The build routes admit anonymous callers
/// through the access gate and leave the decision to the build gate, which
/// answers 401 for them.
pub fn router(state: Arc<AppState>) -> Router<Arc<AppState>> {
    let required = AccessGate::required(state.issuer.clone(), UnauthorizedRejector);
    let optional = AccessGate::optional(state.issuer.clone(), UnauthorizedRejector);

    let user = Router::new()
        .route("/api/v1/user", get(current_user))
        .route_layer(from_fn_with_state(
            required,
            access_gate::<UnauthorizedRejector>,
        ));

    let builds = Router::new()
        .route(
            "/api/v1/teams/{team_name}/builds/{build_id}/write-access",
            get(build_write_access),
        )
        .route_layer(from_fn_with_state(state, build_write_access_gate))
        .route_layer(from_fn_with_state(
            optional,
            access_gate::<UnauthorizedRejector>,
        ));

    user.merge(builds)
}

/// Returns the caller's identity.
async fn current_user(CurrentIdentity(identity): CurrentIdentity) -> Json<Identity> {
    Json(identity)
}

/// Returns the build the caller may write to.
async fn build_write_access(Extension(build): Extension<Build>) -> Json<Build> {
    Json(build)
}
