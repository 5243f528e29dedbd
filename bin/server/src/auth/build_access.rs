//! Build write access gate.
//!
//! Runs after an [`AccessGate`](super::AccessGate) on routes of the form
//! `/teams/{team_name}/builds/{build_id}/...`. The caller's team and the
//! team in the path must both own the build; the authorized [`Build`] is
//! then attached to the request for the handler.

use axum::{
    extract::{Path, Request, State},
    middleware::Next,
    response::{IntoResponse, Response},
};
use serde::Deserialize;
use skygate_authz::Build;
use skygate_core::BuildId;
use skygate_platform_access::Identity;
use std::sync::Arc;

use super::AppState;
use crate::error::AuthError;

/// Path parameters identifying a team's build.
///
/// `build_id` stays raw until the caller is known to be authenticated, so an
/// anonymous request is answered with 401 whatever the path holds.
#[derive(Debug, Deserialize)]
pub struct BuildPathParams {
    pub team_name: String,
    pub build_id: String,
}

/// Middleware enforcing build ownership before the wrapped handler runs.
///
/// A `build_id` that is not an integer is rejected with 400 once the caller
/// is authenticated.
pub async fn build_write_access_gate(
    State(state): State<Arc<AppState>>,
    Path(params): Path<BuildPathParams>,
    mut request: Request,
    next: Next,
) -> Response {
    let Some(identity) = request
        .extensions()
        .get::<Identity>()
        .filter(|identity| identity.is_authenticated())
        .cloned()
    else {
        return AuthError::Unauthenticated.into_response();
    };

    let build_id = match params.build_id.parse::<BuildId>() {
        Ok(id) => id,
        Err(e) => {
            return AuthError::BadRequest {
                details: e.to_string(),
            }
            .into_response();
        }
    };

    match state
        .build_policy
        .authorize(Some(&identity), &params.team_name, build_id)
        .await
    {
        Ok(build) => {
            request.extensions_mut().insert::<Build>(build);
            next.run(request).await
        }
        Err(e) => AuthError::from(e).into_response(),
    }
}
