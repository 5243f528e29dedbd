//! The build write policy.

use skygate_core::BuildId;
use skygate_platform_access::Identity;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, instrument, warn};

use crate::error::BuildAccessError;
use crate::types::{Build, BuildsDb};

/// Decides whether a caller may write to a build.
#[derive(Clone)]
pub struct BuildWritePolicy {
    builds: Arc<dyn BuildsDb>,
    lookup_timeout: Duration,
}

impl std::fmt::Debug for BuildWritePolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BuildWritePolicy")
            .field("lookup_timeout", &self.lookup_timeout)
            .finish_non_exhaustive()
    }
}

impl BuildWritePolicy {
    #[must_use]
    pub fn new(builds: Arc<dyn BuildsDb>, lookup_timeout: Duration) -> Self {
        Self {
            builds,
            lookup_timeout,
        }
    }

    /// Returns the build if `identity` may write to it through a request
    /// naming `team_name`.
    ///
    /// A missing build is reported before ownership is checked, and a
    /// failed lookup never grants access.
    ///
    /// # Errors
    ///
    /// Returns `NotAuthenticated`, `NotFound`, `LookupFailed`, or
    /// `Forbidden`, in that order of precedence.
    #[instrument(skip(self, identity), fields(user = identity.map(Identity::user_name)))]
    pub async fn authorize(
        &self,
        identity: Option<&Identity>,
        team_name: &str,
        build_id: BuildId,
    ) -> Result<Build, BuildAccessError> {
        let Some(identity) = identity.filter(|i| i.is_authenticated()) else {
            return Err(BuildAccessError::NotAuthenticated);
        };

        let build = match tokio::time::timeout(self.lookup_timeout, self.builds.build_by_id(build_id))
            .await
        {
            Ok(Ok(Some(build))) => build,
            Ok(Ok(None)) => return Err(BuildAccessError::NotFound { build_id }),
            Ok(Err(e)) => {
                return Err(BuildAccessError::LookupFailed {
                    build_id,
                    details: e.to_string(),
                });
            }
            Err(_) => {
                return Err(BuildAccessError::LookupFailed {
                    build_id,
                    details: "timed out".to_string(),
                });
            }
        };

        if !build.is_owned_by(identity.team_name()) || !build.is_owned_by(team_name) {
            warn!(
                caller_team = identity.team_name(),
                requested_team = team_name,
                owner = %build.team_name,
                "build write denied"
            );
            return Err(BuildAccessError::Forbidden { build_id });
        }

        debug!("build write allowed");
        Ok(build)
    }
}
