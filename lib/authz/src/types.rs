//! Builds and the build lookup collaborator.

use async_trait::async_trait;
use serde::Serialize;
use skygate_core::BuildId;

use crate::error::BuildLookupError;

/// A build as seen by ownership checks.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Build {
    pub id: BuildId,
    /// Name of the team that owns the build.
    pub team_name: String,
    /// Job the build belongs to. One-off builds have none.
    pub job_name: Option<String>,
    pub pipeline_name: Option<String>,
}

impl Build {
    /// Creates a one-off build owned by `team_name`.
    #[must_use]
    pub fn new(id: BuildId, team_name: impl Into<String>) -> Self {
        Self {
            id,
            team_name: team_name.into(),
            job_name: None,
            pipeline_name: None,
        }
    }

    /// Sets the pipeline and job the build ran for.
    #[must_use]
    pub fn with_job(mut self, pipeline_name: impl Into<String>, job_name: impl Into<String>) -> Self {
        self.pipeline_name = Some(pipeline_name.into());
        self.job_name = Some(job_name.into());
        self
    }

    /// Returns true if the build belongs to the named team.
    #[must_use]
    pub fn is_owned_by(&self, team_name: &str) -> bool {
        self.team_name == team_name
    }
}

/// Looks up builds in the persistence layer.
#[async_trait]
pub trait BuildsDb: Send + Sync {
    /// Finds a build by id. `Ok(None)` means the build does not exist.
    async fn build_by_id(&self, id: BuildId) -> skygate_core::Result<Option<Build>, BuildLookupError>;
}
