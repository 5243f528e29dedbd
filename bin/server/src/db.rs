//! Postgres-backed team and build lookups.
//!
//! Both repositories are read-only; the tables are owned by the CI
//! scheduler's schema.

use async_trait::async_trait;
use rootcause::prelude::Report;
use skygate_authz::{Build, BuildLookupError, BuildsDb};
use skygate_core::{BuildId, TeamId};
use skygate_platform_access::{Team, TeamAuthConfig, TeamFactory, TeamLookupError};
use sqlx::{FromRow, PgPool, types::Json};
use std::collections::HashMap;

/// Row type for team queries.
#[derive(FromRow)]
struct TeamRow {
    id: i64,
    name: String,
    admin: bool,
    auth: Option<Json<HashMap<String, TeamAuthConfig>>>,
}

impl From<TeamRow> for Team {
    fn from(row: TeamRow) -> Self {
        Team::new(
            TeamId::new(row.id),
            row.name,
            row.admin,
            row.auth.map(|Json(auth)| auth).unwrap_or_default(),
        )
    }
}

/// Team lookups for the login flow.
#[derive(Debug, Clone)]
pub struct PgTeamFactory {
    pool: PgPool,
}

impl PgTeamFactory {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl TeamFactory for PgTeamFactory {
    async fn find_team(&self, name: &str) -> Result<Option<Team>, Report<TeamLookupError>> {
        let row: Option<TeamRow> = sqlx::query_as(
            r#"
            SELECT id, name, admin, auth
            FROM teams
            WHERE name = $1
            "#,
        )
        .bind(name)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::ColumnDecode { source, .. } => TeamLookupError::Corrupt {
                team: name.to_string(),
                details: source.to_string(),
            },
            e => TeamLookupError::Unavailable {
                details: e.to_string(),
            },
        })?;

        Ok(row.map(Team::from))
    }
}

/// Row type for build queries.
#[derive(FromRow)]
struct BuildRow {
    id: i64,
    team_name: String,
    pipeline_name: Option<String>,
    job_name: Option<String>,
}

impl From<BuildRow> for Build {
    fn from(row: BuildRow) -> Self {
        Build {
            id: BuildId::new(row.id),
            team_name: row.team_name,
            pipeline_name: row.pipeline_name,
            job_name: row.job_name,
        }
    }
}

/// Build lookups for write access checks.
#[derive(Debug, Clone)]
pub struct PgBuildsDb {
    pool: PgPool,
}

impl PgBuildsDb {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl BuildsDb for PgBuildsDb {
    async fn build_by_id(&self, id: BuildId) -> Result<Option<Build>, Report<BuildLookupError>> {
        // One-off builds have no job, hence the outer joins.
        let row: Option<BuildRow> = sqlx::query_as(
            r#"
            SELECT b.id, t.name AS team_name, p.name AS pipeline_name, j.name AS job_name
            FROM builds b
            JOIN teams t ON t.id = b.team_id
            LEFT JOIN jobs j ON j.id = b.job_id
            LEFT JOIN pipelines p ON p.id = j.pipeline_id
            WHERE b.id = $1
            "#,
        )
        .bind(id.get())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| BuildLookupError::Unavailable {
            details: e.to_string(),
        })?;

        Ok(row.map(Build::from))
    }
}
