use anyhow::{Context, Result, bail};
use git_http::Visibility;
use sqlx::SqlitePool;

use super::db::{fetch_repository, repository_exists};
use super::models::RepositoryRecord;
use crate::validation::slug::{validate_repository_name, validate_slug};

#[derive(Debug, Clone)]
pub struct CreateRepositoryInput {
    pub owner: String,
    pub name: String,
    pub visibility: Visibility,
}

/// Insert a repository row. The bare repository itself is created lazily on
/// first access.
pub async fn create_repository_raw(
    pool: &SqlitePool,
    input: CreateRepositoryInput,
) -> Result<RepositoryRecord> {
    validate_slug(&input.owner)?;
    validate_repository_name(&input.name)?;

    if repository_exists(pool, &input.owner, &input.name)
        .await
        .context("failed to check for existing repository")?
    {
        bail!("repository {}/{} already exists", input.owner, input.name);
    }

    let id = cuid2::create_id();
    sqlx::query("INSERT INTO repositories (id, owner, name, visibility) VALUES (?, ?, ?, ?)")
        .bind(&id)
        .bind(&input.owner)
        .bind(&input.name)
        .bind(input.visibility.as_str())
        .execute(pool)
        .await
        .context("failed to insert repository")?;

    tracing::info!(%id, owner = %input.owner, name = %input.name, visibility = %input.visibility, "repository created");

    fetch_repository(pool, &input.owner, &input.name)
        .await?
        .context("repository vanished after insert")
}
