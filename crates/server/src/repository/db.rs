use super::models::RepositoryRecord;
use sqlx::SqlitePool;

pub async fn fetch_repository(
    pool: &SqlitePool,
    owner: &str,
    name: &str,
) -> Result<Option<RepositoryRecord>, sqlx::Error> {
    sqlx::query_as::<_, RepositoryRecord>(
        "SELECT id, owner, name, visibility, created_at FROM repositories WHERE owner = ? AND name = ?",
    )
    .bind(owner)
    .bind(name)
    .fetch_optional(pool)
    .await
}

pub async fn repository_exists(pool: &SqlitePool, owner: &str, name: &str) -> Result<bool, sqlx::Error> {
    let exists: Option<i64> =
        sqlx::query_scalar("SELECT 1 FROM repositories WHERE owner = ? AND name = ? LIMIT 1")
            .bind(owner)
            .bind(name)
            .fetch_optional(pool)
            .await?;

    Ok(exists.is_some())
}

pub async fn list_repositories(pool: &SqlitePool) -> Result<Vec<RepositoryRecord>, sqlx::Error> {
    sqlx::query_as::<_, RepositoryRecord>(
        "SELECT id, owner, name, visibility, created_at FROM repositories ORDER BY owner, name",
    )
    .fetch_all(pool)
    .await
}
