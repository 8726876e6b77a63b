use std::path::PathBuf;

use anyhow::Context;
use async_trait::async_trait;
use git_http::{Repository, RepositoryProvider};
use sqlx::SqlitePool;

use super::db::fetch_repository;
use crate::validation::slug::{validate_repository_name, validate_slug};

/// SQLite-backed resolver; bare repositories live under `local_root`.
#[derive(Clone)]
pub struct RepositoryStorage {
    pool: SqlitePool,
    pub local_root: PathBuf,
}

impl RepositoryStorage {
    pub fn new(pool: SqlitePool, local_root: PathBuf) -> Self {
        RepositoryStorage { pool, local_root }
    }

    pub fn get_repository_path(&self, owner: &str, name: &str) -> PathBuf {
        self.local_root.join(owner).join(format!("{name}.git"))
    }
}

#[async_trait]
impl RepositoryProvider for RepositoryStorage {
    async fn resolve(&self, owner: &str, name: &str) -> anyhow::Result<Option<Repository>> {
        // Creation enforces these rules, so anything else cannot exist.
        if validate_slug(owner).is_err() || validate_repository_name(name).is_err() {
            return Ok(None);
        }

        let record = fetch_repository(&self.pool, owner, name)
            .await
            .with_context(|| format!("failed to look up {owner}/{name}"))?;
        record.map(Repository::try_from).transpose()
    }

    fn path_for(&self, repository: &Repository) -> PathBuf {
        self.get_repository_path(&repository.owner, &repository.name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::mutations::{CreateRepositoryInput, create_repository_raw};
    use crate::test_helpers::create_test_pool;
    use git_http::Visibility;

    #[tokio::test]
    async fn resolves_created_repositories() {
        let pool = create_test_pool().await.unwrap();
        create_repository_raw(
            &pool,
            CreateRepositoryInput {
                owner: "acme".into(),
                name: "widgets".into(),
                visibility: Visibility::Private,
            },
        )
        .await
        .unwrap();

        let storage = RepositoryStorage::new(pool, PathBuf::from("/srv/repos"));
        let repo = storage.resolve("acme", "widgets").await.unwrap().unwrap();
        assert_eq!(repo.visibility, Visibility::Private);
        assert_eq!(storage.path_for(&repo), PathBuf::from("/srv/repos/acme/widgets.git"));

        assert!(storage.resolve("acme", "missing").await.unwrap().is_none());
        assert!(storage.resolve("ACME", "widgets").await.unwrap().is_none());
    }
}
