use std::path::Path;
use std::str::FromStr;
use std::sync::Arc;

use anyhow::Result;
use git_http::FsObjectStore;
use sqlx::{
    SqlitePool,
    sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions},
};

use crate::app::AppState;
use crate::auth::JwtTokenValidator;
use crate::config::Config;
use crate::repository::RepositoryStorage;

pub const TEST_SECRET: &[u8] = b"forge-test-secret";

/// Creates an in-memory SQLite pool for testing
pub async fn create_test_pool() -> Result<SqlitePool> {
    let connect_options = SqliteConnectOptions::from_str("sqlite::memory:")?
        .journal_mode(SqliteJournalMode::Wal)
        .foreign_keys(true);

    let pool = SqlitePoolOptions::new()
        .max_connections(1) // In-memory databases should use a single connection
        .connect_with(connect_options)
        .await?;

    sqlx::migrate!("./migrations").run(&pool).await?;

    Ok(pool)
}

/// App state over `pool` with repositories and LFS objects under `root`,
/// validating tokens signed with [`TEST_SECRET`].
pub fn test_app_state(config: &Config, pool: SqlitePool, root: &Path) -> AppState {
    let storage = RepositoryStorage::new(pool, root.join("repos"));
    let tokens = JwtTokenValidator::new(TEST_SECRET, &config.auth.issuer);
    let objects = Arc::new(FsObjectStore::new(root.join("lfs")));
    AppState::new(config, storage, tokens, objects)
}
