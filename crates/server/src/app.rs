use std::path::{Path, PathBuf};
use std::sync::Arc;

use git_http::{GitHttpState, ObjectStore, RepoInitializer};
use tokio::sync::Semaphore;

use crate::auth::JwtTokenValidator;
use crate::config::Config;
use crate::repository::RepositoryStorage;

struct Inner {
    storage: RepositoryStorage,
    tokens: JwtTokenValidator,
    objects: Arc<dyn ObjectStore>,
    initializer: RepoInitializer,
    semaphore: Arc<Semaphore>,
    git_binary: PathBuf,
    git_timeout_ms: u64,
    public_url: Option<String>,
    lfs_require_auth: bool,
}

/// Shared handler state: the SQLite resolver, JWT validator and LFS store.
#[derive(Clone)]
pub struct AppState(Arc<Inner>);

impl AppState {
    pub fn new(
        config: &Config,
        storage: RepositoryStorage,
        tokens: JwtTokenValidator,
        objects: Arc<dyn ObjectStore>,
    ) -> Self {
        let public_url = config
            .public_url
            .as_ref()
            .map(|url| url.trim_end_matches('/').to_string());

        AppState(Arc::new(Inner {
            storage,
            tokens,
            objects,
            initializer: RepoInitializer::new(),
            semaphore: Arc::new(Semaphore::new(config.git.max_concurrent)),
            git_binary: config.git.binary.clone(),
            git_timeout_ms: config.git.timeout_ms,
            public_url,
            lfs_require_auth: config.lfs.require_auth,
        }))
    }
}

impl GitHttpState for AppState {
    type Storage = RepositoryStorage;
    type Tokens = JwtTokenValidator;

    fn storage(&self) -> &RepositoryStorage {
        &self.0.storage
    }

    fn tokens(&self) -> &JwtTokenValidator {
        &self.0.tokens
    }

    fn objects(&self) -> &dyn ObjectStore {
        self.0.objects.as_ref()
    }

    fn initializer(&self) -> &RepoInitializer {
        &self.0.initializer
    }

    fn git_binary(&self) -> &Path {
        &self.0.git_binary
    }

    fn git_semaphore(&self) -> &Arc<Semaphore> {
        &self.0.semaphore
    }

    fn git_timeout_ms(&self) -> u64 {
        self.0.git_timeout_ms
    }

    fn lfs_public_url(&self) -> Option<&str> {
        self.0.public_url.as_deref()
    }

    fn lfs_require_auth(&self) -> bool {
        self.0.lfs_require_auth
    }
}
