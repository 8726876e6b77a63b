//! In-memory collaborators for driving the router in tests.

#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use axum::Router;
use axum::body::Body;
use axum::http::{Request, Response};
use git_http::{
    AuthIdentity, FsObjectStore, GitHttpState, ObjectStore, RepoInitializer, Repository,
    RepositoryProvider, TokenValidator, Visibility,
};
use tempfile::TempDir;
use tokio::sync::Semaphore;
use tower::ServiceExt;

pub const TOKEN: &str = "s3cret";

pub struct MemoryRepos {
    root: PathBuf,
    repos: Vec<Repository>,
}

#[async_trait]
impl RepositoryProvider for MemoryRepos {
    async fn resolve(&self, owner: &str, name: &str) -> anyhow::Result<Option<Repository>> {
        Ok(self
            .repos
            .iter()
            .find(|r| r.owner == owner && r.name == name)
            .cloned())
    }

    fn path_for(&self, repository: &Repository) -> PathBuf {
        self.root
            .join(&repository.owner)
            .join(format!("{}.git", repository.name))
    }
}

pub struct StaticToken;

#[async_trait]
impl TokenValidator for StaticToken {
    async fn validate(&self, token: &str) -> anyhow::Result<AuthIdentity> {
        anyhow::ensure!(token == TOKEN, "unknown token");
        Ok(AuthIdentity {
            subject: "tester".into(),
        })
    }
}

struct Inner {
    repos: MemoryRepos,
    tokens: StaticToken,
    objects: FsObjectStore,
    initializer: RepoInitializer,
    semaphore: Arc<Semaphore>,
    git: PathBuf,
    lfs_require_auth: bool,
    _dir: TempDir,
}

#[derive(Clone)]
pub struct TestState(Arc<Inner>);

impl GitHttpState for TestState {
    type Storage = MemoryRepos;
    type Tokens = StaticToken;

    fn storage(&self) -> &MemoryRepos {
        &self.0.repos
    }

    fn tokens(&self) -> &StaticToken {
        &self.0.tokens
    }

    fn objects(&self) -> &dyn ObjectStore {
        &self.0.objects
    }

    fn initializer(&self) -> &RepoInitializer {
        &self.0.initializer
    }

    fn git_binary(&self) -> &Path {
        &self.0.git
    }

    fn git_semaphore(&self) -> &Arc<Semaphore> {
        &self.0.semaphore
    }

    fn git_timeout_ms(&self) -> u64 {
        60_000
    }

    fn lfs_public_url(&self) -> Option<&str> {
        None
    }

    fn lfs_require_auth(&self) -> bool {
        self.0.lfs_require_auth
    }
}

impl TestState {
    pub fn repos_root(&self) -> &Path {
        &self.0.repos.root
    }

    pub fn repo_path(&self, owner: &str, name: &str) -> PathBuf {
        self.repos_root().join(owner).join(format!("{name}.git"))
    }

    pub fn app(&self) -> Router {
        git_http::router::<TestState>().with_state(self.clone())
    }
}

pub struct TestStateBuilder {
    repos: Vec<Repository>,
    lfs_require_auth: bool,
}

impl TestStateBuilder {
    pub fn repo(mut self, owner: &str, name: &str, visibility: Visibility) -> Self {
        self.repos.push(Repository {
            id: format!("{owner}-{name}"),
            owner: owner.into(),
            name: name.into(),
            visibility,
        });
        self
    }

    pub fn lfs_require_auth(mut self, on: bool) -> Self {
        self.lfs_require_auth = on;
        self
    }

    pub fn build(self) -> TestState {
        let dir = tempfile::tempdir().expect("tempdir");
        let root = dir.path().join("repos");
        let objects = FsObjectStore::new(dir.path().join("lfs"));
        TestState(Arc::new(Inner {
            repos: MemoryRepos {
                root,
                repos: self.repos,
            },
            tokens: StaticToken,
            objects,
            initializer: RepoInitializer::new(),
            semaphore: Arc::new(Semaphore::new(4)),
            git: PathBuf::from("git"),
            lfs_require_auth: self.lfs_require_auth,
            _dir: dir,
        }))
    }
}

pub fn state() -> TestStateBuilder {
    TestStateBuilder {
        repos: Vec::new(),
        lfs_require_auth: false,
    }
}

pub async fn send(app: Router, req: Request<Body>) -> Response<Body> {
    app.oneshot(req).await.expect("router is infallible")
}

pub async fn body_bytes(resp: Response<Body>) -> Vec<u8> {
    axum::body::to_bytes(resp.into_body(), usize::MAX)
        .await
        .expect("read body")
        .to_vec()
}

/// Tests that spawn `git` bail out early when it is not installed.
pub fn git_available() -> bool {
    std::process::Command::new("git")
        .arg("--version")
        .output()
        .is_ok_and(|out| out.status.success())
}
