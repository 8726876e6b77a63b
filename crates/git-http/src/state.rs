use std::path::Path;
use std::sync::Arc;

use tokio::sync::Semaphore;

use crate::auth::TokenValidator;
use crate::init::RepoInitializer;
use crate::lfs::ObjectStore;
use crate::repo::RepositoryProvider;

/// Abstraction over the state required by Git HTTP handlers.
pub trait GitHttpState: Clone + Send + Sync + 'static {
    type Storage: RepositoryProvider;
    type Tokens: TokenValidator;

    fn storage(&self) -> &Self::Storage;
    fn tokens(&self) -> &Self::Tokens;
    fn objects(&self) -> &dyn ObjectStore;
    fn initializer(&self) -> &RepoInitializer;

    fn git_binary(&self) -> &Path;
    fn git_semaphore(&self) -> &Arc<Semaphore>;
    fn git_timeout_ms(&self) -> u64;

    /// Base URL used for LFS action hrefs. `None` derives it from the `Host` header.
    fn lfs_public_url(&self) -> Option<&str>;
    fn lfs_require_auth(&self) -> bool;
}
