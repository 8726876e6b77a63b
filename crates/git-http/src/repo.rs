use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::errors::GitHttpError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Visibility {
    Public,
    Private,
}

impl Visibility {
    pub fn as_str(self) -> &'static str {
        match self {
            Visibility::Public => "public",
            Visibility::Private => "private",
        }
    }
}

impl fmt::Display for Visibility {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Visibility {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "public" => Ok(Visibility::Public),
            "private" => Ok(Visibility::Private),
            other => anyhow::bail!("unknown visibility `{other}`"),
        }
    }
}

/// Repository metadata as seen by the transport. Read-only here.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Repository {
    pub id: String,
    pub owner: String,
    pub name: String,
    pub visibility: Visibility,
}

/// Metadata resolver backing the Git endpoints.
#[async_trait]
pub trait RepositoryProvider: Send + Sync {
    /// Look up a repository. `Ok(None)` means it does not exist.
    async fn resolve(&self, owner: &str, name: &str) -> anyhow::Result<Option<Repository>>;

    /// Absolute on-disk location of the bare repository.
    fn path_for(&self, repository: &Repository) -> PathBuf;
}

/// Reject path segments that could escape the repository root.
pub fn validate_segment(segment: &str) -> Result<(), GitHttpError> {
    let ok = !segment.is_empty()
        && segment.len() <= 100
        && !segment.starts_with('.')
        && segment
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'));
    if ok {
        Ok(())
    } else {
        Err(GitHttpError::BadRequest(format!("invalid path segment `{segment}`")))
    }
}

/// Resolve `owner/name` (with or without a `.git` suffix) to a repository and its path.
pub async fn resolve_repository<P>(
    provider: &P,
    owner: &str,
    name: &str,
) -> Result<(Repository, PathBuf), GitHttpError>
where
    P: RepositoryProvider + ?Sized,
{
    let name = name.strip_suffix(".git").unwrap_or(name);
    validate_segment(owner)?;
    validate_segment(name)?;

    match provider.resolve(owner, name).await {
        Ok(Some(repository)) => {
            let path = provider.path_for(&repository);
            Ok((repository, path))
        }
        Ok(None) => {
            tracing::debug!(%owner, %name, "repository not found");
            Err(GitHttpError::NotFound)
        }
        Err(err) => Err(GitHttpError::Internal(format!(
            "failed to resolve {owner}/{name}: {err:#}"
        ))),
    }
}
