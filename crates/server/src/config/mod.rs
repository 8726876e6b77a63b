//! Configuration management for Forge
//!
//! Configuration is stored in RON format. Every section is optional; a
//! missing file yields a fully defaulted configuration suitable for local
//! development.

pub mod loader;

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Top-level configuration for the Forge Git server
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct Config {
    /// Socket address the HTTP server binds to
    #[serde(default = "default_listen")]
    pub listen: String,

    /// Externally visible base URL, used for LFS action hrefs.
    /// When unset the request `Host` header is used.
    #[serde(default)]
    pub public_url: Option<String>,

    #[serde(default)]
    pub paths: Paths,

    #[serde(default)]
    pub git: GitSettings,

    #[serde(default)]
    pub auth: AuthSettings,

    #[serde(default)]
    pub lfs: LfsSettings,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            listen: default_listen(),
            public_url: None,
            paths: Paths::default(),
            git: GitSettings::default(),
            auth: AuthSettings::default(),
            lfs: LfsSettings::default(),
        }
    }
}

/// On-disk locations
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct Paths {
    /// Directory holding `forge.db`
    #[serde(default = "default_db_path")]
    pub db: PathBuf,

    /// Root under which bare repositories live as `<owner>/<name>.git`
    #[serde(default = "default_repos_path")]
    pub repos: PathBuf,
}

impl Default for Paths {
    fn default() -> Self {
        Self {
            db: default_db_path(),
            repos: default_repos_path(),
        }
    }
}

/// Settings for spawning the `git` binary
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct GitSettings {
    #[serde(default = "default_git_binary")]
    pub binary: PathBuf,

    /// Per-request budget for a git subprocess, in milliseconds
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,

    /// Upper bound on concurrently running git subprocesses
    #[serde(default = "default_max_concurrent")]
    pub max_concurrent: usize,
}

impl Default for GitSettings {
    fn default() -> Self {
        Self {
            binary: default_git_binary(),
            timeout_ms: default_timeout_ms(),
            max_concurrent: default_max_concurrent(),
        }
    }
}

/// Bearer token settings
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct AuthSettings {
    /// Environment variable holding the HS256 signing secret
    #[serde(default = "default_jwt_secret_env")]
    pub jwt_secret_env: String,

    /// Expected `iss` claim
    #[serde(default = "default_issuer")]
    pub issuer: String,
}

impl Default for AuthSettings {
    fn default() -> Self {
        Self {
            jwt_secret_env: default_jwt_secret_env(),
            issuer: default_issuer(),
        }
    }
}

impl AuthSettings {
    /// Read the signing secret from the configured environment variable
    pub fn resolve_secret(&self) -> Option<String> {
        std::env::var(&self.jwt_secret_env)
            .ok()
            .filter(|secret| !secret.is_empty())
    }
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Default)]
pub struct LfsSettings {
    /// Require a bearer token on every LFS endpoint
    #[serde(default)]
    pub require_auth: bool,

    #[serde(default)]
    pub storage: LfsStorage,
}

/// Backend for LFS objects, selected once at startup
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub enum LfsStorage {
    /// Local directory root
    Filesystem(PathBuf),

    /// S3 or an S3-compatible service
    S3(S3Settings),
}

impl Default for LfsStorage {
    fn default() -> Self {
        LfsStorage::Filesystem(PathBuf::from(".forge/lfs"))
    }
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct S3Settings {
    pub bucket: String,

    /// Prepended to every object key (e.g. "lfs/")
    #[serde(default)]
    pub prefix: String,

    #[serde(default)]
    pub region: Option<String>,

    /// Custom endpoint for S3-compatible services (MinIO, R2, ...)
    #[serde(default)]
    pub endpoint: Option<String>,
}

impl Config {
    /// `FORGE_DB_PATH` and `FORGE_REPOS_PATH` take precedence over the file.
    pub fn apply_env_overrides(&mut self) {
        if let Ok(db) = std::env::var("FORGE_DB_PATH") {
            self.paths.db = PathBuf::from(db);
        }
        if let Ok(repos) = std::env::var("FORGE_REPOS_PATH") {
            self.paths.repos = PathBuf::from(repos);
        }
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), String> {
        self.listen
            .parse::<std::net::SocketAddr>()
            .map_err(|_| format!("listen address '{}' is not a socket address", self.listen))?;

        if let Some(public_url) = &self.public_url {
            let url = url::Url::parse(public_url)
                .map_err(|err| format!("public_url '{}' is invalid: {}", public_url, err))?;
            if !matches!(url.scheme(), "http" | "https") {
                return Err(format!("public_url '{}' must be http(s)", public_url));
            }
        }

        if self.git.timeout_ms == 0 {
            return Err("git.timeout_ms must be greater than zero".to_string());
        }
        if self.git.max_concurrent == 0 {
            return Err("git.max_concurrent must be greater than zero".to_string());
        }
        if self.auth.issuer.is_empty() {
            return Err("auth.issuer cannot be empty".to_string());
        }

        if let LfsStorage::S3(s3) = &self.lfs.storage {
            if s3.bucket.trim().is_empty() {
                return Err("lfs S3 bucket cannot be empty".to_string());
            }
        }

        Ok(())
    }
}

fn default_listen() -> String {
    "0.0.0.0:8000".to_string()
}

fn default_db_path() -> PathBuf {
    PathBuf::from(".forge/db")
}

fn default_repos_path() -> PathBuf {
    PathBuf::from(".forge/repos")
}

fn default_git_binary() -> PathBuf {
    PathBuf::from("git")
}

fn default_timeout_ms() -> u64 {
    600_000
}

fn default_max_concurrent() -> usize {
    32
}

fn default_jwt_secret_env() -> String {
    "FORGE_JWT_SECRET".to_string()
}

fn default_issuer() -> String {
    "forge".to_string()
}
