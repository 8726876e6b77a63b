//! Locating and reading `forge.ron`.

use super::Config;
use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

const CONFIG_ENV: &str = "FORGE_CONFIG_PATH";
const CANDIDATES: &[&str] = &["forge.ron", ".forge/config.ron"];

pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Config> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read config file: {}", path.display()))?;
    parse_ron(&content).with_context(|| format!("failed to parse config file: {}", path.display()))
}

/// `$FORGE_CONFIG_PATH`, then `forge.ron`, then `.forge/config.ron`.
/// A `FORGE_CONFIG_PATH` pointing nowhere is logged and skipped.
fn discover() -> Option<PathBuf> {
    if let Some(explicit) = std::env::var_os(CONFIG_ENV).map(PathBuf::from) {
        if explicit.is_file() {
            return Some(explicit);
        }
        tracing::warn!(path = %explicit.display(), "{CONFIG_ENV} set but file not found");
    }

    CANDIDATES.iter().map(PathBuf::from).find(|path| path.is_file())
}

/// Read the discovered file, or fall back to defaults when there is none.
pub fn load_with_discovery() -> Result<Config> {
    match discover() {
        Some(path) => {
            tracing::info!(path = %path.display(), "loading config");
            load_from_file(&path)
        }
        None => {
            tracing::info!("no config file found, using defaults");
            Ok(Config::default())
        }
    }
}

/// Discover, apply environment overrides and validate.
pub fn load() -> Result<Config> {
    let mut config = load_with_discovery()?;
    config.apply_env_overrides();
    config
        .validate()
        .map_err(|err| anyhow::anyhow!("invalid configuration: {err}"))?;
    Ok(config)
}

fn parse_ron(content: &str) -> Result<Config> {
    Ok(ron::from_str(content)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{LfsStorage, S3Settings};
    use tempfile::TempDir;

    #[test]
    fn empty_config_is_all_defaults() {
        let config = parse_ron("Config()").unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn every_section_parses() {
        let ron = r#"
Config(
    listen: "127.0.0.1:9000",
    public_url: Some("https://git.example.com"),
    paths: Paths(
        db: "/var/lib/forge/db",
        repos: "/var/lib/forge/repos",
    ),
    git: GitSettings(
        binary: "/usr/bin/git",
        timeout_ms: 30000,
        max_concurrent: 4,
    ),
    auth: AuthSettings(
        jwt_secret_env: "MY_SECRET",
        issuer: "forge.example.com",
    ),
    lfs: LfsSettings(
        require_auth: true,
        storage: S3(S3Settings(
            bucket: "forge-lfs",
            prefix: "lfs/",
            region: Some("eu-west-1"),
            endpoint: Some("http://minio:9000"),
        )),
    ),
)
        "#;

        let config = parse_ron(ron).unwrap();
        assert_eq!(config.listen, "127.0.0.1:9000");
        assert_eq!(config.public_url.as_deref(), Some("https://git.example.com"));
        assert_eq!(config.paths.repos, PathBuf::from("/var/lib/forge/repos"));
        assert_eq!(config.git.timeout_ms, 30000);
        assert_eq!(config.git.max_concurrent, 4);
        assert_eq!(config.auth.jwt_secret_env, "MY_SECRET");
        assert!(config.lfs.require_auth);
        assert_eq!(
            config.lfs.storage,
            LfsStorage::S3(S3Settings {
                bucket: "forge-lfs".to_string(),
                prefix: "lfs/".to_string(),
                region: Some("eu-west-1".to_string()),
                endpoint: Some("http://minio:9000".to_string()),
            })
        );
        assert!(config.validate().is_ok());
    }

    #[test]
    fn filesystem_storage_parses() {
        let ron = r#"Config(lfs: LfsSettings(storage: Filesystem("/srv/lfs")))"#;
        let config = parse_ron(ron).unwrap();
        assert_eq!(
            config.lfs.storage,
            LfsStorage::Filesystem(PathBuf::from("/srv/lfs"))
        );
        assert!(!config.lfs.require_auth);
    }

    #[test]
    fn file_overrides_merge_with_defaults() {
        let dir = TempDir::new().unwrap();
        let config_path = dir.path().join("forge.ron");
        std::fs::write(&config_path, r#"Config(git: GitSettings(max_concurrent: 2))"#).unwrap();

        let config = load_from_file(&config_path).unwrap();
        assert_eq!(config.git.max_concurrent, 2);
        assert_eq!(config.git.timeout_ms, 600_000);
    }

    #[test]
    fn missing_file_is_an_error() {
        assert!(load_from_file("/nonexistent/forge.ron").is_err());
    }

    #[test]
    fn garbage_is_an_error() {
        assert!(parse_ron("listen = 8000").is_err());
    }
}
