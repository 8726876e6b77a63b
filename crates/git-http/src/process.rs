//! Spawning the `git` binary.
//!
//! Pack negotiation and object encoding stay inside `git`; this module is
//! the only place that builds command lines for it.

use std::ffi::OsString;
use std::path::PathBuf;
use std::process::{Output, Stdio};

use anyhow::{Context, Result};
use axum::http::HeaderMap;
use tokio::process::{Child, Command};

/// A `git` invocation run with the repository directory as its working directory.
#[derive(Debug, Clone)]
pub struct GitCommand {
    binary: PathBuf,
    repo_dir: PathBuf,
    args: Vec<OsString>,
    envs: Vec<(String, String)>,
}

impl GitCommand {
    pub fn new(binary: impl Into<PathBuf>, repo_dir: impl Into<PathBuf>) -> Self {
        Self {
            binary: binary.into(),
            repo_dir: repo_dir.into(),
            args: Vec::new(),
            envs: Vec::new(),
        }
    }

    pub fn arg(mut self, arg: impl Into<OsString>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, A>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = A>,
        A: Into<OsString>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.envs.push((key.into(), value.into()));
        self
    }

    /// Forward the client's `Git-Protocol` header so `git` can speak v2.
    pub fn git_protocol(self, headers: &HeaderMap) -> Self {
        match headers.get("Git-Protocol").and_then(|v| v.to_str().ok()) {
            Some(v) => self.env("GIT_PROTOCOL", v),
            None => self,
        }
    }

    fn command(&self) -> Command {
        let mut cmd = Command::new(&self.binary);
        cmd.args(&self.args)
            .current_dir(&self.repo_dir)
            .envs(self.envs.iter().map(|(k, v)| (k.as_str(), v.as_str())))
            .kill_on_drop(true);
        cmd
    }

    /// Run to completion with empty stdin, capturing stdout and stderr.
    pub async fn output(&self) -> Result<Output> {
        self.command()
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await
            .with_context(|| format!("failed to run {self}"))
    }

    /// Spawn with all three standard streams piped.
    pub fn spawn_piped(&self) -> Result<Child> {
        self.command()
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .with_context(|| format!("failed to spawn {self}"))
    }
}

impl std::fmt::Display for GitCommand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.binary.display())?;
        for arg in &self.args {
            write!(f, " {}", arg.to_string_lossy())?;
        }
        Ok(())
    }
}
