//! Static `info/refs` for clients that do not speak the smart protocol.

use std::path::Path;

use axum::http::header;
use axum::response::{IntoResponse, Response};

use crate::errors::GitHttpError;
use crate::process::GitCommand;

/// Regenerate `info/refs` and serve it verbatim.
///
/// A failing `git update-server-info` is logged only; whatever file is on
/// disk afterwards is served.
pub async fn serve_info_refs(git_binary: &Path, repo_dir: &Path) -> Result<Response, GitHttpError> {
    let cmd = GitCommand::new(git_binary, repo_dir).arg("update-server-info");
    match cmd.output().await {
        Ok(output) if output.status.success() => {}
        Ok(output) => tracing::warn!(
            status = %output.status,
            stderr = %String::from_utf8_lossy(&output.stderr).trim(),
            "git update-server-info failed"
        ),
        Err(err) => tracing::warn!(error = %err, "git update-server-info failed"),
    }

    let refs_path = repo_dir.join("info").join("refs");
    match tokio::fs::read(&refs_path).await {
        Ok(body) => Ok((
            [
                (header::CONTENT_TYPE, "text/plain"),
                (header::CACHE_CONTROL, "no-cache"),
            ],
            body,
        )
            .into_response()),
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => Err(GitHttpError::NotFound),
        Err(err) => Err(GitHttpError::Internal(format!(
            "failed to read {}: {err}",
            refs_path.display()
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const NO_GIT: &str = "/nonexistent/git";

    #[tokio::test]
    async fn missing_refs_file_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let result = serve_info_refs(Path::new(NO_GIT), dir.path()).await;
        assert!(matches!(result, Err(GitHttpError::NotFound)));
    }

    #[tokio::test]
    async fn existing_refs_file_is_served_when_git_fails() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("info")).unwrap();
        let line = "0123456789abcdef0123456789abcdef01234567\trefs/heads/main\n";
        std::fs::write(dir.path().join("info/refs"), line).unwrap();

        let resp = serve_info_refs(Path::new(NO_GIT), dir.path()).await.unwrap();
        assert_eq!(resp.headers().get(header::CONTENT_TYPE).unwrap(), "text/plain");
        let body = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        assert_eq!(&body[..], line.as_bytes());
    }
}
