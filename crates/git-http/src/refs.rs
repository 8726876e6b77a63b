use std::path::Path;
use std::time::{Duration, Instant};

use axum::extract::{Path as UrlPath, Query, State};
use axum::http::{HeaderMap, header};
use axum::response::{IntoResponse, Response};
use metrics::{counter, histogram};
use serde::Deserialize;

use crate::auth::{Operation, authorize};
use crate::dumb;
use crate::errors::GitHttpError;
use crate::pkt::{PKT_FLUSH, encode_pkt_line};
use crate::process::GitCommand;
use crate::repo::resolve_repository;
use crate::service::GitService;
use crate::state::GitHttpState;

#[derive(Debug, Deserialize)]
pub struct ServiceQuery {
    pub service: Option<String>,
}

/// `# service=<svc>\n` as a pkt-line followed by a flush.
pub fn service_header(service: GitService) -> anyhow::Result<Vec<u8>> {
    let mut out = encode_pkt_line(format!("# service={}\n", service.name()).as_bytes())?;
    out.extend_from_slice(PKT_FLUSH);
    Ok(out)
}

// GET /:owner/:repo(.git)?/info/refs?service=<svc>
#[tracing::instrument(skip_all, fields(%owner, %repo, service = ?q.service))]
pub async fn info_refs<S: GitHttpState>(
    State(state): State<S>,
    UrlPath((owner, repo)): UrlPath<(String, String)>,
    Query(q): Query<ServiceQuery>,
    headers: HeaderMap,
) -> Result<Response, GitHttpError> {
    let start = Instant::now();
    let (repository, repo_dir) = resolve_repository(state.storage(), &owner, &repo).await?;

    let service = q.service.as_deref().and_then(GitService::from_name);
    let operation = service.map(GitService::operation).unwrap_or(Operation::Fetch);
    authorize(state.tokens(), &headers, operation, repository.visibility).await?;

    state
        .initializer()
        .ensure_initialized(&repo_dir)
        .await
        .map_err(GitHttpError::from)?;

    let resp = match service {
        Some(service) => advertise_refs(&state, service, &repo_dir, &headers).await,
        None => dumb::serve_info_refs(state.git_binary(), &repo_dir).await,
    };

    let label = service.map(GitService::name).unwrap_or("dumb");
    counter!("git_http.info_refs", "service" => label).increment(1);
    histogram!("git_http.info_refs_ms", "service" => label).record(start.elapsed().as_millis() as f64);
    resp
}

async fn advertise_refs<S: GitHttpState>(
    state: &S,
    service: GitService,
    repo_dir: &Path,
    headers: &HeaderMap,
) -> Result<Response, GitHttpError> {
    let _permit = state
        .git_semaphore()
        .clone()
        .acquire_owned()
        .await
        .map_err(GitHttpError::internal)?;

    let cmd = GitCommand::new(state.git_binary(), repo_dir)
        .arg(service.subcommand())
        .args(["--stateless-rpc", "--advertise-refs", "."])
        .git_protocol(headers);

    let timeout = Duration::from_millis(state.git_timeout_ms());
    let output = match tokio::time::timeout(timeout, cmd.output()).await {
        Ok(output) => output?,
        Err(_) => {
            tracing::warn!(command = %cmd, "ref advertisement timed out");
            return Err(GitHttpError::Timeout);
        }
    };

    if !output.status.success() {
        tracing::warn!(
            command = %cmd,
            status = %output.status,
            stderr = %String::from_utf8_lossy(&output.stderr).trim(),
            "ref advertisement failed"
        );
        return Err(GitHttpError::Internal(format!("{cmd} exited with {}", output.status)));
    }
    if !output.stderr.is_empty() {
        tracing::debug!(stderr = %String::from_utf8_lossy(&output.stderr).trim(), "git stderr");
    }

    let mut body = service_header(service)?;
    body.extend_from_slice(&output.stdout);

    Ok((
        [
            (header::CONTENT_TYPE, service.advertisement_content_type()),
            (header::CACHE_CONTROL, "no-cache"),
        ],
        body,
    )
        .into_response())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn upload_pack_service_header() {
        let header = service_header(GitService::UploadPack).unwrap();
        assert_eq!(header, b"001e# service=git-upload-pack\n0000");
    }

    #[test]
    fn receive_pack_service_header() {
        let header = service_header(GitService::ReceivePack).unwrap();
        assert_eq!(header, b"001f# service=git-receive-pack\n0000");
    }
}
