//! Stateless-RPC bridge: one `git <service> --stateless-rpc` per request.
//!
//! The handler spawns the process and returns the streaming response right
//! away. A driver task then runs three pipe copies concurrently:
//!
//! - request body → stdin (gunzipped when `Content-Encoding: gzip`), closing
//!   stdin at end of body;
//! - stdout → response body, chunk by chunk through a bounded channel;
//! - stderr → log.
//!
//! The driver kills the process as soon as the response body is dropped,
//! whether or not git is writing at that moment, and when the request
//! exceeds the git timeout.

use std::io;
use std::time::{Duration, Instant};

use axum::body::Body;
use axum::extract::{Path as UrlPath, State};
use axum::http::{HeaderMap, header};
use axum::response::{IntoResponse, Response};
use bytes::Bytes;
use futures::{StreamExt, TryStreamExt};
use metrics::{counter, histogram};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt};
use tokio::process::{Child, ChildStderr, ChildStdin, ChildStdout};
use tokio::sync::{OwnedSemaphorePermit, mpsc};
use tokio_stream::wrappers::ReceiverStream;
use tokio_util::io::{ReaderStream, StreamReader, SyncIoBridge};
use tracing::Instrument;

use crate::auth::authorize;
use crate::errors::GitHttpError;
use crate::process::GitCommand;
use crate::repo::resolve_repository;
use crate::service::GitService;
use crate::state::GitHttpState;

/// How much stderr is kept for the log line; the rest is drained and dropped.
const STDERR_LOG_LIMIT: usize = 64 * 1024;

/// Chunks buffered between the stdout copy and the HTTP body.
const STDOUT_CHANNEL_DEPTH: usize = 16;

// POST /:owner/:repo(.git)?/git-upload-pack
pub async fn upload_pack<S: GitHttpState>(
    State(state): State<S>,
    UrlPath((owner, repo)): UrlPath<(String, String)>,
    headers: HeaderMap,
    body: Body,
) -> Result<Response, GitHttpError> {
    service_rpc(state, GitService::UploadPack, owner, repo, headers, body).await
}

// POST /:owner/:repo(.git)?/git-receive-pack
pub async fn receive_pack<S: GitHttpState>(
    State(state): State<S>,
    UrlPath((owner, repo)): UrlPath<(String, String)>,
    headers: HeaderMap,
    body: Body,
) -> Result<Response, GitHttpError> {
    service_rpc(state, GitService::ReceivePack, owner, repo, headers, body).await
}

pub fn is_gzip(headers: &HeaderMap) -> bool {
    headers
        .get(header::CONTENT_ENCODING)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.trim().eq_ignore_ascii_case("gzip") || v.trim().eq_ignore_ascii_case("x-gzip"))
}

async fn service_rpc<S: GitHttpState>(
    state: S,
    service: GitService,
    owner: String,
    repo: String,
    headers: HeaderMap,
    body: Body,
) -> Result<Response, GitHttpError> {
    let (repository, repo_dir) = resolve_repository(state.storage(), &owner, &repo).await?;
    let identity = authorize(state.tokens(), &headers, service.operation(), repository.visibility).await?;

    // Unlike info/refs, the RPC endpoints never create the repository.
    if !tokio::fs::metadata(&repo_dir).await.is_ok_and(|m| m.is_dir()) {
        tracing::debug!(path = %repo_dir.display(), "repository missing on disk");
        return Err(GitHttpError::NotFound);
    }

    let permit = state
        .git_semaphore()
        .clone()
        .acquire_owned()
        .await
        .map_err(GitHttpError::internal)?;

    let cmd = GitCommand::new(state.git_binary(), &repo_dir)
        .arg(service.subcommand())
        .args(["--stateless-rpc", "."])
        .git_protocol(&headers);
    let mut child = cmd.spawn_piped()?;

    let (Some(stdin), Some(stdout), Some(stderr)) =
        (child.stdin.take(), child.stdout.take(), child.stderr.take())
    else {
        return Err(GitHttpError::internal("git process is missing a standard stream"));
    };

    let (tx, rx) = mpsc::channel::<io::Result<Bytes>>(STDOUT_CHANNEL_DEPTH);
    let pipes = RpcPipes {
        body,
        gzip: is_gzip(&headers),
        stdin,
        stdout,
        stderr,
        tx,
    };

    let span = tracing::info_span!(
        "git_rpc",
        service = service.name(),
        %owner,
        repo = %repository.name,
        subject = identity.as_ref().map(|i| i.subject.as_str()).unwrap_or("-"),
    );
    let timeout = Duration::from_millis(state.git_timeout_ms());
    tokio::spawn(drive_rpc(child, pipes, service, timeout, permit).instrument(span));

    Ok((
        [
            (header::CONTENT_TYPE, service.result_content_type()),
            (header::CACHE_CONTROL, "no-cache"),
        ],
        Body::from_stream(ReceiverStream::new(rx)),
    )
        .into_response())
}

struct RpcPipes {
    body: Body,
    gzip: bool,
    stdin: ChildStdin,
    stdout: ChildStdout,
    stderr: ChildStderr,
    tx: mpsc::Sender<io::Result<Bytes>>,
}

async fn drive_rpc(
    mut child: Child,
    pipes: RpcPipes,
    service: GitService,
    timeout: Duration,
    _permit: OwnedSemaphorePermit,
) {
    let start = Instant::now();
    let RpcPipes {
        body,
        gzip,
        stdin,
        stdout,
        stderr,
        tx,
    } = pipes;
    let client = tx.clone();

    let copies = async {
        let (fed, sent, logged) = tokio::join!(
            feed_stdin(body, gzip, stdin),
            pump_stdout(stdout, tx),
            drain_stderr(stderr),
        );
        match fed {
            Ok(n) => tracing::debug!(bytes = n, "request body delivered to git"),
            Err(err) => tracing::warn!(error = %err, "feeding git stdin failed"),
        }
        match sent {
            Ok(n) => tracing::debug!(bytes = n, "git output streamed"),
            Err(err) => tracing::warn!(error = %err, "streaming git stdout failed"),
        }
        match logged {
            Ok(text) if !text.is_empty() => tracing::warn!(stderr = %text.trim(), "git stderr"),
            Ok(_) => {}
            Err(err) => tracing::warn!(error = %err, "draining git stderr failed"),
        }
    };

    let kill_reason = tokio::select! {
        biased;
        _ = copies => None,
        _ = client.closed() => Some("client disconnected"),
        _ = tokio::time::sleep(timeout) => Some("timed out"),
    };
    if let Some(reason) = kill_reason {
        tracing::warn!(reason, "terminating git process");
        if let Err(err) = child.start_kill() {
            tracing::warn!(error = %err, "failed to kill git process");
        }
    }

    drop(client);

    let outcome = match child.wait().await {
        Ok(status) if status.success() && kill_reason.is_none() => "ok",
        Ok(status) => {
            tracing::warn!(%status, "git exited unsuccessfully");
            "failed"
        }
        Err(err) => {
            tracing::error!(error = %err, "failed to wait on git process");
            "failed"
        }
    };

    counter!("git_http.rpc", "service" => service.name(), "outcome" => outcome).increment(1);
    histogram!("git_http.rpc_ms", "service" => service.name()).record(start.elapsed().as_millis() as f64);
}

fn body_reader(body: Body) -> impl AsyncRead + Send + Unpin + 'static {
    StreamReader::new(body.into_data_stream().map_err(io::Error::other))
}

async fn feed_stdin(body: Body, gzip: bool, mut stdin: ChildStdin) -> anyhow::Result<u64> {
    let mut reader = body_reader(body);
    if gzip {
        let reader = SyncIoBridge::new(reader);
        let mut writer = SyncIoBridge::new(stdin);
        let copied = tokio::task::spawn_blocking(move || -> io::Result<u64> {
            let mut decoder = flate2::read::GzDecoder::new(reader);
            let n = std::io::copy(&mut decoder, &mut writer)?;
            writer.shutdown()?;
            Ok(n)
        })
        .await??;
        return Ok(copied);
    }

    let n = tokio::io::copy(&mut reader, &mut stdin).await?;
    stdin.shutdown().await?;
    Ok(n)
}

async fn pump_stdout(
    stdout: ChildStdout,
    tx: mpsc::Sender<io::Result<Bytes>>,
) -> anyhow::Result<u64> {
    let mut chunks = ReaderStream::new(stdout);
    let mut total = 0u64;
    while let Some(chunk) = chunks.next().await {
        let chunk = match chunk {
            Ok(chunk) => chunk,
            Err(err) => {
                let msg = err.to_string();
                // Abort the response so the client sees a truncated stream, not a short success.
                let _ = tx.send(Err(err)).await;
                anyhow::bail!("reading git stdout: {msg}");
            }
        };
        total += chunk.len() as u64;
        if tx.send(Ok(chunk)).await.is_err() {
            anyhow::bail!("client disconnected after {total} bytes");
        }
    }
    Ok(total)
}

async fn drain_stderr(mut stderr: ChildStderr) -> io::Result<String> {
    let mut kept = Vec::new();
    let mut buf = [0u8; 8192];
    loop {
        let n = stderr.read(&mut buf).await?;
        if n == 0 {
            break;
        }
        let room = STDERR_LOG_LIMIT.saturating_sub(kept.len());
        kept.extend_from_slice(&buf[..n.min(room)]);
    }
    Ok(String::from_utf8_lossy(&kept).into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;
    use std::io::Write;
    use std::process::Stdio;
    use std::sync::Arc;
    use tokio::sync::Semaphore;

    #[test]
    fn detects_gzip_encoding() {
        let mut headers = HeaderMap::new();
        assert!(!is_gzip(&headers));
        headers.insert(header::CONTENT_ENCODING, HeaderValue::from_static("gzip"));
        assert!(is_gzip(&headers));
        headers.insert(header::CONTENT_ENCODING, HeaderValue::from_static("identity"));
        assert!(!is_gzip(&headers));
    }

    #[tokio::test]
    async fn body_reader_yields_request_bytes() {
        let mut reader = body_reader(Body::from("0009done\n0000"));
        let mut out = Vec::new();
        reader.read_to_end(&mut out).await.unwrap();
        assert_eq!(out, b"0009done\n0000");
    }

    #[tokio::test]
    async fn gzip_body_is_decompressed_into_stdin() {
        // `cat` stands in for git: whatever reaches its stdin comes back on stdout.
        let Ok(mut child) = tokio::process::Command::new("cat")
            .stdin(std::process::Stdio::piped())
            .stdout(std::process::Stdio::piped())
            .spawn()
        else {
            return;
        };

        let mut encoder = flate2::write::GzEncoder::new(Vec::new(), flate2::Compression::default());
        encoder.write_all(b"0032want 0123456789abcdef0123456789abcdef01234567\n").unwrap();
        let compressed = encoder.finish().unwrap();

        let stdin = child.stdin.take().unwrap();
        let mut stdout = child.stdout.take().unwrap();
        let fed = feed_stdin(Body::from(compressed), true, stdin).await.unwrap();
        assert_eq!(fed, 0x32);

        let mut echoed = Vec::new();
        stdout.read_to_end(&mut echoed).await.unwrap();
        assert_eq!(echoed, b"0032want 0123456789abcdef0123456789abcdef01234567\n");
        assert!(child.wait().await.unwrap().success());
    }

    #[tokio::test]
    async fn dropped_response_kills_a_silent_git() {
        let Ok(mut child) = tokio::process::Command::new("sh")
            .args(["-c", "sleep 20"])
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
        else {
            return;
        };

        let semaphore = Arc::new(Semaphore::new(1));
        let permit = semaphore.clone().acquire_owned().await.unwrap();
        let (tx, rx) = mpsc::channel(STDOUT_CHANNEL_DEPTH);
        let pipes = RpcPipes {
            body: Body::empty(),
            gzip: false,
            stdin: child.stdin.take().unwrap(),
            stdout: child.stdout.take().unwrap(),
            stderr: child.stderr.take().unwrap(),
            tx,
        };
        let driver = tokio::spawn(drive_rpc(
            child,
            pipes,
            GitService::UploadPack,
            Duration::from_secs(60),
            permit,
        ));

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(!driver.is_finished());
        drop(rx);

        tokio::time::timeout(Duration::from_secs(1), driver)
            .await
            .expect("driver should stop once the client is gone")
            .unwrap();
        assert_eq!(semaphore.available_permits(), 1);
    }
}
