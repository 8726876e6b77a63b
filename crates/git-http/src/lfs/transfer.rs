//! Basic-transfer endpoints under `/git-lfs/objects/{oid}`.

use std::io;

use axum::body::Body;
use axum::extract::{Path as UrlPath, State};
use axum::http::{HeaderMap, StatusCode, header};
use axum::response::{IntoResponse, Response};
use futures::TryStreamExt;
use metrics::counter;
use tokio_util::io::{ReaderStream, StreamReader};

use super::store::ObjectReader;
use super::{lfs_gate, require_valid_oid};
use crate::errors::GitHttpError;
use crate::state::GitHttpState;

fn declared_length(headers: &HeaderMap) -> Result<Option<u64>, GitHttpError> {
    match headers.get(header::CONTENT_LENGTH) {
        None => Ok(None),
        Some(value) => value
            .to_str()
            .ok()
            .and_then(|v| v.trim().parse::<u64>().ok())
            .map(Some)
            .ok_or_else(|| GitHttpError::BadRequest("invalid Content-Length".into())),
    }
}

// POST|PUT /git-lfs/objects/{oid}
#[tracing::instrument(skip_all, fields(%oid))]
pub async fn upload<S: GitHttpState>(
    State(state): State<S>,
    UrlPath(oid): UrlPath<String>,
    headers: HeaderMap,
    body: Body,
) -> Result<StatusCode, GitHttpError> {
    lfs_gate(&state, &headers).await?;
    require_valid_oid(&oid)?;
    let expected = declared_length(&headers)?;

    let reader: ObjectReader = Box::pin(StreamReader::new(
        body.into_data_stream().map_err(io::Error::other),
    ));
    let stored = state.objects().upload(&oid, reader, expected).await.map_err(|err| {
        tracing::error!(error = %err, "lfs upload failed");
        GitHttpError::from(err)
    })?;

    tracing::info!(bytes = stored, "lfs object stored");
    counter!("git_http.lfs.upload").increment(1);
    counter!("git_http.lfs.upload_bytes").increment(stored);
    Ok(StatusCode::OK)
}

// GET /git-lfs/objects/{oid}
#[tracing::instrument(skip_all, fields(%oid))]
pub async fn download<S: GitHttpState>(
    State(state): State<S>,
    UrlPath(oid): UrlPath<String>,
    headers: HeaderMap,
) -> Result<Response, GitHttpError> {
    lfs_gate(&state, &headers).await?;
    require_valid_oid(&oid)?;

    let object = state
        .objects()
        .download(&oid)
        .await
        .map_err(|err| {
            tracing::error!(error = %err, "lfs download failed");
            GitHttpError::from(err)
        })?
        .ok_or(GitHttpError::NotFound)?;

    counter!("git_http.lfs.download").increment(1);
    counter!("git_http.lfs.download_bytes").increment(object.size);
    Ok((
        [
            (header::CONTENT_TYPE, "application/octet-stream".to_string()),
            (header::CONTENT_LENGTH, object.size.to_string()),
        ],
        Body::from_stream(ReaderStream::new(object.reader)),
    )
        .into_response())
}

// HEAD /git-lfs/objects/{oid}
pub async fn verify<S: GitHttpState>(
    State(state): State<S>,
    UrlPath(oid): UrlPath<String>,
    headers: HeaderMap,
) -> Result<StatusCode, GitHttpError> {
    lfs_gate(&state, &headers).await?;
    require_valid_oid(&oid)?;

    match state.objects().exists(&oid).await {
        Ok(true) => Ok(StatusCode::OK),
        Ok(false) => Err(GitHttpError::NotFound),
        Err(err) => {
            tracing::error!(%oid, error = %err, "lfs verify failed");
            Err(GitHttpError::from(err))
        }
    }
}
