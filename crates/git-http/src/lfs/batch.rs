//! `POST /git-lfs/objects/batch`: decide per object what the client should
//! do next. No object bytes move here.

use std::collections::BTreeMap;

use axum::extract::State;
use axum::http::{HeaderMap, StatusCode, header};
use axum::response::{IntoResponse, Response};
use bytes::Bytes;
use futures::{StreamExt, TryStreamExt};
use metrics::counter;
use serde::{Deserialize, Serialize};

use super::store::ObjectStore;
use super::{LFS_MEDIA_TYPE, is_valid_oid, lfs_gate};
use crate::errors::GitHttpError;
use crate::state::GitHttpState;

/// Existence checks in flight per batch request.
const EXISTS_CONCURRENCY: usize = 8;

#[derive(Debug, Clone, Deserialize)]
pub struct BatchRequest {
    pub operation: String,
    #[serde(default)]
    pub objects: Vec<ObjectSpec>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct ObjectSpec {
    pub oid: String,
    pub size: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatchOperation {
    Upload,
    Download,
}

impl BatchOperation {
    pub fn parse(operation: &str) -> Result<Self, GitHttpError> {
        match operation {
            "upload" => Ok(BatchOperation::Upload),
            "download" => Ok(BatchOperation::Download),
            other => Err(GitHttpError::BadRequest(format!("unsupported operation `{other}`"))),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            BatchOperation::Upload => "upload",
            BatchOperation::Download => "download",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BatchResponse {
    pub transfer: &'static str,
    pub objects: Vec<BatchEntry>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BatchEntry {
    pub oid: String,
    pub size: u64,
    pub authenticated: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub actions: Option<Actions>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ObjectError>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Actions {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub upload: Option<Link>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub download: Option<Link>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Link {
    pub href: String,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub header: BTreeMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ObjectError {
    pub code: u16,
    pub message: String,
}

impl BatchEntry {
    fn with_action(spec: ObjectSpec, operation: BatchOperation, link: Link) -> Self {
        let actions = match operation {
            BatchOperation::Upload => Actions {
                upload: Some(link),
                download: None,
            },
            BatchOperation::Download => Actions {
                upload: None,
                download: Some(link),
            },
        };
        BatchEntry {
            oid: spec.oid,
            size: spec.size,
            authenticated: false,
            actions: Some(actions),
            error: None,
        }
    }

    fn with_error(spec: ObjectSpec, code: StatusCode, message: &str) -> Self {
        BatchEntry {
            oid: spec.oid,
            size: spec.size,
            authenticated: false,
            actions: None,
            error: Some(ObjectError {
                code: code.as_u16(),
                message: message.to_string(),
            }),
        }
    }
}

/// Where action hrefs point and which headers clients should send with them.
#[derive(Debug, Clone, Default)]
pub struct HrefContext {
    pub base_url: String,
    pub header: BTreeMap<String, String>,
}

impl HrefContext {
    fn link(&self, oid: &str) -> Link {
        Link {
            href: format!("{}/git-lfs/objects/{oid}", self.base_url),
            header: self.header.clone(),
        }
    }
}

/// Plan every object in request order.
///
/// A failing existence check aborts the batch; per-object problems become
/// entries with `error` set and never affect their siblings.
pub async fn plan_batch(
    store: &dyn ObjectStore,
    operation: BatchOperation,
    objects: Vec<ObjectSpec>,
    hrefs: &HrefContext,
) -> Result<Vec<BatchEntry>, GitHttpError> {
    futures::stream::iter(objects)
        .map(|spec| plan_object(store, operation, spec, hrefs))
        .buffered(EXISTS_CONCURRENCY)
        .try_collect()
        .await
}

async fn plan_object(
    store: &dyn ObjectStore,
    operation: BatchOperation,
    spec: ObjectSpec,
    hrefs: &HrefContext,
) -> Result<BatchEntry, GitHttpError> {
    if !is_valid_oid(&spec.oid) {
        return Ok(BatchEntry::with_error(spec, StatusCode::UNPROCESSABLE_ENTITY, "invalid oid"));
    }

    match operation {
        BatchOperation::Upload => {
            let link = hrefs.link(&spec.oid);
            Ok(BatchEntry::with_action(spec, operation, link))
        }
        BatchOperation::Download => {
            let present = store.exists(&spec.oid).await.map_err(|err| {
                tracing::error!(oid = %spec.oid, error = %err, "lfs existence check failed");
                GitHttpError::from(err)
            })?;
            if present {
                let link = hrefs.link(&spec.oid);
                Ok(BatchEntry::with_action(spec, operation, link))
            } else {
                Ok(BatchEntry::with_error(spec, StatusCode::NOT_FOUND, "object not found"))
            }
        }
    }
}

/// `public_url` when configured, else `http://<Host>`.
pub fn base_url(public_url: Option<&str>, headers: &HeaderMap) -> Result<String, GitHttpError> {
    if let Some(url) = public_url {
        return Ok(url.trim_end_matches('/').to_string());
    }
    let host = headers
        .get(header::HOST)
        .and_then(|v| v.to_str().ok())
        .filter(|h| !h.is_empty())
        .ok_or_else(|| GitHttpError::BadRequest("missing Host header".into()))?;
    Ok(format!("http://{host}"))
}

pub async fn batch<S: GitHttpState>(
    State(state): State<S>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response, GitHttpError> {
    lfs_gate(&state, &headers).await?;

    let request: BatchRequest = serde_json::from_slice(&body)
        .map_err(|err| GitHttpError::BadRequest(format!("invalid batch request: {err}")))?;
    let operation = BatchOperation::parse(&request.operation)?;

    let mut hrefs = HrefContext {
        base_url: base_url(state.lfs_public_url(), &headers)?,
        header: BTreeMap::new(),
    };
    // Transfer endpoints check the same token, so hand it back to the client.
    if state.lfs_require_auth() {
        if let Some(auth) = headers.get(header::AUTHORIZATION).and_then(|v| v.to_str().ok()) {
            hrefs.header.insert("Authorization".to_string(), auth.to_string());
        }
    }

    let requested = request.objects.len();
    let objects = plan_batch(state.objects(), operation, request.objects, &hrefs).await?;
    tracing::debug!(operation = operation.as_str(), objects = requested, "lfs batch planned");
    counter!("git_http.lfs.batch", "operation" => operation.as_str()).increment(1);

    let body = serde_json::to_vec(&BatchResponse {
        transfer: "basic",
        objects,
    })
    .map_err(GitHttpError::internal)?;

    Ok(([(header::CONTENT_TYPE, LFS_MEDIA_TYPE)], body).into_response())
}
