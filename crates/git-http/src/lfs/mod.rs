//! Git LFS batch API and basic transfer endpoints.

pub mod batch;
pub mod fs;
pub mod store;
pub mod transfer;

use axum::http::HeaderMap;

use crate::auth::authenticate;
use crate::errors::GitHttpError;
use crate::state::GitHttpState;

pub use fs::FsObjectStore;
pub use store::{ObjectReader, ObjectStore, StoredObject};

pub const LFS_MEDIA_TYPE: &str = "application/vnd.git-lfs+json";

/// Upper bound on oid length; sha256 oids are 64 characters.
pub const MAX_OID_LEN: usize = 128;

/// Oids are caller-assigned, but they end up in object keys and file paths,
/// so only ASCII hex is accepted.
pub fn is_valid_oid(oid: &str) -> bool {
    !oid.is_empty() && oid.len() <= MAX_OID_LEN && oid.bytes().all(|b| b.is_ascii_hexdigit())
}

pub(crate) fn require_valid_oid(oid: &str) -> Result<(), GitHttpError> {
    if is_valid_oid(oid) {
        Ok(())
    } else {
        Err(GitHttpError::BadRequest(format!("invalid oid `{oid}`")))
    }
}

/// LFS endpoints are open unless the deployment asks for tokens.
pub(crate) async fn lfs_gate<S: GitHttpState>(state: &S, headers: &HeaderMap) -> Result<(), GitHttpError> {
    if state.lfs_require_auth() {
        authenticate(state.tokens(), headers).await?;
    }
    Ok(())
}
