use axum::Router;
use axum::routing::{get, post};

use crate::lfs::{batch, transfer};
use crate::refs::info_refs;
use crate::rpc::{receive_pack, upload_pack};
use crate::state::GitHttpState;

/// Git Smart HTTP and LFS routes. `{repo}` may carry a `.git` suffix.
pub fn router<S: GitHttpState>() -> Router<S> {
    Router::new()
        .route("/git-lfs/objects/batch", post(batch::batch::<S>))
        .route(
            "/git-lfs/objects/{oid}",
            get(transfer::download::<S>)
                .head(transfer::verify::<S>)
                .post(transfer::upload::<S>)
                .put(transfer::upload::<S>),
        )
        .route("/{owner}/{repo}/info/refs", get(info_refs::<S>))
        .route("/{owner}/{repo}/git-upload-pack", post(upload_pack::<S>))
        .route("/{owner}/{repo}/git-receive-pack", post(receive_pack::<S>))
}
