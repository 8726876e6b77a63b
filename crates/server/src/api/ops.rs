use axum::http::{StatusCode, header};
use axum::response::IntoResponse;

use crate::metrics_exporter::render_metrics;

pub async fn healthz() -> &'static str {
    "ok"
}

pub async fn metrics() -> impl IntoResponse {
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        render_metrics(),
    )
}
