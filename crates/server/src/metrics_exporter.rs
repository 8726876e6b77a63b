//! Prometheus rendering for the `metrics` facade used by the Git handlers.

use anyhow::{Context, Result};
use metrics::Unit;
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use std::sync::OnceLock;

static HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

/// Install the global recorder. Calling it again is a no-op.
pub fn init_metrics() -> Result<()> {
    if HANDLE.get().is_some() {
        return Ok(());
    }
    let handle = PrometheusBuilder::new()
        .install_recorder()
        .context("failed to install prometheus recorder")?;
    let _ = HANDLE.set(handle);
    describe();
    Ok(())
}

/// Text exposition format; empty until [`init_metrics`] has run.
pub fn render_metrics() -> String {
    HANDLE.get().map(|h| h.render()).unwrap_or_default()
}

fn describe() {
    metrics::describe_counter!("git_http.info_refs", "Ref advertisements served");
    metrics::describe_histogram!("git_http.info_refs_ms", Unit::Milliseconds, "Ref advertisement latency");
    metrics::describe_counter!("git_http.rpc", "Stateless RPC exchanges by service and outcome");
    metrics::describe_histogram!("git_http.rpc_ms", Unit::Milliseconds, "Stateless RPC duration");
    metrics::describe_counter!("git_http.lfs.batch", "LFS batch requests");
    metrics::describe_counter!("git_http.lfs.upload_bytes", Unit::Bytes, "LFS bytes received");
    metrics::describe_counter!("git_http.lfs.download_bytes", Unit::Bytes, "LFS bytes served");
}
