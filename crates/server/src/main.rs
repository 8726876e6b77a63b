use std::net::SocketAddr;

use anyhow::{Context, Result};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use forge_server::api::server::run_api;
use forge_server::app::AppState;
use forge_server::auth::JwtTokenValidator;
use forge_server::config::loader;
use forge_server::db::{init_pool, normalize_path};
use forge_server::metrics_exporter::init_metrics;
use forge_server::repository::RepositoryStorage;
use forge_server::storage::build_object_store;
use forge_server::supervisor::Supervisor;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = loader::load()?;
    let listen: SocketAddr = config
        .listen
        .parse()
        .with_context(|| format!("invalid listen address {}", config.listen))?;

    init_metrics()?;

    let pool = init_pool(&config.paths.db).await?;

    let repos_root = normalize_path(config.paths.repos.clone())?;
    std::fs::create_dir_all(&repos_root).with_context(|| {
        format!(
            "failed to create repository root directory: {}",
            repos_root.display()
        )
    })?;

    let objects = build_object_store(&config.lfs.storage).await?;

    let secret = config.auth.resolve_secret().with_context(|| {
        format!(
            "{} must be set to the token signing secret",
            config.auth.jwt_secret_env
        )
    })?;
    let tokens = JwtTokenValidator::new(secret.as_bytes(), &config.auth.issuer);

    let storage = RepositoryStorage::new(pool, repos_root);
    let state = AppState::new(&config, storage, tokens, objects);

    let mut supervisor = Supervisor::new();
    supervisor.spawn("api", move |shutdown| run_api(state, listen, shutdown));
    supervisor.run().await
}
