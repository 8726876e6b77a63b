use std::time::Duration;

use anyhow::{Context as _, Result};
use clap::{Parser, Subcommand};
use git_http::Visibility;
use sqlx::SqlitePool;

use forge_server::auth::TokenIssuer;
use forge_server::config::{Config, loader};
use forge_server::db::{init_pool, normalize_path};
use forge_server::repository::db::list_repositories;
use forge_server::repository::mutations::create_repository_raw;
use forge_server::repository::{CreateRepositoryInput, RepositoryStorage};
use forge_server::storage::build_object_store;

#[derive(Parser)]
#[command(name = "forge")]
#[command(about = "Forge CLI - Manage repositories, tokens and LFS objects", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    #[command(subcommand)]
    Repo(RepoCommands),
    #[command(subcommand)]
    Token(TokenCommands),
    #[command(subcommand)]
    Lfs(LfsCommands),
}

#[derive(Subcommand)]
enum RepoCommands {
    /// Register a repository; the bare repository is created on first fetch
    Create {
        /// Owner slug (lowercase, alphanumeric, hyphens only)
        owner: String,
        /// Repository name
        name: String,
        /// Require a token for fetches as well as pushes
        #[arg(long)]
        private: bool,
    },
    /// List registered repositories
    List,
}

#[derive(Subcommand)]
enum TokenCommands {
    /// Sign a bearer token for Git and LFS clients
    Issue {
        subject: String,
        /// Lifetime in seconds
        #[arg(long, default_value_t = 86_400)]
        ttl_secs: u64,
    },
}

#[derive(Subcommand)]
enum LfsCommands {
    /// Delete an object from the configured store
    Rm { oid: String },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();
    let config = loader::load()?;

    match cli.command {
        Commands::Repo(repo_cmd) => {
            let pool = init_pool(&config.paths.db).await?;
            match repo_cmd {
                RepoCommands::Create {
                    owner,
                    name,
                    private,
                } => create_repository(&config, pool, owner, name, private).await?,
                RepoCommands::List => list(&pool).await?,
            }
        }
        Commands::Token(TokenCommands::Issue { subject, ttl_secs }) => {
            issue_token(&config, &subject, ttl_secs)?
        }
        Commands::Lfs(LfsCommands::Rm { oid }) => remove_object(&config, &oid).await?,
    }

    Ok(())
}

async fn create_repository(
    config: &Config,
    pool: SqlitePool,
    owner: String,
    name: String,
    private: bool,
) -> Result<()> {
    let visibility = if private {
        Visibility::Private
    } else {
        Visibility::Public
    };
    let input = CreateRepositoryInput {
        owner,
        name,
        visibility,
    };
    let repo = create_repository_raw(&pool, input).await?;

    let storage = RepositoryStorage::new(pool, normalize_path(config.paths.repos.clone())?);
    let path = storage.get_repository_path(&repo.owner, &repo.name);

    println!("✓ Repository created successfully!");
    println!("  ID:         {}", repo.id);
    println!("  Name:       {}/{}", repo.owner, repo.name);
    println!("  Visibility: {}", repo.visibility);
    println!("  Path:       {}", path.display());

    Ok(())
}

async fn list(pool: &SqlitePool) -> Result<()> {
    let repos = list_repositories(pool)
        .await
        .context("failed to list repositories")?;
    if repos.is_empty() {
        println!("No repositories.");
        return Ok(());
    }
    for repo in repos {
        println!("{}/{}\t{}\t{}", repo.owner, repo.name, repo.visibility, repo.id);
    }
    Ok(())
}

fn issue_token(config: &Config, subject: &str, ttl_secs: u64) -> Result<()> {
    let secret = config
        .auth
        .resolve_secret()
        .with_context(|| format!("{} must be set", config.auth.jwt_secret_env))?;
    let token = TokenIssuer::new(secret.as_bytes(), config.auth.issuer.clone())
        .issue(subject, Duration::from_secs(ttl_secs))?;
    println!("{token}");
    Ok(())
}

async fn remove_object(config: &Config, oid: &str) -> Result<()> {
    anyhow::ensure!(git_http::lfs::is_valid_oid(oid), "invalid object id: {oid}");

    let store = build_object_store(&config.lfs.storage).await?;
    if store.delete(oid).await? {
        println!("✓ Removed {oid}");
    } else {
        println!("Object {oid} not found");
    }
    Ok(())
}
