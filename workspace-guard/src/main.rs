//! Workspace guard server
//!
//! Serves saved objects through the workspace authorization pipeline.

use anyhow::{Context, Result};
use axum::serve;
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::EnvFilter;
use workspace_guard::api::{self, AppState};
use workspace_guard_core::auth::{Hs256Verifier, RequestAuth, TokenVerifier};
use workspace_guard_core::config::GuardConfig;
use workspace_guard_core::data_source;
use workspace_guard_core::saved_objects::{SavedObjectsClientProvider, SavedObjectsRepository};
use workspace_guard_core::state::WorkspaceStateStore;
use workspace_guard_core::workspace::{SetupDeps, WorkspacePlugin};

#[derive(Parser)]
#[command(name = "workspace-guard")]
#[command(about = "Workspace isolation and permission control for saved objects")]
struct Cli {
    /// Listen address
    #[arg(short, long, default_value = "127.0.0.1:3000")]
    addr: String,

    /// JSON configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Directory the repository persists objects to; in-memory when unset
    #[arg(short, long)]
    data_dir: Option<PathBuf>,

    /// HS256 secret for bearer tokens; authentication is off when unset
    #[arg(long, env = "JWT_SECRET")]
    jwt_secret: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let config = match &cli.config {
        Some(path) => GuardConfig::from_path(path)?,
        None => GuardConfig::default(),
    };

    let repository = match &cli.data_dir {
        Some(dir) => SavedObjectsRepository::open(dir)?,
        None => SavedObjectsRepository::new(),
    };
    info!(objects = repository.len(), "Repository ready");

    let state = Arc::new(WorkspaceStateStore::new());
    let mut provider = SavedObjectsClientProvider::new(Arc::new(repository));
    let setup = WorkspacePlugin::new(config.workspace).setup(SetupDeps {
        provider: &mut provider,
        auth: Arc::new(RequestAuth),
        state: Arc::clone(&state),
        application_config: None,
    })?;
    data_source::register(&mut provider, config.data_source.edit_mode, Arc::clone(&state))?;

    let verifier = cli
        .jwt_secret
        .map(|secret| Arc::new(Hs256Verifier::new(secret)) as Arc<dyn TokenVerifier>);
    if verifier.is_none() {
        info!("No JWT secret configured, requests are not authenticated");
    }

    let app = api::router(AppState {
        provider: Arc::new(provider),
        state,
        verifier,
        admin_resolver: setup.admin_resolver,
        capabilities: setup.capabilities,
    });

    let listener = TcpListener::bind(&cli.addr)
        .await
        .with_context(|| format!("binding {}", cli.addr))?;
    info!("Listening on {}", cli.addr);
    serve(listener, app.into_make_service()).await?;
    Ok(())
}
