// src/main.rs
// Server entry point: config, provider factory, MCP pool, catalog, axum.

use anyhow::Result;
use clap::Parser;
use std::sync::Arc;
use tracing::{Level, error, info, warn};
use tracing_subscriber::FmtSubscriber;

use canvas_backend::agent::SessionRegistry;
use canvas_backend::api::build_router;
use canvas_backend::config::{ApiKeys, Cli};
use canvas_backend::llm::ProviderFactory;
use canvas_backend::mcp::{McpConfig, McpManager};
use canvas_backend::state::AppState;
use canvas_backend::subtool::SubToolCatalog;

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let subscriber = FmtSubscriber::builder()
        .with_max_level(Level::INFO)
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let cli = Cli::parse();

    let api_keys = ApiKeys::from_env();
    let llm = match ProviderFactory::from_api_keys(&api_keys) {
        Ok(factory) => Arc::new(factory),
        Err(e) => {
            error!("{}", e);
            std::process::exit(1);
        }
    };

    let mcp = Arc::new(McpManager::new());
    match McpConfig::load(&cli.mcp_config).await {
        Ok(config) => {
            mcp.connect_all(&config).await;
            info!(
                servers = mcp.server_count().await,
                "MCP pool ready"
            );
        }
        Err(e) => {
            warn!(
                path = %cli.mcp_config.display(),
                error = %e,
                "No MCP config loaded; starting with an empty tool pool"
            );
        }
    }

    let catalog = Arc::new(SubToolCatalog::load(&cli.learnings_dir).await?);
    info!(
        sub_tools = catalog.all().await.len(),
        mcps = catalog.learned_mcps().await.len(),
        "Sub-tool catalog loaded"
    );

    let state = AppState {
        llm,
        mcp,
        catalog,
        sessions: Arc::new(SessionRegistry::new()),
        learnings_dir: cli.learnings_dir.clone(),
    };

    let app = build_router(state);
    let addr = std::net::SocketAddr::from(([0, 0, 0, 0], cli.port));
    info!("Server listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
