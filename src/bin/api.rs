use chat_session_orchestrator::{
    api::{start_server, ApiState},
    llm::OpenAiCompatibleClient,
    memory::SessionStore,
    AppConfig, SessionService, TurnOrchestrator,
};
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    // Load environment variables
    dotenv::dotenv().ok();

    let config = Arc::new(AppConfig::from_env());

    if !config.has_api_key() {
        warn!("⚠️  SILICON_FLOW_API_KEY not set; every turn will fail until it is configured");
    }

    info!("🚀 Chat Session Orchestrator - API Server");
    info!("📍 Port: {}", config.port);
    info!("🤖 Model: {} via {}", config.model, config.api_url);
    info!(
        "🧠 Retention: {} turns ({:?} eviction)",
        config.max_history, config.eviction
    );

    // Create components
    let store = Arc::new(SessionStore::new(config.retention_policy()));
    let model = Arc::new(OpenAiCompatibleClient::from_config(&config));
    let orchestrator = Arc::new(TurnOrchestrator::new(store.clone(), model, config.clone()));
    let sessions = Arc::new(SessionService::new(store, config.clone()));

    info!("✅ Session store initialized");
    info!("📡 Starting API server...");

    start_server(ApiState { orchestrator, sessions }, config.port).await?;

    Ok(())
}
