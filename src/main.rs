use std::net::SocketAddr;
use std::sync::Arc;
use tokio::signal;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use storefront_chat_server::candidates::DEFAULT_CANDIDATE_CAP;
use storefront_chat_server::catalog::{StoreConfig, StorefrontClient};
use storefront_chat_server::config::Config;
use storefront_chat_server::conversation::ConversationStore;
use storefront_chat_server::index::{CatalogIndex, FaqIndex};
use storefront_chat_server::neural::chat::ChatService;
use storefront_chat_server::neural::cognitive::CognitiveService;
use storefront_chat_server::neural::openai::OpenAIService;
use storefront_chat_server::normalizer::QueryNormalizer;
use storefront_chat_server::orders::OrderLookupService;
use storefront_chat_server::ranker::RankPolicy;
use storefront_chat_server::routes::{build_router, AppState};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();

    // Load configuration
    let config = Config::load()?;

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(config.log_level.clone())),
        )
        .with_target(false)
        .json()
        .init();

    info!("Starting Storefront Chat Server...");

    // Storefront collaborator
    let catalog = Arc::new(StorefrontClient::new(StoreConfig::from_config(&config))?);

    // Model collaborators
    let embedder = Arc::new(OpenAIService::new(
        &config.openai_api_key,
        &config.embedding_model,
    ));
    let cognitive = Arc::new(CognitiveService::new(
        &config.openai_api_key,
        &config.chat_model,
    ));

    // Indexes (lazily populated on the first request)
    let catalog_index = Arc::new(CatalogIndex::new(
        catalog.clone(),
        embedder.clone(),
        &config.snapshot_dir,
    ));
    let faq_index = Arc::new(FaqIndex::new(embedder.clone(), &config.snapshot_dir));
    info!("Indexes initialized (cold)");

    // Conversation store is optional; without it persistence is a no-op
    let conversations = match &config.redis_url {
        Some(url) => match ConversationStore::new(url).await {
            Ok(store) => Some(Arc::new(store)),
            Err(err) => {
                warn!("Conversation store unavailable, continuing without: {}", err);
                None
            }
        },
        None => None,
    };

    let orders = OrderLookupService::new(catalog.clone());

    let chat_service = Arc::new(ChatService::new(
        QueryNormalizer::default(),
        RankPolicy::default(),
        DEFAULT_CANDIDATE_CAP,
        catalog_index,
        faq_index,
        catalog,
        embedder,
        cognitive,
        orders,
        conversations.clone(),
        config.brand_name.clone(),
    ));
    info!("Chat service initialized");

    // Build application state
    let app_state = AppState {
        chat_service,
        conversations,
    };

    let app = build_router(app_state);

    // Bind to address
    let addr: SocketAddr = format!("{}:{}", config.host, config.port).parse()?;

    info!("Server listening on {}", addr);

    // Start server
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C signal");
        },
        _ = terminate => {
            info!("Received terminate signal");
        },
    }

    info!("Shutting down gracefully...");
}
