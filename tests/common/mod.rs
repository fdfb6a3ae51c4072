/// Common test utilities and helpers
use axum::Router;
use std::sync::Arc;
use std::time::Duration;

use storefront_chat_server::candidates::DEFAULT_CANDIDATE_CAP;
use storefront_chat_server::catalog::{StoreConfig, StorefrontClient};
use storefront_chat_server::index::{CatalogIndex, FaqIndex};
use storefront_chat_server::neural::chat::ChatService;
use storefront_chat_server::neural::cognitive::CognitiveService;
use storefront_chat_server::neural::openai::OpenAIService;
use storefront_chat_server::normalizer::QueryNormalizer;
use storefront_chat_server::orders::OrderLookupService;
use storefront_chat_server::ranker::RankPolicy;
use storefront_chat_server::routes::{build_router, AppState};

/// Setup test application with stub collaborators. Nothing here performs a
/// network call at construction time; tests only exercise paths that reject
/// before reaching a collaborator.
pub fn setup_test_app() -> Router {
    let catalog = Arc::new(
        StorefrontClient::new(StoreConfig {
            domain: "test-store.invalid".to_string(),
            access_token: "test-token".to_string(),
            api_version: "2024-01".to_string(),
            page_size: 10,
            retry_attempts: 1,
            retry_backoff: Duration::from_millis(1),
        })
        .expect("client"),
    );

    let embedder = Arc::new(OpenAIService::new("test-key", "text-embedding-3-small"));
    let cognitive = Arc::new(CognitiveService::new("test-key", "gpt-4o-mini"));

    let snapshot_dir = std::env::temp_dir()
        .join("storefront-chat-tests")
        .to_string_lossy()
        .to_string();
    let catalog_index = Arc::new(CatalogIndex::new(
        catalog.clone(),
        embedder.clone(),
        &snapshot_dir,
    ));
    let faq_index = Arc::new(FaqIndex::new(embedder.clone(), &snapshot_dir));

    let chat_service = Arc::new(ChatService::new(
        QueryNormalizer::default(),
        RankPolicy::default(),
        DEFAULT_CANDIDATE_CAP,
        catalog_index,
        faq_index,
        catalog.clone(),
        embedder,
        cognitive,
        OrderLookupService::new(catalog),
        None,
        "la tienda".to_string(),
    ));

    build_router(AppState {
        chat_service,
        conversations: None,
    })
}
