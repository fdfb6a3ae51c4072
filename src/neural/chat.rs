//! The per-request pipeline: order intent, index warm-up, query expansion,
//! embedding, ranking, candidate merge, live stock refresh, generation and
//! materialization. Strictly sequential; the only work that outlives the
//! request is the conversation upsert, which is fire-and-forget.

use super::cognitive::CognitiveService;
use super::openai::OpenAIService;
use crate::candidates::merge_candidates;
use crate::catalog::StorefrontClient;
use crate::conversation::ConversationStore;
use crate::errors::ServiceError;
use crate::index::{CatalogIndex, FaqIndex};
use crate::metrics;
use crate::models::{ChatRequest, ChatResponse, ConversationTurn, Product, Role};
use crate::normalizer::QueryNormalizer;
use crate::orders::{resolve_intent, OrderIntent, OrderLookup, OrderLookupService};
use crate::prompt::{self, OrderContext};
use crate::ranker::RankPolicy;
use crate::reply::{extract_payload, materialize, ParsedReply};
use crate::validation::validate_query;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{info, instrument, warn};

#[derive(Clone)]
pub struct ChatService {
    normalizer: QueryNormalizer,
    rank_policy: RankPolicy,
    candidate_cap: usize,
    catalog_index: Arc<CatalogIndex>,
    faq_index: Arc<FaqIndex>,
    catalog: Arc<StorefrontClient>,
    embedder: Arc<OpenAIService>,
    cognitive: Arc<CognitiveService>,
    orders: OrderLookupService,
    conversations: Option<Arc<ConversationStore>>,
    brand_name: String,
}

impl ChatService {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        normalizer: QueryNormalizer,
        rank_policy: RankPolicy,
        candidate_cap: usize,
        catalog_index: Arc<CatalogIndex>,
        faq_index: Arc<FaqIndex>,
        catalog: Arc<StorefrontClient>,
        embedder: Arc<OpenAIService>,
        cognitive: Arc<CognitiveService>,
        orders: OrderLookupService,
        conversations: Option<Arc<ConversationStore>>,
        brand_name: String,
    ) -> Self {
        Self {
            normalizer,
            rank_policy,
            candidate_cap,
            catalog_index,
            faq_index,
            catalog,
            embedder,
            cognitive,
            orders,
            conversations,
            brand_name,
        }
    }

    #[instrument(skip(self, request), fields(session = %request.session_id()))]
    pub async fn respond(&self, request: ChatRequest) -> Result<ChatResponse, ServiceError> {
        validate_query(&request.query)?;
        metrics::CHAT_REQUESTS.inc();
        let query = request.query.trim();

        let order_context = self.order_context(query, &request.history).await?;

        self.catalog_index.ensure_loaded().await?;
        self.faq_index.ensure_loaded().await?;

        let normalized = self.normalizer.expand(query);
        let query_vector = self
            .embedder
            .get_embedding(&normalized)
            .await
            .map_err(|e| ServiceError::Embedding(e.to_string()))?;

        let ranked = self
            .catalog_index
            .top_matches(&normalized, &query_vector, &self.rank_policy)
            .await;
        let faq_hits = self.faq_index.top_matches(&query_vector, &self.rank_policy).await;
        let visible = self.catalog_index.get_by_ids(&request.visible_ids).await;

        let mut candidates = merge_candidates(visible, ranked, self.candidate_cap);
        self.refresh_stock(&mut candidates).await;

        let context = prompt::build_context(&candidates, &faq_hits, &order_context, &self.brand_name);
        let system = prompt::system_prompt(&self.brand_name, &context);

        let raw = self
            .cognitive
            .complete(&system, &request.history, query, true)
            .await
            .map_err(|e| ServiceError::ExternalService(e.to_string()))?;

        let payload = match extract_payload(&raw) {
            ParsedReply::Ok(payload) => payload,
            ParsedReply::Fallback => {
                warn!("Unparseable completion, using fallback reply");
                metrics::CHAT_FALLBACKS.inc();
                return Ok(self.finish(request, ParsedReply::Fallback.into_payload(), &[]));
            }
        };

        let cards = materialize(&payload.products, &candidates);
        info!(
            candidates = candidates.len(),
            referenced = cards.len(),
            category = %payload.category,
            "chat response ready"
        );
        Ok(self.finish(request, payload, &cards))
    }

    fn finish(
        &self,
        request: ChatRequest,
        payload: crate::reply::AssistantPayload,
        cards: &[crate::models::ProductCard],
    ) -> ChatResponse {
        self.persist_exchange(&request, &payload.reply, &payload.category);
        ChatResponse {
            reply: payload.reply,
            products: cards.to_vec(),
        }
    }

    async fn order_context(
        &self,
        query: &str,
        history: &[ConversationTurn],
    ) -> Result<OrderContext, ServiceError> {
        match resolve_intent(query, history) {
            OrderIntent::None => Ok(OrderContext::NotAsked),
            OrderIntent::MissingEmail { order_number } => {
                Ok(OrderContext::AskEmail { order_number })
            }
            OrderIntent::MissingOrderNumber { .. } => Ok(OrderContext::AskOrderNumber),
            OrderIntent::Complete {
                order_number,
                email,
            } => {
                metrics::ORDER_LOOKUPS.inc();
                match self.orders.lookup(&order_number, &email).await? {
                    OrderLookup::Found(summary) => Ok(OrderContext::Found(summary)),
                    OrderLookup::NotFound => Ok(OrderContext::NotFound { order_number }),
                    OrderLookup::EmailMismatch => {
                        metrics::ORDER_EMAIL_MISMATCHES.inc();
                        Ok(OrderContext::EmailMismatch)
                    }
                }
            }
        }
    }

    /// Best-effort refresh of variant availability on the items about to be
    /// shown. On failure the indexed availability stands.
    async fn refresh_stock(&self, candidates: &mut [Product]) {
        if candidates.is_empty() {
            return;
        }
        let ids: Vec<String> = candidates.iter().map(|p| p.id.clone()).collect();
        let fresh = match self.catalog.fetch_products_by_ids(&ids).await {
            Ok(fresh) => fresh,
            Err(err) => {
                warn!("Stock refresh failed, using indexed availability: {}", err);
                return;
            }
        };

        let by_id: HashMap<&str, &Product> = fresh.iter().map(|p| (p.id.as_str(), p)).collect();
        for candidate in candidates.iter_mut() {
            let Some(update) = by_id.get(candidate.id.as_str()) else {
                continue;
            };
            for variant in candidate.variants.iter_mut() {
                if let Some(live) = update.variants.iter().find(|v| v.id == variant.id) {
                    variant.available = live.available;
                    variant.inventory_quantity = live.inventory_quantity;
                }
            }
        }
    }

    /// Append this exchange to the conversation log without blocking the
    /// response.
    fn persist_exchange(&self, request: &ChatRequest, reply: &str, category: &str) {
        let Some(store) = self.conversations.clone() else {
            return;
        };
        let session_id = request.session_id().to_string();
        let mut turns = request.history.clone();
        let now = Utc::now();
        turns.push(ConversationTurn {
            role: Role::User,
            content: request.query.clone(),
            timestamp: Some(now),
        });
        turns.push(ConversationTurn {
            role: Role::Assistant,
            content: reply.to_string(),
            timestamp: Some(now),
        });
        let category = category.to_string();

        tokio::spawn(async move {
            if let Err(err) = store.upsert(&session_id, turns, &category).await {
                warn!("Conversation upsert failed for {}: {}", session_id, err);
            }
        });
    }
}
