//! Redis-backed conversation log. Strictly best-effort: the chat pipeline
//! fires the upsert and moves on, and every failure here is logged rather
//! than surfaced to the caller.

use crate::errors::ServiceError;
use crate::metrics;
use crate::models::ConversationTurn;
use chrono::{DateTime, Utc};
use redis::AsyncCommands;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, instrument};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredConversation {
    pub session_id: String,
    pub turns: Vec<ConversationTurn>,
    pub category: String,
    pub updated_at: DateTime<Utc>,
}

/// Redis-backed session store
#[derive(Clone)]
pub struct ConversationStore {
    client: Arc<redis::Client>,
}

impl ConversationStore {
    pub async fn new(redis_url: &str) -> Result<Self, redis::RedisError> {
        let client = redis::Client::open(redis_url)?;

        // Test connection
        let mut conn = client.get_multiplexed_async_connection().await?;
        let _: String = redis::cmd("PING").query_async(&mut conn).await?;

        debug!("Redis connection established");

        Ok(Self {
            client: Arc::new(client),
        })
    }

    fn key(session_id: &str) -> String {
        format!("conversation:{}", session_id)
    }

    #[instrument(skip(self))]
    pub async fn read(&self, session_id: &str) -> Result<Option<StoredConversation>, ServiceError> {
        let mut conn = self
            .client
            .get_multiplexed_async_connection()
            .await
            .map_err(|e| ServiceError::CacheError(format!("Redis connection failed: {}", e)))?;

        let data: Option<String> = conn
            .get(Self::key(session_id))
            .await
            .map_err(|e| ServiceError::CacheError(format!("Redis GET failed: {}", e)))?;

        match data {
            Some(json) => {
                let conversation = serde_json::from_str(&json)
                    .map_err(|e| ServiceError::ParseError(e.to_string()))?;
                Ok(Some(conversation))
            }
            None => Ok(None),
        }
    }

    /// Replace the stored conversation with the full turn list for this
    /// session.
    #[instrument(skip(self, turns))]
    pub async fn upsert(
        &self,
        session_id: &str,
        turns: Vec<ConversationTurn>,
        category: &str,
    ) -> Result<(), ServiceError> {
        let conversation = StoredConversation {
            session_id: session_id.to_string(),
            turns,
            category: category.to_string(),
            updated_at: Utc::now(),
        };

        let data = serde_json::to_string(&conversation)
            .map_err(|e| ServiceError::SerializationError(e.to_string()))?;

        let mut conn = self
            .client
            .get_multiplexed_async_connection()
            .await
            .map_err(|e| ServiceError::CacheError(format!("Redis connection failed: {}", e)))?;

        let _: () = conn
            .set(Self::key(session_id), data)
            .await
            .map_err(|e| ServiceError::CacheError(format!("Redis SET failed: {}", e)))?;

        metrics::CONVERSATIONS_PERSISTED.inc();
        debug!("Stored conversation for session {}", session_id);
        Ok(())
    }

    /// Read-modify-write append of a single turn, used by the manual log
    /// endpoint.
    #[instrument(skip(self, turn))]
    pub async fn append(
        &self,
        session_id: &str,
        turn: ConversationTurn,
    ) -> Result<(), ServiceError> {
        let existing = self.read(session_id).await?;
        let (mut turns, category) = match existing {
            Some(conversation) => (conversation.turns, conversation.category),
            None => (Vec::new(), "otro".to_string()),
        };
        turns.push(turn);
        self.upsert(session_id, turns, &category).await
    }
}

// Tests require a running Redis instance, so they live in the integration
// environment rather than here.
