use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use validator::Validate;

/// Catalog product as held by the in-memory index. The identifier is the
/// trailing segment of the upstream global id, unique within the index.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Product {
    pub id: String,
    pub title: String,
    pub handle: String,
    pub product_type: String,
    pub description: String,
    pub description_html: String,
    pub tags: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    pub options: Vec<ProductOption>,
    pub variants: Vec<Variant>,
    #[serde(default)]
    pub metafields: HashMap<String, serde_json::Value>,
    /// Present once the index has embedded this record.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub embedding: Option<Vec<f32>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProductOption {
    pub name: String,
    pub values: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Variant {
    pub id: String,
    pub title: String,
    /// Decimal-as-string, upstream convention.
    pub price: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    pub available: bool,
    pub inventory_quantity: i64,
    pub selected_options: Vec<SelectedOption>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SelectedOption {
    pub name: String,
    pub value: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Faq {
    pub question: String,
    pub answer: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub embedding: Option<Vec<f32>>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationTurn {
    pub role: Role,
    pub content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<DateTime<Utc>>,
}

pub const ANONYMOUS_SESSION: &str = "anonymous";

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct ChatRequest {
    #[validate(length(min = 1, message = "query must not be empty"))]
    pub query: String,
    #[serde(default)]
    pub history: Vec<ConversationTurn>,
    /// Identifiers of the items currently on the user's screen.
    #[serde(default)]
    pub visible_ids: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
}

impl ChatRequest {
    pub fn session_id(&self) -> &str {
        self.session_id
            .as_deref()
            .filter(|s| !s.trim().is_empty())
            .unwrap_or(ANONYMOUS_SESSION)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatResponse {
    pub reply: String,
    pub products: Vec<ProductCard>,
}

/// Display-ready product reference. Every field carries a safe default so the
/// response contract is never partially null.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProductCard {
    pub id: String,
    pub title: String,
    pub price: String,
    pub image_url: String,
    pub handle: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub variant_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub variant_title: Option<String>,
    pub options: Vec<ProductOption>,
    pub variants: Vec<CardVariant>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CardVariant {
    pub id: String,
    pub title: String,
    pub price: String,
    pub available: bool,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct LogTurnRequest {
    #[validate(length(min = 1, message = "session_id must not be empty"))]
    pub session_id: String,
    pub role: Role,
    #[validate(length(min = 1, message = "content must not be empty"))]
    pub content: String,
}

impl Product {
    /// Text fed to the embedding model when indexing this product.
    pub fn embedding_document(&self) -> String {
        format!(
            "{} {} {} {}",
            self.product_type,
            self.title,
            self.description,
            self.tags.join(" ")
        )
    }

    /// Storefront display price: the first variant's price.
    pub fn display_price(&self) -> Option<&str> {
        self.variants.first().map(|v| v.price.as_str())
    }

    /// Values of the color option, if the product has one.
    pub fn color_values(&self) -> Vec<&str> {
        self.options
            .iter()
            .find(|o| is_color_option(&o.name))
            .map(|o| o.values.iter().map(String::as_str).collect())
            .unwrap_or_default()
    }
}

pub fn is_color_option(name: &str) -> bool {
    matches!(name.to_lowercase().as_str(), "color" | "colour")
}

pub fn is_size_option(name: &str) -> bool {
    matches!(name.to_lowercase().as_str(), "talla" | "size")
}
