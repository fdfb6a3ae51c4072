//! Storefront Admin API client: paged catalog reads, order point-lookups and
//! batch variant refreshes. All calls are wrapped in a bounded retry with a
//! linearly increasing backoff; callers decide how to degrade when retries
//! are exhausted.

use crate::config::Config;
use crate::errors::ServiceError;
use crate::models::{Product, ProductOption, SelectedOption, Variant};
use lazy_static::lazy_static;
use regex::Regex;
use reqwest::header::{HeaderMap, HeaderValue};
use serde::Deserialize;
use std::collections::HashMap;
use std::time::Duration;
use tracing::warn;

#[derive(Debug, Clone)]
pub struct StoreConfig {
    pub domain: String,
    pub access_token: String,
    pub api_version: String,
    pub page_size: u32,
    pub retry_attempts: u32,
    pub retry_backoff: Duration,
}

impl StoreConfig {
    pub fn from_config(config: &Config) -> Self {
        Self {
            domain: config.store_domain.clone(),
            access_token: config.store_access_token.clone(),
            api_version: config.store_api_version.clone(),
            page_size: config.catalog_page_size,
            retry_attempts: config.retry_attempts.max(1),
            retry_backoff: Duration::from_millis(config.retry_backoff_ms),
        }
    }
}

#[derive(Clone)]
pub struct StorefrontClient {
    client: reqwest::Client,
    config: StoreConfig,
}

/// One fetched order, already flattened to what the lookup path needs.
#[derive(Debug, Clone)]
pub struct StoreOrder {
    pub number: String,
    pub email: Option<String>,
    pub fulfillment_status: Option<String>,
    pub total_price: String,
    pub currency: String,
    pub line_items: Vec<StoreOrderItem>,
    pub tracking_number: Option<String>,
    pub tracking_company: Option<String>,
    pub tracking_url: Option<String>,
}

#[derive(Debug, Clone)]
pub struct StoreOrderItem {
    pub title: String,
    pub quantity: i64,
}

impl StorefrontClient {
    pub fn new(config: StoreConfig) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder()
            .user_agent("storefront-chat-server/0.3")
            .build()?;

        Ok(Self { client, config })
    }

    pub fn page_size(&self) -> u32 {
        self.config.page_size
    }

    fn endpoint(&self, path: &str) -> String {
        format!(
            "https://{}/admin/api/{}/{}",
            self.config.domain, self.config.api_version, path
        )
    }

    fn auth_headers(&self) -> HeaderMap {
        let mut headers = HeaderMap::new();
        match HeaderValue::from_str(&self.config.access_token) {
            Ok(value) => {
                headers.insert("X-Shopify-Access-Token", value);
            }
            Err(err) => {
                warn!("Invalid storefront access token header value: {}", err);
            }
        }
        headers
    }

    /// One page of active products. `since_id` is the cursor: the numeric id
    /// of the last product of the previous page. An empty result means the
    /// catalog is exhausted.
    pub async fn fetch_products_page(
        &self,
        since_id: Option<&str>,
    ) -> Result<Vec<Product>, ServiceError> {
        let mut url = self.endpoint(&format!(
            "products.json?status=active&limit={}",
            self.config.page_size
        ));
        if let Some(cursor) = since_id {
            url.push_str(&format!("&since_id={}", cursor));
        }

        let body: ProductsEnvelope = self.get_with_retry("products page", &url).await?;
        Ok(body.products.into_iter().map(map_product).collect())
    }

    /// Fresh product records for a specific id set, used to refresh variant
    /// availability on the candidates about to be shown.
    pub async fn fetch_products_by_ids(
        &self,
        ids: &[String],
    ) -> Result<Vec<Product>, ServiceError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let url = self.endpoint(&format!("products.json?ids={}", ids.join(",")));
        let body: ProductsEnvelope = self.get_with_retry("products by id", &url).await?;
        Ok(body.products.into_iter().map(map_product).collect())
    }

    /// Point lookup by customer-facing order number.
    pub async fn fetch_order_by_number(
        &self,
        number: &str,
    ) -> Result<Option<StoreOrder>, ServiceError> {
        let url = self.endpoint(&format!("orders.json?status=any&name=%23{}", number));
        let body: OrdersEnvelope = self.get_with_retry("order lookup", &url).await?;
        Ok(body.orders.into_iter().next().map(map_order))
    }

    async fn get_with_retry<T: serde::de::DeserializeOwned>(
        &self,
        what: &str,
        url: &str,
    ) -> Result<T, ServiceError> {
        let mut attempt = 0;
        loop {
            attempt += 1;
            match self.get_json(url).await {
                Ok(value) => return Ok(value),
                Err(err) if attempt < self.config.retry_attempts => {
                    let delay = self.config.retry_backoff * attempt;
                    warn!(
                        "Storefront {} failed (attempt {}/{}), retrying in {:?}: {}",
                        what, attempt, self.config.retry_attempts, delay, err
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(err) => return Err(err),
            }
        }
    }

    async fn get_json<T: serde::de::DeserializeOwned>(&self, url: &str) -> Result<T, ServiceError> {
        let response = self
            .client
            .get(url)
            .headers(self.auth_headers())
            .send()
            .await
            .map_err(|e| ServiceError::ExternalService(format!("Storefront request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let body_text = response.text().await.unwrap_or_default();
            return Err(ServiceError::ExternalService(format!(
                "Storefront request failed ({}): {}",
                status, body_text
            )));
        }

        response.json::<T>().await.map_err(|e| {
            ServiceError::ExternalService(format!("Failed to parse storefront response: {}", e))
        })
    }
}

/// Strip the upstream namespace prefix off a global id, falling back to the
/// plain numeric id.
fn short_id(global_id: Option<&str>, numeric_id: i64) -> String {
    global_id
        .and_then(|gid| gid.rsplit('/').next())
        .filter(|s| !s.is_empty())
        .map(|s| s.to_string())
        .unwrap_or_else(|| numeric_id.to_string())
}

lazy_static! {
    static ref HTML_TAG: Regex = Regex::new(r"<[^>]*>").unwrap();
}

/// Reduce an HTML description to plain text.
pub fn strip_html(html: &str) -> String {
    let text = HTML_TAG.replace_all(html, " ");
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn map_product(remote: RemoteProduct) -> Product {
    let description_html = remote.body_html.unwrap_or_default();
    let description = strip_html(&description_html);
    let tags = remote
        .tags
        .map(|raw| {
            raw.split(',')
                .map(|t| t.trim().to_string())
                .filter(|t| !t.is_empty())
                .collect()
        })
        .unwrap_or_default();

    let metafields = remote
        .metafields
        .unwrap_or_default()
        .into_iter()
        .map(|m| (m.key, parse_metafield_value(&m.value)))
        .collect::<HashMap<_, _>>();

    Product {
        id: short_id(remote.admin_graphql_api_id.as_deref(), remote.id),
        title: remote.title,
        handle: remote.handle,
        product_type: remote.product_type.unwrap_or_default(),
        description,
        description_html,
        tags,
        image_url: remote.image.and_then(|img| img.src),
        options: remote
            .options
            .into_iter()
            .map(|o| ProductOption {
                name: o.name,
                values: o.values,
            })
            .collect(),
        variants: remote.variants.into_iter().map(map_variant).collect(),
        metafields,
        embedding: None,
    }
}

fn map_variant(remote: RemoteVariant) -> Variant {
    let quantity = remote.inventory_quantity.unwrap_or(0);
    Variant {
        id: short_id(remote.admin_graphql_api_id.as_deref(), remote.id),
        title: remote.title.clone(),
        price: remote.price,
        image_url: remote.image.and_then(|img| img.src),
        available: remote.available.unwrap_or(quantity > 0),
        inventory_quantity: quantity,
        selected_options: remote
            .selected_options
            .unwrap_or_default()
            .into_iter()
            .map(|o| SelectedOption {
                name: o.name,
                value: o.value,
            })
            .collect(),
    }
}

fn map_order(remote: RemoteOrder) -> StoreOrder {
    let fulfillment = remote.fulfillments.unwrap_or_default().into_iter().next();
    StoreOrder {
        number: remote.name.trim_start_matches('#').to_string(),
        email: remote.email,
        fulfillment_status: remote.fulfillment_status,
        total_price: remote.total_price.unwrap_or_default(),
        currency: remote.currency.unwrap_or_default(),
        line_items: remote
            .line_items
            .unwrap_or_default()
            .into_iter()
            .map(|item| StoreOrderItem {
                title: item.title,
                quantity: item.quantity,
            })
            .collect(),
        tracking_number: fulfillment.as_ref().and_then(|f| f.tracking_number.clone()),
        tracking_company: fulfillment.as_ref().and_then(|f| f.tracking_company.clone()),
        tracking_url: fulfillment.and_then(|f| f.tracking_url),
    }
}

/// Metafield values are JSON where possible, raw strings otherwise.
fn parse_metafield_value(raw: &str) -> serde_json::Value {
    serde_json::from_str(raw).unwrap_or_else(|_| serde_json::Value::String(raw.to_string()))
}

#[derive(Deserialize)]
struct ProductsEnvelope {
    products: Vec<RemoteProduct>,
}

#[derive(Deserialize)]
struct OrdersEnvelope {
    orders: Vec<RemoteOrder>,
}

#[derive(Deserialize)]
struct RemoteProduct {
    id: i64,
    admin_graphql_api_id: Option<String>,
    title: String,
    handle: String,
    body_html: Option<String>,
    product_type: Option<String>,
    tags: Option<String>,
    image: Option<RemoteImage>,
    #[serde(default)]
    options: Vec<RemoteOption>,
    #[serde(default)]
    variants: Vec<RemoteVariant>,
    metafields: Option<Vec<RemoteMetafield>>,
}

#[derive(Deserialize)]
struct RemoteImage {
    src: Option<String>,
}

#[derive(Deserialize)]
struct RemoteOption {
    name: String,
    #[serde(default)]
    values: Vec<String>,
}

#[derive(Deserialize)]
struct RemoteVariant {
    id: i64,
    admin_graphql_api_id: Option<String>,
    title: String,
    price: String,
    inventory_quantity: Option<i64>,
    available: Option<bool>,
    image: Option<RemoteImage>,
    selected_options: Option<Vec<RemoteSelectedOption>>,
}

#[derive(Deserialize)]
struct RemoteSelectedOption {
    name: String,
    value: String,
}

#[derive(Deserialize)]
struct RemoteMetafield {
    key: String,
    value: String,
}

#[derive(Deserialize)]
struct RemoteOrder {
    name: String,
    email: Option<String>,
    fulfillment_status: Option<String>,
    total_price: Option<String>,
    currency: Option<String>,
    line_items: Option<Vec<RemoteLineItem>>,
    fulfillments: Option<Vec<RemoteFulfillment>>,
}

#[derive(Deserialize)]
struct RemoteLineItem {
    title: String,
    quantity: i64,
}

#[derive(Deserialize)]
struct RemoteFulfillment {
    tracking_number: Option<String>,
    tracking_company: Option<String>,
    tracking_url: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_short_id() {
        assert_eq!(
            short_id(Some("gid://shopify/Product/8123456789"), 0),
            "8123456789"
        );
        assert_eq!(short_id(None, 42), "42");
        assert_eq!(short_id(Some(""), 7), "7");
    }

    #[test]
    fn test_strip_html() {
        assert_eq!(
            strip_html("<p>Sudadera <b>premium</b> de algodón</p>"),
            "Sudadera premium de algodón"
        );
        assert_eq!(strip_html("sin etiquetas"), "sin etiquetas");
    }

    #[test]
    fn test_parse_metafield_value() {
        assert_eq!(
            parse_metafield_value(r#"{"fit":"oversize"}"#),
            serde_json::json!({"fit": "oversize"})
        );
        assert_eq!(
            parse_metafield_value("tejido técnico"),
            serde_json::Value::String("tejido técnico".into())
        );
    }

    #[test]
    fn tags_split_and_trimmed() {
        let remote = RemoteProduct {
            id: 1,
            admin_graphql_api_id: None,
            title: "Camiseta".into(),
            handle: "camiseta".into(),
            body_html: Some("<p>Básica</p>".into()),
            product_type: Some("camiseta".into()),
            tags: Some("verano, algodón ,básicos".into()),
            image: None,
            options: vec![],
            variants: vec![],
            metafields: None,
        };
        let product = map_product(remote);
        assert_eq!(product.tags, vec!["verano", "algodón", "básicos"]);
        assert_eq!(product.description, "Básica");
    }

    #[test]
    fn variant_availability_defaults_to_quantity() {
        let remote = RemoteVariant {
            id: 5,
            admin_graphql_api_id: None,
            title: "M / Rojo".into(),
            price: "29.90".into(),
            inventory_quantity: Some(0),
            available: None,
            image: None,
            selected_options: None,
        };
        assert!(!map_variant(remote).available);
    }
}
