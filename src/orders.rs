//! Order lookup: pattern-based extraction of order number and email from the
//! conversation, a hard email gate against the fetched record, and carrier
//! presentation. Order data is only ever surfaced when both identifiers are
//! present and the emails match.

use crate::catalog::{StoreOrder, StorefrontClient};
use crate::errors::ServiceError;
use crate::models::ConversationTurn;
use lazy_static::lazy_static;
use regex::Regex;
use serde::Serialize;
use std::sync::Arc;
use tracing::{info, instrument};

lazy_static! {
    static ref ORDER_NUMBER: Regex = Regex::new(r"#?(\d{4,})").unwrap();
    static ref EMAIL: Regex =
        Regex::new(r"[A-Za-z0-9._%+\-]+@[A-Za-z0-9.\-]+\.[A-Za-z]{2,}").unwrap();
}

pub const CARRIER_PENDING: &str = "pendiente";
pub const TRACKING_IN_PREPARATION: &str = "en preparación";

/// What the conversation is asking for, before any remote call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OrderIntent {
    /// No order identifiers anywhere in the conversation.
    None,
    /// The user gave an order number but no email yet.
    MissingEmail { order_number: String },
    /// The user gave an email but no order number yet.
    MissingOrderNumber { email: String },
    Complete { order_number: String, email: String },
}

#[derive(Debug, Clone)]
pub enum OrderLookup {
    Found(Box<OrderSummary>),
    NotFound,
    EmailMismatch,
}

#[derive(Debug, Clone, Serialize)]
pub struct OrderSummary {
    pub number: String,
    pub status: String,
    pub carrier: String,
    pub tracking_number: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tracking_url: Option<String>,
    pub items: Vec<OrderItem>,
    pub total: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct OrderItem {
    pub title: String,
    pub quantity: i64,
}

pub fn extract_order_number(text: &str) -> Option<String> {
    ORDER_NUMBER
        .captures(text)
        .map(|caps| caps[1].to_string())
}

pub fn extract_email(text: &str) -> Option<String> {
    EMAIL.find(text).map(|m| m.as_str().to_string())
}

/// Resolve the order intent of the current message, recovering whichever
/// identifier is missing from the most recent history turns first.
pub fn resolve_intent(message: &str, history: &[ConversationTurn]) -> OrderIntent {
    let mut number = extract_order_number(message);
    let mut email = extract_email(message);

    if number.is_none() || email.is_none() {
        for turn in history.iter().rev() {
            if number.is_none() {
                number = extract_order_number(&turn.content);
            }
            if email.is_none() {
                email = extract_email(&turn.content);
            }
            if number.is_some() && email.is_some() {
                break;
            }
        }
    }

    match (number, email) {
        (Some(order_number), Some(email)) => OrderIntent::Complete {
            order_number,
            email,
        },
        (Some(order_number), None) => OrderIntent::MissingEmail { order_number },
        (None, Some(email)) => OrderIntent::MissingOrderNumber { email },
        (None, None) => OrderIntent::None,
    }
}

pub fn email_matches(supplied: &str, stored: &str) -> bool {
    supplied.trim().eq_ignore_ascii_case(stored.trim())
}

#[derive(Clone)]
pub struct OrderLookupService {
    catalog: Arc<StorefrontClient>,
}

impl OrderLookupService {
    pub fn new(catalog: Arc<StorefrontClient>) -> Self {
        Self { catalog }
    }

    /// Fetch the order and apply the email gate. A mismatch is a normal
    /// outcome, never an error, and carries no order data.
    #[instrument(skip(self, email))]
    pub async fn lookup(&self, order_number: &str, email: &str) -> Result<OrderLookup, ServiceError> {
        let order = match self.catalog.fetch_order_by_number(order_number).await? {
            Some(order) => order,
            None => {
                info!("Order {} not found", order_number);
                return Ok(OrderLookup::NotFound);
            }
        };

        let stored = order.email.as_deref().unwrap_or("");
        if stored.is_empty() || !email_matches(email, stored) {
            info!("Email mismatch for order {}", order_number);
            return Ok(OrderLookup::EmailMismatch);
        }

        Ok(OrderLookup::Found(Box::new(summarize(order))))
    }
}

/// Shape a fetched order for presentation: human carrier names, canonical
/// tracking links and unfulfilled-order sentinels.
pub fn summarize(order: StoreOrder) -> OrderSummary {
    let status = order
        .fulfillment_status
        .clone()
        .unwrap_or_else(|| "unfulfilled".to_string());
    let fulfilled = status != "unfulfilled";

    let (carrier, tracking_number, tracking_url) = if fulfilled {
        let tracking_number = order
            .tracking_number
            .clone()
            .unwrap_or_else(|| TRACKING_IN_PREPARATION.to_string());
        let (carrier, rebuilt_url) =
            carrier_presentation(order.tracking_company.as_deref(), &tracking_number);
        (carrier, tracking_number, rebuilt_url.or(order.tracking_url))
    } else {
        (
            CARRIER_PENDING.to_string(),
            TRACKING_IN_PREPARATION.to_string(),
            None,
        )
    };

    let total = if order.currency.is_empty() {
        order.total_price.clone()
    } else {
        format!("{} {}", order.total_price, order.currency)
    };

    OrderSummary {
        number: order.number,
        status,
        carrier,
        tracking_number,
        tracking_url,
        items: order
            .line_items
            .into_iter()
            .map(|item| OrderItem {
                title: item.title,
                quantity: item.quantity,
            })
            .collect(),
        total,
    }
}

/// Known carrier codes to display names. DHL tracking links arrive broken
/// upstream, so its canonical URL is rebuilt from the raw tracking number.
fn carrier_presentation(code: Option<&str>, tracking_number: &str) -> (String, Option<String>) {
    match code {
        Some("0002") => ("Correos Express".to_string(), None),
        Some("0003") => (
            "DHL".to_string(),
            Some(format!(
                "https://www.dhl.com/es-es/home/tracking/tracking-parcel.html?submit=1&tracking-id={}",
                tracking_number
            )),
        ),
        Some(other) if !other.is_empty() => (other.to_string(), None),
        _ => (CARRIER_PENDING.to_string(), None),
    }
}
