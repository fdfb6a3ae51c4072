//! Defensive handling of the model's "structured" output. The completion is
//! free text that should contain one JSON object; everything around it is
//! discarded, and anything that fails schema validation degrades to a fixed
//! safe reply instead of an error.

use crate::models::{CardVariant, Product, ProductCard};
use serde_json::Value;
use std::collections::HashSet;

pub const FALLBACK_REPLY: &str =
    "Lo siento, ha habido un problema al preparar la respuesta. ¿Puedes intentarlo de nuevo en un momento?";
pub const FALLBACK_CATEGORY: &str = "error";
const DEFAULT_CATEGORY: &str = "otro";

#[derive(Debug, Clone, PartialEq)]
pub struct AssistantPayload {
    pub reply: String,
    pub products: Vec<ProductRef>,
    pub category: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ProductRef {
    pub id: String,
    pub variant_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ParsedReply {
    Ok(AssistantPayload),
    Fallback,
}

impl ParsedReply {
    pub fn into_payload(self) -> AssistantPayload {
        match self {
            ParsedReply::Ok(payload) => payload,
            ParsedReply::Fallback => fallback_payload(),
        }
    }
}

pub fn fallback_payload() -> AssistantPayload {
    AssistantPayload {
        reply: FALLBACK_REPLY.to_string(),
        products: Vec::new(),
        category: FALLBACK_CATEGORY.to_string(),
    }
}

/// Pull the JSON object out of the raw completion, tolerating commentary or
/// code fences around it. Schema: `reply` is a required string, `products`
/// an optional array of `{id, variant_id?}`, `category` an optional string.
pub fn extract_payload(raw: &str) -> ParsedReply {
    let start = match raw.find('{') {
        Some(start) => start,
        None => return ParsedReply::Fallback,
    };
    let end = match raw.rfind('}') {
        Some(end) if end > start => end,
        _ => return ParsedReply::Fallback,
    };

    let value: Value = match serde_json::from_str(&raw[start..=end]) {
        Ok(value) => value,
        Err(_) => return ParsedReply::Fallback,
    };

    let reply = match value.get("reply").and_then(Value::as_str) {
        Some(reply) if !reply.trim().is_empty() => reply.to_string(),
        _ => return ParsedReply::Fallback,
    };

    let products = match value.get("products") {
        None | Some(Value::Null) => Vec::new(),
        Some(Value::Array(entries)) => entries.iter().filter_map(product_ref).collect(),
        // A present-but-malformed product list invalidates the payload.
        Some(_) => return ParsedReply::Fallback,
    };

    let category = value
        .get("category")
        .and_then(Value::as_str)
        .filter(|c| !c.trim().is_empty())
        .unwrap_or(DEFAULT_CATEGORY)
        .to_string();

    ParsedReply::Ok(AssistantPayload {
        reply,
        products,
        category,
    })
}

/// Ids sometimes come back as numbers; both forms resolve.
fn id_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn product_ref(entry: &Value) -> Option<ProductRef> {
    let id = id_string(entry.get("id")?)?;
    let variant_id = entry.get("variant_id").and_then(id_string);
    Some(ProductRef { id, variant_id })
}

/// Map referenced ids back to the candidate records shown to the model.
/// Unknown and repeated ids are dropped; first-mention order is preserved;
/// display fields always land on a safe value.
pub fn materialize(refs: &[ProductRef], candidates: &[Product]) -> Vec<ProductCard> {
    let mut seen: HashSet<&str> = HashSet::new();
    let mut cards = Vec::new();

    for product_ref in refs {
        if !seen.insert(product_ref.id.as_str()) {
            continue;
        }
        let Some(product) = candidates.iter().find(|p| p.id == product_ref.id) else {
            continue;
        };

        let variant = product_ref
            .variant_id
            .as_deref()
            .and_then(|vid| product.variants.iter().find(|v| v.id == vid));

        let price = variant
            .map(|v| v.price.clone())
            .or_else(|| product.display_price().map(|p| p.to_string()))
            .unwrap_or_else(|| "0.00".to_string());

        let image_url = variant
            .and_then(|v| v.image_url.clone())
            .or_else(|| product.image_url.clone())
            .unwrap_or_default();

        let title = if product.title.trim().is_empty() {
            "Producto".to_string()
        } else {
            product.title.clone()
        };

        cards.push(ProductCard {
            id: product.id.clone(),
            title,
            price,
            image_url,
            handle: product.handle.clone(),
            variant_id: variant.map(|v| v.id.clone()),
            variant_title: variant.map(|v| v.title.clone()),
            options: product.options.clone(),
            variants: product
                .variants
                .iter()
                .map(|v| CardVariant {
                    id: v.id.clone(),
                    title: v.title.clone(),
                    price: v.price.clone(),
                    available: v.available,
                })
                .collect(),
        });
    }

    cards
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{SelectedOption, Variant};
    use assert_matches::assert_matches;
    use std::collections::HashMap;

    fn candidate(id: &str) -> Product {
        Product {
            id: id.into(),
            title: format!("Producto {}", id),
            handle: format!("producto-{}", id),
            product_type: String::new(),
            description: String::new(),
            description_html: String::new(),
            tags: vec![],
            image_url: Some("https://cdn.example/base.jpg".into()),
            options: vec![],
            variants: vec![Variant {
                id: format!("{}-v1", id),
                title: "M / Rojo".into(),
                price: "34.90".into(),
                image_url: Some("https://cdn.example/variant.jpg".into()),
                available: true,
                inventory_quantity: 4,
                selected_options: vec![SelectedOption {
                    name: "Talla".into(),
                    value: "M".into(),
                }],
            }],
            metafields: HashMap::new(),
            embedding: None,
        }
    }

    #[test]
    fn wrapped_json_still_parses() {
        let parsed = extract_payload("Here you go: {\"reply\":\"hi\",\"products\":[]} thanks");
        match parsed {
            ParsedReply::Ok(payload) => {
                assert_eq!(payload.reply, "hi");
                assert!(payload.products.is_empty());
                assert_eq!(payload.category, DEFAULT_CATEGORY);
            }
            ParsedReply::Fallback => panic!("expected parsed payload"),
        }
    }

    #[test]
    fn garbage_falls_back_without_panicking() {
        assert_matches!(extract_payload("sin json por aquí"), ParsedReply::Fallback);
        assert_matches!(extract_payload("{\"reply\": }"), ParsedReply::Fallback);
        assert_matches!(extract_payload("}{"), ParsedReply::Fallback);
        let payload = extract_payload("nada").into_payload();
        assert_eq!(payload.reply, FALLBACK_REPLY);
        assert_eq!(payload.category, FALLBACK_CATEGORY);
    }

    #[test]
    fn missing_reply_is_a_fallback() {
        assert_matches!(
            extract_payload("{\"products\":[{\"id\":\"1\"}]}"),
            ParsedReply::Fallback
        );
    }

    #[test]
    fn numeric_ids_are_accepted() {
        let parsed = extract_payload("{\"reply\":\"ok\",\"products\":[{\"id\":812345}]}");
        match parsed {
            ParsedReply::Ok(payload) => assert_eq!(payload.products[0].id, "812345"),
            ParsedReply::Fallback => panic!("expected parsed payload"),
        }
    }

    #[test]
    fn repeated_and_unknown_ids_collapse() {
        let refs = vec![
            ProductRef {
                id: "a".into(),
                variant_id: None,
            },
            ProductRef {
                id: "fantasma".into(),
                variant_id: None,
            },
            ProductRef {
                id: "a".into(),
                variant_id: None,
            },
            ProductRef {
                id: "b".into(),
                variant_id: None,
            },
        ];
        let cards = materialize(&refs, &[candidate("a"), candidate("b")]);
        let ids: Vec<&str> = cards.iter().map(|c| c.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b"]);
    }

    #[test]
    fn variant_reference_prefers_variant_image_and_price() {
        let refs = vec![ProductRef {
            id: "a".into(),
            variant_id: Some("a-v1".into()),
        }];
        let cards = materialize(&refs, &[candidate("a")]);
        assert_eq!(cards[0].image_url, "https://cdn.example/variant.jpg");
        assert_eq!(cards[0].price, "34.90");
        assert_eq!(cards[0].variant_id.as_deref(), Some("a-v1"));
    }

    #[test]
    fn unknown_variant_falls_back_to_product_fields() {
        let refs = vec![ProductRef {
            id: "a".into(),
            variant_id: Some("no-existe".into()),
        }];
        let cards = materialize(&refs, &[candidate("a")]);
        assert!(cards[0].variant_id.is_none());
        assert_eq!(cards[0].image_url, "https://cdn.example/base.jpg");
    }
}
