//! Context-document assembly for the generation call. The block has a fixed
//! shape per product so the model always sees the same fields, and stock is
//! reported per color as available sizes with an urgency marker instead of
//! exact counts.

use crate::models::{is_size_option, Product, Variant};
use crate::orders::OrderSummary;
use crate::ranker::ScoredFaq;

/// At or below this quantity a size is flagged, never counted.
pub const ALMOST_GONE_THRESHOLD: i64 = 2;
const DESCRIPTION_LIMIT: usize = 300;

pub const ALMOST_GONE_MARKER: &str = "¡últimas unidades!";
pub const SOLD_OUT: &str = "agotado";

/// Outcome of the order-lookup concern, as the generation step sees it.
#[derive(Debug, Clone)]
pub enum OrderContext {
    NotAsked,
    AskEmail { order_number: String },
    AskOrderNumber,
    NotFound { order_number: String },
    EmailMismatch,
    Found(Box<OrderSummary>),
}

pub fn build_context(
    products: &[Product],
    faqs: &[ScoredFaq],
    order: &OrderContext,
    brand_name: &str,
) -> String {
    let mut out = String::new();

    if products.is_empty() {
        out.push_str("No hay productos relevantes para esta consulta.\n\n");
    } else {
        out.push_str("Productos disponibles:\n\n");
        for product in products {
            out.push_str(&product_block(product));
            out.push('\n');
        }
    }

    if !faqs.is_empty() {
        out.push_str("Preguntas frecuentes relevantes:\n");
        for scored in faqs {
            out.push_str(&format!(
                "P: {}\nR: {}\n",
                scored.faq.question, scored.faq.answer
            ));
        }
        out.push('\n');
    }

    out.push_str(&order_block(order));
    out.push_str(&format!(
        "\nMarca: {}. Ropa y accesorios propios; solo se vende lo que aparece en este contexto.\n",
        brand_name
    ));

    out
}

fn product_block(product: &Product) -> String {
    let price = product.display_price().unwrap_or("consultar");
    let colors = product.color_values().join(", ");
    let mut block = format!(
        "- id: {}\n  título: {}\n  precio: {}\n",
        product.id, product.title, price
    );
    if !colors.is_empty() {
        block.push_str(&format!("  colores: {}\n", colors));
    }
    block.push_str(&format!("  stock: {}\n", stock_summary(product)));
    if !product.description.is_empty() {
        block.push_str(&format!(
            "  descripción: {}\n",
            truncate_chars(&product.description, DESCRIPTION_LIMIT)
        ));
    }
    block
}

/// Per-color availability: sizes still in stock (flagged when almost gone),
/// or a sold-out notice. Exact unit counts are never exposed.
pub fn stock_summary(product: &Product) -> String {
    if product.variants.is_empty() {
        return SOLD_OUT.to_string();
    }

    let mut groups: Vec<(String, Vec<String>)> = Vec::new();
    for variant in &product.variants {
        let color = variant_color(variant).unwrap_or_else(|| "único".to_string());
        let idx = match groups.iter().position(|(c, _)| *c == color) {
            Some(idx) => idx,
            None => {
                groups.push((color, Vec::new()));
                groups.len() - 1
            }
        };
        let entry = &mut groups[idx];
        if variant.available && variant.inventory_quantity > 0 {
            let size = variant_size(variant);
            if variant.inventory_quantity <= ALMOST_GONE_THRESHOLD {
                entry.1.push(format!("{} ({})", size, ALMOST_GONE_MARKER));
            } else {
                entry.1.push(size);
            }
        }
    }

    groups
        .into_iter()
        .map(|(color, sizes)| {
            if sizes.is_empty() {
                format!("{}: {}", color, SOLD_OUT)
            } else {
                format!("{}: {}", color, sizes.join(", "))
            }
        })
        .collect::<Vec<_>>()
        .join(" · ")
}

fn variant_color(variant: &Variant) -> Option<String> {
    variant
        .selected_options
        .iter()
        .find(|o| crate::models::is_color_option(&o.name))
        .map(|o| o.value.clone())
}

fn variant_size(variant: &Variant) -> String {
    variant
        .selected_options
        .iter()
        .find(|o| is_size_option(&o.name))
        .map(|o| o.value.clone())
        .unwrap_or_else(|| variant.title.clone())
}

fn truncate_chars(text: &str, limit: usize) -> String {
    if text.chars().count() <= limit {
        text.to_string()
    } else {
        let mut truncated: String = text.chars().take(limit).collect();
        truncated.push('…');
        truncated
    }
}

fn order_block(order: &OrderContext) -> String {
    match order {
        OrderContext::NotAsked => String::new(),
        OrderContext::AskEmail { order_number } => format!(
            "Pedido: el cliente ha indicado el pedido #{} pero falta su email. Pídele únicamente el email asociado al pedido.\n",
            order_number
        ),
        OrderContext::AskOrderNumber => {
            "Pedido: el cliente ha indicado un email pero falta el número de pedido. Pídele únicamente el número de pedido.\n".to_string()
        }
        OrderContext::NotFound { order_number } => format!(
            "Pedido: no existe ningún pedido con el número {}. Pide al cliente que revise el número.\n",
            order_number
        ),
        OrderContext::EmailMismatch => {
            // Hard gate: nothing about the order may be revealed.
            "Pedido: el email indicado no coincide con el del pedido. No confirmes ni desmientas ningún dato del pedido; pide al cliente que verifique su número de pedido y su email.\n".to_string()
        }
        OrderContext::Found(summary) => {
            let mut block = format!(
                "Pedido #{}:\n  estado: {}\n  transportista: {}\n  seguimiento: {}\n",
                summary.number, summary.status, summary.carrier, summary.tracking_number
            );
            if let Some(url) = &summary.tracking_url {
                block.push_str(&format!("  enlace: {}\n", url));
            }
            for item in &summary.items {
                block.push_str(&format!("  artículo: {} x{}\n", item.title, item.quantity));
            }
            block.push_str(&format!("  total: {}\n", summary.total));
            block
        }
    }
}

pub fn system_prompt(brand_name: &str, context: &str) -> String {
    format!(
        r#"Eres el asistente de compras de {brand}. Ayudas a encontrar productos, resuelves dudas de la tienda y informas sobre pedidos.

Usa exclusivamente el siguiente contexto:
{context}

Reglas:
- Recomienda solo productos que aparecen en el contexto, citando su id.
- Si el contexto no contiene la respuesta, admítelo con naturalidad.
- Responde en el idioma del cliente, de forma breve y cercana.
- Nunca muestres unidades exactas de stock.

Devuelve un objeto JSON con esta forma exacta:
{{"reply": "texto para el cliente", "products": [{{"id": "...", "variant_id": "opcional"}}], "category": "producto|pedido|faq|otro"}}"#,
        brand = brand_name,
        context = context
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ProductOption, SelectedOption};
    use std::collections::HashMap;

    fn variant(color: &str, size: &str, quantity: i64) -> Variant {
        Variant {
            id: format!("{}-{}", color, size),
            title: format!("{} / {}", size, color),
            price: "29.90".into(),
            image_url: None,
            available: quantity > 0,
            inventory_quantity: quantity,
            selected_options: vec![
                SelectedOption {
                    name: "Color".into(),
                    value: color.into(),
                },
                SelectedOption {
                    name: "Talla".into(),
                    value: size.into(),
                },
            ],
        }
    }

    fn product(variants: Vec<Variant>) -> Product {
        Product {
            id: "100".into(),
            title: "Sudadera Cumbre".into(),
            handle: "sudadera-cumbre".into(),
            product_type: "sudadera".into(),
            description: "Sudadera de algodón orgánico con capucha forrada".into(),
            description_html: String::new(),
            tags: vec![],
            image_url: None,
            options: vec![ProductOption {
                name: "Color".into(),
                values: vec!["Rojo".into(), "Azul".into()],
            }],
            variants,
            metafields: HashMap::new(),
            embedding: None,
        }
    }

    #[test]
    fn stock_groups_by_color_with_urgency_marker() {
        let summary = stock_summary(&product(vec![
            variant("Rojo", "M", 10),
            variant("Rojo", "L", 1),
            variant("Azul", "M", 0),
        ]));
        assert!(summary.contains("Rojo: M"));
        assert!(summary.contains(&format!("L ({})", ALMOST_GONE_MARKER)));
        assert!(summary.contains(&format!("Azul: {}", SOLD_OUT)));
        // Exact counts never leak.
        assert!(!summary.contains("10"));
    }

    #[test]
    fn variant_free_product_reads_sold_out() {
        assert_eq!(stock_summary(&product(vec![])), SOLD_OUT);
    }

    #[test]
    fn context_carries_product_ids_and_order_directive() {
        let context = build_context(
            &[product(vec![variant("Rojo", "M", 5)])],
            &[],
            &OrderContext::AskEmail {
                order_number: "12345".into(),
            },
            "la tienda",
        );
        assert!(context.contains("id: 100"));
        assert!(context.contains("12345"));
        assert!(context.contains("email"));
    }

    #[test]
    fn mismatch_directive_never_mentions_order_fields() {
        let context = build_context(&[], &[], &OrderContext::EmailMismatch, "la tienda");
        assert!(context.contains("no coincide"));
        assert!(!context.contains("transportista"));
    }

    #[test]
    fn long_descriptions_are_truncated() {
        let mut item = product(vec![]);
        item.description = "x".repeat(1000);
        let block = product_block(&item);
        assert!(block.len() < 600);
    }
}
