/// End-to-end retrieval flow over synthetic embeddings: expansion, ranking,
/// merging and materialization chained the way the chat pipeline runs them,
/// with no collaborator in the loop.
use std::collections::HashMap;

use storefront_chat_server::candidates::merge_candidates;
use storefront_chat_server::models::{Product, ProductOption, SelectedOption, Variant};
use storefront_chat_server::normalizer::QueryNormalizer;
use storefront_chat_server::prompt::{self, OrderContext};
use storefront_chat_server::ranker::{rank_products, RankPolicy};
use storefront_chat_server::reply::{extract_payload, materialize, ParsedReply};

fn product(id: &str, title: &str, product_type: &str, embedding: Vec<f32>) -> Product {
    Product {
        id: id.to_string(),
        title: title.to_string(),
        handle: title.to_lowercase().replace(' ', "-"),
        product_type: product_type.to_string(),
        description: format!("{} de la colección actual", title),
        description_html: String::new(),
        tags: vec![product_type.to_string()],
        image_url: Some(format!("https://cdn.example/{}.jpg", id)),
        options: vec![ProductOption {
            name: "Color".to_string(),
            values: vec!["Rojo".to_string()],
        }],
        variants: vec![Variant {
            id: format!("{}-m", id),
            title: "M / Rojo".to_string(),
            price: "49.90".to_string(),
            image_url: None,
            available: true,
            inventory_quantity: 5,
            selected_options: vec![
                SelectedOption {
                    name: "Color".to_string(),
                    value: "Rojo".to_string(),
                },
                SelectedOption {
                    name: "Talla".to_string(),
                    value: "M".to_string(),
                },
            ],
        }],
        metafields: HashMap::new(),
        embedding: Some(embedding),
    }
}

/// A tiny synthetic catalog: axis 0 is "jacket-ness", axis 1 is noise.
fn catalog() -> Vec<Product> {
    let mut items = vec![
        product("10", "Chaqueta Alpina", "chaqueta", vec![0.95, 0.05]),
        product("11", "Chaqueta Urbana", "chaqueta", vec![0.90, 0.10]),
        product("12", "Sudadera Cumbre", "sudadera", vec![0.40, 0.60]),
        product("13", "Gorra Clásica", "gorra", vec![0.05, 0.95]),
    ];
    for i in 0..10 {
        items.push(product(
            &format!("2{}", i),
            &format!("Camiseta Básica {}", i),
            "camiseta",
            vec![0.20, 0.80],
        ));
    }
    items
}

#[test]
fn query_expansion_feeds_the_catalog_vocabulary() {
    let normalized = QueryNormalizer::default().expand("chaqueta roja talla XXL");

    assert!(normalized.contains("chaqueta"));
    // Concept expansion
    assert!(normalized.contains("cazadora"));
    // Color morphology resolved back to the canonical adjective
    assert!(normalized.contains("rojo"));
    // Size token aligned with catalog option values
    assert!(normalized.contains("2xl"));
    assert!(!normalized.split_whitespace().any(|t| t == "xxl"));
}

#[test]
fn ranked_candidates_are_bounded_and_relevant() {
    let normalized = QueryNormalizer::default().expand("chaqueta roja talla XXL");
    let query_vector = vec![1.0, 0.0];

    let ranked = rank_products(&catalog(), &normalized, &query_vector, &RankPolicy::default());

    assert!(ranked.len() <= 8);
    assert_eq!(ranked[0].product.title, "Chaqueta Alpina");
    assert!(ranked
        .windows(2)
        .all(|pair| pair[0].score >= pair[1].score));
}

#[test]
fn full_flow_produces_cards_from_the_candidate_set() {
    let items = catalog();
    let normalized = QueryNormalizer::default().expand("chaqueta roja talla XXL");
    let query_vector = vec![1.0, 0.0];

    let ranked = rank_products(&items, &normalized, &query_vector, &RankPolicy::default());
    let visible = vec![items[3].clone()]; // the user is looking at the cap
    let candidates = merge_candidates(visible, ranked, 10);

    assert_eq!(candidates[0].id, "13");
    assert!(candidates.len() <= 10);

    let context = prompt::build_context(&candidates, &[], &OrderContext::NotAsked, "la tienda");
    assert!(context.contains("id: 13"));
    assert!(context.contains("id: 10"));

    // Simulate a wrapped completion referencing two candidates.
    let raw = r#"Claro, aquí tienes: {"reply":"Te recomiendo la Chaqueta Alpina","products":[{"id":"10","variant_id":"10-m"},{"id":"10"},{"id":"999"}],"category":"producto"} espero que te sirva"#;
    let payload = match extract_payload(raw) {
        ParsedReply::Ok(payload) => payload,
        ParsedReply::Fallback => panic!("expected parsed payload"),
    };

    let cards = materialize(&payload.products, &candidates);

    // Deduplicated, unknown id dropped, everything resolves to a candidate.
    assert_eq!(cards.len(), 1);
    assert_eq!(cards[0].id, "10");
    assert_eq!(cards[0].variant_id.as_deref(), Some("10-m"));
    assert!(cards
        .iter()
        .all(|card| candidates.iter().any(|c| c.id == card.id)));
}
