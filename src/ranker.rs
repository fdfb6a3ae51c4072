//! Similarity scoring over the in-memory indexes. Base score is the dot
//! product of the query and item vectors (embeddings arrive normalized from
//! the model, so this is a cosine proxy); lexical heuristics adjust the raw
//! score before the final sort.

use crate::models::{Faq, Product};
use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    /// Version-like tokens: "v2", "v10", or bare roman "ii"/"iii".
    static ref VERSION_TOKEN: Regex = Regex::new(r"\b(v\d+|iii|ii)\b").unwrap();
}

#[derive(Debug, Clone)]
pub struct RankPolicy {
    /// Added when a query token longer than 3 chars appears in the title.
    pub title_keyword_boost: f32,
    /// Added when the query's version token appears in the title.
    pub version_match_boost: f32,
    /// Subtracted when the query carries a version token the title lacks.
    pub version_miss_penalty: f32,
    pub product_limit: usize,
    pub faq_limit: usize,
}

impl Default for RankPolicy {
    fn default() -> Self {
        Self {
            title_keyword_boost: 0.3,
            version_match_boost: 0.4,
            version_miss_penalty: 0.3,
            product_limit: 8,
            faq_limit: 2,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ScoredProduct {
    pub product: Product,
    pub score: f32,
}

#[derive(Debug, Clone)]
pub struct ScoredFaq {
    pub faq: Faq,
    pub score: f32,
}

pub fn dot(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b.iter()).map(|(x, y)| x * y).sum()
}

/// Score every embedded product against the query, apply the lexical
/// adjustments, and return the top `policy.product_limit` in descending
/// score order.
pub fn rank_products(
    products: &[Product],
    query_text: &str,
    query_vector: &[f32],
    policy: &RankPolicy,
) -> Vec<ScoredProduct> {
    let query_lower = query_text.to_lowercase();
    let keywords: Vec<&str> = query_lower
        .split_whitespace()
        .filter(|t| t.len() > 3)
        .collect();
    let version_token = VERSION_TOKEN
        .find(&query_lower)
        .map(|m| m.as_str().to_string());

    let mut scored: Vec<ScoredProduct> = products
        .iter()
        .filter_map(|product| {
            let embedding = product.embedding.as_ref()?;
            let mut score = dot(query_vector, embedding);
            let title_lower = product.title.to_lowercase();

            if keywords.iter().any(|kw| title_lower.contains(kw)) {
                score += policy.title_keyword_boost;
            }

            if let Some(token) = &version_token {
                if title_contains_token(&title_lower, token) {
                    score += policy.version_match_boost;
                } else {
                    score -= policy.version_miss_penalty;
                }
            }

            Some(ScoredProduct {
                product: product.clone(),
                score,
            })
        })
        .collect();

    scored.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
    scored.truncate(policy.product_limit);
    scored
}

pub fn rank_faqs(faqs: &[Faq], query_vector: &[f32], policy: &RankPolicy) -> Vec<ScoredFaq> {
    let mut scored: Vec<ScoredFaq> = faqs
        .iter()
        .filter_map(|faq| {
            let embedding = faq.embedding.as_ref()?;
            Some(ScoredFaq {
                faq: faq.clone(),
                score: dot(query_vector, embedding),
            })
        })
        .collect();

    scored.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
    scored.truncate(policy.faq_limit);
    scored
}

fn title_contains_token(title_lower: &str, token: &str) -> bool {
    // Roman-numeral tokens need word boundaries ("ii" is inside "iii");
    // "v2"-style tokens are unambiguous as substrings.
    if token.starts_with('v') {
        title_lower.contains(token)
    } else {
        VERSION_TOKEN
            .find_iter(title_lower)
            .any(|m| m.as_str() == token)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn product(id: &str, title: &str, embedding: Vec<f32>) -> Product {
        Product {
            id: id.into(),
            title: title.into(),
            handle: id.into(),
            product_type: "sudadera".into(),
            description: String::new(),
            description_html: String::new(),
            tags: vec![],
            image_url: None,
            options: vec![],
            variants: vec![],
            metafields: HashMap::new(),
            embedding: Some(embedding),
        }
    }

    #[test]
    fn keyword_in_title_outranks_identical_similarity() {
        let query_vec = vec![1.0, 0.0];
        let items = vec![
            product("a", "Sudadera Urbana", vec![1.0, 0.0]),
            product("b", "Chaqueta Alpina", vec![1.0, 0.0]),
        ];
        let ranked = rank_products(&items, "una chaqueta de invierno", &query_vec, &RankPolicy::default());
        assert_eq!(ranked[0].product.id, "b");
        assert!(ranked[0].score > ranked[1].score);
    }

    #[test]
    fn version_token_separates_product_lines() {
        let query_vec = vec![1.0, 0.0];
        let items = vec![
            product("v1", "Sudadera Cumbre", vec![1.0, 0.0]),
            product("v2", "Sudadera Cumbre V2", vec![1.0, 0.0]),
        ];
        let ranked = rank_products(&items, "sudadera cumbre v2", &query_vec, &RankPolicy::default());
        assert_eq!(ranked[0].product.id, "v2");
        // Match bonus plus miss penalty: at least 0.7 apart.
        assert!(ranked[0].score - ranked[1].score >= 0.7);
    }

    #[test]
    fn roman_numeral_ii_does_not_match_iii() {
        assert!(title_contains_token("gorra urbana ii", "ii"));
        assert!(!title_contains_token("gorra urbana iii", "ii"));
    }

    #[test]
    fn results_truncated_to_policy_limit() {
        let query_vec = vec![1.0];
        let items: Vec<Product> = (0..20)
            .map(|i| product(&format!("p{}", i), "Camiseta", vec![i as f32 / 20.0]))
            .collect();
        let ranked = rank_products(&items, "camiseta", &query_vec, &RankPolicy::default());
        assert_eq!(ranked.len(), 8);
        // Descending order.
        assert!(ranked.windows(2).all(|w| w[0].score >= w[1].score));
    }

    #[test]
    fn unembedded_records_are_skipped() {
        let mut item = product("a", "Camiseta", vec![1.0]);
        item.embedding = None;
        let ranked = rank_products(&[item], "camiseta", &[1.0], &RankPolicy::default());
        assert!(ranked.is_empty());
    }
}
