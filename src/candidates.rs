//! The per-request candidate set: insertion-ordered, deduplicated by product
//! identifier, bounded in size. Items the user currently has on screen enter
//! first and are never evicted by fresh search hits.

use crate::models::Product;
use crate::ranker::ScoredProduct;
use std::collections::HashSet;

pub const DEFAULT_CANDIDATE_CAP: usize = 10;

#[derive(Debug)]
pub struct CandidateSet {
    items: Vec<Product>,
    seen: HashSet<String>,
    cap: usize,
}

impl CandidateSet {
    pub fn new(cap: usize) -> Self {
        Self {
            items: Vec::new(),
            seen: HashSet::new(),
            cap,
        }
    }

    /// Insert regardless of the cap. Duplicate identifiers are no-ops.
    pub fn insert_pinned(&mut self, product: Product) {
        if self.seen.insert(product.id.clone()) {
            self.items.push(product);
        }
    }

    /// Insert only while below the cap. Returns whether the item was kept.
    pub fn insert_capped(&mut self, product: Product) -> bool {
        if self.seen.contains(&product.id) {
            return false;
        }
        if self.items.len() >= self.cap {
            return false;
        }
        self.seen.insert(product.id.clone());
        self.items.push(product);
        true
    }

    pub fn contains(&self, id: &str) -> bool {
        self.seen.contains(id)
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn as_slice(&self) -> &[Product] {
        &self.items
    }

    pub fn into_vec(self) -> Vec<Product> {
        self.items
    }
}

/// Merge on-screen items with ranked search results into one bounded list.
pub fn merge_candidates(
    visible: Vec<Product>,
    ranked: Vec<ScoredProduct>,
    cap: usize,
) -> Vec<Product> {
    let mut set = CandidateSet::new(cap);
    for product in visible {
        set.insert_pinned(product);
    }
    for scored in ranked {
        set.insert_capped(scored.product);
    }
    set.into_vec()
}
