//! In-memory catalog and FAQ indexes. Populated once per process via
//! `ensure_loaded` (single-flighted), restored from a local JSON snapshot
//! when one is present and compatible, rebuilt from the storefront otherwise.
//! Entries are append-only during the cold load and read-only afterwards.

use crate::catalog::StorefrontClient;
use crate::errors::ServiceError;
use crate::faq::default_faqs;
use crate::metrics;
use crate::models::{Faq, Product};
use crate::neural::openai::OpenAIService;
use crate::ranker::{self, RankPolicy, ScoredFaq, ScoredProduct};
use chrono::{DateTime, Utc};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};
use tracing::{info, warn};

const CATALOG_SNAPSHOT: &str = "catalog_index.json";
const FAQ_SNAPSHOT: &str = "faq_index.json";

/// On-disk snapshot envelope. The model name and dimension gate restores: a
/// snapshot embedded with a different model would silently corrupt
/// similarity scores.
#[derive(Serialize, Deserialize)]
struct Snapshot<T> {
    model: String,
    dim: usize,
    built_at: DateTime<Utc>,
    records: Vec<T>,
}

/// Borrowed view of [`Snapshot`] for writing without cloning the records.
#[derive(Serialize)]
struct SnapshotRef<'a, T> {
    model: &'a str,
    dim: usize,
    built_at: DateTime<Utc>,
    records: &'a [T],
}

pub struct CatalogIndex {
    products: RwLock<Vec<Product>>,
    load_guard: Mutex<()>,
    catalog: Arc<StorefrontClient>,
    embedder: Arc<OpenAIService>,
    snapshot_path: PathBuf,
}

impl CatalogIndex {
    pub fn new(
        catalog: Arc<StorefrontClient>,
        embedder: Arc<OpenAIService>,
        snapshot_dir: &str,
    ) -> Self {
        Self {
            products: RwLock::new(Vec::new()),
            load_guard: Mutex::new(()),
            catalog,
            embedder,
            snapshot_path: Path::new(snapshot_dir).join(CATALOG_SNAPSHOT),
        }
    }

    /// Idempotent, safe on the request path. Concurrent cold starts share
    /// one load through the guard.
    pub async fn ensure_loaded(&self) -> Result<(), ServiceError> {
        if !self.products.read().await.is_empty() {
            return Ok(());
        }

        let _guard = self.load_guard.lock().await;
        if !self.products.read().await.is_empty() {
            return Ok(());
        }

        if let Some(records) = load_snapshot::<Product>(
            &self.snapshot_path,
            self.embedder.model(),
            self.embedder.dimension(),
        )
        .await
        {
            info!("Catalog index restored from snapshot ({} products)", records.len());
            metrics::SNAPSHOT_RESTORES.inc();
            *self.products.write().await = records;
            return Ok(());
        }

        let records = self.rebuild().await;
        info!("Catalog index rebuilt ({} products)", records.len());
        metrics::INDEX_REBUILDS.inc();
        // A rebuild that embedded nothing is not worth caching.
        if records.iter().any(|p| p.embedding.is_some()) {
            save_snapshot(
                &self.snapshot_path,
                self.embedder.model(),
                self.embedder.dimension(),
                &records,
            )
            .await;
        }
        *self.products.write().await = records;
        Ok(())
    }

    /// Page through the active catalog and embed each product. A page fetch
    /// failure ends the walk early: a partial index beats none.
    async fn rebuild(&self) -> Vec<Product> {
        let mut products: Vec<Product> = Vec::new();
        let mut cursor: Option<String> = None;

        loop {
            let page = match self.catalog.fetch_products_page(cursor.as_deref()).await {
                Ok(page) => page,
                Err(err) => {
                    warn!("Catalog page fetch failed, keeping partial index: {}", err);
                    break;
                }
            };
            if page.is_empty() {
                break;
            }
            let page_len = page.len() as u32;
            cursor = page.last().map(|p| p.id.clone());

            for mut product in page {
                match self
                    .embedder
                    .get_embedding(&product.embedding_document())
                    .await
                {
                    Ok(vector) => product.embedding = Some(vector),
                    Err(err) => {
                        warn!("Embedding failed for product {}: {}", product.id, err);
                    }
                }
                products.push(product);
            }

            if page_len < self.catalog.page_size() {
                break;
            }
        }

        products
    }

    pub async fn len(&self) -> usize {
        self.products.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.products.read().await.is_empty()
    }

    /// Records for the given identifiers, in the order requested. Unknown
    /// ids are skipped.
    pub async fn get_by_ids(&self, ids: &[String]) -> Vec<Product> {
        let products = self.products.read().await;
        ids.iter()
            .filter_map(|id| products.iter().find(|p| &p.id == id).cloned())
            .collect()
    }

    pub async fn top_matches(
        &self,
        query_text: &str,
        query_vector: &[f32],
        policy: &RankPolicy,
    ) -> Vec<ScoredProduct> {
        let products = self.products.read().await;
        ranker::rank_products(&products, query_text, query_vector, policy)
    }
}

pub struct FaqIndex {
    faqs: RwLock<Vec<Faq>>,
    load_guard: Mutex<()>,
    embedder: Arc<OpenAIService>,
    snapshot_path: PathBuf,
}

impl FaqIndex {
    pub fn new(embedder: Arc<OpenAIService>, snapshot_dir: &str) -> Self {
        Self {
            faqs: RwLock::new(Vec::new()),
            load_guard: Mutex::new(()),
            embedder,
            snapshot_path: Path::new(snapshot_dir).join(FAQ_SNAPSHOT),
        }
    }

    pub async fn ensure_loaded(&self) -> Result<(), ServiceError> {
        if !self.faqs.read().await.is_empty() {
            return Ok(());
        }

        let _guard = self.load_guard.lock().await;
        if !self.faqs.read().await.is_empty() {
            return Ok(());
        }

        if let Some(records) = load_snapshot::<Faq>(
            &self.snapshot_path,
            self.embedder.model(),
            self.embedder.dimension(),
        )
        .await
        {
            info!("FAQ index restored from snapshot ({} entries)", records.len());
            metrics::SNAPSHOT_RESTORES.inc();
            *self.faqs.write().await = records;
            return Ok(());
        }

        let mut records = default_faqs();
        for faq in records.iter_mut() {
            match self.embedder.get_embedding(&faq.question).await {
                Ok(vector) => faq.embedding = Some(vector),
                Err(err) => warn!("Embedding failed for FAQ entry: {}", err),
            }
        }
        info!("FAQ index rebuilt ({} entries)", records.len());
        metrics::INDEX_REBUILDS.inc();
        if records.iter().any(|f| f.embedding.is_some()) {
            save_snapshot(
                &self.snapshot_path,
                self.embedder.model(),
                self.embedder.dimension(),
                &records,
            )
            .await;
        }
        *self.faqs.write().await = records;
        Ok(())
    }

    pub async fn top_matches(&self, query_vector: &[f32], policy: &RankPolicy) -> Vec<ScoredFaq> {
        let faqs = self.faqs.read().await;
        ranker::rank_faqs(&faqs, query_vector, policy)
    }
}

/// Restore a snapshot if it exists, parses and matches the configured
/// embedder. Any failure is non-fatal and reported as a rebuild trigger.
async fn load_snapshot<T: DeserializeOwned>(
    path: &Path,
    model: &str,
    dim: usize,
) -> Option<Vec<T>> {
    let raw = match tokio::fs::read_to_string(path).await {
        Ok(raw) => raw,
        Err(_) => return None,
    };
    let snapshot: Snapshot<T> = match serde_json::from_str(&raw) {
        Ok(snapshot) => snapshot,
        Err(err) => {
            warn!("Snapshot {} unreadable, rebuilding: {}", path.display(), err);
            return None;
        }
    };
    if snapshot.model != model || snapshot.dim != dim {
        warn!(
            "Snapshot {} was built with {}/{} but the embedder is {}/{}, rebuilding",
            path.display(),
            snapshot.model,
            snapshot.dim,
            model,
            dim
        );
        return None;
    }
    if snapshot.records.is_empty() {
        return None;
    }
    Some(snapshot.records)
}

/// Best-effort snapshot write; a failure only costs the next cold start.
async fn save_snapshot<T: Serialize>(path: &Path, model: &str, dim: usize, records: &[T]) {
    if records.is_empty() {
        return;
    }
    let snapshot = SnapshotRef {
        model,
        dim,
        built_at: Utc::now(),
        records,
    };
    let payload = match serde_json::to_string(&snapshot) {
        Ok(payload) => payload,
        Err(err) => {
            warn!("Snapshot serialization failed: {}", err);
            return;
        }
    };
    if let Some(parent) = path.parent() {
        if let Err(err) = tokio::fs::create_dir_all(parent).await {
            warn!("Snapshot dir create failed: {}", err);
            return;
        }
    }
    if let Err(err) = tokio::fs::write(path, payload).await {
        warn!("Snapshot write failed for {}: {}", path.display(), err);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snapshot_roundtrip_preserves_header() {
        let snapshot = Snapshot {
            model: "text-embedding-3-small".to_string(),
            dim: 1536,
            built_at: Utc::now(),
            records: vec![default_faqs().remove(0)],
        };
        let raw = serde_json::to_string(&snapshot).unwrap();
        let parsed: Snapshot<Faq> = serde_json::from_str(&raw).unwrap();
        assert_eq!(parsed.model, "text-embedding-3-small");
        assert_eq!(parsed.dim, 1536);
        assert_eq!(parsed.records.len(), 1);
    }
}
