//! # Item Store
//!
//! Read-mostly repository for catalog items plus vector search. Writes
//! happen only out-of-band (seeding); the pipeline never mutates items.
//!
//! The port is a trait so the test suite and development mode run against
//! [`MemoryItemStore`] while production uses [`postgres::PgItemStore`].

pub mod postgres;
pub mod seed;

use async_trait::async_trait;
use aura_types::{Item, SearchHit, StoreError};
use parking_lot::RwLock;
use std::collections::HashMap;

/// Repository port for catalog items.
#[async_trait]
pub trait ItemStore: Send + Sync {
    /// Fetch an item by id. `Ok(None)` when it does not exist.
    async fn get(&self, item_id: &str) -> Result<Option<Item>, StoreError>;

    /// Insert or update an item (seeding only).
    async fn upsert(&self, item: Item) -> Result<(), StoreError>;

    /// Cosine-similarity search over active items with embeddings.
    ///
    /// Results come back best-first, filtered by `min_similarity` when set.
    async fn search(
        &self,
        query: &[f32],
        limit: usize,
        min_similarity: Option<f64>,
    ) -> Result<Vec<SearchHit>, StoreError>;
}

/// Cosine similarity between two vectors; 0.0 for mismatched or empty input.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f64 {
    if a.is_empty() || a.len() != b.len() {
        return 0.0;
    }
    let mut dot = 0.0f64;
    let mut norm_a = 0.0f64;
    let mut norm_b = 0.0f64;
    for (x, y) in a.iter().zip(b.iter()) {
        dot += f64::from(*x) * f64::from(*y);
        norm_a += f64::from(*x) * f64::from(*x);
        norm_b += f64::from(*y) * f64::from(*y);
    }
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a.sqrt() * norm_b.sqrt())
}

/// Snippet shown in search results, derived from item metadata.
pub fn description_snippet(item: &Item) -> String {
    if let Some(serde_json::Value::String(desc)) = item.meta.extra.get("description") {
        return desc.clone();
    }
    serde_json::to_string(&item.meta.extra).unwrap_or_default()
}

/// In-memory item store for tests and development mode.
#[derive(Default)]
pub struct MemoryItemStore {
    items: RwLock<HashMap<String, Item>>,
}

impl MemoryItemStore {
    /// Empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Store pre-populated with items.
    pub fn with_items(items: impl IntoIterator<Item = Item>) -> Self {
        let store = Self::new();
        {
            let mut guard = store.items.write();
            for item in items {
                guard.insert(item.id.clone(), item);
            }
        }
        store
    }
}

#[async_trait]
impl ItemStore for MemoryItemStore {
    async fn get(&self, item_id: &str) -> Result<Option<Item>, StoreError> {
        Ok(self.items.read().get(item_id).cloned())
    }

    async fn upsert(&self, item: Item) -> Result<(), StoreError> {
        self.items.write().insert(item.id.clone(), item);
        Ok(())
    }

    async fn search(
        &self,
        query: &[f32],
        limit: usize,
        min_similarity: Option<f64>,
    ) -> Result<Vec<SearchHit>, StoreError> {
        let mut hits: Vec<SearchHit> = self
            .items
            .read()
            .values()
            .filter(|item| item.active)
            .filter_map(|item| {
                let embedding = item.embedding.as_ref()?;
                let similarity = cosine_similarity(query, embedding);
                Some(SearchHit {
                    item_id: item.id.clone(),
                    name: item.name.clone(),
                    base_price: item.base_price,
                    similarity,
                    snippet: description_snippet(item),
                })
            })
            .collect();
        hits.sort_by(|a, b| {
            b.similarity
                .partial_cmp(&a.similarity)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        if let Some(min) = min_similarity {
            hits.retain(|hit| hit.similarity >= min);
        }
        hits.truncate(limit);
        Ok(hits)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use aura_types::ItemMeta;

    fn item(id: &str, embedding: Option<Vec<f32>>) -> Item {
        Item {
            id: id.into(),
            name: format!("Item {id}"),
            base_price: 100.0,
            floor_price: 80.0,
            active: true,
            meta: ItemMeta::default(),
            embedding,
        }
    }

    #[test]
    fn test_cosine_similarity_basic() {
        assert!((cosine_similarity(&[1.0, 0.0], &[1.0, 0.0]) - 1.0).abs() < 1e-9);
        assert!(cosine_similarity(&[1.0, 0.0], &[0.0, 1.0]).abs() < 1e-9);
        assert!((cosine_similarity(&[1.0, 0.0], &[-1.0, 0.0]) + 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_cosine_similarity_degenerate() {
        assert_eq!(cosine_similarity(&[], &[]), 0.0);
        assert_eq!(cosine_similarity(&[1.0], &[1.0, 2.0]), 0.0);
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 1.0]), 0.0);
    }

    #[tokio::test]
    async fn test_memory_store_get_and_upsert() {
        let store = MemoryItemStore::new();
        assert!(store.get("a").await.unwrap().is_none());
        store.upsert(item("a", None)).await.unwrap();
        assert_eq!(store.get("a").await.unwrap().unwrap().id, "a");
    }

    #[tokio::test]
    async fn test_search_orders_by_similarity() {
        let store = MemoryItemStore::with_items([
            item("near", Some(vec![1.0, 0.0])),
            item("far", Some(vec![0.0, 1.0])),
            item("no_embedding", None),
        ]);
        let hits = store.search(&[1.0, 0.1], 10, None).await.unwrap();
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].item_id, "near");
        assert!(hits[0].similarity > hits[1].similarity);
    }

    #[tokio::test]
    async fn test_search_min_similarity_filter() {
        let store = MemoryItemStore::with_items([
            item("near", Some(vec![1.0, 0.0])),
            item("far", Some(vec![0.0, 1.0])),
        ]);
        let hits = store.search(&[1.0, 0.0], 10, Some(0.5)).await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].item_id, "near");
    }

    #[tokio::test]
    async fn test_search_skips_inactive() {
        let mut inactive = item("inactive", Some(vec![1.0, 0.0]));
        inactive.active = false;
        let store = MemoryItemStore::with_items([inactive]);
        let hits = store.search(&[1.0, 0.0], 10, None).await.unwrap();
        assert!(hits.is_empty());
    }
}
