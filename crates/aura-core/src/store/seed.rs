//! # Catalog Seeding
//!
//! Idempotent demo-catalog seeding, used out-of-band (never by the request
//! path). Embeddings are attached when a client is supplied; items seeded
//! without one simply stay invisible to Search.

use aura_types::{Item, ItemMeta, StoreError};
use tracing::{info, warn};

use super::ItemStore;
use crate::embeddings::EmbeddingClient;

fn demo_items() -> Vec<(Item, &'static str)> {
    vec![
        (
            Item {
                id: "hotel_alpha".into(),
                name: "Grand Hotel Alpha (Luxury)".into(),
                base_price: 1000.0,
                floor_price: 800.0,
                active: true,
                meta: ItemMeta {
                    internal_cost: Some(600.0),
                    occupancy: None,
                    value_add_inventory: Vec::new(),
                    extra: [
                        ("stars".to_string(), serde_json::json!(5)),
                        ("location".to_string(), serde_json::json!("Dubai")),
                    ]
                    .into_iter()
                    .collect(),
                },
                embedding: None,
            },
            "Luxury 5-star hotel in Dubai downtown with infinity pool, spa, and ocean view. \
             Best for business and elite travelers.",
        ),
        (
            Item {
                id: "hostel_beta".into(),
                name: "Backpacker Hostel Beta".into(),
                base_price: 50.0,
                floor_price: 40.0,
                active: true,
                meta: ItemMeta {
                    internal_cost: Some(25.0),
                    occupancy: None,
                    value_add_inventory: Vec::new(),
                    extra: [
                        ("stars".to_string(), serde_json::json!(2)),
                        ("location".to_string(), serde_json::json!("Bali")),
                    ]
                    .into_iter()
                    .collect(),
                },
                embedding: None,
            },
            "Cheap, cozy hostel in Bali near the beach. Perfect for digital nomads, surfers \
             and students. Shared rooms available.",
        ),
    ]
}

/// Upsert the demo catalog.
pub async fn seed_demo_items(
    store: &dyn ItemStore,
    embeddings: Option<&EmbeddingClient>,
) -> Result<usize, StoreError> {
    let items = demo_items();
    info!(event = "seeding_started", item_count = items.len(), "seeding catalog");

    let mut seeded = 0;
    for (mut item, description) in items {
        item.meta
            .extra
            .insert("description".to_string(), serde_json::json!(description));
        if let Some(client) = embeddings {
            match client.embed(description).await {
                Ok(vector) => item.embedding = Some(vector),
                Err(e) => {
                    warn!(event = "embedding_generation_failed", item_id = %item.id, error = %e, "seeding without embedding");
                }
            }
        }
        store.upsert(item).await?;
        seeded += 1;
    }

    info!(event = "seeding_completed", seeded, "catalog ready");
    Ok(seeded)
}
