//! # Catalog Items
//!
//! Items carry two prices: the public `base_price` and the private
//! `floor_price`. The floor is never disclosed in any counterparty-visible
//! field; only the membrane and the reasoner prompt builder may read it.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Occupancy level hint stored in item metadata.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Occupancy {
    /// Plenty of inventory left.
    Low,
    /// Normal demand.
    Medium,
    /// Nearly sold out.
    High,
}

/// A perk that may be offered instead of a deeper discount.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ValueAdd {
    /// Human-readable perk name (e.g. "Late checkout").
    pub item: String,
    /// What the perk costs us.
    #[serde(default)]
    pub internal_cost: f64,
    /// What the buyer thinks it is worth.
    #[serde(default)]
    pub perceived_value: f64,
}

/// Free-form item metadata with the economically relevant fields typed.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ItemMeta {
    /// Our all-in cost for the item; drives the minimum-margin guardrail.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub internal_cost: Option<f64>,
    /// Current occupancy level.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub occupancy: Option<Occupancy>,
    /// Perks available for this item.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub value_add_inventory: Vec<ValueAdd>,
    /// Anything else the seeder stored (stars, location, ...).
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

/// A negotiable catalog item.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Item {
    /// Opaque identifier.
    pub id: String,
    /// Display name.
    pub name: String,
    /// Public listing price in USD.
    pub base_price: f64,
    /// Minimum acceptable sale price in USD. Invariant: `floor_price <= base_price`.
    pub floor_price: f64,
    /// Inactive items are invisible to negotiation and search.
    #[serde(default = "default_active")]
    pub active: bool,
    /// Economic metadata.
    #[serde(default)]
    pub meta: ItemMeta,
    /// Fixed-width embedding vector; only Search requires it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub embedding: Option<Vec<f32>>,
}

fn default_active() -> bool {
    true
}

impl Item {
    /// The internal cost, when the seeder recorded a positive one.
    pub fn internal_cost(&self) -> Option<f64> {
        self.meta.internal_cost.filter(|c| *c > 0.0)
    }
}

/// The subset of item fields the pipeline carries per request.
///
/// A missing item is represented as `None` in [`crate::HiveContext`], not as
/// an error: the reasoner decides what a missing item means.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ItemSnapshot {
    /// Display name.
    pub name: String,
    /// Public listing price in USD.
    pub base_price: f64,
    /// Minimum acceptable sale price in USD.
    pub floor_price: f64,
    /// Positive internal cost, when known.
    pub internal_cost: Option<f64>,
    /// Occupancy hint, when known.
    pub occupancy: Option<Occupancy>,
    /// Perks available for this item.
    pub value_adds: Vec<ValueAdd>,
}

impl From<&Item> for ItemSnapshot {
    fn from(item: &Item) -> Self {
        Self {
            name: item.name.clone(),
            base_price: item.base_price,
            floor_price: item.floor_price,
            internal_cost: item.internal_cost(),
            occupancy: item.meta.occupancy,
            value_adds: item.meta.value_add_inventory.clone(),
        }
    }
}

/// One vector-search result.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SearchHit {
    /// Item identifier.
    pub item_id: String,
    /// Display name.
    pub name: String,
    /// Public listing price in USD.
    pub base_price: f64,
    /// Cosine similarity in `[-1, 1]`; results are returned best-first.
    pub similarity: f64,
    /// Short description derived from item metadata.
    pub snippet: String,
}
