//! Consumable model: stocked items with min/max thresholds.

use serde::{Deserialize, Serialize};

/// A consumable stock line.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Consumable {
    #[serde(default)]
    pub consumable_id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub quantity: i64,
    #[serde(default)]
    pub min_stock: i64,
    #[serde(default)]
    pub max_stock: i64,
}

impl Consumable {
    pub fn is_out_of_stock(&self) -> bool {
        self.quantity <= 0
    }

    pub fn is_low_stock(&self) -> bool {
        self.quantity > 0 && self.quantity <= self.min_stock
    }
}

/// Request body for registering a consumable.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateConsumableRequest {
    pub consumable_id: String,
    pub name: String,
    #[serde(default)]
    pub quantity: i64,
    #[serde(default)]
    pub min_stock: i64,
    #[serde(default)]
    pub max_stock: i64,
}
