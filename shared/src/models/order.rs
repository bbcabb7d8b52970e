//! Order Model
//!
//! Input aggregate handed over by the ordering system. Sizes arrive encoded in
//! the item name (`"Bolognese (perhe)"`, `"perhe Bolognese"`) or in the notes
//! (`"Size: large"`); the receipt builder recovers them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::receipt::{Customer, OrderType};

/// Topping selected on an order item
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderTopping {
    pub name: String,
    /// Catalog price in currency unit
    #[serde(default)]
    pub price: f64,
}

/// Order item as stored by the ordering system
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderItem {
    pub name: String,
    pub quantity: u32,
    /// Price in currency unit for the ordered size
    pub unit_price: f64,
    #[serde(default)]
    pub toppings: Vec<OrderTopping>,
    pub notes: Option<String>,
    /// Conditional pricing: number of paid toppings included for free
    pub included_toppings_count: Option<u32>,
    /// Legacy "choice" products carry four free toppings
    #[serde(default)]
    pub is_choice_product: bool,
}

/// Order aggregate
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    pub order_number: String,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub customer: Customer,
    #[serde(default)]
    pub order_type: OrderType,
    #[serde(default)]
    pub payment_method: String,
    pub items: Vec<OrderItem>,
    #[serde(default)]
    pub delivery_fee: f64,
    #[serde(default)]
    pub discount: f64,
    pub special_instructions: Option<String>,
}
