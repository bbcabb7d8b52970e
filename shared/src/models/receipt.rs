//! Receipt Model
//!
//! Immutable, printer-agnostic value produced once per print request.
//! Serialized camelCase because it travels inside CloudPRNT submissions.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Size name used when nothing else is recoverable
pub const NORMAL_SIZE: &str = "normal";

/// Delivery or pickup
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderType {
    Delivery,
    #[default]
    Pickup,
}

/// Customer contact details
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Customer {
    #[serde(default)]
    pub name: String,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub delivery_address: Option<String>,
}

/// A topping after pricing resolution
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToppingLine {
    pub name: String,
    /// Catalog price before any rule
    pub base_price: f64,
    /// Price after free allowance / size scaling, never negative
    pub resolved_price: f64,
    /// Consumed the line's free-topping allowance
    pub is_free: bool,
}

impl ToppingLine {
    /// An unresolved topping: resolved price equals base price
    pub fn new(name: impl Into<String>, base_price: f64) -> Self {
        Self {
            name: name.into(),
            base_price,
            resolved_price: base_price,
            is_free: false,
        }
    }
}

/// One ordered product
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderLine {
    pub display_name: String,
    /// "normal" or a named variant ("perhe", "large", ...)
    pub size: String,
    pub quantity: u32,
    pub unit_price: f64,
    #[serde(default)]
    pub toppings: Vec<ToppingLine>,
    pub notes: Option<String>,
    /// Free-topping allowance the line was resolved with
    #[serde(default)]
    pub included_toppings: u32,
}

impl OrderLine {
    pub fn is_normal_size(&self) -> bool {
        self.size.eq_ignore_ascii_case(NORMAL_SIZE)
    }
}

/// Formatted receipt
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Receipt {
    pub order_number: String,
    pub timestamp: DateTime<Utc>,
    pub customer: Customer,
    pub order_type: OrderType,
    pub payment_method: String,
    pub items: Vec<OrderLine>,
    pub subtotal: f64,
    pub delivery_fee: f64,
    pub discount: f64,
    pub total: f64,
    pub special_instructions: Option<String>,
}
