//! Receipt module - order to printable document
//!
//! - [`builder`] turns an [`Order`](shared::Order) into a [`Receipt`](shared::Receipt)
//! - [`size`] and [`pricing`] hold the resolution rules the builder applies
//! - [`layout`] renders a receipt into a fixed-width [`PrintDocument`](kuitti_printer::PrintDocument)
//! - [`money`] does the decimal arithmetic

pub mod builder;
pub mod layout;
pub mod money;
pub mod pricing;
pub mod size;

use kuitti_printer::PrintError;
use thiserror::Error;

pub use builder::build_receipt;
pub use layout::{ReceiptRenderer, ShopHeader};
pub use size::{SizeClass, extract_size};

/// Malformed receipt; nothing is printed
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ReceiptError {
    #[error("negative or invalid price on {0}")]
    NegativePrice(String),

    #[error("quantity must be at least 1 on {0}")]
    InvalidQuantity(String),

    #[error("totals do not add up: expected {expected:.2}, got {actual:.2}")]
    TotalMismatch { expected: f64, actual: f64 },

    #[error("order {0} has no items")]
    Empty(String),
}

impl From<ReceiptError> for PrintError {
    fn from(e: ReceiptError) -> Self {
        PrintError::ProtocolEncoding(e.to_string())
    }
}
