//! Topping pricing
//!
//! Two rules run per order line, toppings in stored order:
//!
//! 1. Free allowance: `included_toppings_count`, or 4 for legacy choice
//!    products. Only paid toppings (`base_price > 0`) consume it.
//! 2. Size scaling for every paid topping left over: family size doubles
//!    the base price, large size turns a 1.00 topping into 2.00.
//!
//! Resolution reads only `base_price`, so running it again on a resolved
//! line changes nothing.

use rust_decimal::prelude::*;
use shared::{OrderItem, OrderLine, Receipt, ToppingLine};

use super::money::{MONEY_TOLERANCE, to_decimal, to_f64, within_tolerance};
use super::ReceiptError;
use super::size::SizeClass;

/// Free toppings on a legacy "choice" product
pub const CHOICE_PRODUCT_ALLOWANCE: u32 = 4;

/// Large-size price for a 1.00 topping
const LARGE_FIXED_PRICE: Decimal = Decimal::from_parts(200, 0, 0, false, 2);

/// Free-topping allowance of an order item
pub fn allowance(item: &OrderItem) -> u32 {
    match item.included_toppings_count {
        Some(count) => count,
        None if item.is_choice_product => CHOICE_PRODUCT_ALLOWANCE,
        None => 0,
    }
}

/// Price of a paid topping that did not fit the allowance
pub fn scaled_price(base_price: f64, size: SizeClass) -> f64 {
    let base = to_decimal(base_price).max(Decimal::ZERO);
    let price = match size {
        SizeClass::Family => base * Decimal::TWO,
        SizeClass::Large if within_tolerance(base, Decimal::ONE) => LARGE_FIXED_PRICE,
        _ => base,
    };
    to_f64(price)
}

/// Resolve toppings in place against a size and an allowance
pub fn resolve_toppings(toppings: &mut [ToppingLine], size: &str, allowance: u32) {
    let class = SizeClass::of(size);
    let mut free_used = 0;

    for topping in toppings.iter_mut() {
        let paid = topping.base_price > 0.0;
        if paid && free_used < allowance {
            free_used += 1;
            topping.is_free = true;
            topping.resolved_price = 0.0;
        } else if paid {
            topping.is_free = false;
            topping.resolved_price = scaled_price(topping.base_price, class);
        } else {
            topping.is_free = false;
            topping.resolved_price = 0.0;
        }
    }
}

/// Resolve one line using the allowance it carries
pub fn resolve_line(line: &mut OrderLine) {
    resolve_toppings(&mut line.toppings, &line.size, line.included_toppings);
}

/// quantity × (unit price + resolved toppings), in Decimal
pub fn line_total(line: &OrderLine) -> Decimal {
    let toppings: Decimal = line
        .toppings
        .iter()
        .map(|t| to_decimal(t.resolved_price))
        .sum();
    Decimal::from(line.quantity) * (to_decimal(line.unit_price) + toppings)
}

/// Subtotal and total
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Totals {
    pub subtotal: f64,
    pub total: f64,
}

pub fn compute_totals(lines: &[OrderLine], delivery_fee: f64, discount: f64) -> Totals {
    let subtotal: Decimal = lines.iter().map(line_total).sum();
    let total = subtotal + to_decimal(delivery_fee) - to_decimal(discount);
    Totals {
        subtotal: to_f64(subtotal),
        total: to_f64(total),
    }
}

/// Resolve every line and recompute the totals
pub fn resolve_receipt(receipt: &mut Receipt) {
    for line in &mut receipt.items {
        resolve_line(line);
    }
    let totals = compute_totals(&receipt.items, receipt.delivery_fee, receipt.discount);
    receipt.subtotal = totals.subtotal;
    receipt.total = totals.total;
}

/// Check the receipt invariants before anything is printed
pub fn validate(receipt: &Receipt) -> Result<(), ReceiptError> {
    for line in &receipt.items {
        if line.quantity == 0 {
            return Err(ReceiptError::InvalidQuantity(line.display_name.clone()));
        }
        if !line.unit_price.is_finite() || line.unit_price < 0.0 {
            return Err(ReceiptError::NegativePrice(line.display_name.clone()));
        }
        if let Some(topping) = line
            .toppings
            .iter()
            .find(|t| !t.resolved_price.is_finite() || t.resolved_price < 0.0)
        {
            return Err(ReceiptError::NegativePrice(format!(
                "{} / {}",
                line.display_name, topping.name
            )));
        }
    }

    let expected: Decimal = receipt.items.iter().map(line_total).sum::<Decimal>()
        + to_decimal(receipt.delivery_fee)
        - to_decimal(receipt.discount);
    let actual = to_decimal(receipt.total);
    if (expected - actual).abs() > MONEY_TOLERANCE {
        return Err(ReceiptError::TotalMismatch {
            expected: expected.to_f64().unwrap_or_default(),
            actual: receipt.total,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn toppings(prices: &[(&str, f64)]) -> Vec<ToppingLine> {
        prices
            .iter()
            .map(|(name, price)| ToppingLine::new(*name, *price))
            .collect()
    }

    #[test]
    fn test_free_toppings_skip_zero_priced() {
        // paid A, free B, paid C, paid D with two included
        let mut list = toppings(&[("A", 1.5), ("B", 0.0), ("C", 1.0), ("D", 1.2)]);
        resolve_toppings(&mut list, "normal", 2);

        assert!(list[0].is_free);
        assert_eq!(list[0].resolved_price, 0.0);
        assert!(!list[1].is_free);
        assert_eq!(list[1].resolved_price, 0.0);
        assert!(list[2].is_free);
        assert!(!list[3].is_free);
        assert_eq!(list[3].resolved_price, 1.2);
    }

    #[test]
    fn test_size_scaling() {
        assert_eq!(scaled_price(1.0, SizeClass::Large), 2.0);
        assert_eq!(scaled_price(1.005, SizeClass::Large), 2.0);
        assert_eq!(scaled_price(1.5, SizeClass::Large), 1.5);
        assert_eq!(scaled_price(1.0, SizeClass::Family), 2.0);
        assert_eq!(scaled_price(2.5, SizeClass::Family), 5.0);
        assert_eq!(scaled_price(2.5, SizeClass::Normal), 2.5);
    }

    #[test]
    fn test_overflow_toppings_scale_with_size() {
        let mut list = toppings(&[("Kinkku", 1.0), ("Ananas", 1.0), ("Salami", 2.5)]);
        resolve_toppings(&mut list, "perhe", 2);
        assert_eq!(list[2].resolved_price, 5.0);
        assert!(!list[2].is_free);
    }

    #[test]
    fn test_resolution_is_idempotent() {
        let mut list = toppings(&[("A", 1.0), ("B", 0.0), ("C", 1.0), ("D", 2.5)]);
        resolve_toppings(&mut list, "family", 1);
        let once = list.clone();
        resolve_toppings(&mut list, "family", 1);
        assert_eq!(list, once);
    }

    #[test]
    fn test_allowance_sources() {
        let mut item = OrderItem {
            name: "Valinta".into(),
            quantity: 1,
            unit_price: 11.9,
            toppings: vec![],
            notes: None,
            included_toppings_count: None,
            is_choice_product: true,
        };
        assert_eq!(allowance(&item), CHOICE_PRODUCT_ALLOWANCE);
        item.included_toppings_count = Some(2);
        assert_eq!(allowance(&item), 2);
        item.included_toppings_count = None;
        item.is_choice_product = false;
        assert_eq!(allowance(&item), 0);
    }

    #[test]
    fn test_validate_catches_total_mismatch() {
        let mut receipt = Receipt {
            order_number: "7".into(),
            timestamp: chrono::Utc::now(),
            customer: Default::default(),
            order_type: Default::default(),
            payment_method: "cash".into(),
            items: vec![OrderLine {
                display_name: "Kebab".into(),
                size: "normal".into(),
                quantity: 3,
                unit_price: 0.1,
                toppings: vec![],
                notes: None,
                included_toppings: 0,
            }],
            subtotal: 0.0,
            delivery_fee: 0.0,
            discount: 0.0,
            total: 0.0,
            special_instructions: None,
        };
        assert!(matches!(validate(&receipt), Err(ReceiptError::TotalMismatch { .. })));

        resolve_receipt(&mut receipt);
        assert_eq!(receipt.total, 0.3);
        assert!(validate(&receipt).is_ok());
    }
}
