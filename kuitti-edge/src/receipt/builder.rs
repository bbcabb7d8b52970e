use shared::{Order, OrderItem, OrderLine, Receipt, ToppingLine};
use tracing::{debug, instrument};

use super::ReceiptError;
use super::pricing::{allowance, compute_totals, resolve_line, validate};
use super::size::extract_size;

/// Turn one order item into a resolved receipt line
pub fn build_line(item: &OrderItem) -> OrderLine {
    let extracted = extract_size(&item.name, item.notes.as_deref());
    let mut line = OrderLine {
        display_name: extracted.name,
        size: extracted.size,
        quantity: item.quantity,
        unit_price: item.unit_price,
        toppings: item
            .toppings
            .iter()
            .map(|t| ToppingLine::new(t.name.clone(), t.price))
            .collect(),
        notes: extracted.notes,
        included_toppings: allowance(item),
    };
    resolve_line(&mut line);
    line
}

/// Order -> Receipt
///
/// Size recovery never fails; an order with no items, a zero quantity or
/// a negative price is rejected.
#[instrument(skip(order), fields(order_number = %order.order_number, items = order.items.len()))]
pub fn build_receipt(order: &Order) -> Result<Receipt, ReceiptError> {
    if order.items.is_empty() {
        return Err(ReceiptError::Empty(order.order_number.clone()));
    }

    let items: Vec<OrderLine> = order.items.iter().map(build_line).collect();
    let totals = compute_totals(&items, order.delivery_fee, order.discount);

    let receipt = Receipt {
        order_number: order.order_number.clone(),
        timestamp: order.created_at,
        customer: order.customer.clone(),
        order_type: order.order_type,
        payment_method: order.payment_method.clone(),
        items,
        subtotal: totals.subtotal,
        delivery_fee: order.delivery_fee,
        discount: order.discount,
        total: totals.total,
        special_instructions: order
            .special_instructions
            .as_ref()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty()),
    };
    validate(&receipt)?;

    debug!(total = receipt.total, "Receipt built");
    Ok(receipt)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use shared::OrderTopping;

    fn item(name: &str, unit_price: f64, toppings: &[(&str, f64)]) -> OrderItem {
        OrderItem {
            name: name.into(),
            quantity: 1,
            unit_price,
            toppings: toppings
                .iter()
                .map(|(n, p)| OrderTopping {
                    name: (*n).into(),
                    price: *p,
                })
                .collect(),
            notes: None,
            included_toppings_count: None,
            is_choice_product: false,
        }
    }

    fn order(items: Vec<OrderItem>) -> Order {
        Order {
            order_number: "1042".into(),
            created_at: Utc::now(),
            customer: Default::default(),
            order_type: Default::default(),
            payment_method: "card".into(),
            items,
            delivery_fee: 0.0,
            discount: 0.0,
            special_instructions: Some("  ".into()),
        }
    }

    #[test]
    fn test_build_resolves_sizes_and_toppings() {
        let mut pizza = item(
            "Bolognese (perhe)",
            18.9,
            &[("Kinkku", 1.0), ("Juusto", 0.0), ("Ananas", 1.0), ("Salami", 1.5)],
        );
        pizza.included_toppings_count = Some(2);
        let kebab = OrderItem {
            notes: Some("Size: large".into()),
            quantity: 2,
            ..item("Kebab", 10.5, &[("Jalopeno", 1.0)])
        };

        let receipt = build_receipt(&order(vec![pizza, kebab])).unwrap();

        let pizza = &receipt.items[0];
        assert_eq!(pizza.display_name, "Bolognese");
        assert_eq!(pizza.size, "perhe");
        assert_eq!(pizza.toppings[3].resolved_price, 3.0);

        let kebab = &receipt.items[1];
        assert_eq!(kebab.size, "large");
        assert_eq!(kebab.notes, None);
        assert_eq!(kebab.toppings[0].resolved_price, 2.0);

        // 18.90 + 3.00 + 2 × (10.50 + 2.00)
        assert_eq!(receipt.subtotal, 46.9);
        assert_eq!(receipt.total, 46.9);
        assert_eq!(receipt.special_instructions, None);
    }

    #[test]
    fn test_totals_apply_fee_and_discount() {
        let mut order = order(vec![item("Margherita", 10.0, &[])]);
        order.delivery_fee = 4.9;
        order.discount = 2.0;
        let receipt = build_receipt(&order).unwrap();
        assert_eq!(receipt.subtotal, 10.0);
        assert_eq!(receipt.total, 12.9);
    }

    #[test]
    fn test_rejects_malformed_orders() {
        assert!(matches!(build_receipt(&order(vec![])), Err(ReceiptError::Empty(_))));

        let mut zero = item("Margherita", 10.0, &[]);
        zero.quantity = 0;
        assert!(matches!(
            build_receipt(&order(vec![zero])),
            Err(ReceiptError::InvalidQuantity(_))
        ));

        let negative = item("Margherita", -1.0, &[]);
        assert!(matches!(
            build_receipt(&order(vec![negative])),
            Err(ReceiptError::NegativePrice(_))
        ));
    }
}
