//! Receipt layout
//!
//! Renders a [`Receipt`] into a fixed-width [`PrintDocument`]. Bold and
//! underline are `**`/`__` markers here; the protocol encoder turns them
//! into printer commands later, so the same document serves as on-screen
//! preview and as encoder input.

use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use kuitti_printer::QrMethod;
use kuitti_printer::barcode::MAX_CODE39_LEN;
use kuitti_printer::document::{bold, strip_markers, underline, visible_width};
use kuitti_printer::{PrintDocument, ellipsize, text_width};
use shared::{DEFAULT_PAPER_WIDTH, OrderLine, OrderType, PrinterDevice, Receipt};

use super::ReceiptError;
use super::money::{format_eur, to_f64};
use super::pricing::{line_total, validate};
use crate::core::config::DEFAULT_TIMEZONE;

/// Marker printed instead of a price on toppings covered by the allowance
pub const FREE_LABEL: &str = "ILMAINEN";

/// Indent for toppings and notes under an item
const INDENT: &str = "   ";

/// Optional shop block at the top of the receipt
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShopHeader {
    pub name: String,
    pub address: Option<String>,
    pub phone: Option<String>,
}

/// Center `text` on a line of `width` columns
///
/// Markers do not count towards the width. Text wider than the line loses
/// its markers and is cut with an ellipsis.
pub fn center(text: &str, width: usize) -> String {
    let visible = visible_width(text);
    if visible > width {
        return ellipsize(&strip_markers(text), width);
    }
    format!("{}{}", " ".repeat((width - visible) / 2), text)
}

/// `left` flush left, `right` flush right, at least one space between
///
/// `left` is cut with an ellipsis when both do not fit.
pub fn left_right(left: &str, right: &str, width: usize) -> String {
    let right_width = text_width(right);
    if right_width == 0 {
        return ellipsize(left, width);
    }
    if right_width + 1 >= width {
        return ellipsize(right, width);
    }
    let left = ellipsize(left, width - right_width - 1);
    let gap = width - text_width(&left) - right_width;
    format!("{}{}{}", left, " ".repeat(gap), right)
}

pub fn separator(ch: char, width: usize) -> String {
    std::iter::repeat_n(ch, width).collect()
}

/// Greedy word wrap; words longer than a line are split
pub fn wrap(text: &str, width: usize) -> Vec<String> {
    let width = width.max(1);
    let mut lines = Vec::new();
    let mut current = String::new();

    for word in text.split_whitespace() {
        let mut word: Vec<char> = word.chars().collect();
        while word.len() > width {
            if !current.is_empty() {
                lines.push(std::mem::take(&mut current));
            }
            lines.push(word.drain(..width).collect());
        }
        let word: String = word.into_iter().collect();
        if word.is_empty() {
            continue;
        }

        let needed = if current.is_empty() {
            text_width(&word)
        } else {
            text_width(&current) + 1 + text_width(&word)
        };
        if needed > width {
            lines.push(std::mem::take(&mut current));
        }
        if !current.is_empty() {
            current.push(' ');
        }
        current.push_str(&word);
    }
    if !current.is_empty() {
        lines.push(current);
    }
    lines
}

fn order_type_label(order_type: OrderType) -> &'static str {
    match order_type {
        OrderType::Delivery => "Toimitus",
        OrderType::Pickup => "Nouto",
    }
}

fn payment_label(method: &str) -> String {
    match method.trim().to_lowercase().as_str() {
        "card" | "kortti" => "Kortti".to_string(),
        "cash" | "käteinen" => "Käteinen".to_string(),
        "online" | "verkkomaksu" => "Verkkomaksu".to_string(),
        "" => "-".to_string(),
        _ => method.trim().to_string(),
    }
}

/// Order numbers short and plain enough for a Code39 tag
fn barcode_friendly(order_number: &str) -> bool {
    !order_number.is_empty()
        && order_number.len() <= MAX_CODE39_LEN
        && order_number
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-')
}

/// Receipt renderer
///
/// Common widths:
/// - 58mm paper: 32 characters
/// - 80mm paper: 48 characters
#[derive(Debug, Clone)]
pub struct ReceiptRenderer {
    width: usize,
    timezone: Tz,
    header: Option<ShopHeader>,
}

impl ReceiptRenderer {
    pub fn new(width: usize, timezone: Tz) -> Self {
        Self {
            width,
            timezone,
            header: None,
        }
    }

    pub fn with_header(mut self, header: Option<ShopHeader>) -> Self {
        self.header = header;
        self
    }

    /// Same renderer for another paper width
    pub fn with_width(&self, width: usize) -> Self {
        Self {
            width,
            ..self.clone()
        }
    }

    pub fn width(&self) -> usize {
        self.width
    }

    fn timestamp(&self, at: DateTime<Utc>) -> String {
        at.with_timezone(&self.timezone)
            .format("%d.%m.%Y %H:%M")
            .to_string()
    }

    /// Render a receipt; malformed receipts are rejected before layout
    pub fn render(&self, receipt: &Receipt) -> Result<PrintDocument, ReceiptError> {
        validate(receipt)?;

        let mut doc = PrintDocument::new(self.width);
        self.render_header(&mut doc, receipt);
        self.render_customer(&mut doc, receipt);
        for line in &receipt.items {
            self.render_item(&mut doc, line);
        }
        self.render_totals(&mut doc, receipt);
        self.render_footer(&mut doc, receipt);
        Ok(doc)
    }

    fn render_header(&self, doc: &mut PrintDocument, receipt: &Receipt) {
        let w = self.width;
        if let Some(shop) = &self.header {
            doc.text(center(&bold(&shop.name), w));
            if let Some(address) = &shop.address {
                doc.text(center(address, w));
            }
            if let Some(phone) = &shop.phone {
                doc.text(center(&format!("Puh. {}", phone), w));
            }
            doc.text(separator('=', w));
        }

        doc.text(center(&bold(&format!("TILAUS #{}", receipt.order_number)), w));
        doc.text(left_right(
            order_type_label(receipt.order_type),
            &self.timestamp(receipt.timestamp),
            w,
        ));
        doc.text(separator('-', w));
    }

    fn render_customer(&self, doc: &mut PrintDocument, receipt: &Receipt) {
        let w = self.width;
        let customer = &receipt.customer;
        let mut any = false;

        if !customer.name.trim().is_empty() {
            doc.text(ellipsize(&format!("Asiakas: {}", customer.name.trim()), w));
            any = true;
        }
        if let Some(phone) = customer.phone.as_deref().filter(|p| !p.trim().is_empty()) {
            doc.text(ellipsize(&format!("Puh: {}", phone.trim()), w));
            any = true;
        }
        if receipt.order_type == OrderType::Delivery
            && let Some(address) = customer
                .delivery_address
                .as_deref()
                .filter(|a| !a.trim().is_empty())
        {
            for line in wrap(&format!("Osoite: {}", address.trim()), w) {
                doc.text(line);
            }
            any = true;
        }
        if any {
            doc.text(separator('-', w));
        }
    }

    fn render_item(&self, doc: &mut PrintDocument, line: &OrderLine) {
        let w = self.width;
        let name = if line.is_normal_size() {
            line.display_name.clone()
        } else {
            format!("{} ({})", line.display_name, line.size)
        };
        doc.text(left_right(
            &format!("{}x {}", line.quantity, name),
            &format_eur(to_f64(line_total(line))),
            w,
        ));

        for topping in &line.toppings {
            let label = format!("{}+ {}", INDENT, topping.name);
            let price = if topping.is_free {
                FREE_LABEL.to_string()
            } else if topping.resolved_price > 0.0 {
                format_eur(topping.resolved_price)
            } else {
                String::new()
            };
            doc.text(left_right(&label, &price, w));
        }

        if let Some(notes) = line.notes.as_deref().filter(|n| !n.trim().is_empty()) {
            for note in wrap(&format!("Huom: {}", notes.trim()), w.saturating_sub(INDENT.len())) {
                doc.text(format!("{}{}", INDENT, note));
            }
        }
    }

    fn render_totals(&self, doc: &mut PrintDocument, receipt: &Receipt) {
        let w = self.width;
        doc.text(separator('-', w));
        doc.text(left_right("Välisumma", &format_eur(receipt.subtotal), w));
        if receipt.order_type == OrderType::Delivery || receipt.delivery_fee > 0.0 {
            doc.text(left_right("Toimitusmaksu", &format_eur(receipt.delivery_fee), w));
        }
        if receipt.discount > 0.0 {
            doc.text(left_right("Alennus", &format_eur(-receipt.discount), w));
        }
        doc.text(separator('=', w));
        doc.text(bold(&left_right("YHTEENSÄ", &format_eur(receipt.total), w)));
        doc.text(separator('=', w));
        doc.text(left_right("Maksutapa", &payment_label(&receipt.payment_method), w));

        if let Some(instructions) = receipt
            .special_instructions
            .as_deref()
            .filter(|s| !s.trim().is_empty())
        {
            doc.text(String::new());
            doc.text(underline("Lisätiedot"));
            for line in wrap(instructions, w) {
                doc.text(line);
            }
        }
    }

    fn render_footer(&self, doc: &mut PrintDocument, receipt: &Receipt) {
        doc.feed(1);
        if barcode_friendly(&receipt.order_number) {
            doc.barcode(receipt.order_number.clone());
        }
        doc.text(center("Kiitos tilauksestasi!", self.width));
        doc.feed(2);
    }

    /// Self-test page: identity, ruler and character set
    pub fn test_page(&self, device: &PrinterDevice) -> PrintDocument {
        let w = device.capabilities.paper_width;
        let mut doc = PrintDocument::new(w);

        doc.text(center(&bold("TESTITULOSTE"), w));
        doc.text(separator('=', w));
        doc.text(left_right("Tulostin", &device.name, w));
        doc.text(left_right("Yhteys", device.transport_kind.as_str(), w));
        doc.text(left_right("Tyyppi", device.printer_family.as_str(), w));
        doc.text(left_right("Osoite", &device.address, w));
        doc.text(left_right("Leveys", &format!("{} merkkiä", w), w));
        doc.text(separator('-', w));
        doc.text(
            (1..=w)
                .map(|i| char::from_digit((i % 10) as u32, 10).unwrap_or('?'))
                .collect::<String>(),
        );
        doc.text("ÄÖÅ äöå € 12,50 €");
        doc.text(format!("{} {}", bold("Lihavoitu"), underline("Alleviivattu")));
        doc.feed(2);
        doc
    }

    /// One labelled QR section; the caller encodes it with `method`
    pub fn qr_calibration_section(&self, method: QrMethod, width: usize) -> PrintDocument {
        let mut doc = PrintDocument::new(width);
        doc.cut = false;
        doc.text(center(&bold(&format!("QR: {}", method)), width));
        doc.qr(format!("KUITTI-QR-{}", method.as_str().to_uppercase()));
        doc.text(center("Näkyykö koodi? Valitse tämä tapa.", width));
        doc.text(separator('-', width));
        doc
    }
}

impl Default for ReceiptRenderer {
    fn default() -> Self {
        Self::new(DEFAULT_PAPER_WIDTH, DEFAULT_TIMEZONE)
    }
}
