use serde::Serialize;
use utoipa::ToSchema;

use crate::models::Product;

pub const DEFAULT_MESSAGE: &str = "Hello! I'm interested in your products.";

/// Builds `wa.me` chat links pre-filled with an order message. Opening the
/// link is the whole checkout; nothing waits for a reply.
#[derive(Debug, Clone)]
pub struct OrderLink {
    phone: String,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ProductOrderLink {
    pub product_id: String,
    pub quantity: u32,
    pub unit_price: f64,
    pub total: f64,
    pub message: String,
    pub url: String,
}

/// Percent-encodes like a browser's `encodeURIComponent`, which leaves
/// `!'()*` as they are.
fn encode_component(text: &str) -> String {
    [("%21", "!"), ("%27", "'"), ("%28", "("), ("%29", ")"), ("%2A", "*")]
        .iter()
        .fold(urlencoding::encode(text).into_owned(), |encoded, (from, to)| {
            encoded.replace(from, to)
        })
}

impl OrderLink {
    pub fn new(phone: &str) -> Self {
        Self {
            phone: phone.chars().filter(char::is_ascii_digit).collect(),
        }
    }

    pub fn phone(&self) -> &str {
        &self.phone
    }

    pub fn url(&self, message: &str) -> String {
        format!(
            "https://wa.me/{}?text={}",
            self.phone,
            encode_component(message)
        )
    }

    pub fn contact_url(&self) -> String {
        self.url(DEFAULT_MESSAGE)
    }

    pub fn for_product(&self, product: &Product, quantity: u32) -> ProductOrderLink {
        let total = product.price * f64::from(quantity);
        let message = order_message(&product.name, product.price, quantity);
        ProductOrderLink {
            product_id: product.id.clone(),
            quantity,
            unit_price: product.price,
            total,
            url: self.url(&message),
            message,
        }
    }
}

pub fn order_message(name: &str, unit_price: f64, quantity: u32) -> String {
    format!(
        "Hi! I'm interested in ordering {}x {} (KSh {} each). Total: KSh {}",
        quantity,
        name,
        format_amount(unit_price),
        format_amount(unit_price * f64::from(quantity))
    )
}

/// Thousands-grouped amount, at most two decimals, trailing zeros dropped.
pub fn format_amount(amount: f64) -> String {
    let cents = (amount.abs() * 100.0).round() as u64;
    let whole = (cents / 100).to_string();
    let fraction = cents % 100;

    let mut grouped = String::with_capacity(whole.len() + whole.len() / 3);
    for (idx, digit) in whole.chars().enumerate() {
        if idx > 0 && (whole.len() - idx) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(digit);
    }
    if fraction > 0 {
        let decimals = format!("{fraction:02}");
        grouped.push('.');
        grouped.push_str(decimals.trim_end_matches('0'));
    }
    if amount < 0.0 && cents > 0 {
        grouped.insert(0, '-');
    }
    grouped
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn groups_thousands() {
        assert_eq!(format_amount(0.0), "0");
        assert_eq!(format_amount(950.0), "950");
        assert_eq!(format_amount(2500.0), "2,500");
        assert_eq!(format_amount(1234567.0), "1,234,567");
        assert_eq!(format_amount(1999.5), "1,999.5");
        assert_eq!(format_amount(12.05), "12.05");
    }

    #[test]
    fn message_interpolates_quantity_and_total() {
        assert_eq!(
            order_message("Luxury Hair Serum", 2500.0, 3),
            "Hi! I'm interested in ordering 3x Luxury Hair Serum (KSh 2,500 each). Total: KSh 7,500"
        );
    }

    #[test]
    fn link_keeps_digits_and_encodes_text() {
        let link = OrderLink::new("+254 722 240558");
        assert_eq!(link.phone(), "254722240558");
        assert_eq!(
            link.contact_url(),
            "https://wa.me/254722240558?text=Hello!%20I'm%20interested%20in%20your%20products."
        );
    }

    #[test]
    fn browser_safe_marks_stay_unescaped() {
        assert_eq!(
            encode_component("2x Oud (50ml) * gift & wrap 100%"),
            "2x%20Oud%20(50ml)%20*%20gift%20%26%20wrap%20100%25"
        );
    }
}
