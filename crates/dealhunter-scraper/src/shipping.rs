//! Shipping-noise filter.
//!
//! Product pages routinely show shipping fees and free-shipping thresholds
//! next to the real price. The filter is deliberately narrow: a candidate is
//! rejected only when its surroundings are unmistakably about shipping, so
//! genuinely cheap products are not thrown away.

use std::sync::LazyLock;

use rust_decimal::Decimal;
use scraper::{ElementRef, Selector};

use crate::page::{closest, element_text};
use crate::price::first_number;

static SHIPPING_REGION: LazyLock<Selector> = LazyLock::new(|| {
    Selector::parse(r#"[class*="shipping"], [id*="shipping"], [class*="delivery"]"#)
        .expect("valid shipping-region selector")
});

static ENCLOSING_DIV: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("div").expect("valid div selector"));

static ENCLOSING_BLOCK: LazyLock<Selector> = LazyLock::new(|| {
    Selector::parse("div, section, article").expect("valid block selector")
});

const FEE_PHRASES: [&str; 3] = ["shipping fee", "shipping cost", "delivery fee"];

/// Where a price candidate sits in the page.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PriceContext {
    /// Lowercased text of the nearest enclosing `div`.
    pub enclosing_text: String,
    /// The element or one of its ancestors is a shipping/delivery region.
    pub in_shipping_region: bool,
}

impl PriceContext {
    #[must_use]
    pub fn of(el: ElementRef<'_>) -> Self {
        Self {
            enclosing_text: closest(el, &ENCLOSING_DIV)
                .map(|div| element_text(div).to_lowercase())
                .unwrap_or_default(),
            in_shipping_region: closest(el, &SHIPPING_REGION).is_some(),
        }
    }
}

/// Whether `text` is a shipping fee or threshold rather than a product price.
///
/// Flags the candidate when it sits in a shipping/delivery region AND the
/// combined text names a fee (or a free-shipping threshold), or when a value
/// under $1 is explicitly paired with "shipping fee".
#[must_use]
pub fn is_shipping_price(text: &str, context: &PriceContext) -> bool {
    let combined = format!("{} {}", text.to_lowercase(), context.enclosing_text);

    let names_fee = FEE_PHRASES.iter().any(|p| combined.contains(p))
        || (combined.contains("free shipping") && combined.contains("threshold"));
    if context.in_shipping_region && names_fee {
        return true;
    }

    first_number(text).is_some_and(|(_, value)| {
        value > Decimal::ZERO && value < Decimal::ONE && combined.contains("shipping fee")
    })
}

/// Lowercased text of the nearest `div`/`section`/`article` around `el`.
#[must_use]
pub fn enclosing_block_text(el: ElementRef<'_>) -> String {
    closest(el, &ENCLOSING_BLOCK)
        .map(|block| element_text(block).to_lowercase())
        .unwrap_or_default()
}

/// Last-resort scan filter: a block mentioning shipping fees or costs with no
/// product or price wording is treated as a shipping section.
#[must_use]
pub fn is_shipping_block(block_text: &str) -> bool {
    let lower = block_text.to_lowercase();
    (lower.contains("shipping fee") || lower.contains("shipping cost"))
        && !lower.contains("product")
        && !lower.contains("price")
}
