//! Price parsing and candidate validation.

use std::str::FromStr;
use std::sync::LazyLock;

use dealhunter_core::PriceBounds;
use regex::Regex;
use rust_decimal::Decimal;
use scraper::ElementRef;

use crate::page::element_text;
use crate::shipping::{is_shipping_price, PriceContext};

static NUMBER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\d[\d,]*(?:\.\d+)?").expect("valid number regex"));

static DOLLAR_AMOUNT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\$\s*(\d[\d,]*(?:\.\d+)?)").expect("valid dollar-amount regex")
});

/// Strips thousands separators and parses. Returns the normalized string
/// alongside the value so callers can report exactly what was matched.
fn normalize(matched: &str) -> Option<(String, Decimal)> {
    let normalized: String = matched.chars().filter(|c| *c != ',').collect();
    let value = Decimal::from_str(&normalized).ok()?;
    Some((normalized, value))
}

/// First numeric substring of `text`, e.g. `"Now $1,299.00"` → `("1299.00", 1299.00)`.
#[must_use]
pub fn first_number(text: &str) -> Option<(String, Decimal)> {
    NUMBER.find(text).and_then(|m| normalize(m.as_str()))
}

/// First `$`-prefixed amount in `text`, if any.
#[must_use]
pub fn first_dollar_amount(text: &str) -> Option<(String, Decimal)> {
    DOLLAR_AMOUNT
        .captures(text)
        .and_then(|caps| caps.get(1))
        .and_then(|m| normalize(m.as_str()))
}

#[must_use]
pub fn has_dollar_amount(text: &str) -> bool {
    DOLLAR_AMOUNT.is_match(text)
}

/// A price-like string found on a page, with the surroundings needed to
/// judge it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PriceCandidate {
    pub raw_text: String,
    /// Decimal string without symbol or separators.
    pub normalized: String,
    pub value: Decimal,
    pub context: PriceContext,
}

impl PriceCandidate {
    /// Builds a candidate from an element. A `content` attribute (as on
    /// `itemprop="price"` meta tags) wins over the element text.
    #[must_use]
    pub fn from_element(el: ElementRef<'_>) -> Option<Self> {
        let raw_text = el
            .value()
            .attr("content")
            .map(str::trim)
            .filter(|c| !c.is_empty())
            .map_or_else(|| element_text(el), str::to_string);
        let (normalized, value) = first_number(&raw_text)?;
        Some(Self {
            raw_text,
            normalized,
            value,
            context: PriceContext::of(el),
        })
    }

    /// Like [`Self::from_element`], but reads the first `$` amount when the
    /// text has one. Used for loosely scoped scans where the element text
    /// may include unrelated numbers before the price.
    #[must_use]
    pub fn from_element_preferring_dollars(el: ElementRef<'_>) -> Option<Self> {
        let mut candidate = Self::from_element(el)?;
        if let Some((normalized, value)) = first_dollar_amount(&candidate.raw_text) {
            candidate.normalized = normalized;
            candidate.value = value;
        }
        Some(candidate)
    }

    #[must_use]
    pub fn is_shipping_noise(&self) -> bool {
        is_shipping_price(&self.raw_text, &self.context)
    }

    /// Inside `bounds` and not shipping noise.
    #[must_use]
    pub fn is_acceptable(&self, bounds: PriceBounds) -> bool {
        bounds.contains(self.value) && !self.is_shipping_noise()
    }
}

#[cfg(test)]
mod tests {
    use scraper::{Html, Selector};

    use super::*;

    fn element<'a>(doc: &'a Html, css: &str) -> ElementRef<'a> {
        doc.select(&Selector::parse(css).unwrap()).next().unwrap()
    }

    #[test]
    fn first_number_strips_separators() {
        assert_eq!(
            first_number("Now $1,299.00!"),
            Some(("1299.00".to_string(), Decimal::new(129_900, 2)))
        );
        assert_eq!(first_number("$19"), Some(("19".to_string(), Decimal::new(19, 0))));
        assert!(first_number("Call for price").is_none());
    }

    #[test]
    fn dollar_amount_skips_leading_numbers() {
        assert_eq!(
            first_dollar_amount("Pack of 2 for $24.50").map(|(s, _)| s),
            Some("24.50".to_string())
        );
        assert!(first_dollar_amount("24.50").is_none());
    }

    #[test]
    fn content_attribute_takes_precedence() {
        let doc = Html::parse_document(r#"<span itemprop="price" content="18.00">$20.00</span>"#);
        let candidate = PriceCandidate::from_element(element(&doc, "span")).unwrap();
        assert_eq!(candidate.normalized, "18.00");
    }

    #[test]
    fn candidates_outside_bounds_are_rejected() {
        let doc = Html::parse_document(
            r#"<span id="low">$0.49</span><span id="high">$50,000.01</span><span id="edge">$50,000.00</span>"#,
        );
        let bounds = PriceBounds::default();
        let low = PriceCandidate::from_element(element(&doc, "#low")).unwrap();
        let high = PriceCandidate::from_element(element(&doc, "#high")).unwrap();
        let edge = PriceCandidate::from_element(element(&doc, "#edge")).unwrap();
        assert!(!low.is_acceptable(bounds));
        assert!(!high.is_acceptable(bounds));
        assert!(edge.is_acceptable(bounds));
    }

    #[test]
    fn preferring_dollars_reads_the_price_not_the_quantity() {
        let doc = Html::parse_document(r#"<div id="offer">Set of 4 for $12.00</div>"#);
        let loose = PriceCandidate::from_element(element(&doc, "#offer")).unwrap();
        let preferred = PriceCandidate::from_element_preferring_dollars(element(&doc, "#offer")).unwrap();
        assert_eq!(loose.normalized, "4");
        assert_eq!(preferred.normalized, "12.00");
    }
}
