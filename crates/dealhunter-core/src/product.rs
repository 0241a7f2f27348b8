//! Request/response records shared by the engine, the HTTP service and the CLI.
//!
//! Every record here is created and discarded within a single request; none
//! of them is cached or persisted by the engine.

use std::str::FromStr;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Store name reported when no retailer profile matches.
pub const OTHER_STORE: &str = "Other";

/// Title the DOM extractor sometimes recovers from landmark regions instead of
/// the product heading.
const GENERIC_TITLE: &str = "Main content";

/// Titles shorter than this many characters are treated as missing.
const MIN_TITLE_CHARS: usize = 5;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Availability {
    #[default]
    #[serde(rename = "In Stock")]
    InStock,
    #[serde(rename = "Out of Stock")]
    OutOfStock,
}

impl Availability {
    /// Classifies availability copy. Only explicit "out of stock" or
    /// "unavailable" phrasing flips the default.
    #[must_use]
    pub fn from_text(text: &str) -> Self {
        let lower = text.to_lowercase();
        if lower.contains("out of stock") || lower.contains("unavailable") {
            Self::OutOfStock
        } else {
            Self::InStock
        }
    }
}

impl std::fmt::Display for Availability {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Availability::InStock => write!(f, "In Stock"),
            Availability::OutOfStock => write!(f, "Out of Stock"),
        }
    }
}

/// Normalized product record recovered from one page.
///
/// Missing signals are `None`/empty rather than errors: a page without a
/// recognisable price still yields a successful result.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtractionResult {
    pub title: Option<String>,
    /// Decimal string without currency symbol or thousands separators, e.g. `"1299.00"`.
    pub price: Option<String>,
    pub availability: Availability,
    pub image: Option<String>,
    /// Up to 10 deduplicated image URLs, largest rendered area first.
    pub all_images: Vec<String>,
    pub description: String,
    /// Store the page belongs to, when known.
    pub retailer: Option<String>,
}

impl ExtractionResult {
    /// `false` when the title is missing, the generic landmark label, or too
    /// short to identify a product. Callers route such results to the
    /// model-assisted analyzer.
    #[must_use]
    pub fn has_usable_title(&self) -> bool {
        self.title.as_deref().map(str::trim).is_some_and(|t| {
            !t.is_empty() && t != GENERIC_TITLE && t.chars().count() >= MIN_TITLE_CHARS
        })
    }

    /// Flattens the recovered fields into the plain-text digest handed to the
    /// analyzer when heuristics come up short.
    #[must_use]
    pub fn analysis_text(&self) -> String {
        let price_line = format!("Price: {}", self.price.as_deref().unwrap_or("Not found"));
        let availability_line = format!("Availability: {}", self.availability);
        [
            self.title.clone().unwrap_or_default(),
            price_line,
            availability_line,
            self.description.clone(),
        ]
        .into_iter()
        .filter(|part| !part.trim().is_empty())
        .collect::<Vec<_>>()
        .join("\n\n")
    }
}

/// `extractProduct` response body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductDetails {
    pub name: Option<String>,
    pub price: Option<String>,
    pub store: String,
    pub availability: Availability,
    pub image_url: Option<String>,
}

impl From<&ExtractionResult> for ProductDetails {
    fn from(result: &ExtractionResult) -> Self {
        Self {
            name: result.title.clone(),
            price: result.price.clone(),
            store: result
                .retailer
                .clone()
                .unwrap_or_else(|| OTHER_STORE.to_string()),
            availability: result.availability,
            image_url: result.image.clone(),
        }
    }
}

/// `checkPrice` response body: the re-extracted details plus the deal flag.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PriceCheck {
    #[serde(flatten)]
    pub details: ProductDetails,
    pub deal_found: bool,
}

impl PriceCheck {
    /// A deal is found only when both prices parse and the new one is
    /// strictly lower than the prior one.
    #[must_use]
    pub fn compare(details: ProductDetails, prior_price: Option<&str>) -> Self {
        let new_price = details.price.as_deref().and_then(parse_price_text);
        let old_price = prior_price.and_then(parse_price_text);
        let deal_found = matches!((new_price, old_price), (Some(new), Some(old)) if new < old);
        Self {
            details,
            deal_found,
        }
    }
}

/// Parses a caller- or page-supplied price such as `"24.99"`, `"$24.99"` or
/// `"1,299.00"`.
#[must_use]
pub fn parse_price_text(raw: &str) -> Option<Decimal> {
    let cleaned: String = raw
        .trim()
        .trim_start_matches('$')
        .chars()
        .filter(|c| *c != ',')
        .collect();
    Decimal::from_str(cleaned.trim()).ok()
}

/// `getAlternativeImages` response body.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageSet {
    pub images: Vec<String>,
}

/// One matched listing from a competing retailer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchResult {
    pub retailer: String,
    pub url: String,
    pub title: String,
    /// Effective price: the sale price when one was detected.
    pub price: Option<String>,
    pub sale_price: Option<String>,
    /// Struck-through "was" price accompanying `sale_price`.
    pub original_price: Option<String>,
    pub description: String,
    pub is_original: bool,
}

/// `searchProduct` response body.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchResults {
    pub results: Vec<SearchResult>,
}
