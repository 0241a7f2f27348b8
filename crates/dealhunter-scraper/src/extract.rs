//! DOM field extractor: the heuristic ladders that turn a rendered product
//! page into an [`ExtractionResult`].
//!
//! Every step is best-effort. A missing title, price or image leaves the
//! field empty; nothing here fails.

use std::collections::HashSet;
use std::sync::LazyLock;

use dealhunter_core::{Availability, ExtractionResult, PriceBounds, RetailerRegistry};
use regex::Regex;
use scraper::{ElementRef, Html};

use crate::heuristics::{first_element, first_match};
use crate::page::{attr_lower, element_text, ImageInfo, RenderedPage};
use crate::price::{has_dollar_amount, PriceCandidate};
use crate::shipping::{enclosing_block_text, is_shipping_block};

pub(crate) const AVAILABILITY_SELECTORS: [&str; 5] = [
    "#availability span",
    "#availability",
    "[data-automation-id=\"availability\"]",
    ".a-color-success",
    ".stock-status",
];

pub(crate) const MAIN_IMAGE_SELECTORS: [&str; 5] = [
    "#landingImage",
    "#imgBlkFront",
    "#main-image",
    ".a-dynamic-image",
    "img[data-a-image-name=\"landingImage\"]",
];

pub(crate) const DESCRIPTION_SELECTORS: [&str; 4] = [
    "#feature-bullets",
    "#productDescription",
    ".product-description",
    "[data-automation-id=\"product-description\"]",
];

/// Price-bearing attribute patterns searched inside the main content area.
const CONTENT_PRICE_PATTERNS: [&str; 4] = [
    "[class*=\"price\"]",
    "[id*=\"price\"]",
    "[data-testid*=\"price\"]",
    "[itemprop=\"price\"]",
];

const LAST_RESORT_SCAN_LIMIT: usize = 15;
const MAX_IMAGES: usize = 10;
const MIN_IMAGE_EDGE: f64 = 100.0;
const DESCRIPTION_LIMIT: usize = 5_000;
const BODY_TEXT_LIMIT: usize = 10_000;

static CENTS_AMOUNT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\d+\.\d{2}").expect("valid cents regex"));

/// Runs every ladder over one rendered page.
#[must_use]
pub fn extract_fields(
    page: &RenderedPage,
    registry: &RetailerRegistry,
    bounds: PriceBounds,
) -> ExtractionResult {
    let document = Html::parse_document(&page.html);
    let root = document.root_element();
    let profile = page
        .host()
        .and_then(|host| registry.profile_for_host(&host));

    let title = first_match(
        root,
        registry.title_ladder(profile).as_slice(),
        non_empty_text,
    );

    let price = first_match(root, registry.price_ladder(profile), |el| {
        PriceCandidate::from_element(el).filter(|c| c.is_acceptable(bounds))
    })
    .or_else(|| {
        let container = first_element(root, registry.main_content_ladder(profile))?;
        main_content_price(container, bounds)
    })
    .map(|candidate| candidate.normalized);

    let availability = first_element(root, &AVAILABILITY_SELECTORS)
        .map(|el| Availability::from_text(&element_text(el)))
        .unwrap_or_default();

    let all_images = ranked_images(page.image_infos(&document));
    let image = first_match(root, &MAIN_IMAGE_SELECTORS, |el| {
        el.value().attr("src").and_then(|src| page.absolutize(src))
    })
    .or_else(|| all_images.first().cloned());

    let description = first_match(root, &DESCRIPTION_SELECTORS, non_empty_text).map_or_else(
        || truncate_chars(&page.visible_text(&document), BODY_TEXT_LIMIT),
        |text| truncate_chars(&text, DESCRIPTION_LIMIT),
    );

    let result = ExtractionResult {
        title,
        price,
        availability,
        image,
        all_images,
        description,
        retailer: profile.map(|p| p.name.clone()),
    };

    tracing::info!(
        url = %page.url,
        retailer = result.retailer.as_deref().unwrap_or("generic"),
        title_found = result.title.is_some(),
        price = result.price.as_deref().unwrap_or("not found"),
        images = result.all_images.len(),
        "DOM extraction finished"
    );
    if result.price.is_none() {
        tracing::warn!(url = %page.url, "price not found; page structure may need a new selector");
    }
    result
}

pub(crate) fn non_empty_text(el: ElementRef<'_>) -> Option<String> {
    Some(element_text(el)).filter(|t| !t.is_empty())
}

/// Price fallback scoped to the main product area: attribute patterns
/// first, then a bounded scan of any element that looks like a price.
fn main_content_price(container: ElementRef<'_>, bounds: PriceBounds) -> Option<PriceCandidate> {
    first_match(container, &CONTENT_PRICE_PATTERNS, |el| {
        PriceCandidate::from_element_preferring_dollars(el).filter(|c| c.is_acceptable(bounds))
    })
    .or_else(|| {
        container
            .descendants()
            .skip(1)
            .filter_map(ElementRef::wrap)
            .filter(|el| looks_like_price(*el))
            .take(LAST_RESORT_SCAN_LIMIT)
            .filter(|el| !is_shipping_block(&enclosing_block_text(*el)))
            .filter_map(PriceCandidate::from_element_preferring_dollars)
            .find(|c| bounds.contains(c.value))
    })
}

fn looks_like_price(el: ElementRef<'_>) -> bool {
    let text = element_text(el);
    if has_dollar_amount(&text) {
        return true;
    }
    CENTS_AMOUNT.is_match(&text)
        && ["class", "id", "data-testid"]
            .iter()
            .any(|attr| attr_lower(el, attr).contains("price"))
}

/// Drops sprites, logos, icons and thumbnails, then orders by rendered area,
/// largest first, deduplicated and capped.
pub(crate) fn ranked_images(mut images: Vec<ImageInfo>) -> Vec<String> {
    images.retain(|img| {
        let src = img.src.to_lowercase();
        let alt = img.alt.to_lowercase();
        img.width > MIN_IMAGE_EDGE
            && img.height > MIN_IMAGE_EDGE
            && !src.is_empty()
            && !["sprite", "logo", "icon"].iter().any(|t| src.contains(t))
            && !["logo", "icon"].iter().any(|t| alt.contains(t))
    });
    images.sort_by(|a, b| b.area().total_cmp(&a.area()));

    let mut seen = HashSet::new();
    images
        .into_iter()
        .map(|img| img.src)
        .filter(|src| seen.insert(src.clone()))
        .take(MAX_IMAGES)
        .collect()
}

pub(crate) fn truncate_chars(text: &str, limit: usize) -> String {
    text.trim().chars().take(limit).collect()
}

#[cfg(test)]
#[path = "extract_test.rs"]
mod tests;
