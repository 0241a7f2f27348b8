//! Cross-retailer search and listing matcher.
//!
//! Retailers are visited one after another on a single session. A failure
//! at one retailer is logged and skipped; it never ends the search.

use std::collections::HashSet;
use std::time::Duration;

use dealhunter_core::{
    ListingSelectors, PriceBounds, RetailerProfile, RetailerRegistry, SearchResult,
    SimilarityThreshold, MAX_SEARCH_TARGETS,
};
use percent_encoding::{utf8_percent_encode, NON_ALPHANUMERIC};
use scraper::{ElementRef, Html};

use crate::heuristics::first_match;
use crate::page::{closest, element_text, parse_selector, RenderedPage};
use crate::price::PriceCandidate;
use crate::session::{LoadSignal, Navigation, Session};

/// Result links evaluated per retailer.
const MAX_LINKS_PER_RETAILER: usize = 5;

#[derive(Debug, Clone, Copy)]
pub struct SearchSettings {
    /// Navigation budget for one retailer's search page.
    pub timeout: Duration,
    pub threshold: SimilarityThreshold,
    pub bounds: PriceBounds,
}

fn tokens(text: &str) -> impl Iterator<Item = String> + '_ {
    text.split_whitespace()
        .map(|word| word.trim_matches(|c: char| !c.is_alphanumeric()).to_lowercase())
        .filter(|word| !word.is_empty())
}

/// Fraction of the unique query words that also occur in `title`, in `[0, 1]`.
#[must_use]
pub fn similarity(query: &str, title: &str) -> f64 {
    let wanted: HashSet<String> = tokens(query).collect();
    if wanted.is_empty() {
        return 0.0;
    }
    let present: HashSet<String> = tokens(title).collect();
    let hits = wanted.iter().filter(|w| present.contains(*w)).count();
    #[allow(clippy::cast_precision_loss)]
    let score = hits as f64 / wanted.len() as f64;
    score
}

/// Active and struck prices of one result card.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
struct ListingPrices {
    price: Option<String>,
    sale_price: Option<String>,
    original_price: Option<String>,
}

impl ListingPrices {
    fn resolve(active: Option<PriceCandidate>, struck: Option<PriceCandidate>) -> Self {
        match (active, struck) {
            (Some(active), Some(struck)) if struck.value > active.value => Self {
                price: Some(active.normalized.clone()),
                sale_price: Some(active.normalized),
                original_price: Some(struck.normalized),
            },
            (Some(active), _) => Self {
                price: Some(active.normalized),
                ..Self::default()
            },
            (None, _) => Self::default(),
        }
    }
}

struct Candidate {
    title: String,
    url: String,
    score: f64,
    prices: ListingPrices,
}

/// Picks the best listing on one retailer's search-results page.
///
/// Up to five result links are scored against `query`; the highest score
/// the threshold admits wins, the earliest link breaking ties.
#[must_use]
pub fn match_listing(
    page: &RenderedPage,
    profile: &RetailerProfile,
    registry: &RetailerRegistry,
    query: &str,
    threshold: SimilarityThreshold,
    bounds: PriceBounds,
) -> Option<SearchResult> {
    let document = Html::parse_document(&page.html);
    let root = document.root_element();
    let listing = registry.listing_for(profile);
    let generic = &registry.generic().listing;

    let mut links = result_links(root, &listing.links);
    if links.is_empty() && !std::ptr::eq(listing, generic) {
        links = result_links(root, &generic.links);
    }

    let mut best: Option<Candidate> = None;
    let mut seen = HashSet::new();
    for link in links {
        let Some(url) = link.value().attr("href").and_then(|href| page.absolutize(href)) else {
            continue;
        };
        if !seen.insert(url.clone()) {
            continue;
        }
        if seen.len() > MAX_LINKS_PER_RETAILER {
            break;
        }

        let title = link_title(link);
        if title.is_empty() {
            continue;
        }
        let score = similarity(query, &title);
        tracing::debug!(retailer = %profile.name, title = %title, score, "scored listing");
        if !threshold.admits(score) || best.as_ref().is_some_and(|b| b.score >= score) {
            continue;
        }

        let card = result_card(link, listing, generic).unwrap_or(link);
        best = Some(Candidate {
            title,
            url,
            score,
            prices: card_prices(card, listing, generic, bounds),
        });
    }

    let best = best?;
    tracing::info!(
        retailer = %profile.name,
        title = %best.title,
        score = best.score,
        price = best.prices.price.as_deref().unwrap_or("not found"),
        "listing matched"
    );
    Some(SearchResult {
        retailer: profile.name.clone(),
        description: format!("Find {query} at {}", profile.name),
        url: best.url,
        title: best.title,
        price: best.prices.price,
        sale_price: best.prices.sale_price,
        original_price: best.prices.original_price,
        is_original: false,
    })
}

fn result_links<'a, S: AsRef<str>>(root: ElementRef<'a>, ladder: &[S]) -> Vec<ElementRef<'a>> {
    ladder
        .iter()
        .filter_map(|raw| parse_selector(raw.as_ref()))
        .flat_map(|selector| root.select(&selector).collect::<Vec<_>>())
        .collect()
}

/// Anchor text, or its `title`/`aria-label` when the anchor wraps an image.
fn link_title(link: ElementRef<'_>) -> String {
    let text = element_text(link);
    if !text.is_empty() {
        return text;
    }
    ["title", "aria-label"]
        .iter()
        .find_map(|attr| link.value().attr(attr))
        .map(|v| v.split_whitespace().collect::<Vec<_>>().join(" "))
        .unwrap_or_default()
}

fn or_generic<'a>(own: &'a [String], generic: &'a [String]) -> &'a [String] {
    if own.is_empty() {
        generic
    } else {
        own
    }
}

/// Closest result-card ancestor of a link, by container selector order.
fn result_card<'a>(
    link: ElementRef<'a>,
    listing: &ListingSelectors,
    generic: &ListingSelectors,
) -> Option<ElementRef<'a>> {
    or_generic(&listing.containers, &generic.containers)
        .iter()
        .filter_map(|raw| parse_selector(raw))
        .find_map(|selector| closest(link, &selector))
}

fn card_prices(
    card: ElementRef<'_>,
    listing: &ListingSelectors,
    generic: &ListingSelectors,
    bounds: PriceBounds,
) -> ListingPrices {
    let was_selectors: Vec<_> = or_generic(&listing.was_prices, &generic.was_prices)
        .iter()
        .filter_map(|raw| parse_selector(raw))
        .collect();
    let is_struck = |el: ElementRef<'_>| {
        std::iter::once(el)
            .chain(el.ancestors().filter_map(ElementRef::wrap))
            .take_while(|node| node.id() != card.id())
            .any(|node| was_selectors.iter().any(|s| s.matches(&node)))
    };

    let active = first_match(card, or_generic(&listing.prices, &generic.prices), |el| {
        if is_struck(el) {
            return None;
        }
        PriceCandidate::from_element_preferring_dollars(el).filter(|c| c.is_acceptable(bounds))
    });
    let struck = first_match(card, or_generic(&listing.was_prices, &generic.was_prices), |el| {
        PriceCandidate::from_element_preferring_dollars(el).filter(|c| c.is_acceptable(bounds))
    });
    ListingPrices::resolve(active, struck)
}

/// Searches every target retailer for `query` on one session, in registry
/// order, skipping `exclude_store`.
///
/// Never fails: unreachable or unmatched retailers are logged and skipped.
pub async fn search_across_retailers<S: Session>(
    session: &mut S,
    registry: &RetailerRegistry,
    query: &str,
    exclude_store: Option<&str>,
    settings: SearchSettings,
) -> Vec<SearchResult> {
    let encoded = utf8_percent_encode(query.trim(), NON_ALPHANUMERIC).to_string();
    let navigation = Navigation {
        timeout: settings.timeout,
        wait: LoadSignal::Loaded,
    };

    let mut results = Vec::new();
    for profile in registry.search_targets(exclude_store) {
        let Some(search_url) = profile.search_url_for(&encoded) else {
            continue;
        };
        let page = match session.render(&search_url, navigation).await {
            Ok(page) => page,
            Err(e) => {
                tracing::warn!(retailer = %profile.name, url = %search_url, error = %e, "retailer search skipped");
                continue;
            }
        };
        match match_listing(&page, profile, registry, query, settings.threshold, settings.bounds) {
            Some(result) => results.push(result),
            None => tracing::info!(retailer = %profile.name, "no listing passed the similarity gate"),
        }
        if results.len() >= MAX_SEARCH_TARGETS {
            break;
        }
    }

    tracing::info!(query, matches = results.len(), "cross-retailer search finished");
    results
}

#[cfg(test)]
#[path = "matcher_test.rs"]
mod tests;
