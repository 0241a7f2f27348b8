//! HTTP-only fallback: used when no browser session can be started.
//!
//! The page is fetched without executing JavaScript and read with a reduced
//! ladder that leans on the metadata storefronts embed for link previews
//! (`og:*`, `itemprop`). Recall on script-rendered storefronts is lower.

use std::time::Duration;

use dealhunter_core::{Availability, ExtractionResult, PriceBounds, RetailerRegistry};
use reqwest::Client;
use scraper::{ElementRef, Html};

use crate::error::EngineError;
use crate::extract::{
    non_empty_text, ranked_images, truncate_chars, AVAILABILITY_SELECTORS,
    DESCRIPTION_SELECTORS,
};
use crate::heuristics::{first_element, first_match};
use crate::page::{element_text, RenderedPage};
use crate::price::PriceCandidate;
use crate::retry::retry_with_backoff;

const META_TITLE: [&str; 2] = ["meta[property=\"og:title\"]", "meta[name=\"twitter:title\"]"];

const META_PRICE: [&str; 3] = [
    "meta[property=\"product:price:amount\"]",
    "meta[property=\"og:price:amount\"]",
    "meta[itemprop=\"price\"]",
];

const META_AVAILABILITY: [&str; 3] = [
    "meta[property=\"product:availability\"]",
    "meta[property=\"og:availability\"]",
    "[itemprop=\"availability\"]",
];

const META_IMAGE: [&str; 2] = ["meta[property=\"og:image\"]", "meta[name=\"twitter:image\"]"];

const META_DESCRIPTION: [&str; 2] = ["meta[property=\"og:description\"]", "meta[name=\"description\"]"];

const DESCRIPTION_LIMIT: usize = 5_000;

/// Plain HTTP client for the degraded extraction path.
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: Client,
    max_retries: u32,
    backoff_base_ms: u64,
}

impl HttpFetcher {
    /// # Errors
    ///
    /// Returns [`EngineError::Http`] if the client cannot be built.
    pub fn new(
        timeout: Duration,
        user_agent: &str,
        max_retries: u32,
        backoff_base_ms: u64,
    ) -> Result<Self, EngineError> {
        let client = Client::builder()
            .timeout(timeout)
            .connect_timeout(Duration::from_secs(10))
            .user_agent(user_agent)
            .build()?;
        Ok(Self {
            client,
            max_retries,
            backoff_base_ms,
        })
    }

    /// Fetches `url` and returns the markup with the final (post-redirect) URL.
    ///
    /// # Errors
    ///
    /// [`EngineError::Http`] on network failure and
    /// [`EngineError::UnexpectedStatus`] on a non-2xx response, each after
    /// retries on transient conditions.
    pub async fn fetch_markup(&self, url: &str) -> Result<RenderedPage, EngineError> {
        retry_with_backoff(self.max_retries, self.backoff_base_ms, || async move {
            let response = self
                .client
                .get(url)
                .header(reqwest::header::ACCEPT, "text/html,application/xhtml+xml")
                .send()
                .await?;
            let status = response.status();
            if !status.is_success() {
                return Err(EngineError::UnexpectedStatus {
                    status: status.as_u16(),
                    url: url.to_string(),
                });
            }
            let final_url = response.url().to_string();
            let html = response.text().await?;
            Ok(RenderedPage::from_markup(final_url, html))
        })
        .await
    }

    /// Fetches `url` and runs the reduced static ladder over it.
    ///
    /// # Errors
    ///
    /// See [`Self::fetch_markup`].
    pub async fn fetch_simple(
        &self,
        url: &str,
        registry: &RetailerRegistry,
        bounds: PriceBounds,
    ) -> Result<ExtractionResult, EngineError> {
        let page = self.fetch_markup(url).await?;
        tracing::info!(url, bytes = page.html.len(), "fetched page over plain HTTP");
        Ok(extract_static(&page, registry, bounds))
    }
}

fn meta_content(el: ElementRef<'_>) -> Option<String> {
    el.value()
        .attr("content")
        .map(str::trim)
        .filter(|c| !c.is_empty())
        .map(str::to_string)
}

/// Reduced extraction over unrendered markup: metadata first, then the
/// retailer's title and price selectors. No main-content scan.
#[must_use]
pub fn extract_static(
    page: &RenderedPage,
    registry: &RetailerRegistry,
    bounds: PriceBounds,
) -> ExtractionResult {
    let document = Html::parse_document(&page.html);
    let root = document.root_element();
    let profile = page
        .host()
        .and_then(|host| registry.profile_for_host(&host));

    let title = first_match(root, &META_TITLE, meta_content)
        .or_else(|| first_match(root, registry.title_ladder(profile).as_slice(), non_empty_text))
        .or_else(|| first_match(root, &["title"], non_empty_text));

    let price = first_match(root, &META_PRICE, |el| {
        PriceCandidate::from_element(el).filter(|c| bounds.contains(c.value))
    })
    .or_else(|| {
        first_match(root, registry.price_ladder(profile), |el| {
            PriceCandidate::from_element(el).filter(|c| c.is_acceptable(bounds))
        })
    })
    .map(|candidate| candidate.normalized);

    let availability = first_element(root, &META_AVAILABILITY)
        .map(|el| {
            let value = el
                .value()
                .attr("content")
                .or_else(|| el.value().attr("href"))
                .map_or_else(|| element_text(el), str::to_lowercase);
            if value.contains("outofstock") || value.contains("out_of_stock") {
                Availability::OutOfStock
            } else {
                Availability::from_text(&value)
            }
        })
        .or_else(|| {
            first_element(root, &AVAILABILITY_SELECTORS)
                .map(|el| Availability::from_text(&element_text(el)))
        })
        .unwrap_or_default();

    let meta_image = first_match(root, &META_IMAGE, |el| {
        meta_content(el).and_then(|src| page.absolutize(&src))
    });
    let mut all_images = ranked_images(page.image_infos(&document));
    if let Some(image) = &meta_image {
        all_images.retain(|src| src != image);
        all_images.insert(0, image.clone());
        all_images.truncate(10);
    }
    let image = meta_image.or_else(|| all_images.first().cloned());

    let description = first_match(root, &META_DESCRIPTION, meta_content)
        .or_else(|| first_match(root, &DESCRIPTION_SELECTORS, non_empty_text))
        .map(|text| truncate_chars(&text, DESCRIPTION_LIMIT))
        .unwrap_or_default();

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
        title_found = result.title.is_some(),
        price = result.price.as_deref().unwrap_or("not found"),
        "static extraction finished"
    );
    result
}
