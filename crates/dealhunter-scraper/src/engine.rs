//! Request-level facade: the operations exposed to the server and CLI.
//!
//! Each call owns its session for its whole lifetime and releases it before
//! returning. Nothing is cached between calls.

use std::time::Duration;

use dealhunter_core::{
    AppConfig, ExtractionResult, ImageSet, PriceBounds, PriceCheck, ProductDetails,
    RetailerRegistry, SearchResults,
};
use reqwest::Url;

use crate::analyze::{Analyzer, ProductAnalyzer};
use crate::error::EngineError;
use crate::extract::extract_fields;
use crate::fallback::HttpFetcher;
use crate::matcher::{search_across_retailers, SearchSettings};
use crate::session::{ChromiumProvider, ChromiumSettings, LoadSignal, Navigation, Session, SessionProvider};

const FETCH_BACKOFF_BASE_MS: u64 = 500;

#[derive(Debug, Clone, Copy)]
pub struct EngineSettings {
    pub navigation: Navigation,
    pub search: SearchSettings,
    pub bounds: PriceBounds,
}

impl EngineSettings {
    #[must_use]
    pub fn from_app_config(config: &AppConfig) -> Self {
        Self {
            navigation: Navigation {
                timeout: Duration::from_secs(config.navigation_timeout_secs),
                wait: LoadSignal::NetworkIdle,
            },
            search: SearchSettings {
                timeout: Duration::from_secs(config.search_timeout_secs),
                threshold: config.match_threshold,
                bounds: config.price_bounds,
            },
            bounds: config.price_bounds,
        }
    }
}

pub struct Engine<P> {
    provider: P,
    analyzer: Analyzer,
    fetcher: HttpFetcher,
    registry: RetailerRegistry,
    settings: EngineSettings,
}

impl Engine<ChromiumProvider> {
    /// Engine backed by headless Chromium.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Http`] if an HTTP client cannot be built.
    pub fn from_config(config: &AppConfig, registry: RetailerRegistry) -> Result<Self, EngineError> {
        let fetcher = HttpFetcher::new(
            Duration::from_secs(config.http_timeout_secs),
            &config.user_agent,
            config.http_max_retries,
            FETCH_BACKOFF_BASE_MS,
        )?;
        Ok(Self::new(
            ChromiumProvider::new(ChromiumSettings::from_app_config(config)),
            Analyzer::from_config(config)?,
            fetcher,
            registry,
            EngineSettings::from_app_config(config),
        ))
    }
}

impl<P: SessionProvider> Engine<P> {
    #[must_use]
    pub fn new(
        provider: P,
        analyzer: Analyzer,
        fetcher: HttpFetcher,
        registry: RetailerRegistry,
        settings: EngineSettings,
    ) -> Self {
        Self {
            provider,
            analyzer,
            fetcher,
            registry,
            settings,
        }
    }

    /// Full extraction of one product page, including the model-assisted
    /// pass when the title is weak.
    ///
    /// # Errors
    ///
    /// - [`EngineError::InvalidUrl`] for anything but an absolute http(s) URL.
    /// - [`EngineError::NavigationTimeout`] / [`EngineError::NavigationFailed`]
    ///   when the page cannot be loaded.
    /// - [`EngineError::FallbackFailed`] when no browser could be started and
    ///   the plain HTTP fetch failed too.
    pub async fn extract(&self, url: &str) -> Result<ExtractionResult, EngineError> {
        let url = validate_url(url)?;
        let scraped = self.scrape(&url).await?;
        if scraped.has_usable_title() {
            return Ok(scraped);
        }

        tracing::info!(
            url = %url,
            title = scraped.title.as_deref().unwrap_or_default(),
            "weak title; running model-assisted analysis"
        );
        let analyzed = self
            .analyzer
            .analyze(&scraped.analysis_text(), scraped.image.as_deref())
            .await;
        Ok(merge_analysis(scraped, analyzed))
    }

    /// `extractProduct`.
    ///
    /// # Errors
    ///
    /// See [`Self::extract`].
    pub async fn extract_product(&self, url: &str) -> Result<ProductDetails, EngineError> {
        let result = self.extract(url).await?;
        Ok(ProductDetails::from(&result))
    }

    /// `checkPrice`: re-extracts and compares against the caller's prior price.
    ///
    /// # Errors
    ///
    /// See [`Self::extract`].
    pub async fn check_price(
        &self,
        url: &str,
        current_price: Option<&str>,
    ) -> Result<PriceCheck, EngineError> {
        let details = self.extract_product(url).await?;
        let check = PriceCheck::compare(details, current_price);
        if check.deal_found {
            tracing::info!(
                url,
                from = current_price.unwrap_or_default(),
                to = check.details.price.as_deref().unwrap_or_default(),
                "price drop detected"
            );
        }
        Ok(check)
    }

    /// `getAlternativeImages`.
    ///
    /// # Errors
    ///
    /// See [`Self::extract`].
    pub async fn alternative_images(&self, url: &str) -> Result<ImageSet, EngineError> {
        let url = validate_url(url)?;
        let scraped = self.scrape(&url).await?;
        Ok(ImageSet {
            images: scraped.all_images,
        })
    }

    /// `searchProduct`: best listing per competing retailer.
    ///
    /// Retailer-level failures are skipped, so an all-timeout search returns
    /// an empty list.
    ///
    /// # Errors
    ///
    /// - [`EngineError::EmptyQuery`] for a blank product name.
    /// - [`EngineError::SessionUnavailable`] when no browser can be started.
    pub async fn search_product(
        &self,
        product_name: &str,
        current_store: Option<&str>,
    ) -> Result<SearchResults, EngineError> {
        let query = product_name.trim();
        if query.is_empty() {
            return Err(EngineError::EmptyQuery);
        }

        let mut session = self.provider.acquire().await?;
        let results = search_across_retailers(
            &mut session,
            &self.registry,
            query,
            current_store,
            self.settings.search,
        )
        .await;
        session.release().await;
        Ok(SearchResults { results })
    }

    /// Rendered extraction, or the plain HTTP ladder when no browser starts.
    async fn scrape(&self, url: &str) -> Result<ExtractionResult, EngineError> {
        match self.provider.acquire().await {
            Ok(mut session) => {
                let rendered = session.render(url, self.settings.navigation).await;
                session.release().await;
                let page = rendered?;
                Ok(extract_fields(&page, &self.registry, self.settings.bounds))
            }
            Err(EngineError::SessionUnavailable { reason }) => {
                tracing::warn!(url, reason = %reason, "no browser session; using HTTP fallback");
                self.fetcher
                    .fetch_simple(url, &self.registry, self.settings.bounds)
                    .await
                    .map_err(|e| {
                        tracing::error!(url, error = %e, "HTTP fallback failed");
                        EngineError::FallbackFailed(Box::new(e))
                    })
            }
            Err(e) => Err(e),
        }
    }
}

/// Accepts absolute `http`/`https` URLs only.
fn validate_url(raw: &str) -> Result<String, EngineError> {
    let raw = raw.trim();
    let parsed = Url::parse(raw).map_err(|e| EngineError::InvalidUrl {
        url: raw.to_string(),
        reason: e.to_string(),
    })?;
    match parsed.scheme() {
        "http" | "https" if parsed.host_str().is_some() => Ok(parsed.to_string()),
        scheme => Err(EngineError::InvalidUrl {
            url: raw.to_string(),
            reason: format!("unsupported scheme \"{scheme}\""),
        }),
    }
}

/// Analyzer output replaces the product fields; the image set and
/// description stay from the page, as do the price, store and main image
/// when the analyzer had none.
fn merge_analysis(scraped: ExtractionResult, analyzed: ExtractionResult) -> ExtractionResult {
    ExtractionResult {
        title: analyzed.title,
        price: analyzed.price.or(scraped.price),
        availability: analyzed.availability,
        image: analyzed.image.or(scraped.image),
        all_images: scraped.all_images,
        description: scraped.description,
        retailer: analyzed.retailer.or(scraped.retailer),
    }
}
