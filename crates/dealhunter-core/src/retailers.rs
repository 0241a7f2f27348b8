//! Retailer profiles: per-store selector tables keyed by a host token.
//!
//! Adding a store is a data change. The built-in table can be replaced
//! wholesale with a YAML file (see [`load_retailers`]).

use std::collections::HashSet;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::ConfigError;

/// Placeholder substituted with the percent-encoded query in `search_url`.
pub const QUERY_PLACEHOLDER: &str = "{query}";

/// Maximum number of retailers visited by one cross-retailer search.
pub const MAX_SEARCH_TARGETS: usize = 10;

/// Selectors used on a retailer's search-results page.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ListingSelectors {
    /// Anchors whose text is the listing title.
    pub links: Vec<String>,
    /// Result cards, matched as the closest ancestor of a link.
    pub containers: Vec<String>,
    /// Active price inside a result card.
    pub prices: Vec<String>,
    /// Struck-through "was" price inside a result card.
    pub was_prices: Vec<String>,
}

impl ListingSelectors {
    fn is_empty(&self) -> bool {
        self.links.is_empty()
            && self.containers.is_empty()
            && self.prices.is_empty()
            && self.was_prices.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetailerProfile {
    /// Display name, reported as the store.
    pub name: String,
    /// Token matched against the URL host, e.g. `amazon`.
    pub domain: String,
    /// Search URL template. Profiles without one are not searched.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub search_url: Option<String>,
    #[serde(default)]
    pub title_selectors: Vec<String>,
    #[serde(default)]
    pub price_selectors: Vec<String>,
    #[serde(default)]
    pub main_content_selectors: Vec<String>,
    #[serde(default)]
    pub listing: ListingSelectors,
}

impl RetailerProfile {
    /// Whether this profile owns `host` (already lowercased by the caller).
    #[must_use]
    pub fn matches_host(&self, host: &str) -> bool {
        !self.domain.is_empty() && host.contains(&self.domain.to_ascii_lowercase())
    }

    /// Builds the search page URL for an already percent-encoded query.
    ///
    /// Templates without [`QUERY_PLACEHOLDER`] get the query appended.
    #[must_use]
    pub fn search_url_for(&self, encoded_query: &str) -> Option<String> {
        let template = self.search_url.as_deref()?;
        if template.contains(QUERY_PLACEHOLDER) {
            Some(template.replace(QUERY_PLACEHOLDER, encoded_query))
        } else {
            Some(format!("{template}{encoded_query}"))
        }
    }
}

/// Known retailers plus the mandatory generic fallback profile.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetailerRegistry {
    retailers: Vec<RetailerProfile>,
    generic: RetailerProfile,
}

impl RetailerRegistry {
    /// Validates and assembles a registry.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Validation`] for blank or duplicate names, a
    /// blank domain token, or a generic profile missing title or price
    /// selectors.
    pub fn new(
        retailers: Vec<RetailerProfile>,
        generic: RetailerProfile,
    ) -> Result<Self, ConfigError> {
        let mut seen = HashSet::new();
        for profile in &retailers {
            let name = profile.name.trim();
            if name.is_empty() {
                return Err(ConfigError::Validation(
                    "retailer name must not be blank".to_string(),
                ));
            }
            if !seen.insert(name.to_lowercase()) {
                return Err(ConfigError::Validation(format!(
                    "duplicate retailer name: {name}"
                )));
            }
            if profile.domain.trim().is_empty() {
                return Err(ConfigError::Validation(format!(
                    "retailer {name} has a blank domain token"
                )));
            }
        }
        if generic.title_selectors.is_empty() || generic.price_selectors.is_empty() {
            return Err(ConfigError::Validation(
                "generic profile needs title and price selectors".to_string(),
            ));
        }
        Ok(Self { retailers, generic })
    }

    /// Parses and validates a YAML registry document.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::RetailersFileParse`] on malformed YAML and
    /// [`ConfigError::Validation`] when the table is inconsistent.
    pub fn from_yaml_str(raw: &str) -> Result<Self, ConfigError> {
        let parsed: RetailerRegistry = serde_yaml::from_str(raw)?;
        Self::new(parsed.retailers, parsed.generic)
    }

    #[must_use]
    pub fn builtin() -> Self {
        Self {
            retailers: builtin_retailers(),
            generic: generic_profile(),
        }
    }

    #[must_use]
    pub fn retailers(&self) -> &[RetailerProfile] {
        &self.retailers
    }

    #[must_use]
    pub fn generic(&self) -> &RetailerProfile {
        &self.generic
    }

    /// First retailer whose domain token occurs in the URL host.
    #[must_use]
    pub fn profile_for_host(&self, host: &str) -> Option<&RetailerProfile> {
        let host = host.to_ascii_lowercase();
        self.retailers.iter().find(|p| p.matches_host(&host))
    }

    /// Searchable profiles in declared order, skipping `exclude_store`
    /// (case-insensitive), capped at [`MAX_SEARCH_TARGETS`].
    #[must_use]
    pub fn search_targets(&self, exclude_store: Option<&str>) -> Vec<&RetailerProfile> {
        let excluded = exclude_store
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_lowercase);
        self.retailers
            .iter()
            .filter(|p| p.search_url.is_some())
            .filter(|p| excluded.as_deref() != Some(p.name.to_lowercase().as_str()))
            .take(MAX_SEARCH_TARGETS)
            .collect()
    }

    /// Title ladder for a page: the profile's own selectors, then the
    /// generic ones not already listed.
    #[must_use]
    pub fn title_ladder<'a>(&'a self, profile: Option<&'a RetailerProfile>) -> Vec<&'a str> {
        let mut ladder: Vec<&'a str> = Vec::new();
        let own = profile.map(|p| p.title_selectors.as_slice()).unwrap_or_default();
        for selector in own.iter().chain(&self.generic.title_selectors) {
            if !ladder.contains(&selector.as_str()) {
                ladder.push(selector.as_str());
            }
        }
        ladder
    }

    /// The profile's price selectors, or the generic ones when it has none.
    #[must_use]
    pub fn price_ladder<'a>(&'a self, profile: Option<&'a RetailerProfile>) -> &'a [String] {
        match profile {
            Some(p) if !p.price_selectors.is_empty() => &p.price_selectors,
            _ => &self.generic.price_selectors,
        }
    }

    #[must_use]
    pub fn main_content_ladder<'a>(
        &'a self,
        profile: Option<&'a RetailerProfile>,
    ) -> &'a [String] {
        match profile {
            Some(p) if !p.main_content_selectors.is_empty() => &p.main_content_selectors,
            _ => &self.generic.main_content_selectors,
        }
    }

    /// Listing selectors for a search page, falling back to the generic
    /// listing table when the profile declares none.
    #[must_use]
    pub fn listing_for<'a>(&'a self, profile: &'a RetailerProfile) -> &'a ListingSelectors {
        if profile.listing.is_empty() {
            &self.generic.listing
        } else {
            &profile.listing
        }
    }
}

impl Default for RetailerRegistry {
    fn default() -> Self {
        Self::builtin()
    }
}

/// Loads the registry from `path`, or the built-in table when `None`.
///
/// # Errors
///
/// Returns [`ConfigError::RetailersFileIo`] when the file cannot be read,
/// otherwise the errors of [`RetailerRegistry::from_yaml_str`].
pub fn load_retailers(path: Option<&Path>) -> Result<RetailerRegistry, ConfigError> {
    let Some(path) = path else {
        return Ok(RetailerRegistry::builtin());
    };
    let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::RetailersFileIo {
        path: path.display().to_string(),
        source,
    })?;
    RetailerRegistry::from_yaml_str(&raw)
}

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| (*s).to_string()).collect()
}

fn profile(name: &str, domain: &str, search_url: Option<&str>) -> RetailerProfile {
    RetailerProfile {
        name: name.to_string(),
        domain: domain.to_string(),
        search_url: search_url.map(str::to_string),
        title_selectors: Vec::new(),
        price_selectors: Vec::new(),
        main_content_selectors: Vec::new(),
        listing: ListingSelectors::default(),
    }
}

fn builtin_retailers() -> Vec<RetailerProfile> {
    let amazon = RetailerProfile {
        title_selectors: strings(&["#productTitle", "h1.a-size-large"]),
        price_selectors: strings(&[
            "#priceblock_ourprice",
            "#priceblock_dealprice",
            "#priceblock_saleprice",
            "#corePriceDisplay_desktop_feature_div .a-price .a-offscreen",
            "#corePrice_feature_div .a-price .a-offscreen",
            ".a-price.a-text-price .a-offscreen",
            ".a-price .a-offscreen",
            ".a-price-whole",
            "[data-a-color=\"price\"] .a-offscreen",
            ".priceToPay .a-offscreen",
        ]),
        main_content_selectors: strings(&[
            "#centerCol",
            "#dp-container",
            "[data-feature-name=\"price\"]",
            "#productDetails_feature_div",
            "#apex_desktop",
        ]),
        listing: ListingSelectors {
            links: strings(&["h2 a[href*=\"/dp/\"]", "h2 a[href*=\"/gp/product/\"]"]),
            containers: strings(&["[data-component-type=\"s-search-result\"]", ".s-result-item"]),
            prices: strings(&[".a-price:not(.a-text-price) .a-offscreen"]),
            was_prices: strings(&[".a-price.a-text-price .a-offscreen"]),
        },
        ..profile("Amazon", "amazon", Some("https://www.amazon.com/s?k={query}"))
    };

    let walmart = RetailerProfile {
        title_selectors: strings(&["h1[data-automation-id=\"title\"]", "h1[itemprop=\"name\"]"]),
        price_selectors: strings(&[
            "[itemprop=\"price\"]",
            ".price-current",
            "[data-automation-id=\"product-price\"]",
            ".prod-PriceHero .price",
            "[class*=\"price\"]",
        ]),
        main_content_selectors: strings(&[
            "[data-automation-id=\"product-overview\"]",
            ".prod-ProductTitle",
            "main",
        ]),
        listing: ListingSelectors {
            links: strings(&["a[data-testid=\"product-title\"]"]),
            containers: strings(&["[data-testid=\"item-stack\"]", "div[class*=\"item\"]"]),
            prices: strings(&[
                "[itemprop=\"price\"]",
                ".price-current",
                "[class*=\"price\"]:not([class*=\"shipping\"])",
            ]),
            was_prices: strings(&[".price-old", ".price-was", "[class*=\"strike\"]"]),
        },
        ..profile("Walmart", "walmart", Some("https://www.walmart.com/search?q={query}"))
    };

    let target = RetailerProfile {
        title_selectors: strings(&["h1[data-test=\"product-title\"]"]),
        price_selectors: strings(&[
            "[data-test=\"product-price\"]",
            "[data-testid=\"product-price\"]",
            ".h-padding-r-tiny",
            "[class*=\"price\"]",
        ]),
        main_content_selectors: strings(&["[data-test=\"product-details\"]", "main"]),
        listing: ListingSelectors {
            links: strings(&["a[data-test=\"product-title\"]"]),
            containers: strings(&["[data-test=\"product-details\"]", "div[class*=\"product\"]"]),
            prices: strings(&["[data-test=\"current-price\"]", "[data-test=\"product-price\"]"]),
            was_prices: strings(&["[data-test=\"comparison-price\"]", "s", "del"]),
        },
        ..profile("Target", "target", Some("https://www.target.com/s?searchTerm={query}"))
    };

    let lego = RetailerProfile {
        title_selectors: strings(&["[data-test=\"product-overview-name\"]"]),
        price_selectors: strings(&[
            "[data-testid=\"product-price\"]",
            ".product-price",
            ".price",
            "[class*=\"price\"]",
            "[class*=\"Price\"]",
            ".product-details-price",
            "span[class*=\"price\"]",
            "div[class*=\"price\"]",
        ]),
        main_content_selectors: strings(&[
            "main",
            "[data-testid=\"product-details\"]",
            ".product-details",
            ".product-info",
            "article",
        ]),
        ..profile("Lego", "lego", None)
    };

    vec![
        amazon,
        walmart,
        target,
        lego,
        profile("Meijer", "meijer", None),
        profile("eBay", "ebay", Some("https://www.ebay.com/sch/i.html?_nkw={query}")),
        profile(
            "Best Buy",
            "bestbuy",
            Some("https://www.bestbuy.com/site/searchpage.jsp?st={query}"),
        ),
        profile("Home Depot", "homedepot", Some("https://www.homedepot.com/s/{query}")),
        profile("Lowe's", "lowes", Some("https://www.lowes.com/search?searchTerm={query}")),
        profile(
            "Costco",
            "costco",
            Some("https://www.costco.com/CatalogSearch?dept=All&keyword={query}"),
        ),
        profile("Sam's Club", "samsclub", Some("https://www.samsclub.com/s/{query}")),
        profile("Macy's", "macys", Some("https://www.macys.com/shop/featured/{query}")),
    ]
}

fn generic_profile() -> RetailerProfile {
    RetailerProfile {
        title_selectors: strings(&[".product-title", "h1", "[data-testid=\"product-title\"]"]),
        price_selectors: strings(&[
            "[itemprop=\"price\"]",
            "[data-testid*=\"price\"]",
            "[class*=\"price\"]",
            "[id*=\"price\"]",
            ".price",
            ".product-price",
        ]),
        main_content_selectors: strings(&[
            "main",
            "article",
            "[class*=\"product\"]",
            "[id*=\"product\"]",
        ]),
        listing: ListingSelectors {
            links: strings(&[
                "a[href*=\"/p/\"]",
                "a[href*=\"/product/\"]",
                "a[href*=\"/dp/\"]",
            ]),
            containers: strings(&[
                "li",
                "article",
                "div[class*=\"item\"]",
                "div[class*=\"product\"]",
            ]),
            prices: strings(&["[itemprop=\"price\"]", "[class*=\"price\"]"]),
            was_prices: strings(&["s", "del", "[class*=\"strike\"]", "[class*=\"was-price\"]"]),
        },
        ..profile("Generic", "", None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_registry_is_valid() {
        let builtin = RetailerRegistry::builtin();
        let rebuilt = RetailerRegistry::new(builtin.retailers.clone(), builtin.generic.clone());
        assert!(rebuilt.is_ok(), "builtin table failed validation: {rebuilt:?}");
    }

    #[test]
    fn host_matching_uses_domain_token() {
        let registry = RetailerRegistry::builtin();
        let profile = registry.profile_for_host("www.Amazon.com").unwrap();
        assert_eq!(profile.name, "Amazon");
        assert_eq!(
            registry.profile_for_host("www.lego.com").unwrap().name,
            "Lego"
        );
        assert!(registry.profile_for_host("shop.example.org").is_none());
    }

    #[test]
    fn search_targets_follow_declared_order() {
        let registry = RetailerRegistry::builtin();
        let names: Vec<&str> = registry
            .search_targets(None)
            .iter()
            .map(|p| p.name.as_str())
            .collect();
        assert_eq!(
            names,
            vec![
                "Amazon",
                "Walmart",
                "Target",
                "eBay",
                "Best Buy",
                "Home Depot",
                "Lowe's",
                "Costco",
                "Sam's Club",
                "Macy's"
            ]
        );
    }

    #[test]
    fn search_targets_exclude_current_store_case_insensitively() {
        let registry = RetailerRegistry::builtin();
        let targets = registry.search_targets(Some("walmart"));
        assert_eq!(targets.len(), 9);
        assert!(targets.iter().all(|p| p.name != "Walmart"));
    }

    #[test]
    fn search_url_substitutes_or_appends() {
        let registry = RetailerRegistry::builtin();
        let amazon = registry.profile_for_host("amazon.com").unwrap();
        assert_eq!(
            amazon.search_url_for("lego%20castle").as_deref(),
            Some("https://www.amazon.com/s?k=lego%20castle")
        );

        let mut bare = profile("Shop", "shop", Some("https://shop.test/find?q="));
        assert_eq!(
            bare.search_url_for("drill").as_deref(),
            Some("https://shop.test/find?q=drill")
        );
        bare.search_url = None;
        assert!(bare.search_url_for("drill").is_none());
    }

    #[test]
    fn title_ladder_puts_retailer_selectors_first_without_duplicates() {
        let registry = RetailerRegistry::builtin();
        let amazon = registry.profile_for_host("amazon.com");
        let ladder = registry.title_ladder(amazon);
        assert_eq!(ladder.first(), Some(&"#productTitle"));
        assert_eq!(ladder.last(), Some(&"[data-testid=\"product-title\"]"));
        assert_eq!(ladder.iter().filter(|s| **s == "h1").count(), 1);
    }

    #[test]
    fn profiles_without_selectors_inherit_generic_ladders() {
        let registry = RetailerRegistry::builtin();
        let meijer = registry.profile_for_host("www.meijer.com");
        assert_eq!(
            registry.price_ladder(meijer),
            registry.generic().price_selectors.as_slice()
        );
        assert_eq!(
            registry.main_content_ladder(meijer),
            registry.generic().main_content_selectors.as_slice()
        );
        let ebay = registry.profile_for_host("www.ebay.com").unwrap();
        assert_eq!(registry.listing_for(ebay), &registry.generic().listing);
    }

    #[test]
    fn yaml_override_replaces_table() {
        let yaml = r#"
retailers:
  - name: Corner Shop
    domain: cornershop
    search_url: "https://cornershop.test/search?q={query}"
    price_selectors: [".cost"]
generic:
  name: Generic
  domain: ""
  title_selectors: ["h1"]
  price_selectors: [".price"]
"#;
        let registry = RetailerRegistry::from_yaml_str(yaml).unwrap();
        assert_eq!(registry.retailers().len(), 1);
        assert_eq!(registry.search_targets(None)[0].name, "Corner Shop");
        assert!(registry.profile_for_host("amazon.com").is_none());
    }

    #[test]
    fn yaml_with_duplicate_names_is_rejected() {
        let yaml = r#"
retailers:
  - name: Shop
    domain: shop
  - name: shop
    domain: shop2
generic:
  name: Generic
  domain: ""
  title_selectors: ["h1"]
  price_selectors: [".price"]
"#;
        let result = RetailerRegistry::from_yaml_str(yaml);
        assert!(
            matches!(result, Err(ConfigError::Validation(ref msg)) if msg.contains("duplicate")),
            "expected duplicate-name validation error, got: {result:?}"
        );
    }

    #[test]
    fn yaml_with_blank_domain_is_rejected() {
        let yaml = r#"
retailers:
  - name: Shop
    domain: "  "
generic:
  name: Generic
  domain: ""
  title_selectors: ["h1"]
  price_selectors: [".price"]
"#;
        assert!(matches!(
            RetailerRegistry::from_yaml_str(yaml),
            Err(ConfigError::Validation(_))
        ));
    }

    #[test]
    fn malformed_yaml_is_a_parse_error() {
        let result = RetailerRegistry::from_yaml_str("retailers: [");
        assert!(matches!(result, Err(ConfigError::RetailersFileParse(_))));
    }

    #[test]
    fn missing_file_is_an_io_error() {
        let result = load_retailers(Some(Path::new("/nonexistent/retailers.yaml")));
        assert!(matches!(result, Err(ConfigError::RetailersFileIo { .. })));
    }

    #[test]
    fn no_path_loads_builtin() {
        let registry = load_retailers(None).unwrap();
        assert_eq!(registry, RetailerRegistry::builtin());
    }
}
