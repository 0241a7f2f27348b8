pub mod app_config;
pub mod config;
pub mod error;
pub mod product;
pub mod retailers;
pub mod tuning;

pub use app_config::{AppConfig, Environment};
pub use config::{load_app_config, load_app_config_from_env};
pub use error::ConfigError;
pub use product::{
    parse_price_text, Availability, ExtractionResult, ImageSet, PriceCheck, ProductDetails,
    SearchResult, SearchResults, OTHER_STORE,
};
pub use retailers::{
    load_retailers, ListingSelectors, RetailerProfile, RetailerRegistry, MAX_SEARCH_TARGETS,
};
pub use tuning::{PriceBounds, SimilarityThreshold};
