use std::net::SocketAddr;
use std::path::PathBuf;

use crate::tuning::{PriceBounds, SimilarityThreshold};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Environment {
    Development,
    Test,
    Production,
}

impl Environment {
    /// Colored log output is only used in development.
    #[must_use]
    pub fn wants_ansi_logs(&self) -> bool {
        matches!(self, Environment::Development)
    }
}

impl std::fmt::Display for Environment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Environment::Development => write!(f, "development"),
            Environment::Test => write!(f, "test"),
            Environment::Production => write!(f, "production"),
        }
    }
}

#[derive(Clone)]
pub struct AppConfig {
    pub env: Environment,
    pub bind_addr: SocketAddr,
    pub log_level: String,
    /// Operator-supplied browser executable, tried before any system install.
    pub browser_path: Option<PathBuf>,
    /// Directory holding a bundled/auto-installed browser, if any.
    pub browser_cache_dir: Option<PathBuf>,
    pub user_agent: String,
    /// Extraction-model credential. `None` routes every weak page straight to
    /// the text-pattern fallback.
    pub llm_api_key: Option<String>,
    pub llm_model: String,
    pub llm_base_url: String,
    /// YAML file replacing the built-in retailer table.
    pub retailers_path: Option<PathBuf>,
    pub navigation_timeout_secs: u64,
    pub search_timeout_secs: u64,
    pub settle_delay_ms: u64,
    pub http_timeout_secs: u64,
    pub http_max_retries: u32,
    pub price_bounds: PriceBounds,
    pub match_threshold: SimilarityThreshold,
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("env", &self.env)
            .field("bind_addr", &self.bind_addr)
            .field("log_level", &self.log_level)
            .field("browser_path", &self.browser_path)
            .field("browser_cache_dir", &self.browser_cache_dir)
            .field("user_agent", &self.user_agent)
            .field(
                "llm_api_key",
                &self.llm_api_key.as_ref().map(|_| "[redacted]"),
            )
            .field("llm_model", &self.llm_model)
            .field("llm_base_url", &self.llm_base_url)
            .field("retailers_path", &self.retailers_path)
            .field("navigation_timeout_secs", &self.navigation_timeout_secs)
            .field("search_timeout_secs", &self.search_timeout_secs)
            .field("settle_delay_ms", &self.settle_delay_ms)
            .field("http_timeout_secs", &self.http_timeout_secs)
            .field("http_max_retries", &self.http_max_retries)
            .field("price_bounds", &self.price_bounds)
            .field("match_threshold", &self.match_threshold)
            .finish()
    }
}
