use std::str::FromStr;

use rust_decimal::Decimal;

use crate::app_config::{AppConfig, Environment};
use crate::tuning::{PriceBounds, SimilarityThreshold};
use crate::ConfigError;

/// Desktop Chrome UA presented by browser pages and the HTTP fallback.
pub const DEFAULT_USER_AGENT: &str =
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

/// Load application configuration from environment variables.
///
/// Calls `dotenvy::dotenv().ok()` to load `.env` files before reading env vars.
///
/// # Errors
///
/// Returns `ConfigError` if a variable is present but malformed.
pub fn load_app_config() -> Result<AppConfig, ConfigError> {
    dotenvy::dotenv().ok();
    load_app_config_from_env()
}

/// Load application configuration from environment variables already in the process.
///
/// Unlike [`load_app_config`], this does NOT load `.env` files.
///
/// # Errors
///
/// Returns `ConfigError` if a variable is present but malformed.
pub fn load_app_config_from_env() -> Result<AppConfig, ConfigError> {
    build_app_config(|key| std::env::var(key))
}

/// Build application configuration using the provided env-var lookup function.
///
/// Every setting has a default: a missing browser path, cache directory or
/// model credential degrades the engine instead of failing startup.
fn build_app_config<F>(lookup: F) -> Result<AppConfig, ConfigError>
where
    F: Fn(&str) -> Result<String, std::env::VarError>,
{
    use std::net::SocketAddr;
    use std::path::PathBuf;

    let optional = |var: &str| -> Option<String> {
        lookup(var)
            .ok()
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    };

    let or_default =
        |var: &str, default: &str| -> String { optional(var).unwrap_or_else(|| default.to_string()) };

    let invalid = |var: &str, reason: String| ConfigError::InvalidEnvVar {
        var: var.to_string(),
        reason,
    };

    let bind_addr = or_default("DEALHUNTER_BIND_ADDR", "0.0.0.0:3001")
        .parse::<SocketAddr>()
        .map_err(|e| invalid("DEALHUNTER_BIND_ADDR", e.to_string()))?;

    let parse_u64 = |var: &str, default: &str| -> Result<u64, ConfigError> {
        or_default(var, default)
            .parse::<u64>()
            .map_err(|e| invalid(var, e.to_string()))
    };

    let parse_u32 = |var: &str, default: &str| -> Result<u32, ConfigError> {
        or_default(var, default)
            .parse::<u32>()
            .map_err(|e| invalid(var, e.to_string()))
    };

    let parse_decimal = |var: &str, default: &str| -> Result<Decimal, ConfigError> {
        Decimal::from_str(&or_default(var, default)).map_err(|e| invalid(var, e.to_string()))
    };

    let env = parse_environment(&or_default("DEALHUNTER_ENV", "development"))
        .ok_or_else(|| {
            invalid(
                "DEALHUNTER_ENV",
                "expected one of development, test, production".to_string(),
            )
        })?;

    let log_level = or_default("DEALHUNTER_LOG_LEVEL", "info");
    let browser_path = optional("DEALHUNTER_BROWSER_PATH").map(PathBuf::from);
    let browser_cache_dir = optional("DEALHUNTER_BROWSER_CACHE_DIR").map(PathBuf::from);
    let user_agent = or_default("DEALHUNTER_USER_AGENT", DEFAULT_USER_AGENT);
    let llm_api_key = optional("DEALHUNTER_LLM_API_KEY").or_else(|| optional("OPENAI_API_KEY"));
    let llm_model = or_default("DEALHUNTER_LLM_MODEL", "gpt-4o-mini");
    let llm_base_url = or_default("DEALHUNTER_LLM_BASE_URL", "https://api.openai.com/v1")
        .trim_end_matches('/')
        .to_string();
    let retailers_path = optional("DEALHUNTER_RETAILERS_PATH").map(PathBuf::from);

    let navigation_timeout_secs = parse_u64("DEALHUNTER_NAVIGATION_TIMEOUT_SECS", "30")?;
    let search_timeout_secs = parse_u64("DEALHUNTER_SEARCH_TIMEOUT_SECS", "15")?;
    let settle_delay_ms = parse_u64("DEALHUNTER_SETTLE_DELAY_MS", "2000")?;
    let http_timeout_secs = parse_u64("DEALHUNTER_HTTP_TIMEOUT_SECS", "20")?;
    let http_max_retries = parse_u32("DEALHUNTER_HTTP_MAX_RETRIES", "2")?;

    let min_price = parse_decimal("DEALHUNTER_MIN_PRICE", "0.50")?;
    let max_price = parse_decimal("DEALHUNTER_MAX_PRICE", "50000")?;
    let price_bounds = PriceBounds::new(min_price, max_price).ok_or_else(|| {
        invalid(
            "DEALHUNTER_MIN_PRICE",
            format!("minimum {min_price} exceeds maximum {max_price}"),
        )
    })?;

    let raw_threshold = or_default("DEALHUNTER_MATCH_THRESHOLD", "0.6");
    let match_threshold = raw_threshold
        .parse::<f64>()
        .ok()
        .and_then(SimilarityThreshold::new)
        .ok_or_else(|| {
            invalid(
                "DEALHUNTER_MATCH_THRESHOLD",
                format!("\"{raw_threshold}\" is not a number in [0, 1]"),
            )
        })?;

    Ok(AppConfig {
        env,
        bind_addr,
        log_level,
        browser_path,
        browser_cache_dir,
        user_agent,
        llm_api_key,
        llm_model,
        llm_base_url,
        retailers_path,
        navigation_timeout_secs,
        search_timeout_secs,
        settle_delay_ms,
        http_timeout_secs,
        http_max_retries,
        price_bounds,
        match_threshold,
    })
}

fn parse_environment(s: &str) -> Option<Environment> {
    match s.to_ascii_lowercase().as_str() {
        "development" | "dev" => Some(Environment::Development),
        "test" => Some(Environment::Test),
        "production" | "prod" => Some(Environment::Production),
        _ => None,
    }
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;
