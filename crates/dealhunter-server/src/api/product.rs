use axum::{extract::State, Extension, Json};
use dealhunter_core::{ImageSet, PriceCheck, ProductDetails};
use dealhunter_scraper::SessionProvider;
use serde::Deserialize;

use crate::middleware::RequestId;

use super::{map_engine_error, required, ApiError, ApiJson, AppState};

const URL_REQUIRED: &str = "URL is required";

#[derive(Debug, Deserialize)]
pub(super) struct UrlRequest {
    url: Option<String>,
}

/// Prior price as sent by clients: `"24.99"`, `24.99`, or anything else,
/// which counts as no usable prior price.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub(super) enum PriceInput {
    Text(String),
    Number(serde_json::Number),
    Other(serde_json::Value),
}

impl PriceInput {
    fn as_text(&self) -> Option<String> {
        match self {
            Self::Text(text) => Some(text.clone()),
            Self::Number(number) => Some(number.to_string()),
            Self::Other(_) => None,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct CheckPriceRequest {
    url: Option<String>,
    current_price: Option<PriceInput>,
}

pub(super) async fn extract_product<P: SessionProvider + 'static>(
    State(state): State<AppState<P>>,
    Extension(req_id): Extension<RequestId>,
    ApiJson(body): ApiJson<UrlRequest>,
) -> Result<Json<ProductDetails>, ApiError> {
    let url = required(body.url.as_deref(), &req_id.0, URL_REQUIRED)?;
    tracing::info!(request_id = %req_id.0, url, "extract product");

    let details = state
        .engine
        .extract_product(url)
        .await
        .map_err(|e| map_engine_error(req_id.0.clone(), &e))?;
    Ok(Json(details))
}

pub(super) async fn check_price<P: SessionProvider + 'static>(
    State(state): State<AppState<P>>,
    Extension(req_id): Extension<RequestId>,
    ApiJson(body): ApiJson<CheckPriceRequest>,
) -> Result<Json<PriceCheck>, ApiError> {
    let url = required(body.url.as_deref(), &req_id.0, URL_REQUIRED)?;
    let current_price = body.current_price.as_ref().and_then(PriceInput::as_text);
    tracing::info!(
        request_id = %req_id.0,
        url,
        current_price = current_price.as_deref().unwrap_or("none"),
        "check price"
    );

    let check = state
        .engine
        .check_price(url, current_price.as_deref())
        .await
        .map_err(|e| map_engine_error(req_id.0.clone(), &e))?;
    Ok(Json(check))
}

pub(super) async fn get_images<P: SessionProvider + 'static>(
    State(state): State<AppState<P>>,
    Extension(req_id): Extension<RequestId>,
    ApiJson(body): ApiJson<UrlRequest>,
) -> Result<Json<ImageSet>, ApiError> {
    let url = required(body.url.as_deref(), &req_id.0, URL_REQUIRED)?;
    tracing::info!(request_id = %req_id.0, url, "alternative images");

    let images = state
        .engine
        .alternative_images(url)
        .await
        .map_err(|e| map_engine_error(req_id.0.clone(), &e))?;
    Ok(Json(images))
}
