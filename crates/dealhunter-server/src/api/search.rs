use axum::{extract::State, Extension, Json};
use dealhunter_core::SearchResults;
use dealhunter_scraper::SessionProvider;
use serde::Deserialize;

use crate::middleware::RequestId;

use super::{map_engine_error, required, ApiError, ApiJson, AppState};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct SearchRequest {
    product_name: Option<String>,
    current_store: Option<String>,
}

pub(super) async fn search_product<P: SessionProvider + 'static>(
    State(state): State<AppState<P>>,
    Extension(req_id): Extension<RequestId>,
    ApiJson(body): ApiJson<SearchRequest>,
) -> Result<Json<SearchResults>, ApiError> {
    let name = required(body.product_name.as_deref(), &req_id.0, "Product name is required")?;
    let current_store = body
        .current_store
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty());
    tracing::info!(
        request_id = %req_id.0,
        product_name = name,
        current_store = current_store.unwrap_or("none"),
        "search product"
    );

    let results = state
        .engine
        .search_product(name, current_store)
        .await
        .map_err(|e| map_engine_error(req_id.0.clone(), &e))?;
    Ok(Json(results))
}
