mod product;
mod search;

use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::{rejection::JsonRejection, FromRequest, Request},
    http::{header, HeaderName, Method, StatusCode},
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, Utc};
use dealhunter_scraper::{Engine, EngineError, SessionProvider};
use serde::{de::DeserializeOwned, Serialize};
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::middleware::{enforce_rate_limit, request_id, RateLimitState, RequestId, REQUEST_ID_HEADER};

pub struct AppState<P> {
    pub engine: Arc<Engine<P>>,
}

impl<P> AppState<P> {
    pub fn new(engine: Engine<P>) -> Self {
        Self {
            engine: Arc::new(engine),
        }
    }
}

impl<P> Clone for AppState<P> {
    fn clone(&self) -> Self {
        Self {
            engine: Arc::clone(&self.engine),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ResponseMeta {
    pub request_id: String,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub struct ApiError {
    pub error: ErrorBody,
    pub meta: ResponseMeta,
}

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub code: String,
    pub message: String,
}

#[derive(Debug, Serialize)]
struct HealthData {
    status: &'static str,
    timestamp: DateTime<Utc>,
}

impl ResponseMeta {
    pub(super) fn new(request_id: String) -> Self {
        Self {
            request_id,
            timestamp: Utc::now(),
        }
    }
}

impl ApiError {
    pub fn new(
        request_id: impl Into<String>,
        code: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            error: ErrorBody {
                code: code.into(),
                message: message.into(),
            },
            meta: ResponseMeta::new(request_id.into()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        let status = match self.error.code.as_str() {
            "bad_request" => StatusCode::BAD_REQUEST,
            "rate_limited" => StatusCode::TOO_MANY_REQUESTS,
            "site_unreachable" => StatusCode::BAD_GATEWAY,
            "service_unavailable" => StatusCode::SERVICE_UNAVAILABLE,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        (status, Json(self)).into_response()
    }
}

/// Maps an engine failure to the error envelope. Bad input is the caller's
/// fault; a missing browser is ours; anything else means the site could not
/// be reached.
pub(super) fn map_engine_error(request_id: String, error: &EngineError) -> ApiError {
    match error {
        EngineError::InvalidUrl { .. } | EngineError::EmptyQuery => {
            ApiError::new(request_id, "bad_request", error.to_string())
        }
        EngineError::SessionUnavailable { .. } => {
            tracing::error!(error = %error, "no browser session available");
            ApiError::new(request_id, "service_unavailable", error.to_string())
        }
        _ => {
            tracing::error!(error = %error, "engine request failed");
            ApiError::new(
                request_id,
                "site_unreachable",
                format!("Failed to access site: {error}"),
            )
        }
    }
}

/// `Json` body whose rejections (missing content type, malformed JSON,
/// wrong field types) come back as a `bad_request` envelope.
pub(super) struct ApiJson<T>(pub T);

impl<S, T> FromRequest<S> for ApiJson<T>
where
    S: Send + Sync,
    T: DeserializeOwned,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let req_id = req
            .extensions()
            .get::<RequestId>()
            .map_or_else(String::new, |id| id.0.clone());
        match Json::<T>::from_request(req, state).await {
            Ok(Json(value)) => Ok(Self(value)),
            Err(rejection) => Err(json_rejection(req_id, &rejection)),
        }
    }
}

fn json_rejection(request_id: String, rejection: &JsonRejection) -> ApiError {
    tracing::warn!(
        request_id = %request_id,
        status = rejection.status().as_u16(),
        error = %rejection.body_text(),
        "rejected request body"
    );
    ApiError::new(
        request_id,
        "bad_request",
        format!("Invalid request body: {}", rejection.body_text()),
    )
}

/// Trims `value` and rejects blank input with `message`.
pub(super) fn required<'a>(
    value: Option<&'a str>,
    request_id: &str,
    message: &str,
) -> Result<&'a str, ApiError> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .ok_or_else(|| ApiError::new(request_id, "bad_request", message))
}

fn build_cors() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(tower_http::cors::Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([
            header::CONTENT_TYPE,
            HeaderName::from_static(REQUEST_ID_HEADER),
        ])
}

fn engine_router<P>(rate_limit: RateLimitState) -> Router<AppState<P>>
where
    P: SessionProvider + 'static,
{
    Router::new()
        .route("/api/extract", post(product::extract_product::<P>))
        .route("/api/check-price", post(product::check_price::<P>))
        .route("/api/get-images", post(product::get_images::<P>))
        .route("/api/search-product", post(search::search_product::<P>))
        .layer(axum::middleware::from_fn_with_state(
            rate_limit,
            enforce_rate_limit,
        ))
}

pub fn build_app<P>(state: AppState<P>, rate_limit: RateLimitState) -> Router
where
    P: SessionProvider + 'static,
{
    Router::new()
        .route("/health", get(health))
        .merge(engine_router(rate_limit))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(build_cors())
                .layer(axum::middleware::from_fn(request_id)),
        )
        .with_state(state)
}

/// Liveness only; never touches the engine.
async fn health() -> Json<HealthData> {
    Json(HealthData {
        status: "healthy",
        timestamp: Utc::now(),
    })
}

pub fn default_rate_limit_state() -> RateLimitState {
    RateLimitState::new(30, Duration::from_secs(60))
}

#[cfg(test)]
#[path = "api_test.rs"]
mod tests;
