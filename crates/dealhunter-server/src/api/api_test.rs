use std::time::Duration;

use axum::body::{to_bytes, Body};
use axum::http::Request;
use dealhunter_core::{PriceBounds, RetailerRegistry, SimilarityThreshold};
use dealhunter_scraper::{
    Analyzer, EngineSettings, HttpFetcher, LoadSignal, Navigation, PatternAnalyzer, RenderedPage,
    SearchSettings, Session,
};
use serde_json::{json, Value};
use tower::ServiceExt;

use super::*;

const WIDGET_PAGE: &str = r#"<html><body><h1>Acme Widget</h1>
    <span class="price">$19.99</span>
    <img src="/front.jpg" width="500" height="500"></body></html>"#;

/// Serves `WIDGET_PAGE` for any URL containing "widget"; everything else
/// times out. `available: false` simulates a host without a browser.
#[derive(Clone, Copy)]
struct StubProvider {
    available: bool,
}

struct StubSession;

impl Session for StubSession {
    async fn render(&mut self, url: &str, navigation: Navigation) -> Result<RenderedPage, EngineError> {
        if url.contains("widget") {
            Ok(RenderedPage::from_markup(url, WIDGET_PAGE))
        } else {
            Err(EngineError::NavigationTimeout {
                url: url.to_string(),
                timeout_secs: navigation.timeout.as_secs(),
            })
        }
    }

    async fn release(self) {}
}

impl SessionProvider for StubProvider {
    type Session = StubSession;

    async fn acquire(&self) -> Result<StubSession, EngineError> {
        if self.available {
            Ok(StubSession)
        } else {
            Err(EngineError::SessionUnavailable {
                reason: "no browser".to_string(),
            })
        }
    }
}

fn app_with(provider: StubProvider, rate_limit: RateLimitState) -> Router {
    let settings = EngineSettings {
        navigation: Navigation {
            timeout: Duration::from_secs(30),
            wait: LoadSignal::NetworkIdle,
        },
        search: SearchSettings {
            timeout: Duration::from_secs(15),
            threshold: SimilarityThreshold::default(),
            bounds: PriceBounds::default(),
        },
        bounds: PriceBounds::default(),
    };
    let fetcher = HttpFetcher::new(Duration::from_millis(500), "dealhunter-test/0.1", 0, 0)
        .expect("client builds");
    let engine = Engine::new(
        provider,
        Analyzer::Pattern(PatternAnalyzer),
        fetcher,
        RetailerRegistry::builtin(),
        settings,
    );
    build_app(AppState::new(engine), rate_limit)
}

fn app(available: bool) -> Router {
    app_with(StubProvider { available }, default_rate_limit_state())
}

fn post_json(uri: &str, body: &Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .expect("request")
}

async fn body_json(response: axum::response::Response) -> Value {
    let bytes = to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body");
    serde_json::from_slice(&bytes).expect("json body")
}

#[test]
fn api_error_codes_map_to_statuses() {
    let cases = [
        ("bad_request", StatusCode::BAD_REQUEST),
        ("site_unreachable", StatusCode::BAD_GATEWAY),
        ("service_unavailable", StatusCode::SERVICE_UNAVAILABLE),
        ("rate_limited", StatusCode::TOO_MANY_REQUESTS),
        ("anything_else", StatusCode::INTERNAL_SERVER_ERROR),
    ];
    for (code, status) in cases {
        assert_eq!(ApiError::new("req-1", code, "x").into_response().status(), status);
    }
}

#[test]
fn engine_errors_are_classified() {
    let unreachable = map_engine_error(
        "req-1".to_string(),
        &EngineError::NavigationTimeout {
            url: "https://shop.test/".to_string(),
            timeout_secs: 30,
        },
    );
    assert_eq!(unreachable.error.code, "site_unreachable");
    assert!(unreachable.error.message.starts_with("Failed to access site: "));

    let bad = map_engine_error("req-1".to_string(), &EngineError::EmptyQuery);
    assert_eq!(bad.error.code, "bad_request");
}

#[tokio::test]
async fn health_reports_healthy_without_touching_the_engine() {
    let response = app(false)
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.headers().contains_key("x-request-id"));
    let body = body_json(response).await;
    assert_eq!(body["status"], "healthy");
    assert!(body["timestamp"].is_string());
}

#[tokio::test]
async fn extract_returns_product_details() {
    let response = app(true)
        .oneshot(post_json(
            "/api/extract",
            &json!({ "url": "https://shop.example.com/widget" }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["name"], "Acme Widget");
    assert_eq!(body["price"], "19.99");
    assert_eq!(body["store"], "Other");
    assert_eq!(body["availability"], "In Stock");
    assert_eq!(body["imageUrl"], "https://shop.example.com/front.jpg");
}

#[tokio::test]
async fn extract_without_url_is_bad_request() {
    let response = app(true)
        .oneshot(post_json("/api/extract", &json!({ "url": "  " })))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = body_json(response).await;
    assert_eq!(body["error"]["code"], "bad_request");
    assert_eq!(body["error"]["message"], "URL is required");
}

#[tokio::test]
async fn unreachable_page_is_bad_gateway() {
    let response = app(true)
        .oneshot(post_json(
            "/api/extract",
            &json!({ "url": "https://shop.example.com/elsewhere" }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    let body = body_json(response).await;
    assert_eq!(body["error"]["code"], "site_unreachable");
}

#[tokio::test]
async fn check_price_accepts_numeric_prior_price() {
    let response = app(true)
        .oneshot(post_json(
            "/api/check-price",
            &json!({ "url": "https://shop.example.com/widget", "currentPrice": 24.99 }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["dealFound"], true);
    assert_eq!(body["name"], "Acme Widget");
}

#[tokio::test]
async fn check_price_without_prior_price_is_not_a_deal() {
    let response = app(true)
        .oneshot(post_json(
            "/api/check-price",
            &json!({ "url": "https://shop.example.com/widget" }),
        ))
        .await
        .unwrap();
    let body = body_json(response).await;
    assert_eq!(body["dealFound"], false);
}

#[tokio::test]
async fn get_images_returns_image_set() {
    let response = app(true)
        .oneshot(post_json(
            "/api/get-images",
            &json!({ "url": "https://shop.example.com/widget" }),
        ))
        .await
        .unwrap();
    let body = body_json(response).await;
    assert_eq!(body["images"], json!(["https://shop.example.com/front.jpg"]));
}

#[tokio::test]
async fn search_without_product_name_is_bad_request() {
    let response = app(true)
        .oneshot(post_json("/api/search-product", &json!({})))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = body_json(response).await;
    assert_eq!(body["error"]["message"], "Product name is required");
}

#[tokio::test]
async fn search_with_every_retailer_timing_out_is_empty() {
    let response = app(true)
        .oneshot(post_json(
            "/api/search-product",
            &json!({ "productName": "Acme Cordless Drill", "currentStore": "Amazon" }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await, json!({ "results": [] }));
}

#[tokio::test]
async fn search_without_browser_is_service_unavailable() {
    let response = app(false)
        .oneshot(post_json(
            "/api/search-product",
            &json!({ "productName": "Acme Cordless Drill" }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
}

#[tokio::test]
async fn rate_limit_rejects_excess_requests() {
    let app = app_with(
        StubProvider { available: true },
        RateLimitState::new(1, Duration::from_secs(60)),
    );
    let request = || post_json("/api/extract", &json!({ "url": "https://shop.example.com/widget" }));

    let first = app.clone().oneshot(request()).await.unwrap();
    assert_eq!(first.status(), StatusCode::OK);
    let second = app.oneshot(request()).await.unwrap();
    assert_eq!(second.status(), StatusCode::TOO_MANY_REQUESTS);
    assert!(second.headers().contains_key("retry-after"));
    let body = body_json(second).await;
    assert_eq!(body["error"]["code"], "rate_limited");
    assert!(body["meta"]["request_id"].is_string());
}

#[tokio::test]
async fn health_is_not_rate_limited() {
    let app = app_with(
        StubProvider { available: true },
        RateLimitState::new(0, Duration::from_secs(60)),
    );
    let response = app
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn request_id_header_is_echoed() {
    let response = app(true)
        .oneshot(
            Request::builder()
                .uri("/health")
                .header("x-request-id", "req-abc")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.headers()["x-request-id"], "req-abc");
}

#[tokio::test]
async fn malformed_body_gets_error_envelope() {
    let response = app(true)
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/extract")
                .header("content-type", "application/json")
                .header("x-request-id", "req-bad-body")
                .body(Body::from("{not json"))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = body_json(response).await;
    assert_eq!(body["error"]["code"], "bad_request");
    assert_eq!(body["meta"]["request_id"], "req-bad-body");
}

#[tokio::test]
async fn body_without_json_content_type_gets_error_envelope() {
    let response = app(true)
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/search-product")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = body_json(response).await;
    assert_eq!(body["error"]["code"], "bad_request");
}

#[tokio::test]
async fn wrong_typed_prior_price_is_not_a_deal() {
    let response = app(true)
        .oneshot(post_json(
            "/api/check-price",
            &json!({ "url": "https://shop.example.com/widget", "currentPrice": true }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["dealFound"], false);
    assert_eq!(body["price"], "19.99");
}
