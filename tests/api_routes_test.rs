use std::sync::Arc;
use std::time::Duration;

use axum::{
    body::Body,
    http::{Method, Request, StatusCode},
    Router,
};
use serde_json::{json, Value};
use tower::ServiceExt;

use listing_image_proxy::{
    config::Config,
    feed::FeedService,
    proxy::ImageProxyService,
    resolver::ResolverService,
    utils::code_match::CodeMatcher,
    utils::HttpFetcher,
    web::{AppState, WebServer},
};

fn build_app() -> Router {
    let config = Config::default();
    let fetcher = HttpFetcher::new(&config.upstream.user_agent, Duration::from_secs(1)).unwrap();
    let feed = FeedService::new(
        fetcher.clone(),
        config.upstream.feed_url.clone(),
        Duration::from_secs(60),
    );
    let resolver = ResolverService::new(&config, feed.clone(), fetcher).unwrap();
    let proxy = ImageProxyService::new(&config.proxy, &config.upstream.user_agent).unwrap();

    WebServer::create_router(AppState {
        config: Arc::new(config),
        resolver,
        feed,
        proxy,
        matcher: Arc::new(CodeMatcher::new().unwrap()),
    })
}

// Helper function to send requests to the app
async fn send_request(app: &Router, method: Method, uri: &str) -> (StatusCode, Value) {
    let request = Request::builder()
        .method(method)
        .uri(uri)
        .body(Body::empty())
        .unwrap();

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();

    let body_bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();

    let json: Value = if body_bytes.is_empty() {
        json!({})
    } else {
        serde_json::from_slice(&body_bytes).unwrap_or(json!({}))
    };

    (status, json)
}

#[tokio::test]
async fn test_health_endpoint() {
    let app = build_app();

    let (status, response) = send_request(&app, Method::GET, "/health").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(response["status"], "healthy");
    assert!(response.get("timestamp").is_some());
    assert!(response.get("version").is_some());
}

#[tokio::test]
async fn test_missing_property_id_is_rejected() {
    let app = build_app();

    for uri in [
        "/api/v1/images/resolve",
        "/api/v1/images/feed",
        "/api/v1/images/extract",
        "/api/v1/images/probe",
        "/api/v1/images/resolve?propertyId=",
        "/api/v1/images/feed?propertyId=%20%20",
    ] {
        let (status, response) = send_request(&app, Method::GET, uri).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "uri: {uri}");
        assert!(
            response["error"].as_str().unwrap().contains("propertyId"),
            "uri: {uri}, body: {response}"
        );
    }
}

#[tokio::test]
async fn test_missing_code_is_rejected() {
    let app = build_app();

    let (status, response) = send_request(&app, Method::GET, "/api/v1/images/by-code").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(response["error"].as_str().unwrap().contains("code"));
}

#[tokio::test]
async fn test_proxy_requires_url_parameter() {
    let app = build_app();

    let (status, response) = send_request(&app, Method::GET, "/proxy/image").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(response["error"].as_str().unwrap().contains("url"));

    let (status, _) = send_request(&app, Method::GET, "/proxy/image?url=").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_proxy_rejects_non_http_schemes() {
    let app = build_app();

    for target in ["ftp%3A%2F%2Fexample.com%2Fa.jpg", "file%3A%2F%2F%2Fetc%2Fpasswd"] {
        let uri = format!("/proxy/image?url={target}");
        let (status, response) = send_request(&app, Method::GET, &uri).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "target: {target}");
        assert!(response.get("error").is_some());
    }
}

#[tokio::test]
async fn test_unknown_route_is_404() {
    let app = build_app();

    let (status, _) = send_request(&app, Method::GET, "/api/v1/images/unknown").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_cors_headers_present() {
    let app = build_app();

    let request = Request::builder()
        .method(Method::GET)
        .uri("/health")
        .header("origin", "https://portal.example.com")
        .body(Body::empty())
        .unwrap();

    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert!(response
        .headers()
        .contains_key("access-control-allow-origin"));
}
