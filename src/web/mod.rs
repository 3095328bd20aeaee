//! Web layer
//!
//! Thin axum handlers over the resolver, feed and proxy services. Every
//! response is CORS-open so portal front-ends on other origins can call
//! the API and embed proxied images directly.

use anyhow::Result;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde_json::json;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::cors::CorsLayer;

use crate::{
    config::Config,
    errors::{AppError, FetchError},
    feed::FeedService,
    proxy::ImageProxyService,
    resolver::ResolverService,
    utils::code_match::CodeMatcher,
};

pub mod api;

/// Web server configuration and setup
pub struct WebServer {
    app: Router,
    addr: SocketAddr,
}

impl WebServer {
    pub fn new(
        config: Config,
        resolver: ResolverService,
        feed: FeedService,
        proxy: ImageProxyService,
    ) -> Result<Self> {
        let addr: SocketAddr = format!("{}:{}", config.web.host, config.web.port).parse()?;

        let state = AppState {
            config: Arc::new(config),
            resolver,
            feed,
            proxy,
            matcher: Arc::new(CodeMatcher::new()?),
        };
        let app = Self::create_router(state);

        Ok(Self { app, addr })
    }

    /// Create the router with all routes and middleware
    pub fn create_router(state: AppState) -> Router {
        Router::new()
            .route("/health", get(api::health_check))
            .nest("/api/v1", Self::api_v1_routes())
            .route("/proxy/image", get(api::proxy_image))
            .layer(CorsLayer::permissive())
            .with_state(state)
    }

    fn api_v1_routes() -> Router<AppState> {
        Router::new()
            .route("/images/resolve", get(api::resolve_images))
            .route("/images/feed", get(api::feed_images))
            .route("/images/extract", get(api::extract_images))
            .route("/images/probe", get(api::probe_images))
            .route("/images/by-code", get(api::images_by_code))
            .route("/feed.xml", get(api::raw_feed))
    }

    /// Start the web server
    pub async fn serve(self) -> Result<()> {
        let listener = tokio::net::TcpListener::bind(&self.addr).await?;
        axum::serve(listener, self.app).await?;
        Ok(())
    }

    pub fn host(&self) -> String {
        self.addr.ip().to_string()
    }

    pub fn port(&self) -> u16 {
        self.addr.port()
    }
}

/// Application state shared across all handlers
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub resolver: ResolverService,
    pub feed: FeedService,
    pub proxy: ImageProxyService,
    pub matcher: Arc<CodeMatcher>,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match &self {
            AppError::InvalidInput { .. } => StatusCode::BAD_REQUEST,
            AppError::NotFound { .. } => StatusCode::NOT_FOUND,
            AppError::Fetch(FetchError::Timeout { .. }) => StatusCode::GATEWAY_TIMEOUT,
            AppError::Fetch(_) => StatusCode::BAD_GATEWAY,
            AppError::Configuration { .. }
            | AppError::Parse { .. }
            | AppError::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        };
        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}
