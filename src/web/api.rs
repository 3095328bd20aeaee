use axum::{
    extract::{Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use chrono::Utc;
use serde::Deserialize;
use serde_json::json;
use tracing::info;

use super::AppState;
use crate::errors::AppError;
use crate::models::Resolution;

#[derive(Debug, Deserialize)]
pub struct PropertyQuery {
    #[serde(rename = "propertyId")]
    pub property_id: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CodeQuery {
    pub code: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ProxyQuery {
    pub url: Option<String>,
}

/// Pull a non-empty `propertyId` out of the query string
fn require_property_id(query: &PropertyQuery) -> Result<String, AppError> {
    match query.property_id.as_deref().map(str::trim) {
        Some(id) if !id.is_empty() => Ok(id.to_string()),
        _ => Err(AppError::invalid_input(
            "missing required query parameter: propertyId",
        )),
    }
}

pub async fn health_check() -> Json<serde_json::Value> {
    Json(json!({
        "status": "healthy",
        "service": env!("CARGO_PKG_NAME"),
        "version": env!("CARGO_PKG_VERSION"),
        "timestamp": Utc::now().to_rfc3339(),
    }))
}

/// Full resolution cascade; always answers 200 because the cascade
/// absorbs every failure into a placeholder fallback.
pub async fn resolve_images(
    State(state): State<AppState>,
    Query(query): Query<PropertyQuery>,
) -> Result<Json<Resolution>, AppError> {
    let property_id = require_property_id(&query)?;
    Ok(Json(state.resolver.resolve(&property_id).await))
}

/// Feed-only lookup; an absent property is a valid answer, not an error
pub async fn feed_images(
    State(state): State<AppState>,
    Query(query): Query<PropertyQuery>,
) -> Result<Json<serde_json::Value>, AppError> {
    let property_id = require_property_id(&query)?;

    let body = match state.feed.find_property(&property_id).await? {
        Some(property) => json!({
            "success": true,
            "propertyId": property_id,
            "images": property.candidates(),
        }),
        None => json!({
            "success": false,
            "propertyId": property_id,
            "images": [],
        }),
    };
    Ok(Json(body))
}

/// Listing-page extraction only
pub async fn extract_images(
    State(state): State<AppState>,
    Query(query): Query<PropertyQuery>,
) -> Result<Json<serde_json::Value>, AppError> {
    let property_id = require_property_id(&query)?;
    let images = state.resolver.resolve_from_page(&property_id).await?;
    Ok(Json(json!({
        "propertyId": property_id,
        "images": images,
    })))
}

/// Storage probe only; answers 404 when the probe is disabled
pub async fn probe_images(
    State(state): State<AppState>,
    Query(query): Query<PropertyQuery>,
) -> Result<Response, AppError> {
    let property_id = require_property_id(&query)?;

    match state.resolver.resolve_from_probe(&property_id).await {
        Some(images) => Ok(Json(json!({
            "propertyId": property_id,
            "images": images,
        }))
        .into_response()),
        None => Ok((
            StatusCode::NOT_FOUND,
            Json(json!({ "error": "storage probe is disabled" })),
        )
            .into_response()),
    }
}

/// Fuzzy code lookup over the feed index
pub async fn images_by_code(
    State(state): State<AppState>,
    Query(query): Query<CodeQuery>,
) -> Result<Json<serde_json::Value>, AppError> {
    let code = match query.code.as_deref().map(str::trim) {
        Some(code) if !code.is_empty() => code.to_string(),
        _ => {
            return Err(AppError::invalid_input(
                "missing required query parameter: code",
            ))
        }
    };

    let index = state.feed.property_index().await?;
    let Some(matched) = state
        .matcher
        .find_match(&code, index.iter().map(|p| p.id.as_str()))
    else {
        return Err(AppError::not_found("property matching code", &code));
    };

    info!(code = %code, property_id = %matched.id, "code matched");

    let images = index
        .iter()
        .find(|p| p.id == matched.id)
        .map(|p| p.candidates())
        .unwrap_or_default();

    Ok(Json(json!({
        "success": true,
        "code": code,
        "match": matched,
        "images": images,
    })))
}

/// Raw feed passthrough, served from the feed cache
pub async fn raw_feed(State(state): State<AppState>) -> Result<Response, AppError> {
    let xml = state.feed.raw_feed().await?;
    Ok((
        [(header::CONTENT_TYPE, "application/xml; charset=utf-8")],
        xml,
    )
        .into_response())
}

/// Binary image proxy
pub async fn proxy_image(
    State(state): State<AppState>,
    Query(query): Query<ProxyQuery>,
) -> Result<Response, AppError> {
    let url = match query.url.as_deref().map(str::trim) {
        Some(url) if !url.is_empty() => url.to_string(),
        _ => {
            return Err(AppError::invalid_input(
                "missing required query parameter: url",
            ))
        }
    };

    let image = state.proxy.fetch(&url).await?;

    let mut response = Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, &image.content_type)
        .header(header::CACHE_CONTROL, &image.cache_control);
    if let Some(origin) = &image.proxied_from {
        response = response.header("x-proxied-from", origin);
    }
    response
        .body(axum::body::Body::from(image.body))
        .map_err(|e| AppError::internal(format!("response build failed: {e}")))
}
