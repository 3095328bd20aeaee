//! Image proxy
//!
//! Fetches an externally supplied image URL and re-serves the bytes with
//! CORS-open headers so portal `<img>` tags can load cross-origin assets.
//! Upstream failures and non-image payloads degrade to a generated SVG
//! placeholder served with status 200, so the consumer never renders a
//! broken-image icon.

use std::time::Duration;

use tracing::{info, warn};

use crate::config::ProxyConfig;
use crate::errors::{AppError, AppResult};
use crate::utils::url::validate_proxy_target;
use crate::utils::{HttpFetcher, RetryPolicy};

/// What the proxy hands back to the web layer
#[derive(Debug, Clone)]
pub struct ProxiedImage {
    pub body: Vec<u8>,
    pub content_type: String,
    pub cache_control: String,
    /// Upstream URL the bytes came from; None for generated placeholders
    pub proxied_from: Option<String>,
}

#[derive(Clone)]
pub struct ImageProxyService {
    fetcher: HttpFetcher,
    retry: RetryPolicy,
    cache_max_age_secs: u64,
}

impl ImageProxyService {
    pub fn new(config: &ProxyConfig, user_agent: &str) -> AppResult<Self> {
        let fetcher = HttpFetcher::new(
            user_agent,
            Duration::from_secs(config.request_timeout_secs),
        )?;
        Ok(Self {
            fetcher,
            retry: RetryPolicy::new(
                config.retry_attempts,
                Duration::from_millis(config.retry_base_delay_ms),
            ),
            cache_max_age_secs: config.cache_max_age_secs,
        })
    }

    /// Fetch and re-serve an image URL
    ///
    /// Returns `Err` only for caller mistakes (missing/invalid URL); every
    /// upstream problem is absorbed into the placeholder response.
    pub async fn fetch(&self, raw_url: &str) -> AppResult<ProxiedImage> {
        let url = validate_proxy_target(raw_url).map_err(AppError::invalid_input)?;
        let url = url.to_string();

        let fetched = self
            .retry
            .run(|| {
                let fetcher = self.fetcher.clone();
                let url = url.clone();
                async move { fetcher.fetch_bytes(&url).await }
            })
            .await;

        match fetched {
            Ok((body, content_type)) => {
                let content_type = content_type.unwrap_or_else(|| "image/jpeg".to_string());
                if !content_type.starts_with("image/") {
                    warn!(%url, %content_type, "upstream did not return an image");
                    return Ok(self.placeholder("Imagen no disponible"));
                }
                info!(%url, bytes = body.len(), "image proxied");
                Ok(ProxiedImage {
                    body,
                    content_type,
                    cache_control: format!("public, max-age={}", self.cache_max_age_secs),
                    proxied_from: Some(url),
                })
            }
            Err(err) => {
                warn!(%url, error = %err, "upstream image fetch failed");
                Ok(self.placeholder("Error cargando imagen"))
            }
        }
    }

    /// Generated SVG error image, served 200 and uncached
    fn placeholder(&self, message: &str) -> ProxiedImage {
        let svg = error_svg(message);
        ProxiedImage {
            body: svg.into_bytes(),
            content_type: "image/svg+xml".to_string(),
            cache_control: "no-cache".to_string(),
            proxied_from: None,
        }
    }
}

fn error_svg(message: &str) -> String {
    format!(
        r##"<svg width="400" height="300" xmlns="http://www.w3.org/2000/svg">
  <rect width="100%" height="100%" fill="#f3f4f6"/>
  <text x="50%" y="45%" text-anchor="middle" font-family="Arial" font-size="16" fill="#6b7280">{message}</text>
  <text x="50%" y="65%" text-anchor="middle" font-family="Arial" font-size="12" fill="#9ca3af">listing-image-proxy</text>
</svg>"##
    )
}
