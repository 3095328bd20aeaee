//! Resolution cascade
//!
//! [`ResolverService`] turns a property id into a [`Resolution`] by trying
//! strategies in fixed priority order and stopping at the first success:
//! feed lookup, listing-page extraction, storage probe (when enabled),
//! deterministic placeholder. Results are cached by value per property id.

pub mod probe;

use std::sync::Arc;
use std::time::Duration;

use serde::Deserialize;
use tracing::{debug, info, warn};

use crate::cache::TtlCache;
use crate::config::Config;
use crate::errors::AppResult;
use crate::extractor::PageExtractor;
use crate::feed::FeedService;
use crate::models::{FallbackReason, ImageCandidate, Resolution};
use crate::utils::HttpFetcher;

use probe::BlobProbe;

/// Response shape of the HTML-rendering proxy service
#[derive(Deserialize)]
struct RenderedPage {
    contents: String,
}

/// Served when the configured placeholder list is empty
const DEFAULT_PLACEHOLDER: &str =
    "https://via.placeholder.com/600x400/1a1a1a/ffffff?text=Propiedad";

#[derive(Clone)]
pub struct ResolverService {
    feed: FeedService,
    fetcher: HttpFetcher,
    extractor: Arc<PageExtractor>,
    probe: Arc<BlobProbe>,
    cache: Arc<TtlCache<Resolution>>,
    placeholders: Arc<Vec<String>>,
    listing_page_template: String,
    render_proxy_template: Option<String>,
}

impl ResolverService {
    pub fn new(config: &Config, feed: FeedService, fetcher: HttpFetcher) -> AppResult<Self> {
        let probe_fetcher = HttpFetcher::new(
            &config.upstream.user_agent,
            Duration::from_secs(config.probe.request_timeout_secs),
        )?;

        Ok(Self {
            feed,
            fetcher,
            extractor: Arc::new(PageExtractor::new(&config.upstream.site_origin)?),
            probe: Arc::new(BlobProbe::new(config.probe.clone(), probe_fetcher)),
            cache: Arc::new(TtlCache::new(Duration::from_secs(
                config.cache.resolution_ttl_secs,
            ))),
            placeholders: Arc::new(config.placeholders.clone()),
            listing_page_template: config.upstream.listing_page_template.clone(),
            render_proxy_template: config.upstream.render_proxy_template.clone(),
        })
    }

    /// Full cascade with cache consultation
    pub async fn resolve(&self, property_id: &str) -> Resolution {
        if let Some(cached) = self.cache.get(property_id).await {
            debug!(property_id, "resolution served from cache");
            return cached;
        }

        let resolution = self.resolve_uncached(property_id).await;
        self.cache.insert(property_id, resolution.clone()).await;
        resolution
    }

    async fn resolve_uncached(&self, property_id: &str) -> Resolution {
        let mut upstream_failed = false;

        match self.resolve_from_feed(property_id).await {
            Ok(Some(candidates)) => {
                info!(property_id, count = candidates.len(), "resolved via feed");
                return Resolution::found(property_id, candidates);
            }
            Ok(None) => debug!(property_id, "property absent from feed"),
            Err(err) => {
                warn!(property_id, error = %err, "feed lookup failed");
                upstream_failed = true;
            }
        }

        match self.resolve_from_page(property_id).await {
            Ok(candidates) if !candidates.is_empty() => {
                info!(
                    property_id,
                    count = candidates.len(),
                    "resolved via page extraction"
                );
                return Resolution::found(property_id, candidates);
            }
            Ok(_) => debug!(property_id, "page extraction found nothing"),
            Err(err) => {
                warn!(property_id, error = %err, "page extraction failed");
                upstream_failed = true;
            }
        }

        if self.probe.enabled() {
            let candidates = self.probe.probe(property_id).await;
            if !candidates.is_empty() {
                info!(property_id, count = candidates.len(), "resolved via probe");
                return Resolution::found(property_id, candidates);
            }
            debug!(property_id, "storage probe found nothing");
        }

        let reason = if upstream_failed {
            FallbackReason::UpstreamFailures
        } else {
            FallbackReason::NoStrategyMatched
        };
        Resolution::fallback(property_id, self.placeholder_for(property_id), reason)
    }

    /// Strategy 1: structured feed lookup
    pub async fn resolve_from_feed(
        &self,
        property_id: &str,
    ) -> AppResult<Option<Vec<ImageCandidate>>> {
        let property = self.feed.find_property(property_id).await?;
        Ok(property
            .map(|p| p.candidates())
            .filter(|candidates| !candidates.is_empty()))
    }

    /// Strategy 2: regex extraction over the listing page HTML
    pub async fn resolve_from_page(&self, property_id: &str) -> AppResult<Vec<ImageCandidate>> {
        let html = self.fetch_listing_page(property_id).await?;
        Ok(self.extractor.extract(&html))
    }

    /// Strategy 3: storage probe, exposed for the probe endpoint
    pub async fn resolve_from_probe(&self, property_id: &str) -> Option<Vec<ImageCandidate>> {
        if !self.probe.enabled() {
            return None;
        }
        Some(self.probe.probe(property_id).await)
    }

    /// Deterministic placeholder URL for a property id
    ///
    /// Index is the id's numeric value (digits only; FNV-style hash for
    /// non-numeric ids) modulo the placeholder count, so repeated calls
    /// for the same id are stable. Configs with an empty placeholder list
    /// get the built-in default.
    pub fn placeholder_for(&self, property_id: &str) -> String {
        if self.placeholders.is_empty() {
            return DEFAULT_PLACEHOLDER.to_string();
        }
        let digits: String = property_id.chars().filter(char::is_ascii_digit).collect();
        let index = digits
            .parse::<u64>()
            .unwrap_or_else(|_| {
                property_id
                    .bytes()
                    .fold(0xcbf2_9ce4_8422_2325u64, |acc, b| {
                        (acc ^ u64::from(b)).wrapping_mul(0x0100_0000_01b3)
                    })
            });
        let slot = (index % self.placeholders.len() as u64) as usize;
        self.placeholders[slot].clone()
    }

    async fn fetch_listing_page(&self, property_id: &str) -> AppResult<String> {
        let page_url = self.listing_page_template.replace("{id}", property_id);

        if let Some(template) = &self.render_proxy_template {
            let proxied = template.replace("{url}", &urlencoding::encode(&page_url));
            debug!(url = %proxied, "fetching listing page via render proxy");
            let rendered: RenderedPage = self.fetcher.fetch_json(&proxied).await?;
            return Ok(rendered.contents);
        }

        debug!(url = %page_url, "fetching listing page directly");
        self.fetcher
            .fetch_text(
                &page_url,
                "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8",
            )
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn service() -> ResolverService {
        let config = Config::default();
        let fetcher = HttpFetcher::new("test", Duration::from_secs(1)).unwrap();
        let feed = FeedService::new(
            fetcher.clone(),
            config.upstream.feed_url.clone(),
            Duration::from_secs(60),
        );
        ResolverService::new(&config, feed, fetcher).unwrap()
    }

    #[test]
    fn placeholder_is_deterministic_per_id() {
        let resolver = service();
        let first = resolver.placeholder_for("2950");
        for _ in 0..5 {
            assert_eq!(resolver.placeholder_for("2950"), first);
        }
    }

    #[test]
    fn placeholder_uses_numeric_modulo() {
        let resolver = service();
        let count = resolver.placeholders.len() as u64;
        // ids congruent modulo the list length share a placeholder
        let a = resolver.placeholder_for("1");
        let b = resolver.placeholder_for(&(1 + count).to_string());
        assert_eq!(a, b);
    }

    #[test]
    fn placeholder_handles_non_numeric_ids() {
        let resolver = service();
        let first = resolver.placeholder_for("TU-ABC");
        assert_eq!(resolver.placeholder_for("TU-ABC"), first);
        assert!(resolver.placeholders.contains(&first));
    }

    #[test]
    fn empty_placeholder_list_falls_back_to_default() {
        let mut config = Config::default();
        config.placeholders.clear();
        let fetcher = HttpFetcher::new("test", Duration::from_secs(1)).unwrap();
        let feed = FeedService::new(
            fetcher.clone(),
            config.upstream.feed_url.clone(),
            Duration::from_secs(60),
        );
        let resolver = ResolverService::new(&config, feed, fetcher).unwrap();
        assert_eq!(resolver.placeholder_for("2950"), DEFAULT_PLACEHOLDER);
    }

    #[test]
    fn probe_disabled_by_default() {
        let resolver = service();
        assert!(!resolver.probe.enabled());
    }
}
