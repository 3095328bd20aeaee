use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub web: WebConfig,
    pub upstream: UpstreamConfig,
    pub cache: CacheConfig,
    pub proxy: ProxyConfig,
    pub probe: ProbeConfig,
    /// Fixed ordered list of placeholder image URLs used when every
    /// resolution strategy fails.
    pub placeholders: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpstreamConfig {
    /// XML product feed published by the listing platform
    pub feed_url: String,
    /// Origin used to absolutize root-relative image URLs
    pub site_origin: String,
    /// Listing page URL, `{id}` is replaced with the property id
    pub listing_page_template: String,
    /// Optional HTML-rendering proxy, `{url}` is replaced with the
    /// percent-encoded listing page URL. The proxy answers JSON with the
    /// rendered markup in a `contents` field.
    pub render_proxy_template: Option<String>,
    pub user_agent: String,
    pub request_timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// TTL for the raw feed text
    pub feed_ttl_secs: u64,
    /// TTL for per-property resolution results
    pub resolution_ttl_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProxyConfig {
    pub request_timeout_secs: u64,
    /// Cache-Control max-age sent with successfully proxied images
    pub cache_max_age_secs: u64,
    pub retry_attempts: u32,
    pub retry_base_delay_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProbeConfig {
    /// The storage probe is a guess-and-check strategy with near-zero hit
    /// probability for unknown objects; it stays off unless a deployment
    /// has a populated `known_objects` table.
    pub enabled: bool,
    /// Base URL of the blob container holding per-listing images
    pub storage_base_url: String,
    pub request_timeout_secs: u64,
    pub max_probes: usize,
    /// Stop probing once this many objects were found
    pub required_hits: usize,
    /// Known object ids (36-char hyphenated hex) keyed by property id
    pub known_objects: HashMap<String, Vec<String>>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            web: WebConfig {
                host: "0.0.0.0".to_string(),
                port: 8080,
            },
            upstream: UpstreamConfig {
                feed_url: "https://2clicsalmcl.blob.core.windows.net/chile/xml/proppit/feed.xml"
                    .to_string(),
                site_origin: "https://cl.fichapublica.com".to_string(),
                listing_page_template: "https://www.tumatchpropiedades.cl/propiedad/{id}"
                    .to_string(),
                render_proxy_template: Some(
                    "https://api.allorigins.win/get?url={url}".to_string(),
                ),
                user_agent: "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36"
                    .to_string(),
                request_timeout_secs: 15,
            },
            cache: CacheConfig {
                feed_ttl_secs: 300,
                resolution_ttl_secs: 3600,
            },
            proxy: ProxyConfig {
                request_timeout_secs: 10,
                cache_max_age_secs: 86400,
                retry_attempts: 3,
                retry_base_delay_ms: 1000,
            },
            probe: ProbeConfig {
                enabled: false,
                storage_base_url:
                    "https://2clicsalmcl.blob.core.windows.net/chile/216/property-images"
                        .to_string(),
                request_timeout_secs: 3,
                max_probes: 30,
                required_hits: 2,
                known_objects: HashMap::new(),
            },
            placeholders: vec![
                "https://via.placeholder.com/600x400/1a1a1a/ffffff?text=Propiedad".to_string(),
                "https://via.placeholder.com/600x400/2a2a2a/ffffff?text=Imagen+No+Disponible"
                    .to_string(),
                "https://via.placeholder.com/600x400/3a3a3a/ffffff?text=Sin+Fotos".to_string(),
            ],
        }
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        let config_file =
            std::env::var("CONFIG_FILE").unwrap_or_else(|_| "config.toml".to_string());

        if std::path::Path::new(&config_file).exists() {
            let contents = std::fs::read_to_string(&config_file)?;
            Ok(toml::from_str(&contents)?)
        } else {
            let default_config = Self::default();
            let contents = toml::to_string_pretty(&default_config)?;
            std::fs::write(&config_file, contents)?;
            Ok(default_config)
        }
    }

    /// Expand the listing page template for a property id
    pub fn listing_page_url(&self, property_id: &str) -> String {
        self.upstream.listing_page_template.replace("{id}", property_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_round_trips_through_toml() {
        let config = Config::default();
        let serialized = toml::to_string_pretty(&config).unwrap();
        let parsed: Config = toml::from_str(&serialized).unwrap();
        assert_eq!(parsed.web.port, config.web.port);
        assert_eq!(parsed.cache.feed_ttl_secs, 300);
        assert_eq!(parsed.cache.resolution_ttl_secs, 3600);
        assert!(!parsed.probe.enabled);
        assert!(!parsed.placeholders.is_empty());
    }

    #[test]
    fn listing_page_url_substitutes_id() {
        let config = Config::default();
        let url = config.listing_page_url("2950");
        assert!(url.ends_with("/2950"));
        assert!(!url.contains("{id}"));
    }
}
