//! XML product feed access
//!
//! The listing platform publishes a feed of `<property>` records on blob
//! storage. [`FeedService`] fetches it through a short raw-text TTL cache
//! and parses records on demand with `quick-xml` events.

use std::sync::Arc;
use std::time::Duration;

use quick_xml::events::Event;
use quick_xml::Reader;
use tracing::{debug, info};

use crate::cache::TtlCache;
use crate::errors::{AppError, AppResult};
use crate::models::FeedProperty;
use crate::utils::HttpFetcher;

const FEED_CACHE_KEY: &str = "feed";

#[derive(Clone)]
pub struct FeedService {
    fetcher: HttpFetcher,
    feed_url: String,
    cache: Arc<TtlCache<String>>,
}

impl FeedService {
    pub fn new(fetcher: HttpFetcher, feed_url: String, ttl: Duration) -> Self {
        Self {
            fetcher,
            feed_url,
            cache: Arc::new(TtlCache::new(ttl)),
        }
    }

    /// Raw feed text, from cache when fresh
    pub async fn raw_feed(&self) -> AppResult<String> {
        if let Some(cached) = self.cache.get(FEED_CACHE_KEY).await {
            debug!("serving feed from cache");
            return Ok(cached);
        }

        info!(url = %self.feed_url, "downloading XML feed");
        let body = self
            .fetcher
            .fetch_text(&self.feed_url, "application/xml, text/xml, */*")
            .await?;
        info!(bytes = body.len(), "feed downloaded");
        self.cache.insert(FEED_CACHE_KEY, body.clone()).await;
        Ok(body)
    }

    /// Locate one property record by exact id match
    pub async fn find_property(&self, property_id: &str) -> AppResult<Option<FeedProperty>> {
        let xml = self.raw_feed().await?;
        let mut properties = parse_feed(&xml, Some(property_id))?;
        Ok(properties.pop())
    }

    /// Every property record in document order (for fuzzy code lookup)
    pub async fn property_index(&self) -> AppResult<Vec<FeedProperty>> {
        let xml = self.raw_feed().await?;
        parse_feed(&xml, None)
    }
}

/// Parse `<property>` records out of the feed
///
/// When `wanted_id` is set, parsing stops at the first record whose `<id>`
/// matches exactly (after trimming) and only that record is returned.
fn parse_feed(xml: &str, wanted_id: Option<&str>) -> AppResult<Vec<FeedProperty>> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut properties = Vec::new();
    let mut current: Option<FeedProperty> = None;
    let mut text_target: Option<Field> = None;

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => match e.name().as_ref() {
                b"property" => current = Some(FeedProperty::default()),
                b"id" if current.is_some() => text_target = Some(Field::Id),
                b"image" if current.is_some() => text_target = Some(Field::Image),
                b"main_image" if current.is_some() => text_target = Some(Field::MainImage),
                _ => {}
            },
            Ok(Event::Text(e)) => {
                if let (Some(property), Some(field)) = (current.as_mut(), text_target) {
                    let text = e
                        .unescape()
                        .map_err(|err| AppError::parse("feed", err.to_string()))?
                        .trim()
                        .to_string();
                    if !text.is_empty() {
                        match field {
                            // <id> can appear on nested elements too; the
                            // record id is the first one seen
                            Field::Id => {
                                if property.id.is_empty() {
                                    property.id = text;
                                }
                            }
                            Field::Image => property.images.push(text),
                            Field::MainImage => property.main_image = Some(text),
                        }
                    }
                }
            }
            Ok(Event::End(e)) => match e.name().as_ref() {
                b"property" => {
                    if let Some(property) = current.take() {
                        let matches = wanted_id.map_or(true, |id| property.id == id);
                        if matches {
                            properties.push(property);
                            if wanted_id.is_some() {
                                break;
                            }
                        }
                    }
                }
                b"id" | b"image" | b"main_image" => text_target = None,
                _ => {}
            },
            Ok(Event::Eof) => break,
            Err(err) => return Err(AppError::parse("feed", err.to_string())),
            _ => {}
        }
    }

    Ok(properties)
}

#[derive(Clone, Copy)]
enum Field {
    Id,
    Image,
    MainImage,
}

#[cfg(test)]
mod tests {
    use super::*;

    const FEED: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<properties>
  <property>
    <id> 2950 </id>
    <title>Casa en Providencia</title>
    <main_image>https://blob/chile/216/property-images/2024/9/cover.jpeg</main_image>
    <image>https://blob/chile/216/property-images/2024/9/a.jpeg</image>
    <image>https://blob/chile/216/property-images/2024/9/b.jpeg</image>
  </property>
  <property>
    <id>3001</id>
    <image>https://blob/chile/216/property-images/2024/10/c.jpeg</image>
  </property>
</properties>"#;

    #[test]
    fn finds_property_by_exact_id() {
        let found = parse_feed(FEED, Some("2950")).unwrap();
        assert_eq!(found.len(), 1);
        let property = &found[0];
        assert_eq!(property.id, "2950");
        assert_eq!(property.images.len(), 2);
        assert_eq!(
            property.main_image.as_deref(),
            Some("https://blob/chile/216/property-images/2024/9/cover.jpeg")
        );
    }

    #[test]
    fn missing_id_yields_empty() {
        let found = parse_feed(FEED, Some("9999")).unwrap();
        assert!(found.is_empty());
    }

    #[test]
    fn index_preserves_document_order() {
        let all = parse_feed(FEED, None).unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].id, "2950");
        assert_eq!(all[1].id, "3001");
        assert_eq!(all[1].main_image, None);
    }

    #[test]
    fn id_whitespace_is_trimmed() {
        let found = parse_feed(FEED, Some("2950")).unwrap();
        assert_eq!(found[0].id, "2950");
    }
}
