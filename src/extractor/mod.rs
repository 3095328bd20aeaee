//! Image URL extraction from listing page markup
//!
//! [`PageExtractor`] runs an ordered set of pattern strategies over raw
//! HTML and returns the union of their hits, highest-priority strategy
//! first, with set-semantics deduplication over normalized URLs. Every
//! candidate URL passes through the same relative-URL normalization.
//!
//! Patterns are compiled once at construction; building an extractor per
//! request would recompile six regexes for nothing.

use regex::Regex;
use serde_json::Value;
use tracing::debug;

use crate::errors::{AppError, AppResult};
use crate::models::{CandidateSource, ImageCandidate};
use crate::utils::url::{looks_like_image_url, normalize_image_url};

/// Substrings that mark UI chrome rather than listing photos
const DENYLIST: [&str; 5] = ["logo", "icon", "avatar", "btn_", "button"];

pub struct PageExtractor {
    site_origin: String,
    /// `<img>` with the framework-scoped full-property marker class
    marker_class_scoped: Regex,
    /// Same marker class without requiring the framework attribute
    marker_class_simple: Regex,
    /// Absolute blob-storage image URL anywhere in the markup
    storage_url: Regex,
    /// `og:image` meta tag
    og_image: Regex,
    /// Any `<img src>` with an image extension
    generic_img: Regex,
    /// JSON-LD script blocks
    json_ld: Regex,
}

impl PageExtractor {
    pub fn new(site_origin: &str) -> AppResult<Self> {
        let compile = |pattern: &str| {
            Regex::new(pattern)
                .map_err(|e| AppError::internal(format!("bad extraction pattern: {e}")))
        };

        Ok(Self {
            site_origin: site_origin.trim_end_matches('/').to_string(),
            marker_class_scoped: compile(
                r#"(?i)<img[^>]*_ngcontent[^>]*class=["'][^"']*img_property_full[^"']*["'][^>]*src=["']([^"']+)["']"#,
            )?,
            marker_class_simple: compile(
                r#"(?i)class=["'][^"']*img_property_full[^"']*["'][^>]*src=["']([^"']+)["']"#,
            )?,
            storage_url: compile(
                r#"https://[a-z0-9]+\.blob\.core\.windows\.net/[^"'\s<>]+\.(?:jpg|jpeg|png|webp)"#,
            )?,
            og_image: compile(
                r#"(?i)<meta\s+property=["']og:image["']\s+content=["']([^"']+)["']"#,
            )?,
            generic_img: compile(
                r#"(?i)<img[^>]+src=["']([^"']+\.(?:jpg|jpeg|png|webp)(?:\?[^"']*)?)["']"#,
            )?,
            json_ld: compile(
                r#"(?is)<script[^>]*type=["']application/ld\+json["'][^>]*>(.*?)</script>"#,
            )?,
        })
    }

    /// Run every strategy over the markup
    ///
    /// Strategy order fixes candidate priority; duplicates (after
    /// normalization) keep their first, highest-priority occurrence.
    pub fn extract(&self, html: &str) -> Vec<ImageCandidate> {
        let mut seen: Vec<String> = Vec::new();
        let mut candidates: Vec<ImageCandidate> = Vec::new();

        let mut push = |url: Option<String>, source: CandidateSource| {
            if let Some(url) = url {
                if !seen.contains(&url) {
                    seen.push(url.clone());
                    candidates.push(ImageCandidate::new(url, source));
                }
            }
        };

        for captures in self.marker_class_scoped.captures_iter(html) {
            push(self.normalize(&captures[1]), CandidateSource::MarkerClass);
        }
        for captures in self.marker_class_simple.captures_iter(html) {
            push(self.normalize(&captures[1]), CandidateSource::MarkerClass);
        }

        for m in self.storage_url.find_iter(html) {
            push(Some(m.as_str().to_string()), CandidateSource::StorageUrl);
        }

        if let Some(captures) = self.og_image.captures(html) {
            push(self.normalize(&captures[1]), CandidateSource::OgImage);
        }

        for captures in self.generic_img.captures_iter(html) {
            let raw = &captures[1];
            if self.is_denylisted(raw) {
                continue;
            }
            push(self.normalize(raw), CandidateSource::GenericImg);
        }

        for captures in self.json_ld.captures_iter(html) {
            if let Ok(value) = serde_json::from_str::<Value>(&captures[1]) {
                let mut leaves = Vec::new();
                collect_image_leaves(&value, &mut leaves);
                for leaf in leaves {
                    push(self.normalize(&leaf), CandidateSource::StructuredData);
                }
            }
        }

        debug!(count = candidates.len(), "extraction pass complete");
        candidates
    }

    fn normalize(&self, raw: &str) -> Option<String> {
        normalize_image_url(raw, &self.site_origin)
    }

    fn is_denylisted(&self, url: &str) -> bool {
        let lower = url.to_ascii_lowercase();
        DENYLIST.iter().any(|marker| lower.contains(marker))
    }
}

/// Recursively collect string leaves that look like image URLs
fn collect_image_leaves(value: &Value, out: &mut Vec<String>) {
    match value {
        Value::String(s) => {
            if looks_like_image_url(s) {
                out.push(s.clone());
            }
        }
        Value::Array(items) => {
            for item in items {
                collect_image_leaves(item, out);
            }
        }
        Value::Object(map) => {
            for item in map.values() {
                collect_image_leaves(item, out);
            }
        }
        _ => {}
    }
}
