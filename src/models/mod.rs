//! Core data types shared across the resolver, feed and web layers

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Tag naming the pattern or strategy that produced an image URL
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CandidateSource {
    /// `<main_image>` element of a feed record
    FeedMain,
    /// `<image>` element of a feed record
    Feed,
    /// `<img>` tag carrying the full-property marker class
    MarkerClass,
    /// Absolute blob-storage URL found anywhere in the markup
    StorageUrl,
    /// `og:image` meta tag
    OgImage,
    /// Any `<img src>` with an image extension that passed the denylist
    GenericImg,
    /// String leaf collected from a JSON-LD script block
    StructuredData,
    /// HEAD-probed blob-storage object
    StorageProbe,
    /// Static fallback
    Placeholder,
}

/// A single plausible image URL, tagged with its origin
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageCandidate {
    pub url: String,
    pub source: CandidateSource,
    #[serde(default)]
    pub is_main: bool,
}

impl ImageCandidate {
    pub fn new(url: impl Into<String>, source: CandidateSource) -> Self {
        Self {
            url: url.into(),
            source,
            is_main: false,
        }
    }

    pub fn main(url: impl Into<String>, source: CandidateSource) -> Self {
        Self {
            url: url.into(),
            source,
            is_main: true,
        }
    }
}

/// Why a resolution ended in the fallback branch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FallbackReason {
    /// Property absent from the feed and no page/probe strategy hit
    NoStrategyMatched,
    /// Every strategy errored out (upstreams unreachable)
    UpstreamFailures,
}

/// Outcome of the resolution cascade for one property id
///
/// Cached by value in the resolution cache. `Found` upholds the invariant
/// that the main image is the first element of `images` and is the only
/// element tagged `is_main`.
#[derive(Debug, Clone)]
pub enum Resolution {
    Found {
        property_id: String,
        images: Vec<ImageCandidate>,
        resolved_at: DateTime<Utc>,
    },
    Fallback {
        property_id: String,
        placeholder: ImageCandidate,
        reason: FallbackReason,
        resolved_at: DateTime<Utc>,
    },
}

/// Flat wire form of a [`Resolution`]
///
/// Consumers get a `success` flag to branch on and the main image pulled
/// out as its own field, alongside the `status` tag.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ResolutionWire<'a> {
    status: &'static str,
    success: bool,
    property_id: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    images: Option<&'a [ImageCandidate]>,
    #[serde(skip_serializing_if = "Option::is_none")]
    placeholder: Option<&'a ImageCandidate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    main_image: Option<&'a ImageCandidate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    reason: Option<FallbackReason>,
    resolved_at: &'a DateTime<Utc>,
}

impl Serialize for Resolution {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let wire = match self {
            Self::Found {
                property_id,
                images,
                resolved_at,
            } => ResolutionWire {
                status: "found",
                success: true,
                property_id,
                images: Some(images),
                placeholder: None,
                main_image: images.first(),
                reason: None,
                resolved_at,
            },
            Self::Fallback {
                property_id,
                placeholder,
                reason,
                resolved_at,
            } => ResolutionWire {
                status: "fallback",
                success: false,
                property_id,
                images: None,
                placeholder: Some(placeholder),
                main_image: Some(placeholder),
                reason: Some(*reason),
                resolved_at,
            },
        };
        wire.serialize(serializer)
    }
}

impl Resolution {
    /// Build a `Found` resolution, enforcing the main-image invariant:
    /// exactly one candidate is tagged main and it sits at index 0.
    pub fn found(property_id: impl Into<String>, mut images: Vec<ImageCandidate>) -> Self {
        if let Some(pos) = images.iter().position(|c| c.is_main) {
            if pos != 0 {
                let main = images.remove(pos);
                images.insert(0, main);
            }
        } else if let Some(first) = images.first_mut() {
            first.is_main = true;
        }
        for candidate in images.iter_mut().skip(1) {
            candidate.is_main = false;
        }
        Self::Found {
            property_id: property_id.into(),
            images,
            resolved_at: Utc::now(),
        }
    }

    pub fn fallback(
        property_id: impl Into<String>,
        placeholder_url: impl Into<String>,
        reason: FallbackReason,
    ) -> Self {
        Self::Fallback {
            property_id: property_id.into(),
            placeholder: ImageCandidate::main(placeholder_url, CandidateSource::Placeholder),
            reason,
            resolved_at: Utc::now(),
        }
    }

    pub fn is_found(&self) -> bool {
        matches!(self, Self::Found { .. })
    }

    pub fn property_id(&self) -> &str {
        match self {
            Self::Found { property_id, .. } | Self::Fallback { property_id, .. } => property_id,
        }
    }

    /// The main image: first element of `images` for `Found`, the
    /// placeholder for `Fallback`.
    pub fn main_image(&self) -> Option<&ImageCandidate> {
        match self {
            Self::Found { images, .. } => images.first(),
            Self::Fallback { placeholder, .. } => Some(placeholder),
        }
    }
}

/// One listing record parsed out of the XML product feed
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FeedProperty {
    pub id: String,
    pub images: Vec<String>,
    pub main_image: Option<String>,
}

impl FeedProperty {
    /// Candidate list in feed order with the main image first
    ///
    /// The `<main_image>` is prepended (tagged main) when it is not already
    /// among the `<image>` children; when it is, that entry is promoted.
    pub fn candidates(&self) -> Vec<ImageCandidate> {
        let mut candidates: Vec<ImageCandidate> = self
            .images
            .iter()
            .map(|url| ImageCandidate::new(url.clone(), CandidateSource::Feed))
            .collect();

        if let Some(main) = &self.main_image {
            if let Some(pos) = candidates.iter().position(|c| &c.url == main) {
                let mut promoted = candidates.remove(pos);
                promoted.is_main = true;
                promoted.source = CandidateSource::FeedMain;
                candidates.insert(0, promoted);
            } else {
                candidates.insert(
                    0,
                    ImageCandidate::main(main.clone(), CandidateSource::FeedMain),
                );
            }
        } else if let Some(first) = candidates.first_mut() {
            first.is_main = true;
        }

        candidates
    }
}
