//! Blob-storage guess-and-probe
//!
//! Listing images live under a predictable path template
//! (`{base}/{year}/{month}/{object_id}.jpeg`) but the object ids are
//! opaque UUIDs. This strategy enumerates a bounded candidate set and
//! HEAD-checks each one. It only finds anything real when the deployment
//! has populated the known-object table: the synthetic ids are generated
//! deterministically from the property id and have effectively zero
//! chance of colliding with a stored object. Kept config-gated and off by
//! default; see DESIGN.md.

use chrono::{Datelike, Utc};

use crate::config::ProbeConfig;
use crate::models::{CandidateSource, ImageCandidate};
use crate::utils::HttpFetcher;

/// Month order used when guessing upload dates, most recent-ish first.
/// Mirrors the recency bias of the original search order.
const MONTH_PRIORITY: [i32; 15] = [9, 0, -1, -2, 10, 11, 12, 8, 7, 6, 5, 4, 3, 2, 1];

const SYNTHETIC_IDS_PER_PROPERTY: usize = 15;

pub struct BlobProbe {
    config: ProbeConfig,
    fetcher: HttpFetcher,
}

impl BlobProbe {
    pub fn new(config: ProbeConfig, fetcher: HttpFetcher) -> Self {
        Self { config, fetcher }
    }

    pub fn enabled(&self) -> bool {
        self.config.enabled
    }

    /// Probe the candidate space for a property, stopping after
    /// `max_probes` requests or `required_hits` hits.
    pub async fn probe(&self, property_id: &str) -> Vec<ImageCandidate> {
        let mut found = Vec::new();
        let mut tested = 0usize;

        let object_ids = self.candidate_object_ids(property_id);
        let now = Utc::now();

        'outer: for year in [now.year(), now.year() - 1] {
            for month in month_order(now.month() as i32) {
                for object_id in &object_ids {
                    if tested >= self.config.max_probes
                        || found.len() >= self.config.required_hits
                    {
                        break 'outer;
                    }

                    let url = format!(
                        "{}/{}/{}/{}.jpeg",
                        self.config.storage_base_url.trim_end_matches('/'),
                        year,
                        month,
                        object_id
                    );
                    tested += 1;

                    if self.fetcher.head_ok(&url).await {
                        tracing::info!(%url, "storage probe hit");
                        found.push(ImageCandidate::new(url, CandidateSource::StorageProbe));
                    }
                }
            }
        }

        tracing::debug!(tested, hits = found.len(), "storage probe finished");
        found
    }

    /// Known object ids for the property first, then synthetic ones
    pub fn candidate_object_ids(&self, property_id: &str) -> Vec<String> {
        let mut ids: Vec<String> = self
            .config
            .known_objects
            .get(property_id)
            .cloned()
            .unwrap_or_default();
        ids.extend(synthetic_object_ids(property_id));
        ids
    }
}

/// Months to try for a given current month: recency-biased fixed order,
/// deduplicated, clamped to 1..=12.
fn month_order(current: i32) -> Vec<i32> {
    let mut months = Vec::with_capacity(12);
    for slot in MONTH_PRIORITY {
        // 0 and negative slots are offsets from the current month
        let month = if slot <= 0 { current + slot } else { slot };
        if (1..=12).contains(&month) && !months.contains(&month) {
            months.push(month);
        }
    }
    months
}

/// Deterministic v4-shaped UUIDs seeded by the property id
///
/// A 64-bit multiplicative congruential generator feeds `uuid::Builder`,
/// which stamps the version and variant bits, so candidates are valid
/// object names and stable across calls.
fn synthetic_object_ids(property_id: &str) -> Vec<String> {
    let seed = property_id
        .bytes()
        .fold(0xcbf2_9ce4_8422_2325u64, |acc, b| {
            (acc ^ u64::from(b)).wrapping_mul(0x0100_0000_01b3)
        });

    let mut state = seed.max(1);
    let mut next = || {
        state = state
            .wrapping_mul(6_364_136_223_846_793_005)
            .wrapping_add(1_442_695_040_888_963_407);
        state
    };

    (0..SYNTHETIC_IDS_PER_PROPERTY)
        .map(|_| {
            let mut bytes = [0u8; 16];
            bytes[..8].copy_from_slice(&next().to_be_bytes());
            bytes[8..].copy_from_slice(&next().to_be_bytes());
            uuid::Builder::from_random_bytes(bytes).into_uuid().to_string()
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn synthetic_ids_are_deterministic() {
        let a = synthetic_object_ids("2950");
        let b = synthetic_object_ids("2950");
        assert_eq!(a, b);
        assert_eq!(a.len(), SYNTHETIC_IDS_PER_PROPERTY);
    }

    #[test]
    fn synthetic_ids_differ_per_property() {
        assert_ne!(synthetic_object_ids("2950"), synthetic_object_ids("2951"));
    }

    #[test]
    fn synthetic_ids_are_valid_v4_uuids() {
        for id in synthetic_object_ids("42") {
            let parsed = uuid::Uuid::parse_str(&id).unwrap();
            assert_eq!(parsed.get_version_num(), 4);
            assert_eq!(id.len(), 36);
        }
    }

    #[test]
    fn month_order_is_biased_and_deduplicated() {
        let months = month_order(9);
        // current month 9 collides with the fixed first slot
        assert_eq!(months[0], 9);
        let unique: std::collections::HashSet<_> = months.iter().collect();
        assert_eq!(unique.len(), months.len());
        assert!(months.iter().all(|m| (1..=12).contains(m)));
    }

    #[test]
    fn month_order_handles_january() {
        let months = month_order(1);
        // offsets below 1 are dropped rather than wrapped
        assert!(months.iter().all(|m| (1..=12).contains(m)));
        assert!(months.contains(&1));
    }

    #[test]
    fn known_objects_come_first() {
        let mut config = ProbeConfig {
            enabled: true,
            storage_base_url: "https://blob/base".to_string(),
            request_timeout_secs: 1,
            max_probes: 10,
            required_hits: 2,
            known_objects: std::collections::HashMap::new(),
        };
        config.known_objects.insert(
            "2950".to_string(),
            vec!["f23b1e02-83a2-4d1c-9d9b-2c77cee47ddc".to_string()],
        );
        let fetcher = HttpFetcher::new("test", std::time::Duration::from_secs(1)).unwrap();
        let probe = BlobProbe::new(config, fetcher);
        let ids = probe.candidate_object_ids("2950");
        assert_eq!(ids[0], "f23b1e02-83a2-4d1c-9d9b-2c77cee47ddc");
        assert_eq!(ids.len(), 1 + SYNTHETIC_IDS_PER_PROPERTY);
    }
}
