//! Ad queue construction.
//!
//! The play order must come out identical wherever it is computed for the
//! same content (pre-render and client, or two clients), so the shuffle uses
//! a seeded sine-based source instead of a system RNG.

use std::sync::Arc;

use adgate_model::{AdDescriptor, AdQueue, AdRecord, ContentId, QueueEntry};
use tracing::{debug, warn};

/// Numeric shuffle seed derived from a seed string: the sum of its UTF-16
/// code units.
pub fn seed_from_str(seed: &str) -> u64 {
    seed.encode_utf16().map(u64::from).sum()
}

pub fn seed_for_content(content: &ContentId) -> u64 {
    seed_from_str(content.as_str())
}

/// `fract(sin(seed + index) * 10000)`, in `[0, 1)`.
fn seeded_unit(seed: u64, index: usize) -> f64 {
    let x = ((seed + index as u64) as f64).sin() * 10_000.0;
    x - x.floor()
}

/// Expands `ads` into one entry per required occurrence and shuffles them
/// deterministically by `seed`.
pub fn build_queue(ads: &[AdDescriptor], seed: &str) -> AdQueue {
    build_queue_seeded(ads, seed_from_str(seed))
}

pub fn build_queue_seeded(ads: &[AdDescriptor], seed: u64) -> AdQueue {
    let mut entries: Vec<QueueEntry> = ads
        .iter()
        .flat_map(|ad| {
            let ad = Arc::new(ad.clone());
            (1..=ad.occurrences.get())
                .map(move |n| QueueEntry::new(Arc::clone(&ad), n))
        })
        .collect();

    for i in (1..entries.len()).rev() {
        let j = ((seeded_unit(seed, i) * (i + 1) as f64).floor() as usize).min(i);
        entries.swap(i, j);
    }

    debug!(
        target: "adgate::queue",
        ads = ads.len(),
        entries = entries.len(),
        seed,
        "built ad queue"
    );

    AdQueue::from(entries)
}

/// Validates raw store records, dropping the ones that cannot be served.
///
/// One bad record should cost one ad, not all playback, so failures are
/// logged and skipped.
pub fn descriptors_from_records(records: &[AdRecord]) -> Vec<AdDescriptor> {
    records
        .iter()
        .filter_map(|record| match AdDescriptor::from_record(record) {
            Ok(ad) => Some(ad),
            Err(err) => {
                warn!(
                    target: "adgate::queue",
                    ad = %record.id,
                    error = %err,
                    "skipping invalid ad record"
                );
                None
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use adgate_model::Occurrences;
    use std::collections::HashMap;
    use url::Url;

    fn ad(id: &str, occurrences: u32) -> AdDescriptor {
        AdDescriptor::new(
            id,
            Url::parse(&format!("https://{id}.example/")).unwrap(),
            Occurrences::new(occurrences).unwrap(),
        )
    }

    #[test]
    fn seed_sums_code_units() {
        assert_eq!(seed_from_str(""), 0);
        assert_eq!(seed_from_str("ep1"), 101 + 112 + 49);
        // U+1F600 is a surrogate pair: 0xD83D + 0xDE00
        assert_eq!(seed_from_str("\u{1F600}"), 0xD83D + 0xDE00);
    }

    #[test]
    fn seeded_unit_stays_in_unit_interval() {
        for seed in [0_u64, 1, 310, 99_999, u32::MAX as u64] {
            for index in 0..64 {
                let value = seeded_unit(seed, index);
                assert!((0.0..1.0).contains(&value), "{seed}/{index}: {value}");
            }
        }
    }

    #[test]
    fn empty_ads_give_empty_queue() {
        assert!(build_queue(&[], "anything").is_empty());
    }

    #[test]
    fn queue_length_is_sum_of_occurrences() {
        let ads = vec![ad("a", 3), ad("b", 1), ad("c", 10)];
        let queue = build_queue(&ads, "movie-42");
        assert_eq!(queue.len(), 14);

        let mut per_ad: HashMap<&str, Vec<u8>> = HashMap::new();
        for entry in &queue {
            per_ad
                .entry(entry.ad.id.as_str())
                .or_default()
                .push(entry.sequence_index);
        }
        for (id, expected) in [("a", 3_u8), ("b", 1), ("c", 10)] {
            let mut seen = per_ad.remove(id).unwrap();
            seen.sort_unstable();
            assert_eq!(seen, (1..=expected).collect::<Vec<_>>());
        }
    }

    #[test]
    fn same_seed_gives_same_order() {
        let ads = vec![ad("a", 2), ad("b", 3), ad("c", 1)];
        let first = build_queue(&ads, "episode-7");
        let second = build_queue(&ads, "episode-7");
        assert_eq!(first, second);
    }

    #[test]
    fn single_ad_two_occurrences() {
        let ads = vec![AdDescriptor::new(
            "a",
            Url::parse("https://a").unwrap(),
            Occurrences::new(2).unwrap(),
        )];
        let queue = build_queue(&ads, "ep1");

        assert_eq!(queue.len(), 2);
        assert!(queue.iter().all(|entry| entry.ad.id.as_str() == "a"));
        let mut indexes: Vec<u8> =
            queue.iter().map(|entry| entry.sequence_index).collect();
        indexes.sort_unstable();
        assert_eq!(indexes, vec![1, 2]);
    }

    #[test]
    fn invalid_records_are_skipped() {
        let records = vec![
            AdRecord::new("ok", "https://ok.example"),
            AdRecord::new("bad-url", "ok.example/no-scheme"),
            AdRecord::new("too-many", "https://x.example").with_occurrences(50),
            AdRecord::new("twice", "https://twice.example").with_occurrences(2),
        ];

        let ads = descriptors_from_records(&records);
        let ids: Vec<&str> = ads.iter().map(|ad| ad.id.as_str()).collect();
        assert_eq!(ids, vec!["ok", "twice"]);
    }
}
