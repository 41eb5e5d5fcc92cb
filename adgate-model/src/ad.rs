//! Advertisement records and their validated form.
//!
//! The ad store hands out loosely typed [`AdRecord`]s: `occurrences` may be
//! missing on older documents and the URL is whatever an editor typed. All
//! defaulting and validation happens once, in [`AdDescriptor::from_record`];
//! the rest of the system only ever sees an [`AdDescriptor`].

use url::Url;

use crate::error::{ModelError, Result};
use crate::ids::AdId;

/// Upper bound on how many times a single ad may be served per gating
/// session.
pub const MAX_OCCURRENCES: u8 = 10;

/// Raw ad document as read from the content-ad association store.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct AdRecord {
    pub id: String,
    pub url: String,
    /// Absent on documents written before per-ad occurrences existed
    #[cfg_attr(feature = "serde", serde(default))]
    pub occurrences: Option<u32>,
    #[cfg_attr(feature = "serde", serde(default))]
    pub view_time_secs: Option<u32>,
    #[cfg_attr(feature = "serde", serde(default))]
    pub unlock_timer_secs: Option<u32>,
}

impl AdRecord {
    pub fn new(id: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            url: url.into(),
            ..Self::default()
        }
    }

    pub fn with_occurrences(mut self, occurrences: u32) -> Self {
        self.occurrences = Some(occurrences);
        self
    }

    pub fn with_view_time_secs(mut self, secs: u32) -> Self {
        self.view_time_secs = Some(secs);
        self
    }

    pub fn with_unlock_timer_secs(mut self, secs: u32) -> Self {
        self.unlock_timer_secs = Some(secs);
        self
    }
}

/// How many times an ad must be served, always within `1..=MAX_OCCURRENCES`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(try_from = "u32", into = "u32"))]
pub struct Occurrences(u8);

impl Occurrences {
    pub const ONE: Occurrences = Occurrences(1);

    pub fn new(value: u32) -> Option<Self> {
        if (1..=MAX_OCCURRENCES as u32).contains(&value) {
            Some(Self(value as u8))
        } else {
            None
        }
    }

    pub fn get(&self) -> u8 {
        self.0
    }
}

impl Default for Occurrences {
    fn default() -> Self {
        Self::ONE
    }
}

impl TryFrom<u32> for Occurrences {
    type Error = String;

    fn try_from(value: u32) -> std::result::Result<Self, Self::Error> {
        Occurrences::new(value).ok_or_else(|| {
            format!("occurrences must be within 1..={MAX_OCCURRENCES}, got {value}")
        })
    }
}

impl From<Occurrences> for u32 {
    fn from(value: Occurrences) -> Self {
        value.0 as u32
    }
}

/// Per-ad overrides of the gate's default timing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct TimingOverrides {
    /// Minimum time away from the page before a return counts as a view
    pub view_time_secs: Option<u32>,
    /// Length of the post-verification countdown
    pub unlock_timer_secs: Option<u32>,
}

/// A validated advertisement. Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct AdDescriptor {
    pub id: AdId,
    pub url: Url,
    pub occurrences: Occurrences,
    #[cfg_attr(feature = "serde", serde(default))]
    pub timing: TimingOverrides,
}

impl AdDescriptor {
    pub fn new(id: impl Into<String>, url: Url, occurrences: Occurrences) -> Self {
        Self {
            id: AdId::new(id),
            url,
            occurrences,
            timing: TimingOverrides::default(),
        }
    }

    /// Validates a raw store record.
    ///
    /// Missing `occurrences` defaults to one. The URL must be absolute,
    /// `http` or `https`, and carry a host.
    pub fn from_record(record: &AdRecord) -> Result<Self> {
        let id = record.id.trim();
        if id.is_empty() {
            return Err(ModelError::MissingAdId);
        }

        let url = parse_ad_url(id, &record.url)?;

        let occurrences = match record.occurrences {
            None => Occurrences::ONE,
            Some(value) => Occurrences::new(value).ok_or_else(|| {
                ModelError::OccurrencesOutOfRange {
                    ad: id.to_string(),
                    value,
                }
            })?,
        };

        Ok(Self {
            id: AdId::new(id),
            url,
            occurrences,
            timing: TimingOverrides {
                view_time_secs: record.view_time_secs,
                unlock_timer_secs: record.unlock_timer_secs,
            },
        })
    }
}

impl TryFrom<&AdRecord> for AdDescriptor {
    type Error = ModelError;

    fn try_from(record: &AdRecord) -> Result<Self> {
        AdDescriptor::from_record(record)
    }
}

fn parse_ad_url(ad: &str, raw: &str) -> Result<Url> {
    let invalid = |reason: String| ModelError::InvalidAdUrl {
        ad: ad.to_string(),
        reason,
    };

    let url = Url::parse(raw.trim()).map_err(|err| invalid(err.to_string()))?;

    match url.scheme() {
        "http" | "https" => {}
        other => return Err(invalid(format!("unsupported scheme `{other}`"))),
    }

    if url.host_str().is_none_or(str::is_empty) {
        return Err(invalid("missing host".to_string()));
    }

    Ok(url)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_occurrences_defaults_to_one() {
        let record = AdRecord::new("ad-1", "https://ads.example.com/a");
        let ad = AdDescriptor::from_record(&record).unwrap();

        assert_eq!(ad.occurrences, Occurrences::ONE);
        assert_eq!(ad.id.as_str(), "ad-1");
        assert_eq!(ad.url.host_str(), Some("ads.example.com"));
    }

    #[test]
    fn occurrences_outside_range_are_rejected() {
        let zero = AdRecord::new("a", "https://a.example").with_occurrences(0);
        let eleven =
            AdRecord::new("b", "https://b.example").with_occurrences(11);

        assert_eq!(
            AdDescriptor::from_record(&zero),
            Err(ModelError::OccurrencesOutOfRange {
                ad: "a".into(),
                value: 0
            })
        );
        assert!(matches!(
            AdDescriptor::from_record(&eleven),
            Err(ModelError::OccurrencesOutOfRange { value: 11, .. })
        ));

        let ten = AdRecord::new("c", "https://c.example").with_occurrences(10);
        assert_eq!(
            AdDescriptor::from_record(&ten).unwrap().occurrences.get(),
            10
        );
    }

    #[test]
    fn relative_and_non_http_urls_are_rejected() {
        for raw in ["/ads/1", "not a url", "javascript:alert(1)", "ftp://x.y/z"]
        {
            let record = AdRecord::new("ad", raw);
            assert!(
                matches!(
                    AdDescriptor::from_record(&record),
                    Err(ModelError::InvalidAdUrl { .. })
                ),
                "{raw} should be rejected"
            );
        }
    }

    #[test]
    fn blank_id_is_rejected() {
        let record = AdRecord::new("  ", "https://a.example");
        assert_eq!(
            AdDescriptor::from_record(&record),
            Err(ModelError::MissingAdId)
        );
    }

    #[test]
    fn timing_overrides_are_carried_over() {
        let record = AdRecord::new("ad", "https://a.example")
            .with_view_time_secs(12)
            .with_unlock_timer_secs(1);
        let ad = AdDescriptor::from_record(&record).unwrap();

        assert_eq!(ad.timing.view_time_secs, Some(12));
        assert_eq!(ad.timing.unlock_timer_secs, Some(1));
    }

    #[cfg(feature = "serde")]
    #[test]
    fn record_deserializes_without_optional_fields() {
        let record: AdRecord =
            serde_json::from_str(r#"{"id":"x","url":"https://x.example"}"#)
                .unwrap();
        assert_eq!(record.occurrences, None);
        assert_eq!(
            AdDescriptor::from_record(&record).unwrap().occurrences.get(),
            1
        );
    }
}
