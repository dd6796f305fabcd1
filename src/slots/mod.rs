// src/slots/mod.rs — Canonical slot model
//
// Every payload variant the site has served is normalized into SlotRecord
// before anything else looks at it. The fingerprint is the dedup key used
// by change detection.

pub mod datetime;
pub mod normalize;

use chrono::{NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// A tracked restaurant / reservation target.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Listing {
    pub name: String,
    /// URL slug; doubles as the stable listing id.
    pub slug: String,
    /// Optional human-facing page, overriding the site's detail URL.
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default = "default_true")]
    pub enabled: bool,
}

fn default_true() -> bool {
    true
}

impl Listing {
    pub fn new(name: impl Into<String>, slug: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            slug: slug.into(),
            url: None,
            enabled: true,
        }
    }

    pub fn id(&self) -> &str {
        &self.slug
    }
}

/// One bookable reservation opportunity, normalized.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlotRecord {
    pub listing_id: String,
    pub date: NaiveDate,
    /// Minute resolution; seconds are always zero.
    pub time: NaiveTime,
    pub party_size: Option<u32>,
    /// Price in the site's currency (JPY), when the payload supplies one.
    pub price: Option<u64>,
    pub booking_url: Option<String>,
    pub fingerprint: String,
}

impl SlotRecord {
    /// Build a record from already-normalized parts; computes the fingerprint.
    pub fn new(
        listing_id: impl Into<String>,
        date: NaiveDate,
        time: NaiveTime,
        party_size: Option<u32>,
    ) -> Self {
        let listing_id = listing_id.into();
        let fingerprint = fingerprint(&listing_id, date, time, party_size);
        Self {
            listing_id,
            date,
            time,
            party_size,
            price: None,
            booking_url: None,
            fingerprint,
        }
    }

    pub fn with_price(mut self, price: Option<u64>) -> Self {
        self.price = price;
        self
    }

    pub fn with_booking_url(mut self, url: Option<String>) -> Self {
        self.booking_url = url;
        self
    }

    /// `YYYY-MM-DD`
    pub fn date_str(&self) -> String {
        self.date.format("%Y-%m-%d").to_string()
    }

    /// `HH:MM`
    pub fn time_str(&self) -> String {
        self.time.format("%H:%M").to_string()
    }
}

/// SHA-256 over the canonical `listing|date|time|party` string, hex encoded.
///
/// Price and booking URL are deliberately excluded: a price change on the
/// same slot is not a new slot.
pub fn fingerprint(
    listing_id: &str,
    date: NaiveDate,
    time: NaiveTime,
    party_size: Option<u32>,
) -> String {
    let party = party_size.map(|p| p.to_string()).unwrap_or_default();
    let canonical = format!(
        "{}|{}|{}|{}",
        listing_id,
        date.format("%Y-%m-%d"),
        time.format("%H:%M"),
        party
    );
    hex::encode(Sha256::digest(canonical.as_bytes()))
}
