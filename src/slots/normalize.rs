// src/slots/normalize.rs — Heterogeneous payload → canonical SlotRecords
//
// The availability API has changed shape several times. Rather than
// guessing at call sites, every known shape is recognized here:
//
//   1. flat list            [ {date, time, ...}, ... ]
//   2. grouped by date      { "2024-06-01": [ {time, ...} ], ... }
//   3. nested container     { "data": <1 or 2 or 3> }   (fixed key priority)
//   4. field aliases        per-field priority tables below
//   5. empty                null / [] / {} / empty container
//
// Anything else is a ParseError. Output order follows the source: array
// order, and for grouped payloads the key order of the JSON object
// (serde_json is built with `preserve_order`).

use chrono::{NaiveDate, NaiveTime, Timelike};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

use super::datetime::{looks_like_date, parse_date, parse_datetime, parse_time};
use super::SlotRecord;
use crate::infra::errors::ParseError;

/// Container keys, tried in this order at every nesting level.
pub const CONTAINER_KEYS: &[&str] = &[
    "slots",
    "data",
    "results",
    "time_slots",
    "availability",
    "online_stock_groups",
];

pub const DATE_ALIASES: &[&str] = &["date", "day", "booking_date", "reservation_date"];

pub const TIME_ALIASES: &[&str] = &["time", "start_time", "booking_time", "reservation_time"];

/// Combined timestamps; fallback source for both date and time.
pub const DATETIME_ALIASES: &[&str] = &[
    "datetime",
    "date_time",
    "start_at",
    "starts_at",
    "start_datetime",
];

pub const PARTY_SIZE_ALIASES: &[&str] = &[
    "party_size",
    "seat",
    "seats",
    "available_seats",
    "capacity",
    "available",
];

pub const PRICE_ALIASES: &[&str] = &["price", "amount", "cost", "price_amount"];

pub const URL_ALIASES: &[&str] = &[
    "booking_url",
    "url",
    "link",
    "reservation_url",
    "booking_link",
];

/// Containers nested deeper than this are not unwrapped.
const MAX_DEPTH: usize = 8;

/// What to do with a slot object whose date or time cannot be resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MissingFieldPolicy {
    /// One bad object voids the whole batch.
    #[default]
    FailClosed,
    /// Bad objects are logged and skipped.
    FailOpen,
}

/// Which recognized shape a payload had.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShapeKind {
    Empty,
    FlatList,
    GroupedByDate,
}

/// Shape plus the container keys that were unwrapped to reach it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShapeSummary {
    pub kind: ShapeKind,
    pub container_path: Vec<&'static str>,
}

impl fmt::Display for ShapeSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = match self.kind {
            ShapeKind::Empty => "empty",
            ShapeKind::FlatList => "flat list",
            ShapeKind::GroupedByDate => "grouped by date",
        };
        if self.container_path.is_empty() {
            write!(f, "{kind}")
        } else {
            write!(f, "{kind} under '{}'", self.container_path.join("."))
        }
    }
}

/// Full result of a normalization run.
#[derive(Debug, Clone)]
pub struct Normalized {
    pub records: Vec<SlotRecord>,
    /// Objects dropped under `FailOpen`. Always empty under `FailClosed`.
    pub skipped: Vec<ParseError>,
    pub shape: ShapeSummary,
}

enum Shape<'a> {
    Empty,
    Flat(&'a [Value]),
    Grouped(Vec<(&'a str, &'a Value)>),
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ResponseNormalizer {
    policy: MissingFieldPolicy,
}

impl ResponseNormalizer {
    pub fn new(policy: MissingFieldPolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> MissingFieldPolicy {
        self.policy
    }

    /// Normalize `payload` into records for `listing_id`.
    pub fn normalize(&self, listing_id: &str, payload: &Value) -> Result<Vec<SlotRecord>, ParseError> {
        self.normalize_detailed(listing_id, payload)
            .map(|n| n.records)
    }

    /// Like [`normalize`](Self::normalize), also reporting the detected
    /// shape and any objects skipped under `FailOpen`.
    pub fn normalize_detailed(
        &self,
        listing_id: &str,
        payload: &Value,
    ) -> Result<Normalized, ParseError> {
        let (shape, path) = locate(payload, 0)
            .ok_or_else(|| ParseError::new("payload matches no recognized shape", payload))?;

        let mut records = Vec::new();
        let mut skipped = Vec::new();

        let kind = match shape {
            Shape::Empty => ShapeKind::Empty,
            Shape::Flat(items) => {
                for item in items {
                    let result = parse_slot(listing_id, item, None);
                    self.collect(result, &mut records, &mut skipped)?;
                }
                ShapeKind::FlatList
            }
            Shape::Grouped(groups) => {
                for (key, value) in groups {
                    let Some(group_date) = parse_date(key) else {
                        continue;
                    };
                    if value.is_null() {
                        tracing::warn!(listing = listing_id, "Date group '{}' is null; no slots", key);
                        continue;
                    }
                    match value.as_array() {
                        Some(items) => {
                            for item in items {
                                let result = parse_slot(listing_id, item, Some(group_date));
                                self.collect(result, &mut records, &mut skipped)?;
                            }
                        }
                        None => {
                            let err = ParseError::new(
                                format!("date group '{key}' is not a list"),
                                value,
                            );
                            self.collect(Err(err), &mut records, &mut skipped)?;
                        }
                    }
                }
                ShapeKind::GroupedByDate
            }
        };

        tracing::debug!(
            listing = listing_id,
            records = records.len(),
            skipped = skipped.len(),
            "Normalized payload ({})",
            ShapeSummary {
                kind,
                container_path: path.clone(),
            }
        );

        Ok(Normalized {
            records,
            skipped,
            shape: ShapeSummary {
                kind,
                container_path: path,
            },
        })
    }

    fn collect(
        &self,
        result: Result<SlotRecord, ParseError>,
        records: &mut Vec<SlotRecord>,
        skipped: &mut Vec<ParseError>,
    ) -> Result<(), ParseError> {
        match result {
            Ok(record) => records.push(record),
            Err(err) => match self.policy {
                MissingFieldPolicy::FailClosed => return Err(err),
                MissingFieldPolicy::FailOpen => {
                    tracing::warn!("Skipping slot object: {}", err);
                    skipped.push(err);
                }
            },
        }
        Ok(())
    }
}

/// Find the recognized shape of `value`, unwrapping containers.
fn locate(value: &Value, depth: usize) -> Option<(Shape<'_>, Vec<&'static str>)> {
    match value {
        Value::Null => Some((Shape::Empty, Vec::new())),
        Value::Array(items) => Some((Shape::Flat(items), Vec::new())),
        Value::Object(obj) if obj.is_empty() => Some((Shape::Empty, Vec::new())),
        Value::Object(obj) => {
            // An empty container only counts once nothing else yields slots.
            let mut empty_at = None;
            if depth < MAX_DEPTH {
                for key in CONTAINER_KEYS {
                    let Some(inner) = obj.get(*key) else {
                        continue;
                    };
                    match locate(inner, depth + 1) {
                        Some((Shape::Empty, mut path)) => {
                            if empty_at.is_none() {
                                path.insert(0, *key);
                                empty_at = Some(path);
                            }
                        }
                        Some((shape, mut path)) => {
                            path.insert(0, *key);
                            return Some((shape, path));
                        }
                        None => {}
                    }
                }
            }

            let groups: Vec<(&str, &Value)> = obj
                .iter()
                .filter(|(k, _)| looks_like_date(k))
                .map(|(k, v)| (k.as_str(), v))
                .collect();
            if !groups.is_empty() {
                return Some((Shape::Grouped(groups), Vec::new()));
            }
            empty_at.map(|path| (Shape::Empty, path))
        }
        _ => None,
    }
}

/// Turn one slot object into a record. `group_date` is the date key of a
/// grouped payload; the object's own date field wins when present.
fn parse_slot(
    listing_id: &str,
    item: &Value,
    group_date: Option<NaiveDate>,
) -> Result<SlotRecord, ParseError> {
    let Some(obj) = item.as_object() else {
        return Err(ParseError::new("slot entry is not an object", item));
    };

    let date_field = first_present(obj, DATE_ALIASES);
    let time_field = first_present(obj, TIME_ALIASES);
    let combined = match first_present(obj, DATETIME_ALIASES) {
        Some((key, value)) => {
            let text = scalar_text(value).ok_or_else(|| {
                ParseError::new(format!("field '{key}' is not a string or number"), item)
            })?;
            Some(parse_datetime(&text).ok_or_else(|| {
                ParseError::new(format!("unparseable date-time in '{key}': {text}"), item)
            })?)
        }
        None => None,
    };

    let date = match date_field {
        Some((key, value)) => {
            let text = scalar_text(value).ok_or_else(|| {
                ParseError::new(format!("field '{key}' is not a string or number"), item)
            })?;
            parse_date(&text).ok_or_else(|| {
                ParseError::new(format!("unparseable date in '{key}': {text}"), item)
            })?
        }
        None => match (group_date, combined) {
            (Some(d), _) => d,
            (None, Some(dt)) => dt.date(),
            (None, None) => {
                return Err(ParseError::new(
                    format!("missing date (tried {})", DATE_ALIASES.join(", ")),
                    item,
                ))
            }
        },
    };

    let time = match time_field {
        Some((key, value)) => {
            let text = scalar_text(value).ok_or_else(|| {
                ParseError::new(format!("field '{key}' is not a string or number"), item)
            })?;
            parse_time(&text).ok_or_else(|| {
                ParseError::new(format!("unparseable time in '{key}': {text}"), item)
            })?
        }
        None => {
            // A combined value may also hide in the date field itself.
            let from_date_field = date_field
                .and_then(|(_, v)| scalar_text(v))
                .and_then(|s| parse_datetime(&s));
            match combined.or(from_date_field) {
                Some(dt) => NaiveTime::from_hms_opt(dt.hour(), dt.minute(), 0)
                    .ok_or_else(|| ParseError::new("unrepresentable time of day", item))?,
                None => {
                    return Err(ParseError::new(
                        format!("missing time (tried {})", TIME_ALIASES.join(", ")),
                        item,
                    ))
                }
            }
        }
    };

    let party_size = PARTY_SIZE_ALIASES
        .iter()
        .filter_map(|k| obj.get(*k))
        .find_map(|v| as_integer(v).and_then(|n| u32::try_from(n).ok()));
    let price = PRICE_ALIASES
        .iter()
        .filter_map(|k| obj.get(*k))
        .find_map(as_integer);
    let booking_url = URL_ALIASES
        .iter()
        .filter_map(|k| obj.get(*k))
        .find_map(|v| v.as_str().map(str::trim).filter(|s| !s.is_empty()))
        .map(str::to_string);

    Ok(SlotRecord::new(listing_id, date, time, party_size)
        .with_price(price)
        .with_booking_url(booking_url))
}

/// First alias present with a non-null value.
fn first_present<'a>(
    obj: &'a Map<String, Value>,
    aliases: &[&'static str],
) -> Option<(&'static str, &'a Value)> {
    aliases
        .iter()
        .find_map(|k| obj.get(*k).filter(|v| !v.is_null()).map(|v| (*k, v)))
}

fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Non-negative integer from a number or an integral string like "15,000".
fn as_integer(value: &Value) -> Option<u64> {
    match value {
        Value::Number(n) => n.as_u64().or_else(|| {
            n.as_f64()
                .filter(|f| *f >= 0.0 && f.fract() == 0.0 && *f <= u64::MAX as f64)
                .map(|f| f as u64)
        }),
        Value::String(s) => {
            let cleaned: String = s
                .trim()
                .trim_start_matches(['¥', '￥'])
                .chars()
                .filter(|c| *c != ',')
                .collect();
            cleaned.parse().ok()
        }
        _ => None,
    }
}

/// Human-readable structure dump of a raw payload, for debugging new
/// response variants.
pub fn describe_shape(payload: &Value) -> String {
    let mut out = String::new();
    out.push_str(&format!("Type: {}\n", type_name(payload)));

    match payload {
        Value::Object(obj) => {
            let keys: Vec<&str> = obj.keys().map(String::as_str).collect();
            out.push_str(&format!("Keys: {}\n", keys.join(", ")));
            for (key, value) in obj {
                out.push_str(&format!("  {key}: {}", type_name(value)));
                match value {
                    Value::Array(items) => out.push_str(&format!(" ({} items)", items.len())),
                    Value::Object(inner) => {
                        let inner_keys: Vec<&str> =
                            inner.keys().take(5).map(String::as_str).collect();
                        out.push_str(&format!(" (keys: {})", inner_keys.join(", ")));
                    }
                    _ => {}
                }
                out.push('\n');
            }
        }
        Value::Array(items) => {
            out.push_str(&format!("Items: {}\n", items.len()));
            if let Some(Value::Object(first)) = items.first() {
                let keys: Vec<&str> = first.keys().map(String::as_str).collect();
                out.push_str(&format!("First item keys: {}\n", keys.join(", ")));
            }
        }
        _ => {}
    }

    match locate(payload, 0) {
        Some((shape, path)) => {
            let kind = match shape {
                Shape::Empty => ShapeKind::Empty,
                Shape::Flat(_) => ShapeKind::FlatList,
                Shape::Grouped(_) => ShapeKind::GroupedByDate,
            };
            let summary = ShapeSummary {
                kind,
                container_path: path,
            };
            out.push_str(&format!("Detected shape: {summary}\n"));
        }
        None => out.push_str("Detected shape: unrecognized\n"),
    }
    out
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "list",
        Value::Object(_) => "object",
    }
}
