use std::collections::HashSet;

use foundation::{GeoError, LatLon, Located, SignalId, Timestamp};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::taxonomy::{Category, MatchKind, Taxonomy};

/// Record as handed over by the ingestion boundary.
///
/// Coordinates are read leniently: numbers and numeric strings are taken,
/// anything else (null, missing, text) becomes `None` and is rejected later by
/// [`normalize`] rather than failing the whole batch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawSignal {
    pub id: SignalId,
    #[serde(default)]
    pub disease: String,
    #[serde(default)]
    pub category: String,
    #[serde(default, deserialize_with = "lenient_coordinate")]
    pub lat: Option<f64>,
    #[serde(default, deserialize_with = "lenient_coordinate")]
    pub lon: Option<f64>,
    #[serde(default)]
    pub timestamp: Timestamp,
    #[serde(default)]
    pub city: Option<String>,
    #[serde(default)]
    pub source_url: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
}

fn lenient_coordinate<'de, D>(de: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(de)? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    })
}

impl RawSignal {
    pub fn new(
        id: impl Into<String>,
        disease: impl Into<String>,
        category: impl Into<String>,
        lat: f64,
        lon: f64,
    ) -> Self {
        Self {
            id: SignalId::new(id),
            disease: disease.into(),
            category: category.into(),
            lat: Some(lat),
            lon: Some(lon),
            timestamp: Timestamp::default(),
            city: None,
            source_url: None,
            title: None,
        }
    }

    pub fn position(&self) -> Result<LatLon, GeoError> {
        match (self.lat, self.lon) {
            (Some(lat), Some(lon)) => LatLon::validated(lat, lon),
            _ => Err(GeoError::MissingCoordinate),
        }
    }
}

/// A normalized, placeable outbreak signal.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Signal {
    pub id: SignalId,
    pub disease: String,
    pub raw_category: String,
    /// Canonical category of the primary segment.
    pub category: Category,
    /// Every canonical category the raw string implies, primary first.
    pub categories: Vec<Category>,
    /// How the primary segment was matched.
    pub matched_by: MatchKind,
    pub position: LatLon,
    pub timestamp: Timestamp,
    pub city: Option<String>,
    pub source_url: Option<String>,
    pub title: Option<String>,
}

impl Signal {
    /// Normalizes one record; fails only on unplaceable coordinates.
    pub fn from_raw(raw: RawSignal, taxonomy: &Taxonomy) -> Result<Self, GeoError> {
        let position = raw.position()?;
        let (primary, categories) = taxonomy.resolve_composite(&raw.category);
        Ok(Signal {
            id: raw.id,
            disease: raw.disease,
            category: primary.category,
            categories,
            matched_by: primary.matched_by,
            raw_category: raw.category,
            position,
            timestamp: raw.timestamp,
            city: raw.city,
            source_url: raw.source_url,
            title: raw.title,
        })
    }

    pub fn implies(&self, category: Category) -> bool {
        self.categories.contains(&category)
    }
}

impl Located for Signal {
    fn position(&self) -> LatLon {
        self.position
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RejectReason {
    InvalidPosition { detail: String },
    DuplicateId,
    /// The record could not be read at all (e.g. no id, unparsable timestamp).
    Malformed { detail: String },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Rejected {
    pub id: SignalId,
    pub reason: RejectReason,
}

/// Outcome of normalizing one refresh worth of records.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct NormalizedBatch {
    pub signals: Vec<Signal>,
    pub rejected: Vec<Rejected>,
    /// Accepted signals whose primary category fell back to `Other`.
    pub fallbacks: usize,
}

impl NormalizedBatch {
    pub fn positions(&self) -> Vec<LatLon> {
        self.signals.iter().map(|s| s.position).collect()
    }
}

/// Normalizes records in input order.
///
/// Bad coordinates and repeated ids are excluded and reported, never raised;
/// the first occurrence of an id wins.
pub fn normalize<I>(raws: I, taxonomy: &Taxonomy) -> NormalizedBatch
where
    I: IntoIterator<Item = RawSignal>,
{
    let mut batch = NormalizedBatch::default();
    let mut seen: HashSet<SignalId> = HashSet::new();

    for raw in raws {
        if seen.contains(&raw.id) {
            tracing::debug!(id = %raw.id, "dropping duplicate signal id");
            batch.rejected.push(Rejected {
                id: raw.id,
                reason: RejectReason::DuplicateId,
            });
            continue;
        }

        let id = raw.id.clone();
        match Signal::from_raw(raw, taxonomy) {
            Ok(signal) => {
                seen.insert(id);
                if signal.matched_by == MatchKind::Fallback {
                    batch.fallbacks += 1;
                }
                batch.signals.push(signal);
            }
            Err(err) => {
                tracing::debug!(id = %id, %err, "excluding signal with unplaceable position");
                batch.rejected.push(Rejected {
                    id,
                    reason: RejectReason::InvalidPosition {
                        detail: err.to_string(),
                    },
                });
            }
        }
    }

    batch
}

/// Records read from one upstream payload, before normalization.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawBatch {
    pub records: Vec<RawSignal>,
    /// Array elements that could not be read as a record.
    pub malformed: Vec<Rejected>,
}

impl RawBatch {
    /// Normalizes the readable records; malformed ones lead the rejects.
    pub fn normalize(self, taxonomy: &Taxonomy) -> NormalizedBatch {
        let mut batch = normalize(self.records, taxonomy);
        let mut rejected = self.malformed;
        rejected.append(&mut batch.rejected);
        batch.rejected = rejected;
        batch
    }
}

/// Parses a JSON array of [`RawSignal`]s one element at a time.
///
/// Only a payload that is not a JSON array is an error; an element that does
/// not read as a record is reported in [`RawBatch::malformed`].
pub fn parse_raw_signals(json: &str) -> Result<RawBatch, serde_json::Error> {
    let values: Vec<Value> = serde_json::from_str(json)?;
    let mut batch = RawBatch::default();
    for (index, value) in values.into_iter().enumerate() {
        let id = element_id(&value, index);
        match serde_json::from_value::<RawSignal>(value) {
            Ok(raw) => batch.records.push(raw),
            Err(err) => {
                tracing::debug!(id = %id, %err, "skipping unreadable signal record");
                batch.malformed.push(Rejected {
                    id,
                    reason: RejectReason::Malformed {
                        detail: err.to_string(),
                    },
                });
            }
        }
    }
    Ok(batch)
}

/// Best available name for an element in reports; `#<index>` without an id.
fn element_id(value: &Value, index: usize) -> SignalId {
    match value.get("id") {
        Some(Value::String(s)) => SignalId::new(s.clone()),
        Some(Value::Number(n)) => SignalId::new(n.to_string()),
        _ => SignalId::new(format!("#{index}")),
    }
}

#[cfg(test)]
pub(crate) fn raw(id: &str, category: &str, lat: f64, lon: f64) -> RawSignal {
    RawSignal::new(id, format!("disease-{id}"), category, lat, lon)
}
