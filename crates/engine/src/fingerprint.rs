//! Fingerprint model and normalization of heterogeneously-stored records.
//!
//! Accounts accumulate fingerprint slots over time and across schema
//! generations: a slot may hold a numeric feature vector, a string encoding
//! a JSON numeric array, or legacy garbage (null, objects, mixed arrays).
//! Storage never rewrites old slots, so the engine models every slot as a
//! [`RawEntry`] and derives a cleaned [`NormalizedView`] on every request.
//! The view carries an index map back to raw positions; that map is the
//! only sanctioned way to translate classifier results (which index the
//! cleaned list) into storage coordinates.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// Fixed-shape numeric feature vector identifying a device/browser
/// instance. Feature semantics are opaque to the engine; vectors are
/// compared by exact elementwise equality or by classifier similarity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Fingerprint(pub Vec<f64>);

impl Fingerprint {
    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn as_slice(&self) -> &[f64] {
        &self.0
    }
}

impl From<Vec<f64>> for Fingerprint {
    fn from(features: Vec<f64>) -> Self {
        Fingerprint(features)
    }
}

/// One slot of the as-stored fingerprint collection.
///
/// Untagged so the stored JSON round-trips shape-identically: vectors stay
/// arrays, encoded strings stay strings, and anything else is preserved
/// verbatim as a placeholder. Placeholders keep their position; no slot is
/// ever removed except by being overwritten.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawEntry {
    /// A numeric feature vector stored directly as a JSON array
    Vector(Fingerprint),
    /// A string that may encode a JSON numeric array
    Encoded(String),
    /// Null, malformed, or legacy content. Never a fingerprint, never
    /// dropped from the sequence.
    Other(Value),
}

impl RawEntry {
    /// The fingerprint this slot holds directly, if any. Encoded strings
    /// are not decoded here; only [`normalize`] interprets them.
    pub fn as_vector(&self) -> Option<&Fingerprint> {
        match self {
            RawEntry::Vector(fp) => Some(fp),
            _ => None,
        }
    }
}

/// Decode a stored `fingerprints` field tolerantly.
///
/// A non-array value (legacy rows, corrupted writes) decodes to the empty
/// collection rather than an error: the system degrades to "no known
/// fingerprints" instead of failing the request.
pub fn collection_from_value(value: &Value) -> Vec<RawEntry> {
    match value {
        Value::Array(items) => items
            .iter()
            .map(|item| {
                serde_json::from_value(item.clone())
                    .unwrap_or_else(|_| RawEntry::Other(item.clone()))
            })
            .collect(),
        _ => Vec::new(),
    }
}

/// Serde adapter for account records: accepts any JSON shape for the
/// `fingerprints` column and applies [`collection_from_value`].
pub fn deserialize_collection<'de, D>(deserializer: D) -> Result<Vec<RawEntry>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(collection_from_value(&value))
}

/// The cleaned, classifier-facing projection of a raw collection.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct NormalizedView {
    /// Valid fingerprint vectors, in raw order
    pub normalized: Vec<Fingerprint>,
    /// `orig_index_map[i]` is the raw position of `normalized[i]`.
    /// Strictly increasing; same length as `normalized`.
    pub orig_index_map: Vec<usize>,
}

impl NormalizedView {
    /// Translate a normalized-list index into a raw-collection index.
    /// Returns `None` when the index is absent or out of range; callers
    /// treat that as "append instead of replace".
    pub fn raw_index(&self, norm_idx: usize) -> Option<usize> {
        self.orig_index_map.get(norm_idx).copied()
    }

    pub fn is_empty(&self) -> bool {
        self.normalized.is_empty()
    }
}

/// Extract the normalized view from a raw collection.
///
/// Applied positionally: direct vectors are kept, strings that parse as a
/// JSON numeric array are kept (parsed), everything else is dropped
/// silently with no position recorded. Malformed input never raises; the
/// worst case is an empty view.
pub fn normalize(raw: &[RawEntry]) -> NormalizedView {
    let mut view = NormalizedView::default();
    for (i, entry) in raw.iter().enumerate() {
        match entry {
            RawEntry::Vector(fp) => {
                view.normalized.push(fp.clone());
                view.orig_index_map.push(i);
            }
            RawEntry::Encoded(s) => {
                if let Ok(fp) = serde_json::from_str::<Fingerprint>(s) {
                    view.normalized.push(fp);
                    view.orig_index_map.push(i);
                }
            }
            RawEntry::Other(_) => {}
        }
    }
    view
}
