use serde::{Deserialize, Serialize};
use std::fmt;

use super::{segment_key, UNAVAILABLE};

/// A best-effort text field: either the raw scraped text or an explicit
/// "unavailable" marker. Serialized as a string or `null`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(from = "Option<String>", into = "Option<String>")]
pub enum FieldValue {
    Text(String),
    #[default]
    Unavailable,
}

impl FieldValue {
    pub fn text(value: impl Into<String>) -> Self {
        FieldValue::Text(value.into())
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            FieldValue::Text(text) => Some(text),
            FieldValue::Unavailable => None,
        }
    }

    pub fn is_unavailable(&self) -> bool {
        matches!(self, FieldValue::Unavailable)
    }
}

impl From<Option<String>> for FieldValue {
    fn from(value: Option<String>) -> Self {
        value.map_or(FieldValue::Unavailable, FieldValue::Text)
    }
}

impl From<FieldValue> for Option<String> {
    fn from(value: FieldValue) -> Self {
        match value {
            FieldValue::Text(text) => Some(text),
            FieldValue::Unavailable => None,
        }
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::Text(text) => write!(f, "{}", text),
            FieldValue::Unavailable => write!(f, "{}", UNAVAILABLE),
        }
    }
}

/// One product row scraped under a segment (brand).
///
/// The serialized field names are the contract with the reporting side:
/// `brand`, `title`, `price`, `rating`, `review_count`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Listing {
    #[serde(rename = "brand")]
    pub segment: String,
    pub title: String,
    #[serde(default)]
    pub price: FieldValue,
    #[serde(default)]
    pub rating: FieldValue,
    #[serde(default)]
    pub review_count: FieldValue,
}

impl Listing {
    pub fn new(segment: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            segment: segment.into(),
            title: title.into(),
            price: FieldValue::Unavailable,
            rating: FieldValue::Unavailable,
            review_count: FieldValue::Unavailable,
        }
    }

    /// True when this listing was scraped under `segment` (case-insensitive).
    pub fn belongs_to(&self, segment: &str) -> bool {
        segment_key(&self.segment) == segment_key(segment)
    }

    /// Older cache files spelled unavailable fields as the literal "N/A".
    pub fn with_legacy_sentinels(mut self) -> Self {
        for field in [&mut self.price, &mut self.rating, &mut self.review_count] {
            if field.as_text() == Some(UNAVAILABLE) {
                *field = FieldValue::Unavailable;
            }
        }
        self
    }
}
