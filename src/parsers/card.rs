use thiserror::Error;
use tracing::debug;

use super::{clean_review_count, clean_text, parse_rating};
use crate::models::{FieldValue, Listing};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ExtractionError {
    #[error("{field} element not found: {reason}")]
    Missing { field: &'static str, reason: String },
    #[error("{field} element was empty")]
    Empty { field: &'static str },
    #[error("{field} text not recognised: {text:?}")]
    Unrecognized { field: &'static str, text: String },
}

pub type FieldResult = Result<String, ExtractionError>;

/// Raw reads from one listing card, one result per field.
#[derive(Debug, Clone)]
pub struct CardFields {
    pub title: FieldResult,
    pub price: FieldResult,
    pub rating_markup: FieldResult,
    pub review_count: FieldResult,
}

/// Build a listing from one card's field reads.
///
/// The title is required: a missing or blank title rejects the card. Every
/// other field falls back to [`FieldValue::Unavailable`] on its own.
pub fn parse_listing(segment: &str, fields: CardFields) -> Result<Listing, ExtractionError> {
    let title = fields
        .title
        .map(|raw| clean_text(&raw))
        .and_then(|title| {
            if title.is_empty() {
                Err(ExtractionError::Empty { field: "title" })
            } else {
                Ok(title)
            }
        })?;

    let price = fields.price.map(|raw| clean_text(&raw));
    let rating = fields.rating_markup.and_then(|markup| {
        parse_rating(&markup).ok_or_else(|| ExtractionError::Unrecognized {
            field: "rating",
            text: clean_text(&markup),
        })
    });
    let review_count = fields.review_count.map(|raw| clean_review_count(&raw));

    Ok(Listing {
        segment: segment.to_string(),
        price: optional_field(&title, price),
        rating: optional_field(&title, rating),
        review_count: optional_field(&title, review_count),
        title,
    })
}

fn optional_field(title: &str, result: FieldResult) -> FieldValue {
    match result {
        Ok(value) => FieldValue::Text(value),
        Err(e) => {
            debug!("Defaulting field for '{}': {}", title, e);
            FieldValue::Unavailable
        }
    }
}
