pub mod card;
pub mod rating;

pub use card::*;
pub use rating::*;

use html_escape::decode_html_entities;
use scraper::Html;

/// Clean and normalize text by removing extra whitespace and decoding HTML entities
pub fn clean_text(text: &str) -> String {
    let decoded = decode_html_entities(text);
    decoded
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Reduce an element's inner HTML to its visible text
pub fn strip_markup(markup: &str) -> String {
    let fragment = Html::parse_fragment(markup);
    let text = fragment.root_element().text().collect::<Vec<_>>().join(" ");
    clean_text(&text)
}
