use once_cell::sync::Lazy;
use regex::Regex;

use super::{clean_text, strip_markup};

static RATING_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"Rating ([\d.]+) out of 5 stars")
        .expect("Invalid rating regex")
});

/// Pull the star rating out of a card's accessibility text
pub fn parse_rating(markup: &str) -> Option<String> {
    let text = strip_markup(markup);
    RATING_REGEX
        .captures(&text)
        .and_then(|captures| captures.get(1))
        .map(|rating| rating.as_str().to_string())
}

/// "(1,204)" -> "1204"
pub fn clean_review_count(text: &str) -> String {
    clean_text(text)
        .chars()
        .filter(|c| !matches!(c, '(' | ')' | ','))
        .collect::<String>()
        .trim()
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_rating_from_hidden_text() {
        assert_eq!(
            parse_rating("Rating 4.6 out of 5 stars with 312 reviews").as_deref(),
            Some("4.6")
        );
        assert_eq!(
            parse_rating("<p>Rating 5 out of 5 stars</p>").as_deref(),
            Some("5")
        );
    }

    #[test]
    fn unrecognized_rating_text_yields_none() {
        assert_eq!(parse_rating("Not yet reviewed"), None);
        assert_eq!(parse_rating(""), None);
    }

    #[test]
    fn review_count_drops_parentheses_and_separators() {
        assert_eq!(clean_review_count("(1,204)"), "1204");
        assert_eq!(clean_review_count(" (87) "), "87");
        assert_eq!(clean_review_count("()"), "");
    }
}
