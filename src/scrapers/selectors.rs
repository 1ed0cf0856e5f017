//! Element locators for the catalog's search and listing pages.

use crate::browser::Locator;

pub fn region_link() -> Locator {
    Locator::xpath("//a[.//img[@alt='United States']]")
}

pub fn search_bar() -> Locator {
    Locator::id("autocomplete-search-bar")
}

pub fn search_button() -> Locator {
    Locator::id("autocomplete-search-button")
}

/// Wrapper around all listing cards; replaced wholesale when a filter applies.
pub fn listing_container() -> Locator {
    Locator::class_name("plp-product-list")
}

pub fn listing_card() -> Locator {
    Locator::class_name("product-list-item")
}

/// Filter checkboxes are addressed by their element id (the brand name for brand filters).
pub fn filter_checkbox(filter_id: &str) -> Locator {
    Locator::id(filter_id)
}

pub fn card_title() -> Locator {
    Locator::class_name("product-title")
}

pub fn card_price() -> Locator {
    Locator::css("div.customer-price")
}

pub fn card_rating() -> Locator {
    Locator::css("p.visually-hidden")
}

pub fn card_review_count() -> Locator {
    Locator::css("span.c-reviews")
}
