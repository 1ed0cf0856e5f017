//! Scripted in-memory browser used to drive pipelines without a WebDriver.

#![allow(dead_code)]

use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use catalog_scraper::browser::{BrowserError, BrowserLauncher, BrowserSession, Locator};
use catalog_scraper::config::Settings;
use catalog_scraper::models::segment_key;
use catalog_scraper::scrapers::selectors;

pub const RATING_FILTER: &str = "customer-rating-4_&_Up";

/// Settings with timeouts small enough for tests.
pub fn test_settings() -> Settings {
    let mut settings = Settings::default();
    settings.rating_filter_id = RATING_FILTER.to_string();
    settings.timeouts.navigation_secs = 1;
    settings.timeouts.region_prompt_secs = 0;
    settings.timeouts.results_secs = 1;
    settings.timeouts.filter_locate_secs = 1;
    settings.timeouts.filter_refresh_secs = 1;
    settings.timeouts.title_secs = 0;
    settings.timeouts.rating_secs = 0;
    settings.timeouts.settle_ms = 0;
    settings.timeouts.card_settle_ms = 0;
    settings.timeouts.poll_ms = 10;
    settings.timeouts.segment_deadline_secs = 0;
    settings
}

#[derive(Debug, Clone, Default)]
pub struct FakeCard {
    pub title: Option<String>,
    pub price: Option<String>,
    pub rating_markup: Option<String>,
    pub review_count: Option<String>,
}

impl FakeCard {
    /// A card with every field present.
    pub fn complete(title: &str, price: &str, rating: &str, reviews: &str) -> Self {
        Self {
            title: Some(title.to_string()),
            price: Some(price.to_string()),
            rating_markup: Some(format!("Rating {} out of 5 stars with {} reviews", rating, reviews)),
            review_count: Some(format!("({})", reviews)),
        }
    }

    pub fn titled(title: &str) -> Self {
        Self {
            title: Some(title.to_string()),
            ..Self::default()
        }
    }
}

/// What the fake catalog site looks like to every session.
#[derive(Debug, Clone, Default)]
pub struct FakeCatalog {
    pub cards: HashMap<String, Vec<FakeCard>>,
    /// Checkbox ids that can never be located.
    pub broken_filters: HashSet<String>,
    /// Checkbox ids whose click never refreshes the listing container.
    pub frozen_filters: HashSet<String>,
    /// Checkbox ids whose click brings the session task down.
    pub panicking_filters: HashSet<String>,
    pub region_prompt: bool,
    pub no_results: bool,
    pub fail_launch: bool,
    pub hang_on_open: bool,
    /// `quit` is recorded but never completes.
    pub hang_on_quit: bool,
    /// Delay inside `open`, so concurrent sessions overlap.
    pub open_delay: Duration,
}

impl FakeCatalog {
    pub fn with_segment(mut self, segment: &str, cards: Vec<FakeCard>) -> Self {
        self.cards.insert(segment_key(segment), cards);
        self
    }

    /// `count` complete cards titled after the segment.
    pub fn with_listings(self, segment: &str, count: usize) -> Self {
        let cards = (0..count)
            .map(|i| {
                FakeCard::complete(
                    &format!("{} Laptop {}", segment, i + 1),
                    &format!("${}99.99", i + 5),
                    "4.5",
                    "1,024",
                )
            })
            .collect();
        self.with_segment(segment, cards)
    }
}

#[derive(Debug, Default)]
pub struct SessionStats {
    pub launches: AtomicUsize,
    pub quits: AtomicUsize,
    pub region_clicks: AtomicUsize,
    active: AtomicUsize,
    max_active: AtomicUsize,
}

impl SessionStats {
    pub fn launches(&self) -> usize {
        self.launches.load(Ordering::SeqCst)
    }

    pub fn quits(&self) -> usize {
        self.quits.load(Ordering::SeqCst)
    }

    pub fn max_active(&self) -> usize {
        self.max_active.load(Ordering::SeqCst)
    }

    pub fn region_clicks(&self) -> usize {
        self.region_clicks.load(Ordering::SeqCst)
    }
}

pub struct FakeLauncher {
    catalog: Arc<FakeCatalog>,
    pub stats: Arc<SessionStats>,
}

impl FakeLauncher {
    pub fn new(catalog: FakeCatalog) -> Self {
        Self {
            catalog: Arc::new(catalog),
            stats: Arc::new(SessionStats::default()),
        }
    }
}

#[async_trait]
impl BrowserLauncher for FakeLauncher {
    type Session = FakeSession;

    async fn launch(&self) -> Result<FakeSession, BrowserError> {
        if self.catalog.fail_launch {
            return Err(BrowserError::Launch("chromedriver not reachable".to_string()));
        }
        self.stats.launches.fetch_add(1, Ordering::SeqCst);
        let active = self.stats.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.stats.max_active.fetch_max(active, Ordering::SeqCst);

        Ok(FakeSession {
            catalog: self.catalog.clone(),
            stats: self.stats.clone(),
            opened: false,
            searched: false,
            region_handled: false,
            generation: 0,
            brand: None,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FakeElement {
    RegionLink,
    SearchBar,
    SearchButton,
    Container(u64),
    Checkbox(String),
    Card(usize),
    Title(usize),
    Price(usize),
    Rating(usize),
    Reviews(usize),
}

pub struct FakeSession {
    catalog: Arc<FakeCatalog>,
    stats: Arc<SessionStats>,
    opened: bool,
    searched: bool,
    region_handled: bool,
    generation: u64,
    brand: Option<String>,
}

impl FakeSession {
    fn timed_out(locator: &Locator, waited: Duration) -> BrowserError {
        BrowserError::WaitTimedOut {
            locator: locator.clone(),
            waited,
        }
    }

    fn cards(&self) -> &[FakeCard] {
        self.brand
            .as_ref()
            .and_then(|brand| self.catalog.cards.get(&segment_key(brand)))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    fn card(&self, index: usize) -> Option<&FakeCard> {
        self.cards().get(index)
    }
}

#[async_trait]
impl BrowserSession for FakeSession {
    type Element = FakeElement;

    async fn open(&mut self, _url: &str) -> Result<(), BrowserError> {
        if self.catalog.hang_on_open {
            std::future::pending::<()>().await;
        }
        if !self.catalog.open_delay.is_zero() {
            tokio::time::sleep(self.catalog.open_delay).await;
        }
        self.opened = true;
        Ok(())
    }

    async fn wait_for(
        &mut self,
        locator: &Locator,
        timeout: Duration,
    ) -> Result<FakeElement, BrowserError> {
        let found = if *locator == selectors::region_link() {
            (self.opened && self.catalog.region_prompt && !self.region_handled)
                .then_some(FakeElement::RegionLink)
        } else if *locator == selectors::search_bar() {
            self.opened.then_some(FakeElement::SearchBar)
        } else if *locator == selectors::search_button() {
            self.opened.then_some(FakeElement::SearchButton)
        } else if *locator == selectors::listing_card() {
            (self.searched && !self.catalog.no_results).then_some(FakeElement::Card(0))
        } else if *locator == selectors::listing_container() {
            self.searched.then_some(FakeElement::Container(self.generation))
        } else if let Locator::Id(id) = locator {
            (self.searched && !self.catalog.broken_filters.contains(id))
                .then(|| FakeElement::Checkbox(id.clone()))
        } else {
            None
        };
        found.ok_or_else(|| Self::timed_out(locator, timeout))
    }

    async fn wait_for_within(
        &mut self,
        parent: &FakeElement,
        locator: &Locator,
        timeout: Duration,
    ) -> Result<FakeElement, BrowserError> {
        let FakeElement::Card(index) = parent else {
            return Err(Self::timed_out(locator, timeout));
        };
        let card = self.card(*index);
        let found = if *locator == selectors::card_title() {
            card.and_then(|c| c.title.as_ref()).map(|_| FakeElement::Title(*index))
        } else if *locator == selectors::card_rating() {
            card.and_then(|c| c.rating_markup.as_ref()).map(|_| FakeElement::Rating(*index))
        } else {
            None
        };
        found.ok_or_else(|| Self::timed_out(locator, timeout))
    }

    async fn find_within(
        &mut self,
        parent: &FakeElement,
        locator: &Locator,
    ) -> Result<FakeElement, BrowserError> {
        let FakeElement::Card(index) = parent else {
            return Err(BrowserError::NotFound(locator.clone()));
        };
        let card = self.card(*index);
        let found = if *locator == selectors::card_price() {
            card.and_then(|c| c.price.as_ref()).map(|_| FakeElement::Price(*index))
        } else if *locator == selectors::card_review_count() {
            card.and_then(|c| c.review_count.as_ref()).map(|_| FakeElement::Reviews(*index))
        } else {
            None
        };
        found.ok_or_else(|| BrowserError::NotFound(locator.clone()))
    }

    async fn find_all(&mut self, locator: &Locator) -> Result<Vec<FakeElement>, BrowserError> {
        if *locator != selectors::listing_card() {
            return Ok(Vec::new());
        }
        Ok((0..self.cards().len()).map(FakeElement::Card).collect())
    }

    async fn click(&mut self, element: &FakeElement) -> Result<(), BrowserError> {
        match element {
            FakeElement::RegionLink => {
                self.region_handled = true;
                self.stats.region_clicks.fetch_add(1, Ordering::SeqCst);
            }
            FakeElement::SearchButton => self.searched = true,
            FakeElement::Checkbox(id) => {
                if self.catalog.panicking_filters.contains(id) {
                    panic!("renderer crashed while applying {}", id);
                }
                if self.catalog.frozen_filters.contains(id) {
                    return Ok(());
                }
                if id != RATING_FILTER {
                    self.brand = Some(id.clone());
                }
                self.generation += 1;
            }
            _ => {}
        }
        Ok(())
    }

    async fn scroll_into_view(&mut self, _element: &FakeElement) -> Result<(), BrowserError> {
        Ok(())
    }

    async fn type_text(&mut self, element: &FakeElement, _text: &str) -> Result<(), BrowserError> {
        match element {
            FakeElement::SearchBar => Ok(()),
            other => Err(BrowserError::Driver(format!("cannot type into {:?}", other))),
        }
    }

    async fn read_text(&mut self, element: &FakeElement) -> Result<String, BrowserError> {
        let text = match element {
            FakeElement::Title(i) => self.card(*i).and_then(|c| c.title.clone()),
            FakeElement::Price(i) => self.card(*i).and_then(|c| c.price.clone()),
            FakeElement::Reviews(i) => self.card(*i).and_then(|c| c.review_count.clone()),
            _ => None,
        };
        text.ok_or_else(|| BrowserError::Driver(format!("no text for {:?}", element)))
    }

    async fn read_inner_html(&mut self, element: &FakeElement) -> Result<String, BrowserError> {
        match element {
            FakeElement::Rating(i) => self
                .card(*i)
                .and_then(|c| c.rating_markup.clone())
                .ok_or_else(|| BrowserError::Driver("rating vanished".to_string())),
            other => Err(BrowserError::Driver(format!("no markup for {:?}", other))),
        }
    }

    async fn is_stale(&mut self, element: &FakeElement) -> Result<bool, BrowserError> {
        match element {
            FakeElement::Container(generation) => Ok(*generation != self.generation),
            _ => Ok(false),
        }
    }

    async fn quit(self) -> Result<(), BrowserError> {
        self.stats.quits.fetch_add(1, Ordering::SeqCst);
        self.stats.active.fetch_sub(1, Ordering::SeqCst);
        if self.catalog.hang_on_quit {
            std::future::pending::<()>().await;
        }
        Ok(())
    }
}
