use std::sync::Arc;
use std::time::Duration;
use tokio::time::{sleep, timeout, Instant};
use tracing::{debug, error, info, warn};

use super::{selectors, PipelineStage, ScrapeError};
use crate::browser::{BrowserError, BrowserLauncher, BrowserSession, Locator};
use crate::config::Settings;
use crate::models::Listing;
use crate::parsers::{parse_listing, CardFields, ExtractionError, FieldResult};

type Element<L> = <<L as BrowserLauncher>::Session as BrowserSession>::Element;

/// Scrapes one segment (brand) in its own browser session.
pub struct SegmentPipeline<L: BrowserLauncher> {
    launcher: Arc<L>,
    settings: Arc<Settings>,
}

impl<L: BrowserLauncher> Clone for SegmentPipeline<L> {
    fn clone(&self) -> Self {
        Self {
            launcher: self.launcher.clone(),
            settings: self.settings.clone(),
        }
    }
}

impl<L: BrowserLauncher> SegmentPipeline<L> {
    pub fn new(launcher: Arc<L>, settings: Arc<Settings>) -> Self {
        Self { launcher, settings }
    }

    /// Run navigate → filter → extract for `segment`.
    ///
    /// The session is closed exactly once before this returns, whether the
    /// run reached `Done` or `Failed`.
    pub async fn run(&self, segment: &str) -> Result<Vec<Listing>, ScrapeError> {
        info!("Pipeline for segment '{}' started", segment);
        let mut session = self
            .launcher
            .launch()
            .await
            .map_err(ScrapeError::DriverInit)?;

        let mut stage = PipelineStage::Init;
        let outcome = match self.settings.timeouts.segment_deadline() {
            Some(limit) => {
                let result = timeout(limit, self.drive(&mut session, segment, &mut stage)).await;
                match result {
                    Ok(outcome) => outcome,
                    Err(_) => Err(ScrapeError::DeadlineExceeded { limit, stage }),
                }
            }
            None => self.drive(&mut session, segment, &mut stage).await,
        };

        if let Err(e) = &outcome {
            debug!("Segment '{}' moved from {} to {}", segment, stage, PipelineStage::Failed);
            error!("Pipeline for segment '{}' failed: {}", segment, e);
        }

        // A wedged driver tends to ignore the session delete as well
        let quit_limit = self.settings.timeouts.navigation();
        match timeout(quit_limit, session.quit()).await {
            Ok(Ok(())) => {
                info!("Pipeline for segment '{}' finished and browser session closed", segment)
            }
            Ok(Err(e)) => warn!("Failed to close browser session for '{}': {}", segment, e),
            Err(_) => warn!(
                "Browser session for '{}' did not close within {:?}, abandoning it",
                segment, quit_limit
            ),
        }

        outcome
    }

    async fn drive(
        &self,
        session: &mut L::Session,
        segment: &str,
        stage: &mut PipelineStage,
    ) -> Result<Vec<Listing>, ScrapeError> {
        self.navigate(session).await.map_err(ScrapeError::Navigation)?;
        advance(segment, stage);

        self.apply_filter(session, segment).await?;
        self.apply_filter(session, &self.settings.rating_filter_id).await?;
        info!("All filters applied for '{}'", segment);
        advance(segment, stage);

        let listings = self.extract(session, segment).await?;
        advance(segment, stage);
        advance(segment, stage);

        Ok(listings)
    }

    async fn navigate(&self, session: &mut L::Session) -> Result<(), BrowserError> {
        let timeouts = &self.settings.timeouts;

        session.open(&self.settings.base_url).await?;
        info!("Navigated to {}", self.settings.base_url);

        // The region interstitial only shows up for some visitors
        match session.wait_for(&selectors::region_link(), timeouts.region_prompt()).await {
            Ok(link) => match session.click(&link).await {
                Ok(()) => info!("Handled region selection prompt"),
                Err(e) => debug!("Region selection link was not clickable: {}", e),
            },
            Err(_) => info!("Region selection prompt did not appear, continuing"),
        }

        let search_bar = session
            .wait_for(&selectors::search_bar(), timeouts.navigation())
            .await?;
        session.type_text(&search_bar, &self.settings.category).await?;
        let search_button = session
            .wait_for(&selectors::search_button(), timeouts.navigation())
            .await?;
        session.click(&search_button).await?;
        info!("Searched for category: {}", self.settings.category);

        session
            .wait_for(&selectors::listing_card(), timeouts.results())
            .await?;
        info!("Product listings page loaded");
        Ok(())
    }

    /// Tick one filter checkbox and wait for the listing container to be replaced.
    async fn apply_filter(
        &self,
        session: &mut L::Session,
        filter_id: &str,
    ) -> Result<(), ScrapeError> {
        let as_filter_error = |error| ScrapeError::Filter {
            filter: filter_id.to_string(),
            error,
        };
        let timeouts = &self.settings.timeouts;

        let container = session
            .wait_for(&selectors::listing_container(), timeouts.filter_locate())
            .await
            .map_err(as_filter_error)?;
        let checkbox = session
            .wait_for(&selectors::filter_checkbox(filter_id), timeouts.filter_locate())
            .await
            .map_err(as_filter_error)?;

        session
            .scroll_into_view(&checkbox)
            .await
            .map_err(as_filter_error)?;
        sleep(timeouts.settle()).await;
        session.click(&checkbox).await.map_err(as_filter_error)?;
        info!("Applied filter: {}", filter_id);

        self.wait_until_stale(session, &container, timeouts.filter_refresh())
            .await
            .map_err(as_filter_error)?;
        info!("Listing refreshed after filter {}", filter_id);
        Ok(())
    }

    async fn wait_until_stale(
        &self,
        session: &mut L::Session,
        element: &Element<L>,
        limit: Duration,
    ) -> Result<(), BrowserError> {
        let started = Instant::now();
        loop {
            if session.is_stale(element).await? {
                return Ok(());
            }
            if started.elapsed() >= limit {
                return Err(BrowserError::StillAttached { waited: limit });
            }
            sleep(self.settings.timeouts.poll_interval()).await;
        }
    }

    async fn extract(
        &self,
        session: &mut L::Session,
        segment: &str,
    ) -> Result<Vec<Listing>, ScrapeError> {
        sleep(self.settings.timeouts.settle()).await;

        let cards = session
            .find_all(&selectors::listing_card())
            .await
            .map_err(ScrapeError::Extraction)?;
        info!("Found {} potential product cards for {}", cards.len(), segment);

        let mut listings = Vec::with_capacity(cards.len());
        let mut skipped = 0usize;

        for card in &cards {
            if let Err(e) = session.scroll_into_view(card).await {
                debug!("Could not scroll card into view: {}", e);
            }
            sleep(self.settings.timeouts.card_settle()).await;

            let fields = self.read_card(session, card).await;
            match parse_listing(segment, fields) {
                Ok(listing) => listings.push(listing),
                Err(e) => {
                    skipped += 1;
                    warn!("Card skipped for {}: {}", segment, e);
                }
            }
        }

        if skipped > 0 {
            warn!(
                "Extraction for {} was partial: {} of {} cards skipped",
                segment,
                skipped,
                cards.len()
            );
        }
        info!("Extracted {} listings for {}", listings.len(), segment);
        Ok(listings)
    }

    async fn read_card(&self, session: &mut L::Session, card: &Element<L>) -> CardFields {
        let timeouts = &self.settings.timeouts;

        let title = match session
            .wait_for_within(card, &selectors::card_title(), timeouts.title())
            .await
        {
            Ok(element) => session.read_text(&element).await.map_err(missing("title")),
            Err(e) => Err(missing("title")(e)),
        };
        let price = read_optional(session, card, &selectors::card_price(), "price").await;
        let rating_markup = match session
            .wait_for_within(card, &selectors::card_rating(), timeouts.rating())
            .await
        {
            Ok(element) => session
                .read_inner_html(&element)
                .await
                .map_err(missing("rating")),
            Err(e) => Err(missing("rating")(e)),
        };
        let review_count =
            read_optional(session, card, &selectors::card_review_count(), "review_count").await;

        CardFields {
            title,
            price,
            rating_markup,
            review_count,
        }
    }
}

fn advance(segment: &str, stage: &mut PipelineStage) {
    let next = stage.next();
    debug!("Segment '{}' moved from {} to {}", segment, stage, next);
    *stage = next;
}

fn missing(field: &'static str) -> impl Fn(BrowserError) -> ExtractionError {
    move |e| ExtractionError::Missing {
        field,
        reason: e.to_string(),
    }
}

async fn read_optional<S: BrowserSession>(
    session: &mut S,
    card: &S::Element,
    locator: &Locator,
    field: &'static str,
) -> FieldResult {
    let element = session
        .find_within(card, locator)
        .await
        .map_err(missing(field))?;
    session.read_text(&element).await.map_err(missing(field))
}
