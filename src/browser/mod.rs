//! Browser automation capability consumed by the segment pipeline.
//!
//! A [`BrowserLauncher`] hands out independent [`BrowserSession`]s; each
//! session is owned by exactly one pipeline and consumed by `quit`.

use async_trait::async_trait;
use std::fmt;
use std::time::Duration;
use thiserror::Error;

mod webdriver;
pub use webdriver::{WebDriverLauncher, WebDriverSession};

/// How to find an element on the page.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Locator {
    Id(String),
    ClassName(String),
    Css(String),
    XPath(String),
}

impl Locator {
    pub fn id(value: impl Into<String>) -> Self {
        Locator::Id(value.into())
    }

    pub fn class_name(value: impl Into<String>) -> Self {
        Locator::ClassName(value.into())
    }

    pub fn css(value: impl Into<String>) -> Self {
        Locator::Css(value.into())
    }

    pub fn xpath(value: impl Into<String>) -> Self {
        Locator::XPath(value.into())
    }
}

impl fmt::Display for Locator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Locator::Id(value) => write!(f, "#{}", value),
            Locator::ClassName(value) => write!(f, ".{}", value),
            Locator::Css(value) => write!(f, "css `{}`", value),
            Locator::XPath(value) => write!(f, "xpath `{}`", value),
        }
    }
}

#[derive(Debug, Clone, Error)]
pub enum BrowserError {
    #[error("could not start browser session: {0}")]
    Launch(String),
    #[error("{locator} not present after {waited:?}")]
    WaitTimedOut { locator: Locator, waited: Duration },
    #[error("{0} not found")]
    NotFound(Locator),
    #[error("previous listing container still attached after {waited:?}")]
    StillAttached { waited: Duration },
    #[error("webdriver error: {0}")]
    Driver(String),
}

/// One isolated browser session.
#[async_trait]
pub trait BrowserSession: Send + Sized {
    type Element: Clone + Send + Sync;

    async fn open(&mut self, url: &str) -> Result<(), BrowserError>;

    /// Wait until an element matching `locator` is present on the page.
    async fn wait_for(
        &mut self,
        locator: &Locator,
        timeout: Duration,
    ) -> Result<Self::Element, BrowserError>;

    async fn wait_for_within(
        &mut self,
        parent: &Self::Element,
        locator: &Locator,
        timeout: Duration,
    ) -> Result<Self::Element, BrowserError>;

    async fn find_within(
        &mut self,
        parent: &Self::Element,
        locator: &Locator,
    ) -> Result<Self::Element, BrowserError>;

    async fn find_all(&mut self, locator: &Locator) -> Result<Vec<Self::Element>, BrowserError>;

    async fn click(&mut self, element: &Self::Element) -> Result<(), BrowserError>;

    async fn scroll_into_view(&mut self, element: &Self::Element) -> Result<(), BrowserError>;

    /// Replace the element's current value with `text`.
    async fn type_text(&mut self, element: &Self::Element, text: &str) -> Result<(), BrowserError>;

    async fn read_text(&mut self, element: &Self::Element) -> Result<String, BrowserError>;

    async fn read_inner_html(&mut self, element: &Self::Element) -> Result<String, BrowserError>;

    /// True once the element has been detached from the document.
    async fn is_stale(&mut self, element: &Self::Element) -> Result<bool, BrowserError>;

    async fn quit(self) -> Result<(), BrowserError>;
}

#[async_trait]
pub trait BrowserLauncher: Send + Sync + 'static {
    type Session: BrowserSession + 'static;

    async fn launch(&self) -> Result<Self::Session, BrowserError>;
}
