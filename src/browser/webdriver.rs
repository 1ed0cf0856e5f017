use async_trait::async_trait;
use std::time::Duration;
use thirtyfour::prelude::*;
use tracing::{debug, info};

use super::{BrowserError, BrowserLauncher, BrowserSession, Locator};
use crate::config::BrowserSettings;

/// Starts Chrome sessions through a WebDriver endpoint (chromedriver, Selenium grid).
pub struct WebDriverLauncher {
    settings: BrowserSettings,
    poll_interval: Duration,
}

impl WebDriverLauncher {
    pub fn new(settings: BrowserSettings, poll_interval: Duration) -> Self {
        Self {
            settings,
            poll_interval,
        }
    }
}

#[async_trait]
impl BrowserLauncher for WebDriverLauncher {
    type Session = WebDriverSession;

    async fn launch(&self) -> Result<WebDriverSession, BrowserError> {
        let mut caps = DesiredCapabilities::chrome();
        if self.settings.headless {
            caps.set_headless().map_err(launch_error)?;
        }
        caps.add_arg(&format!(
            "--window-size={},{}",
            self.settings.window_width, self.settings.window_height
        ))
        .map_err(launch_error)?;
        caps.add_arg(&format!("user-agent={}", self.settings.user_agent))
            .map_err(launch_error)?;

        let driver = WebDriver::new(&self.settings.webdriver_url, caps)
            .await
            .map_err(launch_error)?;
        info!("WebDriver session started via {}", self.settings.webdriver_url);

        Ok(WebDriverSession {
            driver,
            poll_interval: self.poll_interval,
        })
    }
}

pub struct WebDriverSession {
    driver: WebDriver,
    poll_interval: Duration,
}

fn by(locator: &Locator) -> By {
    match locator {
        Locator::Id(value) => By::Id(value.as_str()),
        Locator::ClassName(value) => By::ClassName(value.as_str()),
        Locator::Css(value) => By::Css(value.as_str()),
        Locator::XPath(value) => By::XPath(value.as_str()),
    }
}

fn launch_error(e: WebDriverError) -> BrowserError {
    BrowserError::Launch(e.to_string())
}

fn driver_error(e: WebDriverError) -> BrowserError {
    BrowserError::Driver(e.to_string())
}

/// Only a missing element counts as a timed-out wait; a dead session or
/// transport failure stays a driver error.
fn wait_error(locator: &Locator, waited: Duration, e: WebDriverError) -> BrowserError {
    match e {
        WebDriverError::NoSuchElement(_) | WebDriverError::Timeout(_) => {
            debug!("Waiting for {} failed: {}", locator, e);
            BrowserError::WaitTimedOut {
                locator: locator.clone(),
                waited,
            }
        }
        other => driver_error(other),
    }
}

fn find_error(locator: &Locator, e: WebDriverError) -> BrowserError {
    match e {
        WebDriverError::NoSuchElement(_) => BrowserError::NotFound(locator.clone()),
        other => driver_error(other),
    }
}

#[async_trait]
impl BrowserSession for WebDriverSession {
    type Element = WebElement;

    async fn open(&mut self, url: &str) -> Result<(), BrowserError> {
        self.driver.goto(url).await.map_err(driver_error)
    }

    async fn wait_for(
        &mut self,
        locator: &Locator,
        timeout: Duration,
    ) -> Result<WebElement, BrowserError> {
        self.driver
            .query(by(locator))
            .wait(timeout, self.poll_interval)
            .first()
            .await
            .map_err(|e| wait_error(locator, timeout, e))
    }

    async fn wait_for_within(
        &mut self,
        parent: &WebElement,
        locator: &Locator,
        timeout: Duration,
    ) -> Result<WebElement, BrowserError> {
        parent
            .query(by(locator))
            .wait(timeout, self.poll_interval)
            .first()
            .await
            .map_err(|e| wait_error(locator, timeout, e))
    }

    async fn find_within(
        &mut self,
        parent: &WebElement,
        locator: &Locator,
    ) -> Result<WebElement, BrowserError> {
        parent
            .find(by(locator))
            .await
            .map_err(|e| find_error(locator, e))
    }

    async fn find_all(&mut self, locator: &Locator) -> Result<Vec<WebElement>, BrowserError> {
        self.driver.find_all(by(locator)).await.map_err(driver_error)
    }

    async fn click(&mut self, element: &WebElement) -> Result<(), BrowserError> {
        element.click().await.map_err(driver_error)
    }

    async fn scroll_into_view(&mut self, element: &WebElement) -> Result<(), BrowserError> {
        element.scroll_into_view().await.map_err(driver_error)
    }

    async fn type_text(&mut self, element: &WebElement, text: &str) -> Result<(), BrowserError> {
        element.clear().await.map_err(driver_error)?;
        element.send_keys(text).await.map_err(driver_error)
    }

    async fn read_text(&mut self, element: &WebElement) -> Result<String, BrowserError> {
        element.text().await.map_err(driver_error)
    }

    async fn read_inner_html(&mut self, element: &WebElement) -> Result<String, BrowserError> {
        element.inner_html().await.map_err(driver_error)
    }

    async fn is_stale(&mut self, element: &WebElement) -> Result<bool, BrowserError> {
        element
            .is_present()
            .await
            .map(|present| !present)
            .map_err(driver_error)
    }

    async fn quit(self) -> Result<(), BrowserError> {
        self.driver.quit().await.map_err(driver_error)
    }
}
