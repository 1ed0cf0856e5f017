use anyhow::{bail, Context, Result};
use config::builder::DefaultState;
use config::{ConfigBuilder, Environment, File, FileFormat};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use url::Url;

/// Environment variable naming an explicit configuration file.
pub const CONFIG_PATH_ENV: &str = "SCRAPER_CONFIG";
const DEFAULT_CONFIG_FILE: &str = "scraper";
const ENV_PREFIX: &str = "SCRAPER";

/// Process-wide settings. Loaded once at start-up and shared read-only.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub base_url: String,
    pub category: String,
    pub segments: Vec<String>,
    pub rating_filter_id: String,
    pub output_path: PathBuf,
    pub cache: CacheSettings,
    pub browser: BrowserSettings,
    pub timeouts: TimeoutSettings,
    pub notifications: NotificationSettings,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CacheBackend {
    File,
    Sqlite,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheSettings {
    pub enabled: bool,
    pub ttl_hours: u32,
    pub backend: CacheBackend,
    pub dir: PathBuf,
    pub sqlite_path: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BrowserSettings {
    pub webdriver_url: String,
    pub headless: bool,
    pub window_width: u32,
    pub window_height: u32,
    pub user_agent: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TimeoutSettings {
    pub navigation_secs: u64,
    pub region_prompt_secs: u64,
    pub results_secs: u64,
    pub filter_locate_secs: u64,
    pub filter_refresh_secs: u64,
    pub title_secs: u64,
    pub rating_secs: u64,
    pub settle_ms: u64,
    pub card_settle_ms: u64,
    pub poll_ms: u64,
    // 0 disables the per-segment deadline
    pub segment_deadline_secs: u64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct NotificationSettings {
    pub enabled: bool,
    pub webhook_url: Option<String>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            base_url: "https://www.bestbuy.com".to_string(),
            category: "Laptops".to_string(),
            segments: vec!["HP".to_string(), "Dell".to_string(), "Apple".to_string()],
            rating_filter_id: "customer-rating-4_&_Up".to_string(),
            output_path: PathBuf::from("data/all_laptops.json"),
            cache: CacheSettings::default(),
            browser: BrowserSettings::default(),
            timeouts: TimeoutSettings::default(),
            notifications: NotificationSettings::default(),
        }
    }
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            ttl_hours: 24,
            backend: CacheBackend::File,
            dir: PathBuf::from("data/cache"),
            sqlite_path: PathBuf::from("data/cache/segments.db"),
        }
    }
}

impl Default for BrowserSettings {
    fn default() -> Self {
        Self {
            webdriver_url: "http://localhost:9515".to_string(),
            headless: true,
            window_width: 1920,
            window_height: 1080,
            user_agent: "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/91.0.4472.124 Safari/537.36".to_string(),
        }
    }
}

impl Default for TimeoutSettings {
    fn default() -> Self {
        Self {
            navigation_secs: 15,
            region_prompt_secs: 10,
            results_secs: 10,
            filter_locate_secs: 10,
            filter_refresh_secs: 15,
            title_secs: 5,
            rating_secs: 3,
            settle_ms: 1000,
            card_settle_ms: 500,
            poll_ms: 250,
            segment_deadline_secs: 600,
        }
    }
}

impl TimeoutSettings {
    pub fn navigation(&self) -> Duration {
        Duration::from_secs(self.navigation_secs)
    }

    pub fn region_prompt(&self) -> Duration {
        Duration::from_secs(self.region_prompt_secs)
    }

    pub fn results(&self) -> Duration {
        Duration::from_secs(self.results_secs)
    }

    pub fn filter_locate(&self) -> Duration {
        Duration::from_secs(self.filter_locate_secs)
    }

    pub fn filter_refresh(&self) -> Duration {
        Duration::from_secs(self.filter_refresh_secs)
    }

    pub fn title(&self) -> Duration {
        Duration::from_secs(self.title_secs)
    }

    pub fn rating(&self) -> Duration {
        Duration::from_secs(self.rating_secs)
    }

    pub fn settle(&self) -> Duration {
        Duration::from_millis(self.settle_ms)
    }

    pub fn card_settle(&self) -> Duration {
        Duration::from_millis(self.card_settle_ms)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_ms.max(1))
    }

    pub fn segment_deadline(&self) -> Option<Duration> {
        (self.segment_deadline_secs > 0).then(|| Duration::from_secs(self.segment_deadline_secs))
    }
}

impl CacheSettings {
    pub fn ttl(&self) -> chrono::Duration {
        chrono::Duration::hours(i64::from(self.ttl_hours))
    }
}

impl Settings {
    /// Load settings from `scraper.toml` (or `$SCRAPER_CONFIG`) and
    /// `SCRAPER__*` environment variables, on top of the built-in defaults.
    pub fn load() -> Result<Self> {
        let file = match std::env::var(CONFIG_PATH_ENV) {
            Ok(path) => File::with_name(&path).required(true),
            Err(_) => File::with_name(DEFAULT_CONFIG_FILE).required(false),
        };

        let environment = Environment::with_prefix(ENV_PREFIX)
            .separator("__")
            .list_separator(",")
            .with_list_parse_key("segments")
            .try_parsing(true);

        Self::build(
            config::Config::builder()
                .add_source(file)
                .add_source(environment),
        )
    }

    pub fn from_toml_str(contents: &str) -> Result<Self> {
        Self::build(config::Config::builder().add_source(File::from_str(contents, FileFormat::Toml)))
    }

    fn build(builder: ConfigBuilder<DefaultState>) -> Result<Self> {
        let settings: Settings = builder
            .build()
            .context("Failed to read configuration sources")?
            .try_deserialize()
            .context("Failed to deserialize configuration")?;
        settings.validated()
    }

    fn validated(mut self) -> Result<Self> {
        Url::parse(&self.base_url)
            .with_context(|| format!("Invalid catalog base_url: {}", self.base_url))?;
        Url::parse(&self.browser.webdriver_url).with_context(|| {
            format!("Invalid browser.webdriver_url: {}", self.browser.webdriver_url)
        })?;

        if self.category.trim().is_empty() {
            bail!("category must not be empty");
        }
        if self.rating_filter_id.trim().is_empty() {
            bail!("rating_filter_id must not be empty");
        }

        self.segments = self.segments.iter().map(|s| s.trim().to_string()).collect();
        if let Some(position) = self.segments.iter().position(|s| s.is_empty()) {
            bail!("segment #{} is empty", position + 1);
        }

        Ok(self)
    }
}
