pub mod browser;
pub mod config;
pub mod models;
pub mod notify;
pub mod orchestrator;
pub mod parsers;
pub mod scrapers;
pub mod storage;
pub mod utils;

pub use orchestrator::{Orchestrator, RunOutput};
