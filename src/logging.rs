// Process logging: `log` facade records routed to syslog.
// Consumes Settings: hoverpeek.log.level.
use log::LevelFilter;
use syslog::Facility;
use thiserror::Error;

use crate::settings::{LOG_LEVEL_KEY, Settings};

pub const APP_NAME: &str = "hoverpeek";

#[derive(Debug, Error)]
pub enum LoggingError {
    #[error("unable to connect to syslog: {0}")]
    Syslog(#[from] syslog::Error),
}

pub fn init(level: LevelFilter) -> Result<(), LoggingError> {
    syslog::init(Facility::LOG_USER, level, Some(APP_NAME))?;
    log::debug!("logging initialized at {level}");
    Ok(())
}

/// Configured level, `info` when unset or unparseable.
pub fn level_from_settings(settings: &Settings) -> LevelFilter {
    settings.get_parsed_or(LOG_LEVEL_KEY, LevelFilter::Info)
}

pub fn init_from_settings(settings: &Settings) -> Result<(), LoggingError> {
    init(level_from_settings(settings))
}
