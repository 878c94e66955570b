//! Watcher settings
//!
//! Priority order for each value:
//! 1. Command-line argument / environment variable (via clap)
//! 2. TOML config file
//! 3. Profile default

use crate::feed::{FeedFormat, FeedProfile, SlicePlan};
use crate::normalize::VerdictTable;
use crate::render::RenderSettings;
use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;
use verdict_common::config::LoggingConfig;
use verdict_common::{Error, Result};

/// Default feed host
pub const DEFAULT_BASE_URL: &str = "http://extras.denverpost.com/app/trial-results/output";

const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

/// Config file contents. Every key is optional.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct FeedConfig {
    pub base_url: Option<String>,
    pub profile: Option<FeedProfile>,
    pub format: Option<FeedFormat>,
    pub refresh_secs: Option<u64>,
    pub request_timeout_secs: Option<u64>,
    pub verdict_table: Option<VerdictTable>,
    pub suppress_enhancer_colon: Option<bool>,
    pub output: Option<PathBuf>,

    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Values given on the command line or through the environment
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub base_url: Option<String>,
    pub profile: Option<FeedProfile>,
    pub format: Option<FeedFormat>,
    pub refresh_secs: Option<u64>,
    pub output: Option<PathBuf>,
}

/// Fully resolved watcher settings
#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub base_url: String,
    pub profile: FeedProfile,
    pub format: FeedFormat,
    pub refresh: Duration,
    pub request_timeout: Duration,
    pub render: RenderSettings,
    /// Output file; stdout when `None`
    pub output: Option<PathBuf>,
}

impl Settings {
    pub fn resolve(config: &FeedConfig, overrides: &Overrides) -> Result<Self> {
        let profile = overrides
            .profile
            .or(config.profile)
            .unwrap_or(FeedProfile::Trial);

        let base_url = overrides
            .base_url
            .clone()
            .or_else(|| config.base_url.clone())
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string());
        if !(base_url.starts_with("http://") || base_url.starts_with("https://")) {
            return Err(Error::InvalidInput(format!(
                "base_url must be an http(s) URL: {}",
                base_url
            )));
        }

        let refresh = match overrides.refresh_secs.or(config.refresh_secs) {
            Some(0) => {
                return Err(Error::InvalidInput(
                    "refresh_secs must be greater than zero".to_string(),
                ))
            }
            Some(secs) => Duration::from_secs(secs),
            None => profile.default_refresh(),
        };

        let request_timeout = match config.request_timeout_secs {
            Some(0) => {
                return Err(Error::InvalidInput(
                    "request_timeout_secs must be greater than zero".to_string(),
                ))
            }
            Some(secs) => Duration::from_secs(secs),
            None => Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
        };

        Ok(Self {
            base_url,
            profile,
            format: overrides
                .format
                .or(config.format)
                .unwrap_or(FeedFormat::Jsonp),
            refresh,
            request_timeout,
            render: RenderSettings {
                table: config.verdict_table.unwrap_or(profile.default_table()),
                suppress_enhancer_colon: config
                    .suppress_enhancer_colon
                    .unwrap_or(profile.default_suppress_enhancer_colon()),
            },
            output: overrides.output.clone().or_else(|| config.output.clone()),
        })
    }

    pub fn slice_plan(&self) -> SlicePlan {
        self.profile.slice_plan()
    }
}
