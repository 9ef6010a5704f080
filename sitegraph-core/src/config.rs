//! Loader configuration.
//!
//! Every recognized field has its default declared once in [`Default`]; the
//! JSON config file uses the same defaults for any field it omits.

use crate::error::Result;
use crate::rank::RankOptions;
use serde::{Deserialize, Serialize};
use sitegraph_scanner::ScanError;
use sitegraph_scanner::crawler::{DEFAULT_EXCLUDED_EXTENSIONS, DEFAULT_LINK_TIMEOUT_SECS};
use sitegraph_scanner::fetch::DEFAULT_USER_AGENT;
use std::path::{Path, PathBuf};
use url::Url;

pub const DEFAULT_MAX_PAGES: usize = 10;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoaderConfig {
    pub seed_url: Option<String>,
    pub max_pages: usize,
    pub excluded_extensions: Vec<String>,
    pub damping: f64,
    pub tolerance: f64,
    pub max_iterations: usize,
    pub workers: usize,
    pub link_timeout_secs: u64,
    /// No timeout when unset.
    pub render_timeout_secs: Option<u64>,
    pub render_retries: usize,
    pub user_agent: String,
    /// Headless Chromium used for content rendering. Plain HTTP when unset.
    pub browser: Option<PathBuf>,
}

impl Default for LoaderConfig {
    fn default() -> Self {
        let rank = RankOptions::default();
        Self {
            seed_url: None,
            max_pages: DEFAULT_MAX_PAGES,
            excluded_extensions: DEFAULT_EXCLUDED_EXTENSIONS
                .iter()
                .map(|ext| ext.to_string())
                .collect(),
            damping: rank.damping,
            tolerance: rank.tolerance,
            max_iterations: rank.max_iterations,
            workers: 1,
            link_timeout_secs: DEFAULT_LINK_TIMEOUT_SECS,
            render_timeout_secs: None,
            render_retries: 0,
            user_agent: DEFAULT_USER_AGENT.to_string(),
            browser: None,
        }
    }
}

impl LoaderConfig {
    pub fn with_seed_url(mut self, seed_url: impl Into<String>) -> Self {
        self.seed_url = Some(seed_url.into());
        self
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&raw)?)
    }

    /// Rejects configurations that cannot produce a crawl, before any network
    /// activity happens.
    pub fn validate(&self) -> std::result::Result<(), ScanError> {
        let seed = self
            .seed_url
            .as_deref()
            .ok_or_else(|| ScanError::Config("seed_url is required".to_string()))?;
        let parsed = Url::parse(seed)
            .map_err(|e| ScanError::Config(format!("invalid seed_url '{}': {}", seed, e)))?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(ScanError::Config(format!(
                "seed_url must be http or https, got '{}'",
                parsed.scheme()
            )));
        }
        if self.max_pages == 0 {
            return Err(ScanError::Config("max_pages must be at least 1".to_string()));
        }
        if !(self.damping > 0.0 && self.damping < 1.0) {
            return Err(ScanError::Config(format!(
                "damping must be in (0, 1), got {}",
                self.damping
            )));
        }
        if self.tolerance <= 0.0 || !self.tolerance.is_finite() {
            return Err(ScanError::Config(format!(
                "tolerance must be positive, got {}",
                self.tolerance
            )));
        }
        if self.max_iterations == 0 {
            return Err(ScanError::Config(
                "max_iterations must be at least 1".to_string(),
            ));
        }
        if self.workers == 0 {
            return Err(ScanError::Config("workers must be at least 1".to_string()));
        }
        Ok(())
    }

    pub fn rank_options(&self) -> RankOptions {
        RankOptions {
            damping: self.damping,
            tolerance: self.tolerance,
            max_iterations: self.max_iterations,
        }
    }
}
