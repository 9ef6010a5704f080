use crate::error::{Result, ScanError};
use crate::extract::{extract_links, site_scope};
use crate::fetch::{DEFAULT_USER_AGENT, HttpRenderer, Renderer};
use futures::future::join_all;
use std::collections::{HashSet, VecDeque};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};
use url::Url;

pub type ProgressCallback = Arc<dyn Fn(usize, String) + Send + Sync>;

/// Binary and office document types that are never queued.
pub const DEFAULT_EXCLUDED_EXTENSIONS: &[&str] =
    &["pdf", "jpg", "png", "docx", "xlsx", "pptx", "zip", "jpeg"];

pub const DEFAULT_LINK_TIMEOUT_SECS: u64 = 10;

/// Breadth-first, same-site crawler bounded by a page budget.
///
/// The crawler only discovers URLs; page content is produced separately by
/// [`crate::fetch::ContentFetcher`].
pub struct Crawler {
    renderer: Arc<dyn Renderer>,
    excluded_extensions: Vec<String>,
    workers: usize,
    progress_callback: Option<ProgressCallback>,
}

impl Crawler {
    /// HTTP link discovery with the default 10 second timeout.
    pub fn new() -> Result<Self> {
        Self::with_timeout(DEFAULT_LINK_TIMEOUT_SECS)
    }

    pub fn with_timeout(timeout_secs: u64) -> Result<Self> {
        let renderer = HttpRenderer::new(DEFAULT_USER_AGENT, Some(Duration::from_secs(timeout_secs)))?;
        Ok(Self::with_renderer(Arc::new(renderer)))
    }

    pub fn with_renderer(renderer: Arc<dyn Renderer>) -> Self {
        Self {
            renderer,
            excluded_extensions: DEFAULT_EXCLUDED_EXTENSIONS
                .iter()
                .map(|ext| ext.to_string())
                .collect(),
            workers: 1,
            progress_callback: None,
        }
    }

    pub fn with_excluded_extensions(mut self, extensions: Vec<String>) -> Self {
        self.excluded_extensions = extensions
            .into_iter()
            .map(|ext| ext.trim_start_matches('.').to_lowercase())
            .collect();
        self
    }

    /// Number of frontier entries fetched concurrently per round.
    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers.max(1);
        self
    }

    pub fn with_progress_callback(mut self, callback: ProgressCallback) -> Self {
        self.progress_callback = Some(callback);
        self
    }

    /// Crawls from `seed_url` and returns the sorted visited URLs, at most
    /// `max_pages` of them.
    pub async fn crawl(&self, seed_url: &str, max_pages: usize) -> Result<Vec<String>> {
        if max_pages == 0 {
            return Err(ScanError::Config("max_pages must be at least 1".to_string()));
        }
        let parsed = Url::parse(seed_url)
            .map_err(|e| ScanError::InvalidUrl(format!("{}: {}", seed_url, e)))?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(ScanError::InvalidUrl(format!(
                "{}: only http and https are supported",
                seed_url
            )));
        }

        let base_url = site_scope(parsed.as_str());
        info!(
            "Getting all pages for base url: {}, maximum number is: {}",
            base_url, max_pages
        );

        let mut frontier: VecDeque<String> = VecDeque::from([base_url.clone()]);
        let mut queued: HashSet<String> = HashSet::from([base_url.clone()]);
        let mut visited: Vec<String> = Vec::new();
        let mut visited_set: HashSet<String> = HashSet::new();

        while !frontier.is_empty() && visited.len() < max_pages {
            let room = self.workers.min(max_pages - visited.len());
            let mut batch = Vec::with_capacity(room);

            while batch.len() < room {
                let Some(url) = frontier.pop_front() else {
                    break;
                };
                queued.remove(&url);
                if !visited_set.insert(url.clone()) {
                    continue;
                }
                visited.push(url.clone());
                if let Some(ref callback) = self.progress_callback {
                    callback(visited.len(), url.clone());
                }
                batch.push(url);
            }

            let expansions = join_all(
                batch
                    .iter()
                    .map(|url| self.outgoing_links(url, &base_url)),
            )
            .await;

            // Applied in dequeue order so concurrency never changes the result.
            for links in expansions {
                for link in links {
                    if !visited_set.contains(&link) && queued.insert(link.clone()) {
                        frontier.push_back(link);
                    }
                }
            }
        }

        visited.sort();
        visited.truncate(max_pages);
        info!("Crawl complete. Visited {} pages", visited.len());
        debug!("URLs visited: {:?}", visited);
        Ok(visited)
    }

    /// Same-site links of one page. Failures are logged and yield no links.
    async fn outgoing_links(&self, url: &str, base_url: &str) -> Vec<String> {
        let html = match self.renderer.render(url).await {
            Ok(html) => html,
            Err(e) => {
                warn!("Fail to get the page from {}: {}", url, e);
                return Vec::new();
            }
        };

        let links = match extract_links(&html, url) {
            Ok(links) => links,
            Err(e) => {
                warn!("Fail to parse links on {}: {}", url, e);
                return Vec::new();
            }
        };

        let mut seen = HashSet::new();
        links
            .into_iter()
            .filter(|link| self.is_candidate(link, base_url))
            .filter(|link| seen.insert(link.clone()))
            .collect()
    }

    fn is_candidate(&self, url: &str, base_url: &str) -> bool {
        !url.is_empty()
            && url != base_url
            && url.starts_with(base_url)
            && !has_excluded_extension(url, &self.excluded_extensions)
    }
}

/// Whether the URL's path ends in one of `extensions` (case-insensitive).
pub fn has_excluded_extension(url: &str, extensions: &[String]) -> bool {
    let path = Url::parse(url)
        .map(|parsed| parsed.path().to_lowercase())
        .unwrap_or_else(|_| url.to_lowercase());

    extensions
        .iter()
        .any(|ext| path.ends_with(&format!(".{}", ext.trim_start_matches('.').to_lowercase())))
}
