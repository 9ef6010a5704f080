//! The crawl, fetch, persist and rank pipeline.

use crate::config::LoaderConfig;
use crate::data::Database;
use crate::error::{LoadError, Result};
use crate::rank::{RankedPage, ReferenceGraph, candidate_limit, rank_with_graph};
use crate::store::PageSet;
use indicatif::{ProgressBar, ProgressStyle};
use sitegraph_scanner::extract::site_scope;
use sitegraph_scanner::{
    BrowserRenderer, ContentFetcher, Crawler, HttpRenderer, Page, PageTarget, ProgressCallback,
    Renderer, load_local_file,
};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};
use url::Url;

/// Everything a pipeline run produced.
pub struct LoadOutcome {
    pub pages: Vec<Page>,
    pub graph: ReferenceGraph,
    pub ranked: Vec<RankedPage>,
    /// True when the pages came from an existing page-set file.
    pub from_cache: bool,
}

pub struct Loader {
    config: LoaderConfig,
    link_renderer: Arc<dyn Renderer>,
    content_renderer: Arc<dyn Renderer>,
    show_progress_bars: bool,
    refresh: bool,
}

/// Extract the path component from a URL
pub fn extract_url_path(url: &str) -> String {
    Url::parse(url)
        .ok()
        .map(|u| {
            let path = u.path().to_string();
            if path.is_empty() || path == "/" {
                "/".to_string()
            } else {
                path
            }
        })
        .unwrap_or_else(|| url.to_string())
}

fn spinner(message: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.cyan} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    pb.set_message(message.to_string());
    pb
}

impl Loader {
    /// Builds HTTP link discovery and either HTTP or headless-browser content
    /// rendering from the config.
    pub fn new(config: LoaderConfig) -> Result<Self> {
        config.validate()?;

        let link_renderer = HttpRenderer::new(
            &config.user_agent,
            Some(Duration::from_secs(config.link_timeout_secs)),
        )?;
        let render_timeout = config.render_timeout_secs.map(Duration::from_secs);
        let content_renderer: Arc<dyn Renderer> = match &config.browser {
            Some(binary) => Arc::new(BrowserRenderer::new(
                binary.clone(),
                &config.user_agent,
                render_timeout,
            )),
            None => Arc::new(
                HttpRenderer::new(&config.user_agent, render_timeout)?
                    .with_retries(config.render_retries),
            ),
        };

        Ok(Self {
            config,
            link_renderer: Arc::new(link_renderer),
            content_renderer,
            show_progress_bars: false,
            refresh: false,
        })
    }

    pub fn with_renderers(
        config: LoaderConfig,
        link_renderer: Arc<dyn Renderer>,
        content_renderer: Arc<dyn Renderer>,
    ) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            link_renderer,
            content_renderer,
            show_progress_bars: false,
            refresh: false,
        })
    }

    pub fn with_progress_bars(mut self, show: bool) -> Self {
        self.show_progress_bars = show;
        self
    }

    /// Ignore an existing page-set file and crawl again.
    pub fn with_refresh(mut self, refresh: bool) -> Self {
        self.refresh = refresh;
        self
    }

    pub fn config(&self) -> &LoaderConfig {
        &self.config
    }

    pub fn seed_url(&self) -> &str {
        self.config.seed_url.as_deref().unwrap_or_default()
    }

    /// Discovers same-site URLs from the seed.
    pub async fn crawl_urls(&self) -> Result<Vec<String>> {
        let progress_bar = self.show_progress_bars.then(|| Arc::new(spinner("Starting crawl...")));

        let mut crawler = Crawler::with_renderer(self.link_renderer.clone())
            .with_excluded_extensions(self.config.excluded_extensions.clone())
            .with_workers(self.config.workers);

        if let Some(ref pb) = progress_bar {
            let pb_clone = pb.clone();
            let callback: ProgressCallback = Arc::new(move |visited: usize, url: String| {
                pb_clone.set_message(format!("Crawling... {} URLs visited ({})", visited, url));
                pb_clone.tick();
            });
            crawler = crawler.with_progress_callback(callback);
        }

        let urls = crawler
            .crawl(self.seed_url(), self.config.max_pages)
            .await?;

        if let Some(ref pb) = progress_bar {
            pb.finish_with_message(format!("Crawl complete! {} URLs found", urls.len()));
        }
        Ok(urls)
    }

    /// Fetches content for crawled URLs, numbering them in order.
    pub async fn fetch_pages(&self, urls: &[String]) -> Vec<Page> {
        let scope = site_scope(self.seed_url());
        let fetcher = ContentFetcher::new(self.content_renderer.clone(), scope);
        let targets = PageTarget::enumerate(urls);

        let progress_bar = self
            .show_progress_bars
            .then(|| spinner(&format!("Fetching {} pages...", targets.len())));
        let pages = fetcher.fetch_all(&targets).await;
        if let Some(pb) = progress_bar {
            let failed = pages.iter().filter(|p| p.is_error).count();
            pb.finish_with_message(format!(
                "Fetched {} pages ({} failed)",
                pages.len(),
                failed
            ));
        }
        pages
    }

    pub async fn crawl_pages(&self) -> Result<Vec<Page>> {
        let urls = self.crawl_urls().await?;
        Ok(self.fetch_pages(&urls).await)
    }

    /// Ranks pages, keeping as many candidates as the page budget implies.
    pub fn rank(&self, pages: &[Page]) -> (ReferenceGraph, Vec<RankedPage>) {
        let graph = ReferenceGraph::build(pages);
        let ranked = rank_with_graph(
            pages,
            &graph,
            candidate_limit(self.config.max_pages),
            &self.config.rank_options(),
        );
        (graph, ranked)
    }

    /// Full pipeline. An existing page set at `output` for the same seed is
    /// reused instead of crawling; otherwise the crawl result is saved there.
    pub async fn load(&self, output: &Path) -> Result<LoadOutcome> {
        let cached = if self.refresh {
            None
        } else {
            self.cached_pages(output)?
        };

        let (pages, from_cache) = match cached {
            Some(pages) => (pages, true),
            None => {
                let pages = self.crawl_pages().await?;
                PageSet::new(self.seed_url(), pages.clone()).save(output)?;
                info!("Saved {} pages to {}", pages.len(), output.display());
                (pages, false)
            }
        };

        let (graph, ranked) = self.rank(&pages);
        Ok(LoadOutcome {
            pages,
            graph,
            ranked,
            from_cache,
        })
    }

    fn cached_pages(&self, output: &Path) -> Result<Option<Vec<Page>>> {
        if !output.exists() {
            return Ok(None);
        }
        let page_set = PageSet::load(output)?;
        if site_scope(&page_set.seed_url) != site_scope(self.seed_url()) {
            warn!(
                "Ignoring {}: it was crawled from {}, not {}",
                output.display(),
                page_set.seed_url,
                self.seed_url()
            );
            return Ok(None);
        }
        info!(
            "Loaded {} cached pages from {}",
            page_set.pages.len(),
            output.display()
        );
        Ok(Some(page_set.pages))
    }
}

/// Ingests local documents. Ids continue from `first_id` so they can be
/// appended to a crawl's pages.
pub async fn load_local_files(paths: &[PathBuf], first_id: usize) -> Vec<Page> {
    let mut pages = Vec::with_capacity(paths.len());
    for (offset, path) in paths.iter().enumerate() {
        pages.push(load_local_file(&(first_id + offset).to_string(), path).await);
    }
    pages
}

/// Records pages, reference edges and scores under a new session.
pub fn record_session(
    db: &Database,
    config: &LoaderConfig,
    pages: &[Page],
    graph: &ReferenceGraph,
    ranked: &[RankedPage],
) -> Result<String> {
    let seed_url = config
        .seed_url
        .as_deref()
        .ok_or_else(|| LoadError::Config("seed_url is required".to_string()))?;
    let configuration = serde_json::to_string(config)?;
    let session_id = db.create_session(seed_url, Some(&configuration))?;

    let stored = db
        .insert_pages(&session_id, pages)
        .and_then(|_| db.insert_edges(&session_id, pages, graph))
        .and_then(|_| db.insert_scores(&session_id, ranked));

    match stored {
        Ok(_) => {
            db.complete_session(&session_id)?;
            Ok(session_id)
        }
        Err(e) => {
            if let Err(fail_err) = db.fail_session(&session_id) {
                warn!("Could not mark session {} failed: {}", session_id, fail_err);
            }
            Err(e.into())
        }
    }
}

/// Short per-host listing of fetched pages
pub fn generate_crawl_summary(pages: &[Page]) -> String {
    let mut report = String::new();
    report.push_str("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━\n\n");
    report.push_str("# Summary:\n");
    report.push_str(&format!("  Pages fetched: {}\n", pages.len()));
    report.push_str(&format!(
        "  Failed fetches: {}\n",
        pages.iter().filter(|p| p.is_error).count()
    ));
    report.push_str("\n━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━\n\n");

    let mut by_host: BTreeMap<String, Vec<&Page>> = BTreeMap::new();
    for page in pages {
        let host = Url::parse(&page.url)
            .ok()
            .and_then(|u| u.host_str().map(String::from))
            .unwrap_or_else(|| "local".to_string());
        by_host.entry(host).or_default().push(page);
    }

    for (host, host_pages) in &by_host {
        report.push_str(&format!("## {}\n", host));
        report.push_str(&format!("  {} pages\n\n", host_pages.len()));
        for page in host_pages {
            let marker = if page.is_error { "✗" } else { "✓" };
            report.push_str(&format!(
                "  {} [{}] {}\n",
                marker,
                page.id,
                extract_url_path(&page.url)
            ));
        }
        report.push('\n');
    }

    report
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_url_path() {
        assert_eq!(extract_url_path("https://example.com"), "/");
        assert_eq!(extract_url_path("https://example.com/docs/a"), "/docs/a");
        assert_eq!(extract_url_path("notes.txt"), "notes.txt");
    }

    #[test]
    fn test_crawl_summary_groups_by_host() {
        let pages = vec![
            Page::new("0", "https://example.com/a", "A".to_string(), String::new()),
            Page::with_error("1", "https://example.com/b", "boom".to_string()),
        ];
        let summary = generate_crawl_summary(&pages);
        assert!(summary.contains("Pages fetched: 2"));
        assert!(summary.contains("Failed fetches: 1"));
        assert!(summary.contains("## example.com"));
        assert!(summary.contains("✗ [1] /b"));
    }
}
