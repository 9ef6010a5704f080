//! Page rendering and content fetching.
//!
//! A [`Renderer`] turns a URL into HTML. The crawler uses one for link
//! discovery and the [`ContentFetcher`] uses one (possibly a headless browser)
//! to produce [`Page`] records.

use crate::error::{Result, ScanError};
use crate::extract::{HrefMode, extract_text};
use crate::result::{Page, PageTarget};
use async_trait::async_trait;
use reqwest::Client;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::process::Command;
use tracing::{debug, info, warn};

pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) \
    AppleWebKit/605.1.15 (KHTML, like Gecko) Version/14.0.3 Safari/605.1.15";

/// Anything that can produce the HTML of a URL.
#[async_trait]
pub trait Renderer: Send + Sync {
    async fn render(&self, url: &str) -> Result<String>;
}

/// Plain HTTP GET renderer. Non-success statuses are errors.
pub struct HttpRenderer {
    client: Client,
    retries: usize,
}

impl HttpRenderer {
    pub fn new(user_agent: &str, timeout: Option<Duration>) -> Result<Self> {
        let mut builder = Client::builder()
            .user_agent(user_agent)
            .pool_max_idle_per_host(10)
            .pool_idle_timeout(Duration::from_secs(90))
            .redirect(reqwest::redirect::Policy::limited(5));
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        let client = builder.build()?;

        Ok(Self { client, retries: 0 })
    }

    /// Retry transient failures (transport errors and 5xx) up to `retries` times.
    pub fn with_retries(mut self, retries: usize) -> Self {
        self.retries = retries;
        self
    }

    async fn get_once(&self, url: &str) -> Result<String> {
        let response = self.client.get(url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(ScanError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }
        Ok(response.text().await?)
    }
}

fn is_transient(err: &ScanError) -> bool {
    match err {
        ScanError::HttpError(_) => true,
        ScanError::Status { status, .. } => *status >= 500,
        _ => false,
    }
}

#[async_trait]
impl Renderer for HttpRenderer {
    async fn render(&self, url: &str) -> Result<String> {
        let mut attempt = 0;
        loop {
            match self.get_once(url).await {
                Ok(body) => return Ok(body),
                Err(e) if attempt < self.retries && is_transient(&e) => {
                    attempt += 1;
                    debug!("Retrying {} ({}/{}): {}", url, attempt, self.retries, e);
                    tokio::time::sleep(Duration::from_millis(200 * attempt as u64)).await;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

/// Renders pages through a headless Chromium so that script-generated content
/// is present in the returned DOM.
pub struct BrowserRenderer {
    binary: PathBuf,
    timeout: Option<Duration>,
    user_agent: String,
}

impl BrowserRenderer {
    pub fn new(binary: impl Into<PathBuf>, user_agent: &str, timeout: Option<Duration>) -> Self {
        Self {
            binary: binary.into(),
            timeout,
            user_agent: user_agent.to_string(),
        }
    }
}

#[async_trait]
impl Renderer for BrowserRenderer {
    async fn render(&self, url: &str) -> Result<String> {
        let mut cmd = Command::new(&self.binary);
        cmd.arg("--headless")
            .arg("--no-sandbox")
            .arg("--disable-gpu")
            .arg("--disable-dev-shm-usage")
            .arg("--disable-extensions")
            .arg(format!("--user-agent={}", self.user_agent))
            .arg("--dump-dom")
            .arg(url)
            .kill_on_drop(true);

        let output = match self.timeout {
            Some(timeout) => tokio::time::timeout(timeout, cmd.output())
                .await
                .map_err(|_| ScanError::RenderError(format!("Timed out rendering {}", url)))??,
            None => cmd.output().await?,
        };

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(ScanError::RenderError(format!(
                "{} exited with {}: {}",
                self.binary.display(),
                output.status,
                stderr.trim()
            )));
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

/// Produces [`Page`] records for URLs inside one site.
pub struct ContentFetcher {
    renderer: Arc<dyn Renderer>,
    scope: String,
}

impl ContentFetcher {
    /// `scope` is the crawl's base URL; only hrefs under it are kept in content.
    pub fn new(renderer: Arc<dyn Renderer>, scope: impl Into<String>) -> Self {
        Self {
            renderer,
            scope: scope.into(),
        }
    }

    /// Never fails: render or parse errors become an error page.
    pub async fn fetch_content(&self, id: &str, url: &str) -> Page {
        info!("Loading url: {}", url);
        match self.try_fetch(id, url).await {
            Ok(page) => page,
            Err(e) => {
                warn!("Error crawling {}: {}", url, e);
                Page::with_error(id, url, e.to_string())
            }
        }
    }

    async fn try_fetch(&self, id: &str, url: &str) -> Result<Page> {
        let html = self.renderer.render(url).await?;
        let extracted = extract_text(
            &html,
            HrefMode::SameSite {
                page_url: url,
                scope: &self.scope,
            },
        )?;
        let title = extracted.title.unwrap_or_else(|| url.to_string());
        Ok(Page::new(id, url, title, extracted.text))
    }

    /// Fetches targets one after another, preserving their order.
    pub async fn fetch_all(&self, targets: &[PageTarget]) -> Vec<Page> {
        info!("Start crawling {} urls", targets.len());
        let mut pages = Vec::with_capacity(targets.len());
        for target in targets {
            pages.push(self.fetch_content(&target.id, &target.url).await);
        }
        pages
    }
}

/// Reads a document from disk. Unsupported or unreadable files become error pages.
pub async fn load_local_file(id: &str, path: &Path) -> Page {
    let source = path.display().to_string();
    let file_name = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| source.clone());

    match read_local(path).await {
        Ok((title, content)) => {
            Page::new(id, source, title.unwrap_or(file_name), content).local()
        }
        Err(e) => {
            warn!("Error processing file {}: {}", source, e);
            let mut page = Page::with_error(id, source, e.to_string()).local();
            page.metadata.title = file_name;
            page
        }
    }
}

async fn read_local(path: &Path) -> Result<(Option<String>, String)> {
    let extension = path
        .extension()
        .map(|ext| ext.to_string_lossy().to_lowercase())
        .ok_or_else(|| {
            ScanError::Other(format!("No file type detected for file: {}", path.display()))
        })?;

    match extension.as_str() {
        "html" | "htm" => {
            let html = tokio::fs::read_to_string(path).await?;
            let extracted = extract_text(&html, HrefMode::Verbatim)?;
            Ok((extracted.title, extracted.text))
        }
        "txt" | "md" => Ok((None, tokio::fs::read_to_string(path).await?)),
        other => Err(ScanError::Other(format!("Unsupported file type: {}", other))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;
    use tempfile::TempDir;
    use wiremock::{
        Mock, MockServer, ResponseTemplate,
        matchers::{method, path},
    };

    struct CannedRenderer {
        pages: HashMap<String, String>,
    }

    #[async_trait]
    impl Renderer for CannedRenderer {
        async fn render(&self, url: &str) -> Result<String> {
            self.pages
                .get(url)
                .cloned()
                .ok_or_else(|| ScanError::RenderError(format!("no page for {}", url)))
        }
    }

    #[tokio::test]
    async fn test_fetch_content_builds_page() {
        let mut pages = HashMap::new();
        pages.insert(
            "https://example.com/a".to_string(),
            r#"<html><head><title>A</title></head><body>
                <a href="/b">Go to B</a></body></html>"#
                .to_string(),
        );
        let fetcher = ContentFetcher::new(
            Arc::new(CannedRenderer { pages }),
            "https://example.com",
        );

        let page = fetcher.fetch_content("0", "https://example.com/a").await;
        assert!(!page.is_error);
        assert_eq!(page.metadata.title, "A");
        assert_eq!(page.metadata.source, "https://example.com/a");
        assert!(
            page.content
                .as_deref()
                .unwrap()
                .contains("Go to B https://example.com/b")
        );
    }

    #[tokio::test]
    async fn test_fetch_failure_becomes_error_page() {
        let fetcher = ContentFetcher::new(
            Arc::new(CannedRenderer {
                pages: HashMap::new(),
            }),
            "https://example.com",
        );

        let targets = PageTarget::enumerate(&[
            "https://example.com/missing".to_string(),
            "https://example.com/also-missing".to_string(),
        ]);
        let pages = fetcher.fetch_all(&targets).await;

        assert_eq!(pages.len(), 2);
        assert!(pages.iter().all(|p| p.is_error && p.content.is_none()));
        assert_eq!(pages[1].id, "1");
    }

    #[tokio::test]
    async fn test_http_renderer_rejects_non_success() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/gone"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&mock_server)
            .await;
        Mock::given(method("GET"))
            .and(path("/ok"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<p>hi</p>"))
            .mount(&mock_server)
            .await;

        let renderer = HttpRenderer::new(DEFAULT_USER_AGENT, Some(Duration::from_secs(5))).unwrap();

        let err = renderer
            .render(&format!("{}/gone", mock_server.uri()))
            .await
            .unwrap_err();
        assert!(matches!(err, ScanError::Status { status: 404, .. }));

        let body = renderer
            .render(&format!("{}/ok", mock_server.uri()))
            .await
            .unwrap();
        assert_eq!(body, "<p>hi</p>");
    }

    #[tokio::test]
    async fn test_http_renderer_retries_server_errors() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/flaky"))
            .respond_with(ResponseTemplate::new(503))
            .up_to_n_times(1)
            .mount(&mock_server)
            .await;
        Mock::given(method("GET"))
            .and(path("/flaky"))
            .respond_with(ResponseTemplate::new(200).set_body_string("back"))
            .mount(&mock_server)
            .await;

        let renderer = HttpRenderer::new(DEFAULT_USER_AGENT, None)
            .unwrap()
            .with_retries(2);
        let body = renderer
            .render(&format!("{}/flaky", mock_server.uri()))
            .await
            .unwrap();
        assert_eq!(body, "back");
    }

    #[tokio::test]
    async fn test_load_local_files() {
        let dir = TempDir::new().unwrap();

        let html_path = dir.path().join("guide.html");
        let mut html = std::fs::File::create(&html_path).unwrap();
        write!(html, "<title>Guide</title><p>Read <a href=\"faq.html\">the FAQ</a></p>").unwrap();

        let txt_path = dir.path().join("notes.txt");
        std::fs::write(&txt_path, "plain notes").unwrap();

        let bin_path = dir.path().join("image.gif");
        std::fs::write(&bin_path, [0u8, 1, 2]).unwrap();

        let guide = load_local_file("g", &html_path).await;
        assert_eq!(guide.metadata.title, "Guide");
        assert!(guide.content.unwrap().contains("the FAQ faq.html"));

        let notes = load_local_file("n", &txt_path).await;
        assert_eq!(notes.metadata.title, "notes.txt");
        assert_eq!(notes.content.as_deref(), Some("plain notes"));

        let image = load_local_file("i", &bin_path).await;
        assert!(image.is_error);
        assert_eq!(image.source_type, crate::result::SourceType::Local);
        assert!(image.error_message.unwrap().contains("Unsupported file type"));
    }
}
