// Tests for the crawl, fetch, persist and rank pipeline

use async_trait::async_trait;
use sitegraph_core::data::Database;
use sitegraph_core::error::LoadError;
use sitegraph_core::load::{Loader, load_local_files, record_session};
use sitegraph_core::{LoaderConfig, PageSet};
use sitegraph_scanner::{Renderer, ScanError};
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tempfile::TempDir;

/// Serves canned HTML and counts how often it was asked.
struct FakeSite {
    pages: HashMap<String, String>,
    calls: AtomicUsize,
}

#[async_trait]
impl Renderer for FakeSite {
    async fn render(&self, url: &str) -> sitegraph_scanner::error::Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.pages.get(url).cloned().ok_or_else(|| ScanError::Status {
            url: url.to_string(),
            status: 404,
        })
    }
}

fn fake_site() -> Arc<FakeSite> {
    let pages = [
        (
            "https://example.com",
            r#"<html><head><title>Home</title></head><body>
               <a href="/a">A</a><a href="/b">B</a><a href="/c">C</a>
               <a href="/brochure.pdf">Brochure</a></body></html>"#,
        ),
        (
            "https://example.com/a",
            r#"<html><head><title>A</title></head><body><a href="/b">see b</a></body></html>"#,
        ),
        (
            "https://example.com/b",
            r#"<html><head><title>B</title></head><body><p>leaf</p></body></html>"#,
        ),
    ];
    Arc::new(FakeSite {
        pages: pages
            .iter()
            .map(|(url, html)| (url.to_string(), html.to_string()))
            .collect(),
        calls: AtomicUsize::new(0),
    })
}

fn config() -> LoaderConfig {
    LoaderConfig::default().with_seed_url("https://example.com/")
}

fn loader(site: &Arc<FakeSite>) -> Loader {
    Loader::with_renderers(config(), site.clone(), site.clone()).unwrap()
}

// ============================================================================
// Crawl and Fetch Tests
// ============================================================================

#[tokio::test]
async fn test_crawl_pages_numbers_sorted_urls() {
    let site = fake_site();
    let pages = loader(&site).crawl_pages().await.unwrap();

    let urls: Vec<&str> = pages.iter().map(|p| p.url.as_str()).collect();
    assert_eq!(
        urls,
        vec![
            "https://example.com",
            "https://example.com/a",
            "https://example.com/b",
            "https://example.com/c",
        ]
    );
    let ids: Vec<&str> = pages.iter().map(|p| p.id.as_str()).collect();
    assert_eq!(ids, vec!["0", "1", "2", "3"]);

    assert_eq!(pages[1].metadata.title, "A");
    assert!(pages[1].content.as_deref().unwrap().contains("see b https://example.com/b"));

    let missing = &pages[3];
    assert!(missing.is_error);
    assert!(missing.content.is_none());
    assert_eq!(missing.metadata.title, "https://example.com/c");
}

#[tokio::test]
async fn test_budget_limits_pages() {
    let site = fake_site();
    let config = LoaderConfig {
        max_pages: 2,
        ..config()
    };
    let loader = Loader::with_renderers(config, site.clone(), site.clone()).unwrap();

    let urls = loader.crawl_urls().await.unwrap();
    assert_eq!(urls, vec!["https://example.com", "https://example.com/a"]);
}

#[tokio::test]
async fn test_invalid_config_fails_before_rendering() {
    let site = fake_site();
    let result = Loader::with_renderers(
        LoaderConfig::default(),
        site.clone(),
        site.clone(),
    );

    assert!(matches!(result, Err(LoadError::Scan(ScanError::Config(_)))));
    assert_eq!(site.calls.load(Ordering::SeqCst), 0);
}

// ============================================================================
// Load and Cache Tests
// ============================================================================

#[tokio::test]
async fn test_load_saves_page_set_and_ranks() {
    let temp_dir = TempDir::new().unwrap();
    let output = temp_dir.path().join("out").join("pages.json");
    let site = fake_site();

    let outcome = loader(&site).load(&output).await.unwrap();
    assert!(!outcome.from_cache);
    assert_eq!(outcome.pages.len(), 4);
    assert_eq!(outcome.ranked.len(), 3);
    assert!(outcome.ranked.iter().all(|r| !r.page.is_error));
    assert_eq!(outcome.ranked[0].page.url, "https://example.com/b");
    assert!(outcome.graph.has_edge(0, 1));
    assert!(outcome.graph.has_edge(1, 2));

    let saved = PageSet::load(&output).unwrap();
    assert_eq!(saved.seed_url, "https://example.com/");
    assert_eq!(saved.pages, outcome.pages);
    assert_eq!(saved.error_count(), 1);
}

#[tokio::test]
async fn test_existing_page_set_is_reused() {
    let temp_dir = TempDir::new().unwrap();
    let output = temp_dir.path().join("pages.json");
    let site = fake_site();

    let first = loader(&site).load(&output).await.unwrap();
    let calls_after_first = site.calls.load(Ordering::SeqCst);
    assert!(calls_after_first > 0);

    let second = loader(&site).load(&output).await.unwrap();
    assert!(second.from_cache);
    assert_eq!(second.pages, first.pages);
    assert_eq!(second.ranked, first.ranked);
    assert_eq!(site.calls.load(Ordering::SeqCst), calls_after_first);

    let refreshed = loader(&site).with_refresh(true).load(&output).await.unwrap();
    assert!(!refreshed.from_cache);
    assert!(site.calls.load(Ordering::SeqCst) > calls_after_first);
}

#[tokio::test]
async fn test_page_set_for_other_seed_is_ignored() {
    let temp_dir = TempDir::new().unwrap();
    let output = temp_dir.path().join("pages.json");
    PageSet::new("https://other.example.org", Vec::new())
        .save(&output)
        .unwrap();

    let site = fake_site();
    let outcome = loader(&site).load(&output).await.unwrap();

    assert!(!outcome.from_cache);
    assert_eq!(PageSet::load(&output).unwrap().pages.len(), 4);
}

#[tokio::test]
async fn test_page_set_seed_compared_in_canonical_form() {
    let temp_dir = TempDir::new().unwrap();
    let output = temp_dir.path().join("pages.json");
    let site = fake_site();
    loader(&site).load(&output).await.unwrap();
    let calls_after_first = site.calls.load(Ordering::SeqCst);

    let config = LoaderConfig::default().with_seed_url("https://EXAMPLE.com:443");
    let outcome = Loader::with_renderers(config, site.clone(), site.clone())
        .unwrap()
        .load(&output)
        .await
        .unwrap();

    assert!(outcome.from_cache);
    assert_eq!(site.calls.load(Ordering::SeqCst), calls_after_first);
}

#[tokio::test]
async fn test_corrupt_page_set_is_an_error() {
    let temp_dir = TempDir::new().unwrap();
    let output = temp_dir.path().join("pages.json");
    std::fs::write(&output, "not json").unwrap();

    let site = fake_site();
    let result = loader(&site).load(&output).await;
    assert!(matches!(result, Err(LoadError::Serialization(_))));
}

// ============================================================================
// Persistence Tests
// ============================================================================

#[tokio::test]
async fn test_record_session() {
    let temp_dir = TempDir::new().unwrap();
    let db = Database::new(&temp_dir.path().join("sitegraph.db")).unwrap();
    let site = fake_site();
    let loader = loader(&site);

    let outcome = loader
        .load(&temp_dir.path().join("pages.json"))
        .await
        .unwrap();
    let session_id = record_session(
        &db,
        loader.config(),
        &outcome.pages,
        &outcome.graph,
        &outcome.ranked,
    )
    .unwrap();

    let session = db.get_session(&session_id).unwrap().unwrap();
    assert_eq!(session.seed_url, "https://example.com/");
    assert!(session.configuration.unwrap().contains("\"max_pages\":10"));
    assert_eq!(db.get_pages_by_session(&session_id).unwrap().len(), 4);
    assert_eq!(
        db.get_edges_by_session(&session_id).unwrap().len(),
        outcome.graph.edge_count()
    );
    let top = db.get_top_pages(&session_id, 1).unwrap();
    assert_eq!(top[0].2, "https://example.com/b");
}

#[tokio::test]
async fn test_load_local_files_continues_ids() {
    let temp_dir = TempDir::new().unwrap();
    let first = temp_dir.path().join("faq.md");
    let second = temp_dir.path().join("data.csv");
    std::fs::write(&first, "# FAQ").unwrap();
    std::fs::write(&second, "a,b").unwrap();

    let pages = load_local_files(&[first, second], 4).await;
    assert_eq!(pages[0].id, "4");
    assert_eq!(pages[0].content.as_deref(), Some("# FAQ"));
    assert_eq!(pages[1].id, "5");
    assert!(pages[1].is_error);
}
