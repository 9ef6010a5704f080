// Tests for report generation functionality

use sitegraph_core::rank::{RankOptions, ReferenceGraph, rank_with_graph};
use sitegraph_core::report::{
    ReportData, ReportFormat, generate_json_report, generate_markdown_report, generate_report,
    generate_text_report, save_report,
};
use sitegraph_scanner::Page;
use tempfile::TempDir;

fn sample_report() -> ReportData {
    let pages = vec![
        Page::new(
            "0",
            "https://example.com/a",
            "Page A".to_string(),
            "visit https://example.com/b".to_string(),
        ),
        Page::new(
            "1",
            "https://example.com/b",
            "Page | B".to_string(),
            "no links".to_string(),
        ),
        Page::with_error("2", "https://example.com/c", "HTTP 404".to_string()),
    ];
    let graph = ReferenceGraph::build(&pages);
    let ranked = rank_with_graph(&pages, &graph, 10, &RankOptions::default());
    ReportData::from_ranking("https://example.com", &pages, &graph, &ranked)
}

// ============================================================================
// Report Format Tests
// ============================================================================

#[test]
fn test_report_format_from_str() {
    assert!(matches!(ReportFormat::from_str("text"), Some(ReportFormat::Text)));
    assert!(matches!(ReportFormat::from_str("JSON"), Some(ReportFormat::Json)));
    assert!(matches!(ReportFormat::from_str("md"), Some(ReportFormat::Markdown)));
    assert!(ReportFormat::from_str("csv").is_none());
}

// ============================================================================
// Report Data Tests
// ============================================================================

#[test]
fn test_report_data_from_ranking() {
    let data = sample_report();

    assert_eq!(data.total_pages, 3);
    assert_eq!(data.error_pages, 1);
    assert_eq!(data.edge_count, 1);
    assert_eq!(data.candidates.len(), 2);
    assert!(data.candidates.iter().all(|c| c.id != "2"));
    assert_eq!(data.candidates[0].rank, 1);
    assert_eq!(data.candidates[0].id, "1");
    assert_eq!(data.candidates[0].inbound, 1);
    assert!(data.session_id.is_none());
}

#[test]
fn test_report_with_session() {
    let data = sample_report().with_session("abc-123");
    assert_eq!(data.session_id.as_deref(), Some("abc-123"));
    assert!(generate_text_report(&data).contains("Session ID:   abc-123"));
}

// ============================================================================
// Rendering Tests
// ============================================================================

#[test]
fn test_text_report_contents() {
    let report = generate_text_report(&sample_report());

    assert!(report.contains("SITEGRAPH CANDIDATE PAGE REPORT"));
    assert!(report.contains("Seed URL:     https://example.com"));
    assert!(report.contains("Pages:        3"));
    assert!(report.contains("Failed:       1"));
    assert!(report.contains("[1] Page | B"));
    assert!(!report.contains("https://example.com/c"));
    assert!(report.contains("End of Report"));
}

#[test]
fn test_json_report_structure() {
    let json = generate_json_report(&sample_report()).unwrap();
    let value: serde_json::Value = serde_json::from_str(&json).unwrap();

    let report = &value["report"];
    assert_eq!(report["metadata"]["generator"], "sitegraph");
    assert_eq!(report["crawl"]["seed_url"], "https://example.com");
    assert_eq!(report["summary"]["total_pages"], 3);
    assert_eq!(report["summary"]["reference_edges"], 1);
    assert_eq!(report["candidates"].as_array().unwrap().len(), 2);
    assert_eq!(report["candidates"][0]["url"], "https://example.com/b");
}

#[test]
fn test_markdown_report_escapes_cells() {
    let report = generate_markdown_report(&sample_report());

    assert!(report.starts_with("# Candidate pages"));
    assert!(report.contains("| 1 |"));
    assert!(report.contains("Page \\| B"));
}

#[test]
fn test_generate_report_dispatch() {
    let data = sample_report();
    let text = generate_report(&data, ReportFormat::Text).unwrap();
    assert!(text.contains("TOP CANDIDATES"));
    let json = generate_report(&data, ReportFormat::Json).unwrap();
    assert!(json.trim_start().starts_with('{'));
}

#[test]
fn test_empty_ranking_report() {
    let graph = ReferenceGraph::build(&[]);
    let data = ReportData::from_ranking("https://example.com", &[], &graph, &[]);
    assert!(generate_text_report(&data).contains("(no pages)"));
}

#[test]
fn test_save_report() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("report.txt");

    save_report("hello report", &path).unwrap();
    assert_eq!(std::fs::read_to_string(&path).unwrap(), "hello report");
}
