// Report generation from a ranking

use crate::rank::{RankedPage, ReferenceGraph};
use serde::{Deserialize, Serialize};
use sitegraph_scanner::Page;
use std::fs::File;
use std::io::Write;
use std::path::Path;

const HEAVY_RULE: &str =
    "━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━\n";
const LIGHT_RULE: &str =
    "────────────────────────────────────────────────────────────────────────────────\n";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReportFormat {
    Text,
    Json,
    Markdown,
}

impl ReportFormat {
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "text" | "txt" => Some(ReportFormat::Text),
            "json" => Some(ReportFormat::Json),
            "markdown" | "md" => Some(ReportFormat::Markdown),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportData {
    pub seed_url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
    pub total_pages: usize,
    pub error_pages: usize,
    pub edge_count: usize,
    pub candidates: Vec<CandidateData>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CandidateData {
    pub rank: usize,
    pub id: String,
    pub url: String,
    pub title: String,
    pub score: f64,
    /// Pages whose text references this one.
    pub inbound: usize,
}

impl ReportData {
    pub fn from_ranking(
        seed_url: &str,
        pages: &[Page],
        graph: &ReferenceGraph,
        ranked: &[RankedPage],
    ) -> Self {
        let edges = graph.edges();
        let candidates = ranked
            .iter()
            .enumerate()
            .map(|(idx, entry)| {
                let inbound = pages
                    .iter()
                    .position(|p| p.id == entry.page.id)
                    .map(|target| edges.iter().filter(|(_, to)| *to == target).count())
                    .unwrap_or(0);
                CandidateData {
                    rank: idx + 1,
                    id: entry.page.id.clone(),
                    url: entry.page.url.clone(),
                    title: entry.page.metadata.title.clone(),
                    score: entry.score,
                    inbound,
                }
            })
            .collect();

        Self {
            seed_url: seed_url.to_string(),
            session_id: None,
            total_pages: pages.len(),
            error_pages: pages.iter().filter(|p| p.is_error).count(),
            edge_count: edges.len(),
            candidates,
        }
    }

    pub fn with_session(mut self, session_id: impl Into<String>) -> Self {
        self.session_id = Some(session_id.into());
        self
    }
}

pub fn generate_report(data: &ReportData, format: ReportFormat) -> Result<String, serde_json::Error> {
    match format {
        ReportFormat::Text => Ok(generate_text_report(data)),
        ReportFormat::Json => generate_json_report(data),
        ReportFormat::Markdown => Ok(generate_markdown_report(data)),
    }
}

pub fn generate_text_report(data: &ReportData) -> String {
    let mut report = String::new();

    report.push_str(HEAVY_RULE);
    report.push_str("                        SITEGRAPH CANDIDATE PAGE REPORT\n");
    report.push_str(HEAVY_RULE);
    report.push('\n');

    report.push_str(&format!("Seed URL:     {}\n", data.seed_url));
    if let Some(ref session_id) = data.session_id {
        report.push_str(&format!("Session ID:   {}\n", session_id));
    }
    report.push_str(&format!("Pages:        {}\n", data.total_pages));
    report.push_str(&format!("Failed:       {}\n", data.error_pages));
    report.push_str(&format!("References:   {}\n", data.edge_count));
    report.push('\n');

    report.push_str(HEAVY_RULE);
    report.push_str("TOP CANDIDATES\n");
    report.push_str(HEAVY_RULE);
    report.push('\n');

    if data.candidates.is_empty() {
        report.push_str("  (no pages)\n\n");
    }

    for candidate in &data.candidates {
        report.push_str(&format!("[{}] {}\n", candidate.rank, candidate.title));
        report.push_str(&format!("URL:          {}\n", candidate.url));
        report.push_str(&format!("Score:        {:.6}\n", candidate.score));
        report.push_str(&format!("Referenced:   {} page(s)\n", candidate.inbound));
        report.push('\n');
        report.push_str(LIGHT_RULE);
        report.push('\n');
    }

    report.push_str(HEAVY_RULE);
    report.push_str("                          End of Report\n");
    report.push_str(HEAVY_RULE);

    report
}

pub fn generate_json_report(data: &ReportData) -> Result<String, serde_json::Error> {
    let json_report = serde_json::json!({
        "report": {
            "metadata": {
                "generator": "sitegraph",
                "version": env!("CARGO_PKG_VERSION"),
                "generated_at": chrono::Utc::now().to_rfc3339(),
                "format": "json"
            },
            "crawl": {
                "seed_url": data.seed_url,
                "session_id": data.session_id,
            },
            "summary": {
                "total_pages": data.total_pages,
                "error_pages": data.error_pages,
                "reference_edges": data.edge_count,
                "candidates": data.candidates.len()
            },
            "candidates": data.candidates
        }
    });

    serde_json::to_string_pretty(&json_report)
}

pub fn generate_markdown_report(data: &ReportData) -> String {
    let mut report = String::new();

    report.push_str("# Candidate pages\n\n");
    report.push_str(&format!("- Seed URL: <{}>\n", data.seed_url));
    report.push_str(&format!(
        "- Pages: {} ({} failed)\n",
        data.total_pages, data.error_pages
    ));
    report.push_str(&format!("- References: {}\n\n", data.edge_count));

    report.push_str("| Rank | Score | Title | URL |\n");
    report.push_str("|-----:|------:|-------|-----|\n");
    for candidate in &data.candidates {
        report.push_str(&format!(
            "| {} | {:.6} | {} | {} |\n",
            candidate.rank,
            candidate.score,
            escape_cell(&candidate.title),
            candidate.url
        ));
    }

    report
}

pub fn save_report(content: &str, path: &Path) -> std::io::Result<()> {
    let mut file = File::create(path)?;
    file.write_all(content.as_bytes())?;
    Ok(())
}

fn escape_cell(text: &str) -> String {
    text.replace('|', "\\|").replace('\n', " ")
}
